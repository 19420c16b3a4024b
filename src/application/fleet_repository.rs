// Repository trait for durable fleet state
use crate::application::fleet_state::VehicleSnapshot;
use crate::domain::trip::TripRecord;
use async_trait::async_trait;

/// Durable store behind the engine. The core never assumes a storage
/// technology; adapters live in the infrastructure layer.
#[async_trait]
pub trait FleetRepository: Send + Sync {
    /// Snapshots persisted by a previous run, used to rehydrate at startup.
    async fn load_snapshots(&self) -> anyhow::Result<Vec<VehicleSnapshot>>;

    /// Persist the committed state of one vehicle.
    async fn save_vehicle(&self, snapshot: &VehicleSnapshot) -> anyhow::Result<()>;

    /// Append a closed trip to the durable trip log.
    async fn append_trip(&self, trip: &TripRecord) -> anyhow::Result<()>;
}
