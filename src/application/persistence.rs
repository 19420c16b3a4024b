// Durable-store gateway - bounded retry in front of the repository
use crate::application::fleet_repository::FleetRepository;
use crate::application::fleet_state::VehicleSnapshot;
use crate::domain::error::FleetError;
use crate::domain::trip::TripRecord;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const SAVE_ATTEMPTS: u32 = 3;
const SAVE_BACKOFF: Duration = Duration::from_millis(50);

/// Writes to the durable store with bounded retry and doubling backoff.
/// Every path that commits in memory goes through here, so a flaky store
/// degrades to `PersistenceUnavailable` the same way everywhere.
#[derive(Clone)]
pub struct PersistenceGateway {
    repository: Arc<dyn FleetRepository>,
}

impl PersistenceGateway {
    pub fn new(repository: Arc<dyn FleetRepository>) -> Self {
        Self { repository }
    }

    pub async fn save_vehicle(&self, snapshot: &VehicleSnapshot) -> Result<(), FleetError> {
        self.with_retry(&snapshot.id, || self.repository.save_vehicle(snapshot))
            .await
    }

    pub async fn append_trip(&self, trip: &TripRecord) -> Result<(), FleetError> {
        self.with_retry(&trip.vehicle_id, || self.repository.append_trip(trip))
            .await
    }

    async fn with_retry<F, Fut>(&self, vehicle_id: &str, mut op: F) -> Result<(), FleetError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let mut delay = SAVE_BACKOFF;
        for attempt in 1..=SAVE_ATTEMPTS {
            match op().await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < SAVE_ATTEMPTS => {
                    tracing::warn!(
                        vehicle = vehicle_id,
                        attempt,
                        error = %e,
                        "persist failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => {
                    tracing::error!(vehicle = vehicle_id, error = %e, "persist failed after retries");
                    return Err(FleetError::PersistenceUnavailable);
                }
            }
        }
        Ok(())
    }
}
