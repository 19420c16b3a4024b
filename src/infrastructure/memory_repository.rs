// In-memory fleet repository - the default durable-store adapter
use crate::application::fleet_repository::FleetRepository;
use crate::application::fleet_state::VehicleSnapshot;
use crate::domain::trip::TripRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

struct MemoryStore {
    snapshots: HashMap<String, VehicleSnapshot>,
    trips: Vec<TripRecord>,
}

/// Keeps persisted state in process memory. Stands in for the external
/// durable store; the engine only ever talks to the `FleetRepository` trait.
pub struct MemoryRepository {
    store: Mutex<MemoryStore>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(MemoryStore {
                snapshots: HashMap::new(),
                trips: Vec::new(),
            }),
        }
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FleetRepository for MemoryRepository {
    async fn load_snapshots(&self) -> anyhow::Result<Vec<VehicleSnapshot>> {
        let store = self.store.lock().expect("repository lock poisoned");
        Ok(store.snapshots.values().cloned().collect())
    }

    async fn save_vehicle(&self, snapshot: &VehicleSnapshot) -> anyhow::Result<()> {
        let mut store = self.store.lock().expect("repository lock poisoned");
        store
            .snapshots
            .insert(snapshot.id.clone(), snapshot.clone());
        Ok(())
    }

    async fn append_trip(&self, trip: &TripRecord) -> anyhow::Result<()> {
        let mut store = self.store.lock().expect("repository lock poisoned");
        store.trips.push(trip.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ping::Condition;
    use crate::domain::vehicle::{OperatingStatus, RouteDirection};

    fn snapshot(id: &str) -> VehicleSnapshot {
        VehicleSnapshot {
            id: id.to_string(),
            plate: format!("{}-P", id),
            model: "Coaster".to_string(),
            direction: RouteDirection::Outbound,
            status: OperatingStatus::Waiting,
            position: None,
            smoothed_speed_kmh: None,
            last_nonzero_speed_kmh: None,
            seat_availability: None,
            last_update: None,
            condition: Condition::Good,
            driver_id: None,
            device_id: None,
            schedule: Vec::new(),
            stale: false,
        }
    }

    #[tokio::test]
    async fn test_save_is_upsert_by_vehicle_id() {
        let repo = MemoryRepository::new();
        repo.save_vehicle(&snapshot("ABC123")).await.unwrap();
        repo.save_vehicle(&snapshot("ABC123")).await.unwrap();
        repo.save_vehicle(&snapshot("XYZ789")).await.unwrap();
        assert_eq!(repo.load_snapshots().await.unwrap().len(), 2);
    }
}
