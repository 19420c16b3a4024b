// Assignment manager - injective device/vehicle and driver/vehicle bindings
use crate::application::fleet_state::FleetStateStore;
use crate::application::persistence::PersistenceGateway;
use crate::domain::driver::Driver;
use crate::domain::error::FleetError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

struct Bindings {
    drivers: HashMap<String, Driver>,
    driver_to_vehicle: HashMap<String, String>,
    vehicle_to_driver: HashMap<String, String>,
    device_to_vehicle: HashMap<String, String>,
    vehicle_to_device: HashMap<String, String>,
}

/// Sole writer of both sides of the driver/vehicle and device/vehicle
/// bindings. One mutex over the binding maps makes conflicting concurrent
/// assignments resolve deterministically: exactly one caller wins, the other
/// sees `AssignmentConflict`.
pub struct AssignmentService {
    store: Arc<FleetStateStore>,
    persistence: PersistenceGateway,
    bindings: Mutex<Bindings>,
}

impl AssignmentService {
    /// The binding maps are rebuilt from the vehicle aggregates, so state
    /// hydrated from a previous run resolves devices and raises conflicts
    /// exactly like state assigned live.
    pub fn new(
        store: Arc<FleetStateStore>,
        drivers: Vec<Driver>,
        persistence: PersistenceGateway,
    ) -> Self {
        let mut drivers: HashMap<String, Driver> =
            drivers.into_iter().map(|d| (d.id.clone(), d)).collect();
        let mut driver_to_vehicle = HashMap::new();
        let mut vehicle_to_driver = HashMap::new();
        let mut device_to_vehicle = HashMap::new();
        let mut vehicle_to_device = HashMap::new();

        for snapshot in store.list_snapshots() {
            if let Some(device_id) = &snapshot.device_id {
                device_to_vehicle.insert(device_id.clone(), snapshot.id.clone());
                vehicle_to_device.insert(snapshot.id.clone(), device_id.clone());
            }
            if let Some(driver_id) = &snapshot.driver_id {
                driver_to_vehicle.insert(driver_id.clone(), snapshot.id.clone());
                vehicle_to_driver.insert(snapshot.id.clone(), driver_id.clone());
                if let Some(d) = drivers.get_mut(driver_id) {
                    d.vehicle_id = Some(snapshot.id.clone());
                }
            }
        }

        Self {
            store,
            persistence,
            bindings: Mutex::new(Bindings {
                drivers,
                driver_to_vehicle,
                vehicle_to_driver,
                device_to_vehicle,
                vehicle_to_device,
            }),
        }
    }

    /// Vehicle owning `device_id`, if any. The ingestion gateway's lookup.
    pub async fn resolve_device(&self, device_id: &str) -> Option<String> {
        self.bindings
            .lock()
            .await
            .device_to_vehicle
            .get(device_id)
            .cloned()
    }

    /// Bind a driver to a vehicle. No-op when already bound there; fails with
    /// `AssignmentConflict` when the driver is bound elsewhere. A driver
    /// already on the target vehicle is released first, so the vehicle side
    /// stays single-valued.
    pub async fn assign_driver(&self, vehicle_id: &str, driver_id: &str) -> Result<(), FleetError> {
        if !self.store.contains(vehicle_id) {
            return Err(FleetError::not_found("vehicle", vehicle_id));
        }

        let mut b = self.bindings.lock().await;
        if !b.drivers.contains_key(driver_id) {
            return Err(FleetError::not_found("driver", driver_id));
        }

        match b.driver_to_vehicle.get(driver_id) {
            Some(bound) if bound == vehicle_id => return Ok(()),
            Some(bound) => {
                return Err(FleetError::AssignmentConflict {
                    kind: "driver",
                    id: driver_id.to_string(),
                    bound_to: bound.clone(),
                });
            }
            None => {}
        }

        if let Some(previous) = b
            .vehicle_to_driver
            .insert(vehicle_id.to_string(), driver_id.to_string())
        {
            b.driver_to_vehicle.remove(&previous);
            if let Some(d) = b.drivers.get_mut(&previous) {
                d.vehicle_id = None;
            }
        }
        b.driver_to_vehicle
            .insert(driver_id.to_string(), vehicle_id.to_string());
        if let Some(d) = b.drivers.get_mut(driver_id) {
            d.vehicle_id = Some(vehicle_id.to_string());
        }

        // Mirror onto the aggregate while still holding the binding lock, so
        // no concurrent assignment observes a half-updated pair.
        let snapshot = self
            .store
            .set_driver_ref(vehicle_id, Some(driver_id.to_string()))
            .await?;
        self.persistence.save_vehicle(&snapshot).await?;
        tracing::info!(vehicle = vehicle_id, driver = driver_id, "driver assigned");
        Ok(())
    }

    /// Unbind a vehicle's driver. Idempotent: clearing an unassigned vehicle
    /// succeeds with no state change.
    pub async fn clear_driver(&self, vehicle_id: &str) -> Result<(), FleetError> {
        if !self.store.contains(vehicle_id) {
            return Err(FleetError::not_found("vehicle", vehicle_id));
        }

        let mut b = self.bindings.lock().await;
        let Some(driver_id) = b.vehicle_to_driver.remove(vehicle_id) else {
            return Ok(());
        };
        b.driver_to_vehicle.remove(&driver_id);
        if let Some(d) = b.drivers.get_mut(&driver_id) {
            d.vehicle_id = None;
        }
        let snapshot = self.store.set_driver_ref(vehicle_id, None).await?;
        self.persistence.save_vehicle(&snapshot).await?;
        tracing::info!(vehicle = vehicle_id, driver = %driver_id, "driver cleared");
        Ok(())
    }

    /// Bind a device to a vehicle. Rebinding moves the device atomically:
    /// there is no moment where two vehicles claim it, nor one where the
    /// device is claimed by none once the call succeeds.
    pub async fn assign_device(&self, vehicle_id: &str, device_id: &str) -> Result<(), FleetError> {
        if !self.store.contains(vehicle_id) {
            return Err(FleetError::not_found("vehicle", vehicle_id));
        }

        let mut b = self.bindings.lock().await;
        let previous_vehicle = match b.device_to_vehicle.get(device_id) {
            Some(bound) if bound == vehicle_id => return Ok(()),
            Some(bound) => Some(bound.clone()),
            None => None,
        };

        if let Some(old) = &previous_vehicle {
            b.vehicle_to_device.remove(old);
        }
        b.device_to_vehicle
            .insert(device_id.to_string(), vehicle_id.to_string());
        if let Some(displaced) = b
            .vehicle_to_device
            .insert(vehicle_id.to_string(), device_id.to_string())
        {
            // The target vehicle's previous device is released
            b.device_to_vehicle.remove(&displaced);
        }

        match previous_vehicle {
            Some(old) => {
                let (from, to) = self
                    .store
                    .move_device_ref(&old, vehicle_id, device_id)
                    .await?;
                self.persistence.save_vehicle(&from).await?;
                self.persistence.save_vehicle(&to).await?;
                tracing::info!(
                    device = device_id,
                    from = %old,
                    to = vehicle_id,
                    "device rebound"
                );
            }
            None => {
                let snapshot = self
                    .store
                    .set_device_ref(vehicle_id, Some(device_id.to_string()))
                    .await?;
                self.persistence.save_vehicle(&snapshot).await?;
                tracing::info!(device = device_id, vehicle = vehicle_id, "device assigned");
            }
        }
        Ok(())
    }

    /// Registered drivers with their current vehicle binding, for the admin
    /// read side.
    pub async fn list_drivers(&self) -> Vec<Driver> {
        let b = self.bindings.lock().await;
        let mut drivers: Vec<Driver> = b.drivers.values().cloned().collect();
        drivers.sort_by(|a, b| a.id.cmp(&b.id));
        drivers
    }
}
