// Vehicle state store - serialized per-vehicle appliers with copy-on-write snapshots
use crate::application::trip_log::TripLog;
use crate::domain::error::FleetError;
use crate::domain::ping::{Condition, Ping};
use crate::domain::route::RouteTable;
use crate::domain::trip::TripRecord;
use crate::domain::vehicle::{
    OperatingStatus, Position, RouteDirection, TrackingParams, Vehicle,
};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Point-in-time read model of one vehicle. Published atomically after each
/// mutation; readers never see position from one ping and status from
/// another.
#[derive(Debug, Clone, Serialize)]
pub struct VehicleSnapshot {
    pub id: String,
    pub plate: String,
    pub model: String,
    pub direction: RouteDirection,
    pub status: OperatingStatus,
    pub position: Option<Position>,
    pub smoothed_speed_kmh: Option<f64>,
    pub last_nonzero_speed_kmh: Option<f64>,
    pub seat_availability: Option<u32>,
    pub last_update: Option<DateTime<Utc>>,
    pub condition: Condition,
    pub driver_id: Option<String>,
    pub device_id: Option<String>,
    pub schedule: Vec<NaiveTime>,
    /// Display-only: last ping older than the staleness threshold. Computed
    /// at read time, never persisted as state.
    pub stale: bool,
}

impl VehicleSnapshot {
    fn of(vehicle: &Vehicle) -> Self {
        Self {
            id: vehicle.id.clone(),
            plate: vehicle.plate.clone(),
            model: vehicle.model.clone(),
            direction: vehicle.direction,
            status: vehicle.status,
            position: vehicle.position,
            smoothed_speed_kmh: vehicle.smoothed_speed_kmh,
            last_nonzero_speed_kmh: vehicle.last_nonzero_speed_kmh,
            seat_availability: vehicle.seat_availability,
            last_update: vehicle.last_update,
            condition: vehicle.condition,
            driver_id: vehicle.driver_id.clone(),
            device_id: vehicle.device_id.clone(),
            schedule: vehicle.schedule.clone(),
            stale: false,
        }
    }
}

/// Result of applying one ping through the serialized path.
#[derive(Debug)]
pub enum ApplyOutcome {
    Applied {
        snapshot: VehicleSnapshot,
        closed_trip: Option<TripRecord>,
    },
    StaleOrDuplicate,
}

struct VehicleSlot {
    /// Sole writer path: apply calls for one vehicle are totally ordered.
    applier: tokio::sync::Mutex<Vehicle>,
    /// Published read model. Swapped whole while the applier lock is held,
    /// so readers take a brief read lock and clone, never the applier lock.
    snapshot: RwLock<Arc<VehicleSnapshot>>,
}

impl VehicleSlot {
    fn new(vehicle: Vehicle) -> Self {
        let snapshot = Arc::new(VehicleSnapshot::of(&vehicle));
        Self {
            applier: tokio::sync::Mutex::new(vehicle),
            snapshot: RwLock::new(snapshot),
        }
    }

    fn publish(&self, vehicle: &Vehicle) -> VehicleSnapshot {
        let snapshot = VehicleSnapshot::of(vehicle);
        *self.snapshot.write().expect("snapshot lock poisoned") = Arc::new(snapshot.clone());
        snapshot
    }

    fn read(&self) -> Arc<VehicleSnapshot> {
        Arc::clone(&self.snapshot.read().expect("snapshot lock poisoned"))
    }
}

/// Authoritative per-vehicle aggregates. The vehicle set is fixed at startup
/// (fleet registry is admin-owned, out of scope), so the slot map itself
/// needs no locking.
pub struct FleetStateStore {
    slots: HashMap<String, Arc<VehicleSlot>>,
    params: TrackingParams,
    routes: Arc<RouteTable>,
    staleness: Duration,
    trip_log: Arc<TripLog>,
}

impl FleetStateStore {
    pub fn new(
        vehicles: Vec<Vehicle>,
        params: TrackingParams,
        routes: Arc<RouteTable>,
        staleness: Duration,
        trip_log: Arc<TripLog>,
    ) -> Self {
        let slots = vehicles
            .into_iter()
            .map(|v| (v.id.clone(), Arc::new(VehicleSlot::new(v))))
            .collect();
        Self {
            slots,
            params,
            routes,
            staleness,
            trip_log,
        }
    }

    pub fn contains(&self, vehicle_id: &str) -> bool {
        self.slots.contains_key(vehicle_id)
    }

    pub fn tracking_params(&self) -> TrackingParams {
        self.params
    }

    fn slot(&self, vehicle_id: &str) -> Result<&Arc<VehicleSlot>, FleetError> {
        self.slots
            .get(vehicle_id)
            .ok_or_else(|| FleetError::not_found("vehicle", vehicle_id))
    }

    /// Apply one ping to the owning vehicle. Dedup against the last-applied
    /// timestamp happens inside the applier lock, so re-delivery is safe and
    /// timestamps are monotonically non-decreasing by construction.
    pub async fn apply_ping(
        &self,
        vehicle_id: &str,
        ping: &Ping,
    ) -> Result<ApplyOutcome, FleetError> {
        let slot = self.slot(vehicle_id)?;
        let mut vehicle = slot.applier.lock().await;

        if let Some(last) = vehicle.last_update {
            if ping.timestamp <= last {
                return Ok(ApplyOutcome::StaleOrDuplicate);
            }
        }

        let terminus = self.routes.terminus(vehicle.direction);
        let transition = vehicle.apply_ping(ping, terminus, &self.params);

        let closed_trip = transition
            .as_ref()
            .and_then(|t| self.trip_log.on_transition(&vehicle.id, vehicle.direction, t));
        if let Some(position) = vehicle.position {
            self.trip_log.observe(&vehicle.id, position, ping.timestamp);
        }

        let snapshot = slot.publish(&vehicle);

        if let Some(t) = transition {
            tracing::info!(
                vehicle = %vehicle.id,
                from = ?t.from,
                to = ?t.to,
                "vehicle status transition"
            );
        }

        Ok(ApplyOutcome::Applied {
            snapshot,
            closed_trip,
        })
    }

    /// Consistent point-in-time read of one vehicle, with the staleness flag
    /// evaluated against `now`.
    pub fn snapshot(&self, vehicle_id: &str) -> Result<VehicleSnapshot, FleetError> {
        let slot = self.slot(vehicle_id)?;
        Ok(self.flag_stale((*slot.read()).clone(), Utc::now()))
    }

    /// Snapshots of the whole fleet, ordered by vehicle ID.
    pub fn list_snapshots(&self) -> Vec<VehicleSnapshot> {
        let now = Utc::now();
        let mut snapshots: Vec<VehicleSnapshot> = self
            .slots
            .values()
            .map(|slot| self.flag_stale((*slot.read()).clone(), now))
            .collect();
        snapshots.sort_by(|a, b| a.id.cmp(&b.id));
        snapshots
    }

    fn flag_stale(&self, mut snapshot: VehicleSnapshot, now: DateTime<Utc>) -> VehicleSnapshot {
        snapshot.stale = snapshot
            .last_update
            .map(|last| now - last > self.staleness)
            .unwrap_or(false);
        snapshot
    }

    /// Admin: replace a vehicle's schedule.
    pub async fn update_schedule(
        &self,
        vehicle_id: &str,
        entries: Vec<NaiveTime>,
    ) -> Result<VehicleSnapshot, FleetError> {
        let slot = self.slot(vehicle_id)?;
        let mut vehicle = slot.applier.lock().await;
        vehicle.set_schedule(entries);
        Ok(slot.publish(&vehicle))
    }

    /// Admin: the only way out of Maintenance/Broken.
    pub async fn clear_condition(&self, vehicle_id: &str) -> Result<VehicleSnapshot, FleetError> {
        let slot = self.slot(vehicle_id)?;
        let mut vehicle = slot.applier.lock().await;
        if let Some(t) = vehicle.clear_condition(Utc::now()) {
            self.trip_log.on_transition(&vehicle.id, vehicle.direction, &t);
            tracing::info!(vehicle = %vehicle.id, from = ?t.from, "condition cleared by operator");
        }
        Ok(slot.publish(&vehicle))
    }

    /// Assignment support: set or clear the vehicle's driver reference.
    pub async fn set_driver_ref(
        &self,
        vehicle_id: &str,
        driver_id: Option<String>,
    ) -> Result<VehicleSnapshot, FleetError> {
        let slot = self.slot(vehicle_id)?;
        let mut vehicle = slot.applier.lock().await;
        vehicle.driver_id = driver_id;
        Ok(slot.publish(&vehicle))
    }

    /// Assignment support: set or clear the vehicle's device reference.
    pub async fn set_device_ref(
        &self,
        vehicle_id: &str,
        device_id: Option<String>,
    ) -> Result<VehicleSnapshot, FleetError> {
        let slot = self.slot(vehicle_id)?;
        let mut vehicle = slot.applier.lock().await;
        vehicle.device_id = device_id;
        Ok(slot.publish(&vehicle))
    }

    /// Assignment support: move a device reference from one vehicle to
    /// another. Both applier locks are taken in canonical ID order so
    /// concurrent two-vehicle operations cannot deadlock. Returns the
    /// committed `(from, to)` snapshots.
    pub async fn move_device_ref(
        &self,
        from_vehicle: &str,
        to_vehicle: &str,
        device_id: &str,
    ) -> Result<(VehicleSnapshot, VehicleSnapshot), FleetError> {
        let from_slot = Arc::clone(self.slot(from_vehicle)?);
        let to_slot = Arc::clone(self.slot(to_vehicle)?);

        let (first, second) = if from_vehicle <= to_vehicle {
            (&from_slot, &to_slot)
        } else {
            (&to_slot, &from_slot)
        };
        let mut first_vehicle = first.applier.lock().await;
        let mut second_vehicle = second.applier.lock().await;

        let (old, new) = if first_vehicle.id == from_vehicle {
            (&mut first_vehicle, &mut second_vehicle)
        } else {
            (&mut second_vehicle, &mut first_vehicle)
        };
        old.device_id = None;
        new.device_id = Some(device_id.to_string());

        let first_snapshot = first.publish(&first_vehicle);
        let second_snapshot = second.publish(&second_vehicle);
        Ok(if first_vehicle.id == from_vehicle {
            (first_snapshot, second_snapshot)
        } else {
            (second_snapshot, first_snapshot)
        })
    }

    /// Startup hydration: overlay persisted state onto a seeded aggregate.
    pub async fn hydrate(&self, snapshot: &VehicleSnapshot) -> Result<(), FleetError> {
        let slot = self.slot(&snapshot.id)?;
        let mut vehicle = slot.applier.lock().await;
        vehicle.status = snapshot.status;
        vehicle.position = snapshot.position;
        vehicle.smoothed_speed_kmh = snapshot.smoothed_speed_kmh;
        vehicle.last_nonzero_speed_kmh = snapshot.last_nonzero_speed_kmh;
        vehicle.seat_availability = snapshot.seat_availability;
        vehicle.last_update = snapshot.last_update;
        vehicle.condition = snapshot.condition;
        vehicle.driver_id = snapshot.driver_id.clone();
        vehicle.device_id = snapshot.device_id.clone();
        vehicle.schedule = snapshot.schedule.clone();
        slot.publish(&vehicle);
        Ok(())
    }
}
