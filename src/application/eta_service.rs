// ETA estimator - arrival estimates from smoothed speed or schedule
use crate::application::fleet_state::FleetStateStore;
use crate::domain::error::FleetError;
use crate::domain::route::RouteTable;
use crate::domain::vehicle::OperatingStatus;
use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// An arrival estimate: a travel-time for a moving vehicle, or the next
/// scheduled departure for a waiting one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Eta {
    Duration { seconds: i64 },
    ScheduledTime { at: NaiveTime },
}

pub struct EtaService {
    store: Arc<FleetStateStore>,
    routes: Arc<RouteTable>,
}

impl EtaService {
    pub fn new(store: Arc<FleetStateStore>, routes: Arc<RouteTable>) -> Self {
        Self { store, routes }
    }

    pub fn estimate_arrival(&self, vehicle_id: &str) -> Result<Eta, FleetError> {
        self.estimate_at(vehicle_id, Utc::now())
    }

    /// Estimate against an explicit clock. Reads only committed snapshots;
    /// never extrapolates from a maintenance/broken vehicle.
    pub fn estimate_at(&self, vehicle_id: &str, now: DateTime<Utc>) -> Result<Eta, FleetError> {
        let snapshot = self.store.snapshot(vehicle_id)?;

        match snapshot.status {
            OperatingStatus::Maintenance | OperatingStatus::Broken => {
                Err(FleetError::VehicleUnavailable)
            }
            OperatingStatus::EnRoute => {
                let plan = self
                    .routes
                    .plan(snapshot.direction)
                    .ok_or_else(|| FleetError::RouteDataMissing(snapshot.direction.to_string()))?;
                let position = snapshot.position.ok_or(FleetError::NoSpeedData)?;
                let remaining_m = plan
                    .remaining_distance_m(&position)
                    .ok_or_else(|| FleetError::RouteDataMissing(snapshot.direction.to_string()))?;

                // Near-zero smoothed speed means "currently stalled": fall back
                // to the last known moving speed instead of a nonsense ETA.
                let stall_floor = self.store.tracking_params().motion_threshold_kmh;
                let speed_kmh = snapshot
                    .smoothed_speed_kmh
                    .filter(|s| *s > stall_floor)
                    .or(snapshot.last_nonzero_speed_kmh)
                    .ok_or(FleetError::NoSpeedData)?;

                let seconds = (remaining_m / (speed_kmh / 3.6)).round() as i64;
                Ok(Eta::Duration { seconds })
            }
            OperatingStatus::Waiting | OperatingStatus::Arrived => snapshot
                .schedule
                .iter()
                .find(|entry| **entry > now.time())
                .map(|entry| Eta::ScheduledTime { at: *entry })
                .ok_or(FleetError::ScheduleDataMissing),
        }
    }
}
