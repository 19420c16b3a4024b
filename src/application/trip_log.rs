// Trip log - converts status transitions into bounded trip records
use crate::domain::trip::{OpenTrip, TraceSampling, TripRecord};
use crate::domain::vehicle::{OperatingStatus, Position, RouteDirection, Transition};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

struct TripLogInner {
    open: HashMap<String, OpenTrip>,
    closed: Vec<TripRecord>,
}

/// Opens a trip when a vehicle enters EnRoute, samples its positions while
/// the trip runs, and closes the record when it leaves EnRoute. Queries are
/// read-time filters over closed records, restartable and cursor-free.
pub struct TripLog {
    sampling: TraceSampling,
    inner: Mutex<TripLogInner>,
}

impl TripLog {
    pub fn new(sampling: TraceSampling) -> Self {
        Self {
            sampling,
            inner: Mutex::new(TripLogInner {
                open: HashMap::new(),
                closed: Vec::new(),
            }),
        }
    }

    /// React to a vehicle status transition. Returns the trip record when the
    /// transition closed one. A vehicle has at most one open trip; entering
    /// EnRoute twice without leaving keeps the original start.
    pub fn on_transition(
        &self,
        vehicle_id: &str,
        direction: RouteDirection,
        transition: &Transition,
    ) -> Option<TripRecord> {
        let mut inner = self.inner.lock().expect("trip log lock poisoned");

        if transition.from == OperatingStatus::EnRoute
            && transition.to != OperatingStatus::EnRoute
        {
            if let Some(open) = inner.open.remove(vehicle_id) {
                let record = open.close(transition.at, transition.to);
                inner.closed.push(record.clone());
                return Some(record);
            }
        } else if transition.to == OperatingStatus::EnRoute {
            inner
                .open
                .entry(vehicle_id.to_string())
                .or_insert_with(|| {
                    OpenTrip::new(vehicle_id.to_string(), direction, transition.at)
                });
        }
        None
    }

    /// Offer a ping position to the vehicle's open trip trace, if any.
    pub fn observe(&self, vehicle_id: &str, position: Position, at: DateTime<Utc>) {
        let mut inner = self.inner.lock().expect("trip log lock poisoned");
        if let Some(open) = inner.open.get_mut(vehicle_id) {
            open.observe(position, at, &self.sampling);
        }
    }

    pub fn has_open_trip(&self, vehicle_id: &str) -> bool {
        self.inner
            .lock()
            .expect("trip log lock poisoned")
            .open
            .contains_key(vehicle_id)
    }

    /// Closed trips whose start date (UTC) matches `date`.
    pub fn trips_for_date(&self, date: NaiveDate) -> Vec<TripRecord> {
        self.inner
            .lock()
            .expect("trip log lock poisoned")
            .closed
            .iter()
            .filter(|t| t.started_at.date_naive() == date)
            .cloned()
            .collect()
    }

    pub fn all_trips(&self) -> Vec<TripRecord> {
        self.inner
            .lock()
            .expect("trip log lock poisoned")
            .closed
            .clone()
    }
}
