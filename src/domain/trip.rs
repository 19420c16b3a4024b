// Trip records - one continuous EnRoute interval, with a sampled position trace
use crate::domain::route::bearing_deg;
use crate::domain::vehicle::{OperatingStatus, Position, RouteDirection};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// One retained sample from a trip's ping stream.
#[derive(Debug, Clone, Serialize)]
pub struct TracePoint {
    pub lat: f64,
    pub lng: f64,
    pub bearing_deg: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// A closed trip. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct TripRecord {
    pub vehicle_id: String,
    pub direction: RouteDirection,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: i64,
    pub trace: Vec<TracePoint>,
    pub terminal_status: OperatingStatus,
}

/// Sampling knobs for the position trace. Storage stays bounded by keeping a
/// point only on a fixed interval or a significant bearing change.
#[derive(Debug, Clone, Copy)]
pub struct TraceSampling {
    pub interval: Duration,
    pub bearing_threshold_deg: f64,
}

/// A trip in progress, accumulating sampled positions until it closes.
#[derive(Debug, Clone)]
pub struct OpenTrip {
    vehicle_id: String,
    direction: RouteDirection,
    started_at: DateTime<Utc>,
    trace: Vec<TracePoint>,
}

impl OpenTrip {
    pub fn new(vehicle_id: String, direction: RouteDirection, started_at: DateTime<Utc>) -> Self {
        Self {
            vehicle_id,
            direction,
            started_at,
            trace: Vec::new(),
        }
    }

    /// Offer a ping position to the trace. The first point is always kept;
    /// later points only when due by interval or when the heading swings past
    /// the bearing threshold.
    pub fn observe(&mut self, position: Position, at: DateTime<Utc>, sampling: &TraceSampling) {
        let Some(last) = self.trace.last() else {
            self.trace.push(TracePoint {
                lat: position.lat,
                lng: position.lng,
                bearing_deg: None,
                timestamp: at,
            });
            return;
        };

        let last_pos = Position {
            lat: last.lat,
            lng: last.lng,
        };
        let bearing = bearing_deg(&last_pos, &position);
        let turned = last
            .bearing_deg
            .map(|prev| angle_delta_deg(prev, bearing) >= sampling.bearing_threshold_deg)
            .unwrap_or(false);
        let due = at - last.timestamp >= sampling.interval;

        if due || turned {
            self.trace.push(TracePoint {
                lat: position.lat,
                lng: position.lng,
                bearing_deg: Some(bearing),
                timestamp: at,
            });
        }
    }

    pub fn close(self, ended_at: DateTime<Utc>, terminal_status: OperatingStatus) -> TripRecord {
        TripRecord {
            vehicle_id: self.vehicle_id,
            direction: self.direction,
            started_at: self.started_at,
            ended_at,
            duration_secs: (ended_at - self.started_at).num_seconds(),
            trace: self.trace,
            terminal_status,
        }
    }
}

fn angle_delta_deg(a: f64, b: f64) -> f64 {
    let d = (a - b).abs() % 360.0;
    if d > 180.0 { 360.0 - d } else { d }
}
