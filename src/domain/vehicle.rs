// Vehicle aggregate - position, smoothed speed, and the operating status machine
use crate::domain::ping::{Condition, Ping};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDirection {
    Outbound,
    Inbound,
}

impl fmt::Display for RouteDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Outbound => write!(f, "outbound"),
            Self::Inbound => write!(f, "inbound"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingStatus {
    Waiting,
    EnRoute,
    Arrived,
    Maintenance,
    Broken,
}

/// Tunables for status derivation and speed smoothing. Loaded from
/// configuration, never hard-coded at call sites.
#[derive(Debug, Clone, Copy)]
pub struct TrackingParams {
    /// Speed above which a waiting vehicle is considered moving (km/h).
    pub motion_threshold_kmh: f64,
    /// Consecutive at-or-below-threshold pings required to leave EnRoute.
    pub stop_hysteresis: u32,
    /// Window K for the exponential moving average over accepted speeds.
    pub ema_window: u32,
    /// Radius around the route terminus that counts as arrival (meters).
    pub terminus_radius_m: f64,
}

impl TrackingParams {
    fn ema_alpha(&self) -> f64 {
        2.0 / (f64::from(self.ema_window.max(1)) + 1.0)
    }
}

/// One status change observed while applying a ping or an operator action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: OperatingStatus,
    pub to: OperatingStatus,
    pub at: DateTime<Utc>,
}

/// The per-vehicle aggregate. Mutated only through its serialized applier;
/// everything else sees read-only snapshots.
#[derive(Debug, Clone)]
pub struct Vehicle {
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
    slow_streak: u32,
}

impl Vehicle {
    pub fn new(
        id: String,
        plate: String,
        model: String,
        direction: RouteDirection,
    ) -> Self {
        Self {
            id,
            plate,
            model,
            direction,
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
            slow_streak: 0,
        }
    }

    /// Apply one accepted ping: update position, seats and smoothed speed,
    /// then derive the new operating status. The caller has already filtered
    /// stale timestamps, so `last_update` only moves forward here.
    ///
    /// `terminus` is the end of the vehicle's route polyline, when known.
    pub fn apply_ping(
        &mut self,
        ping: &Ping,
        terminus: Option<&Position>,
        params: &TrackingParams,
    ) -> Option<Transition> {
        let before = self.status;
        let position = Position {
            lat: ping.lat,
            lng: ping.lng,
        };

        self.position = Some(position);
        self.seat_availability = Some(ping.seat_availability);
        self.last_update = Some(ping.timestamp);

        let smoothed = match self.smoothed_speed_kmh {
            Some(prev) => {
                let alpha = params.ema_alpha();
                alpha * ping.speed_kmh + (1.0 - alpha) * prev
            }
            None => ping.speed_kmh,
        };
        self.smoothed_speed_kmh = Some(smoothed);
        if smoothed > params.motion_threshold_kmh {
            self.last_nonzero_speed_kmh = Some(smoothed);
        }

        // Maintenance/broken reports are sticky until an operator clears them.
        if ping.condition != Condition::Good {
            self.condition = ping.condition;
        }

        self.status = self.derive_status(ping, &position, terminus, params);

        if self.status == before {
            None
        } else {
            Some(Transition {
                from: before,
                to: self.status,
                at: ping.timestamp,
            })
        }
    }

    fn derive_status(
        &mut self,
        ping: &Ping,
        position: &Position,
        terminus: Option<&Position>,
        params: &TrackingParams,
    ) -> OperatingStatus {
        match self.condition {
            Condition::Maintenance => {
                self.slow_streak = 0;
                return OperatingStatus::Maintenance;
            }
            Condition::Broken => {
                self.slow_streak = 0;
                return OperatingStatus::Broken;
            }
            Condition::Good => {}
        }

        match self.status {
            // A single moving sample starts a trip; false negatives hurt the
            // rider-facing board more than false positives.
            OperatingStatus::Waiting
            | OperatingStatus::Arrived
            | OperatingStatus::Maintenance
            | OperatingStatus::Broken => {
                if ping.speed_kmh > params.motion_threshold_kmh {
                    self.slow_streak = 0;
                    OperatingStatus::EnRoute
                } else if matches!(
                    self.status,
                    OperatingStatus::Maintenance | OperatingStatus::Broken
                ) {
                    // Condition was cleared but the vehicle is not moving yet.
                    self.slow_streak = 0;
                    OperatingStatus::Waiting
                } else {
                    self.status
                }
            }
            OperatingStatus::EnRoute => {
                let at_terminus = terminus
                    .map(|t| super::route::haversine_m(position, t) <= params.terminus_radius_m)
                    .unwrap_or(false);
                if at_terminus {
                    self.slow_streak = 0;
                    OperatingStatus::Arrived
                } else if ping.speed_kmh <= params.motion_threshold_kmh {
                    // Hysteresis: N consecutive slow samples before reverting,
                    // damping GPS jitter near stops.
                    self.slow_streak += 1;
                    if self.slow_streak >= params.stop_hysteresis {
                        self.slow_streak = 0;
                        OperatingStatus::Waiting
                    } else {
                        OperatingStatus::EnRoute
                    }
                } else {
                    self.slow_streak = 0;
                    OperatingStatus::EnRoute
                }
            }
        }
    }

    /// Operator action: reset a sticky maintenance/broken condition. The only
    /// path out of those statuses. Idempotent for a good-condition vehicle.
    pub fn clear_condition(&mut self, at: DateTime<Utc>) -> Option<Transition> {
        self.condition = Condition::Good;
        match self.status {
            OperatingStatus::Maintenance | OperatingStatus::Broken => {
                let from = self.status;
                self.status = OperatingStatus::Waiting;
                self.slow_streak = 0;
                Some(Transition {
                    from,
                    to: OperatingStatus::Waiting,
                    at,
                })
            }
            _ => None,
        }
    }

    /// Replace the day's schedule; entries are kept sorted and deduplicated.
    pub fn set_schedule(&mut self, mut entries: Vec<NaiveTime>) {
        entries.sort();
        entries.dedup();
        self.schedule = entries;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn params() -> TrackingParams {
        TrackingParams {
            motion_threshold_kmh: 5.0,
            stop_hysteresis: 3,
            ema_window: 5,
            terminus_radius_m: 75.0,
        }
    }

    fn ping_at(speed_kmh: f64, secs: i64) -> Ping {
        Ping {
            device_id: "dev-1".to_string(),
            lat: 14.60,
            lng: 120.98,
            speed_kmh,
            seat_availability: 12,
            condition: Condition::Good,
            timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        }
    }

    fn vehicle() -> Vehicle {
        Vehicle::new(
            "ABC123".to_string(),
            "ABC-123".to_string(),
            "Coaster".to_string(),
            RouteDirection::Outbound,
        )
    }

    #[test]
    fn test_single_moving_ping_starts_en_route() {
        let mut v = vehicle();
        let t = v.apply_ping(&ping_at(20.0, 0), None, &params());
        assert_eq!(v.status, OperatingStatus::EnRoute);
        assert_eq!(t.unwrap().from, OperatingStatus::Waiting);
    }

    #[test]
    fn test_hysteresis_requires_three_slow_pings() {
        let mut v = vehicle();
        v.apply_ping(&ping_at(20.0, 0), None, &params());

        assert!(v.apply_ping(&ping_at(0.0, 60), None, &params()).is_none());
        assert_eq!(v.status, OperatingStatus::EnRoute);
        assert!(v.apply_ping(&ping_at(0.0, 120), None, &params()).is_none());
        assert_eq!(v.status, OperatingStatus::EnRoute);

        let t = v.apply_ping(&ping_at(0.0, 180), None, &params()).unwrap();
        assert_eq!(v.status, OperatingStatus::Waiting);
        assert_eq!(t.to, OperatingStatus::Waiting);
    }

    #[test]
    fn test_moving_sample_resets_slow_streak() {
        let mut v = vehicle();
        v.apply_ping(&ping_at(20.0, 0), None, &params());
        v.apply_ping(&ping_at(0.0, 60), None, &params());
        v.apply_ping(&ping_at(0.0, 120), None, &params());
        // Jitter recovery: a moving sample restarts the countdown
        v.apply_ping(&ping_at(15.0, 180), None, &params());
        v.apply_ping(&ping_at(0.0, 240), None, &params());
        v.apply_ping(&ping_at(0.0, 300), None, &params());
        assert_eq!(v.status, OperatingStatus::EnRoute);
        v.apply_ping(&ping_at(0.0, 360), None, &params());
        assert_eq!(v.status, OperatingStatus::Waiting);
    }

    #[test]
    fn test_broken_condition_is_sticky() {
        let mut v = vehicle();
        let mut bad = ping_at(20.0, 0);
        bad.condition = Condition::Broken;
        v.apply_ping(&bad, None, &params());
        assert_eq!(v.status, OperatingStatus::Broken);

        // Subsequent good-condition pings do not clear it
        v.apply_ping(&ping_at(30.0, 60), None, &params());
        assert_eq!(v.status, OperatingStatus::Broken);

        let t = v
            .clear_condition(Utc.timestamp_opt(1_700_000_200, 0).unwrap())
            .unwrap();
        assert_eq!(t.to, OperatingStatus::Waiting);
        assert_eq!(v.status, OperatingStatus::Waiting);

        v.apply_ping(&ping_at(30.0, 120), None, &params());
        assert_eq!(v.status, OperatingStatus::EnRoute);
    }

    #[test]
    fn test_arrival_at_terminus() {
        let mut v = vehicle();
        v.apply_ping(&ping_at(20.0, 0), None, &params());
        let terminus = Position {
            lat: 14.60,
            lng: 120.98,
        };
        // Ping lands on the terminus while still moving
        let t = v
            .apply_ping(&ping_at(10.0, 60), Some(&terminus), &params())
            .unwrap();
        assert_eq!(t.to, OperatingStatus::Arrived);

        // A new trip can start from Arrived
        v.apply_ping(&ping_at(25.0, 120), None, &params());
        assert_eq!(v.status, OperatingStatus::EnRoute);
    }

    #[test]
    fn test_ema_seeds_with_first_sample() {
        let mut v = vehicle();
        v.apply_ping(&ping_at(30.0, 0), None, &params());
        assert_eq!(v.smoothed_speed_kmh, Some(30.0));

        v.apply_ping(&ping_at(0.0, 60), None, &params());
        let s = v.smoothed_speed_kmh.unwrap();
        // alpha = 2/(5+1) = 1/3, so 0*1/3 + 30*2/3 = 20
        assert!((s - 20.0).abs() < 1e-9, "got {}", s);
        // The pre-stall smoothed speed is retained for the ETA fallback
        let retained = v.last_nonzero_speed_kmh.unwrap();
        assert!((retained - 20.0).abs() < 1e-9, "got {}", retained);
    }

    #[test]
    fn test_schedule_is_sorted_and_deduplicated() {
        let mut v = vehicle();
        let six = NaiveTime::from_hms_opt(6, 0, 0).unwrap();
        let five = NaiveTime::from_hms_opt(5, 0, 0).unwrap();
        v.set_schedule(vec![six, five, six]);
        assert_eq!(v.schedule, vec![five, six]);
    }
}
