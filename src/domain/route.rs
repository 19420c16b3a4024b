// Route geometry - fixed per-direction waypoint polylines and distance math
use crate::domain::vehicle::{Position, RouteDirection};
use std::collections::HashMap;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two positions, in meters.
pub fn haversine_m(a: &Position, b: &Position) -> f64 {
    let (lat1, lng1) = (a.lat.to_radians(), a.lng.to_radians());
    let (lat2, lng2) = (b.lat.to_radians(), b.lng.to_radians());
    let dlat = lat2 - lat1;
    let dlng = lng2 - lng1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Initial bearing from `a` to `b` in degrees, normalized to [0, 360).
pub fn bearing_deg(a: &Position, b: &Position) -> f64 {
    let (lat1, lng1) = (a.lat.to_radians(), a.lng.to_radians());
    let (lat2, lng2) = (b.lat.to_radians(), b.lng.to_radians());
    let dlng = lng2 - lng1;
    let y = dlng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlng.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Ordered stop/waypoint polyline for one direction. The last waypoint is the
/// route terminus.
#[derive(Debug, Clone)]
pub struct RoutePlan {
    pub direction: RouteDirection,
    pub waypoints: Vec<Position>,
}

impl RoutePlan {
    pub fn new(direction: RouteDirection, waypoints: Vec<Position>) -> Self {
        Self {
            direction,
            waypoints,
        }
    }

    pub fn terminus(&self) -> Option<&Position> {
        self.waypoints.last()
    }

    /// Distance in meters from `from` to the terminus, following the polyline
    /// from the nearest remaining waypoint onward. `None` when the plan has no
    /// waypoints.
    pub fn remaining_distance_m(&self, from: &Position) -> Option<f64> {
        if self.waypoints.is_empty() {
            return None;
        }

        let (nearest, _) = self
            .waypoints
            .iter()
            .enumerate()
            .map(|(i, wp)| (i, haversine_m(from, wp)))
            .min_by(|a, b| a.1.total_cmp(&b.1))?;

        let mut remaining = haversine_m(from, &self.waypoints[nearest]);
        for pair in self.waypoints[nearest..].windows(2) {
            remaining += haversine_m(&pair[0], &pair[1]);
        }
        Some(remaining)
    }
}

/// Route geometry for both fixed directions, keyed by direction.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    plans: HashMap<RouteDirection, RoutePlan>,
}

impl RouteTable {
    pub fn new(plans: Vec<RoutePlan>) -> Self {
        Self {
            plans: plans.into_iter().map(|p| (p.direction, p)).collect(),
        }
    }

    pub fn plan(&self, direction: RouteDirection) -> Option<&RoutePlan> {
        self.plans.get(&direction)
    }

    pub fn terminus(&self, direction: RouteDirection) -> Option<&Position> {
        self.plans.get(&direction).and_then(RoutePlan::terminus)
    }
}
