use crate::domain::driver::Driver;
use crate::domain::route::{RoutePlan, RouteTable};
use crate::domain::trip::TraceSampling;
use crate::domain::vehicle::{Position, RouteDirection, TrackingParams, Vehicle};
use chrono::Duration;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct FleetConfig {
    #[serde(default)]
    pub server: ServerSettings,
    pub tracking: TrackingSettings,
    #[serde(default)]
    pub routes: Vec<RouteSettings>,
    #[serde(default)]
    pub vehicles: Vec<VehicleSeed>,
    #[serde(default)]
    pub drivers: Vec<DriverSeed>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

/// All status-derivation and display tunables. Values live in
/// `config/fleet.toml`, not in code.
#[derive(Debug, Deserialize, Clone)]
pub struct TrackingSettings {
    pub motion_threshold_kmh: f64,
    pub stop_hysteresis: u32,
    pub ema_window: u32,
    pub terminus_radius_m: f64,
    pub staleness_minutes: i64,
    pub trace_sample_secs: i64,
    pub trace_bearing_deg: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RouteSettings {
    pub direction: RouteDirection,
    /// Ordered [lat, lng] pairs; the last one is the terminus.
    pub waypoints: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VehicleSeed {
    pub id: String,
    pub plate: String,
    pub model: String,
    pub direction: RouteDirection,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DriverSeed {
    pub id: String,
    pub name: String,
}

pub fn load_fleet_config() -> anyhow::Result<FleetConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/fleet"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

impl FleetConfig {
    pub fn tracking_params(&self) -> TrackingParams {
        TrackingParams {
            motion_threshold_kmh: self.tracking.motion_threshold_kmh,
            stop_hysteresis: self.tracking.stop_hysteresis,
            ema_window: self.tracking.ema_window,
            terminus_radius_m: self.tracking.terminus_radius_m,
        }
    }

    pub fn staleness(&self) -> Duration {
        Duration::minutes(self.tracking.staleness_minutes)
    }

    pub fn trace_sampling(&self) -> TraceSampling {
        TraceSampling {
            interval: Duration::seconds(self.tracking.trace_sample_secs),
            bearing_threshold_deg: self.tracking.trace_bearing_deg,
        }
    }

    pub fn route_table(&self) -> RouteTable {
        RouteTable::new(
            self.routes
                .iter()
                .map(|r| {
                    RoutePlan::new(
                        r.direction,
                        r.waypoints
                            .iter()
                            .map(|[lat, lng]| Position {
                                lat: *lat,
                                lng: *lng,
                            })
                            .collect(),
                    )
                })
                .collect(),
        )
    }

    pub fn vehicle_seeds(&self) -> Vec<Vehicle> {
        self.vehicles
            .iter()
            .map(|v| Vehicle::new(v.id.clone(), v.plate.clone(), v.model.clone(), v.direction))
            .collect()
    }

    pub fn driver_seeds(&self) -> Vec<Driver> {
        self.drivers
            .iter()
            .map(|d| Driver::new(d.id.clone(), d.name.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserializes_from_toml() {
        let raw = r#"
            [server]
            bind = "127.0.0.1:9090"

            [tracking]
            motion_threshold_kmh = 5.0
            stop_hysteresis = 3
            ema_window = 5
            terminus_radius_m = 75.0
            staleness_minutes = 15
            trace_sample_secs = 30
            trace_bearing_deg = 20.0

            [[routes]]
            direction = "outbound"
            waypoints = [[14.60, 120.98], [14.62, 120.98]]

            [[vehicles]]
            id = "ABC123"
            plate = "ABC-123"
            model = "Coaster"
            direction = "outbound"

            [[drivers]]
            id = "d-juan"
            name = "Juan"
        "#;
        let cfg: FleetConfig = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.server.bind, "127.0.0.1:9090");
        assert_eq!(cfg.tracking.stop_hysteresis, 3);
        assert_eq!(cfg.vehicle_seeds().len(), 1);
        assert_eq!(cfg.driver_seeds()[0].name, "Juan");
        assert!(cfg.route_table().plan(RouteDirection::Outbound).is_some());
    }

    #[test]
    fn test_server_settings_default_when_absent() {
        let raw = r#"
            [tracking]
            motion_threshold_kmh = 5.0
            stop_hysteresis = 3
            ema_window = 5
            terminus_radius_m = 75.0
            staleness_minutes = 15
            trace_sample_secs = 30
            trace_bearing_deg = 20.0
        "#;
        let cfg: FleetConfig = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0:8080");
    }
}
