// Ping - one telemetry report from a field device
use crate::domain::error::FleetError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Device-reported condition flag. Anything other than `Good` forces and
/// pins the vehicle's maintenance/broken status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Good,
    Maintenance,
    Broken,
}

impl FromStr for Condition {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "good" => Ok(Self::Good),
            "maintenance" => Ok(Self::Maintenance),
            "broken" => Ok(Self::Broken),
            other => Err(FleetError::Validation(format!(
                "condition must be one of good/maintenance/broken, got '{}'",
                other
            ))),
        }
    }
}

/// A validated telemetry report. Transient: consumed when applied to a
/// vehicle, except for the sampled subset retained in trip traces.
#[derive(Debug, Clone)]
pub struct Ping {
    pub device_id: String,
    pub lat: f64,
    pub lng: f64,
    pub speed_kmh: f64,
    pub seat_availability: u32,
    pub condition: Condition,
    pub timestamp: DateTime<Utc>,
}

impl Ping {
    pub fn validate(&self) -> Result<(), FleetError> {
        if self.device_id.trim().is_empty() {
            return Err(FleetError::Validation("device_id is required".to_string()));
        }
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(FleetError::Validation(format!(
                "latitude out of range: {}",
                self.lat
            )));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(FleetError::Validation(format!(
                "longitude out of range: {}",
                self.lng
            )));
        }
        if !self.speed_kmh.is_finite() || self.speed_kmh < 0.0 {
            return Err(FleetError::Validation(format!(
                "speed must be >= 0, got {}",
                self.speed_kmh
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ping() -> Ping {
        Ping {
            device_id: "dev-1".to_string(),
            lat: 14.6,
            lng: 120.98,
            speed_kmh: 20.0,
            seat_availability: 10,
            condition: Condition::Good,
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_valid_ping_passes() {
        assert!(ping().validate().is_ok());
    }

    #[test]
    fn test_negative_speed_rejected() {
        let mut p = ping();
        p.speed_kmh = -1.0;
        assert!(matches!(p.validate(), Err(FleetError::Validation(_))));
    }

    #[test]
    fn test_out_of_range_latitude_rejected() {
        let mut p = ping();
        p.lat = 95.0;
        assert!(matches!(p.validate(), Err(FleetError::Validation(_))));
    }

    #[test]
    fn test_condition_parsing() {
        assert_eq!("maintenance".parse::<Condition>().unwrap(), Condition::Maintenance);
        assert!("totaled".parse::<Condition>().is_err());
    }
}
