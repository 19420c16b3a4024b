// Fleet error taxonomy
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("invalid ping: {0}")]
    Validation(String),

    #[error("no vehicle bound to device {0}")]
    NoVehicleBound(String),

    #[error("{kind} {id} is already bound to vehicle {bound_to}")]
    AssignmentConflict {
        kind: &'static str,
        id: String,
        bound_to: String,
    },

    #[error("unknown {kind}: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("no route geometry for direction {0}")]
    RouteDataMissing(String),

    #[error("schedule is empty or has no remaining entry today")]
    ScheduleDataMissing,

    #[error("no usable speed sample for estimation")]
    NoSpeedData,

    #[error("vehicle is in maintenance or broken down")]
    VehicleUnavailable,

    #[error("persistent store unavailable")]
    PersistenceUnavailable,
}

impl FleetError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}
