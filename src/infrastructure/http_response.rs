// HTTP mapping for the fleet error taxonomy
use crate::domain::error::FleetError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl IntoResponse for FleetError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            FleetError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            FleetError::NoVehicleBound(_) => (StatusCode::NOT_FOUND, "no_vehicle_bound"),
            FleetError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            FleetError::AssignmentConflict { .. } => (StatusCode::CONFLICT, "assignment_conflict"),
            FleetError::RouteDataMissing(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "route_data_missing")
            }
            FleetError::ScheduleDataMissing => {
                (StatusCode::UNPROCESSABLE_ENTITY, "schedule_data_missing")
            }
            FleetError::NoSpeedData => (StatusCode::UNPROCESSABLE_ENTITY, "no_speed_data"),
            FleetError::VehicleUnavailable => {
                (StatusCode::UNPROCESSABLE_ENTITY, "vehicle_unavailable")
            }
            FleetError::PersistenceUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "persistence_unavailable")
            }
        };

        let body = ErrorResponse {
            error,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_taxonomy() {
        let cases = [
            (
                FleetError::Validation("speed".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                FleetError::NoVehicleBound("dev-1".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                FleetError::AssignmentConflict {
                    kind: "driver",
                    id: "d-juan".to_string(),
                    bound_to: "ABC123".to_string(),
                },
                StatusCode::CONFLICT,
            ),
            (FleetError::VehicleUnavailable, StatusCode::UNPROCESSABLE_ENTITY),
            (
                FleetError::PersistenceUnavailable,
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
