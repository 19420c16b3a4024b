// HTTP request handlers
use crate::application::eta_service::Eta;
use crate::application::fleet_state::VehicleSnapshot;
use crate::application::ingestion_service::IngestOutcome;
use crate::domain::driver::Driver;
use crate::domain::error::FleetError;
use crate::domain::ping::{Condition, Ping};
use crate::domain::trip::TripRecord;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
pub struct PingRequest {
    pub device_id: String,
    pub lat: f64,
    pub lng: f64,
    pub speed: f64,
    pub seat_availability: u32,
    pub condition: String,
    /// Defaults to receipt time when the device omits it.
    pub timestamp: Option<DateTime<Utc>>,
}

impl PingRequest {
    fn into_ping(self) -> Result<Ping, FleetError> {
        let condition: Condition = self.condition.parse()?;
        Ok(Ping {
            device_id: self.device_id,
            lat: self.lat,
            lng: self.lng,
            speed_kmh: self.speed,
            seat_availability: self.seat_availability,
            condition,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        })
    }
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub outcome: &'static str,
}

#[derive(Deserialize)]
pub struct AssignDriverRequest {
    pub driver_id: String,
}

#[derive(Deserialize)]
pub struct AssignDeviceRequest {
    pub device_id: String,
}

#[derive(Deserialize)]
pub struct ScheduleRequest {
    /// Times of day, "HH:MM" or "HH:MM:SS".
    pub entries: Vec<String>,
}

#[derive(Deserialize)]
pub struct TripsQuery {
    pub date: Option<NaiveDate>,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Ingress from field devices
pub async fn ingest_ping(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PingRequest>,
) -> Result<Json<IngestResponse>, FleetError> {
    let ping = request.into_ping()?;
    let outcome = state.ingestion_service.ingest(ping).await?;
    Ok(Json(IngestResponse {
        outcome: match outcome {
            IngestOutcome::Applied => "applied",
            IngestOutcome::StaleOrDuplicate => "stale_or_duplicate",
        },
    }))
}

/// Fleet-wide status board
pub async fn list_vehicles(State(state): State<Arc<AppState>>) -> Json<Vec<VehicleSnapshot>> {
    Json(state.fleet_store.list_snapshots())
}

pub async fn get_vehicle(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<VehicleSnapshot>, FleetError> {
    Ok(Json(state.fleet_store.snapshot(&id)?))
}

pub async fn vehicle_eta(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Eta>, FleetError> {
    Ok(Json(state.eta_service.estimate_arrival(&id)?))
}

pub async fn list_trips(
    Query(query): Query<TripsQuery>,
    State(state): State<Arc<AppState>>,
) -> Json<Vec<TripRecord>> {
    let trips = match query.date {
        Some(date) => state.trip_log.trips_for_date(date),
        None => state.trip_log.all_trips(),
    };
    Json(trips)
}

pub async fn list_drivers(State(state): State<Arc<AppState>>) -> Json<Vec<Driver>> {
    Json(state.assignment_service.list_drivers().await)
}

/// Fleet-admin: bind a driver to a vehicle
pub async fn assign_driver(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<AssignDriverRequest>,
) -> Result<Json<VehicleSnapshot>, FleetError> {
    state
        .assignment_service
        .assign_driver(&id, &request.driver_id)
        .await?;
    Ok(Json(state.fleet_store.snapshot(&id)?))
}

pub async fn clear_driver(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<VehicleSnapshot>, FleetError> {
    state.assignment_service.clear_driver(&id).await?;
    Ok(Json(state.fleet_store.snapshot(&id)?))
}

pub async fn assign_device(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<AssignDeviceRequest>,
) -> Result<Json<VehicleSnapshot>, FleetError> {
    state
        .assignment_service
        .assign_device(&id, &request.device_id)
        .await?;
    Ok(Json(state.fleet_store.snapshot(&id)?))
}

pub async fn update_schedule(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScheduleRequest>,
) -> Result<Json<VehicleSnapshot>, FleetError> {
    let entries = request
        .entries
        .iter()
        .map(|raw| parse_time_of_day(raw))
        .collect::<Result<Vec<_>, _>>()?;
    let snapshot = state.fleet_store.update_schedule(&id, entries).await?;
    state.persistence.save_vehicle(&snapshot).await?;
    Ok(Json(snapshot))
}

/// Fleet-admin: the only way out of Maintenance/Broken
pub async fn clear_condition(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<VehicleSnapshot>, FleetError> {
    let snapshot = state.fleet_store.clear_condition(&id).await?;
    state.persistence.save_vehicle(&snapshot).await?;
    Ok(Json(snapshot))
}

fn parse_time_of_day(raw: &str) -> Result<NaiveTime, FleetError> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| {
            FleetError::Validation(format!("schedule entry '{}' is not a time of day", raw))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::assignment_service::AssignmentService;
    use crate::application::eta_service::EtaService;
    use crate::application::fleet_repository::FleetRepository;
    use crate::application::fleet_state::FleetStateStore;
    use crate::application::ingestion_service::IngestionService;
    use crate::application::persistence::PersistenceGateway;
    use crate::application::trip_log::TripLog;
    use crate::domain::route::RouteTable;
    use crate::domain::trip::TraceSampling;
    use crate::domain::vehicle::{OperatingStatus, RouteDirection, TrackingParams, Vehicle};
    use crate::infrastructure::memory_repository::MemoryRepository;
    use chrono::Duration;

    fn app_state() -> (Arc<AppState>, Arc<MemoryRepository>) {
        let repo = Arc::new(MemoryRepository::new());
        let persistence = PersistenceGateway::new(Arc::clone(&repo) as Arc<dyn FleetRepository>);
        let trip_log = Arc::new(TripLog::new(TraceSampling {
            interval: Duration::seconds(30),
            bearing_threshold_deg: 20.0,
        }));
        let routes = Arc::new(RouteTable::default());
        let fleet_store = Arc::new(FleetStateStore::new(
            vec![Vehicle::new(
                "ABC123".to_string(),
                "ABC-123".to_string(),
                "Coaster".to_string(),
                RouteDirection::Outbound,
            )],
            TrackingParams {
                motion_threshold_kmh: 5.0,
                stop_hysteresis: 3,
                ema_window: 5,
                terminus_radius_m: 75.0,
            },
            Arc::clone(&routes),
            Duration::minutes(15),
            Arc::clone(&trip_log),
        ));
        let assignment_service = Arc::new(AssignmentService::new(
            Arc::clone(&fleet_store),
            Vec::new(),
            persistence.clone(),
        ));
        let ingestion_service = IngestionService::new(
            Arc::clone(&assignment_service),
            Arc::clone(&fleet_store),
            persistence.clone(),
        );
        let eta_service = EtaService::new(Arc::clone(&fleet_store), routes);
        let state = Arc::new(AppState {
            ingestion_service,
            assignment_service,
            eta_service,
            fleet_store,
            trip_log,
            persistence,
        });
        (state, repo)
    }

    #[test]
    fn test_parse_time_of_day_formats() {
        assert_eq!(
            parse_time_of_day("05:00").unwrap(),
            NaiveTime::from_hms_opt(5, 0, 0).unwrap()
        );
        assert_eq!(
            parse_time_of_day("18:30:15").unwrap(),
            NaiveTime::from_hms_opt(18, 30, 15).unwrap()
        );
        assert!(parse_time_of_day("quarter past").is_err());
    }

    #[test]
    fn test_ping_request_defaults_timestamp_to_receipt() {
        let request = PingRequest {
            device_id: "dev-1".to_string(),
            lat: 14.6,
            lng: 120.98,
            speed: 12.0,
            seat_availability: 4,
            condition: "good".to_string(),
            timestamp: None,
        };
        let before = Utc::now();
        let ping = request.into_ping().unwrap();
        assert!(ping.timestamp >= before);
        assert_eq!(ping.condition, Condition::Good);
    }

    #[test]
    fn test_ping_request_rejects_unknown_condition() {
        let request = PingRequest {
            device_id: "dev-1".to_string(),
            lat: 14.6,
            lng: 120.98,
            speed: 12.0,
            seat_availability: 4,
            condition: "on fire".to_string(),
            timestamp: None,
        };
        assert!(matches!(
            request.into_ping().unwrap_err(),
            FleetError::Validation(_)
        ));
    }

    #[test]
    fn test_ingest_response_body_shape() {
        let body = serde_json::to_value(IngestResponse {
            outcome: "stale_or_duplicate",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"outcome": "stale_or_duplicate"}));
    }

    #[tokio::test]
    async fn test_schedule_update_reaches_the_durable_store() {
        let (state, repo) = app_state();
        update_schedule(
            Path("ABC123".to_string()),
            State(Arc::clone(&state)),
            Json(ScheduleRequest {
                entries: vec!["05:30".to_string(), "06:00".to_string()],
            }),
        )
        .await
        .unwrap();

        let persisted = repo.load_snapshots().await.unwrap();
        let abc = persisted.iter().find(|s| s.id == "ABC123").unwrap();
        assert_eq!(
            abc.schedule,
            vec![
                NaiveTime::from_hms_opt(5, 30, 0).unwrap(),
                NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            ]
        );
    }

    #[tokio::test]
    async fn test_condition_clear_reaches_the_durable_store() {
        let (state, repo) = app_state();
        let mut broken = state.fleet_store.snapshot("ABC123").unwrap();
        broken.status = OperatingStatus::Broken;
        broken.condition = Condition::Broken;
        state.fleet_store.hydrate(&broken).await.unwrap();

        clear_condition(Path("ABC123".to_string()), State(Arc::clone(&state)))
            .await
            .unwrap();

        let persisted = repo.load_snapshots().await.unwrap();
        let abc = persisted.iter().find(|s| s.id == "ABC123").unwrap();
        assert_eq!(abc.status, OperatingStatus::Waiting);
        assert_eq!(abc.condition, Condition::Good);
    }
}
