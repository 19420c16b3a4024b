// Application state for HTTP handlers
use crate::application::assignment_service::AssignmentService;
use crate::application::eta_service::EtaService;
use crate::application::ingestion_service::IngestionService;
use crate::application::fleet_state::FleetStateStore;
use crate::application::persistence::PersistenceGateway;
use crate::application::trip_log::TripLog;
use std::sync::Arc;

pub struct AppState {
    pub ingestion_service: IngestionService,
    pub assignment_service: Arc<AssignmentService>,
    pub eta_service: EtaService,
    pub fleet_store: Arc<FleetStateStore>,
    pub trip_log: Arc<TripLog>,
    pub persistence: PersistenceGateway,
}
