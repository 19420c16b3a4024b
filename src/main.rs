// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::application::assignment_service::AssignmentService;
use crate::application::eta_service::EtaService;
use crate::application::fleet_repository::FleetRepository;
use crate::application::fleet_state::FleetStateStore;
use crate::application::ingestion_service::IngestionService;
use crate::application::persistence::PersistenceGateway;
use crate::application::trip_log::TripLog;
use crate::infrastructure::config::load_fleet_config;
use crate::infrastructure::memory_repository::MemoryRepository;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    assign_device, assign_driver, clear_condition, clear_driver, get_vehicle, health_check,
    ingest_ping, list_drivers, list_trips, list_vehicles, update_schedule, vehicle_eta,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let fleet_config = load_fleet_config()?;

    // Create repository (infrastructure layer)
    let repository: Arc<dyn FleetRepository> = Arc::new(MemoryRepository::new());
    let persistence = PersistenceGateway::new(Arc::clone(&repository));

    // Build the engine (application layer)
    let routes = Arc::new(fleet_config.route_table());
    let trip_log = Arc::new(TripLog::new(fleet_config.trace_sampling()));
    let fleet_store = Arc::new(FleetStateStore::new(
        fleet_config.vehicle_seeds(),
        fleet_config.tracking_params(),
        Arc::clone(&routes),
        fleet_config.staleness(),
        Arc::clone(&trip_log),
    ));

    // Overlay state persisted by a previous run
    for snapshot in repository.load_snapshots().await? {
        if let Err(e) = fleet_store.hydrate(&snapshot).await {
            tracing::warn!(vehicle = %snapshot.id, error = %e, "skipping persisted snapshot");
        }
    }

    let assignment_service = Arc::new(AssignmentService::new(
        Arc::clone(&fleet_store),
        fleet_config.driver_seeds(),
        persistence.clone(),
    ));
    let ingestion_service = IngestionService::new(
        Arc::clone(&assignment_service),
        Arc::clone(&fleet_store),
        persistence.clone(),
    );
    let eta_service = EtaService::new(Arc::clone(&fleet_store), routes);

    // Create application state
    let state = Arc::new(AppState {
        ingestion_service,
        assignment_service,
        eta_service,
        fleet_store,
        trip_log,
        persistence,
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/pings", post(ingest_ping))
        .route("/vehicles", get(list_vehicles))
        .route("/vehicles/:id", get(get_vehicle))
        .route("/vehicles/:id/eta", get(vehicle_eta))
        .route("/vehicles/:id/driver", put(assign_driver).delete(clear_driver))
        .route("/vehicles/:id/device", put(assign_device))
        .route("/vehicles/:id/schedule", put(update_schedule))
        .route("/vehicles/:id/clear-condition", post(clear_condition))
        .route("/trips", get(list_trips))
        .route("/drivers", get(list_drivers))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = fleet_config.server.bind.parse()?;
    tracing::info!("starting fleet-telemetry service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
