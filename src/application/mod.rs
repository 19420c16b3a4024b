// Application layer - Fleet services and use cases
pub mod assignment_service;
pub mod eta_service;
pub mod fleet_repository;
pub mod fleet_state;
pub mod ingestion_service;
pub mod persistence;
pub mod trip_log;
