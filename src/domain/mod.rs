// Domain layer - Fleet tracking models and core state logic
pub mod driver;
pub mod error;
pub mod ping;
pub mod route;
pub mod trip;
pub mod vehicle;
