//! HTTP adapter for the health check.

mod dto;
mod handlers;
mod routes;

pub use dto::{DatabaseHealth, HealthResponse, POSTGRES_BASE};
pub use handlers::{healthcheck, HealthAppState};
pub use routes::health_routes;
