//! HTTP control plane.

pub mod handlers;
pub mod routes;

pub use handlers::{HealthResponse, StartRequest, StatusResponse};
