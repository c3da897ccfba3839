//! HTTP server module for roster.
//!
//! - Application state wiring services to a backend
//! - Health and readiness endpoints
//! - Router configuration

pub mod health;
pub mod routes;
pub mod state;

pub use health::{health_check, readiness_check};
pub use routes::build_router;
pub use state::{AppState, Backend};
