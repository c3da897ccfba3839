//! # Roster Server
//!
//! HTTP API over the roster services.
//!
//! ```text
//! axum router ──► AppState { catalog, ledger, import, check_in, auditor }
//!                        │
//!                        ▼
//!              Arc<dyn EntityStore>  (PostgreSQL or in-memory)
//! ```
//!
//! Status mapping for ledger errors:
//!
//! | Error              | Status |
//! |--------------------|--------|
//! | `NotFound`         | 404    |
//! | `InvalidState`     | 400    |
//! | `ConsistencyFault` | 409    |
//! | `StoreUnavailable` | 503    |
//! | request validation | 422    |

#![forbid(unsafe_code)]

pub mod api;
pub mod config;
pub mod error;
pub mod server;
pub mod telemetry;

pub use config::{Config, ConfigError, StoreBackend};
pub use error::AppError;
pub use server::{AppState, Backend, build_router};
