//! Application state for the roster HTTP server.
//!
//! Every service shares one `Arc<dyn EntityStore>`; the concrete [`Backend`] is
//! kept alongside for readiness checks.

use crate::config::{StoreBackend, StoreConfig};
use roster_core::{
    BulkImportService, Catalog, CheckInService, Clock, EntityStore, LedgerAuditor,
    RegistrationLedger, RetryPolicy, StoreError, SystemClock,
};
use roster_postgres::PostgresEntityStore;
use roster_testing::InMemoryEntityStore;
use std::sync::Arc;

/// The concrete store behind the services.
#[derive(Clone)]
pub enum Backend {
    /// `PostgreSQL`
    Postgres(PostgresEntityStore),
    /// Process-local maps
    Memory(InMemoryEntityStore),
}

impl Backend {
    /// Open the configured backend. For `PostgreSQL` this connects and runs
    /// migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database cannot be reached or migrated.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        match config.backend {
            StoreBackend::Postgres => {
                let store = PostgresEntityStore::connect(
                    &config.postgres.url,
                    &config.postgres.pool_settings(),
                )
                .await?;
                store.migrate().await?;
                Ok(Self::Postgres(store))
            }
            StoreBackend::Memory => {
                tracing::warn!("Using the in-memory store; data is lost on restart");
                Ok(Self::Memory(InMemoryEntityStore::new()))
            }
        }
    }

    /// Name reported by readiness checks.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }

    /// Check the backend can serve requests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database does not answer.
    pub async fn ping(&self) -> Result<(), StoreError> {
        match self {
            Self::Postgres(store) => store.ping().await,
            Self::Memory(_) => Ok(()),
        }
    }

    fn entity_store(&self) -> Arc<dyn EntityStore> {
        match self {
            Self::Postgres(store) => Arc::new(store.clone()),
            Self::Memory(store) => Arc::new(store.clone()),
        }
    }
}

/// Application state shared across all HTTP handlers.
///
/// Cloned (cheaply via Arc) for each request.
#[derive(Clone)]
pub struct AppState {
    /// Plain reads and field updates
    pub catalog: Catalog,
    /// Registration, deregistration and event deletion
    pub ledger: RegistrationLedger,
    /// Bulk participant import
    pub import: BulkImportService,
    /// Check-in state machine
    pub check_in: CheckInService,
    /// Consistency audit
    pub auditor: LedgerAuditor,
    /// Store used by readiness checks
    pub backend: Backend,
}

impl AppState {
    /// Wire every service to the backend with the system clock.
    #[must_use]
    pub fn new(backend: Backend, retry: RetryPolicy) -> Self {
        Self::with_clock(backend, Arc::new(SystemClock), retry)
    }

    /// Wire every service to the backend with the given clock.
    #[must_use]
    pub fn with_clock(backend: Backend, clock: Arc<dyn Clock>, retry: RetryPolicy) -> Self {
        let store = backend.entity_store();
        Self {
            catalog: Catalog::new(store.clone(), clock.clone()),
            ledger: RegistrationLedger::new(store.clone(), clock.clone(), retry.clone()),
            import: BulkImportService::new(store.clone(), clock.clone(), retry),
            check_in: CheckInService::new(store.clone(), clock),
            auditor: LedgerAuditor::new(store),
            backend,
        }
    }
}
