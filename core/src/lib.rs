//! # Roster Core
//!
//! Attendance bookkeeping for events: who is registered where, how many are
//! registered, and who has checked in.
//!
//! Events and participants are separate documents that reference each other:
//!
//! ```text
//! Event { participant_ids: {P1, P2}, registered: 2 }
//!            ▲                │
//!            │                ▼
//! Participant { event_ids: {E1} }
//! ```
//!
//! The store offers atomicity per document only. This crate keeps the three views
//! (set, counter, back-references) in agreement across documents by ordering every
//! multi-document write, rolling back the first half when the second fails, and
//! reporting what it could not roll back.
//!
//! ## Components
//!
//! - [`ledger::RegistrationLedger`]: register, deregister, delete events
//! - [`bulk_import::BulkImportService`]: create many participants for one event
//! - [`check_in::CheckInService`]: the `NotCheckedIn → CheckedIn` transition
//! - [`audit::LedgerAuditor`]: read-only report of disagreements for one event
//! - [`catalog::Catalog`]: plain reads and field updates
//!
//! All of them run against an [`store::EntityStore`] shared as
//! `Arc<dyn EntityStore>`.
//!
//! ## Example
//!
//! ```ignore
//! use roster_core::*;
//! use std::sync::Arc;
//!
//! let store: Arc<dyn EntityStore> = Arc::new(InMemoryEntityStore::new());
//! let clock: Arc<dyn Clock> = Arc::new(SystemClock);
//! let catalog = Catalog::new(store.clone(), clock.clone());
//! let ledger = RegistrationLedger::new(store, clock, RetryPolicy::default());
//!
//! let event = catalog.create_event(new_event).await?;
//! let ada = ledger
//!     .register_new(event.id, NewParticipant::new("Ada", "ada@example.com", "555-0100"))
//!     .await?;
//! ```

pub mod audit;
pub mod bulk_import;
pub mod catalog;
pub mod check_in;
mod compensation;
pub mod environment;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod retry;
pub mod store;
pub mod types;

pub use audit::{EventAudit, LedgerAuditor};
pub use bulk_import::{BulkImportService, ImportReport};
pub use catalog::Catalog;
pub use check_in::CheckInService;
pub use environment::{Clock, SystemClock};
pub use error::{ConsistencyFault, Entity, InvalidState, LedgerError, Result};
pub use ledger::{Deregistration, RegistrationLedger};
pub use retry::RetryPolicy;
pub use store::{
    AttachOutcome, BulkInsertFailure, BulkInsertOutcome, CheckInOutcome, DetachOutcome,
    EntityStore, EventQuery, ParticipantQuery, StoreError, StoreFuture,
};
pub use types::{
    CheckInState, Event, EventId, EventPatch, EventStatus, NewEvent, NewParticipant,
    OrganizerId, Participant, ParticipantId, ParticipantPatch,
};

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
