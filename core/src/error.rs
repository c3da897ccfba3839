//! Error taxonomy for ledger operations.
//!
//! Four kinds, and only these four, leave the core:
//!
//! - [`LedgerError::NotFound`]: a referenced event or participant does not exist
//! - [`LedgerError::InvalidState`]: check-in preconditions were violated
//! - [`LedgerError::ConsistencyFault`]: the documents disagree, or an operation
//!   was left half-applied and could not be rolled back
//! - [`LedgerError::StoreUnavailable`]: the store failed; safe to retry
//!
//! `NotFound` and `InvalidState` are never retried internally. Consistency faults
//! are reported as-is and never repaired silently.

use crate::store::StoreError;
use crate::types::{EventId, ParticipantId};
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Kind of document an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    /// An event document
    Event,
    /// A participant document
    Participant,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event => f.write_str("Event"),
            Self::Participant => f.write_str("Participant"),
        }
    }
}

/// Errors returned by ledger, bulk import and check-in operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Referenced document does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Which kind of document
        entity: Entity,
        /// Its identifier
        id: Uuid,
    },

    /// Operation preconditions do not hold; nothing was changed.
    #[error("Invalid state: {0}")]
    InvalidState(#[from] InvalidState),

    /// Documents disagree or an operation is stuck half-applied.
    #[error("Consistency fault: {0}")]
    ConsistencyFault(#[from] ConsistencyFault),

    /// The store failed; no unreported side effects remain.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl LedgerError {
    /// Event with the given id does not exist.
    #[must_use]
    pub const fn event_not_found(id: EventId) -> Self {
        Self::NotFound {
            entity: Entity::Event,
            id: *id.as_uuid(),
        }
    }

    /// Participant with the given id does not exist.
    #[must_use]
    pub const fn participant_not_found(id: ParticipantId) -> Self {
        Self::NotFound {
            entity: Entity::Participant,
            id: *id.as_uuid(),
        }
    }

    /// Whether the caller may retry the same operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(e) if e.is_transient())
    }
}

/// Check-in preconditions that did not hold.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidState {
    /// The participant is not registered for the event.
    #[error("participant {participant_id} is not registered for event {event_id}")]
    NotRegistered {
        /// Participant that tried to check in
        participant_id: ParticipantId,
        /// Event it tried to check in to
        event_id: EventId,
    },

    /// The participant is already checked in.
    #[error("participant {participant_id} is already checked in")]
    AlreadyCheckedIn {
        /// Participant that tried to check in
        participant_id: ParticipantId,
        /// When the earlier check-in happened
        at: Option<DateTime<Utc>>,
    },
}

/// A detected desynchronization or a half-applied multi-document write.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyFault {
    /// The event lists the participant but its counter is already zero.
    #[error("event {event_id} lists participant {participant_id} but its registered counter is 0")]
    CounterUnderflow {
        /// Event whose counter would go negative
        event_id: EventId,
        /// Participant being detached
        participant_id: ParticipantId,
    },

    /// Bulk insert stopped part-way; only `created` were attached to the event.
    #[error(
        "import into event {event_id} created {} participant(s); records at positions {not_created:?} were not created: {cause}",
        .created.len()
    )]
    PartialImport {
        /// Target event
        event_id: EventId,
        /// Participants that were created and attached
        created: Vec<ParticipantId>,
        /// Input positions of records that were not created
        not_created: Vec<usize>,
        /// Why insertion stopped
        cause: StoreError,
    },

    /// Bulk insert failed and the committed subset could not be confirmed.
    /// Nothing was attached to the event; some of `attempted` may exist.
    #[error(
        "import into event {event_id} failed and the {} attempted participant(s) could not be confirmed: {cause}",
        .attempted.len()
    )]
    UnconfirmedImport {
        /// Target event
        event_id: EventId,
        /// Identifiers assigned to every input record
        attempted: Vec<ParticipantId>,
        /// Original failure
        cause: StoreError,
    },

    /// Participants exist with a back-reference to the event, but the event does
    /// not list them and removing them failed.
    #[error(
        "{} participant(s) reference event {event_id} without being listed on it: {cause}",
        .participant_ids.len()
    )]
    OrphanedParticipants {
        /// Event the participants point at
        event_id: EventId,
        /// Participants left behind
        participant_ids: Vec<ParticipantId>,
        /// Failure that prevented cleanup
        cause: StoreError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display_names_entity_and_id() {
        let id = EventId::new();
        let error = LedgerError::event_not_found(id);
        assert_eq!(error.to_string(), format!("Event not found: {id}"));
    }

    #[test]
    fn only_transient_store_errors_are_retryable() {
        assert!(LedgerError::from(StoreError::Unavailable("down".into())).is_retryable());
        assert!(!LedgerError::from(StoreError::Corrupt("bad".into())).is_retryable());
        assert!(!LedgerError::participant_not_found(ParticipantId::new()).is_retryable());
    }

    #[test]
    fn partial_import_display_lists_missing_positions() {
        let fault = ConsistencyFault::PartialImport {
            event_id: EventId::new(),
            created: vec![ParticipantId::new(), ParticipantId::new()],
            not_created: vec![2],
            cause: StoreError::Unavailable("write timeout".into()),
        };
        let display = fault.to_string();
        assert!(display.contains("created 2 participant(s)"));
        assert!(display.contains("[2]"));
        assert!(display.contains("write timeout"));
    }
}
