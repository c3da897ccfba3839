//! Read-only consistency audit of one event.
//!
//! Compares the event's `registered` counter and `participant_ids` set against the
//! participant documents. Nothing is repaired; the report says what disagrees.

use crate::error::{LedgerError, Result};
use crate::store::{EntityStore, ParticipantQuery};
use crate::types::{EventId, ParticipantId};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Disagreements found between an event and its participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventAudit {
    /// Audited event
    pub event_id: EventId,
    /// The event's `registered` counter
    pub registered: u32,
    /// Size of the event's participant set
    pub listed: usize,
    /// Listed participants whose `event_ids` does not contain the event
    pub missing_back_reference: Vec<ParticipantId>,
    /// Listed participants that do not exist
    pub dangling: Vec<ParticipantId>,
    /// Participants pointing at the event without being listed on it
    pub unlisted: Vec<ParticipantId>,
}

impl EventAudit {
    /// `registered - listed`; zero when the counter agrees with the set.
    #[must_use]
    pub fn counter_drift(&self) -> i64 {
        i64::from(self.registered) - i64::try_from(self.listed).unwrap_or(i64::MAX)
    }

    /// Whether the event and its participants fully agree.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.counter_drift() == 0
            && self.missing_back_reference.is_empty()
            && self.dangling.is_empty()
            && self.unlisted.is_empty()
    }
}

/// Runs consistency audits against a store.
#[derive(Clone)]
pub struct LedgerAuditor {
    store: Arc<dyn EntityStore>,
}

impl LedgerAuditor {
    /// Create an auditor over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Audit one event.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the event does not exist
    /// - `StoreUnavailable`: the store failed
    pub async fn audit_event(&self, event_id: EventId) -> Result<EventAudit> {
        let event = self
            .store
            .find_event(event_id)
            .await?
            .ok_or(LedgerError::event_not_found(event_id))?;

        let listed: Vec<ParticipantId> = event.participant_ids.iter().copied().collect();
        let found = self
            .store
            .find_participants(ParticipantQuery::with_ids(listed.clone()))
            .await?;
        let pointing = self
            .store
            .find_participants(ParticipantQuery::for_event(event_id))
            .await?;

        let existing: BTreeSet<ParticipantId> = found.iter().map(|p| p.id).collect();
        let dangling: Vec<ParticipantId> = listed
            .iter()
            .filter(|id| !existing.contains(id))
            .copied()
            .collect();
        let mut missing_back_reference: Vec<ParticipantId> = found
            .iter()
            .filter(|p| !p.is_registered_for(&event_id))
            .map(|p| p.id)
            .collect();
        missing_back_reference.sort();
        let mut unlisted: Vec<ParticipantId> = pointing
            .iter()
            .filter(|p| !event.has_participant(&p.id))
            .map(|p| p.id)
            .collect();
        unlisted.sort();

        let audit = EventAudit {
            event_id,
            registered: event.registered,
            listed: event.participant_ids.len(),
            missing_back_reference,
            dangling,
            unlisted,
        };

        if audit.is_consistent() {
            tracing::debug!(%event_id, registered = audit.registered, "Event audit clean");
        } else {
            tracing::warn!(
                %event_id,
                counter_drift = audit.counter_drift(),
                missing_back_reference = audit.missing_back_reference.len(),
                dangling = audit.dangling.len(),
                unlisted = audit.unlisted.len(),
                "Event audit found disagreements"
            );
        }
        Ok(audit)
    }
}
