//! Participant check-in.
//!
//! ```text
//! NotCheckedIn ──check_in(event it is registered for)──▶ CheckedIn { at }
//! ```
//!
//! `CheckedIn` is terminal. The check-in flag belongs to the participant, not to a
//! single registration, so a participant registered for several events checks in
//! once.

use crate::environment::Clock;
use crate::error::{InvalidState, LedgerError, Result};
use crate::metrics;
use crate::store::{CheckInOutcome, EntityStore};
use crate::types::{CheckInState, EventId, Participant, ParticipantId};
use std::sync::Arc;

/// Records participant arrival at an event.
#[derive(Clone)]
pub struct CheckInService {
    store: Arc<dyn EntityStore>,
    clock: Arc<dyn Clock>,
}

impl CheckInService {
    /// Create a check-in service over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Check a participant in to an event it is registered for.
    ///
    /// The write is conditional: of two concurrent check-ins exactly one succeeds.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the participant does not exist
    /// - `InvalidState::NotRegistered`: the event is not in the participant's set
    /// - `InvalidState::AlreadyCheckedIn`: the participant already checked in
    /// - `StoreUnavailable`: the store failed; nothing was changed
    pub async fn check_in(
        &self,
        participant_id: ParticipantId,
        event_id: EventId,
    ) -> Result<Participant> {
        let participant = self
            .store
            .find_participant(participant_id)
            .await?
            .ok_or(LedgerError::participant_not_found(participant_id))?;

        if !participant.is_registered_for(&event_id) {
            metrics::check_in("not_registered");
            tracing::debug!(%participant_id, %event_id, "Check-in refused: not registered");
            return Err(InvalidState::NotRegistered {
                participant_id,
                event_id,
            }
            .into());
        }

        if let CheckInState::CheckedIn { at } = participant.check_in_state() {
            metrics::check_in("already_checked_in");
            return Err(already_checked_in(participant_id, at));
        }

        match self.store.mark_checked_in(participant_id, self.clock.now()).await? {
            CheckInOutcome::Applied(participant) => {
                metrics::check_in("checked_in");
                tracing::info!(%participant_id, %event_id, "Participant checked in");
                Ok(participant)
            }
            CheckInOutcome::AlreadyCheckedIn(current) => {
                metrics::check_in("already_checked_in");
                tracing::debug!(%participant_id, "Concurrent check-in won the race");
                Err(already_checked_in(participant_id, current.check_in_time))
            }
            CheckInOutcome::Missing => {
                tracing::debug!(%participant_id, "Participant deleted before check-in");
                Err(LedgerError::participant_not_found(participant_id))
            }
        }
    }
}

fn already_checked_in(
    participant_id: ParticipantId,
    at: Option<chrono::DateTime<chrono::Utc>>,
) -> LedgerError {
    InvalidState::AlreadyCheckedIn { participant_id, at }.into()
}
