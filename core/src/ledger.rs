//! Registration ledger.
//!
//! Keeps `Event::participant_ids`, `Event::registered` and
//! `Participant::event_ids` in agreement when a participant joins or leaves an
//! event.
//!
//! # Write Order
//!
//! The store has no multi-document transactions, so every operation writes in a
//! fixed order:
//!
//! ```text
//! register:   participant side (create / add back-reference)
//!             → event side (attach: set-add + counter increment, one update)
//!             → on any failure: undo the participant side (it may have committed)
//!
//! deregister: event side for each event (detach: set-remove + decrement, one update)
//!             → delete the participant document last
//! ```
//!
//! The counter never moves independently of the set on the same document, and
//! every step is idempotent, so re-running an interrupted operation completes it.
//!
//! Capacity is not enforced. Registrations beyond capacity succeed and are logged.

use crate::compensation;
use crate::error::{ConsistencyFault, LedgerError, Result};
use crate::environment::Clock;
use crate::metrics;
use crate::retry::RetryPolicy;
use crate::store::{AttachOutcome, DetachOutcome, EntityStore};
use crate::types::{Event, EventId, NewParticipant, Participant, ParticipantId};
use std::collections::BTreeSet;
use std::sync::Arc;

/// What a successful deregistration did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deregistration {
    /// The participant as it was before deletion
    pub participant: Participant,
    /// Events whose counter and set were decremented
    pub detached_from: Vec<EventId>,
    /// Back-references that needed no change (already detached, or event gone)
    pub skipped: Vec<EventId>,
}

/// Maintains the event ↔ participant association and the `registered` counter.
#[derive(Clone)]
pub struct RegistrationLedger {
    store: Arc<dyn EntityStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl RegistrationLedger {
    /// Create a ledger over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>, clock: Arc<dyn Clock>, retry: RetryPolicy) -> Self {
        Self {
            store,
            clock,
            retry,
        }
    }

    /// Create a participant and register it for an event.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the event does not exist (nothing is created)
    /// - `StoreUnavailable`: a write failed and was rolled back
    /// - `ConsistencyFault::OrphanedParticipants`: a write failed and the
    ///   participant, which may have been created, could not be removed again
    pub async fn register_new(
        &self,
        event_id: EventId,
        new: NewParticipant,
    ) -> Result<Participant> {
        self.load_event(event_id).await?;

        let participant_id = ParticipantId::new();
        let participant = Participant::from_new(
            participant_id,
            new,
            BTreeSet::from([event_id]),
            self.clock.now(),
        );
        // A failed create may still have committed; the id is ours, so discard it.
        let participant = match self.store.create_participant(participant).await {
            Ok(participant) => participant,
            Err(error) => {
                tracing::warn!(%event_id, %participant_id, error = %error, "Participant create failed during registration");
                self.undo_created(event_id, participant_id).await?;
                return Err(error.into());
            }
        };

        match self.store.attach_participants(event_id, vec![participant.id]).await {
            Ok(AttachOutcome::Attached { event, .. }) => {
                record_registration(&event, participant.id);
                Ok(participant)
            }
            Ok(AttachOutcome::EventMissing) => {
                tracing::warn!(%event_id, participant_id = %participant.id, "Event vanished during registration");
                self.undo_created(event_id, participant.id).await?;
                Err(LedgerError::event_not_found(event_id))
            }
            Err(error) => {
                tracing::warn!(%event_id, participant_id = %participant.id, error = %error, "Attach failed during registration");
                self.undo_created(event_id, participant.id).await?;
                Err(error.into())
            }
        }
    }

    /// Register an existing participant for an event.
    ///
    /// Already-complete registrations are returned unchanged. A registration left
    /// half-applied by an earlier failure is completed.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the event or participant does not exist
    /// - `StoreUnavailable`: a write failed and was rolled back
    /// - `ConsistencyFault::OrphanedParticipants`: a write failed and the new
    ///   back-reference, which may have been written, could not be removed again
    pub async fn register_existing(
        &self,
        event_id: EventId,
        participant_id: ParticipantId,
    ) -> Result<Participant> {
        self.load_event(event_id).await?;
        let before = self
            .store
            .find_participant(participant_id)
            .await?
            .ok_or(LedgerError::participant_not_found(participant_id))?;
        let added_back_reference = !before.is_registered_for(&event_id);

        let participant = match self.store.add_event_to_participant(participant_id, event_id).await {
            Ok(participant) => participant.ok_or(LedgerError::participant_not_found(participant_id))?,
            Err(error) => {
                tracing::warn!(%event_id, %participant_id, error = %error, "Back-reference write failed during registration");
                if added_back_reference {
                    self.undo_back_reference(event_id, participant_id).await?;
                }
                return Err(error.into());
            }
        };

        match self.store.attach_participants(event_id, vec![participant_id]).await {
            Ok(AttachOutcome::Attached { event, added }) => {
                if added > 0 {
                    record_registration(&event, participant_id);
                } else {
                    tracing::debug!(%event_id, %participant_id, "Participant already registered");
                }
                Ok(participant)
            }
            Ok(AttachOutcome::EventMissing) => {
                if added_back_reference {
                    self.undo_back_reference(event_id, participant_id).await?;
                }
                Err(LedgerError::event_not_found(event_id))
            }
            Err(error) => {
                tracing::warn!(%event_id, %participant_id, error = %error, "Attach failed during registration");
                if added_back_reference {
                    self.undo_back_reference(event_id, participant_id).await?;
                }
                Err(error.into())
            }
        }
    }

    /// Remove a participant and release it from every event it is registered for.
    ///
    /// Events are detached in id order. The participant document is deleted last,
    /// so after any failure it still exists and the call can be repeated; events
    /// already detached are skipped on the next run.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the participant does not exist
    /// - `ConsistencyFault::CounterUnderflow`: an event lists the participant but
    ///   its counter is already zero (the participant is kept)
    /// - `StoreUnavailable`: a write failed (the participant is kept)
    pub async fn deregister(&self, participant_id: ParticipantId) -> Result<Deregistration> {
        let participant = self
            .store
            .find_participant(participant_id)
            .await?
            .ok_or(LedgerError::participant_not_found(participant_id))?;

        let mut detached_from = Vec::new();
        let mut skipped = Vec::new();

        for &event_id in &participant.event_ids {
            match self.store.detach_participant(event_id, participant_id).await? {
                DetachOutcome::Detached(event) => {
                    tracing::debug!(
                        %event_id,
                        %participant_id,
                        registered = event.registered,
                        "Participant detached from event"
                    );
                    detached_from.push(event_id);
                }
                DetachOutcome::NotAttached(_) => {
                    tracing::debug!(%event_id, %participant_id, "Participant not listed on event, skipping");
                    skipped.push(event_id);
                }
                DetachOutcome::EventMissing => {
                    tracing::warn!(%event_id, %participant_id, "Dangling back-reference to deleted event, skipping");
                    skipped.push(event_id);
                }
                DetachOutcome::CounterUnderflow(event) => {
                    metrics::consistency_fault("counter_underflow");
                    tracing::error!(
                        %event_id,
                        %participant_id,
                        listed = event.participant_ids.len(),
                        "Registered counter is 0 while the participant is listed"
                    );
                    return Err(ConsistencyFault::CounterUnderflow {
                        event_id,
                        participant_id,
                    }
                    .into());
                }
            }
        }

        if !self.store.delete_participant(participant_id).await? {
            return Err(LedgerError::participant_not_found(participant_id));
        }

        metrics::deregistered();
        tracing::info!(
            %participant_id,
            detached = detached_from.len(),
            skipped = skipped.len(),
            "Participant deregistered"
        );

        Ok(Deregistration {
            participant,
            detached_from,
            skipped,
        })
    }

    /// Delete an event document.
    ///
    /// Participants keep their back-references to the deleted event; deregistration
    /// skips them and the audit reports them.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the event does not exist
    /// - `StoreUnavailable`: the store failed
    pub async fn delete_event(&self, event_id: EventId) -> Result<Event> {
        let event = self.load_event(event_id).await?;

        if !self.store.delete_event(event_id).await? {
            return Err(LedgerError::event_not_found(event_id));
        }

        if event.participant_ids.is_empty() {
            tracing::info!(%event_id, "Event deleted");
        } else {
            tracing::warn!(
                %event_id,
                dangling = event.participant_ids.len(),
                "Event deleted; its participants keep back-references to it"
            );
        }
        Ok(event)
    }

    async fn load_event(&self, event_id: EventId) -> Result<Event> {
        self.store
            .find_event(event_id)
            .await?
            .ok_or(LedgerError::event_not_found(event_id))
    }

    async fn undo_created(&self, event_id: EventId, participant_id: ParticipantId) -> Result<()> {
        compensation::discard_unattached(self.store.as_ref(), &self.retry, event_id, &[participant_id])
            .await
    }

    async fn undo_back_reference(
        &self,
        event_id: EventId,
        participant_id: ParticipantId,
    ) -> Result<()> {
        compensation::drop_back_reference(self.store.as_ref(), &self.retry, event_id, participant_id)
            .await
    }
}

fn record_registration(event: &Event, participant_id: ParticipantId) {
    metrics::registered(event.is_over_capacity());
    if event.is_over_capacity() {
        tracing::warn!(
            event_id = %event.id,
            %participant_id,
            registered = event.registered,
            capacity = event.capacity,
            "Registration accepted beyond capacity"
        );
    } else {
        tracing::info!(
            event_id = %event.id,
            %participant_id,
            registered = event.registered,
            capacity = event.capacity,
            "Participant registered"
        );
    }
}
