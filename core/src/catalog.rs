//! Plain reads and field updates for events and participants.
//!
//! Nothing here touches the association fields. Registration, removal and
//! check-in go through [`RegistrationLedger`](crate::ledger::RegistrationLedger),
//! [`BulkImportService`](crate::bulk_import::BulkImportService) and
//! [`CheckInService`](crate::check_in::CheckInService).

use crate::environment::Clock;
use crate::error::{LedgerError, Result};
use crate::store::{EntityStore, EventQuery, ParticipantQuery};
use crate::types::{
    Event, EventId, EventPatch, NewEvent, NewParticipant, Participant, ParticipantId,
    ParticipantPatch,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Event and participant passthroughs.
#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn EntityStore>,
    clock: Arc<dyn Clock>,
}

impl Catalog {
    /// Create a catalog over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create an event with no participants.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` if the store failed.
    pub async fn create_event(&self, new: NewEvent) -> Result<Event> {
        let event = Event::from_new(EventId::new(), new, self.clock.now());
        let event = self.store.create_event(event).await?;
        tracing::info!(event_id = %event.id, capacity = event.capacity, "Event created");
        Ok(event)
    }

    /// Load an event.
    ///
    /// # Errors
    ///
    /// `NotFound` or `StoreUnavailable`.
    pub async fn event(&self, event_id: EventId) -> Result<Event> {
        self.store
            .find_event(event_id)
            .await?
            .ok_or(LedgerError::event_not_found(event_id))
    }

    /// List events matching the filter, earliest first.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` if the store failed.
    pub async fn events(&self, query: EventQuery) -> Result<Vec<Event>> {
        Ok(self.store.find_events(query).await?)
    }

    /// Update event fields.
    ///
    /// # Errors
    ///
    /// `NotFound` or `StoreUnavailable`.
    pub async fn update_event(&self, event_id: EventId, patch: EventPatch) -> Result<Event> {
        let event = self
            .store
            .update_event(event_id, patch)
            .await?
            .ok_or(LedgerError::event_not_found(event_id))?;
        tracing::info!(%event_id, status = %event.status, "Event updated");
        Ok(event)
    }

    /// Create a participant that is not registered for any event.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` if the store failed.
    pub async fn create_participant(&self, new: NewParticipant) -> Result<Participant> {
        let participant =
            Participant::from_new(ParticipantId::new(), new, BTreeSet::new(), self.clock.now());
        let participant = self.store.create_participant(participant).await?;
        tracing::info!(participant_id = %participant.id, "Participant created");
        Ok(participant)
    }

    /// Load a participant.
    ///
    /// # Errors
    ///
    /// `NotFound` or `StoreUnavailable`.
    pub async fn participant(&self, participant_id: ParticipantId) -> Result<Participant> {
        self.store
            .find_participant(participant_id)
            .await?
            .ok_or(LedgerError::participant_not_found(participant_id))
    }

    /// List participants matching the filter, newest first.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` if the store failed.
    pub async fn participants(&self, query: ParticipantQuery) -> Result<Vec<Participant>> {
        Ok(self.store.find_participants(query).await?)
    }

    /// Update participant contact fields.
    ///
    /// # Errors
    ///
    /// `NotFound` or `StoreUnavailable`.
    pub async fn update_participant(
        &self,
        participant_id: ParticipantId,
        patch: ParticipantPatch,
    ) -> Result<Participant> {
        let participant = self
            .store
            .update_participant(participant_id, patch)
            .await?
            .ok_or(LedgerError::participant_not_found(participant_id))?;
        tracing::info!(%participant_id, "Participant updated");
        Ok(participant)
    }

    /// Participants registered for an event, newest first.
    ///
    /// # Errors
    ///
    /// `NotFound` if the event does not exist, or `StoreUnavailable`.
    pub async fn attendance(&self, event_id: EventId) -> Result<Vec<Participant>> {
        self.event(event_id).await?;
        self.participants(ParticipantQuery::for_event(event_id)).await
    }
}
