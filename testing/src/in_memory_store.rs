//! In-memory entity store with fault injection.
//!
//! Behaves like a document store with per-document atomicity: every method locks
//! the whole state once, so each call is atomic, and nothing spans calls.
//!
//! Faults are scripted per [`Operation`]:
//!
//! - [`InMemoryEntityStore::fail_next`]: the next `n` calls of an operation return
//!   `StoreError::Unavailable` without touching state
//! - [`InMemoryEntityStore::fail_bulk_insert_after`]: the next bulk insert stops
//!   after `n` records and reports where it stopped
//! - [`InMemoryEntityStore::lose_bulk_insert_ack`]: the next bulk insert commits
//!   `n` records and then returns `Err`, as if the acknowledgement was lost
//! - [`InMemoryEntityStore::lose_next_ack`]: the next `n` calls of a
//!   participant write commit and then return `StoreError::Unavailable`

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Only poisoned locks panic

use chrono::{DateTime, Utc};
use roster_core::store::{
    AttachOutcome, BulkInsertFailure, BulkInsertOutcome, CheckInOutcome, DetachOutcome,
    EntityStore, EventQuery, ParticipantQuery, StoreError, StoreFuture,
};
use roster_core::types::{
    Event, EventId, EventPatch, Participant, ParticipantId, ParticipantPatch,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Store operations that faults can be scripted for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `find_event`
    FindEvent,
    /// `find_events`
    FindEvents,
    /// `create_event`
    CreateEvent,
    /// `update_event`
    UpdateEvent,
    /// `delete_event`
    DeleteEvent,
    /// `find_participant`
    FindParticipant,
    /// `find_participants`
    FindParticipants,
    /// `create_participant`
    CreateParticipant,
    /// `bulk_insert_participants`
    BulkInsert,
    /// `update_participant`
    UpdateParticipant,
    /// `delete_participant`
    DeleteParticipant,
    /// `attach_participants`
    Attach,
    /// `detach_participant`
    Detach,
    /// `add_event_to_participant`
    AddEventToParticipant,
    /// `remove_event_from_participant`
    RemoveEventFromParticipant,
    /// `mark_checked_in`
    MarkCheckedIn,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Default)]
struct Documents {
    events: HashMap<EventId, Event>,
    participants: HashMap<ParticipantId, Participant>,
}

#[derive(Debug, Default)]
struct Faults {
    failing: HashMap<Operation, usize>,
    calls: HashMap<Operation, usize>,
    bulk_stop_after: Option<usize>,
    bulk_lost_ack_after: Option<usize>,
    lost_acks: HashMap<Operation, usize>,
}

/// In-memory [`EntityStore`] for fast, deterministic tests.
///
/// # Example
///
/// ```
/// use roster_testing::{InMemoryEntityStore, Operation};
/// use roster_core::store::EntityStore;
/// use roster_core::types::EventId;
///
/// # async fn example() {
/// let store = InMemoryEntityStore::new();
/// store.fail_next(Operation::FindEvent, 1);
///
/// assert!(store.find_event(EventId::new()).await.is_err());
/// assert!(store.find_event(EventId::new()).await.unwrap().is_none());
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryEntityStore {
    documents: Arc<Mutex<Documents>>,
    faults: Arc<Mutex<Faults>>,
}

impl InMemoryEntityStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `times` calls of `operation` fail with `StoreError::Unavailable`.
    pub fn fail_next(&self, operation: Operation, times: usize) {
        let mut faults = self.faults.lock().unwrap();
        *faults.failing.entry(operation).or_default() += times;
    }

    /// Make the next bulk insert stop after `created` records.
    pub fn fail_bulk_insert_after(&self, created: usize) {
        self.faults.lock().unwrap().bulk_stop_after = Some(created);
    }

    /// Make the next bulk insert commit `committed` records, then return `Err`.
    pub fn lose_bulk_insert_ack(&self, committed: usize) {
        self.faults.lock().unwrap().bulk_lost_ack_after = Some(committed);
    }

    /// Make the next `times` calls of `operation` apply their write, then fail
    /// with `StoreError::Unavailable`.
    ///
    /// Honored by `create_participant` and `add_event_to_participant`.
    pub fn lose_next_ack(&self, operation: Operation, times: usize) {
        let mut faults = self.faults.lock().unwrap();
        *faults.lost_acks.entry(operation).or_default() += times;
    }

    /// Remove every scripted fault.
    pub fn clear_faults(&self) {
        let mut faults = self.faults.lock().unwrap();
        faults.failing.clear();
        faults.lost_acks.clear();
        faults.bulk_stop_after = None;
        faults.bulk_lost_ack_after = None;
    }

    /// How many times `operation` was called, including failed calls.
    #[must_use]
    pub fn calls(&self, operation: Operation) -> usize {
        self.faults
            .lock()
            .unwrap()
            .calls
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    /// Insert or replace an event document as-is, bypassing every rule.
    ///
    /// Useful for seeding drifted state.
    pub fn put_event(&self, event: Event) {
        self.documents.lock().unwrap().events.insert(event.id, event);
    }

    /// Insert or replace a participant document as-is, bypassing every rule.
    pub fn put_participant(&self, participant: Participant) {
        self.documents
            .lock()
            .unwrap()
            .participants
            .insert(participant.id, participant);
    }

    /// Current state of an event.
    #[must_use]
    pub fn event(&self, id: EventId) -> Option<Event> {
        self.documents.lock().unwrap().events.get(&id).cloned()
    }

    /// Current state of a participant.
    #[must_use]
    pub fn participant(&self, id: ParticipantId) -> Option<Participant> {
        self.documents.lock().unwrap().participants.get(&id).cloned()
    }

    /// Number of event documents.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.documents.lock().unwrap().events.len()
    }

    /// Number of participant documents.
    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.documents.lock().unwrap().participants.len()
    }

    /// Every disagreement between counters, participant sets and back-references.
    ///
    /// Back-references to deleted events are not reported; they are tolerated.
    #[must_use]
    pub fn consistency_violations(&self) -> Vec<String> {
        let documents = self.documents.lock().unwrap();
        let mut violations = Vec::new();

        for event in documents.events.values() {
            if !event.counter_matches_set() {
                violations.push(format!(
                    "event {} has registered={} but lists {} participant(s)",
                    event.id,
                    event.registered,
                    event.participant_ids.len()
                ));
            }
            for participant_id in &event.participant_ids {
                match documents.participants.get(participant_id) {
                    None => violations.push(format!(
                        "event {} lists missing participant {participant_id}",
                        event.id
                    )),
                    Some(p) if !p.is_registered_for(&event.id) => violations.push(format!(
                        "event {} lists participant {participant_id} without back-reference",
                        event.id
                    )),
                    Some(_) => {}
                }
            }
        }

        for participant in documents.participants.values() {
            for event_id in &participant.event_ids {
                if let Some(event) = documents.events.get(event_id) {
                    if !event.has_participant(&participant.id) {
                        violations.push(format!(
                            "participant {} points at event {event_id} which does not list it",
                            participant.id
                        ));
                    }
                }
            }
        }

        violations.sort();
        violations
    }

    fn enter(&self, operation: Operation) -> Result<MutexGuard<'_, Documents>, StoreError> {
        {
            let mut faults = self.faults.lock().map_err(|_| poisoned())?;
            *faults.calls.entry(operation).or_default() += 1;
            if let Some(remaining) = faults.failing.get_mut(&operation) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(StoreError::Unavailable(format!(
                        "injected failure: {operation}"
                    )));
                }
            }
        }
        self.documents.lock().map_err(|_| poisoned())
    }

    fn acknowledge<T>(&self, operation: Operation, value: T) -> Result<T, StoreError> {
        let mut faults = self.faults.lock().map_err(|_| poisoned())?;
        if let Some(remaining) = faults.lost_acks.get_mut(&operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Unavailable(format!(
                    "injected failure: {operation} acknowledgement lost"
                )));
            }
        }
        Ok(value)
    }

    fn take_bulk_faults(&self) -> Result<(Option<usize>, Option<usize>), StoreError> {
        let mut faults = self.faults.lock().map_err(|_| poisoned())?;
        Ok((faults.bulk_stop_after.take(), faults.bulk_lost_ack_after.take()))
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("store lock poisoned".to_string())
}

impl EntityStore for InMemoryEntityStore {
    fn find_event(&self, id: EventId) -> StoreFuture<'_, Option<Event>> {
        Box::pin(async move {
            let documents = self.enter(Operation::FindEvent)?;
            Ok(documents.events.get(&id).cloned())
        })
    }

    fn find_events(&self, query: EventQuery) -> StoreFuture<'_, Vec<Event>> {
        Box::pin(async move {
            let documents = self.enter(Operation::FindEvents)?;
            let mut events: Vec<Event> = documents
                .events
                .values()
                .filter(|e| query.matches(e))
                .cloned()
                .collect();
            events.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
            Ok(events)
        })
    }

    fn create_event(&self, event: Event) -> StoreFuture<'_, Event> {
        Box::pin(async move {
            let mut documents = self.enter(Operation::CreateEvent)?;
            if documents.events.contains_key(&event.id) {
                return Err(StoreError::Duplicate(format!("event {}", event.id)));
            }
            documents.events.insert(event.id, event.clone());
            Ok(event)
        })
    }

    fn update_event(&self, id: EventId, patch: EventPatch) -> StoreFuture<'_, Option<Event>> {
        Box::pin(async move {
            let mut documents = self.enter(Operation::UpdateEvent)?;
            Ok(documents.events.get_mut(&id).map(|event| {
                event.apply(patch);
                event.clone()
            }))
        })
    }

    fn delete_event(&self, id: EventId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let mut documents = self.enter(Operation::DeleteEvent)?;
            Ok(documents.events.remove(&id).is_some())
        })
    }

    fn find_participant(&self, id: ParticipantId) -> StoreFuture<'_, Option<Participant>> {
        Box::pin(async move {
            let documents = self.enter(Operation::FindParticipant)?;
            Ok(documents.participants.get(&id).cloned())
        })
    }

    fn find_participants(&self, query: ParticipantQuery) -> StoreFuture<'_, Vec<Participant>> {
        Box::pin(async move {
            let documents = self.enter(Operation::FindParticipants)?;
            let mut participants: Vec<Participant> = documents
                .participants
                .values()
                .filter(|p| query.matches(p))
                .cloned()
                .collect();
            participants.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
            Ok(participants)
        })
    }

    fn create_participant(&self, participant: Participant) -> StoreFuture<'_, Participant> {
        Box::pin(async move {
            let mut documents = self.enter(Operation::CreateParticipant)?;
            if documents.participants.contains_key(&participant.id) {
                return Err(StoreError::Duplicate(format!("participant {}", participant.id)));
            }
            documents
                .participants
                .insert(participant.id, participant.clone());
            drop(documents);
            self.acknowledge(Operation::CreateParticipant, participant)
        })
    }

    fn bulk_insert_participants(
        &self,
        participants: Vec<Participant>,
    ) -> StoreFuture<'_, BulkInsertOutcome> {
        Box::pin(async move {
            let mut documents = self.enter(Operation::BulkInsert)?;
            let (stop_after, lost_ack_after) = self.take_bulk_faults()?;
            let mut created = Vec::new();

            for (index, participant) in participants.into_iter().enumerate() {
                if lost_ack_after == Some(index) {
                    return Err(StoreError::Unavailable(
                        "injected failure: bulk insert acknowledgement lost".to_string(),
                    ));
                }
                if stop_after == Some(index) {
                    return Ok(BulkInsertOutcome {
                        created,
                        failure: Some(BulkInsertFailure {
                            index,
                            error: StoreError::Unavailable(
                                "injected failure: bulk insert interrupted".to_string(),
                            ),
                        }),
                    });
                }
                if documents.participants.contains_key(&participant.id) {
                    return Ok(BulkInsertOutcome {
                        created,
                        failure: Some(BulkInsertFailure {
                            index,
                            error: StoreError::Duplicate(format!("participant {}", participant.id)),
                        }),
                    });
                }
                documents
                    .participants
                    .insert(participant.id, participant.clone());
                created.push(participant);
            }

            if lost_ack_after.is_some() {
                return Err(StoreError::Unavailable(
                    "injected failure: bulk insert acknowledgement lost".to_string(),
                ));
            }
            Ok(BulkInsertOutcome::complete(created))
        })
    }

    fn update_participant(
        &self,
        id: ParticipantId,
        patch: ParticipantPatch,
    ) -> StoreFuture<'_, Option<Participant>> {
        Box::pin(async move {
            let mut documents = self.enter(Operation::UpdateParticipant)?;
            Ok(documents.participants.get_mut(&id).map(|participant| {
                participant.apply(patch);
                participant.clone()
            }))
        })
    }

    fn delete_participant(&self, id: ParticipantId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let mut documents = self.enter(Operation::DeleteParticipant)?;
            Ok(documents.participants.remove(&id).is_some())
        })
    }

    fn attach_participants(
        &self,
        event_id: EventId,
        participant_ids: Vec<ParticipantId>,
    ) -> StoreFuture<'_, AttachOutcome> {
        Box::pin(async move {
            let mut documents = self.enter(Operation::Attach)?;
            let Some(event) = documents.events.get_mut(&event_id) else {
                return Ok(AttachOutcome::EventMissing);
            };
            let mut added: u32 = 0;
            for participant_id in participant_ids {
                if event.participant_ids.insert(participant_id) {
                    added = added.saturating_add(1);
                }
            }
            event.registered = event.registered.saturating_add(added);
            Ok(AttachOutcome::Attached {
                event: event.clone(),
                added,
            })
        })
    }

    fn detach_participant(
        &self,
        event_id: EventId,
        participant_id: ParticipantId,
    ) -> StoreFuture<'_, DetachOutcome> {
        Box::pin(async move {
            let mut documents = self.enter(Operation::Detach)?;
            let Some(event) = documents.events.get_mut(&event_id) else {
                return Ok(DetachOutcome::EventMissing);
            };
            if !event.has_participant(&participant_id) {
                return Ok(DetachOutcome::NotAttached(event.clone()));
            }
            if event.registered == 0 {
                return Ok(DetachOutcome::CounterUnderflow(event.clone()));
            }
            event.participant_ids.remove(&participant_id);
            event.registered -= 1;
            Ok(DetachOutcome::Detached(event.clone()))
        })
    }

    fn add_event_to_participant(
        &self,
        participant_id: ParticipantId,
        event_id: EventId,
    ) -> StoreFuture<'_, Option<Participant>> {
        Box::pin(async move {
            let mut documents = self.enter(Operation::AddEventToParticipant)?;
            let updated = documents.participants.get_mut(&participant_id).map(|p| {
                p.event_ids.insert(event_id);
                p.clone()
            });
            drop(documents);
            self.acknowledge(Operation::AddEventToParticipant, updated)
        })
    }

    fn remove_event_from_participant(
        &self,
        participant_id: ParticipantId,
        event_id: EventId,
    ) -> StoreFuture<'_, Option<Participant>> {
        Box::pin(async move {
            let mut documents = self.enter(Operation::RemoveEventFromParticipant)?;
            Ok(documents.participants.get_mut(&participant_id).map(|p| {
                p.event_ids.remove(&event_id);
                p.clone()
            }))
        })
    }

    fn mark_checked_in(
        &self,
        participant_id: ParticipantId,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, CheckInOutcome> {
        Box::pin(async move {
            let mut documents = self.enter(Operation::MarkCheckedIn)?;
            let Some(participant) = documents.participants.get_mut(&participant_id) else {
                return Ok(CheckInOutcome::Missing);
            };
            if participant.checked_in {
                return Ok(CheckInOutcome::AlreadyCheckedIn(participant.clone()));
            }
            participant.checked_in = true;
            participant.check_in_time = Some(at);
            Ok(CheckInOutcome::Applied(participant.clone()))
        })
    }
}
