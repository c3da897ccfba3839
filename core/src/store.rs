//! Entity store trait and related types.
//!
//! This module defines the storage abstraction the ledger runs against: a document
//! store holding [`Event`] and [`Participant`] documents with per-document atomicity
//! and no multi-document transactions.
//!
//! # Design
//!
//! Besides plain CRUD, the trait exposes a handful of association primitives
//! (`attach_participants`, `detach_participant`, `add_event_to_participant`,
//! `remove_event_from_participant`, `mark_checked_in`). Each of them must be applied
//! atomically to a single document by the implementation:
//!
//! - an event's `participant_ids` and `registered` always move together, so the
//!   counter can never drift from the set on the same document;
//! - set additions and removals are idempotent, so an interrupted multi-document
//!   operation can simply be re-run;
//! - the counter never goes below zero and the check-in flag is only set once.
//!
//! Cross-document agreement (event ↔ participant) is the ledger's job.
//!
//! # Implementations
//!
//! - `PostgresEntityStore` (in `roster-postgres` crate): Production implementation
//! - `InMemoryEntityStore` (in `roster-testing` crate): Fast, deterministic testing
//!   with fault injection
//!
//! # Dyn Compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` instead of using `async fn` so the store can
//! be shared as `Arc<dyn EntityStore>` between request handlers.

use crate::types::{
    Event, EventId, EventPatch, EventStatus, Participant, ParticipantId, ParticipantPatch,
};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by every [`EntityStore`] method.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors that can occur during entity store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or the operation failed in transit.
    ///
    /// Transient: the same call may succeed when retried.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A document with the same identifier already exists.
    #[error("Duplicate document: {0}")]
    Duplicate(String),

    /// A stored document could not be decoded.
    #[error("Corrupt document: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Result of an ordered bulk insert.
///
/// Records are inserted in input order. On the first failure the store stops:
/// every record before `failure.index` was created, none at or after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkInsertOutcome {
    /// Documents that were committed, in input order
    pub created: Vec<Participant>,
    /// Where and why insertion stopped, if it did
    pub failure: Option<BulkInsertFailure>,
}

impl BulkInsertOutcome {
    /// Outcome for a batch where every record was created.
    #[must_use]
    pub const fn complete(created: Vec<Participant>) -> Self {
        Self {
            created,
            failure: None,
        }
    }
}

/// The record at which an ordered bulk insert stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkInsertFailure {
    /// Input position of the first record that was not created
    pub index: usize,
    /// Why it was not created
    pub error: StoreError,
}

/// Result of attaching participants to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachOutcome {
    /// The event was updated. `added` counts ids that were not already listed;
    /// `registered` grew by exactly that amount.
    Attached {
        /// Event after the update
        event: Event,
        /// Number of newly listed participants
        added: u32,
    },
    /// The event does not exist.
    EventMissing,
}

/// Result of detaching one participant from an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetachOutcome {
    /// The participant was removed from the set and `registered` decremented.
    Detached(Event),
    /// The participant was not listed; nothing changed.
    NotAttached(Event),
    /// The participant is listed but `registered` is already zero; nothing changed.
    CounterUnderflow(Event),
    /// The event does not exist.
    EventMissing,
}

/// Result of the conditional check-in update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckInOutcome {
    /// The participant was not checked in and now is.
    Applied(Participant),
    /// The participant was already checked in; nothing changed.
    AlreadyCheckedIn(Participant),
    /// The participant does not exist.
    Missing,
}

/// Filter for listing events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    /// Only events with this status
    pub status: Option<EventStatus>,
    /// Only events on or after this instant
    pub from: Option<DateTime<Utc>>,
    /// Only events on or before this instant
    pub to: Option<DateTime<Utc>>,
}

impl EventQuery {
    /// Whether an event passes this filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        self.status.is_none_or(|s| s == event.status)
            && self.from.is_none_or(|from| event.date >= from)
            && self.to.is_none_or(|to| event.date <= to)
    }
}

/// Filter for listing participants. All given criteria must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticipantQuery {
    /// Only participants registered for this event
    pub event_id: Option<EventId>,
    /// Only participants with one of these ids
    pub ids: Option<Vec<ParticipantId>>,
    /// Case-insensitive substring of name, email or phone
    pub search: Option<String>,
}

impl ParticipantQuery {
    /// Participants registered for one event.
    #[must_use]
    pub fn for_event(event_id: EventId) -> Self {
        Self {
            event_id: Some(event_id),
            ..Self::default()
        }
    }

    /// Participants with the given ids.
    #[must_use]
    pub fn with_ids(ids: Vec<ParticipantId>) -> Self {
        Self {
            ids: Some(ids),
            ..Self::default()
        }
    }

    /// Whether a participant passes this filter.
    #[must_use]
    pub fn matches(&self, participant: &Participant) -> bool {
        if let Some(event_id) = &self.event_id {
            if !participant.is_registered_for(event_id) {
                return false;
            }
        }
        if let Some(ids) = &self.ids {
            if !ids.contains(&participant.id) {
                return false;
            }
        }
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            return participant.name.to_lowercase().contains(&term)
                || participant.email.to_lowercase().contains(&term)
                || participant.phone.to_lowercase().contains(&term);
        }
        true
    }
}

/// Document store for events and participants.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to be shared across request tasks.
///
/// # Atomicity
///
/// Every method touches at most one document atomically, except
/// [`bulk_insert_participants`](Self::bulk_insert_participants), which is ordered
/// and reports exactly how far it got.
pub trait EntityStore: Send + Sync {
    /// Load an event by id. Missing events are `Ok(None)`.
    fn find_event(&self, id: EventId) -> StoreFuture<'_, Option<Event>>;

    /// List events matching the filter, ordered by date (earliest first).
    fn find_events(&self, query: EventQuery) -> StoreFuture<'_, Vec<Event>>;

    /// Insert a new event document.
    ///
    /// # Errors
    ///
    /// - `Duplicate`: an event with the same id exists
    /// - `Unavailable`: the store failed
    fn create_event(&self, event: Event) -> StoreFuture<'_, Event>;

    /// Apply a field patch to an event. Missing events are `Ok(None)`.
    fn update_event(&self, id: EventId, patch: EventPatch) -> StoreFuture<'_, Option<Event>>;

    /// Delete an event. Returns `false` if it did not exist.
    fn delete_event(&self, id: EventId) -> StoreFuture<'_, bool>;

    /// Load a participant by id. Missing participants are `Ok(None)`.
    fn find_participant(&self, id: ParticipantId) -> StoreFuture<'_, Option<Participant>>;

    /// List participants matching the filter, newest first.
    fn find_participants(&self, query: ParticipantQuery) -> StoreFuture<'_, Vec<Participant>>;

    /// Insert a new participant document.
    ///
    /// # Errors
    ///
    /// - `Duplicate`: a participant with the same id exists
    /// - `Unavailable`: the store failed
    fn create_participant(&self, participant: Participant) -> StoreFuture<'_, Participant>;

    /// Insert many participant documents in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// An `Err` means the store could not say what was committed; callers must
    /// confirm by id before assuming anything.
    fn bulk_insert_participants(
        &self,
        participants: Vec<Participant>,
    ) -> StoreFuture<'_, BulkInsertOutcome>;

    /// Apply a contact-field patch. Missing participants are `Ok(None)`.
    fn update_participant(
        &self,
        id: ParticipantId,
        patch: ParticipantPatch,
    ) -> StoreFuture<'_, Option<Participant>>;

    /// Delete a participant. Returns `false` if it did not exist.
    fn delete_participant(&self, id: ParticipantId) -> StoreFuture<'_, bool>;

    /// Add participant ids to an event's set and raise `registered` by the number
    /// of ids that were not already listed, in one atomic update.
    fn attach_participants(
        &self,
        event_id: EventId,
        participant_ids: Vec<ParticipantId>,
    ) -> StoreFuture<'_, AttachOutcome>;

    /// Remove one participant id from an event's set and lower `registered` by one,
    /// in one atomic update, refusing to go below zero.
    fn detach_participant(
        &self,
        event_id: EventId,
        participant_id: ParticipantId,
    ) -> StoreFuture<'_, DetachOutcome>;

    /// Add an event id to a participant's set (idempotent).
    /// Missing participants are `Ok(None)`.
    fn add_event_to_participant(
        &self,
        participant_id: ParticipantId,
        event_id: EventId,
    ) -> StoreFuture<'_, Option<Participant>>;

    /// Remove an event id from a participant's set (idempotent).
    /// Missing participants are `Ok(None)`.
    fn remove_event_from_participant(
        &self,
        participant_id: ParticipantId,
        event_id: EventId,
    ) -> StoreFuture<'_, Option<Participant>>;

    /// Set `checked_in` and `check_in_time`, only if the participant is not
    /// checked in yet.
    fn mark_checked_in(
        &self,
        participant_id: ParticipantId,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, CheckInOutcome>;
}
