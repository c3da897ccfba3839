//! Bulk import of participants into one event.
//!
//! ```text
//! 0. event must exist                     → NotFound, nothing inserted
//! 1. bulk insert (ordered, ids pre-assigned, eventIds = {event})
//!      Err  → confirm by id which documents exist
//! 2. attach the created subset to the event (one update)
//!      fails → delete the created participants again
//! 3. all created → Ok(report); some created → PartialImport fault
//! ```
//!
//! Step 1 and step 2 touch different collections with no shared transaction. The
//! service never guesses across that gap: it attaches only what the store
//! confirmed, and when nothing can be confirmed it attaches nothing and says so.

use crate::compensation;
use crate::environment::Clock;
use crate::error::{ConsistencyFault, LedgerError, Result};
use crate::metrics;
use crate::retry::RetryPolicy;
use crate::store::{
    AttachOutcome, BulkInsertFailure, BulkInsertOutcome, EntityStore, ParticipantQuery, StoreError,
};
use crate::types::{Event, EventId, NewParticipant, Participant, ParticipantId};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Result of a fully successful import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// The event after the import
    pub event: Event,
    /// Created participants, in input order
    pub created: Vec<Participant>,
}

/// Creates many participants for one event and reconciles the event afterwards.
#[derive(Clone)]
pub struct BulkImportService {
    store: Arc<dyn EntityStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl BulkImportService {
    /// Create an import service over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>, clock: Arc<dyn Clock>, retry: RetryPolicy) -> Self {
        Self {
            store,
            clock,
            retry,
        }
    }

    /// Import `records` as new participants registered for `event_id`.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the event does not exist (nothing inserted), or vanished
    ///   before the created participants could be attached (they are removed again)
    /// - `StoreUnavailable`: nothing was created, or the attach failed and the
    ///   created participants were removed again
    /// - `ConsistencyFault::PartialImport`: some records were created and attached,
    ///   the rest were not; the fault lists both
    /// - `ConsistencyFault::UnconfirmedImport`: the insert failed and the store could
    ///   not tell what was committed; nothing was attached
    /// - `ConsistencyFault::OrphanedParticipants`: the attach failed and removing
    ///   the created participants failed too
    pub async fn import(
        &self,
        event_id: EventId,
        records: Vec<NewParticipant>,
    ) -> Result<ImportReport> {
        let event = self
            .store
            .find_event(event_id)
            .await?
            .ok_or(LedgerError::event_not_found(event_id))?;

        if records.is_empty() {
            return Ok(ImportReport {
                event,
                created: Vec::new(),
            });
        }

        let now = self.clock.now();
        let participants: Vec<Participant> = records
            .into_iter()
            .map(|record| {
                Participant::from_new(ParticipantId::new(), record, BTreeSet::from([event_id]), now)
            })
            .collect();
        let attempted: Vec<ParticipantId> = participants.iter().map(|p| p.id).collect();

        tracing::info!(%event_id, records = attempted.len(), "Starting bulk import");

        let outcome = match self.store.bulk_insert_participants(participants).await {
            Ok(outcome) => outcome,
            Err(cause) => self.confirm_committed(event_id, &attempted, cause).await?,
        };

        let BulkInsertOutcome { created, failure } = outcome;
        let created_ids: Vec<ParticipantId> = created.iter().map(|p| p.id).collect();

        if created_ids.is_empty() {
            let cause = failure.map_or_else(
                || StoreError::Unavailable("bulk insert created no documents".to_string()),
                |f| f.error,
            );
            tracing::warn!(%event_id, error = %cause, "Bulk import created nothing; event untouched");
            return Err(cause.into());
        }

        let event = match self.store.attach_participants(event_id, created_ids.clone()).await {
            Ok(AttachOutcome::Attached { event, added }) => {
                tracing::info!(
                    %event_id,
                    added,
                    registered = event.registered,
                    capacity = event.capacity,
                    "Imported participants attached to event"
                );
                if event.is_over_capacity() {
                    tracing::warn!(%event_id, registered = event.registered, capacity = event.capacity, "Import left event beyond capacity");
                }
                event
            }
            Ok(AttachOutcome::EventMissing) => {
                tracing::warn!(%event_id, "Event vanished during bulk import");
                compensation::discard_unattached(self.store.as_ref(), &self.retry, event_id, &created_ids)
                    .await?;
                return Err(LedgerError::event_not_found(event_id));
            }
            Err(error) => {
                tracing::warn!(%event_id, error = %error, "Attach failed during bulk import");
                compensation::discard_unattached(self.store.as_ref(), &self.retry, event_id, &created_ids)
                    .await?;
                return Err(error.into());
            }
        };

        metrics::imported(created.len());

        match failure {
            None => Ok(ImportReport { event, created }),
            Some(BulkInsertFailure { error, .. }) => {
                let committed: HashSet<ParticipantId> = created_ids.iter().copied().collect();
                let not_created: Vec<usize> = attempted
                    .iter()
                    .enumerate()
                    .filter(|(_, id)| !committed.contains(id))
                    .map(|(index, _)| index)
                    .collect();

                metrics::consistency_fault("partial_import");
                tracing::error!(
                    %event_id,
                    created = created_ids.len(),
                    not_created = not_created.len(),
                    error = %error,
                    "Bulk import partially applied"
                );
                Err(ConsistencyFault::PartialImport {
                    event_id,
                    created: created_ids,
                    not_created,
                    cause: error,
                }
                .into())
            }
        }
    }

    /// After a bulk insert reported an error without saying what it committed,
    /// look the pre-assigned ids up to find out.
    async fn confirm_committed(
        &self,
        event_id: EventId,
        attempted: &[ParticipantId],
        cause: StoreError,
    ) -> Result<BulkInsertOutcome> {
        tracing::warn!(%event_id, error = %cause, "Bulk insert failed; confirming committed records");

        let found = match self
            .store
            .find_participants(ParticipantQuery::with_ids(attempted.to_vec()))
            .await
        {
            Ok(found) => found,
            Err(lookup_error) => {
                metrics::consistency_fault("unconfirmed_import");
                tracing::error!(
                    %event_id,
                    attempted = attempted.len(),
                    error = %cause,
                    lookup_error = %lookup_error,
                    "Cannot confirm which imported records were committed; nothing attached"
                );
                return Err(ConsistencyFault::UnconfirmedImport {
                    event_id,
                    attempted: attempted.to_vec(),
                    cause,
                }
                .into());
            }
        };

        let mut by_id: HashMap<ParticipantId, Participant> =
            found.into_iter().map(|p| (p.id, p)).collect();
        let created: Vec<Participant> = attempted.iter().filter_map(|id| by_id.remove(id)).collect();

        let failure = attempted
            .iter()
            .position(|id| !created.iter().any(|p| p.id == *id))
            .map(|index| BulkInsertFailure {
                index,
                error: cause,
            });

        tracing::info!(
            %event_id,
            confirmed = created.len(),
            attempted = attempted.len(),
            "Confirmed committed import records"
        );
        Ok(BulkInsertOutcome { created, failure })
    }
}
