//! Rollback of half-applied registrations.
//!
//! Registration and import write the participant side first and the event side
//! second. When the second write fails, the first one is undone here, retrying
//! transient store failures. If the undo itself cannot be completed the leftovers
//! are reported as [`ConsistencyFault::OrphanedParticipants`].

use crate::error::{ConsistencyFault, LedgerError};
use crate::metrics;
use crate::retry::{RetryPolicy, retry_transient};
use crate::store::{EntityStore, StoreError};
use crate::types::{EventId, ParticipantId};

/// Delete participants that were created for `event_id` but never attached to it.
///
/// Participants that are already gone count as discarded.
pub(crate) async fn discard_unattached(
    store: &dyn EntityStore,
    policy: &RetryPolicy,
    event_id: EventId,
    participant_ids: &[ParticipantId],
) -> Result<(), LedgerError> {
    let mut leftovers = Vec::new();
    let mut last_error: Option<StoreError> = None;

    for &participant_id in participant_ids {
        match retry_transient(policy, "discard_participant", || {
            store.delete_participant(participant_id)
        })
        .await
        {
            Ok(_) => {}
            Err(error) => {
                leftovers.push(participant_id);
                last_error = Some(error);
            }
        }
    }

    finish(event_id, leftovers, last_error, participant_ids.len())
}

/// Remove a back-reference that was added to an existing participant for
/// `event_id` before attaching to the event failed.
pub(crate) async fn drop_back_reference(
    store: &dyn EntityStore,
    policy: &RetryPolicy,
    event_id: EventId,
    participant_id: ParticipantId,
) -> Result<(), LedgerError> {
    let result = retry_transient(policy, "drop_back_reference", || {
        store.remove_event_from_participant(participant_id, event_id)
    })
    .await;

    match result {
        Ok(_) => finish(event_id, Vec::new(), None, 1),
        Err(error) => finish(event_id, vec![participant_id], Some(error), 1),
    }
}

fn finish(
    event_id: EventId,
    leftovers: Vec<ParticipantId>,
    last_error: Option<StoreError>,
    attempted: usize,
) -> Result<(), LedgerError> {
    match last_error {
        None => {
            metrics::compensation(true);
            tracing::info!(%event_id, participants = attempted, "Rolled back unattached participants");
            Ok(())
        }
        Some(cause) => {
            metrics::compensation(false);
            metrics::consistency_fault("orphaned_participants");
            tracing::error!(
                %event_id,
                orphaned = leftovers.len(),
                error = %cause,
                "Rollback failed; participants reference an event that does not list them"
            );
            Err(ConsistencyFault::OrphanedParticipants {
                event_id,
                participant_ids: leftovers,
                cause,
            }
            .into())
        }
    }
}
