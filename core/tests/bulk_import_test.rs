//! Bulk import tests against the in-memory store.
//!
//! Run with: `cargo test -p roster-core --test bulk_import_test`

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)] // Test code can use unwrap/expect

use roster_core::{ConsistencyFault, EventId, LedgerError, RetryPolicy, StoreError};
use roster_testing::{Operation, TestRoster, fixtures};
use std::collections::BTreeSet;

/// Test 1: A clean import creates and attaches every record.
#[tokio::test]
async fn test_import_creates_and_attaches_all_records() {
    let roster = TestRoster::new();
    let event = roster.catalog.create_event(fixtures::new_event(10)).await.unwrap();

    let report = roster
        .import
        .import(event.id, fixtures::new_participants(3))
        .await
        .unwrap();

    assert_eq!(report.created.len(), 3);
    assert_eq!(report.event.registered, 3);
    assert_eq!(report.created[0].email, "participant0@example.com");
    for participant in &report.created {
        assert!(report.event.has_participant(&participant.id));
        assert!(participant.is_registered_for(&event.id));
    }
    assert_eq!(roster.store.calls(Operation::Attach), 1);
    assert!(roster.store.consistency_violations().is_empty());
}

/// Test 2: Importing into a missing event inserts nothing.
#[tokio::test]
async fn test_import_into_missing_event_inserts_nothing() {
    let roster = TestRoster::new();
    let missing = EventId::new();

    let error = roster
        .import
        .import(missing, fixtures::new_participants(2))
        .await
        .unwrap_err();

    assert_eq!(error, LedgerError::event_not_found(missing));
    assert_eq!(roster.store.calls(Operation::BulkInsert), 0);
    assert_eq!(roster.store.participant_count(), 0);
}

/// Test 3: An empty import is a no-op.
#[tokio::test]
async fn test_empty_import_touches_nothing() {
    let roster = TestRoster::new();
    let event = roster.catalog.create_event(fixtures::new_event(10)).await.unwrap();

    let report = roster.import.import(event.id, Vec::new()).await.unwrap();

    assert!(report.created.is_empty());
    assert_eq!(report.event, event);
    assert_eq!(roster.store.calls(Operation::BulkInsert), 0);
}

/// Test 4: Store fails after two of three records.
///
/// # Flow
///
/// 1. Bulk insert stops at index 2
/// 2. The two created participants are attached
/// 3. The fault names the created ids and position 2
#[tokio::test]
async fn test_partial_import_attaches_created_subset() {
    let roster = TestRoster::new();
    let event = roster.catalog.create_event(fixtures::new_event(10)).await.unwrap();
    roster.store.fail_bulk_insert_after(2);

    let error = roster
        .import
        .import(event.id, fixtures::new_participants(3))
        .await
        .unwrap_err();

    let (created, not_created) = match error {
        LedgerError::ConsistencyFault(ConsistencyFault::PartialImport {
            event_id,
            created,
            not_created,
            ..
        }) => {
            assert_eq!(event_id, event.id);
            (created, not_created)
        }
        other => panic!("expected PartialImport, got {other:?}"),
    };
    assert_eq!(created.len(), 2);
    assert_eq!(not_created, vec![2]);

    let event = roster.store.event(event.id).unwrap();
    assert_eq!(event.registered, 2);
    assert_eq!(
        event.participant_ids,
        created.iter().copied().collect::<BTreeSet<_>>()
    );
    assert_eq!(roster.store.participant_count(), 2);
    assert!(roster.store.consistency_violations().is_empty());
}

/// Test 5: A lost acknowledgement is resolved by looking the ids up.
#[tokio::test]
async fn test_lost_ack_confirms_committed_records() {
    let roster = TestRoster::new();
    let event = roster.catalog.create_event(fixtures::new_event(10)).await.unwrap();
    roster.store.lose_bulk_insert_ack(1);

    let error = roster
        .import
        .import(event.id, fixtures::new_participants(3))
        .await
        .unwrap_err();

    match error {
        LedgerError::ConsistencyFault(ConsistencyFault::PartialImport {
            created,
            not_created,
            ..
        }) => {
            assert_eq!(created.len(), 1);
            assert_eq!(not_created, vec![1, 2]);
        }
        other => panic!("expected PartialImport, got {other:?}"),
    }
    assert_eq!(roster.store.event(event.id).unwrap().registered, 1);
    assert!(roster.store.consistency_violations().is_empty());
}

/// Test 6: A lost acknowledgement after everything committed is a success.
#[tokio::test]
async fn test_lost_ack_with_everything_committed_succeeds() {
    let roster = TestRoster::new();
    let event = roster.catalog.create_event(fixtures::new_event(10)).await.unwrap();
    roster.store.lose_bulk_insert_ack(3);

    let report = roster
        .import
        .import(event.id, fixtures::new_participants(3))
        .await
        .unwrap();

    assert_eq!(report.created.len(), 3);
    assert_eq!(report.event.registered, 3);
    assert!(roster.store.consistency_violations().is_empty());
}

/// Test 7: Total failure leaves the event untouched.
#[tokio::test]
async fn test_total_failure_leaves_event_untouched() {
    let roster = TestRoster::new();
    let event = roster.catalog.create_event(fixtures::new_event(10)).await.unwrap();
    roster.store.lose_bulk_insert_ack(0);

    let error = roster
        .import
        .import(event.id, fixtures::new_participants(3))
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        LedgerError::StoreUnavailable(StoreError::Unavailable(_))
    ));
    assert_eq!(roster.store.event(event.id).unwrap(), event);
    assert_eq!(roster.store.calls(Operation::Attach), 0);
}

/// Test 8: An unconfirmable failure is surfaced and nothing is attached.
#[tokio::test]
async fn test_unconfirmable_failure_attaches_nothing() {
    let roster = TestRoster::new();
    let event = roster.catalog.create_event(fixtures::new_event(10)).await.unwrap();
    roster.store.lose_bulk_insert_ack(2);
    roster.store.fail_next(Operation::FindParticipants, 1);

    let error = roster
        .import
        .import(event.id, fixtures::new_participants(3))
        .await
        .unwrap_err();

    match error {
        LedgerError::ConsistencyFault(ConsistencyFault::UnconfirmedImport {
            event_id,
            attempted,
            ..
        }) => {
            assert_eq!(event_id, event.id);
            assert_eq!(attempted.len(), 3);
        }
        other => panic!("expected UnconfirmedImport, got {other:?}"),
    }
    assert_eq!(roster.store.event(event.id).unwrap().registered, 0);
    assert_eq!(roster.store.calls(Operation::Attach), 0);
}

/// Test 9: A failed attach deletes the created participants again.
#[tokio::test]
async fn test_failed_attach_discards_created_participants() {
    let roster = TestRoster::new();
    let event = roster.catalog.create_event(fixtures::new_event(10)).await.unwrap();
    roster.store.fail_next(Operation::Attach, 1);

    let error = roster
        .import
        .import(event.id, fixtures::new_participants(3))
        .await
        .unwrap_err();

    assert!(matches!(error, LedgerError::StoreUnavailable(_)));
    assert_eq!(roster.store.participant_count(), 0);
    assert_eq!(roster.store.event(event.id).unwrap().registered, 0);
}

/// Test 10: When discarding fails too, the leftovers are listed.
#[tokio::test]
async fn test_failed_discard_lists_orphans() {
    let roster = TestRoster::with_retry(RetryPolicy::none());
    let event = roster.catalog.create_event(fixtures::new_event(10)).await.unwrap();
    roster.store.fail_next(Operation::Attach, 1);
    roster.store.fail_next(Operation::DeleteParticipant, 1);

    let error = roster
        .import
        .import(event.id, fixtures::new_participants(3))
        .await
        .unwrap_err();

    match error {
        LedgerError::ConsistencyFault(ConsistencyFault::OrphanedParticipants {
            participant_ids,
            ..
        }) => assert_eq!(participant_ids.len(), 1),
        other => panic!("expected OrphanedParticipants, got {other:?}"),
    }
    assert_eq!(roster.store.participant_count(), 1);
}

/// Test 11: Imports beyond capacity are accepted.
#[tokio::test]
async fn test_import_beyond_capacity_is_accepted() {
    let roster = TestRoster::new();
    let event = roster.catalog.create_event(fixtures::new_event(1)).await.unwrap();

    let report = roster
        .import
        .import(event.id, fixtures::new_participants(4))
        .await
        .unwrap();

    assert_eq!(report.event.registered, 4);
    assert!(report.event.is_over_capacity());
}
