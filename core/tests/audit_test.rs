//! Consistency audit and catalog tests.
//!
//! Run with: `cargo test -p roster-core --test audit_test`

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use roster_core::{
    EventPatch, EventQuery, EventStatus, LedgerError, ParticipantId, ParticipantPatch,
    ParticipantQuery,
};
use roster_testing::{TestRoster, fixtures};

/// Test 1: Ledger-maintained events audit clean.
#[tokio::test]
async fn test_audit_clean_event() {
    let roster = TestRoster::new();
    let event = roster.catalog.create_event(fixtures::new_event(10)).await.unwrap();
    roster
        .import
        .import(event.id, fixtures::new_participants(3))
        .await
        .unwrap();

    let audit = roster.auditor.audit_event(event.id).await.unwrap();

    assert!(audit.is_consistent());
    assert_eq!(audit.registered, 3);
    assert_eq!(audit.listed, 3);
    assert_eq!(audit.counter_drift(), 0);
}

/// Test 2: Every kind of disagreement is reported, nothing is repaired.
///
/// # Flow
///
/// 1. Counter bumped without a set change
/// 2. A listed participant lost its back-reference
/// 3. A listed id has no participant
/// 4. A participant points at the event without being listed
#[tokio::test]
async fn test_audit_reports_every_disagreement() {
    let roster = TestRoster::new();
    let event = roster.catalog.create_event(fixtures::new_event(10)).await.unwrap();
    let listed = roster
        .ledger
        .register_new(event.id, fixtures::new_participant(1))
        .await
        .unwrap();
    let unlisted = roster
        .catalog
        .create_participant(fixtures::new_participant(2))
        .await
        .unwrap();
    let ghost = ParticipantId::new();

    let mut drifted = roster.store.event(event.id).unwrap();
    drifted.participant_ids.insert(ghost);
    drifted.registered = 5;
    roster.store.put_event(drifted.clone());

    let mut without_back_reference = listed.clone();
    without_back_reference.event_ids.clear();
    roster.store.put_participant(without_back_reference);

    let mut pointing = unlisted.clone();
    pointing.event_ids.insert(event.id);
    roster.store.put_participant(pointing);

    let audit = roster.auditor.audit_event(event.id).await.unwrap();

    assert!(!audit.is_consistent());
    assert_eq!(audit.counter_drift(), 3);
    assert_eq!(audit.missing_back_reference, vec![listed.id]);
    assert_eq!(audit.dangling, vec![ghost]);
    assert_eq!(audit.unlisted, vec![unlisted.id]);
    assert_eq!(roster.store.event(event.id).unwrap(), drifted);
}

/// Test 3: Auditing a missing event is `NotFound`.
#[tokio::test]
async fn test_audit_missing_event() {
    let roster = TestRoster::new();
    let missing = roster_core::EventId::new();

    let error = roster.auditor.audit_event(missing).await.unwrap_err();

    assert_eq!(error, LedgerError::event_not_found(missing));
}

/// Test 4: Field updates never touch associations.
#[tokio::test]
async fn test_updates_keep_associations() {
    let roster = TestRoster::new();
    let event = roster.catalog.create_event(fixtures::new_event(10)).await.unwrap();
    let participant = roster
        .ledger
        .register_new(event.id, fixtures::new_participant(1))
        .await
        .unwrap();

    let event = roster
        .catalog
        .update_event(
            event.id,
            EventPatch {
                capacity: Some(1),
                status: Some(EventStatus::Ongoing),
                ..EventPatch::default()
            },
        )
        .await
        .unwrap();
    let participant = roster
        .catalog
        .update_participant(
            participant.id,
            ParticipantPatch {
                email: Some(" NEW@Example.com ".to_string()),
                ..ParticipantPatch::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(event.status, EventStatus::Ongoing);
    assert_eq!(event.registered, 1);
    assert!(event.has_participant(&participant.id));
    assert_eq!(participant.email, "new@example.com");
    assert!(participant.is_registered_for(&event.id));
}

/// Test 5: Listing filters by status and search; attendance needs the event.
#[tokio::test]
async fn test_listing_and_attendance() {
    let roster = TestRoster::new();
    let upcoming = roster.catalog.create_event(fixtures::new_event(10)).await.unwrap();
    let mut cancelled = fixtures::new_event(10);
    cancelled.status = Some(EventStatus::Cancelled);
    roster.catalog.create_event(cancelled).await.unwrap();

    let events = roster
        .catalog
        .events(EventQuery {
            status: Some(EventStatus::Upcoming),
            ..EventQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(events, vec![upcoming.clone()]);

    roster
        .import
        .import(upcoming.id, fixtures::new_participants(3))
        .await
        .unwrap();
    roster
        .catalog
        .create_participant(fixtures::new_participant(7))
        .await
        .unwrap();

    let attendance = roster.catalog.attendance(upcoming.id).await.unwrap();
    assert_eq!(attendance.len(), 3);

    let found = roster
        .catalog
        .participants(ParticipantQuery {
            search: Some("PARTICIPANT7".to_string()),
            ..ParticipantQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert!(found[0].event_ids.is_empty());

    let missing = roster_core::EventId::new();
    assert_eq!(
        roster.catalog.attendance(missing).await.unwrap_err(),
        LedgerError::event_not_found(missing)
    );
}
