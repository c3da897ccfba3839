//! HTTP API tests against the in-memory store.
//!
//! Requests go through the full router with `tower::ServiceExt::oneshot`.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)] // Test code

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use roster_core::RetryPolicy;
use roster_server::{AppState, Backend, build_router};
use roster_testing::{InMemoryEntityStore, Operation, test_clock};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

fn app() -> (Router, InMemoryEntityStore) {
    let store = InMemoryEntityStore::new();
    let state = AppState::with_clock(
        Backend::Memory(store.clone()),
        Arc::new(test_clock()),
        RetryPolicy::immediate(3),
    );
    (build_router(state), store)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn event_body(capacity: u32) -> Value {
    json!({
        "name": "RustConf",
        "description": "Talks and workshops",
        "date": "2025-02-01T09:00:00Z",
        "location": "Montreal",
        "capacity": capacity,
        "organizer_id": Uuid::new_v4(),
    })
}

fn participant_body(n: usize) -> Value {
    json!({
        "name": format!("Participant {n}"),
        "email": format!("participant{n}@example.com"),
        "phone": format!("555-{n:04}"),
    })
}

async fn create_event(app: &Router, capacity: u32) -> String {
    let (status, event) = send(app, Method::POST, "/api/events", Some(event_body(capacity))).await;
    assert_eq!(status, StatusCode::CREATED);
    event["id"].as_str().unwrap().to_string()
}

async fn register(app: &Router, event_id: &str, n: usize) -> String {
    let mut body = participant_body(n);
    body["event_id"] = json!(event_id);
    let (status, participant) = send(app, Method::POST, "/api/participants", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    participant["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_and_readiness() {
    let (app, _) = app();

    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn test_event_crud() {
    let (app, store) = app();
    let id = create_event(&app, 50).await;

    let (status, event) = send(&app, Method::GET, &format!("/api/events/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(event["name"], "RustConf");
    assert_eq!(event["registered"], 0);
    assert_eq!(event["status"], "upcoming");

    let (status, event) = send(
        &app,
        Method::PUT,
        &format!("/api/events/{id}"),
        Some(json!({ "capacity": 80, "status": "ongoing" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(event["capacity"], 80);
    assert_eq!(event["status"], "ongoing");

    let (status, events) = send(&app, Method::GET, "/api/events?status=ongoing", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(events.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/events/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(store.event_count(), 0);

    let (status, body) = send(&app, Method::GET, &format!("/api/events/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_blank_fields_are_rejected() {
    let (app, store) = app();

    let mut body = event_body(10);
    body["name"] = json!("   ");
    let (status, error) = send(&app, Method::POST, "/api/events", Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error["code"], "VALIDATION_ERROR");

    let mut body = participant_body(1);
    body["email"] = json!("not-an-email");
    let (status, _) = send(&app, Method::POST, "/api/participants", Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(store.event_count(), 0);
    assert_eq!(store.participant_count(), 0);
}

#[tokio::test]
async fn test_zero_capacity_is_rejected() {
    let (app, store) = app();

    let (status, error) = send(&app, Method::POST, "/api/events", Some(event_body(0))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error["code"], "VALIDATION_ERROR");
    assert_eq!(store.event_count(), 0);

    let id = create_event(&app, 10).await;
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/events/{id}"),
        Some(json!({ "capacity": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, event) = send(&app, Method::GET, &format!("/api/events/{id}"), None).await;
    assert_eq!(event["capacity"], 10);
}

#[tokio::test]
async fn test_registration_updates_event_and_attendance() {
    let (app, store) = app();
    let event_id = create_event(&app, 2).await;
    let participant_id = register(&app, &event_id, 1).await;

    let (_, event) = send(&app, Method::GET, &format!("/api/events/{event_id}"), None).await;
    assert_eq!(event["registered"], 1);
    assert_eq!(event["participant_ids"], json!([participant_id]));

    let (status, list) = send(
        &app,
        Method::GET,
        &format!("/api/participants/event/{event_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list[0]["id"], json!(participant_id));
    assert_eq!(list[0]["checked_in"], false);

    let (status, audit) = send(&app, Method::GET, &format!("/api/events/{event_id}/audit"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(audit["registered"], 1);
    assert_eq!(audit["missing_back_reference"], json!([]));
    assert!(store.consistency_violations().is_empty());
}

#[tokio::test]
async fn test_registration_for_missing_event_creates_nothing() {
    let (app, store) = app();
    let mut body = participant_body(1);
    body["event_id"] = json!(Uuid::new_v4());

    let (status, _) = send(&app, Method::POST, "/api/participants", Some(body)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(store.participant_count(), 0);
}

#[tokio::test]
async fn test_register_existing_participant() {
    let (app, _) = app();
    let first = create_event(&app, 10).await;
    let second = create_event(&app, 10).await;
    let participant_id = register(&app, &first, 1).await;

    let uri = format!("/api/participants/{participant_id}/events/{second}");
    let (status, participant) = send(&app, Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(participant["event_ids"].as_array().unwrap().len(), 2);

    // Repeating is harmless
    let (status, _) = send(&app, Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, event) = send(&app, Method::GET, &format!("/api/events/{second}"), None).await;
    assert_eq!(event["registered"], 1);
}

#[tokio::test]
async fn test_check_in_twice() {
    let (app, _) = app();
    let event_id = create_event(&app, 10).await;
    let participant_id = register(&app, &event_id, 1).await;
    let uri = format!("/api/participants/{participant_id}/check-in");
    let body = json!({ "event_id": event_id });

    let (status, participant) = send(&app, Method::POST, &uri, Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(participant["checked_in"], true);
    assert!(participant["check_in_time"].is_string());

    let (status, error) = send(&app, Method::POST, &uri, Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "INVALID_STATE");
}

#[tokio::test]
async fn test_check_in_requires_registration() {
    let (app, store) = app();
    let registered_at = create_event(&app, 10).await;
    let other = create_event(&app, 10).await;
    let participant_id = register(&app, &registered_at, 1).await;

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/participants/{participant_id}/check-in"),
        Some(json!({ "event_id": other })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let id = participant_id.parse::<Uuid>().unwrap();
    assert!(!store.participant(id.into()).unwrap().checked_in);
}

#[tokio::test]
async fn test_bulk_import() {
    let (app, _) = app();
    let event_id = create_event(&app, 10).await;

    let (status, report) = send(
        &app,
        Method::POST,
        "/api/participants/bulk-import",
        Some(json!({
            "event_id": event_id,
            "participants": [participant_body(1), participant_body(2), participant_body(3)],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(report["created"].as_array().unwrap().len(), 3);
    assert_eq!(report["event"]["registered"], 3);
}

#[tokio::test]
async fn test_partial_bulk_import_reports_missing_records() {
    let (app, store) = app();
    let event_id = create_event(&app, 10).await;
    store.fail_bulk_insert_after(2);

    let (status, error) = send(
        &app,
        Method::POST,
        "/api/participants/bulk-import",
        Some(json!({
            "event_id": event_id,
            "participants": [participant_body(1), participant_body(2), participant_body(3)],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["code"], "CONSISTENCY_FAULT");
    assert_eq!(error["details"]["kind"], "partial_import");
    assert_eq!(error["details"]["not_created"], json!([2]));
    assert_eq!(error["details"]["created"].as_array().unwrap().len(), 2);

    let (_, event) = send(&app, Method::GET, &format!("/api/events/{event_id}"), None).await;
    assert_eq!(event["registered"], 2);
    assert!(store.consistency_violations().is_empty());
}

#[tokio::test]
async fn test_bulk_import_validates_every_record_first() {
    let (app, store) = app();
    let event_id = create_event(&app, 10).await;
    let mut bad = participant_body(2);
    bad["phone"] = json!("");

    let (status, error) = send(
        &app,
        Method::POST,
        "/api/participants/bulk-import",
        Some(json!({
            "event_id": event_id,
            "participants": [participant_body(1), bad],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(error["message"].as_str().unwrap().starts_with("participants[1]"));
    assert_eq!(store.participant_count(), 0);
}

#[tokio::test]
async fn test_delete_participant_deregisters_everywhere() {
    let (app, store) = app();
    let first = create_event(&app, 10).await;
    let second = create_event(&app, 10).await;
    let participant_id = register(&app, &first, 1).await;
    send(
        &app,
        Method::POST,
        &format!("/api/participants/{participant_id}/events/{second}"),
        None,
    )
    .await;

    let (status, result) = send(
        &app,
        Method::DELETE,
        &format!("/api/participants/{participant_id}"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["detached_from"].as_array().unwrap().len(), 2);
    for event_id in [first, second] {
        let (_, event) = send(&app, Method::GET, &format!("/api/events/{event_id}"), None).await;
        assert_eq!(event["registered"], 0);
        assert_eq!(event["participant_ids"], json!([]));
    }
    assert_eq!(store.participant_count(), 0);
}

#[tokio::test]
async fn test_participant_search_and_update() {
    let (app, _) = app();
    let (_, ada) = send(
        &app,
        Method::POST,
        "/api/participants",
        Some(json!({ "name": "Ada Lovelace", "email": "ada@example.com", "phone": "555-0100" })),
    )
    .await;
    send(&app, Method::POST, "/api/participants", Some(participant_body(2))).await;

    let (status, found) = send(&app, Method::GET, "/api/participants?search=LOVELACE", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["id"], ada["id"]);

    let id = ada["id"].as_str().unwrap();
    let (status, updated) = send(
        &app,
        Method::PUT,
        &format!("/api/participants/{id}"),
        Some(json!({ "email": " Ada@Analytical.org " })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["email"], "ada@analytical.org");
    assert_eq!(updated["name"], "Ada Lovelace");
}

#[tokio::test]
async fn test_store_outage_is_service_unavailable() {
    let (app, store) = app();
    let event_id = create_event(&app, 10).await;
    store.fail_next(Operation::FindEvent, 1);

    let (status, error) = send(&app, Method::GET, &format!("/api/events/{event_id}"), None).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(error["code"], "SERVICE_UNAVAILABLE");
    assert!(!error["message"].as_str().unwrap().contains("injected"));
}
