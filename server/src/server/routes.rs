//! Router configuration for roster.
//!
//! Builds the complete Axum router with all endpoints.

use super::health::{health_check, readiness_check};
use super::state::AppState;
use crate::api::{events, participants};
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the complete Axum router.
///
/// - `/health`, `/ready`
/// - `/api/events/...`
/// - `/api/participants/...`
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Events
        .route("/events", get(events::list_events).post(events::create_event))
        .route(
            "/events/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/events/:id/audit", get(events::audit_event))
        // Participants
        .route(
            "/participants",
            get(participants::list_participants).post(participants::create_participant),
        )
        .route("/participants/bulk-import", post(participants::bulk_import))
        .route("/participants/event/:event_id", get(participants::attendance))
        .route(
            "/participants/:id",
            get(participants::get_participant)
                .put(participants::update_participant)
                .delete(participants::delete_participant),
        )
        .route("/participants/:id/check-in", post(participants::check_in))
        .route(
            "/participants/:id/events/:event_id",
            post(participants::register_participant),
        );

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
