//! Event management API endpoints.
//!
//! - POST /api/events - Create a new event
//! - GET /api/events - List events, filtered by status and date range
//! - GET /api/events/:id - Get event details
//! - PUT /api/events/:id - Update event fields
//! - DELETE /api/events/:id - Delete an event (participants are not cascaded)
//! - GET /api/events/:id/audit - Compare the event with its participants

use super::{reject_blank, require_text};
use crate::error::AppError;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use roster_core::{Event, EventAudit, EventId, EventPatch, EventQuery, EventStatus, NewEvent, OrganizerId};
use serde::Deserialize;

// ============================================================================
// Request Types
// ============================================================================

/// Request to create a new event.
#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    /// Event name
    pub name: String,
    /// Event description
    pub description: String,
    /// When the event takes place
    pub date: DateTime<Utc>,
    /// Venue
    pub location: String,
    /// Intended maximum attendance
    pub capacity: u32,
    /// Organizing user
    pub organizer_id: OrganizerId,
    /// Initial status (default: upcoming)
    #[serde(default)]
    pub status: Option<EventStatus>,
}

impl CreateEventRequest {
    fn into_new_event(self) -> Result<NewEvent, AppError> {
        require_text("name", &self.name)?;
        require_text("description", &self.description)?;
        require_text("location", &self.location)?;
        require_capacity(self.capacity)?;
        Ok(NewEvent {
            name: self.name,
            description: self.description,
            date: self.date,
            location: self.location,
            capacity: self.capacity,
            organizer_id: self.organizer_id,
            status: self.status,
        })
    }
}

/// Query parameters for listing events.
#[derive(Debug, Default, Deserialize)]
pub struct ListEventsQuery {
    /// Filter by status
    pub status: Option<EventStatus>,
    /// Only events on or after this instant
    pub from: Option<DateTime<Utc>>,
    /// Only events on or before this instant
    pub to: Option<DateTime<Utc>>,
}

/// Request to update an event. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateEventRequest {
    /// New name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New date
    pub date: Option<DateTime<Utc>>,
    /// New location
    pub location: Option<String>,
    /// New capacity
    pub capacity: Option<u32>,
    /// New status
    pub status: Option<EventStatus>,
}

impl UpdateEventRequest {
    fn into_patch(self) -> Result<EventPatch, AppError> {
        reject_blank("name", self.name.as_deref())?;
        reject_blank("location", self.location.as_deref())?;
        reject_blank("description", self.description.as_deref())?;
        if let Some(capacity) = self.capacity {
            require_capacity(capacity)?;
        }
        Ok(EventPatch {
            name: self.name,
            description: self.description,
            date: self.date,
            location: self.location,
            capacity: self.capacity,
            status: self.status,
        })
    }
}

fn require_capacity(capacity: u32) -> Result<(), AppError> {
    if capacity == 0 {
        return Err(AppError::validation("capacity must be at least 1"));
    }
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new event.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/events \
///   -H "Content-Type: application/json" \
///   -d '{
///     "name": "RustConf",
///     "description": "Annual Rust conference",
///     "date": "2025-09-02T09:00:00Z",
///     "location": "Montreal",
///     "capacity": 500,
///     "organizer_id": "550e8400-e29b-41d4-a716-446655440000"
///   }'
/// ```
///
/// # Errors
///
/// 422 for blank required fields, 503 when the store is unavailable.
pub async fn create_event(
    State(state): State<AppState>,
    Json(request): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Event>), AppError> {
    let event = state.catalog.create_event(request.into_new_event()?).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// List events ordered by date.
///
/// ```bash
/// curl "http://localhost:8080/api/events?status=upcoming&from=2025-01-01T00:00:00Z"
/// ```
///
/// # Errors
///
/// 422 when `from` is after `to`, 503 when the store is unavailable.
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<ListEventsQuery>,
) -> Result<Json<Vec<Event>>, AppError> {
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(AppError::validation("from must not be after to"));
        }
    }
    let events = state
        .catalog
        .events(EventQuery {
            status: query.status,
            from: query.from,
            to: query.to,
        })
        .await?;
    Ok(Json(events))
}

/// Get event details by ID.
///
/// # Errors
///
/// 404 when the event does not exist.
pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<EventId>,
) -> Result<Json<Event>, AppError> {
    Ok(Json(state.catalog.event(event_id).await?))
}

/// Update event fields. Participants and the registered counter are not editable.
///
/// # Errors
///
/// 404 when the event does not exist, 422 for blank fields.
pub async fn update_event(
    State(state): State<AppState>,
    Path(event_id): Path<EventId>,
    Json(request): Json<UpdateEventRequest>,
) -> Result<Json<Event>, AppError> {
    let event = state
        .catalog
        .update_event(event_id, request.into_patch()?)
        .await?;
    Ok(Json(event))
}

/// Delete an event.
///
/// Participants keep their back-reference to the deleted event; deregistering
/// them later skips it.
///
/// # Errors
///
/// 404 when the event does not exist.
pub async fn delete_event(
    State(state): State<AppState>,
    Path(event_id): Path<EventId>,
) -> Result<StatusCode, AppError> {
    state.ledger.delete_event(event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Report disagreements between an event's counter, its participant set, and
/// the participants that point back at it. Read-only.
///
/// # Errors
///
/// 404 when the event does not exist.
pub async fn audit_event(
    State(state): State<AppState>,
    Path(event_id): Path<EventId>,
) -> Result<Json<EventAudit>, AppError> {
    Ok(Json(state.auditor.audit_event(event_id).await?))
}
