//! Participant API endpoints.
//!
//! - POST /api/participants - Create a participant, optionally registering it
//! - GET /api/participants - List participants by event and free-text search
//! - GET /api/participants/:id - Get participant details
//! - PUT /api/participants/:id - Update contact fields
//! - DELETE /api/participants/:id - Deregister from every event and delete
//! - POST /api/participants/:id/check-in - Check in at an event
//! - POST /api/participants/:id/events/:event_id - Register for another event
//! - POST /api/participants/bulk-import - Create many participants for one event
//! - GET /api/participants/event/:event_id - Attendance list of one event

use super::{reject_blank, require_email, require_text};
use crate::error::AppError;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use roster_core::{
    Event, EventId, NewParticipant, Participant, ParticipantId, ParticipantPatch, ParticipantQuery,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Contact fields of a participant.
#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantInput {
    /// Full name
    pub name: String,
    /// Contact email
    pub email: String,
    /// Contact phone
    pub phone: String,
}

impl ParticipantInput {
    fn validate(self) -> Result<NewParticipant, AppError> {
        require_text("name", &self.name)?;
        require_email(&self.email)?;
        require_text("phone", &self.phone)?;
        Ok(NewParticipant::new(self.name, self.email, self.phone))
    }
}

/// Request to create a participant.
#[derive(Debug, Deserialize)]
pub struct CreateParticipantRequest {
    /// Contact fields
    #[serde(flatten)]
    pub contact: ParticipantInput,
    /// Register for this event right away
    #[serde(default)]
    pub event_id: Option<EventId>,
}

/// Query parameters for listing participants.
#[derive(Debug, Default, Deserialize)]
pub struct ListParticipantsQuery {
    /// Only participants registered for this event
    pub event_id: Option<EventId>,
    /// Case-insensitive substring of name, email or phone
    pub search: Option<String>,
}

/// Request to update contact fields. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateParticipantRequest {
    /// New name
    pub name: Option<String>,
    /// New email
    pub email: Option<String>,
    /// New phone
    pub phone: Option<String>,
}

impl UpdateParticipantRequest {
    fn into_patch(self) -> Result<ParticipantPatch, AppError> {
        reject_blank("name", self.name.as_deref())?;
        reject_blank("phone", self.phone.as_deref())?;
        if let Some(email) = &self.email {
            require_email(email)?;
        }
        Ok(ParticipantPatch {
            name: self.name,
            email: self.email,
            phone: self.phone,
        })
    }
}

/// Request to check a participant in.
#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    /// Event the participant is checking in to
    pub event_id: EventId,
}

/// Request to import participants into an event.
#[derive(Debug, Deserialize)]
pub struct BulkImportRequest {
    /// Target event
    pub event_id: EventId,
    /// Records to create, in order
    pub participants: Vec<ParticipantInput>,
}

/// Response of a successful import.
#[derive(Debug, Serialize)]
pub struct BulkImportResponse {
    /// The event after the import
    pub event: Event,
    /// Created participants, in input order
    pub created: Vec<Participant>,
}

/// Response of a deletion.
#[derive(Debug, Serialize)]
pub struct DeleteParticipantResponse {
    /// Deleted participant
    pub participant_id: ParticipantId,
    /// Events the participant was removed from
    pub detached_from: Vec<EventId>,
    /// Back-references to events that no longer exist or did not list it
    pub skipped: Vec<EventId>,
}

/// One row of an attendance list.
#[derive(Debug, Serialize)]
pub struct AttendanceEntry {
    /// Participant ID
    pub id: ParticipantId,
    /// Full name
    pub name: String,
    /// Contact email
    pub email: String,
    /// Contact phone
    pub phone: String,
    /// Whether the participant has checked in
    pub checked_in: bool,
    /// When the participant checked in
    pub check_in_time: Option<DateTime<Utc>>,
}

impl From<Participant> for AttendanceEntry {
    fn from(p: Participant) -> Self {
        Self {
            id: p.id,
            name: p.name,
            email: p.email,
            phone: p.phone,
            checked_in: p.checked_in,
            check_in_time: p.check_in_time,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a participant. With `event_id`, the participant is registered for that
/// event in the same request.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/participants \
///   -H "Content-Type: application/json" \
///   -d '{"name": "Ada Lovelace", "email": "ada@example.com", "phone": "555-0100",
///        "event_id": "550e8400-e29b-41d4-a716-446655440000"}'
/// ```
///
/// # Errors
///
/// 404 when `event_id` names no event, 422 for invalid contact fields.
pub async fn create_participant(
    State(state): State<AppState>,
    Json(request): Json<CreateParticipantRequest>,
) -> Result<(StatusCode, Json<Participant>), AppError> {
    let new = request.contact.validate()?;
    let participant = match request.event_id {
        Some(event_id) => state.ledger.register_new(event_id, new).await?,
        None => state.catalog.create_participant(new).await?,
    };
    Ok((StatusCode::CREATED, Json(participant)))
}

/// List participants, newest first.
///
/// ```bash
/// curl "http://localhost:8080/api/participants?search=lovelace"
/// ```
///
/// # Errors
///
/// 503 when the store is unavailable.
pub async fn list_participants(
    State(state): State<AppState>,
    Query(query): Query<ListParticipantsQuery>,
) -> Result<Json<Vec<Participant>>, AppError> {
    let search = query
        .search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let participants = state
        .catalog
        .participants(ParticipantQuery {
            event_id: query.event_id,
            ids: None,
            search,
        })
        .await?;
    Ok(Json(participants))
}

/// Get participant details by ID.
///
/// # Errors
///
/// 404 when the participant does not exist.
pub async fn get_participant(
    State(state): State<AppState>,
    Path(participant_id): Path<ParticipantId>,
) -> Result<Json<Participant>, AppError> {
    Ok(Json(state.catalog.participant(participant_id).await?))
}

/// Update contact fields. Event associations and check-in state are not editable.
///
/// # Errors
///
/// 404 when the participant does not exist, 422 for invalid fields.
pub async fn update_participant(
    State(state): State<AppState>,
    Path(participant_id): Path<ParticipantId>,
    Json(request): Json<UpdateParticipantRequest>,
) -> Result<Json<Participant>, AppError> {
    let participant = state
        .catalog
        .update_participant(participant_id, request.into_patch()?)
        .await?;
    Ok(Json(participant))
}

/// Remove the participant from every event it is registered for, then delete it.
///
/// Safe to repeat after a partial failure.
///
/// # Errors
///
/// 404 when the participant does not exist, 409 on counter drift.
pub async fn delete_participant(
    State(state): State<AppState>,
    Path(participant_id): Path<ParticipantId>,
) -> Result<Json<DeleteParticipantResponse>, AppError> {
    let result = state.ledger.deregister(participant_id).await?;
    Ok(Json(DeleteParticipantResponse {
        participant_id: result.participant.id,
        detached_from: result.detached_from,
        skipped: result.skipped,
    }))
}

/// Check a participant in at an event.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/participants/<id>/check-in \
///   -H "Content-Type: application/json" \
///   -d '{"event_id": "550e8400-e29b-41d4-a716-446655440000"}'
/// ```
///
/// # Errors
///
/// 404 when the participant does not exist, 400 when it is not registered for
/// the event or already checked in.
pub async fn check_in(
    State(state): State<AppState>,
    Path(participant_id): Path<ParticipantId>,
    Json(request): Json<CheckInRequest>,
) -> Result<Json<Participant>, AppError> {
    let participant = state
        .check_in
        .check_in(participant_id, request.event_id)
        .await?;
    Ok(Json(participant))
}

/// Register an existing participant for an event. Repeating it is harmless.
///
/// # Errors
///
/// 404 when the participant or event does not exist.
pub async fn register_participant(
    State(state): State<AppState>,
    Path((participant_id, event_id)): Path<(ParticipantId, EventId)>,
) -> Result<Json<Participant>, AppError> {
    let participant = state
        .ledger
        .register_existing(event_id, participant_id)
        .await?;
    Ok(Json(participant))
}

/// Create participants for an event and register all of them.
///
/// Records are validated up front; one invalid record rejects the whole request.
/// When the store stops part-way, the response is 409 with the created ids and the
/// positions of the records that were not created.
///
/// # Errors
///
/// 404 when the event does not exist, 422 for invalid records, 409 for a partial
/// import.
pub async fn bulk_import(
    State(state): State<AppState>,
    Json(request): Json<BulkImportRequest>,
) -> Result<(StatusCode, Json<BulkImportResponse>), AppError> {
    let records = request
        .participants
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            record.validate().map_err(|error| {
                AppError::validation(format!("participants[{index}]: {}", error.message()))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let report = state.import.import(request.event_id, records).await?;
    Ok((
        StatusCode::CREATED,
        Json(BulkImportResponse {
            event: report.event,
            created: report.created,
        }),
    ))
}

/// Participants registered for one event, with their check-in state.
///
/// # Errors
///
/// 404 when the event does not exist.
pub async fn attendance(
    State(state): State<AppState>,
    Path(event_id): Path<EventId>,
) -> Result<Json<Vec<AttendanceEntry>>, AppError> {
    let participants = state.catalog.attendance(event_id).await?;
    Ok(Json(participants.into_iter().map(AttendanceEntry::from).collect()))
}
