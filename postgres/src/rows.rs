//! Row types and conversions between SQL rows and domain documents.

use chrono::{DateTime, Utc};
use roster_core::store::StoreError;
use roster_core::types::{
    Event, EventId, EventStatus, OrganizerId, Participant, ParticipantId,
};
use uuid::Uuid;

pub(crate) const EVENT_COLUMNS: &str = "id, name, description, date, location, capacity, \
     registered, participant_ids, organizer_id, status, created_at";

pub(crate) const PARTICIPANT_COLUMNS: &str =
    "id, name, email, phone, event_ids, checked_in, check_in_time, created_at";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EventRow {
    id: Uuid,
    name: String,
    description: String,
    date: DateTime<Utc>,
    location: String,
    capacity: i64,
    registered: i64,
    participant_ids: Vec<Uuid>,
    organizer_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let corrupt = |field: &str| StoreError::Corrupt(format!("event {}: invalid {field}", row.id));
        Ok(Self {
            id: EventId::from_uuid(row.id),
            capacity: u32::try_from(row.capacity).map_err(|_| corrupt("capacity"))?,
            registered: u32::try_from(row.registered).map_err(|_| corrupt("registered"))?,
            status: row
                .status
                .parse::<EventStatus>()
                .map_err(|e| StoreError::Corrupt(format!("event {}: {e}", row.id)))?,
            participant_ids: row
                .participant_ids
                .into_iter()
                .map(ParticipantId::from_uuid)
                .collect(),
            organizer_id: OrganizerId::from_uuid(row.organizer_id),
            name: row.name,
            description: row.description,
            date: row.date,
            location: row.location,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ParticipantRow {
    id: Uuid,
    name: String,
    email: String,
    phone: String,
    event_ids: Vec<Uuid>,
    checked_in: bool,
    check_in_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<ParticipantRow> for Participant {
    fn from(row: ParticipantRow) -> Self {
        Self {
            id: ParticipantId::from_uuid(row.id),
            name: row.name,
            email: row.email,
            phone: row.phone,
            event_ids: row.event_ids.into_iter().map(EventId::from_uuid).collect(),
            checked_in: row.checked_in,
            check_in_time: row.check_in_time,
            created_at: row.created_at,
        }
    }
}

pub(crate) fn participant_uuids(event: &Event) -> Vec<Uuid> {
    event.participant_ids.iter().map(|id| *id.as_uuid()).collect()
}

pub(crate) fn event_uuids(participant: &Participant) -> Vec<Uuid> {
    participant.event_ids.iter().map(|id| *id.as_uuid()).collect()
}

/// Map a sqlx error onto the store taxonomy.
///
/// Only errors the database reported for a statement are known not to have
/// committed anything; connection-level failures are `Unavailable`.
pub(crate) fn store_error(operation: &'static str, error: &sqlx::Error) -> StoreError {
    metrics::counter!("roster_store_errors_total", "operation" => operation).increment(1);
    match error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Duplicate(format!("{operation}: {db}"))
        }
        sqlx::Error::Database(db) if db.is_check_violation() => {
            StoreError::Corrupt(format!("{operation}: {db}"))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Corrupt(format!("{operation}: {error}"))
        }
        _ => {
            tracing::warn!(operation, error = %error, "PostgreSQL operation failed");
            StoreError::Unavailable(format!("{operation}: {error}"))
        }
    }
}

/// `%term%` for `ILIKE`, with wildcard characters in `term` escaped.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
