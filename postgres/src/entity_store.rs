//! `PostgresEntityStore`: the production `EntityStore`.

use crate::rows::{
    EVENT_COLUMNS, EventRow, PARTICIPANT_COLUMNS, ParticipantRow, event_uuids, like_pattern,
    participant_uuids, store_error,
};
use chrono::{DateTime, Utc};
use roster_core::store::{
    AttachOutcome, BulkInsertFailure, BulkInsertOutcome, CheckInOutcome, DetachOutcome,
    EntityStore, EventQuery, ParticipantQuery, StoreError, StoreFuture,
};
use roster_core::types::{
    Event, EventId, EventPatch, Participant, ParticipantId, ParticipantPatch,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use uuid::Uuid;

/// Connection pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// Maximum pool size
    pub max_connections: u32,
    /// Connections kept open when idle
    pub min_connections: u32,
    /// How long to wait for a connection
    pub connect_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// PostgreSQL-backed entity store.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE events (
///     id UUID PRIMARY KEY,
///     ...
///     registered BIGINT NOT NULL CHECK (registered >= 0),
///     participant_ids UUID[] NOT NULL DEFAULT '{}'
/// );
/// CREATE TABLE participants (
///     id UUID PRIMARY KEY,
///     ...
///     event_ids UUID[] NOT NULL DEFAULT '{}',
///     checked_in BOOLEAN NOT NULL DEFAULT FALSE
/// );
/// ```
///
/// See `migrations/` for the full definitions.
#[derive(Clone)]
pub struct PostgresEntityStore {
    pool: PgPool,
}

impl PostgresEntityStore {
    /// Create a store using an existing connection pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a new pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the database cannot be reached.
    pub async fn connect(database_url: &str, settings: &PoolSettings) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to connect: {e}")))?;

        tracing::info!(
            max_connections = settings.max_connections,
            "Connected to PostgreSQL"
        );
        Ok(Self::from_pool(pool))
    }

    /// Run the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Check that the database answers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if it does not.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("ping", &e))?;
        Ok(())
    }

    async fn fetch_event(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        let row: Option<EventRow> =
            sqlx::query_as(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| store_error("find_event", &e))?;
        row.map(Event::try_from).transpose()
    }

    async fn fetch_participant(&self, id: ParticipantId) -> Result<Option<Participant>, StoreError> {
        let row: Option<ParticipantRow> = sqlx::query_as(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("find_participant", &e))?;
        Ok(row.map(Participant::from))
    }

    async fn insert_participant(&self, participant: &Participant) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            INSERT INTO participants
                (id, name, email, phone, event_ids, checked_in, check_in_time, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(participant.id.as_uuid())
        .bind(&participant.name)
        .bind(&participant.email)
        .bind(&participant.phone)
        .bind(event_uuids(participant))
        .bind(participant.checked_in)
        .bind(participant.check_in_time)
        .bind(participant.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_participant_events(
        &self,
        operation: &'static str,
        sql: &str,
        participant_id: ParticipantId,
        event_id: EventId,
    ) -> Result<Option<Participant>, StoreError> {
        let row: Option<ParticipantRow> = sqlx::query_as(sql)
            .bind(participant_id.as_uuid())
            .bind(event_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error(operation, &e))?;
        Ok(row.map(Participant::from))
    }
}

impl EntityStore for PostgresEntityStore {
    fn find_event(&self, id: EventId) -> StoreFuture<'_, Option<Event>> {
        Box::pin(async move { self.fetch_event(id).await })
    }

    fn find_events(&self, query: EventQuery) -> StoreFuture<'_, Vec<Event>> {
        Box::pin(async move {
            let rows: Vec<EventRow> = sqlx::query_as(&format!(
                "SELECT {EVENT_COLUMNS} FROM events
                 WHERE ($1::text IS NULL OR status = $1)
                   AND ($2::timestamptz IS NULL OR date >= $2)
                   AND ($3::timestamptz IS NULL OR date <= $3)
                 ORDER BY date, id"
            ))
            .bind(query.status.map(|s| s.as_str()))
            .bind(query.from)
            .bind(query.to)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error("find_events", &e))?;
            rows.into_iter().map(Event::try_from).collect()
        })
    }

    fn create_event(&self, event: Event) -> StoreFuture<'_, Event> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO events
                    (id, name, description, date, location, capacity, registered,
                     participant_ids, organizer_id, status, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ",
            )
            .bind(event.id.as_uuid())
            .bind(&event.name)
            .bind(&event.description)
            .bind(event.date)
            .bind(&event.location)
            .bind(i64::from(event.capacity))
            .bind(i64::from(event.registered))
            .bind(participant_uuids(&event))
            .bind(event.organizer_id.as_uuid())
            .bind(event.status.as_str())
            .bind(event.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("create_event", &e))?;
            Ok(event)
        })
    }

    fn update_event(&self, id: EventId, patch: EventPatch) -> StoreFuture<'_, Option<Event>> {
        Box::pin(async move {
            let row: Option<EventRow> = sqlx::query_as(&format!(
                "UPDATE events SET
                    name = COALESCE($2, name),
                    description = COALESCE($3, description),
                    date = COALESCE($4, date),
                    location = COALESCE($5, location),
                    capacity = COALESCE($6, capacity),
                    status = COALESCE($7, status)
                 WHERE id = $1
                 RETURNING {EVENT_COLUMNS}"
            ))
            .bind(id.as_uuid())
            .bind(patch.name.map(|s| s.trim().to_string()))
            .bind(patch.description)
            .bind(patch.date)
            .bind(patch.location.map(|s| s.trim().to_string()))
            .bind(patch.capacity.map(i64::from))
            .bind(patch.status.map(|s| s.as_str()))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("update_event", &e))?;
            row.map(Event::try_from).transpose()
        })
    }

    fn delete_event(&self, id: EventId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM events WHERE id = $1")
                .bind(id.as_uuid())
                .execute(&self.pool)
                .await
                .map_err(|e| store_error("delete_event", &e))?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn find_participant(&self, id: ParticipantId) -> StoreFuture<'_, Option<Participant>> {
        Box::pin(async move { self.fetch_participant(id).await })
    }

    fn find_participants(&self, query: ParticipantQuery) -> StoreFuture<'_, Vec<Participant>> {
        Box::pin(async move {
            let ids: Option<Vec<Uuid>> = query
                .ids
                .map(|ids| ids.iter().map(|id| *id.as_uuid()).collect());
            let rows: Vec<ParticipantRow> = sqlx::query_as(&format!(
                "SELECT {PARTICIPANT_COLUMNS} FROM participants
                 WHERE ($1::uuid IS NULL OR $1 = ANY(event_ids))
                   AND ($2::uuid[] IS NULL OR id = ANY($2))
                   AND ($3::text IS NULL OR name ILIKE $3 OR email ILIKE $3 OR phone ILIKE $3)
                 ORDER BY created_at DESC, id"
            ))
            .bind(query.event_id.map(|id| *id.as_uuid()))
            .bind(ids)
            .bind(query.search.as_deref().map(like_pattern))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error("find_participants", &e))?;
            Ok(rows.into_iter().map(Participant::from).collect())
        })
    }

    fn create_participant(&self, participant: Participant) -> StoreFuture<'_, Participant> {
        Box::pin(async move {
            self.insert_participant(&participant)
                .await
                .map_err(|e| store_error("create_participant", &e))?;
            Ok(participant)
        })
    }

    fn bulk_insert_participants(
        &self,
        participants: Vec<Participant>,
    ) -> StoreFuture<'_, BulkInsertOutcome> {
        Box::pin(async move {
            let mut created = Vec::with_capacity(participants.len());
            for (index, participant) in participants.into_iter().enumerate() {
                match self.insert_participant(&participant).await {
                    Ok(()) => created.push(participant),
                    // The database rejected the statement: nothing from it committed
                    Err(e @ sqlx::Error::Database(_)) => {
                        return Ok(BulkInsertOutcome {
                            created,
                            failure: Some(BulkInsertFailure {
                                index,
                                error: store_error("bulk_insert_participants", &e),
                            }),
                        });
                    }
                    // Connection-level failure: this record may or may not have committed
                    Err(e) => return Err(store_error("bulk_insert_participants", &e)),
                }
            }
            Ok(BulkInsertOutcome::complete(created))
        })
    }

    fn update_participant(
        &self,
        id: ParticipantId,
        patch: ParticipantPatch,
    ) -> StoreFuture<'_, Option<Participant>> {
        Box::pin(async move {
            let patch = patch.normalized();
            let row: Option<ParticipantRow> = sqlx::query_as(&format!(
                "UPDATE participants SET
                    name = COALESCE($2, name),
                    email = COALESCE($3, email),
                    phone = COALESCE($4, phone)
                 WHERE id = $1
                 RETURNING {PARTICIPANT_COLUMNS}"
            ))
            .bind(id.as_uuid())
            .bind(patch.name)
            .bind(patch.email)
            .bind(patch.phone)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("update_participant", &e))?;
            Ok(row.map(Participant::from))
        })
    }

    fn delete_participant(&self, id: ParticipantId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM participants WHERE id = $1")
                .bind(id.as_uuid())
                .execute(&self.pool)
                .await
                .map_err(|e| store_error("delete_participant", &e))?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn attach_participants(
        &self,
        event_id: EventId,
        participant_ids: Vec<ParticipantId>,
    ) -> StoreFuture<'_, AttachOutcome> {
        Box::pin(async move {
            let map = |e: sqlx::Error| store_error("attach_participants", &e);
            let mut tx = self.pool.begin().await.map_err(map)?;

            let row: Option<EventRow> = sqlx::query_as(&format!(
                "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 FOR UPDATE"
            ))
            .bind(event_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(map)?;
            let Some(row) = row else {
                return Ok(AttachOutcome::EventMissing);
            };
            let mut event = Event::try_from(row)?;

            let mut added: u32 = 0;
            for participant_id in participant_ids {
                if event.participant_ids.insert(participant_id) {
                    added = added.saturating_add(1);
                }
            }
            if added == 0 {
                return Ok(AttachOutcome::Attached { event, added });
            }

            let row: EventRow = sqlx::query_as(&format!(
                "UPDATE events
                 SET participant_ids = $2, registered = registered + $3
                 WHERE id = $1
                 RETURNING {EVENT_COLUMNS}"
            ))
            .bind(event_id.as_uuid())
            .bind(participant_uuids(&event))
            .bind(i64::from(added))
            .fetch_one(&mut *tx)
            .await
            .map_err(map)?;
            tx.commit().await.map_err(map)?;

            Ok(AttachOutcome::Attached {
                event: Event::try_from(row)?,
                added,
            })
        })
    }

    fn detach_participant(
        &self,
        event_id: EventId,
        participant_id: ParticipantId,
    ) -> StoreFuture<'_, DetachOutcome> {
        Box::pin(async move {
            let row: Option<EventRow> = sqlx::query_as(&format!(
                "UPDATE events
                 SET participant_ids = array_remove(participant_ids, $2),
                     registered = registered - 1
                 WHERE id = $1 AND $2 = ANY(participant_ids) AND registered > 0
                 RETURNING {EVENT_COLUMNS}"
            ))
            .bind(event_id.as_uuid())
            .bind(participant_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("detach_participant", &e))?;

            if let Some(row) = row {
                return Ok(DetachOutcome::Detached(Event::try_from(row)?));
            }

            // Guard did not match: find out which condition failed
            Ok(match self.fetch_event(event_id).await? {
                None => DetachOutcome::EventMissing,
                Some(event) if !event.has_participant(&participant_id) => {
                    DetachOutcome::NotAttached(event)
                }
                Some(event) => DetachOutcome::CounterUnderflow(event),
            })
        })
    }

    fn add_event_to_participant(
        &self,
        participant_id: ParticipantId,
        event_id: EventId,
    ) -> StoreFuture<'_, Option<Participant>> {
        Box::pin(async move {
            self.update_participant_events(
                "add_event_to_participant",
                &format!(
                    "UPDATE participants
                     SET event_ids = CASE WHEN $2 = ANY(event_ids) THEN event_ids
                                          ELSE array_append(event_ids, $2) END
                     WHERE id = $1
                     RETURNING {PARTICIPANT_COLUMNS}"
                ),
                participant_id,
                event_id,
            )
            .await
        })
    }

    fn remove_event_from_participant(
        &self,
        participant_id: ParticipantId,
        event_id: EventId,
    ) -> StoreFuture<'_, Option<Participant>> {
        Box::pin(async move {
            self.update_participant_events(
                "remove_event_from_participant",
                &format!(
                    "UPDATE participants
                     SET event_ids = array_remove(event_ids, $2)
                     WHERE id = $1
                     RETURNING {PARTICIPANT_COLUMNS}"
                ),
                participant_id,
                event_id,
            )
            .await
        })
    }

    fn mark_checked_in(
        &self,
        participant_id: ParticipantId,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, CheckInOutcome> {
        Box::pin(async move {
            let row: Option<ParticipantRow> = sqlx::query_as(&format!(
                "UPDATE participants
                 SET checked_in = TRUE, check_in_time = $2
                 WHERE id = $1 AND NOT checked_in
                 RETURNING {PARTICIPANT_COLUMNS}"
            ))
            .bind(participant_id.as_uuid())
            .bind(at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("mark_checked_in", &e))?;

            if let Some(row) = row {
                return Ok(CheckInOutcome::Applied(Participant::from(row)));
            }
            Ok(match self.fetch_participant(participant_id).await? {
                None => CheckInOutcome::Missing,
                Some(participant) => CheckInOutcome::AlreadyCheckedIn(participant),
            })
        })
    }
}
