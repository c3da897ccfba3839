//! Error types for HTTP handlers.
//!
//! Bridges [`LedgerError`] and request validation failures to HTTP responses by
//! implementing Axum's `IntoResponse`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use roster_core::{ConsistencyFault, LedgerError};
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;

/// Application error type for HTTP handlers.
///
/// ```ignore
/// async fn handler(State(state): State<AppState>) -> Result<Json<Event>, AppError> {
///     let event = state.catalog.event(id).await?;
///     Ok(Json(event))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: &'static str,
    /// Structured data about the failure (consistency faults)
    details: Option<Value>,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: &'static str) -> Self {
        Self {
            status,
            message,
            code,
            details: None,
            source: None,
        }
    }

    /// Attach the underlying error for logging.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Attach structured details returned to the client.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message.into(), "NOT_FOUND")
    }

    /// Create a 409 Conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message.into(), "CONSISTENCY_FAULT")
    }

    /// Create a 422 Unprocessable Entity error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            message.into(),
            "VALIDATION_ERROR",
        )
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            "SERVICE_UNAVAILABLE",
        )
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// User-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    error = %source,
                    "Request failed"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    "Request failed"
                ),
            }
        } else if self.status == StatusCode::CONFLICT {
            tracing::warn!(code = self.code, message = %self.message, "Consistency fault returned to client");
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
            details: self.details,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::NotFound { .. } => Self::not_found(message),
            LedgerError::InvalidState(_) => {
                Self::new(StatusCode::BAD_REQUEST, message, "INVALID_STATE")
            }
            LedgerError::ConsistencyFault(fault) => {
                let details = fault_details(&fault);
                Self::conflict(message).with_details(details)
            }
            LedgerError::StoreUnavailable(store) => {
                Self::unavailable("The store is unavailable; retry later")
                    .with_source(anyhow::Error::new(store))
            }
        }
    }
}

/// Identifiers a client needs to act on a consistency fault.
fn fault_details(fault: &ConsistencyFault) -> Value {
    match fault {
        ConsistencyFault::CounterUnderflow {
            event_id,
            participant_id,
        } => json!({
            "kind": "counter_underflow",
            "event_id": event_id,
            "participant_id": participant_id,
        }),
        ConsistencyFault::PartialImport {
            event_id,
            created,
            not_created,
            ..
        } => json!({
            "kind": "partial_import",
            "event_id": event_id,
            "created": created,
            "not_created": not_created,
        }),
        ConsistencyFault::UnconfirmedImport {
            event_id,
            attempted,
            ..
        } => json!({
            "kind": "unconfirmed_import",
            "event_id": event_id,
            "attempted": attempted,
        }),
        ConsistencyFault::OrphanedParticipants {
            event_id,
            participant_ids,
            ..
        } => json!({
            "kind": "orphaned_participants",
            "event_id": event_id,
            "participant_ids": participant_ids,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::{EventId, InvalidState, ParticipantId, StoreError};

    #[test]
    fn test_error_display() {
        let err = AppError::validation("name must not be empty");
        assert_eq!(err.to_string(), "[VALIDATION_ERROR] name must not be empty");
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_ledger_error_status_mapping() {
        let cases = [
            (
                LedgerError::event_not_found(EventId::new()),
                StatusCode::NOT_FOUND,
            ),
            (
                InvalidState::NotRegistered {
                    participant_id: ParticipantId::new(),
                    event_id: EventId::new(),
                }
                .into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                ConsistencyFault::CounterUnderflow {
                    event_id: EventId::new(),
                    participant_id: ParticipantId::new(),
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (
                StoreError::Unavailable("connection refused".into()).into(),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(AppError::from(error).status(), status);
        }
    }

    #[test]
    fn test_invalid_state_is_a_bad_request_with_its_own_code() {
        let err = AppError::from(LedgerError::from(InvalidState::NotRegistered {
            participant_id: ParticipantId::new(),
            event_id: EventId::new(),
        }));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "INVALID_STATE");
    }

    #[test]
    fn test_partial_import_details_list_positions() {
        let created = vec![ParticipantId::new()];
        let fault = ConsistencyFault::PartialImport {
            event_id: EventId::new(),
            created: created.clone(),
            not_created: vec![1, 2],
            cause: StoreError::Unavailable("timeout".into()),
        };
        let details = fault_details(&fault);
        assert_eq!(details["kind"], "partial_import");
        assert_eq!(details["not_created"], json!([1, 2]));
        assert_eq!(details["created"], json!(created));
    }

    #[test]
    fn test_store_failure_hides_internals() {
        let err = AppError::from(LedgerError::from(StoreError::Unavailable(
            "password authentication failed".into(),
        )));
        assert!(!err.to_string().contains("password"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
