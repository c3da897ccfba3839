//! API endpoints for roster.
//!
//! Handlers are organized by resource:
//! - Events: CRUD, deletion through the ledger, consistency audit
//! - Participants: CRUD, registration, check-in, bulk import, attendance

pub mod events;
pub mod participants;

pub use events::{audit_event, create_event, delete_event, get_event, list_events, update_event};
pub use participants::{
    attendance, bulk_import, check_in, create_participant, delete_participant, get_participant,
    list_participants, register_participant, update_participant,
};

use crate::error::AppError;

/// Reject blank required text fields.
fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(())
}

/// Reject blank optional text fields that were supplied.
fn reject_blank(field: &str, value: Option<&str>) -> Result<(), AppError> {
    match value {
        Some(value) => require_text(field, value),
        None => Ok(()),
    }
}

/// Minimal shape check: one `@` with text on both sides.
fn require_email(value: &str) -> Result<(), AppError> {
    require_text("email", value)?;
    match value.trim().split_once('@') {
        Some((user, domain)) if !user.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(())
        }
        _ => Err(AppError::validation(format!(
            "email {value:?} is not a valid address"
        ))),
    }
}
