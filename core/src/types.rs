//! Domain types for event attendance tracking.
//!
//! Events and participants reference each other through denormalized id sets:
//! an [`Event`] lists its participants and keeps a `registered` counter, and each
//! [`Participant`] lists the events it is registered for. The ledger keeps the
//! three views in agreement; these types only describe the documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_id!(
    /// Unique identifier for an event
    EventId
);

define_id!(
    /// Unique identifier for a participant
    ParticipantId
);

define_id!(
    /// Identifier of the user who organizes an event
    OrganizerId
);

// ============================================================================
// Event
// ============================================================================

/// Lifecycle status of an event.
///
/// Status only changes through explicit updates; nothing in the ledger moves it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// Scheduled, not started yet
    #[default]
    Upcoming,
    /// Currently running
    Ongoing,
    /// Finished
    Completed,
    /// Called off
    Cancelled,
}

impl EventStatus {
    /// Storage representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`EventStatus`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid event status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for EventStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(Self::Upcoming),
            "ongoing" => Ok(Self::Ongoing),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// An event with finite attendance capacity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event ID
    pub id: EventId,
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// When the event takes place
    pub date: DateTime<Utc>,
    /// Where the event takes place
    pub location: String,
    /// Intended maximum number of participants (informational, not enforced)
    pub capacity: u32,
    /// Number of participants currently listed in `participant_ids`
    pub registered: u32,
    /// Participants registered for this event
    pub participant_ids: BTreeSet<ParticipantId>,
    /// Owning user
    pub organizer_id: OrganizerId,
    /// Lifecycle status
    pub status: EventStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Build a fresh event document with no participants.
    #[must_use]
    pub fn from_new(id: EventId, new: NewEvent, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: new.name.trim().to_string(),
            description: new.description,
            date: new.date,
            location: new.location.trim().to_string(),
            capacity: new.capacity,
            registered: 0,
            participant_ids: BTreeSet::new(),
            organizer_id: new.organizer_id,
            status: new.status.unwrap_or_default(),
            created_at,
        }
    }

    /// Whether the participant is listed on this event.
    #[must_use]
    pub fn has_participant(&self, participant_id: &ParticipantId) -> bool {
        self.participant_ids.contains(participant_id)
    }

    /// Whether more participants are registered than the event can hold.
    #[must_use]
    pub const fn is_over_capacity(&self) -> bool {
        self.registered > self.capacity
    }

    /// Whether the `registered` counter agrees with the participant set.
    #[must_use]
    pub fn counter_matches_set(&self) -> bool {
        usize::try_from(self.registered).is_ok_and(|n| n == self.participant_ids.len())
    }

    /// Apply a field patch in place.
    pub fn apply(&mut self, patch: EventPatch) {
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(location) = patch.location {
            self.location = location.trim().to_string();
        }
        if let Some(capacity) = patch.capacity {
            self.capacity = capacity;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
    }
}

/// Creation parameters for an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// When the event takes place
    pub date: DateTime<Utc>,
    /// Where the event takes place
    pub location: String,
    /// Intended maximum number of participants
    pub capacity: u32,
    /// Owning user
    pub organizer_id: OrganizerId,
    /// Initial status (defaults to upcoming)
    #[serde(default)]
    pub status: Option<EventStatus>,
}

/// Field update for an event. Association fields are deliberately absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPatch {
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

impl EventPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.date.is_none()
            && self.location.is_none()
            && self.capacity.is_none()
            && self.status.is_none()
    }
}

// ============================================================================
// Participant
// ============================================================================

/// Check-in state of a participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckInState {
    /// Initial state
    NotCheckedIn,
    /// Checked in (terminal)
    CheckedIn {
        /// When the check-in happened, if recorded
        at: Option<DateTime<Utc>>,
    },
}

/// A person who registers for and attends events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Participant ID
    pub id: ParticipantId,
    /// Full name
    pub name: String,
    /// Contact email (trimmed, lowercase)
    pub email: String,
    /// Contact phone
    pub phone: String,
    /// Events this participant is registered for
    pub event_ids: BTreeSet<EventId>,
    /// Whether the participant has checked in
    pub checked_in: bool,
    /// When the participant checked in; only set while `checked_in` is true
    pub check_in_time: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Participant {
    /// Build a fresh participant document.
    #[must_use]
    pub fn from_new(
        id: ParticipantId,
        new: NewParticipant,
        event_ids: BTreeSet<EventId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let new = new.normalized();
        Self {
            id,
            name: new.name,
            email: new.email,
            phone: new.phone,
            event_ids,
            checked_in: false,
            check_in_time: None,
            created_at,
        }
    }

    /// Whether this participant is registered for the event.
    #[must_use]
    pub fn is_registered_for(&self, event_id: &EventId) -> bool {
        self.event_ids.contains(event_id)
    }

    /// Current check-in state.
    #[must_use]
    pub fn check_in_state(&self) -> CheckInState {
        if self.checked_in {
            CheckInState::CheckedIn {
                at: self.check_in_time,
            }
        } else {
            CheckInState::NotCheckedIn
        }
    }

    /// Apply a contact-field patch in place.
    pub fn apply(&mut self, patch: ParticipantPatch) {
        let patch = patch.normalized();
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(phone) = patch.phone {
            self.phone = phone;
        }
    }
}

/// Creation parameters for a participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewParticipant {
    /// Full name
    pub name: String,
    /// Contact email
    pub email: String,
    /// Contact phone
    pub phone: String,
}

impl NewParticipant {
    /// Create participant parameters.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
        }
    }

    /// Trim all fields and lowercase the email.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            phone: self.phone.trim().to_string(),
        }
    }
}

/// Contact-field update for a participant.
///
/// Event associations and check-in state are not patchable; they only move
/// through the ledger and the check-in state machine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantPatch {
    /// New name
    pub name: Option<String>,
    /// New email
    pub email: Option<String>,
    /// New phone
    pub phone: Option<String>,
}

impl ParticipantPatch {
    /// Trim all fields and lowercase the email.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.map(|s| s.trim().to_string()),
            email: self.email.map(|s| s.trim().to_lowercase()),
            phone: self.phone.map(|s| s.trim().to_string()),
        }
    }
}
