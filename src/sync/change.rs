//! Pending change types for the sync queue.
//!
//! A [`PendingChange`] is one locally recorded mutation that has not yet been
//! confirmed by the backend.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a pending change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeId(String);

impl ChangeId {
    /// Generate a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChangeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ChangeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of domain mutation carried by a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeType {
    /// Baby profile edited
    BabyUpdate,
    /// Milestone recorded
    MilestoneCreate,
    /// Milestone edited
    MilestoneUpdate,
    /// Milestone removed
    MilestoneDelete,
    /// Appointment scheduled
    AppointmentCreate,
    /// Appointment edited
    AppointmentUpdate,
    /// Appointment removed
    AppointmentDelete,
    /// Feeding, sleep, nappy or growth entry
    TrackingRecord,
    /// Emergency contact saved
    EmergencyContact,
}

impl ChangeType {
    /// Every change type, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::BabyUpdate,
        Self::MilestoneCreate,
        Self::MilestoneUpdate,
        Self::MilestoneDelete,
        Self::AppointmentCreate,
        Self::AppointmentUpdate,
        Self::AppointmentDelete,
        Self::TrackingRecord,
        Self::EmergencyContact,
    ];

    /// Stable tag used in storage and on the command line.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BabyUpdate => "baby-update",
            Self::MilestoneCreate => "milestone-create",
            Self::MilestoneUpdate => "milestone-update",
            Self::MilestoneDelete => "milestone-delete",
            Self::AppointmentCreate => "appointment-create",
            Self::AppointmentUpdate => "appointment-update",
            Self::AppointmentDelete => "appointment-delete",
            Self::TrackingRecord => "tracking-record",
            Self::EmergencyContact => "emergency-contact",
        }
    }

    /// Get the display name for this change type.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::BabyUpdate => "Baby Update",
            Self::MilestoneCreate => "Create Milestone",
            Self::MilestoneUpdate => "Update Milestone",
            Self::MilestoneDelete => "Delete Milestone",
            Self::AppointmentCreate => "Create Appointment",
            Self::AppointmentUpdate => "Update Appointment",
            Self::AppointmentDelete => "Delete Appointment",
            Self::TrackingRecord => "Tracking Record",
            Self::EmergencyContact => "Emergency Contact",
        }
    }

    /// Whether the change removes a remote record.
    #[must_use]
    pub const fn is_delete(&self) -> bool {
        matches!(self, Self::MilestoneDelete | Self::AppointmentDelete)
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a change type tag is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown change type: {0}")]
pub struct UnknownChangeType(pub String);

impl FromStr for ChangeType {
    type Err = UnknownChangeType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| UnknownChangeType(s.to_string()))
    }
}

/// A queued mutation with its delivery metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    /// Unique id
    pub id: ChangeId,
    /// Change type
    pub change_type: ChangeType,
    /// Serialized domain object
    pub payload: Vec<u8>,
    /// When the change was recorded
    pub created_at: DateTime<Utc>,
    /// Number of failed delivery attempts
    pub retry_count: u32,
    /// When delivery last failed
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Error from the last failed delivery
    pub last_error: Option<String>,
}

impl PendingChange {
    /// Create a new change with a generated id.
    #[must_use]
    pub fn new(change_type: ChangeType, payload: Vec<u8>) -> Self {
        Self::with_id(ChangeId::generate(), change_type, payload)
    }

    /// Create a new change with a caller-supplied id.
    #[must_use]
    pub fn with_id(id: impl Into<ChangeId>, change_type: ChangeType, payload: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            change_type,
            payload,
            created_at: Utc::now(),
            retry_count: 0,
            last_attempt_at: None,
            last_error: None,
        }
    }

    /// Record a failed delivery attempt.
    pub fn record_failure(&mut self, error: &str, at: DateTime<Utc>) {
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_attempt_at = Some(at);
        self.last_error = Some(error.to_string());
    }

    /// Id of the domain record this change targets, if the payload names one.
    #[must_use]
    pub fn target_id(&self) -> Option<String> {
        let value: serde_json::Value = serde_json::from_slice(&self.payload).ok()?;
        match value.get("id")? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}
