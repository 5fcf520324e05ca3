//! Typed payloads for the baby-care domain.
//!
//! The queue treats payloads as opaque bytes. These records give producers a
//! consistent JSON encoding for each change type.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::change::{ChangeType, PendingChange};

/// Payload for baby profile updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BabyProfile {
    pub id: String,
    pub name: String,
    pub birth_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub gestational_age_weeks: Option<u8>,
    pub birth_weight_grams: Option<u32>,
    pub in_nicu: bool,
}

/// Payload for milestone create/update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub baby_id: String,
    pub title: String,
    pub category: String,
    pub achieved_on: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Payload for appointment create/update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub baby_id: String,
    pub title: String,
    pub scheduled_at: DateTime<Utc>,
    pub location: Option<String>,
    pub provider: Option<String>,
    pub notes: Option<String>,
}

/// Kind of care event captured by a tracking record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingKind {
    Feeding,
    Sleep,
    Nappy,
    Growth,
}

/// Payload for tracking records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub id: String,
    pub baby_id: String,
    pub kind: TrackingKind,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub amount_ml: Option<u32>,
    pub weight_grams: Option<u32>,
    pub notes: Option<String>,
}

/// Payload for emergency contacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub id: String,
    pub name: String,
    pub relationship: String,
    pub phone: String,
    pub is_primary: bool,
}

/// Payload for deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    pub id: String,
}

fn encode<T: Serialize>(
    change_type: ChangeType,
    payload: &T,
) -> Result<PendingChange, serde_json::Error> {
    Ok(PendingChange::new(change_type, serde_json::to_vec(payload)?))
}

impl PendingChange {
    /// Create a baby profile update.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded.
    pub fn baby_update(profile: &BabyProfile) -> Result<Self, serde_json::Error> {
        encode(ChangeType::BabyUpdate, profile)
    }

    /// Create a milestone create or update.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded.
    pub fn milestone(milestone: &Milestone, is_new: bool) -> Result<Self, serde_json::Error> {
        let ty = if is_new {
            ChangeType::MilestoneCreate
        } else {
            ChangeType::MilestoneUpdate
        };
        encode(ty, milestone)
    }

    /// Create an appointment create or update.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded.
    pub fn appointment(appointment: &Appointment, is_new: bool) -> Result<Self, serde_json::Error> {
        let ty = if is_new {
            ChangeType::AppointmentCreate
        } else {
            ChangeType::AppointmentUpdate
        };
        encode(ty, appointment)
    }

    /// Create a tracking record change.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded.
    pub fn tracking_record(record: &TrackingRecord) -> Result<Self, serde_json::Error> {
        encode(ChangeType::TrackingRecord, record)
    }

    /// Create an emergency contact change.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded.
    pub fn emergency_contact(contact: &EmergencyContact) -> Result<Self, serde_json::Error> {
        encode(ChangeType::EmergencyContact, contact)
    }

    /// Create a delete for a milestone or appointment.
    ///
    /// Returns `None` if `change_type` is not a delete.
    #[must_use]
    pub fn delete(change_type: ChangeType, id: &str) -> Option<Self> {
        if !change_type.is_delete() {
            return None;
        }
        let payload = RecordRef { id: id.to_string() };
        encode(change_type, &payload).ok()
    }

    /// Decode the payload as a typed record.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not valid JSON for `T`.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}
