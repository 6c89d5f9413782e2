use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// VISIT
// ==============================================================================

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    #[default]
    Planned,
    Done,
    Cancelled,
}

impl fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisitStatus::Planned => write!(f, "planned"),
            VisitStatus::Done => write!(f, "done"),
            VisitStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Visit {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    #[serde(default)]
    pub status: VisitStatus,
    pub planned_datetime: Option<DateTime<Utc>>,
    pub actual_datetime: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Visit {
    pub fn is_done(&self) -> bool {
        self.status == VisitStatus::Done
    }

    /// Each visit counts once towards a doctor's totals.
    pub fn visit_count(&self) -> u32 {
        1
    }

    /// When the visit took place, or was planned to.
    pub fn effective_datetime(&self) -> Option<DateTime<Utc>> {
        self.actual_datetime.or(self.planned_datetime)
    }
}

/// Blank visit pre-populated for a patient, returned to the client for editing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitDraft {
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub status: VisitStatus,
    pub planned_datetime: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVisitRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    #[serde(default)]
    pub status: VisitStatus,
    pub planned_datetime: Option<DateTime<Utc>>,
    pub actual_datetime: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisitField {
    DoctorId,
    PatientId,
    Status,
    PlannedDatetime,
    ActualDatetime,
    Notes,
}

impl fmt::Display for VisitField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisitField::DoctorId => write!(f, "doctor_id"),
            VisitField::PatientId => write!(f, "patient_id"),
            VisitField::Status => write!(f, "status"),
            VisitField::PlannedDatetime => write!(f, "planned_datetime"),
            VisitField::ActualDatetime => write!(f, "actual_datetime"),
            VisitField::Notes => write!(f, "notes"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateVisitRequest {
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub status: Option<VisitStatus>,
    pub planned_datetime: Option<DateTime<Utc>>,
    pub actual_datetime: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    /// The `clear_*` flags write null and win over the matching value.
    #[serde(default)]
    pub clear_planned_datetime: bool,
    #[serde(default)]
    pub clear_actual_datetime: bool,
    #[serde(default)]
    pub clear_notes: bool,
}

impl UpdateVisitRequest {
    /// Fields present in the request, whether or not the value differs.
    pub fn changed_fields(&self) -> Vec<VisitField> {
        let mut fields = Vec::new();
        if self.doctor_id.is_some() {
            fields.push(VisitField::DoctorId);
        }
        if self.patient_id.is_some() {
            fields.push(VisitField::PatientId);
        }
        if self.status.is_some() {
            fields.push(VisitField::Status);
        }
        if self.planned_datetime.is_some() || self.clear_planned_datetime {
            fields.push(VisitField::PlannedDatetime);
        }
        if self.actual_datetime.is_some() || self.clear_actual_datetime {
            fields.push(VisitField::ActualDatetime);
        }
        if self.notes.is_some() || self.clear_notes {
            fields.push(VisitField::Notes);
        }
        fields
    }

    /// The visit as it would look after this write.
    pub fn apply_to(&self, visit: &Visit) -> Visit {
        let mut updated = visit.clone();
        if let Some(doctor_id) = self.doctor_id {
            updated.doctor_id = doctor_id;
        }
        if let Some(patient_id) = self.patient_id {
            updated.patient_id = patient_id;
        }
        if let Some(status) = self.status {
            updated.status = status;
        }
        if self.clear_planned_datetime {
            updated.planned_datetime = None;
        } else if let Some(planned) = self.planned_datetime {
            updated.planned_datetime = Some(planned);
        }
        if self.clear_actual_datetime {
            updated.actual_datetime = None;
        } else if let Some(actual) = self.actual_datetime {
            updated.actual_datetime = Some(actual);
        }
        if self.clear_notes {
            updated.notes = None;
        } else if let Some(notes) = &self.notes {
            updated.notes = Some(notes.clone());
        }
        updated
    }
}

/// Per-write options. `skip_edit_check` suppresses the completed-visit lock for a single write.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WriteOptions {
    #[serde(default)]
    pub skip_edit_check: bool,
}

impl WriteOptions {
    pub fn system() -> Self {
        Self { skip_edit_check: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteVisitRequest {
    pub actual_datetime: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisitSearchQuery {
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub status: Option<VisitStatus>,
    pub planned_from: Option<DateTime<Utc>>,
    pub planned_to: Option<DateTime<Utc>>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum VisitError {
    #[error("Visit not found")]
    NotFound,

    #[error("You cannot change completed visit.")]
    EditLocked,

    #[error("This patient is already scheduled with this doctor on this day.")]
    Duplicate,

    #[error("You cannot delete visits with diagnoses.")]
    HasDiagnoses,

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for VisitError {
    fn from(e: anyhow::Error) -> Self {
        VisitError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for VisitError {
    fn from(e: serde_json::Error) -> Self {
        VisitError::Database(format!("Unexpected row format: {}", e))
    }
}

impl From<VisitError> for AppError {
    fn from(e: VisitError) -> Self {
        match e {
            VisitError::NotFound => AppError::NotFound(e.to_string()),
            VisitError::EditLocked
            | VisitError::Duplicate
            | VisitError::HasDiagnoses
            | VisitError::Validation(_) => AppError::ValidationError(e.to_string()),
            VisitError::Database(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn visit(status: VisitStatus) -> Visit {
        Visit {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            status,
            planned_datetime: Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()),
            actual_datetime: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_changed_fields_follow_request() {
        let request = UpdateVisitRequest {
            notes: Some("follow-up".to_string()),
            ..Default::default()
        };
        assert_eq!(request.changed_fields(), vec![VisitField::Notes]);

        let request = UpdateVisitRequest {
            doctor_id: Some(Uuid::new_v4()),
            status: Some(VisitStatus::Done),
            ..Default::default()
        };
        assert_eq!(request.changed_fields(), vec![VisitField::DoctorId, VisitField::Status]);
    }

    #[test]
    fn test_apply_to_keeps_untouched_fields() {
        let original = visit(VisitStatus::Planned);
        let request = UpdateVisitRequest {
            status: Some(VisitStatus::Done),
            ..Default::default()
        };

        let updated = request.apply_to(&original);
        assert!(updated.is_done());
        assert_eq!(updated.doctor_id, original.doctor_id);
        assert_eq!(updated.planned_datetime, original.planned_datetime);
    }

    #[test]
    fn test_clear_flags_blank_the_field() {
        let mut original = visit(VisitStatus::Planned);
        original.notes = Some("fasting".to_string());

        let request: UpdateVisitRequest = serde_json::from_value(serde_json::json!({
            "notes": "ignored",
            "clear_notes": true,
            "clear_planned_datetime": true
        }))
        .unwrap();

        assert_eq!(
            request.changed_fields(),
            vec![VisitField::PlannedDatetime, VisitField::Notes]
        );
        let updated = request.apply_to(&original);
        assert_eq!(updated.notes, None);
        assert_eq!(updated.planned_datetime, None);
        assert_eq!(updated.doctor_id, original.doctor_id);
    }

    #[test]
    fn test_effective_datetime_prefers_actual() {
        let mut v = visit(VisitStatus::Done);
        assert_eq!(v.effective_datetime(), v.planned_datetime);

        let actual = Utc.with_ymd_and_hms(2024, 3, 1, 9, 40, 0).unwrap();
        v.actual_datetime = Some(actual);
        assert_eq!(v.effective_datetime(), Some(actual));
        assert_eq!(v.visit_count(), 1);
    }

    #[test]
    fn test_status_defaults_to_planned() {
        let request: CreateVisitRequest = serde_json::from_value(serde_json::json!({
            "doctor_id": Uuid::new_v4(),
            "patient_id": Uuid::new_v4()
        }))
        .unwrap();
        assert_eq!(request.status, VisitStatus::Planned);
    }
}
