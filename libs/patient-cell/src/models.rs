use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Datelike, NaiveDate, Utc};

use shared_models::error::AppError;
use shared_models::person::{Gender, PersonDetails};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    #[serde(flatten)]
    pub person: PersonDetails,
    #[serde(default)]
    pub name: String,
    pub personal_doctor_id: Option<Uuid>,
    pub birth_date: Option<NaiveDate>,
    pub passport_data: Option<String>,
    /// Emergency contact.
    pub contact_person: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        self.person.full_name()
    }

    pub fn age_on(&self, today: NaiveDate) -> u32 {
        age_on(self.birth_date, today)
    }

    pub fn age(&self) -> u32 {
        self.age_on(Utc::now().date_naive())
    }
}

/// Whole years between `birth_date` and `today`; 0 without a birth date.
pub fn age_on(birth_date: Option<NaiveDate>, today: NaiveDate) -> u32 {
    let Some(birth) = birth_date else {
        return 0;
    };

    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientProfile {
    #[serde(flatten)]
    pub patient: Patient,
    pub age: u32,
}

impl PatientProfile {
    pub fn new(mut patient: Patient) -> Self {
        patient.name = patient.full_name();
        Self {
            age: patient.age(),
            patient,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePatientRequest {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
    pub gender: Option<Gender>,
    pub user_id: Option<Uuid>,
    pub personal_doctor_id: Option<Uuid>,
    pub birth_date: Option<NaiveDate>,
    pub passport_data: Option<String>,
    pub contact_person: Option<String>,
}

impl CreatePatientRequest {
    /// Person details with the name parts trimmed.
    pub fn person(&self) -> PersonDetails {
        PersonDetails {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            phone: self.phone.clone(),
            photo_url: self.photo_url.clone(),
            gender: self.gender,
            user_id: self.user_id,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePatientRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
    pub gender: Option<Gender>,
    pub user_id: Option<Uuid>,
    pub personal_doctor_id: Option<Uuid>,
    pub birth_date: Option<NaiveDate>,
    pub passport_data: Option<String>,
    pub contact_person: Option<String>,
    /// Unassigns the personal doctor; wins over `personal_doctor_id`.
    #[serde(default)]
    pub clear_personal_doctor: bool,
}

impl UpdatePatientRequest {
    pub fn touches_name(&self) -> bool {
        self.first_name.is_some() || self.last_name.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientSearchQuery {
    pub name: Option<String>,
    pub personal_doctor_id: Option<Uuid>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

// ==============================================================================
// BULK DOCTOR ASSIGNMENT
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkAssignDoctorRequest {
    pub doctor_id: Uuid,
    pub patient_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BulkAssignFailure {
    pub patient_id: Uuid,
    pub error: String,
}

/// Writes are applied one by one; everything before `failed` stays applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BulkAssignDoctorResult {
    pub doctor_id: Uuid,
    pub updated: Vec<Uuid>,
    pub failed: Option<BulkAssignFailure>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for PatientError {
    fn from(e: anyhow::Error) -> Self {
        PatientError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for PatientError {
    fn from(e: serde_json::Error) -> Self {
        PatientError::Database(format!("Unexpected row format: {}", e))
    }
}

impl From<PatientError> for AppError {
    fn from(e: PatientError) -> Self {
        match e {
            PatientError::NotFound => AppError::NotFound(e.to_string()),
            PatientError::DoctorNotFound | PatientError::Validation(_) => {
                AppError::ValidationError(e.to_string())
            }
            PatientError::Database(msg) => AppError::Database(msg),
        }
    }
}
