use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use shared_models::error::AppError;
use shared_models::person::{Gender, PersonDetails};

// ==============================================================================
// DOCTOR
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    #[serde(flatten)]
    pub person: PersonDetails,
    /// Stored projection of `first_name last_name`, rewritten on every name change.
    #[serde(default)]
    pub name: String,
    pub specialty_id: Option<Uuid>,
    #[serde(default)]
    pub is_intern: bool,
    pub mentor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        self.person.full_name()
    }

    /// The mentor field only makes sense for interns, so the edit form hides it otherwise.
    /// Presentation only: the API still accepts a mentor on a non-intern.
    pub fn form_layout(&self) -> DoctorFormLayout {
        let mut hidden_fields = Vec::new();
        if !self.is_intern {
            hidden_fields.push("mentor_id".to_string());
        }
        DoctorFormLayout {
            doctor_id: self.id,
            mentor_visible: self.is_intern,
            hidden_fields,
        }
    }
}

/// Comma-separated names of the given interns, empty when there are none.
pub fn interns_names(interns: &[Doctor]) -> String {
    interns
        .iter()
        .map(Doctor::full_name)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    #[serde(flatten)]
    pub doctor: Doctor,
    pub interns_names: String,
    pub intern_ids: Vec<Uuid>,
}

impl DoctorProfile {
    pub fn new(mut doctor: Doctor, interns: &[Doctor]) -> Self {
        doctor.name = doctor.full_name();
        Self {
            interns_names: interns_names(interns),
            intern_ids: interns.iter().map(|intern| intern.id).collect(),
            doctor,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorFormLayout {
    pub doctor_id: Uuid,
    pub mentor_visible: bool,
    pub hidden_fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
    pub gender: Option<Gender>,
    pub user_id: Option<Uuid>,
    pub specialty_id: Option<Uuid>,
    #[serde(default)]
    pub is_intern: bool,
    pub mentor_id: Option<Uuid>,
}

impl CreateDoctorRequest {
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
pub struct UpdateDoctorRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
    pub gender: Option<Gender>,
    pub user_id: Option<Uuid>,
    pub specialty_id: Option<Uuid>,
    pub is_intern: Option<bool>,
    pub mentor_id: Option<Uuid>,
    /// Unlinks the mentor; wins over `mentor_id`.
    #[serde(default)]
    pub clear_mentor: bool,
}

impl UpdateDoctorRequest {
    pub fn touches_name(&self) -> bool {
        self.first_name.is_some() || self.last_name.is_some()
    }

    /// Mentor to validate and store, `None` when the mentor is untouched or cleared.
    pub fn new_mentor(&self) -> Option<Uuid> {
        if self.clear_mentor {
            None
        } else {
            self.mentor_id
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorSearchQuery {
    pub name: Option<String>,
    pub specialty_id: Option<Uuid>,
    pub is_intern: Option<bool>,
    pub mentor_id: Option<Uuid>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

// ==============================================================================
// SPECIALTY
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Specialty {
    pub id: Uuid,
    pub name: String,
    /// Language code -> translated name.
    #[serde(default)]
    pub translations: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Specialty {
    pub fn localized_name(&self, lang: &str) -> &str {
        self.translations
            .get(lang)
            .map(String::as_str)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(self.name.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSpecialtyRequest {
    pub name: String,
    pub translations: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSpecialtyRequest {
    pub name: Option<String>,
    pub translations: Option<HashMap<String, String>>,
}

pub fn validate_specialty_name(name: &str) -> Result<String, DoctorError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DoctorError::Validation("Specialty name is required".to_string()));
    }
    Ok(trimmed.to_string())
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Mentor not found")]
    MentorNotFound,

    #[error("Specialty not found")]
    SpecialtyNotFound,

    #[error("{0}")]
    InvalidMentor(String),

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for DoctorError {
    fn from(e: anyhow::Error) -> Self {
        DoctorError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for DoctorError {
    fn from(e: serde_json::Error) -> Self {
        DoctorError::Database(format!("Unexpected row format: {}", e))
    }
}

impl From<DoctorError> for AppError {
    fn from(e: DoctorError) -> Self {
        match e {
            DoctorError::NotFound | DoctorError::SpecialtyNotFound => AppError::NotFound(e.to_string()),
            DoctorError::MentorNotFound
            | DoctorError::InvalidMentor(_)
            | DoctorError::Validation(_) => AppError::ValidationError(e.to_string()),
            DoctorError::Database(msg) => AppError::Database(msg),
        }
    }
}

/// Checks the mentor rules for `doctor_id` (None while creating).
pub fn validate_mentor(doctor_id: Option<Uuid>, mentor: &Doctor) -> Result<(), DoctorError> {
    if doctor_id == Some(mentor.id) {
        return Err(DoctorError::InvalidMentor("A doctor cannot mentor themselves".to_string()));
    }
    if mentor.is_intern {
        return Err(DoctorError::InvalidMentor(format!(
            "{} is an intern and cannot be a mentor",
            mentor.full_name()
        )));
    }
    Ok(())
}
