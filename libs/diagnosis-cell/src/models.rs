use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use doctor_cell::DoctorError;
use shared_models::error::AppError;
use visit_cell::VisitError;

// ==============================================================================
// DIAGNOSIS
// ==============================================================================

/// Visit columns embedded into diagnosis rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitSnapshot {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub actual_datetime: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnosis {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub disease_id: Uuid,
    pub description: Option<String>,
    #[serde(default)]
    pub approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub visit: Option<VisitSnapshot>,
}

impl Diagnosis {
    pub fn view(&self) -> DiagnosisView {
        let visit = self.visit.as_ref();
        DiagnosisView {
            id: self.id,
            visit_id: self.visit_id,
            disease_id: self.disease_id,
            description: self.description.clone(),
            approved: self.approved,
            patient_id: visit.map(|v| v.patient_id),
            doctor_id: visit.map(|v| v.doctor_id),
            diagnosis_date: visit.and_then(|v| v.actual_datetime),
            notes: visit.and_then(|v| v.notes.clone()),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Diagnosis with the read-only fields mirrored from its visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagnosisView {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub disease_id: Uuid,
    pub description: Option<String>,
    pub approved: bool,
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub diagnosis_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDiagnosisRequest {
    pub visit_id: Uuid,
    pub disease_id: Uuid,
    pub description: Option<String>,
    #[serde(default)]
    pub approved: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDiagnosisRequest {
    pub visit_id: Option<Uuid>,
    pub disease_id: Option<Uuid>,
    pub description: Option<String>,
    pub approved: Option<bool>,
}

impl UpdateDiagnosisRequest {
    pub fn needs_approval_check(&self) -> bool {
        self.approved.is_some() || self.visit_id.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosisSearchQuery {
    pub visit_id: Option<Uuid>,
    pub disease_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub approved: Option<bool>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

/// Diagnoses by an intern must be approved by their mentor.
pub fn check_approval(doctor_is_intern: bool, approved: bool) -> Result<(), DiagnosisError> {
    if doctor_is_intern && !approved {
        return Err(DiagnosisError::ApprovalRequired);
    }
    Ok(())
}

// ==============================================================================
// DISEASE
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Disease {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiseaseWithChildren {
    #[serde(flatten)]
    pub disease: Disease,
    pub children: Vec<Disease>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDiseaseRequest {
    pub name: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDiseaseRequest {
    pub name: Option<String>,
    pub parent_id: Option<Uuid>,
    /// Moves the disease to the top level.
    #[serde(default)]
    pub clear_parent: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiseaseEdge {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
}

/// `root` and everything below it, breadth first.
pub fn descendants(root: Uuid, edges: &[DiseaseEdge]) -> Vec<Uuid> {
    let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for edge in edges {
        if let Some(parent_id) = edge.parent_id {
            children.entry(parent_id).or_default().push(edge.id);
        }
    }

    let mut seen = HashSet::from([root]);
    let mut subtree = vec![root];
    let mut cursor = 0;
    while cursor < subtree.len() {
        let current = subtree[cursor];
        cursor += 1;
        for child in children.get(&current).into_iter().flatten() {
            if seen.insert(*child) {
                subtree.push(*child);
            }
        }
    }
    subtree
}

/// Whether hanging `disease_id` under `new_parent` would close a loop.
pub fn would_create_cycle(disease_id: Uuid, new_parent: Uuid, edges: &[DiseaseEdge]) -> bool {
    descendants(disease_id, edges).contains(&new_parent)
}

pub fn validate_disease_name(name: &str) -> Result<String, DiseaseError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DiseaseError::Validation("Disease name is required".to_string()));
    }
    Ok(trimmed.to_string())
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum DiagnosisError {
    #[error("Diagnosis not found")]
    NotFound,

    #[error("Visit not found")]
    VisitNotFound,

    #[error("Disease not found")]
    DiseaseNotFound,

    #[error("Diagnosis by intern must be approved by mentor.")]
    ApprovalRequired,

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for DiagnosisError {
    fn from(e: anyhow::Error) -> Self {
        DiagnosisError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for DiagnosisError {
    fn from(e: serde_json::Error) -> Self {
        DiagnosisError::Database(format!("Unexpected row format: {}", e))
    }
}

impl From<VisitError> for DiagnosisError {
    fn from(e: VisitError) -> Self {
        match e {
            VisitError::NotFound => DiagnosisError::VisitNotFound,
            VisitError::Database(msg) => DiagnosisError::Database(msg),
            other => DiagnosisError::Validation(other.to_string()),
        }
    }
}

impl From<DoctorError> for DiagnosisError {
    fn from(e: DoctorError) -> Self {
        match e {
            DoctorError::Database(msg) => DiagnosisError::Database(msg),
            other => DiagnosisError::Validation(other.to_string()),
        }
    }
}

impl From<DiagnosisError> for AppError {
    fn from(e: DiagnosisError) -> Self {
        match e {
            DiagnosisError::NotFound => AppError::NotFound(e.to_string()),
            DiagnosisError::VisitNotFound
            | DiagnosisError::DiseaseNotFound
            | DiagnosisError::ApprovalRequired
            | DiagnosisError::Validation(_) => AppError::ValidationError(e.to_string()),
            DiagnosisError::Database(msg) => AppError::Database(msg),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DiseaseError {
    #[error("Disease not found")]
    NotFound,

    #[error("Parent disease not found")]
    ParentNotFound,

    #[error("A disease cannot be placed under itself or one of its sub-diseases")]
    Cycle,

    #[error("Disease is referenced by {0} diagnosis record(s) and cannot be deleted")]
    InUse(usize),

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for DiseaseError {
    fn from(e: anyhow::Error) -> Self {
        DiseaseError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for DiseaseError {
    fn from(e: serde_json::Error) -> Self {
        DiseaseError::Database(format!("Unexpected row format: {}", e))
    }
}

impl From<DiseaseError> for AppError {
    fn from(e: DiseaseError) -> Self {
        match e {
            DiseaseError::NotFound => AppError::NotFound(e.to_string()),
            DiseaseError::ParentNotFound
            | DiseaseError::Cycle
            | DiseaseError::InUse(_)
            | DiseaseError::Validation(_) => AppError::ValidationError(e.to_string()),
            DiseaseError::Database(msg) => AppError::Database(msg),
        }
    }
}
