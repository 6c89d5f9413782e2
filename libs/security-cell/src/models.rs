// =====================================================================================
// SECURITY CELL MODELS
// =====================================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

// =====================================================================================
// ROLES, RESOURCES, OPERATIONS
// =====================================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Intern,
    Doctor,
    Manager,
    Admin,
}

impl Role {
    /// Maps the JWT `role` claim onto a hospital role.
    pub fn from_claim(claim: Option<&str>) -> Result<Self, AccessError> {
        let claim = claim.ok_or(AccessError::MissingRole)?;
        match claim.trim().to_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "intern" => Ok(Role::Intern),
            "doctor" => Ok(Role::Doctor),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            other => Err(AccessError::UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "patient"),
            Role::Intern => write!(f, "intern"),
            Role::Doctor => write!(f, "doctor"),
            Role::Manager => write!(f, "manager"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Doctor,
    Patient,
    Specialty,
    Disease,
    Visit,
    Diagnosis,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Doctor => write!(f, "doctor"),
            Resource::Patient => write!(f, "patient"),
            Resource::Specialty => write!(f, "specialty"),
            Resource::Disease => write!(f, "disease"),
            Resource::Visit => write!(f, "visit"),
            Resource::Diagnosis => write!(f, "diagnosis"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Read,
    Create,
    Write,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Read => write!(f, "read"),
            Operation::Create => write!(f, "create"),
            Operation::Write => write!(f, "write"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

// =====================================================================================
// ACTOR & RECORD SCOPE
// =====================================================================================

/// The authenticated user together with the hospital records linked to their account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub intern_ids: Vec<Uuid>,
}

impl Actor {
    pub fn new(user_id: &str, role: Role) -> Self {
        Self {
            user_id: user_id.to_string(),
            role,
            doctor_id: None,
            patient_id: None,
            intern_ids: Vec::new(),
        }
    }

    /// Which visits (and the diagnoses recorded on them) this actor may see and touch.
    pub fn record_scope(&self) -> RecordScope {
        match self.role {
            Role::Admin | Role::Manager => RecordScope::All,
            Role::Patient => match self.patient_id {
                Some(patient_id) => RecordScope::Patient(patient_id),
                None => RecordScope::Nothing,
            },
            Role::Intern => match self.doctor_id {
                Some(doctor_id) => RecordScope::Doctors(vec![doctor_id]),
                None => RecordScope::Nothing,
            },
            Role::Doctor => match self.doctor_id {
                Some(doctor_id) => {
                    let mut doctors = vec![doctor_id];
                    doctors.extend(self.intern_ids.iter().copied());
                    RecordScope::Doctors(doctors)
                }
                None => RecordScope::Nothing,
            },
        }
    }

    /// Patients only see their own patient card.
    pub fn can_see_patient(&self, patient_id: Uuid) -> bool {
        match self.role {
            Role::Patient => self.patient_id == Some(patient_id),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordScope {
    All,
    Patient(Uuid),
    Doctors(Vec<Uuid>),
    Nothing,
}

impl RecordScope {
    pub fn allows(&self, doctor_id: Uuid, patient_id: Uuid) -> bool {
        match self {
            RecordScope::All => true,
            RecordScope::Patient(own) => *own == patient_id,
            RecordScope::Doctors(doctors) => doctors.contains(&doctor_id),
            RecordScope::Nothing => false,
        }
    }

    pub fn ensure_allows(&self, doctor_id: Uuid, patient_id: Uuid) -> Result<(), AccessError> {
        if self.allows(doctor_id, patient_id) {
            Ok(())
        } else {
            Err(AccessError::OutOfScope(format!(
                "visit of doctor {} with patient {} is outside your records",
                doctor_id, patient_id
            )))
        }
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, RecordScope::Nothing)
    }

    /// PostgREST filter restricting visit rows to this scope. `prefix` addresses an
    /// embedded visit (e.g. `"visit."` when querying diagnoses).
    pub fn filter_params(&self, prefix: &str) -> Option<String> {
        match self {
            RecordScope::All => None,
            RecordScope::Patient(patient_id) => {
                Some(format!("{}patient_id=eq.{}", prefix, patient_id))
            }
            RecordScope::Doctors(doctors) if !doctors.is_empty() => {
                let ids: Vec<String> = doctors.iter().map(Uuid::to_string).collect();
                Some(format!("{}doctor_id=in.({})", prefix, ids.join(",")))
            }
            RecordScope::Doctors(_) | RecordScope::Nothing => {
                Some(format!("{}id=is.null", prefix))
            }
        }
    }
}

// =====================================================================================
// ERRORS
// =====================================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AccessError {
    #[error("Missing role claim")]
    MissingRole,

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Role {role} may not {operation} {resource} records")]
    Forbidden {
        role: Role,
        operation: Operation,
        resource: Resource,
    },

    #[error("Access denied: {0}")]
    OutOfScope(String),

    #[error("Could not resolve account records: {0}")]
    Lookup(String),
}

impl From<AccessError> for AppError {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::Lookup(msg) => AppError::Database(msg),
            other => AppError::AccessDenied(other.to_string()),
        }
    }
}
