use std::collections::HashMap;
use std::fmt;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use diagnosis_cell::models::{DiagnosisError, DiagnosisView, DiseaseError};
use doctor_cell::models::{Doctor, DoctorError};
use shared_models::error::AppError;
use visit_cell::models::{Visit, VisitError};

pub const REPORT_TITLE: &str = "Filtered Diagnoses";
pub const REPORT_RESOURCE: &str = "diagnoses";
pub const REPORT_GROUP_BY: &str = "disease_id";
pub const REPORT_VIEWS: [&str; 4] = ["tree", "form", "pivot", "graph"];

// ==============================================================================
// DIAGNOSIS REPORT FILTER
// ==============================================================================

/// Criteria of the diagnosis report. Empty sets and missing dates match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosisReportRequest {
    #[serde(default)]
    pub doctor_ids: Vec<Uuid>,
    #[serde(default)]
    pub disease_ids: Vec<Uuid>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl DiagnosisReportRequest {
    /// An inverted date range is an input error, not an empty report. A single day is fine.
    pub fn validate(&self) -> Result<(), ReportError> {
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(ReportError::Validation(
                    "date_from must not be later than date_to".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Clauses ANDed together, in the order doctor, disease, from, to.
    pub fn domain(&self) -> Vec<FilterClause> {
        let mut domain = Vec::new();

        if !self.doctor_ids.is_empty() {
            domain.push(FilterClause {
                field: "visit.doctor_id".to_string(),
                op: FilterOp::In,
                value: ClauseValue::Ids(self.doctor_ids.clone()),
            });
        }
        if !self.disease_ids.is_empty() {
            domain.push(FilterClause {
                field: "disease_id".to_string(),
                op: FilterOp::In,
                value: ClauseValue::Ids(self.disease_ids.clone()),
            });
        }
        if let Some(from) = self.date_from {
            domain.push(FilterClause {
                field: "visit.actual_datetime".to_string(),
                op: FilterOp::Gte,
                value: ClauseValue::Date(from),
            });
        }
        if let Some(to) = self.date_to {
            domain.push(FilterClause {
                field: "visit.actual_datetime".to_string(),
                op: FilterOp::Lte,
                value: ClauseValue::Date(to),
            });
        }

        domain
    }

    pub fn to_action(&self) -> ReportAction {
        ReportAction {
            title: REPORT_TITLE.to_string(),
            resource: REPORT_RESOURCE.to_string(),
            views: REPORT_VIEWS.iter().map(|view| view.to_string()).collect(),
            domain: self.domain(),
            group_by: REPORT_GROUP_BY.to_string(),
            target: "current".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FilterOp {
    #[serde(rename = "in")]
    In,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterOp::In => write!(f, "in"),
            FilterOp::Gte => write!(f, ">="),
            FilterOp::Lte => write!(f, "<="),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ClauseValue {
    Ids(Vec<Uuid>),
    Date(NaiveDate),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterClause {
    pub field: String,
    pub op: FilterOp,
    pub value: ClauseValue,
}

impl FilterClause {
    /// PostgREST form of the clause. Dates compare against midnight UTC, and an
    /// upper date bound covers that whole day.
    pub fn to_query_param(&self) -> Result<String, ReportError> {
        let param = match (&self.op, &self.value) {
            (FilterOp::In, ClauseValue::Ids(ids)) => {
                let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();
                format!("{}=in.({})", self.field, ids.join(","))
            }
            (FilterOp::Gte, ClauseValue::Date(date)) => {
                format!("{}=gte.{}T00:00:00Z", self.field, date.format("%Y-%m-%d"))
            }
            (FilterOp::Lte, ClauseValue::Date(date)) => {
                let next_day = date.checked_add_days(Days::new(1)).ok_or_else(|| {
                    ReportError::Validation(format!("date_to {} is out of range", date))
                })?;
                format!("{}=lt.{}T00:00:00Z", self.field, next_day.format("%Y-%m-%d"))
            }
            (op, value) => {
                return Err(ReportError::Validation(format!(
                    "Unsupported filter {} {} {:?}",
                    self.field, op, value
                )))
            }
        };
        Ok(param)
    }
}

/// What the client should open: a diagnosis list filtered by `domain`, grouped by disease.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportAction {
    pub title: String,
    pub resource: String,
    pub views: Vec<String>,
    pub domain: Vec<FilterClause>,
    pub group_by: String,
    pub target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiseaseGroup {
    pub disease_id: Uuid,
    pub disease_name: Option<String>,
    pub count: usize,
    pub diagnoses: Vec<DiagnosisView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisReport {
    pub action: ReportAction,
    pub groups: Vec<DiseaseGroup>,
    pub total: usize,
}

/// Groups in order of the first diagnosis seen for each disease.
pub fn group_by_disease(
    diagnoses: Vec<DiagnosisView>,
    disease_names: &HashMap<Uuid, String>,
) -> Vec<DiseaseGroup> {
    let mut groups: Vec<DiseaseGroup> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();

    for diagnosis in diagnoses {
        let slot = *index.entry(diagnosis.disease_id).or_insert_with(|| {
            groups.push(DiseaseGroup {
                disease_id: diagnosis.disease_id,
                disease_name: disease_names.get(&diagnosis.disease_id).cloned(),
                count: 0,
                diagnoses: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].count += 1;
        groups[slot].diagnoses.push(diagnosis);
    }

    groups
}

// ==============================================================================
// DOCTOR REPORT
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorReportRequest {
    pub doctor_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestVisit {
    pub patient_id: Uuid,
    pub visit: Visit,
    pub diagnoses: Vec<DiagnosisView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorReportEntry {
    pub doctor: Doctor,
    pub visit_count: u32,
    pub latest_visits: Vec<LatestVisit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorReport {
    pub doc_ids: Vec<Uuid>,
    pub docs: Vec<DoctorReportEntry>,
    pub company: String,
    /// `%Y-%m-%d %H:%M`
    pub now: String,
}

/// Latest visit of each patient by `effective_datetime`. On a tie the visit seen
/// later wins. Patients keep the order of their first visit.
pub fn latest_visit_per_patient(visits: &[Visit]) -> Vec<&Visit> {
    let mut latest: Vec<&Visit> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();

    for visit in visits {
        match index.get(&visit.patient_id) {
            Some(&slot) => {
                if visit.effective_datetime() >= latest[slot].effective_datetime() {
                    latest[slot] = visit;
                }
            }
            None => {
                index.insert(visit.patient_id, latest.len());
                latest.push(visit);
            }
        }
    }

    latest
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum ReportError {
    #[error("Doctor {0} not found")]
    DoctorNotFound(Uuid),

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<DoctorError> for ReportError {
    fn from(e: DoctorError) -> Self {
        match e {
            DoctorError::Validation(msg) => ReportError::Validation(msg),
            other => ReportError::Database(other.to_string()),
        }
    }
}

impl From<VisitError> for ReportError {
    fn from(e: VisitError) -> Self {
        ReportError::Database(e.to_string())
    }
}

impl From<DiagnosisError> for ReportError {
    fn from(e: DiagnosisError) -> Self {
        ReportError::Database(e.to_string())
    }
}

impl From<DiseaseError> for ReportError {
    fn from(e: DiseaseError) -> Self {
        ReportError::Database(e.to_string())
    }
}

impl From<ReportError> for AppError {
    fn from(e: ReportError) -> Self {
        match e {
            ReportError::DoctorNotFound(_) => AppError::NotFound(e.to_string()),
            ReportError::Validation(msg) => AppError::ValidationError(msg),
            ReportError::Database(msg) => AppError::Database(msg),
        }
    }
}
