use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, Extension},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use diagnosis_cell::{DiagnosisSearchQuery, DiagnosisService};
use security_cell::{AccessPolicy, ActorResolver, Operation, Resource, Role};
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use visit_cell::{VisitDraft, VisitSearchQuery, VisitService, VisitStatus};

use crate::models::{
    BulkAssignDoctorRequest, CreatePatientRequest, PatientSearchQuery, UpdatePatientRequest,
};
use crate::services::{BulkAssignService, PatientService};

#[axum::debug_handler]
pub async fn create_patient(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Patient, Operation::Create)?;

    let patient = PatientService::new(&state).create_patient(request, token).await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize_patient(&actor, Operation::Read, patient_id)?;

    let profile = PatientService::new(&state).get_patient_profile(patient_id, token).await?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn search_patients(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<PatientSearchQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Patient, Operation::Read)?;

    let patients = if actor.role == Role::Patient {
        match actor.patient_id {
            Some(own) => PatientService::new(&state).search_patients(query, Some(own), token).await?,
            None => Vec::new(),
        }
    } else {
        PatientService::new(&state).search_patients(query, None, token).await?
    };

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len()
    })))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize_patient(&actor, Operation::Write, patient_id)?;

    let patient = PatientService::new(&state)
        .update_patient(patient_id, request, token)
        .await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn delete_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize_patient(&actor, Operation::Delete, patient_id)?;

    PatientService::new(&state).delete_patient(patient_id, token).await?;

    Ok(Json(json!({
        "deleted": true,
        "patient_id": patient_id
    })))
}

/// Diagnosis history, looked up live through the patient's visits.
#[axum::debug_handler]
pub async fn get_patient_diagnoses(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize_patient(&actor, Operation::Read, patient_id)?;
    AccessPolicy::authorize(&actor, Resource::Diagnosis, Operation::Read)?;

    let query = DiagnosisSearchQuery {
        patient_id: Some(patient_id),
        ..Default::default()
    };
    let diagnoses = DiagnosisService::new(&state)
        .list_diagnoses(query, &actor.record_scope(), token)
        .await?;
    let views: Vec<_> = diagnoses.iter().map(|diagnosis| diagnosis.view()).collect();

    Ok(Json(json!({
        "patient_id": patient_id,
        "diagnoses": views,
        "total": views.len()
    })))
}

#[axum::debug_handler]
pub async fn get_patient_visits(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize_patient(&actor, Operation::Read, patient_id)?;
    AccessPolicy::authorize(&actor, Resource::Visit, Operation::Read)?;

    let query = VisitSearchQuery {
        patient_id: Some(patient_id),
        ..Default::default()
    };
    let visits = VisitService::new(&state)
        .list_visits(query, &actor.record_scope(), token)
        .await?;

    Ok(Json(json!({
        "patient_id": patient_id,
        "visits": visits,
        "total": visits.len()
    })))
}

/// Blank visit pre-filled with the patient. Doctors get themselves as the doctor,
/// everyone else the patient's personal doctor.
#[axum::debug_handler]
pub async fn new_patient_visit(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize_patient(&actor, Operation::Read, patient_id)?;
    AccessPolicy::authorize(&actor, Resource::Visit, Operation::Create)?;

    let patient = PatientService::new(&state).get_patient(patient_id, token).await?;

    let draft = VisitDraft {
        patient_id: patient.id,
        doctor_id: actor.doctor_id.or(patient.personal_doctor_id),
        status: VisitStatus::Planned,
        planned_datetime: None,
    };

    Ok(Json(json!(draft)))
}

#[axum::debug_handler]
pub async fn bulk_assign_doctor(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BulkAssignDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Patient, Operation::Write)?;

    info!(
        "User {} assigning doctor {} to {} patient(s)",
        actor.user_id,
        request.doctor_id,
        request.patient_ids.len()
    );
    let result = BulkAssignService::new(&state).assign_doctor(request, token).await?;

    Ok(Json(json!(result)))
}
