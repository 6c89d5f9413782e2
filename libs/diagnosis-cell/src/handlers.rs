use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, Extension},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use security_cell::{AccessPolicy, Actor, ActorResolver, Operation, Resource};
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    CreateDiagnosisRequest, CreateDiseaseRequest, Diagnosis, DiagnosisSearchQuery,
    UpdateDiagnosisRequest, UpdateDiseaseRequest,
};
use crate::services::{DiagnosisService, DiseaseService};

#[derive(Debug, Deserialize)]
pub struct DiseaseListQuery {
    pub parent_id: Option<Uuid>,
}

/// Record-scope check against the visit a diagnosis hangs off.
async fn authorize_diagnosis(
    actor: &Actor,
    operation: Operation,
    diagnosis: &Diagnosis,
    service: &DiagnosisService,
    auth_token: &str,
) -> Result<(), AppError> {
    let (doctor_id, patient_id) = match &diagnosis.visit {
        Some(visit) => (visit.doctor_id, visit.patient_id),
        None => {
            let visit = service.get_visit(diagnosis.visit_id, auth_token).await?;
            (visit.doctor_id, visit.patient_id)
        }
    };
    AccessPolicy::authorize_visit(actor, Resource::Diagnosis, operation, doctor_id, patient_id)?;
    Ok(())
}

// ==============================================================================
// DIAGNOSIS HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_diagnosis(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDiagnosisRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Diagnosis, Operation::Create)?;

    let service = DiagnosisService::new(&state);
    let visit = service.get_visit(request.visit_id, token).await?;
    AccessPolicy::authorize_visit(&actor, Resource::Diagnosis, Operation::Create, visit.doctor_id, visit.patient_id)?;

    let diagnosis = service.create_diagnosis(&visit, request, token).await?;

    Ok(Json(json!(diagnosis.view())))
}

#[axum::debug_handler]
pub async fn get_diagnosis(
    State(state): State<Arc<AppConfig>>,
    Path(diagnosis_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Diagnosis, Operation::Read)?;

    let service = DiagnosisService::new(&state);
    let diagnosis = service.get_diagnosis(diagnosis_id, token).await?;
    authorize_diagnosis(&actor, Operation::Read, &diagnosis, &service, token).await?;

    Ok(Json(json!(diagnosis.view())))
}

#[axum::debug_handler]
pub async fn list_diagnoses(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<DiagnosisSearchQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Diagnosis, Operation::Read)?;

    let diagnoses = DiagnosisService::new(&state)
        .list_diagnoses(query, &actor.record_scope(), token)
        .await?;
    let views: Vec<_> = diagnoses.iter().map(Diagnosis::view).collect();

    Ok(Json(json!({
        "diagnoses": views,
        "total": views.len()
    })))
}

#[axum::debug_handler]
pub async fn update_diagnosis(
    State(state): State<Arc<AppConfig>>,
    Path(diagnosis_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDiagnosisRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Diagnosis, Operation::Write)?;

    let service = DiagnosisService::new(&state);
    let current = service.get_diagnosis(diagnosis_id, token).await?;
    authorize_diagnosis(&actor, Operation::Write, &current, &service, token).await?;

    let target_visit = service
        .get_visit(request.visit_id.unwrap_or(current.visit_id), token)
        .await?;
    AccessPolicy::authorize_visit(
        &actor,
        Resource::Diagnosis,
        Operation::Write,
        target_visit.doctor_id,
        target_visit.patient_id,
    )?;

    let diagnosis = service
        .update_diagnosis(current, &target_visit, request, token)
        .await?;

    Ok(Json(json!(diagnosis.view())))
}

#[axum::debug_handler]
pub async fn delete_diagnosis(
    State(state): State<Arc<AppConfig>>,
    Path(diagnosis_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Diagnosis, Operation::Delete)?;

    let service = DiagnosisService::new(&state);
    let diagnosis = service.get_diagnosis(diagnosis_id, token).await?;
    authorize_diagnosis(&actor, Operation::Delete, &diagnosis, &service, token).await?;

    service.delete_diagnosis(diagnosis_id, token).await?;

    Ok(Json(json!({
        "deleted": true,
        "diagnosis_id": diagnosis_id
    })))
}

// ==============================================================================
// DISEASE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_diseases(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<DiseaseListQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Disease, Operation::Read)?;

    let diseases = DiseaseService::new(&state).list_diseases(query.parent_id, token).await?;

    Ok(Json(json!({
        "diseases": diseases,
        "total": diseases.len()
    })))
}

#[axum::debug_handler]
pub async fn get_disease(
    State(state): State<Arc<AppConfig>>,
    Path(disease_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Disease, Operation::Read)?;

    let disease = DiseaseService::new(&state).get_with_children(disease_id, token).await?;

    Ok(Json(json!(disease)))
}

#[axum::debug_handler]
pub async fn create_disease(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDiseaseRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Disease, Operation::Create)?;

    let disease = DiseaseService::new(&state).create_disease(request, token).await?;

    Ok(Json(json!(disease)))
}

#[axum::debug_handler]
pub async fn update_disease(
    State(state): State<Arc<AppConfig>>,
    Path(disease_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDiseaseRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Disease, Operation::Write)?;

    let disease = DiseaseService::new(&state).update_disease(disease_id, request, token).await?;

    Ok(Json(json!(disease)))
}

#[axum::debug_handler]
pub async fn delete_disease(
    State(state): State<Arc<AppConfig>>,
    Path(disease_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Disease, Operation::Delete)?;

    let deleted = DiseaseService::new(&state).delete_disease(disease_id, token).await?;

    Ok(Json(json!({
        "deleted": deleted,
        "total": deleted.len()
    })))
}
