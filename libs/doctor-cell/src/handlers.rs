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

use security_cell::{AccessPolicy, ActorResolver, Operation, Resource};
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    CreateDoctorRequest, CreateSpecialtyRequest, DoctorSearchQuery, UpdateDoctorRequest,
    UpdateSpecialtyRequest,
};
use crate::services::{DoctorService, SpecialtyService};

#[derive(Debug, Deserialize)]
pub struct LanguageQuery {
    pub lang: Option<String>,
}

// ==============================================================================
// DOCTOR HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Doctor, Operation::Create)?;

    let doctor = DoctorService::new(&state).create_doctor(request, token).await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Doctor, Operation::Read)?;

    let profile = DoctorService::new(&state).get_doctor_profile(doctor_id, token).await?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn get_doctor_form(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Doctor, Operation::Read)?;

    let doctor = DoctorService::new(&state).get_doctor(doctor_id, token).await?;

    Ok(Json(json!(doctor.form_layout())))
}

#[axum::debug_handler]
pub async fn search_doctors(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<DoctorSearchQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Doctor, Operation::Read)?;

    let doctors = DoctorService::new(&state).search_doctors(query, token).await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn list_interns(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Doctor, Operation::Read)?;

    let interns = DoctorService::new(&state).list_interns(doctor_id, token).await?;

    Ok(Json(json!({
        "mentor_id": doctor_id,
        "interns": interns,
        "total": interns.len()
    })))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Doctor, Operation::Write)?;

    let doctor = DoctorService::new(&state).update_doctor(doctor_id, request, token).await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn delete_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Doctor, Operation::Delete)?;

    DoctorService::new(&state).delete_doctor(doctor_id, token).await?;

    Ok(Json(json!({
        "deleted": true,
        "doctor_id": doctor_id
    })))
}

// ==============================================================================
// SPECIALTY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_specialties(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<LanguageQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Specialty, Operation::Read)?;

    let specialties = SpecialtyService::new(&state).list_specialties(token).await?;
    let lang = query.lang.unwrap_or_default();

    let items: Vec<Value> = specialties
        .iter()
        .map(|specialty| json!({
            "id": specialty.id,
            "name": specialty.name,
            "localized_name": specialty.localized_name(&lang),
            "translations": specialty.translations,
        }))
        .collect();

    Ok(Json(json!({
        "specialties": items,
        "total": items.len()
    })))
}

#[axum::debug_handler]
pub async fn get_specialty(
    State(state): State<Arc<AppConfig>>,
    Path(specialty_id): Path<Uuid>,
    Query(query): Query<LanguageQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Specialty, Operation::Read)?;

    let specialty = SpecialtyService::new(&state).get_specialty(specialty_id, token).await?;
    let lang = query.lang.unwrap_or_default();

    Ok(Json(json!({
        "id": specialty.id,
        "name": specialty.name,
        "localized_name": specialty.localized_name(&lang),
        "translations": specialty.translations,
        "created_at": specialty.created_at,
    })))
}

#[axum::debug_handler]
pub async fn create_specialty(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateSpecialtyRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Specialty, Operation::Create)?;

    let specialty = SpecialtyService::new(&state).create_specialty(request, token).await?;

    Ok(Json(json!(specialty)))
}

#[axum::debug_handler]
pub async fn update_specialty(
    State(state): State<Arc<AppConfig>>,
    Path(specialty_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateSpecialtyRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Specialty, Operation::Write)?;

    let specialty = SpecialtyService::new(&state)
        .update_specialty(specialty_id, request, token)
        .await?;

    Ok(Json(json!(specialty)))
}

#[axum::debug_handler]
pub async fn delete_specialty(
    State(state): State<Arc<AppConfig>>,
    Path(specialty_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Specialty, Operation::Delete)?;

    SpecialtyService::new(&state).delete_specialty(specialty_id, token).await?;

    Ok(Json(json!({
        "deleted": true,
        "specialty_id": specialty_id
    })))
}
