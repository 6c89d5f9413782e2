use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, Extension},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use security_cell::{AccessPolicy, ActorResolver, Operation, Resource};
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    CompleteVisitRequest, CreateVisitRequest, UpdateVisitRequest, VisitSearchQuery, WriteOptions,
};
use crate::services::VisitService;

#[axum::debug_handler]
pub async fn create_visit(
    State(state): State<Arc<AppConfig>>,
    Query(options): Query<WriteOptions>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateVisitRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize_visit(
        &actor,
        Resource::Visit,
        Operation::Create,
        request.doctor_id,
        request.patient_id,
    )?;
    if options.skip_edit_check {
        AccessPolicy::authorize_lock_override(&actor)?;
    }

    let visit = VisitService::new(&state).create_visit(request, options, token).await?;

    Ok(Json(json!(visit)))
}

#[axum::debug_handler]
pub async fn get_visit(
    State(state): State<Arc<AppConfig>>,
    Path(visit_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Visit, Operation::Read)?;

    let visit = VisitService::new(&state).get_visit(visit_id, token).await?;
    AccessPolicy::authorize_visit(&actor, Resource::Visit, Operation::Read, visit.doctor_id, visit.patient_id)?;

    Ok(Json(json!(visit)))
}

#[axum::debug_handler]
pub async fn list_visits(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<VisitSearchQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Visit, Operation::Read)?;

    let visits = VisitService::new(&state)
        .list_visits(query, &actor.record_scope(), token)
        .await?;

    Ok(Json(json!({
        "visits": visits,
        "total": visits.len()
    })))
}

#[axum::debug_handler]
pub async fn update_visit(
    State(state): State<Arc<AppConfig>>,
    Path(visit_id): Path<Uuid>,
    Query(options): Query<WriteOptions>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateVisitRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Visit, Operation::Write)?;
    if options.skip_edit_check {
        AccessPolicy::authorize_lock_override(&actor)?;
    }

    let visit_service = VisitService::new(&state);
    let current = visit_service.get_visit(visit_id, token).await?;
    AccessPolicy::authorize_visit(&actor, Resource::Visit, Operation::Write, current.doctor_id, current.patient_id)?;

    // The visit must stay inside the actor's records after the write too.
    let target = request.apply_to(&current);
    AccessPolicy::authorize_visit(&actor, Resource::Visit, Operation::Write, target.doctor_id, target.patient_id)?;

    let visit = visit_service.apply_update(current, request, options, token).await?;

    Ok(Json(json!(visit)))
}

#[axum::debug_handler]
pub async fn complete_visit(
    State(state): State<Arc<AppConfig>>,
    Path(visit_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CompleteVisitRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Visit, Operation::Write)?;

    let visit_service = VisitService::new(&state);
    let current = visit_service.get_visit(visit_id, token).await?;
    AccessPolicy::authorize_visit(&actor, Resource::Visit, Operation::Write, current.doctor_id, current.patient_id)?;

    let visit = visit_service
        .complete_visit(current, request.actual_datetime, token)
        .await?;

    Ok(Json(json!(visit)))
}

#[axum::debug_handler]
pub async fn delete_visit(
    State(state): State<Arc<AppConfig>>,
    Path(visit_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Visit, Operation::Delete)?;

    let visit_service = VisitService::new(&state);
    let current = visit_service.get_visit(visit_id, token).await?;
    AccessPolicy::authorize_visit(&actor, Resource::Visit, Operation::Delete, current.doctor_id, current.patient_id)?;

    visit_service.delete_visit(visit_id, token).await?;

    Ok(Json(json!({
        "deleted": true,
        "visit_id": visit_id
    })))
}
