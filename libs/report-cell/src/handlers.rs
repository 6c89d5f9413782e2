use std::sync::Arc;

use axum::{
    extract::{State, Extension},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};

use security_cell::{AccessPolicy, ActorResolver, Operation, Resource};
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{DiagnosisReportRequest, DoctorReportRequest};
use crate::services::{DiagnosisReportService, DoctorReportService};

/// Returns the filter descriptor without running it.
#[axum::debug_handler]
pub async fn diagnosis_report_filter(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<DiagnosisReportRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = ActorResolver::new(&state).resolve(&user, auth.token()).await?;
    AccessPolicy::authorize(&actor, Resource::Diagnosis, Operation::Read)?;

    request.validate()?;

    Ok(Json(json!(request.to_action())))
}

#[axum::debug_handler]
pub async fn diagnosis_report(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<DiagnosisReportRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Diagnosis, Operation::Read)?;

    let report = DiagnosisReportService::new(&state)
        .run(request, &actor.record_scope(), token)
        .await?;

    Ok(Json(json!(report)))
}

#[axum::debug_handler]
pub async fn doctor_report(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<DoctorReportRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let actor = ActorResolver::new(&state).resolve(&user, token).await?;
    AccessPolicy::authorize(&actor, Resource::Doctor, Operation::Read)?;
    AccessPolicy::authorize(&actor, Resource::Visit, Operation::Read)?;

    let report = DoctorReportService::new(&state)
        .build(request, &actor.record_scope(), token)
        .await?;

    Ok(Json(json!(report)))
}
