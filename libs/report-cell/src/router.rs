use std::sync::Arc;

use axum::{
    Router,
    routing::post,
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn report_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/diagnoses/filter", post(handlers::diagnosis_report_filter))
        .route("/diagnoses", post(handlers::diagnosis_report))
        .route("/doctors", post(handlers::doctor_report))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
