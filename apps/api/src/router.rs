use std::sync::Arc;

use axum::{
    Json,
    Router,
    routing::get,
};
use serde_json::{json, Value};

use diagnosis_cell::router::{diagnosis_routes, disease_routes};
use doctor_cell::router::{doctor_routes, specialty_routes};
use patient_cell::router::patient_routes;
use report_cell::router::report_routes;
use shared_config::AppConfig;
use visit_cell::router::visit_routes;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    let health_state = state.clone();

    Router::new()
        .route("/", get(|| async { "HR Hospital API is running!" }))
        .route("/health", get(move || health(health_state.clone())))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/specialties", specialty_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/visits", visit_routes(state.clone()))
        .nest("/diagnoses", diagnosis_routes(state.clone()))
        .nest("/diseases", disease_routes(state.clone()))
        .nest("/reports", report_routes(state))
}

async fn health(state: Arc<AppConfig>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "configured": state.is_configured(),
        "company": state.company_name
    }))
}
