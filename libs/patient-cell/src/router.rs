use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn patient_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::search_patients).post(handlers::create_patient))
        .route("/bulk-assign-doctor", post(handlers::bulk_assign_doctor))
        .route(
            "/{patient_id}",
            get(handlers::get_patient)
                .put(handlers::update_patient)
                .delete(handlers::delete_patient),
        )
        .route("/{patient_id}/diagnoses", get(handlers::get_patient_diagnoses))
        .route("/{patient_id}/visits", get(handlers::get_patient_visits))
        .route("/{patient_id}/visits/new", get(handlers::new_patient_visit))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
