use std::sync::Arc;

use axum::{
    Router,
    routing::get,
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn diagnosis_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::list_diagnoses).post(handlers::create_diagnosis))
        .route(
            "/{diagnosis_id}",
            get(handlers::get_diagnosis)
                .put(handlers::update_diagnosis)
                .delete(handlers::delete_diagnosis),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

pub fn disease_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::list_diseases).post(handlers::create_disease))
        .route(
            "/{disease_id}",
            get(handlers::get_disease)
                .put(handlers::update_disease)
                .delete(handlers::delete_disease),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
