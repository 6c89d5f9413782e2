use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::create_doctor))
        .route("/search", get(handlers::search_doctors))
        .route(
            "/{doctor_id}",
            get(handlers::get_doctor)
                .put(handlers::update_doctor)
                .delete(handlers::delete_doctor),
        )
        .route("/{doctor_id}/form", get(handlers::get_doctor_form))
        .route("/{doctor_id}/interns", get(handlers::list_interns))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

pub fn specialty_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route(
            "/",
            get(handlers::list_specialties).post(handlers::create_specialty),
        )
        .route(
            "/{specialty_id}",
            get(handlers::get_specialty)
                .put(handlers::update_specialty)
                .delete(handlers::delete_specialty),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
