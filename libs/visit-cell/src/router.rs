use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn visit_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::list_visits).post(handlers::create_visit))
        .route(
            "/{visit_id}",
            get(handlers::get_visit)
                .put(handlers::update_visit)
                .delete(handlers::delete_visit),
        )
        .route("/{visit_id}/complete", post(handlers::complete_visit))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
