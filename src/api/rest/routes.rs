use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::api::rest::{handlers, logging_middleware::request_logging_middleware};
use crate::shared::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/read", get(handlers::read_file))
        .route("/run", post(handlers::run_task))
        .route("/filter_csv", get(handlers::filter_csv))
        .with_state(state)
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
}
