use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with all easel endpoints.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(handler::health_handler))
        .route("/api/v2/post/", post(handler::create_document))
        .route("/api/v2/kv", get(handler::list_canvases))
        .route(
            "/api/v2/kv/:id",
            get(handler::get_canvas)
                .put(handler::put_canvas)
                .delete(handler::delete_canvas),
        )
        .route("/api/v2/:id", get(handler::get_document))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
