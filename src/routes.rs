use crate::handlers;
use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    // The quiz frontend is served from arbitrary origins; the API is
    // unauthenticated, so CORS stays permissive.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/questions", get(handlers::list_questions))
        .route("/api/submit", post(handlers::submit))
        .route("/api/submit-final-score", post(handlers::submit_final_score))
        .route("/api/get-final-score/:username", get(handlers::get_final_score))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
