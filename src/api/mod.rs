pub mod dto;
mod error;
mod handlers;
mod state;

pub use error::ApiError;
pub use state::AppState;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Local frontend dev servers
const FRONTEND_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:5173",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:5173",
];

fn cors_layer() -> CorsLayer {
    let origins: Vec<HeaderValue> = FRONTEND_ORIGINS
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/api/health", get(handlers::health))
        .route("/api/profile/create", post(handlers::create_profile))
        .route("/api/profile/{user_id}", get(handlers::get_profile))
        .route("/api/chat", post(handlers::chat))
        .route("/api/admin/rebuild", post(handlers::rebuild))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
