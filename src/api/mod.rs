// API layer module (adapters for controllers)
// Follows Hexagonal Architecture - API is an adapter

pub mod errors;
pub mod handlers;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use handlers::{agents, health, records, sessions};
pub use state::AppState;

/// Builds the service router
pub fn router(state: AppState) -> Router {
    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Personas
        .route("/api/agents", get(agents::list_agents))
        .route("/api/agents/:variant", get(agents::get_agent))
        // Sessions
        .route("/api/sessions", post(sessions::create_session))
        .route(
            "/api/sessions/:id",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route(
            "/api/sessions/:id/operations/:operation",
            post(sessions::invoke_operation),
        )
        .route("/api/sessions/:id/finalize", post(sessions::finalize_session))
        .route("/api/sessions/:id/reset", post(sessions::reset_session))
        .route("/api/sessions/:id/events", get(sessions::session_events))
        // Persisted records
        .route("/api/records/:variant", get(records::list_records))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Shared state
        .with_state(state)
}
