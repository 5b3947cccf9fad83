use std::time::Duration;
use voice_capture_api::api::{self, AppState};
use voice_capture_api::config::Config;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = Config::from_env().expect("Invalid configuration");
    tracing::info!(data_dir = %config.data_dir.display(), "Loading agents...");

    let addr = config.bind_addr;
    let idle_timeout = config.session_idle_timeout;
    let state = AppState::new(config).expect("Failed to build agents");

    // Expire abandoned sessions
    let sweep_every = (idle_timeout / 4).clamp(Duration::from_secs(1), Duration::from_secs(60));
    state.spawn_sweeper(sweep_every);

    // Build router
    let app = api::router(state);

    // Start server
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .await
        .expect("Server failed");
}
