//! Weekly Rota - Axum Server
//!
//! Run with: cargo run
//! Then open: http://localhost:7860

use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use weekly_rota::config::AppConfig;
use weekly_rota::jobs::{self, Announcements, Notifier};
use weekly_rota::{api, store::Store};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("weekly_rota=info".parse().unwrap()))
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let store = match Store::open(&config.data_dir, config.roster.clone(), config.seed) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(error = %e, "Failed to open rota store");
            std::process::exit(1);
        }
    };

    let announcements = Arc::new(Announcements::new());
    let notifier: Arc<dyn Notifier> = announcements.clone();
    jobs::spawn(store.clone(), config.clone(), notifier);

    let state = Arc::new(api::AppState::new(store, config.clone(), announcements));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::router(state)
        .fallback_service(ServeDir::new("static"))
        .layer(cors);

    info!(addr = %config.bind, "Server listening");
    let listener = tokio::net::TcpListener::bind(config.bind).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
