use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spymaster::{api, config::CoordinatorConfig, registry, store::JsonFileStore};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spymaster=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting spymaster...");

    let config = CoordinatorConfig::from_env();
    let addr = config.bind_addr;

    let rooms = match config.data_dir.clone() {
        Some(dir) => {
            tracing::info!("Persisting rooms to {}", dir.display());
            registry::RoomRegistry::with_store(config, Arc::new(JsonFileStore::new(dir)))
        }
        None => {
            tracing::info!("No data directory configured, rooms live in memory only");
            registry::RoomRegistry::new(config)
        }
    };

    registry::spawn_idle_sweeper(rooms.clone());

    let app = api::router(rooms);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("Listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
