//! Contrail API server binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use contrail_channels::ChannelRegistry;
use contrail_common::config::AppConfig;
use contrail_common::db::{create_pool, run_migrations};

use contrail_api::routes::create_router;
use contrail_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("contrail_api=debug,contrail_engine=debug,contrail_ingest=debug,tower_http=debug")
        }))
        .init();

    tracing::info!("Starting Contrail API server...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Create database connection pool and apply migrations
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    run_migrations(&pool).await?;

    // Build the channel registry once; everything downstream borrows it
    let registry = Arc::new(ChannelRegistry::from_config(&config));

    // Build application state
    let port = config.port;
    let state = AppState::new(pool, registry, config);

    // Build router
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
