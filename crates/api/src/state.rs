//! Shared application state for the Axum API server.

use std::sync::Arc;

use sqlx::PgPool;

use contrail_channels::ChannelRegistry;
use contrail_common::config::AppConfig;

/// Application state shared across all route handlers via Axum `State`.
///
/// The channel registry is built once at startup and injected here; nothing
/// reaches for it as ambient global state.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub registry: Arc<ChannelRegistry>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(pool: PgPool, registry: Arc<ChannelRegistry>, config: AppConfig) -> Self {
        Self {
            pool,
            registry,
            config,
        }
    }
}
