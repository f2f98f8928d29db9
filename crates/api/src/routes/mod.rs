pub mod health;
pub mod hooks;
pub mod jobs;
pub mod receivers;
pub mod subscriptions;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(jobs::router())
        .merge(hooks::router())
        .merge(subscriptions::router())
        .merge(receivers::router())
        .with_state(state)
}
