//! Internal trigger endpoints, invoked by an external scheduler.
//!
//! Both endpoints are safe to hit concurrently and redundantly: the
//! scheduler tick is serialized by its lease lock, and polling is
//! idempotent through the message layer's conditional inserts.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use contrail_common::error::AppError;
use contrail_engine::dispatcher::{SchedulerTick, TickSummary};
use contrail_ingest::poller::{PollRun, PollSummary};
use contrail_ingest::provider::FlightDataClient;

use crate::middleware::auth::InternalAuth;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/internal/jobs/scheduler-tick", post(run_scheduler_tick))
        .route("/internal/jobs/poll", post(run_poll))
}

/// POST /internal/jobs/scheduler-tick — dispatch due messages.
async fn run_scheduler_tick(
    State(state): State<AppState>,
    _auth: InternalAuth,
) -> Result<Json<TickSummary>, AppError> {
    let tick = SchedulerTick::new(
        state.registry.clone(),
        state.config.scheduler_batch_size,
        state.config.scheduler_lock_ttl_seconds,
    );
    let summary = tick.run(&state.pool).await?;
    Ok(Json(summary))
}

/// POST /internal/jobs/poll — re-fetch status for watched flights.
async fn run_poll(
    State(state): State<AppState>,
    _auth: InternalAuth,
) -> Result<Json<PollSummary>, AppError> {
    let run = PollRun::new(
        FlightDataClient::from_config(&state.config),
        state.config.message_max_attempts,
        state.config.poll_horizon_hours,
    );
    let summary = run.run(&state.pool).await?;
    Ok(Json(summary))
}
