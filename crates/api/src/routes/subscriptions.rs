//! Subscription routes.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use contrail_common::error::AppError;
use contrail_common::types::Subscription;
use contrail_engine::subscription::{CreateSubscriptionParams, SubscriptionService};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/subscriptions", post(create_subscription))
        .route("/api/subscriptions", get(list_subscriptions))
        .route(
            "/api/subscriptions/{id}/deactivate",
            post(deactivate_subscription),
        )
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    traveller_id: Uuid,
}

/// POST /api/subscriptions — track a flight for a traveller.
async fn create_subscription(
    State(state): State<AppState>,
    Json(params): Json<CreateSubscriptionParams>,
) -> Result<Json<Subscription>, AppError> {
    let subscription = SubscriptionService::create(&state.pool, &params).await?;
    Ok(Json(subscription))
}

/// GET /api/subscriptions?traveller_id= — list a traveller's subscriptions.
async fn list_subscriptions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Subscription>>, AppError> {
    let subscriptions =
        SubscriptionService::list_by_traveller(&state.pool, query.traveller_id).await?;
    Ok(Json(subscriptions))
}

/// POST /api/subscriptions/:id/deactivate — stop tracking.
///
/// Outstanding lifecycle messages are skipped in the same call; the row
/// itself is kept.
async fn deactivate_subscription(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Subscription>, AppError> {
    let subscription = SubscriptionService::deactivate(&state.pool, id).await?;
    Ok(Json(subscription))
}
