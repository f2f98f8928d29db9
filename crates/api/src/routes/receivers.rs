//! Receiver routes: creation, subscription linking, and opt-in lifecycle.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use contrail_common::error::AppError;
use contrail_common::types::{Channel, OptIn, Receiver};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/receivers", post(create_receiver))
        .route("/api/subscriptions/{id}/receivers", post(link_receiver))
        .route("/api/receivers/{id}/opt-in", post(issue_opt_in))
        .route("/opt-in/{token}", get(confirm_opt_in))
}

#[derive(Debug, Deserialize)]
struct CreateReceiverParams {
    traveller_id: Uuid,
    display_name: String,
    email: Option<String>,
}

/// POST /api/receivers — create a notification recipient.
async fn create_receiver(
    State(state): State<AppState>,
    Json(params): Json<CreateReceiverParams>,
) -> Result<Json<Receiver>, AppError> {
    if params.display_name.trim().is_empty() {
        return Err(AppError::Validation(
            "display_name must not be empty".to_string(),
        ));
    }

    let receiver: Receiver = sqlx::query_as(
        r#"
        INSERT INTO receivers (id, traveller_id, display_name, email)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(params.traveller_id)
    .bind(params.display_name.trim())
    .bind(&params.email)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(receiver_id = %receiver.id, "Receiver created");
    Ok(Json(receiver))
}

#[derive(Debug, Deserialize)]
struct LinkReceiverParams {
    receiver_id: Uuid,
    custom_messages: Option<Value>,
}

/// POST /api/subscriptions/:id/receivers — link a receiver to a
/// subscription, optionally with receiver-specific message overrides.
async fn link_receiver(
    State(state): State<AppState>,
    Path(subscription_id): Path<Uuid>,
    Json(params): Json<LinkReceiverParams>,
) -> Result<Json<Value>, AppError> {
    sqlx::query(
        r#"
        INSERT INTO subscription_receivers (subscription_id, receiver_id, custom_messages)
        VALUES ($1, $2, $3)
        ON CONFLICT (subscription_id, receiver_id)
        DO UPDATE SET custom_messages = EXCLUDED.custom_messages
        "#,
    )
    .bind(subscription_id)
    .bind(params.receiver_id)
    .bind(&params.custom_messages)
    .execute(&state.pool)
    .await?;

    Ok(Json(json!({ "linked": true })))
}

#[derive(Debug, Deserialize)]
struct IssueOptInParams {
    channel: Channel,
}

/// POST /api/receivers/:id/opt-in — issue an opt-in token and link for a
/// channel. The receiver stays pending until the link is followed.
async fn issue_opt_in(
    State(state): State<AppState>,
    Path(receiver_id): Path<Uuid>,
    Json(params): Json<IssueOptInParams>,
) -> Result<Json<Value>, AppError> {
    let token = Uuid::new_v4().simple().to_string();

    sqlx::query(
        r#"
        INSERT INTO opt_ins (id, receiver_id, token, channel, status)
        VALUES ($1, $2, $3, $4, 'pending')
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(receiver_id)
    .bind(&token)
    .bind(params.channel.to_string())
    .execute(&state.pool)
    .await?;

    let link = state.registry.opt_in_link(params.channel, &token);

    tracing::info!(receiver_id = %receiver_id, channel = %params.channel, "Opt-in issued");
    Ok(Json(json!({ "token": token, "link": link })))
}

/// GET /opt-in/:token — confirmation landing for email opt-in links.
/// (Telegram opt-ins confirm through the bot's `/start` command instead.)
async fn confirm_opt_in(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<Value>, AppError> {
    let opt_in: OptIn = sqlx::query_as("SELECT * FROM opt_ins WHERE token = $1")
        .bind(&token)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Unknown opt-in token".to_string()))?;

    sqlx::query("UPDATE opt_ins SET status = 'active', confirmed_at = now() WHERE id = $1")
        .bind(opt_in.id)
        .execute(&state.pool)
        .await?;

    if opt_in.channel == Channel::Email {
        sqlx::query("UPDATE receivers SET email_opted_in = true WHERE id = $1")
            .bind(opt_in.receiver_id)
            .execute(&state.pool)
            .await?;
    }

    tracing::info!(receiver_id = %opt_in.receiver_id, channel = %opt_in.channel, "Opt-in confirmed");
    Ok(Json(json!({ "ok": true, "channel": opt_in.channel })))
}
