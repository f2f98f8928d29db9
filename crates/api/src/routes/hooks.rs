//! Inbound webhook routes: the flight-data provider and the Telegram bot.
//!
//! Authenticity is checked at this boundary — HMAC signature for the
//! provider, shared-secret header for Telegram — and rejected requests
//! never enter the pipeline. Recognized business payloads are acked with
//! 200 even when nothing matches, so neither platform retry-storms us.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use contrail_channels::{ChannelAdapter, InboundCommand, MessageContent};
use contrail_common::error::AppError;
use contrail_common::types::OptIn;
use contrail_ingest::webhook::WebhookProcessor;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/hooks/flight", post(flight_webhook))
        .route("/hooks/telegram", post(telegram_webhook))
}

/// POST /hooks/flight — flight-data provider event push.
async fn flight_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = headers
        .get("x-provider-signature")
        .and_then(|v| v.to_str().ok());

    let processor = WebhookProcessor::new(
        state.config.provider_webhook_secret.clone(),
        state.config.message_max_attempts,
    );
    let outcome = processor.process(&state.pool, &body, signature).await?;

    Ok(Json(json!({
        "ok": true,
        "significant": outcome.significant,
        "messages_created": outcome.messages_created,
        "note": outcome.note,
    })))
}

/// POST /hooks/telegram — Bot API update push.
///
/// Unrecognized payloads are acknowledged without error; only a bad secret
/// is rejected.
async fn telegram_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let secret = headers
        .get("x-telegram-bot-api-secret-token")
        .and_then(|v| v.to_str().ok());

    if !state.registry.telegram().verify(&body, secret) {
        return Err(AppError::Auth("invalid Telegram webhook secret".to_string()));
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return Ok(Json(json!({ "ok": true }))),
    };

    let Some(command) = state.registry.telegram().parse_update(&payload) else {
        return Ok(Json(json!({ "ok": true })));
    };

    match command {
        InboundCommand::Subscribe { chat_id, token } => {
            confirm_opt_in(&state, &chat_id, &token).await?;
        }
        InboundCommand::Unsubscribe { chat_id } => {
            unsubscribe_chat(&state, &chat_id).await?;
        }
        InboundCommand::StatusQuery { chat_id } => {
            answer_status_query(&state, &chat_id).await?;
        }
    }

    Ok(Json(json!({ "ok": true })))
}

/// `/start <token>`: activate the opt-in and bind the chat to its receiver.
async fn confirm_opt_in(state: &AppState, chat_id: &str, token: &str) -> Result<(), AppError> {
    let opt_in: Option<OptIn> = sqlx::query_as("SELECT * FROM opt_ins WHERE token = $1")
        .bind(token)
        .fetch_optional(&state.pool)
        .await?;

    let Some(opt_in) = opt_in else {
        tracing::warn!(chat_id, token, "Opt-in token not found, acking anyway");
        return Ok(());
    };

    sqlx::query("UPDATE opt_ins SET status = 'active', confirmed_at = now() WHERE id = $1")
        .bind(opt_in.id)
        .execute(&state.pool)
        .await?;

    sqlx::query(
        "UPDATE receivers SET telegram_chat_id = $2, telegram_opted_in = true WHERE id = $1",
    )
    .bind(opt_in.receiver_id)
    .bind(chat_id)
    .execute(&state.pool)
    .await?;

    tracing::info!(receiver_id = %opt_in.receiver_id, chat_id, "Telegram opt-in confirmed");

    // Best-effort welcome; delivery failure here is not an error.
    let welcome = MessageContent::Text(
        "You're in! Flight updates will arrive in this chat. Send /stop to opt out.".to_string(),
    );
    let _ = state
        .registry
        .telegram()
        .send(chat_id, &welcome)
        .await;

    Ok(())
}

/// `/stop`: withdraw consent for every receiver bound to this chat.
async fn unsubscribe_chat(state: &AppState, chat_id: &str) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE opt_ins
        SET status = 'unsubscribed'
        WHERE channel = 'telegram'
          AND receiver_id IN (SELECT id FROM receivers WHERE telegram_chat_id = $1)
        "#,
    )
    .bind(chat_id)
    .execute(&state.pool)
    .await?;

    let result =
        sqlx::query("UPDATE receivers SET telegram_opted_in = false WHERE telegram_chat_id = $1")
            .bind(chat_id)
            .execute(&state.pool)
            .await?;

    tracing::info!(
        chat_id,
        receivers = result.rows_affected(),
        "Telegram chat unsubscribed"
    );

    Ok(())
}

/// `/status`: reply with the current status of this chat's tracked flights.
async fn answer_status_query(state: &AppState, chat_id: &str) -> Result<(), AppError> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT DISTINCT f.flight_number, f.status
        FROM flights f
        JOIN subscriptions s ON s.flight_id = f.id AND s.active = true
        JOIN subscription_receivers sr ON sr.subscription_id = s.id
        JOIN receivers r ON r.id = sr.receiver_id
        WHERE r.telegram_chat_id = $1
        "#,
    )
    .bind(chat_id)
    .fetch_all(&state.pool)
    .await?;

    let reply = if rows.is_empty() {
        "No tracked flights for this chat.".to_string()
    } else {
        rows.iter()
            .map(|(number, status)| format!("{}: {}", number, status.replace('_', " ")))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let _ = state
        .registry
        .telegram()
        .send(chat_id, &MessageContent::Text(reply))
        .await;

    Ok(())
}
