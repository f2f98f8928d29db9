//! Message repository — durable store of message records and their
//! lifecycle state.
//!
//! All cross-process coordination runs through this table: the
//! idempotency-keyed conditional insert prevents duplicate creation, and
//! atomic status transitions keep concurrent ticks consistent. Message rows
//! are never deleted; they are the audit trail.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use contrail_common::error::AppError;
use contrail_common::types::{Channel, FlightStatus, Message, MessageType};

/// Parameters for creating one message record.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub subscription_id: Uuid,
    pub receiver_id: Uuid,
    pub message_type: MessageType,
    pub channel: Channel,
    pub scheduled_for: DateTime<Utc>,
    pub max_attempts: i32,
    pub idempotency_key: String,
}

/// One due message joined with the context dispatch needs: receiver
/// identities, subscription state and templates, and the flight snapshot.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DueMessage {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub receiver_id: Uuid,
    pub message_type: MessageType,
    pub channel: Channel,
    pub scheduled_for: DateTime<Utc>,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub subscription_active: bool,
    pub subscription_name: String,
    pub subscription_templates: Option<serde_json::Value>,
    pub receiver_templates: Option<serde_json::Value>,
    pub telegram_chat_id: Option<String>,
    pub telegram_opted_in: bool,
    pub email: Option<String>,
    pub email_opted_in: bool,
    pub flight_number: String,
    pub flight_status: FlightStatus,
    pub origin_code: String,
    pub origin_name: Option<String>,
    pub destination_code: String,
    pub destination_name: Option<String>,
    pub estimated_departure: Option<DateTime<Utc>>,
    pub estimated_arrival: Option<DateTime<Utc>>,
}

/// Data access for message rows and their dispatch events.
pub struct MessageRepo;

impl MessageRepo {
    /// Conditional insert keyed on the idempotency key.
    ///
    /// Returns `None` when a row with the same key already exists — the
    /// duplicate is silently ignored, per the store's uniqueness contract.
    pub async fn create_if_absent(
        pool: &PgPool,
        msg: &NewMessage,
    ) -> Result<Option<Message>, AppError> {
        let row: Option<Message> = sqlx::query_as(
            r#"
            INSERT INTO messages
                (id, subscription_id, receiver_id, message_type, channel, status,
                 scheduled_for, max_attempts, idempotency_key)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7, $8)
            ON CONFLICT (idempotency_key) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(msg.subscription_id)
        .bind(msg.receiver_id)
        .bind(msg.message_type.to_string())
        .bind(msg.channel.to_string())
        .bind(msg.scheduled_for)
        .bind(msg.max_attempts)
        .bind(&msg.idempotency_key)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }

    /// Fetch up to `limit` due messages, oldest scheduled first, joined with
    /// dispatch context. The receiver-level template override shadows the
    /// subscription-level one downstream.
    pub async fn fetch_due(
        pool: &PgPool,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<DueMessage>, AppError> {
        let rows: Vec<DueMessage> = sqlx::query_as(
            r#"
            SELECT m.id, m.subscription_id, m.receiver_id, m.message_type, m.channel,
                   m.scheduled_for, m.attempt_count, m.max_attempts,
                   s.active AS subscription_active,
                   s.display_name AS subscription_name,
                   s.custom_messages AS subscription_templates,
                   sr.custom_messages AS receiver_templates,
                   r.telegram_chat_id, r.telegram_opted_in, r.email, r.email_opted_in,
                   f.flight_number, f.status AS flight_status,
                   f.origin_code, f.origin_name, f.destination_code, f.destination_name,
                   f.estimated_departure, f.estimated_arrival
            FROM messages m
            JOIN subscriptions s ON s.id = m.subscription_id
            JOIN receivers r ON r.id = m.receiver_id
            JOIN flights f ON f.id = s.flight_id
            LEFT JOIN subscription_receivers sr
                   ON sr.subscription_id = m.subscription_id
                  AND sr.receiver_id = m.receiver_id
            WHERE m.status IN ('pending', 'scheduled')
              AND m.scheduled_for <= $1
            ORDER BY m.scheduled_for ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    /// Terminal success: store the rendered content and count the attempt.
    pub async fn mark_sent(pool: &PgPool, id: Uuid, content: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE messages
            SET status = 'sent',
                content = $2,
                attempt_count = attempt_count + 1,
                error_detail = NULL,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(content)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Transient failure: count the attempt and push `scheduled_for` out to
    /// the retry time, leaving the message pending.
    pub async fn reschedule_failed(
        pool: &PgPool,
        id: Uuid,
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE messages
            SET status = 'pending',
                attempt_count = attempt_count + 1,
                scheduled_for = $2,
                error_detail = $3,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(next_attempt_at)
        .bind(error)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Terminal failure after the attempt budget is exhausted.
    pub async fn mark_failed(pool: &PgPool, id: Uuid, error: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE messages
            SET status = 'failed',
                attempt_count = attempt_count + 1,
                error_detail = $2,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Skip without counting an attempt — the adapter was never invoked.
    pub async fn mark_skipped(pool: &PgPool, id: Uuid, reason: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE messages
            SET status = 'skipped',
                skip_reason = $2,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(reason)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Bulk-skip a subscription's outstanding lifecycle messages
    /// (departure/en_route/arrival). Returns the number of rows skipped.
    pub async fn skip_outstanding_lifecycle(
        pool: &PgPool,
        subscription_id: Uuid,
        reason: &str,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET status = 'skipped',
                skip_reason = $2,
                updated_at = now()
            WHERE subscription_id = $1
              AND status IN ('pending', 'scheduled')
              AND message_type IN ('departure', 'en_route', 'arrival')
            "#,
        )
        .bind(subscription_id)
        .bind(reason)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Append one immutable dispatch-attempt event.
    pub async fn record_event(
        pool: &PgPool,
        message_id: Uuid,
        attempt: i32,
        outcome: &str,
        provider_message_id: Option<&str>,
        error_code: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO message_events
                (message_id, attempt, outcome, provider_message_id, error_code, error_message)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(message_id)
        .bind(attempt)
        .bind(outcome)
        .bind(provider_message_id)
        .bind(error_code)
        .bind(error_message)
        .execute(pool)
        .await?;

        Ok(())
    }
}
