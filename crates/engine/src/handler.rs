//! Status change handler — fans one significant flight transition out into
//! per-receiver message records.
//!
//! Invoked once per subscription per significant transition. Callers
//! (webhook processor, poller, manual trigger) own the significance check
//! and the iteration over the flight's active subscriptions.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use contrail_common::error::AppError;
use contrail_common::types::{Channel, Flight, FlightStatus, Subscription};

use crate::idempotency::message_key;
use crate::repo::{MessageRepo, NewMessage};
use crate::status::message_type_for;

/// Outcome of one fan-out: rows created vs deduplicated by the idempotency
/// key, plus lifecycle messages skipped by a cancellation.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreatedMessages {
    pub created: u32,
    pub deduplicated: u32,
    pub skipped_outstanding: u64,
}

/// A subscription's receiver with its resolved delivery channel.
#[derive(Debug, Clone, sqlx::FromRow)]
struct LinkedReceiver {
    receiver_id: Uuid,
    opted_channel: Option<Channel>,
}

pub struct StatusChangeHandler {
    max_attempts: i32,
}

impl StatusChangeHandler {
    pub fn new(max_attempts: i32) -> Self {
        Self { max_attempts }
    }

    /// Create the message record(s) a new flight status calls for.
    ///
    /// Cancellation first skips every outstanding lifecycle message of the
    /// subscription, then enqueues one cancellation message per receiver.
    /// Other statuses map to their message type (no mapping → no-op) and
    /// enqueue one message per linked receiver, due immediately.
    pub async fn on_status_change(
        &self,
        pool: &PgPool,
        subscription: &Subscription,
        flight: &Flight,
        new_status: FlightStatus,
    ) -> Result<CreatedMessages, AppError> {
        let mut outcome = CreatedMessages::default();

        let Some(message_type) = message_type_for(new_status) else {
            return Ok(outcome);
        };

        if new_status == FlightStatus::Canceled {
            outcome.skipped_outstanding =
                MessageRepo::skip_outstanding_lifecycle(pool, subscription.id, "flight canceled")
                    .await?;
        }

        for receiver in Self::linked_receivers(pool, subscription.id).await? {
            let channel = receiver.opted_channel.unwrap_or_default();
            let msg = NewMessage {
                subscription_id: subscription.id,
                receiver_id: receiver.receiver_id,
                message_type,
                channel,
                scheduled_for: Utc::now(),
                max_attempts: self.max_attempts,
                idempotency_key: message_key(
                    subscription.id,
                    receiver.receiver_id,
                    message_type,
                    flight.status_version,
                ),
            };

            match MessageRepo::create_if_absent(pool, &msg).await? {
                Some(created) => {
                    tracing::info!(
                        message_id = %created.id,
                        subscription_id = %subscription.id,
                        receiver_id = %receiver.receiver_id,
                        message_type = %message_type,
                        channel = %channel,
                        "Message enqueued"
                    );
                    outcome.created += 1;
                }
                None => outcome.deduplicated += 1,
            }
        }

        Ok(outcome)
    }

    /// Receivers linked to the subscription, each with the channel of their
    /// most recent active opt-in (defaults to Telegram downstream).
    async fn linked_receivers(
        pool: &PgPool,
        subscription_id: Uuid,
    ) -> Result<Vec<LinkedReceiver>, AppError> {
        let rows: Vec<LinkedReceiver> = sqlx::query_as(
            r#"
            SELECT r.id AS receiver_id,
                   (SELECT o.channel
                    FROM opt_ins o
                    WHERE o.receiver_id = r.id AND o.status = 'active'
                    ORDER BY o.created_at DESC
                    LIMIT 1) AS opted_channel
            FROM subscription_receivers sr
            JOIN receivers r ON r.id = sr.receiver_id
            WHERE sr.subscription_id = $1
            "#,
        )
        .bind(subscription_id)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }
}
