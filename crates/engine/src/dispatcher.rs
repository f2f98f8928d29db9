//! Scheduler tick — the dispatch loop.
//!
//! Runs as a stateless, trigger-invoked batch job:
//! 1. Acquire the lease lock (not acquired → zero summary, not an error)
//! 2. Fetch due messages, oldest scheduled first, with dispatch context
//! 3. Dispatch each through its channel adapter, skipping inactive
//!    subscriptions and not-ready receivers, with retry/backoff on failure
//! 4. Release the lock unconditionally
//!
//! Failures inside a single message's dispatch never raise past the batch
//! loop; they are collected into the summary's error list.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use contrail_channels::content::{MessageContext, build_content, resolve_template};
use contrail_channels::{ChannelRegistry, MessageContent};
use contrail_common::error::AppError;
use contrail_common::types::Channel;

use crate::backoff::retry_delay;
use crate::lock::{LeaseLock, SCHEDULER_LOCK_NAME};
use crate::repo::{DueMessage, MessageRepo};

/// Aggregate result of one tick. Partial failure is normal for a batch job,
/// so errors are strings here, not raised exceptions.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickSummary {
    pub processed: u32,
    pub sent: u32,
    pub failed: u32,
    pub skipped: u32,
    pub errors: Vec<String>,
}

enum DispatchResult {
    Sent,
    Skipped,
    Retried(String),
    Failed(String),
}

pub struct SchedulerTick {
    registry: Arc<ChannelRegistry>,
    batch_size: i64,
    lock_ttl_seconds: i64,
}

impl SchedulerTick {
    pub fn new(registry: Arc<ChannelRegistry>, batch_size: i64, lock_ttl_seconds: i64) -> Self {
        Self {
            registry,
            batch_size,
            lock_ttl_seconds,
        }
    }

    /// Run one tick. Safe to invoke concurrently and redundantly: the lease
    /// lock admits a single runner, everyone else returns a zero summary.
    pub async fn run(&self, pool: &PgPool) -> Result<TickSummary, AppError> {
        let run_id = format!("tick-{}", Uuid::new_v4());

        if !LeaseLock::acquire(
            pool,
            SCHEDULER_LOCK_NAME,
            &run_id,
            self.lock_ttl_seconds,
        )
        .await?
        {
            tracing::info!(run_id, "Another scheduler tick is in flight, skipping");
            return Ok(TickSummary::default());
        }

        let result = self.process_batch(pool).await;

        // Release must happen on every path, including batch errors.
        if let Err(e) = LeaseLock::release(pool, SCHEDULER_LOCK_NAME, &run_id).await {
            tracing::error!(run_id, error = %e, "Failed to release scheduler lock");
        }

        let summary = result?;
        tracing::info!(
            run_id,
            processed = summary.processed,
            sent = summary.sent,
            failed = summary.failed,
            skipped = summary.skipped,
            "Scheduler tick finished"
        );
        Ok(summary)
    }

    async fn process_batch(&self, pool: &PgPool) -> Result<TickSummary, AppError> {
        let due = MessageRepo::fetch_due(pool, Utc::now(), self.batch_size).await?;
        let mut summary = TickSummary::default();

        for msg in &due {
            summary.processed += 1;
            match self.dispatch_one(pool, msg).await {
                Ok(DispatchResult::Sent) => summary.sent += 1,
                Ok(DispatchResult::Skipped) => summary.skipped += 1,
                Ok(DispatchResult::Retried(err)) => {
                    summary.failed += 1;
                    summary.errors.push(format!("message {}: {}", msg.id, err));
                }
                Ok(DispatchResult::Failed(err)) => {
                    summary.failed += 1;
                    summary
                        .errors
                        .push(format!("message {} (terminal): {}", msg.id, err));
                }
                Err(e) => {
                    // Store write failed mid-dispatch; the message stays due
                    // and the next tick picks it up again.
                    summary.failed += 1;
                    summary.errors.push(format!("message {}: {}", msg.id, e));
                    tracing::error!(message_id = %msg.id, error = %e, "Dispatch bookkeeping failed");
                }
            }
        }

        Ok(summary)
    }

    async fn dispatch_one(
        &self,
        pool: &PgPool,
        msg: &DueMessage,
    ) -> Result<DispatchResult, AppError> {
        // Re-checked at dispatch time: a cancellation racing this batch must
        // not slip a message out.
        if !msg.subscription_active {
            MessageRepo::mark_skipped(pool, msg.id, "subscription inactive").await?;
            return Ok(DispatchResult::Skipped);
        }

        let Some(recipient) = Self::recipient_identity(msg) else {
            let reason = match msg.channel {
                Channel::Telegram => "receiver has no opted-in Telegram chat",
                Channel::Email => "receiver has no opted-in email address",
            };
            MessageRepo::mark_skipped(pool, msg.id, reason).await?;
            return Ok(DispatchResult::Skipped);
        };

        let content = Self::render(msg);
        let outcome = self.registry.send(msg.channel, &recipient, &content).await;
        let attempt = msg.attempt_count + 1;

        MessageRepo::record_event(
            pool,
            msg.id,
            attempt,
            if outcome.success { "sent" } else { "failed" },
            outcome.provider_message_id.as_deref(),
            outcome.error_code.as_deref(),
            outcome.error_message.as_deref(),
        )
        .await?;

        if outcome.success {
            MessageRepo::mark_sent(pool, msg.id, &content.to_stored()).await?;
            return Ok(DispatchResult::Sent);
        }

        let error = format!(
            "{}: {}",
            outcome.error_code.as_deref().unwrap_or("unknown"),
            outcome.error_message.as_deref().unwrap_or("send failed"),
        );

        if attempt < msg.max_attempts {
            let next_attempt_at = Utc::now() + retry_delay(attempt);
            MessageRepo::reschedule_failed(pool, msg.id, next_attempt_at, &error).await?;
            tracing::warn!(
                message_id = %msg.id,
                attempt,
                next_attempt_at = %next_attempt_at,
                error,
                "Delivery failed, retry scheduled"
            );
            Ok(DispatchResult::Retried(error))
        } else {
            MessageRepo::mark_failed(pool, msg.id, &error).await?;
            tracing::warn!(
                message_id = %msg.id,
                attempt,
                error,
                "Delivery failed terminally"
            );
            Ok(DispatchResult::Failed(error))
        }
    }

    /// The channel-specific recipient identifier, present and opted in —
    /// checked here so the adapter is never invoked for a not-ready receiver.
    fn recipient_identity(msg: &DueMessage) -> Option<String> {
        match msg.channel {
            Channel::Telegram => msg
                .telegram_chat_id
                .clone()
                .filter(|_| msg.telegram_opted_in),
            Channel::Email => msg.email.clone().filter(|_| msg.email_opted_in),
        }
    }

    /// Render content from the flight's latest snapshot, receiver template
    /// override winning over the subscription default.
    fn render(msg: &DueMessage) -> MessageContent {
        let custom_template = resolve_template(
            msg.receiver_templates.as_ref(),
            msg.subscription_templates.as_ref(),
            msg.message_type,
        );

        let ctx = MessageContext {
            name: msg.subscription_name.clone(),
            flight_number: msg.flight_number.clone(),
            origin: msg
                .origin_name
                .clone()
                .unwrap_or_else(|| msg.origin_code.clone()),
            destination: msg
                .destination_name
                .clone()
                .unwrap_or_else(|| msg.destination_code.clone()),
            status: msg.flight_status,
            estimated_departure: msg.estimated_departure,
            estimated_arrival: msg.estimated_arrival,
            custom_template,
        };

        build_content(msg.channel, msg.message_type, &ctx)
    }
}
