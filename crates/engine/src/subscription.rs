//! Subscription service — CRUD operations for flight subscriptions.
//!
//! A subscription binds one traveller to one tracked flight. Deactivation
//! never hard-deletes: the row stays for the audit trail and its
//! outstanding lifecycle messages are skipped in the same call.

use sqlx::PgPool;
use uuid::Uuid;

use contrail_common::error::AppError;
use contrail_common::types::Subscription;

use crate::repo::MessageRepo;

/// Parameters for creating a new subscription.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateSubscriptionParams {
    pub traveller_id: Uuid,
    pub flight_id: Uuid,
    pub display_name: String,
    pub polling_enabled: Option<bool>,
    pub custom_messages: Option<serde_json::Value>,
}

/// Service layer for subscription operations.
pub struct SubscriptionService;

impl SubscriptionService {
    /// Create a new subscription for a traveller.
    pub async fn create(
        pool: &PgPool,
        params: &CreateSubscriptionParams,
    ) -> Result<Subscription, AppError> {
        if params.display_name.trim().is_empty() {
            return Err(AppError::Validation(
                "display_name must not be empty".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let sub: Subscription = sqlx::query_as(
            r#"
            INSERT INTO subscriptions
                (id, traveller_id, flight_id, display_name, active, polling_enabled, custom_messages)
            VALUES ($1, $2, $3, $4, true, $5, $6)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(params.traveller_id)
        .bind(params.flight_id)
        .bind(params.display_name.trim())
        .bind(params.polling_enabled.unwrap_or(true))
        .bind(&params.custom_messages)
        .fetch_one(pool)
        .await?;

        tracing::info!(
            subscription_id = %sub.id,
            traveller_id = %params.traveller_id,
            flight_id = %params.flight_id,
            "Subscription created"
        );

        Ok(sub)
    }

    /// List all subscriptions for a traveller.
    pub async fn list_by_traveller(
        pool: &PgPool,
        traveller_id: Uuid,
    ) -> Result<Vec<Subscription>, AppError> {
        let subs: Vec<Subscription> = sqlx::query_as(
            "SELECT * FROM subscriptions WHERE traveller_id = $1 ORDER BY created_at DESC",
        )
        .bind(traveller_id)
        .fetch_all(pool)
        .await?;

        Ok(subs)
    }

    /// Get a single subscription by ID.
    pub async fn get(pool: &PgPool, subscription_id: Uuid) -> Result<Subscription, AppError> {
        let sub: Subscription = sqlx::query_as("SELECT * FROM subscriptions WHERE id = $1")
            .bind(subscription_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Subscription {} not found", subscription_id))
            })?;

        Ok(sub)
    }

    /// Deactivate a subscription and skip its outstanding lifecycle
    /// messages. Cancellation messages already enqueued stay live.
    pub async fn deactivate(pool: &PgPool, subscription_id: Uuid) -> Result<Subscription, AppError> {
        let sub: Subscription = sqlx::query_as(
            "UPDATE subscriptions SET active = false WHERE id = $1 RETURNING *",
        )
        .bind(subscription_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Subscription {} not found", subscription_id)))?;

        let skipped =
            MessageRepo::skip_outstanding_lifecycle(pool, subscription_id, "subscription canceled")
                .await?;

        tracing::info!(
            subscription_id = %subscription_id,
            skipped_messages = skipped,
            "Subscription deactivated"
        );

        Ok(sub)
    }

    /// All active subscriptions tracking a flight. Used by both ingestion
    /// sources when fanning a significant transition out.
    pub async fn find_active_by_flight(
        pool: &PgPool,
        flight_id: Uuid,
    ) -> Result<Vec<Subscription>, AppError> {
        let subs: Vec<Subscription> =
            sqlx::query_as("SELECT * FROM subscriptions WHERE flight_id = $1 AND active = true")
                .bind(flight_id)
                .fetch_all(pool)
                .await?;

        Ok(subs)
    }
}
