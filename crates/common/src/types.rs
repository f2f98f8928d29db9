use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical flight lifecycle status.
///
/// `Delayed` is a side-channel status: it notifies without advancing the
/// flight's lifecycle position. `Canceled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FlightStatus {
    Scheduled,
    Departed,
    EnRoute,
    Arrived,
    Delayed,
    Canceled,
}

impl std::fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlightStatus::Scheduled => write!(f, "scheduled"),
            FlightStatus::Departed => write!(f, "departed"),
            FlightStatus::EnRoute => write!(f, "en_route"),
            FlightStatus::Arrived => write!(f, "arrived"),
            FlightStatus::Delayed => write!(f, "delayed"),
            FlightStatus::Canceled => write!(f, "canceled"),
        }
    }
}

/// Kind of notification a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Departure,
    EnRoute,
    Arrival,
    Delay,
    Cancellation,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::Departure => write!(f, "departure"),
            MessageType::EnRoute => write!(f, "en_route"),
            MessageType::Arrival => write!(f, "arrival"),
            MessageType::Delay => write!(f, "delay"),
            MessageType::Cancellation => write!(f, "cancellation"),
        }
    }
}

/// Message delivery lifecycle.
///
/// `Scheduled` is an alias of `Pending` awaiting a future `scheduled_for`;
/// both are eligible for dispatch once due. `Sent`, `Failed` and `Skipped`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Scheduled,
    Sent,
    Failed,
    Skipped,
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageStatus::Pending => write!(f, "pending"),
            MessageStatus::Scheduled => write!(f, "scheduled"),
            MessageStatus::Sent => write!(f, "sent"),
            MessageStatus::Failed => write!(f, "failed"),
            MessageStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Notification channel type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Telegram,
    Email,
}

impl Default for Channel {
    fn default() -> Self {
        Channel::Telegram
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Telegram => write!(f, "telegram"),
            Channel::Email => write!(f, "email"),
        }
    }
}

/// Opt-in link lifecycle: issued pending, confirmed active, or withdrawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OptInStatus {
    Pending,
    Active,
    Unsubscribed,
}

impl std::fmt::Display for OptInStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptInStatus::Pending => write!(f, "pending"),
            OptInStatus::Active => write!(f, "active"),
            OptInStatus::Unsubscribed => write!(f, "unsubscribed"),
        }
    }
}

/// Canonical route/status snapshot of a tracked flight.
///
/// Mutated by ingestion sources only. `status_version` increments on every
/// persisted update and anchors message idempotency keys, so stale triggers
/// never re-fire an already-handled transition.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Flight {
    pub id: Uuid,
    pub flight_number: String,
    pub airline: Option<String>,
    pub origin_code: String,
    pub origin_name: Option<String>,
    pub origin_tz: Option<String>,
    pub destination_code: String,
    pub destination_name: Option<String>,
    pub destination_tz: Option<String>,
    pub scheduled_departure: Option<DateTime<Utc>>,
    pub estimated_departure: Option<DateTime<Utc>>,
    pub actual_departure: Option<DateTime<Utc>>,
    pub scheduled_arrival: Option<DateTime<Utc>>,
    pub estimated_arrival: Option<DateTime<Utc>>,
    pub actual_arrival: Option<DateTime<Utc>>,
    pub status: FlightStatus,
    pub status_version: i32,
    pub provider_flight_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Binds one traveller to one tracked flight.
///
/// Deactivated, never hard-deleted; deactivation also skips the
/// subscription's outstanding messages.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub traveller_id: Uuid,
    pub flight_id: Uuid,
    pub display_name: String,
    pub active: bool,
    pub polling_enabled: bool,
    /// Optional per-tone custom message templates (message type → template).
    pub custom_messages: Option<serde_json::Value>,
    pub provider_webhook_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A notification recipient, independent of any one subscription.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Receiver {
    pub id: Uuid,
    pub traveller_id: Uuid,
    pub display_name: String,
    pub telegram_chat_id: Option<String>,
    pub telegram_opted_in: bool,
    pub email: Option<String>,
    pub email_opted_in: bool,
    pub created_at: DateTime<Utc>,
}

/// Opt-in link tying a receiver to a channel through a confirmation token.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OptIn {
    pub id: Uuid,
    pub receiver_id: Uuid,
    pub token: String,
    pub channel: Channel,
    pub status: OptInStatus,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// The unit of delivery work. Never deleted — this is the audit trail.
///
/// Created by the status-change handler, mutated only by the scheduler tick
/// (content render, attempt increment, terminal status) and by subscription
/// deactivation (bulk skip).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub receiver_id: Uuid,
    pub message_type: MessageType,
    pub channel: Channel,
    pub status: MessageStatus,
    pub scheduled_for: DateTime<Utc>,
    /// Rendered at dispatch time, not creation time.
    pub content: Option<String>,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub skip_reason: Option<String>,
    pub error_detail: Option<String>,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable record of one dispatch attempt. Written once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageEvent {
    pub id: i64,
    pub message_id: Uuid,
    pub attempt: i32,
    pub outcome: String,
    pub provider_message_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Raw provider webhook payload, persisted before any processing so a failed
/// run can be replayed.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProviderEvent {
    pub id: Uuid,
    pub payload: serde_json::Value,
    pub processed: bool,
    pub error: Option<String>,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}
