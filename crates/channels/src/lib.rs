pub mod content;
pub mod email;
pub mod telegram;

use serde::{Deserialize, Serialize};

use contrail_common::config::AppConfig;
use contrail_common::types::Channel;

/// Outcome of one delivery attempt through a channel adapter.
///
/// Adapters never raise: every failure is folded into this shape so the
/// scheduler can decide between retry and terminal failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOutcome {
    pub success: bool,
    pub provider_message_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl SendOutcome {
    pub fn sent(provider_message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            provider_message_id: Some(provider_message_id.into()),
            error_code: None,
            error_message: None,
        }
    }

    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            provider_message_id: None,
            error_code: Some(code.into()),
            error_message: Some(message.into()),
        }
    }
}

/// Message payload handed to an adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MessageContent {
    /// Plain or lightly marked-up text for chat channels.
    Text(String),
    /// Structured envelope for email delivery.
    Email {
        subject: String,
        html: String,
        text: String,
    },
}

impl MessageContent {
    /// Serialized form stored on the message row after rendering.
    pub fn to_stored(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Email { .. } => {
                serde_json::to_string(self).unwrap_or_else(|_| String::new())
            }
        }
    }
}

/// Command parsed from an inbound chat webhook update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundCommand {
    /// `/start <token>` — confirm an opt-in link.
    Subscribe { chat_id: String, token: String },
    /// `/stop` — withdraw consent for this chat.
    Unsubscribe { chat_id: String },
    /// `/status` — ask for the current status of tracked flights.
    StatusQuery { chat_id: String },
}

/// Contract every channel adapter implements.
///
/// Dispatch preconditions (recipient identity present and opted in, the
/// subscription active) are checked by the scheduler, not the adapter.
pub trait ChannelAdapter: Send + Sync {
    fn channel(&self) -> Channel;

    /// Deliver rendered content to a channel-specific recipient identifier.
    fn send(
        &self,
        recipient_id: &str,
        content: &MessageContent,
    ) -> impl std::future::Future<Output = SendOutcome> + Send;

    /// Build the link a receiver follows to confirm this channel.
    fn opt_in_link(&self, token: &str) -> String;

    /// Parse an inbound webhook payload into a command, if recognized.
    fn parse_update(&self, payload: &serde_json::Value) -> Option<InboundCommand>;

    /// Verify the authenticity of an inbound webhook request.
    fn verify(&self, raw_body: &[u8], header: Option<&str>) -> bool;
}

/// Registry of all configured channel adapters.
///
/// Built once at process start from config and passed by reference into the
/// scheduler tick and webhook routes. The channel set is closed: dispatch is
/// a match on the `Channel` tag, no runtime plugin lookup.
pub struct ChannelRegistry {
    telegram: telegram::TelegramAdapter,
    email: email::EmailAdapter,
}

impl ChannelRegistry {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            telegram: telegram::TelegramAdapter::new(
                config.telegram_bot_token.clone(),
                config.telegram_bot_username.clone(),
                config.telegram_webhook_secret.clone(),
            ),
            email: email::EmailAdapter::new(
                config.resend_api_key.clone(),
                config.email_from.clone(),
                config.public_base_url.clone(),
            ),
        }
    }

    pub fn telegram(&self) -> &telegram::TelegramAdapter {
        &self.telegram
    }

    pub fn email(&self) -> &email::EmailAdapter {
        &self.email
    }

    /// Dispatch content through the adapter for `channel`.
    pub async fn send(
        &self,
        channel: Channel,
        recipient_id: &str,
        content: &MessageContent,
    ) -> SendOutcome {
        match channel {
            Channel::Telegram => self.telegram.send(recipient_id, content).await,
            Channel::Email => self.email.send(recipient_id, content).await,
        }
    }

    pub fn opt_in_link(&self, channel: Channel, token: &str) -> String {
        match channel {
            Channel::Telegram => self.telegram.opt_in_link(token),
            Channel::Email => self.email.opt_in_link(token),
        }
    }
}
