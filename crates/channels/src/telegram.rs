//! Telegram channel adapter.
//!
//! Delivers messages through the Bot API `sendMessage` call, builds t.me
//! deep links for opt-in, and parses inbound bot commands from webhook
//! updates. Inbound requests are authenticated with the secret token
//! Telegram echoes back in `X-Telegram-Bot-Api-Secret-Token`.

use std::time::Duration;

use serde_json::Value;

use contrail_common::types::Channel;

use crate::{ChannelAdapter, InboundCommand, MessageContent, SendOutcome};

/// Outbound HTTP timeout. Timeouts become retryable failures, not crashes.
const SEND_TIMEOUT: Duration = Duration::from_secs(30);

pub struct TelegramAdapter {
    client: reqwest::Client,
    bot_token: Option<String>,
    bot_username: Option<String>,
    webhook_secret: Option<String>,
}

impl TelegramAdapter {
    pub fn new(
        bot_token: Option<String>,
        bot_username: Option<String>,
        webhook_secret: Option<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            bot_token,
            bot_username,
            webhook_secret,
        }
    }

    /// Flatten content to the text form Telegram accepts.
    fn text_of(content: &MessageContent) -> &str {
        match content {
            MessageContent::Text(text) => text,
            MessageContent::Email { text, .. } => text,
        }
    }
}

impl ChannelAdapter for TelegramAdapter {
    fn channel(&self) -> Channel {
        Channel::Telegram
    }

    async fn send(&self, recipient_id: &str, content: &MessageContent) -> SendOutcome {
        let Some(token) = self.bot_token.as_deref() else {
            return SendOutcome::failure("not_configured", "Telegram bot token is not configured");
        };

        let url = format!("https://api.telegram.org/bot{}/sendMessage", token);
        let body = serde_json::json!({
            "chat_id": recipient_id,
            "text": Self::text_of(content),
            "parse_mode": "HTML",
        });

        match self.client.post(&url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                let message_id = resp
                    .json::<Value>()
                    .await
                    .ok()
                    .and_then(|v| v.pointer("/result/message_id").and_then(Value::as_i64))
                    .map(|id| id.to_string())
                    .unwrap_or_default();

                tracing::debug!(chat_id = recipient_id, message_id, "Telegram message sent");
                SendOutcome::sent(message_id)
            }
            Ok(resp) => {
                let status = resp.status();
                let body: Value = resp.json().await.unwrap_or(Value::Null);
                let description = body
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or("Telegram API error")
                    .to_string();

                tracing::warn!(
                    chat_id = recipient_id,
                    status = %status,
                    description,
                    "Telegram API returned error"
                );
                SendOutcome::failure(format!("telegram_{}", status.as_u16()), description)
            }
            Err(e) if e.is_timeout() => {
                SendOutcome::failure("timeout", format!("Telegram request timed out: {}", e))
            }
            Err(e) => SendOutcome::failure("network", format!("Telegram request failed: {}", e)),
        }
    }

    fn opt_in_link(&self, token: &str) -> String {
        let username = self.bot_username.as_deref().unwrap_or("contrail_bot");
        format!("https://t.me/{}?start={}", username, token)
    }

    /// Parse a Bot API `Update` into a command.
    ///
    /// Recognized: `/start <token>`, `/stop`, `/status`. Anything else is
    /// `None` and gets acknowledged without action.
    fn parse_update(&self, payload: &Value) -> Option<InboundCommand> {
        let message = payload.get("message")?;
        let chat_id = message
            .pointer("/chat/id")
            .and_then(Value::as_i64)?
            .to_string();
        let text = message.get("text").and_then(Value::as_str)?.trim();

        let mut parts = text.split_whitespace();
        match parts.next()? {
            "/start" => {
                let token = parts.next()?.to_string();
                Some(InboundCommand::Subscribe { chat_id, token })
            }
            "/stop" => Some(InboundCommand::Unsubscribe { chat_id }),
            "/status" => Some(InboundCommand::StatusQuery { chat_id }),
            _ => None,
        }
    }

    /// Compare the secret token header against the configured secret.
    ///
    /// With no secret configured (local development) verification is a
    /// pass-through.
    fn verify(&self, _raw_body: &[u8], header: Option<&str>) -> bool {
        match self.webhook_secret.as_deref() {
            Some(secret) => header == Some(secret),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> TelegramAdapter {
        TelegramAdapter::new(
            Some("123:abc".to_string()),
            Some("contrail_bot".to_string()),
            Some("hook-secret".to_string()),
        )
    }

    fn update(text: &str) -> Value {
        serde_json::json!({
            "update_id": 7,
            "message": {
                "chat": { "id": 42 },
                "text": text,
            }
        })
    }

    #[test]
    fn test_parse_start_with_token() {
        let cmd = adapter().parse_update(&update("/start abc123"));
        assert_eq!(
            cmd,
            Some(InboundCommand::Subscribe {
                chat_id: "42".to_string(),
                token: "abc123".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_start_without_token_is_ignored() {
        assert_eq!(adapter().parse_update(&update("/start")), None);
    }

    #[test]
    fn test_parse_stop() {
        let cmd = adapter().parse_update(&update("/stop"));
        assert_eq!(
            cmd,
            Some(InboundCommand::Unsubscribe {
                chat_id: "42".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_status() {
        let cmd = adapter().parse_update(&update("/status"));
        assert_eq!(
            cmd,
            Some(InboundCommand::StatusQuery {
                chat_id: "42".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_plain_text_is_ignored() {
        assert_eq!(adapter().parse_update(&update("hello there")), None);
    }

    #[test]
    fn test_parse_payload_without_message() {
        let payload = serde_json::json!({ "update_id": 7, "edited_message": {} });
        assert_eq!(adapter().parse_update(&payload), None);
    }

    #[test]
    fn test_verify_secret_match() {
        assert!(adapter().verify(b"{}", Some("hook-secret")));
        assert!(!adapter().verify(b"{}", Some("wrong")));
        assert!(!adapter().verify(b"{}", None));
    }

    #[test]
    fn test_verify_without_configured_secret_passes() {
        let adapter = TelegramAdapter::new(None, None, None);
        assert!(adapter.verify(b"{}", None));
    }

    #[test]
    fn test_opt_in_link() {
        assert_eq!(
            adapter().opt_in_link("tok-1"),
            "https://t.me/contrail_bot?start=tok-1"
        );
    }
}
