//! Email channel adapter backed by the Resend HTTP API.
//!
//! Email content is a structured {subject, html, text} envelope. Opt-in
//! links point back at this deployment's confirmation endpoint rather than
//! a t.me deep link.

use std::time::Duration;

use serde_json::Value;

use contrail_common::types::Channel;

use crate::{ChannelAdapter, InboundCommand, MessageContent, SendOutcome};

const SEND_TIMEOUT: Duration = Duration::from_secs(30);
const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

pub struct EmailAdapter {
    client: reqwest::Client,
    api_key: Option<String>,
    from: Option<String>,
    public_base_url: String,
}

impl EmailAdapter {
    pub fn new(api_key: Option<String>, from: Option<String>, public_base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_key,
            from,
            public_base_url,
        }
    }

    /// Coerce content into an email envelope. Chat text falls back to a
    /// generic subject with the text doubled into the HTML body.
    fn envelope(content: &MessageContent) -> (String, String, String) {
        match content {
            MessageContent::Email {
                subject,
                html,
                text,
            } => (subject.clone(), html.clone(), text.clone()),
            MessageContent::Text(text) => (
                "Flight update".to_string(),
                format!("<p>{}</p>", text),
                text.clone(),
            ),
        }
    }
}

impl ChannelAdapter for EmailAdapter {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, recipient_id: &str, content: &MessageContent) -> SendOutcome {
        let Some(api_key) = self.api_key.as_deref() else {
            return SendOutcome::failure("not_configured", "Resend API key is not configured");
        };
        let Some(from) = self.from.as_deref() else {
            return SendOutcome::failure("not_configured", "Email sender address is not configured");
        };

        let (subject, html, text) = Self::envelope(content);
        let body = serde_json::json!({
            "from": from,
            "to": [recipient_id],
            "subject": subject,
            "html": html,
            "text": text,
        });

        match self
            .client
            .post(RESEND_ENDPOINT)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                let id = resp
                    .json::<Value>()
                    .await
                    .ok()
                    .and_then(|v| v.get("id").and_then(Value::as_str).map(String::from))
                    .unwrap_or_default();

                tracing::debug!(to = recipient_id, provider_id = id, "Email sent");
                SendOutcome::sent(id)
            }
            Ok(resp) => {
                let status = resp.status();
                let detail: Value = resp.json().await.unwrap_or(Value::Null);
                let message = detail
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Resend API error")
                    .to_string();

                tracing::warn!(
                    to = recipient_id,
                    status = %status,
                    message,
                    "Resend API returned error"
                );
                SendOutcome::failure(format!("email_{}", status.as_u16()), message)
            }
            Err(e) if e.is_timeout() => {
                SendOutcome::failure("timeout", format!("Email request timed out: {}", e))
            }
            Err(e) => SendOutcome::failure("network", format!("Email request failed: {}", e)),
        }
    }

    fn opt_in_link(&self, token: &str) -> String {
        format!(
            "{}/opt-in/{}",
            self.public_base_url.trim_end_matches('/'),
            token
        )
    }

    /// Email has no inbound command surface.
    fn parse_update(&self, _payload: &Value) -> Option<InboundCommand> {
        None
    }

    /// Email has no inbound webhook surface; nothing ever verifies.
    fn verify(&self, _raw_body: &[u8], _header: Option<&str>) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opt_in_link_strips_trailing_slash() {
        let adapter = EmailAdapter::new(None, None, "https://contrail.example/".to_string());
        assert_eq!(
            adapter.opt_in_link("tok-9"),
            "https://contrail.example/opt-in/tok-9"
        );
    }

    #[test]
    fn test_envelope_from_text_content() {
        let (subject, html, text) =
            EmailAdapter::envelope(&MessageContent::Text("wheels up".to_string()));
        assert_eq!(subject, "Flight update");
        assert_eq!(html, "<p>wheels up</p>");
        assert_eq!(text, "wheels up");
    }

    #[test]
    fn test_envelope_passthrough() {
        let content = MessageContent::Email {
            subject: "s".to_string(),
            html: "<b>h</b>".to_string(),
            text: "t".to_string(),
        };
        let (subject, html, text) = EmailAdapter::envelope(&content);
        assert_eq!((subject.as_str(), html.as_str(), text.as_str()), ("s", "<b>h</b>", "t"));
    }
}
