//! Message content rendering.
//!
//! Pure functions (no I/O) that turn a dispatch context into channel-ready
//! content. Rendering happens at dispatch time so the wording reflects the
//! flight's latest snapshot, not the one at enqueue time.
//!
//! Custom templates (receiver override first, then subscription default)
//! substitute `{name}`, `{flight}`, `{origin}`, `{destination}` and
//! `{status}` placeholders.

use chrono::{DateTime, Utc};
use serde_json::Value;

use contrail_common::types::{Channel, FlightStatus, MessageType};

use crate::MessageContent;

/// Everything rendering needs about one due message.
#[derive(Debug, Clone)]
pub struct MessageContext {
    /// Traveller display name from the subscription.
    pub name: String,
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub status: FlightStatus,
    pub estimated_departure: Option<DateTime<Utc>>,
    pub estimated_arrival: Option<DateTime<Utc>>,
    /// Resolved custom template, if any.
    pub custom_template: Option<String>,
}

/// Pick the template for `message_type`, receiver override winning over the
/// subscription-level default. Templates live in JSON maps keyed by the
/// message type's text form.
pub fn resolve_template(
    receiver_overrides: Option<&Value>,
    subscription_templates: Option<&Value>,
    message_type: MessageType,
) -> Option<String> {
    let key = message_type.to_string();
    for source in [receiver_overrides, subscription_templates].into_iter().flatten() {
        if let Some(template) = source.get(&key).and_then(Value::as_str) {
            return Some(template.to_string());
        }
    }
    None
}

/// Render content for one message in the form its channel expects.
pub fn build_content(
    channel: Channel,
    message_type: MessageType,
    ctx: &MessageContext,
) -> MessageContent {
    let text = render_text(message_type, ctx);
    match channel {
        Channel::Telegram => MessageContent::Text(text),
        Channel::Email => MessageContent::Email {
            subject: subject_line(message_type, ctx),
            html: format!("<p>{}</p>", text),
            text,
        },
    }
}

/// Render the text body, applying the custom template when present.
pub fn render_text(message_type: MessageType, ctx: &MessageContext) -> String {
    match ctx.custom_template.as_deref() {
        Some(template) => apply_template(template, ctx),
        None => default_text(message_type, ctx),
    }
}

fn subject_line(message_type: MessageType, ctx: &MessageContext) -> String {
    let phase = match message_type {
        MessageType::Departure => "departed",
        MessageType::EnRoute => "en route",
        MessageType::Arrival => "arrived",
        MessageType::Delay => "delayed",
        MessageType::Cancellation => "canceled",
    };
    format!("Flight {} {}", ctx.flight_number, phase)
}

fn apply_template(template: &str, ctx: &MessageContext) -> String {
    template
        .replace("{name}", &ctx.name)
        .replace("{flight}", &ctx.flight_number)
        .replace("{origin}", &ctx.origin)
        .replace("{destination}", &ctx.destination)
        .replace("{status}", &ctx.status.to_string())
}

fn default_text(message_type: MessageType, ctx: &MessageContext) -> String {
    match message_type {
        MessageType::Departure => {
            let eta = ctx
                .estimated_arrival
                .map(|t| format!(" Estimated arrival: {}.", format_time(t)))
                .unwrap_or_default();
            format!(
                "✈️ {}'s flight {} has departed {}.{}",
                ctx.name, ctx.flight_number, ctx.origin, eta
            )
        }
        MessageType::EnRoute => format!(
            "{}'s flight {} is en route to {}.",
            ctx.name, ctx.flight_number, ctx.destination
        ),
        MessageType::Arrival => format!(
            "🛬 {}'s flight {} has arrived in {}.",
            ctx.name, ctx.flight_number, ctx.destination
        ),
        MessageType::Delay => {
            let new_time = ctx
                .estimated_departure
                .map(|t| format!(" New departure: {}.", format_time(t)))
                .unwrap_or_default();
            format!(
                "⏱ {}'s flight {} from {} is delayed.{}",
                ctx.name, ctx.flight_number, ctx.origin, new_time
            )
        }
        MessageType::Cancellation => format!(
            "❌ {}'s flight {} from {} to {} has been canceled.",
            ctx.name, ctx.flight_number, ctx.origin, ctx.destination
        ),
    }
}

fn format_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_ctx() -> MessageContext {
        MessageContext {
            name: "Ada".to_string(),
            flight_number: "LH454".to_string(),
            origin: "Frankfurt".to_string(),
            destination: "San Francisco".to_string(),
            status: FlightStatus::Departed,
            estimated_departure: None,
            estimated_arrival: Some(Utc.with_ymd_and_hms(2026, 3, 1, 18, 30, 0).unwrap()),
            custom_template: None,
        }
    }

    #[test]
    fn test_departure_default_wording() {
        let text = render_text(MessageType::Departure, &make_ctx());
        assert!(text.contains("Ada"));
        assert!(text.contains("LH454"));
        assert!(text.contains("Frankfurt"));
        assert!(text.contains("2026-03-01 18:30 UTC"));
    }

    #[test]
    fn test_cancellation_default_wording() {
        let text = render_text(MessageType::Cancellation, &make_ctx());
        assert!(text.contains("canceled"));
        assert!(text.contains("San Francisco"));
    }

    #[test]
    fn test_custom_template_substitution() {
        let mut ctx = make_ctx();
        ctx.custom_template =
            Some("{name}: {flight} {origin}->{destination} is now {status}".to_string());
        let text = render_text(MessageType::Delay, &ctx);
        assert_eq!(text, "Ada: LH454 Frankfurt->San Francisco is now departed");
    }

    #[test]
    fn test_resolve_template_receiver_override_wins() {
        let receiver = serde_json::json!({ "delay": "receiver template" });
        let subscription = serde_json::json!({ "delay": "subscription template" });
        let resolved =
            resolve_template(Some(&receiver), Some(&subscription), MessageType::Delay);
        assert_eq!(resolved.as_deref(), Some("receiver template"));
    }

    #[test]
    fn test_resolve_template_falls_back_to_subscription() {
        let subscription = serde_json::json!({ "arrival": "landed!" });
        let resolved = resolve_template(None, Some(&subscription), MessageType::Arrival);
        assert_eq!(resolved.as_deref(), Some("landed!"));
    }

    #[test]
    fn test_resolve_template_missing_type_is_none() {
        let subscription = serde_json::json!({ "arrival": "landed!" });
        assert_eq!(
            resolve_template(None, Some(&subscription), MessageType::Delay),
            None
        );
    }

    #[test]
    fn test_email_content_has_subject() {
        let content = build_content(Channel::Email, MessageType::Arrival, &make_ctx());
        match content {
            MessageContent::Email { subject, html, text } => {
                assert_eq!(subject, "Flight LH454 arrived");
                assert!(html.starts_with("<p>"));
                assert!(text.contains("arrived"));
            }
            MessageContent::Text(_) => panic!("expected email envelope"),
        }
    }
}
