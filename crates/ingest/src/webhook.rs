//! Provider webhook processor.
//!
//! Pipeline per request:
//! 1. Verify the HMAC-SHA256 signature (reject at the boundary on mismatch)
//! 2. Persist the raw payload before any processing (audit/replay)
//! 3. Parse the canonical flight shape and upsert the flight row
//! 4. On a significant transition, fan out to every active subscription
//! 5. Mark the persisted event processed, recording any error without
//!    losing the original payload
//!
//! Business-level misses (unparseable flight shape, no tracked flight) are
//! acknowledged as success to the provider — erroring would only trigger a
//! retry storm — while the event row keeps the error for replay.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use sqlx::PgPool;
use uuid::Uuid;

use contrail_common::error::AppError;
use contrail_common::types::{Flight, FlightStatus};
use contrail_engine::handler::StatusChangeHandler;
use contrail_engine::status::{is_significant, normalize};
use contrail_engine::subscription::SubscriptionService;

use crate::flights;
use crate::provider::ProviderFlight;

type HmacSha256 = Hmac<Sha256>;

/// Canonical webhook body: an optional event tag plus the flight snapshot.
/// The event tag wins over the snapshot's status string when present.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderWebhook {
    pub event: Option<String>,
    pub flight: ProviderFlight,
}

/// What one webhook delivery did.
#[derive(Debug, Clone, Default)]
pub struct WebhookOutcome {
    pub flight_id: Option<Uuid>,
    pub significant: bool,
    pub messages_created: u32,
    /// Business-level note for acked-but-unprocessed payloads.
    pub note: Option<String>,
}

pub struct WebhookProcessor {
    secret: String,
    handler: StatusChangeHandler,
}

impl WebhookProcessor {
    pub fn new(secret: String, max_attempts: i32) -> Self {
        Self {
            secret,
            handler: StatusChangeHandler::new(max_attempts),
        }
    }

    /// Verify the signature header against the raw body.
    ///
    /// Accepts plain hex or a `sha256=`-prefixed digest.
    pub fn verify_signature(&self, raw_body: &[u8], signature: Option<&str>) -> bool {
        let Some(signature) = signature else {
            return false;
        };
        let signature = signature.strip_prefix("sha256=").unwrap_or(signature);

        let Ok(mut mac) = HmacSha256::new_from_slice(self.secret.as_bytes()) else {
            return false;
        };
        mac.update(raw_body);
        let expected = hex::encode(mac.finalize().into_bytes());

        // Constant-time-ish comparison over fixed-length hex digests
        expected.len() == signature.len()
            && expected
                .bytes()
                .zip(signature.bytes())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }

    /// Process one webhook delivery end to end.
    pub async fn process(
        &self,
        pool: &PgPool,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, AppError> {
        if !self.verify_signature(raw_body, signature) {
            return Err(AppError::Auth("invalid webhook signature".to_string()));
        }

        // Malformed JSON never enters the pipeline.
        let payload: Value = serde_json::from_slice(raw_body)
            .map_err(|e| AppError::Validation(format!("invalid webhook JSON: {}", e)))?;

        // Persist the raw payload before doing anything with it.
        let event_id = Uuid::new_v4();
        sqlx::query("INSERT INTO provider_events (id, payload) VALUES ($1, $2)")
            .bind(event_id)
            .bind(&payload)
            .execute(pool)
            .await?;

        match self.apply(pool, &payload).await {
            Ok(outcome) => {
                sqlx::query(
                    "UPDATE provider_events SET processed = true, processed_at = now() WHERE id = $1",
                )
                .bind(event_id)
                .execute(pool)
                .await?;
                Ok(outcome)
            }
            Err(AppError::Validation(msg)) | Err(AppError::NotFound(msg)) => {
                // Ack to the provider, keep the error on the event row.
                sqlx::query(
                    "UPDATE provider_events SET processed = true, error = $2, processed_at = now() WHERE id = $1",
                )
                .bind(event_id)
                .bind(&msg)
                .execute(pool)
                .await?;

                tracing::warn!(event_id = %event_id, error = msg, "Webhook acked without processing");
                Ok(WebhookOutcome {
                    note: Some(msg),
                    ..WebhookOutcome::default()
                })
            }
            Err(e) => {
                sqlx::query(
                    "UPDATE provider_events SET error = $2, processed_at = now() WHERE id = $1",
                )
                .bind(event_id)
                .bind(e.to_string())
                .execute(pool)
                .await?;
                Err(e)
            }
        }
    }

    async fn apply(&self, pool: &PgPool, payload: &Value) -> Result<WebhookOutcome, AppError> {
        let webhook: ProviderWebhook = serde_json::from_value(payload.clone())
            .map_err(|e| AppError::Validation(format!("unrecognized webhook shape: {}", e)))?;

        let raw_status = webhook
            .event
            .as_deref()
            .or(webhook.flight.status.as_deref())
            .unwrap_or_default();
        let new_status = normalize(raw_status);

        let (flight, old_status) = self.upsert_flight(pool, &webhook.flight, new_status).await?;

        let significant = is_significant(old_status, new_status);
        let mut messages_created = 0;

        if significant {
            for subscription in SubscriptionService::find_active_by_flight(pool, flight.id).await? {
                let created = self
                    .handler
                    .on_status_change(pool, &subscription, &flight, new_status)
                    .await?;
                messages_created += created.created;
            }
        }

        tracing::info!(
            flight_id = %flight.id,
            old_status = %old_status,
            new_status = %new_status,
            significant,
            messages_created,
            "Webhook processed"
        );

        Ok(WebhookOutcome {
            flight_id: Some(flight.id),
            significant,
            messages_created,
            note: None,
        })
    }

    /// Upsert the flight row; returns the persisted flight and the status it
    /// held before this delivery.
    async fn upsert_flight(
        &self,
        pool: &PgPool,
        snapshot: &ProviderFlight,
        new_status: FlightStatus,
    ) -> Result<(Flight, FlightStatus), AppError> {
        if snapshot.flight_number.is_empty() {
            return Err(AppError::Validation(
                "webhook flight is missing a flight number".to_string(),
            ));
        }

        match flights::find_flight(
            pool,
            snapshot.provider_flight_id.as_deref(),
            &snapshot.flight_number,
        )
        .await?
        {
            Some(existing) => {
                let old_status = existing.status;
                let flight = flights::apply_update(pool, &existing, snapshot, new_status)
                    .await?
                    .unwrap_or(existing);
                Ok((flight, old_status))
            }
            None => {
                let flight = flights::create_flight(pool, snapshot, new_status).await?;
                // A freshly created flight has no prior status to compare
                // against; treat it as scheduled so a first "departed"
                // delivery still notifies.
                Ok((flight, FlightStatus::Scheduled))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor() -> WebhookProcessor {
        WebhookProcessor::new("test-webhook-secret".to_string(), 3)
    }

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_signature_roundtrip() {
        let body = br#"{"flight":{"flight_number":"LH454"}}"#;
        let sig = sign("test-webhook-secret", body);
        assert!(processor().verify_signature(body, Some(&sig)));
    }

    #[test]
    fn test_signature_accepts_sha256_prefix() {
        let body = b"{}";
        let sig = format!("sha256={}", sign("test-webhook-secret", body));
        assert!(processor().verify_signature(body, Some(&sig)));
    }

    #[test]
    fn test_signature_rejects_wrong_secret() {
        let body = b"{}";
        let sig = sign("other-secret", body);
        assert!(!processor().verify_signature(body, Some(&sig)));
    }

    #[test]
    fn test_signature_rejects_tampered_body() {
        let sig = sign("test-webhook-secret", b"{}");
        assert!(!processor().verify_signature(b"{ }", Some(&sig)));
    }

    #[test]
    fn test_signature_rejects_missing_header() {
        assert!(!processor().verify_signature(b"{}", None));
    }

    #[test]
    fn test_webhook_shape_parses() {
        let payload = serde_json::json!({
            "event": "departed",
            "flight": {
                "flight_number": "LH454",
                "provider_flight_id": "pf-1",
                "status": "scheduled",
                "origin": { "code": "FRA", "name": "Frankfurt" },
                "destination": { "code": "SFO" },
            }
        });
        let webhook: ProviderWebhook = serde_json::from_value(payload).unwrap();
        assert_eq!(webhook.event.as_deref(), Some("departed"));
        assert_eq!(webhook.flight.flight_number, "LH454");
        assert_eq!(webhook.flight.origin.unwrap().code, "FRA");
    }
}
