//! Thin HTTP client for the flight-data provider.
//!
//! Timeouts and provider 5xx responses surface as `AppError::Provider`,
//! which callers treat as retryable — one flight's bad poll never aborts a
//! batch.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use contrail_common::config::AppConfig;
use contrail_common::error::AppError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Provider-shaped flight snapshot. The `status` string is raw provider
/// vocabulary; normalization happens in the engine.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderFlight {
    pub provider_flight_id: Option<String>,
    pub flight_number: String,
    pub status: Option<String>,
    pub airline: Option<String>,
    pub origin: Option<ProviderAirport>,
    pub destination: Option<ProviderAirport>,
    pub scheduled_departure: Option<DateTime<Utc>>,
    pub estimated_departure: Option<DateTime<Utc>>,
    pub actual_departure: Option<DateTime<Utc>>,
    pub scheduled_arrival: Option<DateTime<Utc>>,
    pub estimated_arrival: Option<DateTime<Utc>>,
    pub actual_arrival: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderAirport {
    pub code: String,
    pub name: Option<String>,
    pub timezone: Option<String>,
}

pub struct FlightDataClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl FlightDataClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url,
            api_key,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.provider_base_url.clone(),
            config.provider_api_key.clone(),
        )
    }

    /// Fetch the provider's current snapshot for a flight number.
    pub async fn fetch_status(&self, flight_number: &str) -> Result<ProviderFlight, AppError> {
        let url = format!(
            "{}/flights/{}",
            self.base_url.trim_end_matches('/'),
            flight_number
        );

        let mut request = self.client.get(&url);
        if let Some(key) = self.api_key.as_deref() {
            request = request.header("x-api-key", key);
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Provider(format!("status fetch timed out for {}", flight_number))
            } else {
                AppError::Provider(format!("status fetch failed for {}: {}", flight_number, e))
            }
        })?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!(
                "Flight {} not known to provider",
                flight_number
            )));
        }
        if !resp.status().is_success() {
            return Err(AppError::Provider(format!(
                "provider returned {} for {}",
                resp.status(),
                flight_number
            )));
        }

        resp.json::<ProviderFlight>()
            .await
            .map_err(|e| AppError::Provider(format!("malformed provider response: {}", e)))
    }

    /// Register a push webhook for a flight. Returns the provider's
    /// registration id, stored on the subscription for later teardown.
    pub async fn register_webhook(
        &self,
        flight_number: &str,
        callback_url: &str,
    ) -> Result<String, AppError> {
        let url = format!("{}/webhooks", self.base_url.trim_end_matches('/'));

        let mut request = self.client.post(&url).json(&serde_json::json!({
            "flight_number": flight_number,
            "callback_url": callback_url,
        }));
        if let Some(key) = self.api_key.as_deref() {
            request = request.header("x-api-key", key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("webhook registration failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(AppError::Provider(format!(
                "webhook registration returned {}",
                resp.status()
            )));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("malformed registration response: {}", e)))?;

        body.get("id")
            .and_then(serde_json::Value::as_str)
            .map(String::from)
            .ok_or_else(|| AppError::Provider("registration response missing id".to_string()))
    }

    pub async fn unregister_webhook(&self, webhook_id: &str) -> Result<(), AppError> {
        let url = format!(
            "{}/webhooks/{}",
            self.base_url.trim_end_matches('/'),
            webhook_id
        );

        let mut request = self.client.delete(&url);
        if let Some(key) = self.api_key.as_deref() {
            request = request.header("x-api-key", key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("webhook teardown failed: {}", e)))?;

        if !resp.status().is_success() && resp.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::Provider(format!(
                "webhook teardown returned {}",
                resp.status()
            )));
        }

        Ok(())
    }
}
