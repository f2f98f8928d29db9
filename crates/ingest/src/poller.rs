//! Scheduled pull ingestion.
//!
//! Each run selects flights still worth watching — not yet arrived or
//! canceled, departing within the horizon, with at least one active
//! polling-enabled subscription — re-fetches their status from the
//! provider, and feeds significant transitions into the status-change
//! handler. One flight's failure is collected, never thrown: partial
//! failure is the normal case for a batch job.

use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;

use contrail_common::error::AppError;
use contrail_common::types::Flight;
use contrail_engine::handler::StatusChangeHandler;
use contrail_engine::status::{is_significant, normalize};
use contrail_engine::subscription::SubscriptionService;

use crate::flights;
use crate::provider::FlightDataClient;

/// Aggregate result of one polling run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollSummary {
    pub flights_polled: u32,
    pub flights_updated: u32,
    pub errors: Vec<String>,
}

pub struct PollRun {
    provider: FlightDataClient,
    handler: StatusChangeHandler,
    horizon: Duration,
}

impl PollRun {
    pub fn new(provider: FlightDataClient, max_attempts: i32, poll_horizon_hours: i64) -> Self {
        Self {
            provider,
            handler: StatusChangeHandler::new(max_attempts),
            horizon: Duration::hours(poll_horizon_hours),
        }
    }

    /// Poll every eligible flight once.
    pub async fn run(&self, pool: &PgPool) -> Result<PollSummary, AppError> {
        let flights = self.pollable_flights(pool).await?;
        let mut summary = PollSummary::default();

        for flight in &flights {
            summary.flights_polled += 1;
            match self.poll_one(pool, flight).await {
                Ok(true) => summary.flights_updated += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        flight_number = %flight.flight_number,
                        error = %e,
                        "Polling one flight failed"
                    );
                    summary
                        .errors
                        .push(format!("flight {}: {}", flight.flight_number, e));
                }
            }
        }

        tracing::info!(
            flights_polled = summary.flights_polled,
            flights_updated = summary.flights_updated,
            errors = summary.errors.len(),
            "Polling run finished"
        );

        Ok(summary)
    }

    /// Flights worth a provider call this run.
    async fn pollable_flights(&self, pool: &PgPool) -> Result<Vec<Flight>, AppError> {
        let horizon_end = Utc::now() + self.horizon;

        let rows: Vec<Flight> = sqlx::query_as(
            r#"
            SELECT DISTINCT f.*
            FROM flights f
            JOIN subscriptions s ON s.flight_id = f.id
            WHERE s.active = true
              AND s.polling_enabled = true
              AND f.status NOT IN ('arrived', 'canceled')
              AND f.scheduled_departure IS NOT NULL
              AND f.scheduled_departure <= $1
            "#,
        )
        .bind(horizon_end)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    /// Re-fetch one flight; returns whether anything was persisted.
    async fn poll_one(&self, pool: &PgPool, flight: &Flight) -> Result<bool, AppError> {
        let snapshot = self.provider.fetch_status(&flight.flight_number).await?;

        let new_status = snapshot
            .status
            .as_deref()
            .map(normalize)
            .unwrap_or(flight.status);

        let Some(updated) = flights::apply_update(pool, flight, &snapshot, new_status).await?
        else {
            return Ok(false);
        };

        if is_significant(flight.status, new_status) {
            for subscription in
                SubscriptionService::find_active_by_flight(pool, updated.id).await?
            {
                self.handler
                    .on_status_change(pool, &subscription, &updated, new_status)
                    .await?;
            }
        }

        Ok(true)
    }
}
