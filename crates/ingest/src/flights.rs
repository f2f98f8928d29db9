//! Flight row persistence shared by both ingestion sources.
//!
//! Every persisted change bumps `status_version`, which anchors message
//! idempotency keys downstream.

use sqlx::PgPool;
use uuid::Uuid;

use contrail_common::error::AppError;
use contrail_common::types::{Flight, FlightStatus};

use crate::provider::ProviderFlight;

/// Look a flight up by the provider's asserted id first, then by flight
/// number (most recent wins).
pub async fn find_flight(
    pool: &PgPool,
    provider_flight_id: Option<&str>,
    flight_number: &str,
) -> Result<Option<Flight>, AppError> {
    if let Some(provider_id) = provider_flight_id {
        let row: Option<Flight> =
            sqlx::query_as("SELECT * FROM flights WHERE provider_flight_id = $1")
                .bind(provider_id)
                .fetch_optional(pool)
                .await?;
        if row.is_some() {
            return Ok(row);
        }
    }

    let row: Option<Flight> = sqlx::query_as(
        "SELECT * FROM flights WHERE flight_number = $1 ORDER BY created_at DESC LIMIT 1",
    )
    .bind(flight_number)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Create a flight row from a provider snapshot.
pub async fn create_flight(
    pool: &PgPool,
    snapshot: &ProviderFlight,
    status: FlightStatus,
) -> Result<Flight, AppError> {
    let (origin_code, origin_name, origin_tz) = airport_parts(snapshot.origin.as_ref());
    let (destination_code, destination_name, destination_tz) =
        airport_parts(snapshot.destination.as_ref());

    let flight: Flight = sqlx::query_as(
        r#"
        INSERT INTO flights
            (id, flight_number, airline,
             origin_code, origin_name, origin_tz,
             destination_code, destination_name, destination_tz,
             scheduled_departure, estimated_departure, actual_departure,
             scheduled_arrival, estimated_arrival, actual_arrival,
             status, status_version, provider_flight_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, 1, $17)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&snapshot.flight_number)
    .bind(&snapshot.airline)
    .bind(origin_code)
    .bind(origin_name)
    .bind(origin_tz)
    .bind(destination_code)
    .bind(destination_name)
    .bind(destination_tz)
    .bind(snapshot.scheduled_departure)
    .bind(snapshot.estimated_departure)
    .bind(snapshot.actual_departure)
    .bind(snapshot.scheduled_arrival)
    .bind(snapshot.estimated_arrival)
    .bind(snapshot.actual_arrival)
    .bind(status.to_string())
    .bind(&snapshot.provider_flight_id)
    .fetch_one(pool)
    .await?;

    tracing::info!(
        flight_id = %flight.id,
        flight_number = %flight.flight_number,
        status = %flight.status,
        "Flight created"
    );

    Ok(flight)
}

/// Merge a provider snapshot into an existing flight.
///
/// Returns `None` when nothing actually changed; otherwise persists the
/// merged row with `status_version` bumped and returns it.
pub async fn apply_update(
    pool: &PgPool,
    current: &Flight,
    snapshot: &ProviderFlight,
    new_status: FlightStatus,
) -> Result<Option<Flight>, AppError> {
    let estimated_departure = snapshot.estimated_departure.or(current.estimated_departure);
    let actual_departure = snapshot.actual_departure.or(current.actual_departure);
    let estimated_arrival = snapshot.estimated_arrival.or(current.estimated_arrival);
    let actual_arrival = snapshot.actual_arrival.or(current.actual_arrival);
    let provider_flight_id = snapshot
        .provider_flight_id
        .clone()
        .or_else(|| current.provider_flight_id.clone());

    let changed = new_status != current.status
        || estimated_departure != current.estimated_departure
        || actual_departure != current.actual_departure
        || estimated_arrival != current.estimated_arrival
        || actual_arrival != current.actual_arrival
        || provider_flight_id != current.provider_flight_id;

    if !changed {
        return Ok(None);
    }

    let flight: Flight = sqlx::query_as(
        r#"
        UPDATE flights
        SET status = $2,
            estimated_departure = $3,
            actual_departure = $4,
            estimated_arrival = $5,
            actual_arrival = $6,
            provider_flight_id = $7,
            status_version = status_version + 1,
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(current.id)
    .bind(new_status.to_string())
    .bind(estimated_departure)
    .bind(actual_departure)
    .bind(estimated_arrival)
    .bind(actual_arrival)
    .bind(provider_flight_id)
    .fetch_one(pool)
    .await?;

    tracing::info!(
        flight_id = %flight.id,
        flight_number = %flight.flight_number,
        old_status = %current.status,
        new_status = %flight.status,
        status_version = flight.status_version,
        "Flight updated"
    );

    Ok(Some(flight))
}

fn airport_parts(
    airport: Option<&crate::provider::ProviderAirport>,
) -> (String, Option<String>, Option<String>) {
    match airport {
        Some(a) => (a.code.clone(), a.name.clone(), a.timezone.clone()),
        None => ("???".to_string(), None, None),
    }
}
