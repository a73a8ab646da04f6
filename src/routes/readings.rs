//! `GET /readings` and `GET /readings/latest`.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use super::ApiError;
use crate::WaterQualityService;

// ---

/// Create a subrouter containing the `/readings` routes.
///
/// # Returns
/// A [`Router`] over [`WaterQualityService`] with GET `/readings` and
/// GET `/readings/latest`.
pub fn router() -> Router<WaterQualityService> {
    // ---
    Router::new()
        .route("/readings", get(all_readings))
        .route("/readings/latest", get(latest_reading))
}

/// Handle `GET /readings`.
///
/// # Returns
/// - `200` with every stored reading
/// - `204` if there are none
/// - `500`/`504` via [`ApiError`] when the store fails or times out
async fn all_readings(State(service): State<WaterQualityService>) -> Result<Response, ApiError> {
    // ---
    tracing::debug!("GET /readings");
    let readings = service.get_all_readings().await?;
    if readings.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    tracing::info!("GET /readings - returning {} readings", readings.len());
    Ok((StatusCode::OK, Json(readings)).into_response())
}

/// Handle `GET /readings/latest`: the reading with the greatest timestamp,
/// or `204` when the store is empty.
async fn latest_reading(
    State(service): State<WaterQualityService>,
) -> Result<Response, ApiError> {
    // ---
    tracing::debug!("GET /readings/latest");
    match service.get_latest_reading().await? {
        Some(reading) => Ok((StatusCode::OK, Json(reading)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}
