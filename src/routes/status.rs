//! `GET /status/latest`: traffic-light flag for the newest reading.
//!
//! A reduced view of `/assessment/latest` for dashboards that only show
//! GREEN or RED. The same `Authorization` forwarding and "no data" rules
//! apply.

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::WaterQualityService;

// ---

/// JSON response body for `/status/latest`.
#[derive(Debug, Serialize)]
struct StatusResponse {
    /// When the flag was computed.
    timestamp: DateTime<Utc>,
    flag: &'static str,
}

/// Create a subrouter containing the `/status/latest` route.
///
/// # Returns
/// A [`Router`] over [`WaterQualityService`] with a single GET route.
pub fn router() -> Router<WaterQualityService> {
    // ---
    Router::new().route("/status/latest", get(latest_status))
}

/// Handle `GET /status/latest`.
///
/// # Returns
/// - `200` with `{ "timestamp", "flag" }`, where `flag` is `GREEN` or `RED`
/// - `204` when there is no reading to assess or the source is unavailable
async fn latest_status(
    State(service): State<WaterQualityService>,
    headers: HeaderMap,
) -> Response {
    // ---
    tracing::debug!("GET /status/latest");
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match service.assess_latest(authorization).await {
        Some(result) => {
            let body = StatusResponse {
                timestamp: Utc::now(),
                flag: result.status.flag(),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
