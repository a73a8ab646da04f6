//! `GET /assessment/latest`: safety assessment of the newest reading.
//!
//! When an upstream monitoring service is configured the caller's
//! `Authorization` header is forwarded to it. Any failure along the way is
//! reported as "no data" (204), never as an error.

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use crate::WaterQualityService;

// ---

/// Create a subrouter containing the `/assessment/latest` route.
///
/// # Returns
/// A [`Router`] over [`WaterQualityService`] with a single GET route.
pub fn router() -> Router<WaterQualityService> {
    // ---
    Router::new().route("/assessment/latest", get(assess_latest))
}

/// Handle `GET /assessment/latest`.
///
/// # Returns
/// - `200` with the full [`crate::assessment::AssessmentResult`]
/// - `204` when there is nothing to assess
async fn assess_latest(
    State(service): State<WaterQualityService>,
    headers: HeaderMap,
) -> Response {
    // ---
    tracing::debug!("GET /assessment/latest");
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match service.assess_latest(authorization).await {
        Some(result) => (StatusCode::OK, Json(result)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
