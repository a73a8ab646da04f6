//! `GET /thresholds`: the WHO limits every assessment is checked against.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::{
    assessment::{limits, TdsPolicy},
    WaterQualityService,
};

// ---

/// JSON response body for `/thresholds`.
///
/// Every limit is inclusive except `nitrite_max_mgl`, which a reading must
/// stay strictly below.
#[derive(Debug, Serialize)]
struct ThresholdsResponse {
    ph_min: f64,
    ph_max: f64,
    alkalinity_max_mgl: f64,
    conductivity_max_uscm: f64,
    nitrite_max_mgl: f64,
    tds_max_mgl: f64,
    tds_policy: TdsPolicy,
}

/// Create a subrouter containing the `/thresholds` route.
///
/// # Returns
/// A [`Router`] over [`WaterQualityService`] with a single GET route.
pub fn router() -> Router<WaterQualityService> {
    // ---
    Router::new().route("/thresholds", get(thresholds))
}

/// Handle `GET /thresholds`.
///
/// Static apart from `tds_policy`, which reports how this deployment treats
/// missing TDS operands. Never touches the reading store.
async fn thresholds(State(service): State<WaterQualityService>) -> Json<ThresholdsResponse> {
    // ---
    tracing::debug!("GET /thresholds");
    Json(ThresholdsResponse {
        ph_min: limits::MIN_PH,
        ph_max: limits::MAX_PH,
        alkalinity_max_mgl: limits::MAX_ALKALINITY_MG_L,
        conductivity_max_uscm: limits::MAX_CONDUCTIVITY_US_CM,
        nitrite_max_mgl: limits::MAX_NITRITE_MG_L,
        tds_max_mgl: limits::MAX_TDS_MG_L,
        tds_policy: service.assessor().tds_policy(),
    })
}
