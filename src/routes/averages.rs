//! Parameter averages over the whole history or one calendar month.
//!
//! - `GET /averages?window=overall|month&month=YYYY-MM`
//! - `GET /averages/{parameter}?window=...&month=...`
//!
//! A parameter with no values in the window averages to `null`.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::{aggregation::Window, models::Parameter, WaterQualityService};

// ---

/// Create a subrouter containing the `/averages` routes.
///
/// # Returns
/// A [`Router`] over [`WaterQualityService`] with GET `/averages` and
/// GET `/averages/{parameter}`.
pub fn router() -> Router<WaterQualityService> {
    // ---
    Router::new()
        .route("/averages", get(all_averages))
        .route("/averages/{parameter}", get(parameter_average))
}

#[derive(Debug, Default, Deserialize)]
struct WindowQuery {
    window: Option<String>,
    month: Option<String>,
}

impl WindowQuery {
    fn resolve(&self) -> Result<Window, ApiError> {
        Ok(Window::from_query(
            self.window.as_deref(),
            self.month.as_deref(),
            Utc::now(),
        )?)
    }
}

#[derive(Debug, Serialize)]
struct AveragesResponse {
    window: String,
    averages: BTreeMap<&'static str, Option<f64>>,
}

#[derive(Debug, Serialize)]
struct ParameterAverageResponse {
    parameter: &'static str,
    window: String,
    average: Option<f64>,
}

/// Handle `GET /averages`.
///
/// # Returns
/// - `200` with one entry per parameter, `null` where the window has no data
/// - `400` for an unknown `window` or a malformed `month`
async fn all_averages(
    State(service): State<WaterQualityService>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<AveragesResponse>, ApiError> {
    // ---
    let window = query.resolve()?;
    tracing::debug!("GET /averages window={}", window);

    let averages = service.all_averages(window).await;
    Ok(Json(AveragesResponse {
        window: window.to_string(),
        averages,
    }))
}

/// Handle `GET /averages/{parameter}`. Accepts the parameter aliases listed
/// on [`Parameter`]; anything else is a `400`.
async fn parameter_average(
    State(service): State<WaterQualityService>,
    Path(parameter): Path<String>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<ParameterAverageResponse>, ApiError> {
    // ---
    let parameter: Parameter = parameter.parse()?;
    let window = query.resolve()?;
    tracing::debug!("GET /averages/{} window={}", parameter, window);

    let average = service.average_for_parameter(parameter, window).await;
    Ok(Json(ParameterAverageResponse {
        parameter: parameter.name(),
        window: window.to_string(),
        average,
    }))
}
