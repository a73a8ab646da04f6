//! HTTP gateway.
//!
//! Each sibling module exports a subrouter over [`WaterQualityService`]; this
//! gateway merges them and attaches the state, so `main.rs` never sees
//! individual endpoints.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Serialize;

use crate::{
    errors::{QueryError, StoreError},
    WaterQualityService,
};

mod assessment;
mod averages;
mod health;
mod readings;
mod status;
mod thresholds;

// ---

/// Build the top-level API router.
///
/// Merges every endpoint subrouter and attaches `service` as the shared
/// state, so callers get a ready-to-serve [`Router`].
///
/// # Returns
/// A stateless [`Router`] that can be passed straight to `axum::serve`.
pub fn router(service: WaterQualityService) -> Router {
    // ---
    Router::new()
        .merge(readings::router())
        .merge(assessment::router())
        .merge(status::router())
        .merge(averages::router())
        .merge(thresholds::router())
        .merge(health::router())
        .with_state(service)
}

/// Error body shared by all routes.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Failures a handler can surface to the client.
#[derive(Debug)]
pub(crate) enum ApiError {
    BadRequest(QueryError),
    Store(StoreError),
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::BadRequest(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let (status, error) = match self {
            ApiError::BadRequest(e) => {
                tracing::warn!(error = %e, "Rejected request");
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::Store(e) => {
                tracing::error!(error = %e, "Store unavailable");
                let status = match e {
                    StoreError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                    StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, "reading store unavailable".to_string())
            }
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}
