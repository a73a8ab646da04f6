//! Client for a remote monitoring service's "latest reading" endpoint.
//!
//! Used when this instance assesses readings owned by another deployment.
//! The caller's `Authorization` header is forwarded as-is.

use std::time::Duration;

use reqwest::{header::AUTHORIZATION, Client, StatusCode};

use crate::{errors::UpstreamError, models::Reading};

// ---

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        // ---
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn latest_url(&self) -> String {
        format!("{}/readings/latest", self.base_url)
    }

    /// `Ok(None)` when the upstream answers 204 (no readings yet).
    pub async fn fetch_latest(
        &self,
        authorization: Option<&str>,
    ) -> Result<Option<Reading>, UpstreamError> {
        // ---
        let url = self.latest_url();
        tracing::debug!("Fetching latest reading from {}", url);

        let mut request = self.client.get(&url);
        if let Some(auth) = authorization {
            request = request.header(AUTHORIZATION, auth);
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;
        match response.status() {
            StatusCode::NO_CONTENT => Ok(None),
            status if status.is_success() => {
                let reading = response.json::<Reading>().await.map_err(|e| self.classify(e))?;
                tracing::info!(
                    "Fetched latest reading from upstream: OBJECTID {:?}",
                    reading.object_id
                );
                Ok(Some(reading))
            }
            status => Err(UpstreamError::Status(status.as_u16())),
        }
    }

    fn classify(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout(self.timeout)
        } else {
            UpstreamError::Request(err)
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_latest_url_trims_trailing_slash() {
        // ---
        let client = UpstreamClient::new("http://monitor:8081/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.latest_url(), "http://monitor:8081/readings/latest");
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_an_error() {
        // ---
        // Nothing listens on the discard port locally.
        let client = UpstreamClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        assert!(client.fetch_latest(Some("Bearer t")).await.is_err());
    }
}
