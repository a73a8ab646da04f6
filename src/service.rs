//! Transport-agnostic query surface.
//!
//! Every store or upstream call made here is bounded by the configured query
//! timeout. Assessment and averages never fail outward: a timeout or error is
//! logged and the caller gets `None` ("no data").

use std::{collections::BTreeMap, future::Future, time::Duration};

use crate::{
    aggregation::{Aggregator, Window},
    assessment::{AssessmentResult, SafetyAssessor, TdsPolicy},
    errors::StoreError,
    models::{Parameter, Reading},
    store::SharedStore,
    upstream::UpstreamClient,
};

// ---

#[derive(Clone)]
pub struct WaterQualityService {
    store: SharedStore,
    upstream: Option<UpstreamClient>,
    assessor: SafetyAssessor,
    aggregator: Aggregator,
    timeout: Duration,
}

impl WaterQualityService {
    pub fn new(store: SharedStore, tds_policy: TdsPolicy, timeout: Duration) -> Self {
        Self {
            store,
            upstream: None,
            assessor: SafetyAssessor::new(tds_policy),
            aggregator: Aggregator::new(tds_policy),
            timeout,
        }
    }

    /// Assess the upstream service's latest reading instead of the local one.
    pub fn with_upstream(mut self, upstream: UpstreamClient) -> Self {
        self.upstream = Some(upstream);
        self
    }

    pub fn assessor(&self) -> &SafetyAssessor {
        &self.assessor
    }

    pub async fn get_all_readings(&self) -> Result<Vec<Reading>, StoreError> {
        self.bounded(self.store.find_all()).await
    }

    pub async fn get_latest_reading(&self) -> Result<Option<Reading>, StoreError> {
        self.bounded(self.store.find_latest_by_timestamp()).await
    }

    /// Assess the newest reading, from upstream if configured, else the store.
    pub async fn assess_latest(&self, authorization: Option<&str>) -> Option<AssessmentResult> {
        // ---
        let latest = match &self.upstream {
            Some(upstream) => match upstream.fetch_latest(authorization).await {
                Ok(reading) => reading,
                Err(e) => {
                    tracing::error!("Upstream latest reading unavailable: {}", e);
                    return None;
                }
            },
            None => match self.get_latest_reading().await {
                Ok(reading) => reading,
                Err(e) => {
                    tracing::error!("Latest reading unavailable: {}", e);
                    return None;
                }
            },
        };

        let Some(reading) = latest else {
            tracing::info!("No readings to assess");
            return None;
        };

        let result = self.assessor.assess(&reading);
        log_assessment(&result);
        Some(result)
    }

    pub async fn average_for_parameter(&self, parameter: Parameter, window: Window) -> Option<f64> {
        // ---
        let readings = self.readings_or_log().await?;
        self.aggregator.average(&readings, parameter, window)
    }

    /// All ten parameters; if the store is unreachable every entry is `None`.
    pub async fn all_averages(&self, window: Window) -> BTreeMap<&'static str, Option<f64>> {
        // ---
        let readings = self.readings_or_log().await.unwrap_or_default();
        self.aggregator.all_averages(&readings, window)
    }

    async fn readings_or_log(&self) -> Option<Vec<Reading>> {
        // ---
        match self.get_all_readings().await {
            Ok(readings) => Some(readings),
            Err(e) => {
                tracing::error!("Readings unavailable for aggregation: {}", e);
                None
            }
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        // ---
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }
}

pub(crate) fn log_assessment(result: &AssessmentResult) {
    // ---
    tracing::info!(
        "Water safety flag for OBJECTID {:?}: {} ({} issues)",
        result.object_id,
        result.status.flag(),
        result.issues.len()
    );
    if !result.issues.is_empty() {
        tracing::warn!(
            "Water quality issues for OBJECTID {:?}: {}",
            result.object_id,
            result.issues.join("; ")
        );
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::{
        assessment::SafetyStatus,
        models::{Measurements, TimestampSource},
        store::{MemoryReadingStore, ReadingStore},
    };
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Arc;

    fn reading(object_id: i64, ph: Option<f64>, ts: DateTime<Utc>) -> Reading {
        Reading {
            id: None,
            object_id: Some(object_id),
            timestamp: Some(ts),
            timestamp_source: TimestampSource::Pipeline,
            measurements: Measurements {
                ph,
                ..Measurements::default()
            },
        }
    }

    async fn service_with(readings: Vec<Reading>) -> WaterQualityService {
        let store = Arc::new(MemoryReadingStore::new());
        for r in readings {
            store.save(r).await.unwrap();
        }
        WaterQualityService::new(store, TdsPolicy::default(), Duration::from_secs(1))
    }

    /// Store whose every call hangs.
    struct StalledStore;

    #[async_trait]
    impl ReadingStore for StalledStore {
        async fn save(&self, _: Reading) -> Result<Reading, StoreError> {
            std::future::pending().await
        }
        async fn exists_by_object_id(&self, _: i64) -> Result<bool, StoreError> {
            std::future::pending().await
        }
        async fn exists_by_object_id_and_timestamp(
            &self,
            _: i64,
            _: DateTime<Utc>,
        ) -> Result<bool, StoreError> {
            std::future::pending().await
        }
        async fn find_all(&self) -> Result<Vec<Reading>, StoreError> {
            std::future::pending().await
        }
        async fn find_latest_by_timestamp(&self) -> Result<Option<Reading>, StoreError> {
            std::future::pending().await
        }
        async fn delete_all(&self) -> Result<u64, StoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_assess_latest_uses_newest_reading() {
        // ---
        let t = |h| Utc.with_ymd_and_hms(2025, 3, 1, h, 0, 0).unwrap();
        let service = service_with(vec![
            reading(1, Some(4.0), t(10)),
            reading(2, Some(7.0), t(8)),
        ])
        .await;

        let result = service.assess_latest(None).await.unwrap();
        assert_eq!(result.object_id, Some(1));
        assert_eq!(result.status, SafetyStatus::Unsafe);
        assert!(result.record_ref.is_some());
    }

    #[tokio::test]
    async fn test_empty_store_is_no_data() {
        // ---
        let service = service_with(vec![]).await;
        assert_eq!(service.assess_latest(None).await, None);
        assert_eq!(
            service
                .average_for_parameter(Parameter::Ph, Window::Overall)
                .await,
            None
        );
        assert!(service
            .all_averages(Window::Overall)
            .await
            .values()
            .all(Option::is_none));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_store_degrades_to_no_data() {
        // ---
        let service =
            WaterQualityService::new(Arc::new(StalledStore), TdsPolicy::default(), Duration::from_secs(5));

        assert_eq!(service.assess_latest(None).await, None);
        assert_eq!(
            service
                .average_for_parameter(Parameter::Ph, Window::Overall)
                .await,
            None
        );
        assert!(matches!(
            service.get_all_readings().await,
            Err(StoreError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_degrades_to_none() {
        // ---
        let upstream = UpstreamClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let service = service_with(vec![reading(1, Some(7.0), Utc::now())])
            .await
            .with_upstream(upstream);

        assert_eq!(service.assess_latest(Some("Bearer abc")).await, None);
    }

    #[tokio::test]
    async fn test_month_averages_skip_other_months() {
        // ---
        let now = Utc::now();
        let long_ago = Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap();
        let service = service_with(vec![
            reading(1, Some(7.0), now),
            reading(2, Some(1.0), long_ago),
        ])
        .await;

        let month = service.all_averages(Window::this_month(now)).await;
        assert_eq!(month["ph"], Some(7.0));

        let overall = service
            .average_for_parameter(Parameter::Ph, Window::Overall)
            .await;
        assert_eq!(overall, Some(4.0));
    }
}
