use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::recent::RecentlySeen;
use crate::{
    assessment::AssessmentResult,
    service::{log_assessment, WaterQualityService},
};

// ---

const RECENT_CAPACITY: usize = 10_000;

/// Periodic check that assesses the newest stored reading once.
///
/// A reading is assessed only if its record id has not been assessed in the
/// last 24 hours and it is not older than the last assessed reading.
pub struct AssessmentMonitor {
    service: WaterQualityService,
    assessed: RecentlySeen<Uuid>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl AssessmentMonitor {
    pub fn new(service: WaterQualityService) -> Self {
        Self {
            service,
            assessed: RecentlySeen::daily(RECENT_CAPACITY),
            last_timestamp: None,
        }
    }

    /// Returns the assessment if a new reading was found.
    pub async fn check(&mut self, now: DateTime<Utc>) -> Option<AssessmentResult> {
        // ---
        let latest = match self.service.get_latest_reading().await {
            Ok(Some(reading)) => reading,
            Ok(None) => {
                tracing::debug!("Monitor: no readings yet");
                return None;
            }
            Err(e) => {
                tracing::error!("Monitor: latest reading unavailable: {}", e);
                return None;
            }
        };

        let id = latest.id?;
        if self.assessed.contains(&id, now) {
            tracing::debug!("Monitor: record {} already assessed", id);
            return None;
        }
        if let (Some(last), Some(ts)) = (self.last_timestamp, latest.timestamp) {
            if ts < last {
                return None;
            }
        }

        self.assessed.check_and_insert(id, now);
        if latest.timestamp.is_some() {
            self.last_timestamp = latest.timestamp;
        }

        let result = self.service.assessor().assess(&latest);
        log_assessment(&result);
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::{
        assessment::{SafetyStatus, TdsPolicy},
        models::{Measurements, Reading, TimestampSource},
        store::{MemoryReadingStore, ReadingStore},
    };
    use chrono::TimeZone;
    use std::{sync::Arc, time::Duration};

    fn reading(object_id: i64, ph: f64, hour: u32) -> Reading {
        Reading {
            id: None,
            object_id: Some(object_id),
            timestamp: Some(Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap()),
            timestamp_source: TimestampSource::Pipeline,
            measurements: Measurements {
                ph: Some(ph),
                ..Measurements::default()
            },
        }
    }

    #[tokio::test]
    async fn test_each_reading_is_assessed_once() {
        // ---
        let store = Arc::new(MemoryReadingStore::new());
        let service =
            WaterQualityService::new(store.clone(), TdsPolicy::default(), Duration::from_secs(1));
        let mut monitor = AssessmentMonitor::new(service);
        let now = Utc::now();

        assert!(monitor.check(now).await.is_none());

        store.save(reading(1, 7.0, 10)).await.unwrap();
        let first = monitor.check(now).await.unwrap();
        assert_eq!(first.status, SafetyStatus::Safe);
        assert!(monitor.check(now).await.is_none());

        store.save(reading(2, 9.5, 11)).await.unwrap();
        let second = monitor.check(now).await.unwrap();
        assert_eq!(second.object_id, Some(2));
        assert_eq!(second.status, SafetyStatus::Unsafe);
    }
}
