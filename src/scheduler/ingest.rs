use std::fmt;

use chrono::{DateTime, Utc};

use crate::{
    dedup::DeduplicationGuard,
    errors::RowRejection,
    feed::RawRow,
    normalize::Normalizer,
    store::SharedStore,
};

// ---

/// What happened to a single raw row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Stored { object_id: i64 },
    Duplicate { object_id: i64 },
    Malformed(RowRejection),
    MissingObjectId,
    StoreFailed,
}

/// Per-tick / per-scan counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub stored: usize,
    pub duplicates: usize,
    pub malformed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl IngestSummary {
    pub fn record(&mut self, outcome: &IngestOutcome) {
        // ---
        match outcome {
            IngestOutcome::Stored { .. } => self.stored += 1,
            IngestOutcome::Duplicate { .. } => self.duplicates += 1,
            IngestOutcome::Malformed(_) => self.malformed += 1,
            IngestOutcome::MissingObjectId => self.skipped += 1,
            IngestOutcome::StoreFailed => self.failed += 1,
        }
    }
}

impl fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stored={} duplicates={} malformed={} skipped={} failed={}",
            self.stored, self.duplicates, self.malformed, self.skipped, self.failed
        )
    }
}

/// Normalize → dedup → save for one row. Never fails; every failure is an
/// outcome and is logged here.
#[derive(Clone)]
pub struct Ingestor {
    normalizer: Normalizer,
    guard: DeduplicationGuard,
    store: SharedStore,
}

impl Ingestor {
    pub fn new(normalizer: Normalizer, store: SharedStore) -> Self {
        Self {
            normalizer,
            guard: DeduplicationGuard::new(store.clone()),
            store,
        }
    }

    pub async fn ingest(&self, row: &RawRow, now: DateTime<Utc>) -> IngestOutcome {
        // ---
        let reading = match self.normalizer.normalize(row, now) {
            Ok(reading) => reading,
            Err(rejection) => {
                tracing::warn!("Skipping malformed line {}: {}", row.line, rejection);
                return IngestOutcome::Malformed(rejection);
            }
        };

        let Some(object_id) = reading.object_id else {
            tracing::warn!("Skipping line {}: no usable OBJECTID", row.line);
            return IngestOutcome::MissingObjectId;
        };

        match self.guard.is_duplicate(&reading).await {
            Ok(true) => {
                tracing::info!("Duplicate record, skipping OBJECTID {}", object_id);
                return IngestOutcome::Duplicate { object_id };
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!("Duplicate check failed for OBJECTID {}: {}", object_id, e);
                return IngestOutcome::StoreFailed;
            }
        }

        match self.store.save(reading).await {
            Ok(saved) => {
                tracing::info!(
                    "Stored record {:?} for OBJECTID {} at {:?}",
                    saved.id,
                    object_id,
                    saved.timestamp
                );
                IngestOutcome::Stored { object_id }
            }
            Err(e) => {
                tracing::error!("Failed to store OBJECTID {}: {}", object_id, e);
                IngestOutcome::StoreFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::store::{MemoryReadingStore, ReadingStore};
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 26, 18, 45, 0).unwrap()
    }

    #[tokio::test]
    async fn test_same_natural_key_twice_stores_once() {
        // ---
        let store = Arc::new(MemoryReadingStore::new());
        let ingestor = Ingestor::new(Normalizer::new(true), store.clone());
        let row = RawRow::parse(2, "42,7.0,,,,,,,,,2025-03-01T10:00:00Z");

        assert_eq!(
            ingestor.ingest(&row, now()).await,
            IngestOutcome::Stored { object_id: 42 }
        );
        assert_eq!(
            ingestor.ingest(&row, now() + Duration::seconds(30)).await,
            IngestOutcome::Duplicate { object_id: 42 }
        );
        assert_eq!(store.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pipeline_timestamps_dedup_on_object_id() {
        // ---
        let store = Arc::new(MemoryReadingStore::new());
        let ingestor = Ingestor::new(Normalizer::default(), store.clone());
        let row = RawRow::parse(2, "42,7.0,,,,,,,,");

        ingestor.ingest(&row, now()).await;
        let again = ingestor.ingest(&row, now() + Duration::minutes(5)).await;

        assert_eq!(again, IngestOutcome::Duplicate { object_id: 42 });
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_malformed_and_anonymous_rows_are_not_stored() {
        // ---
        let store = Arc::new(MemoryReadingStore::new());
        let ingestor = Ingestor::new(Normalizer::default(), store.clone());
        let mut summary = IngestSummary::default();

        for text in ["1,7.0,100", ",7.0,,,,,,,,", "2,7.0,,,,,,,,"] {
            let outcome = ingestor.ingest(&RawRow::parse(2, text), now()).await;
            summary.record(&outcome);
        }

        assert_eq!(
            summary,
            IngestSummary {
                stored: 1,
                malformed: 1,
                skipped: 1,
                ..IngestSummary::default()
            }
        );
        assert_eq!(store.len().await, 1);
    }
}
