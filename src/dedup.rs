//! Deduplication guard run before every insert.
//!
//! Two policies, chosen per reading from where its timestamp came from:
//!
//! - [`DedupPolicy::NaturalKey`]: the feed supplied the timestamp, so a
//!   duplicate is an existing `(object_id, timestamp)` pair.
//! - [`DedupPolicy::ObjectIdOnly`]: the pipeline stamped the reading with its
//!   own clock, which never repeats. Any stored reading with the same
//!   `object_id` counts as a duplicate, including genuine re-measurements
//!   of the same sensor id.
//!
//! Check-then-insert is not atomic. Two staggered inserts racing on the same
//! key can both pass; with tens of seconds between them this is tolerated.

use crate::{
    errors::StoreError,
    models::{Reading, TimestampSource},
    store::SharedStore,
};

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupPolicy {
    NaturalKey,
    ObjectIdOnly,
}

impl DedupPolicy {
    pub fn for_reading(reading: &Reading) -> Self {
        // ---
        match reading.timestamp_source {
            TimestampSource::Feed => DedupPolicy::NaturalKey,
            TimestampSource::Pipeline => DedupPolicy::ObjectIdOnly,
        }
    }
}

#[derive(Clone)]
pub struct DeduplicationGuard {
    store: SharedStore,
}

impl DeduplicationGuard {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Readings without an `object_id` cannot be matched and are never
    /// reported as duplicates; ingestion drops them before this point.
    pub async fn is_duplicate(&self, reading: &Reading) -> Result<bool, StoreError> {
        // ---
        let Some(object_id) = reading.object_id else {
            return Ok(false);
        };

        match (DedupPolicy::for_reading(reading), reading.natural_key()) {
            (DedupPolicy::NaturalKey, Some(key)) => {
                self.store
                    .exists_by_object_id_and_timestamp(key.object_id, key.timestamp)
                    .await
            }
            _ => self.store.exists_by_object_id(object_id).await,
        }
    }
}
