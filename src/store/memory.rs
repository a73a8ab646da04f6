use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::ReadingStore;
use crate::{
    errors::StoreError,
    models::{NaturalKey, Reading},
};

// ---

/// Process-local store. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryReadingStore {
    readings: RwLock<Vec<Reading>>,
}

impl MemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.readings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.readings.read().await.is_empty()
    }
}

#[async_trait]
impl ReadingStore for MemoryReadingStore {
    async fn save(&self, mut reading: Reading) -> Result<Reading, StoreError> {
        // ---
        reading.id = Some(Uuid::new_v4());
        self.readings.write().await.push(reading.clone());
        Ok(reading)
    }

    async fn exists_by_object_id(&self, object_id: i64) -> Result<bool, StoreError> {
        // ---
        let readings = self.readings.read().await;
        Ok(readings.iter().any(|r| r.object_id == Some(object_id)))
    }

    async fn exists_by_object_id_and_timestamp(
        &self,
        object_id: i64,
        timestamp: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        // ---
        let key = NaturalKey {
            object_id,
            timestamp,
        };
        let readings = self.readings.read().await;
        Ok(readings.iter().any(|r| r.natural_key() == Some(key)))
    }

    async fn find_all(&self) -> Result<Vec<Reading>, StoreError> {
        Ok(self.readings.read().await.clone())
    }

    async fn find_latest_by_timestamp(&self) -> Result<Option<Reading>, StoreError> {
        // ---
        // `None < Some(_)`, and on ties the later insert wins.
        let readings = self.readings.read().await;
        Ok(readings.iter().max_by_key(|r| r.timestamp).cloned())
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        // ---
        let mut readings = self.readings.write().await;
        let removed = readings.len() as u64;
        readings.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{Measurements, TimestampSource};
    use chrono::TimeZone;

    fn reading(object_id: i64, hour: u32) -> Reading {
        Reading {
            id: None,
            object_id: Some(object_id),
            timestamp: Some(Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap()),
            timestamp_source: TimestampSource::Feed,
            measurements: Measurements::default(),
        }
    }

    #[tokio::test]
    async fn test_save_assigns_id() {
        // ---
        let store = MemoryReadingStore::new();
        let saved = store.save(reading(1, 1)).await.unwrap();
        assert!(saved.id.is_some());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_existence_checks() {
        // ---
        let store = MemoryReadingStore::new();
        store.save(reading(1, 5)).await.unwrap();

        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 5, 0, 0).unwrap();
        let other_ts = Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap();

        assert!(store.exists_by_object_id(1).await.unwrap());
        assert!(!store.exists_by_object_id(2).await.unwrap());
        assert!(store.exists_by_object_id_and_timestamp(1, ts).await.unwrap());
        assert!(!store.exists_by_object_id_and_timestamp(1, other_ts).await.unwrap());
    }

    #[tokio::test]
    async fn test_latest_by_timestamp_ignores_insert_order() {
        // ---
        let store = MemoryReadingStore::new();
        store.save(reading(1, 9)).await.unwrap();
        store.save(reading(2, 3)).await.unwrap();

        let mut untimed = reading(3, 0);
        untimed.timestamp = None;
        store.save(untimed).await.unwrap();

        let latest = store.find_latest_by_timestamp().await.unwrap().unwrap();
        assert_eq!(latest.object_id, Some(1));
    }

    #[test]
    fn test_delete_all() {
        // ---
        tokio_test::block_on(async {
            let store = MemoryReadingStore::new();
            store.save(reading(1, 1)).await.unwrap();
            store.save(reading(2, 2)).await.unwrap();

            assert_eq!(store.delete_all().await.unwrap(), 2);
            assert!(store.is_empty().await);
            assert_eq!(store.find_latest_by_timestamp().await.unwrap(), None);
        });
    }
}
