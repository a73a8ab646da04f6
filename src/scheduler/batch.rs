use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{
    sync::{watch, Mutex, Notify},
    task::JoinHandle,
    time::{self, Instant},
};

use super::{
    delay_queue::DelayQueue,
    ingest::{IngestOutcome, IngestSummary, Ingestor},
    recent::RecentlySeen,
};
use crate::{
    errors::FeedError,
    feed::{FeedCursor, FeedSource, RawRow},
};

// ---

/// Upper bound on rows remembered between scans.
const RECENT_CAPACITY: usize = 100_000;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    pub rows: usize,
    pub queued: usize,
    /// Rows skipped because an earlier scan already queued them.
    pub recent: usize,
    /// Outcomes of the staggered inserts completed since the previous scan.
    pub ingested: IngestSummary,
}

/// Batch-staggered delivery.
///
/// Each scan reads the whole feed and queues row `i` for insertion at
/// `now + i * stagger`. A dispatcher task drains the queue as entries come due
/// and runs each insertion as its own task, so inserts are ordered only by
/// their offsets.
pub struct BatchIngestor {
    source: FeedSource,
    stagger: Duration,
    ingestor: Ingestor,
    queue: Mutex<DelayQueue<RawRow>>,
    recent: Mutex<RecentlySeen<String>>,
    /// Shared with every insertion task.
    outcomes: Arc<Mutex<IngestSummary>>,
    wake: Notify,
}

impl BatchIngestor {
    pub fn new(source: FeedSource, stagger: Duration, ingestor: Ingestor) -> Self {
        Self {
            source,
            stagger,
            ingestor,
            queue: Mutex::new(DelayQueue::new()),
            recent: Mutex::new(RecentlySeen::daily(RECENT_CAPACITY)),
            outcomes: Arc::new(Mutex::new(IngestSummary::default())),
            wake: Notify::new(),
        }
    }

    pub async fn pending(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Insert outcomes counted since the last scan.
    pub async fn ingest_summary(&self) -> IngestSummary {
        *self.outcomes.lock().await
    }

    /// Read the entire feed and queue every row not seen in the last 24 hours.
    pub async fn scan(&self, now: Instant, wall: DateTime<Utc>) -> Result<ScanSummary, FeedError> {
        // ---
        let (rows, error) = FeedCursor::open(self.source.clone())?.read_remaining();
        if let Some(e) = error {
            tracing::error!("Feed scan cut short, queueing rows read so far: {}", e);
        }

        let ingested = std::mem::take(&mut *self.outcomes.lock().await);
        let mut summary = ScanSummary {
            rows: rows.len(),
            ingested,
            ..ScanSummary::default()
        };

        {
            let mut recent = self.recent.lock().await;
            let mut queue = self.queue.lock().await;
            for (index, row) in rows.into_iter().enumerate() {
                if !recent.check_and_insert(row.content_key(), wall) {
                    summary.recent += 1;
                    continue;
                }
                let delay = self.stagger.saturating_mul(index as u32);
                queue.push(row, now + delay);
                summary.queued += 1;
            }
        }

        if summary.queued > 0 {
            self.wake.notify_one();
        }
        tracing::info!(
            "Feed scan: {} rows, {} queued, {} already queued recently; since last scan: {}",
            summary.rows,
            summary.queued,
            summary.recent,
            summary.ingested
        );
        Ok(summary)
    }

    /// Same as [`BatchIngestor::scan`] but logs a feed failure instead of
    /// returning it; the next scheduled scan retries.
    pub async fn scan_logged(&self) {
        // ---
        if let Err(e) = self.scan(Instant::now(), Utc::now()).await {
            tracing::error!("Feed scan aborted, will retry next cycle: {}", e);
        }
    }

    /// Pop everything due at `now` and spawn one insertion task per row.
    /// Each task adds its outcome to the summary reported by the next scan.
    pub async fn dispatch_due(&self, now: Instant) -> Vec<JoinHandle<IngestOutcome>> {
        // ---
        let due = self.queue.lock().await.pop_due(now);
        due.into_iter()
            .map(|row| {
                let ingestor = self.ingestor.clone();
                let outcomes = Arc::clone(&self.outcomes);
                tokio::spawn(async move {
                    let outcome = ingestor.ingest(&row, Utc::now()).await;
                    outcomes.lock().await.record(&outcome);
                    outcome
                })
            })
            .collect()
    }

    /// Drain the queue until `stop` flips.
    pub fn spawn_dispatcher(self: &Arc<Self>, mut stop: watch::Receiver<bool>) -> JoinHandle<()> {
        // ---
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let next_due = this.queue.lock().await.next_due();
                let sleep = async {
                    match next_due {
                        Some(due) => time::sleep_until(due).await,
                        None => std::future::pending::<()>().await,
                    }
                };

                tokio::select! {
                    _ = sleep => {
                        let spawned = this.dispatch_due(Instant::now()).await;
                        tracing::debug!("Dispatched {} staggered inserts", spawned.len());
                    }
                    _ = this.wake.notified() => {}
                    _ = stop.changed() => break,
                }
            }
            tracing::debug!("Staggered insert dispatcher stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::{normalize::Normalizer, store::MemoryReadingStore};

    const FEED: &str = "OBJECTID,PH,ALK,COND,BOD,NO2,CU1,CU2,FE,ZN\n\
                        1,7.0,,,,,,,,\n\
                        2,7.5,,,,,,,,\n\
                        3,8.0,,,,,,,,\n";

    fn batch(store: &Arc<MemoryReadingStore>) -> Arc<BatchIngestor> {
        let ingestor = Ingestor::new(Normalizer::default(), store.clone());
        Arc::new(BatchIngestor::new(
            FeedSource::Text(Arc::from(FEED)),
            Duration::from_secs(30),
            ingestor,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_rows_are_inserted_at_staggered_offsets() {
        // ---
        let store = Arc::new(MemoryReadingStore::new());
        let batch = batch(&store);
        let (stop_tx, stop_rx) = watch::channel(false);
        let dispatcher = batch.spawn_dispatcher(stop_rx);

        let summary = batch.scan(Instant::now(), Utc::now()).await.unwrap();
        assert_eq!(summary.queued, 3);

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.len().await, 1);

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.len().await, 2);

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.len().await, 3);
        assert_eq!(batch.pending().await, 0);

        stop_tx.send(true).unwrap();
        dispatcher.await.unwrap();
    }

    #[tokio::test]
    async fn test_rescan_does_not_requeue_recent_rows() {
        // ---
        let store = Arc::new(MemoryReadingStore::new());
        let batch = batch(&store);
        let now = Instant::now();

        let first = batch.scan(now, Utc::now()).await.unwrap();
        assert_eq!(first.queued, 3);

        let second = batch.scan(now, Utc::now()).await.unwrap();
        assert_eq!(
            second,
            ScanSummary {
                rows: 3,
                queued: 0,
                recent: 3,
                ingested: IngestSummary::default(),
            }
        );
        assert_eq!(batch.pending().await, 3);
    }

    #[tokio::test]
    async fn test_dispatch_only_due_rows() {
        // ---
        let store = Arc::new(MemoryReadingStore::new());
        let batch = batch(&store);
        let now = Instant::now();
        batch.scan(now, Utc::now()).await.unwrap();

        let handles = batch.dispatch_due(now + Duration::from_secs(30)).await;
        assert_eq!(handles.len(), 2);
        for handle in handles {
            assert!(matches!(
                handle.await.unwrap(),
                IngestOutcome::Stored { .. }
            ));
        }
        assert_eq!(batch.pending().await, 1);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_unavailable_feed_is_an_error() {
        // ---
        let store = Arc::new(MemoryReadingStore::new());
        let ingestor = Ingestor::new(Normalizer::default(), store);
        let batch = BatchIngestor::new(
            FeedSource::File("/nonexistent/feed.csv".into()),
            Duration::from_secs(30),
            ingestor,
        );
        let err = batch.scan(Instant::now(), Utc::now()).await.unwrap_err();
        assert!(matches!(err, FeedError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_insert_outcomes_are_counted_per_scan() {
        // ---
        let store = Arc::new(MemoryReadingStore::new());
        let ingestor = Ingestor::new(Normalizer::default(), store.clone());
        let feed = "OBJECTID,PH,ALK,COND,BOD,NO2,CU1,CU2,FE,ZN\n\
                    1,7.0,,,,,,,,\n\
                    2,7.1,oops\n\
                    ,7.2,,,,,,,,\n";
        let batch = BatchIngestor::new(
            FeedSource::Text(Arc::from(feed)),
            Duration::ZERO,
            ingestor,
        );

        let now = Instant::now();
        batch.scan(now, Utc::now()).await.unwrap();
        for handle in batch.dispatch_due(now).await {
            handle.await.unwrap();
        }

        let expected = IngestSummary {
            stored: 1,
            malformed: 1,
            skipped: 1,
            ..IngestSummary::default()
        };
        assert_eq!(batch.ingest_summary().await, expected);

        let next = batch.scan(now, Utc::now()).await.unwrap();
        assert_eq!(next.ingested, expected);
        assert_eq!(batch.ingest_summary().await, IngestSummary::default());
    }

    #[tokio::test]
    async fn test_undecodable_row_does_not_block_the_scan() {
        // ---
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            b"OBJECTID,PH,ALK,COND,BOD,NO2,CU1,CU2,FE,ZN\n\
              1,7.0,,,,,,,,\n\
              2,7.2,\xff\xfe,,,,,,,\n\
              3,7.4,,,,,,,,\n",
        )
        .unwrap();

        let store = Arc::new(MemoryReadingStore::new());
        let ingestor = Ingestor::new(Normalizer::default(), store.clone());
        let batch = BatchIngestor::new(
            FeedSource::File(file.path().to_path_buf()),
            Duration::ZERO,
            ingestor,
        );

        let now = Instant::now();
        let summary = batch.scan(now, Utc::now()).await.unwrap();
        assert_eq!(summary.queued, 3);

        for handle in batch.dispatch_due(now).await {
            handle.await.unwrap();
        }
        assert_eq!(store.len().await, 2);
        assert_eq!(batch.ingest_summary().await.malformed, 1);
    }
}
