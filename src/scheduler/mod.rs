//! Feed delivery and periodic jobs.
//!
//! Owns the process timers: one ingestion timer (streaming or batch scan) and
//! an optional assessment monitor. Each submodule holds one piece:
//! - `ingest`: normalize, dedup and save a single row
//! - `streaming`: one row per tick from a lazily opened cursor
//! - `batch`: whole-feed scans with staggered inserts
//! - `monitor`: periodic assessment of the newest reading
//! - `timer`, `delay_queue`, `recent`: scheduling primitives

use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use chrono::Utc;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};

use crate::{
    config::Config, feed::FeedSource, normalize::Normalizer, service::WaterQualityService,
    store::SharedStore,
};

mod batch;
mod delay_queue;
mod ingest;
mod monitor;
mod recent;
mod streaming;
mod timer;

pub use batch::{BatchIngestor, ScanSummary};
pub use delay_queue::DelayQueue;
pub use ingest::{IngestOutcome, IngestSummary, Ingestor};
pub use monitor::AssessmentMonitor;
pub use recent::RecentlySeen;
pub use streaming::{StreamingIngestor, TickOutcome};
pub use timer::Timer;

// ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeliveryMode {
    /// One row per tick.
    #[default]
    Streaming,
    /// Whole feed per scan, inserts staggered.
    Batch,
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s.trim().to_ascii_lowercase().as_str() {
            "streaming" | "stream" => Ok(DeliveryMode::Streaming),
            "batch" | "staggered" => Ok(DeliveryMode::Batch),
            other => Err(format!("'{other}' (expected streaming or batch)")),
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryMode::Streaming => f.write_str("streaming"),
            DeliveryMode::Batch => f.write_str("batch"),
        }
    }
}

/// What the streaming cursor does once the feed is exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EndOfFeedPolicy {
    /// Deliver nothing further.
    #[default]
    Stop,
    /// Reopen at the first data row on the next tick.
    Restart,
}

impl FromStr for EndOfFeedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s.trim().to_ascii_lowercase().as_str() {
            "stop" => Ok(EndOfFeedPolicy::Stop),
            "restart" => Ok(EndOfFeedPolicy::Restart),
            other => Err(format!("'{other}' (expected stop or restart)")),
        }
    }
}

impl fmt::Display for EndOfFeedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndOfFeedPolicy::Stop => f.write_str("stop"),
            EndOfFeedPolicy::Restart => f.write_str("restart"),
        }
    }
}

/// Running timers and tasks. Dropping aborts them; prefer [`Scheduler::shutdown`].
pub struct Scheduler {
    ingest_timer: Timer,
    monitor_timer: Option<Timer>,
    dispatcher: Option<(watch::Sender<bool>, JoinHandle<()>)>,
}

impl Scheduler {
    pub fn start(cfg: &Config, store: SharedStore, service: WaterQualityService) -> Self {
        // ---
        let source = FeedSource::File(cfg.feed_path.clone());
        let ingestor = Ingestor::new(Normalizer::new(cfg.honor_feed_timestamp), store);

        let (ingest_timer, dispatcher) = match cfg.delivery_mode {
            DeliveryMode::Streaming => {
                let mut timer = Timer::new("streaming", secs(cfg.read_interval_secs));
                let streaming = Arc::new(Mutex::new(StreamingIngestor::new(
                    source,
                    cfg.end_of_feed,
                    ingestor,
                )));
                timer.start(move || {
                    let streaming = Arc::clone(&streaming);
                    async move {
                        let outcome = streaming.lock().await.tick(Utc::now()).await;
                        tracing::debug!("Streaming tick: {:?}", outcome);
                    }
                });
                (timer, None)
            }
            DeliveryMode::Batch => {
                let batch = Arc::new(BatchIngestor::new(
                    source,
                    secs(cfg.stagger_secs),
                    ingestor,
                ));
                let (stop_tx, stop_rx) = watch::channel(false);
                let handle = batch.spawn_dispatcher(stop_rx);

                let mut timer = Timer::new("batch-scan", secs(cfg.batch_scan_secs));
                timer.start(move || {
                    let batch = Arc::clone(&batch);
                    async move { batch.scan_logged().await }
                });
                (timer, Some((stop_tx, handle)))
            }
        };
        tracing::info!(
            "Ingestion started: mode={}, period={:?}",
            cfg.delivery_mode,
            ingest_timer.period()
        );

        let monitor_timer = (cfg.monitor_interval_secs > 0).then(|| {
            let mut timer = Timer::new("assessment-monitor", secs(cfg.monitor_interval_secs));
            let monitor = Arc::new(Mutex::new(AssessmentMonitor::new(service)));
            timer.start(move || {
                let monitor = Arc::clone(&monitor);
                async move {
                    monitor.lock().await.check(Utc::now()).await;
                }
            });
            timer
        });

        Scheduler {
            ingest_timer,
            monitor_timer,
            dispatcher,
        }
    }

    /// Stop every timer and the staggered insert dispatcher.
    pub async fn shutdown(mut self) {
        // ---
        self.ingest_timer.stop().await;
        if let Some(timer) = self.monitor_timer.as_mut() {
            timer.stop().await;
        }
        if let Some((stop_tx, handle)) = self.dispatcher.take() {
            let _ = stop_tx.send(true);
            if let Err(e) = handle.await {
                tracing::error!("Dispatcher task ended abnormally: {}", e);
            }
        }
        tracing::info!("Scheduler stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some((_, handle)) = &self.dispatcher {
            handle.abort();
        }
    }
}

/// Zero periods are clamped to one second.
fn secs(value: u32) -> Duration {
    Duration::from_secs(u64::from(value.max(1)))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_mode_and_policy_parsing() {
        // ---
        assert_eq!("Batch".parse::<DeliveryMode>(), Ok(DeliveryMode::Batch));
        assert_eq!(
            " streaming ".parse::<DeliveryMode>(),
            Ok(DeliveryMode::Streaming)
        );
        assert!("nightly".parse::<DeliveryMode>().is_err());

        assert_eq!("restart".parse::<EndOfFeedPolicy>(), Ok(EndOfFeedPolicy::Restart));
        assert_eq!(EndOfFeedPolicy::default(), EndOfFeedPolicy::Stop);
        assert!("loop".parse::<EndOfFeedPolicy>().is_err());
    }

    #[test]
    fn test_zero_period_is_clamped() {
        // ---
        assert_eq!(secs(0), Duration::from_secs(1));
        assert_eq!(secs(30), Duration::from_secs(30));
    }
}
