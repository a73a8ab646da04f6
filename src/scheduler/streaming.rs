use chrono::{DateTime, Utc};

use super::{
    ingest::{IngestOutcome, IngestSummary, Ingestor},
    EndOfFeedPolicy,
};
use crate::feed::{FeedCursor, FeedSource};

// ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Ingested(IngestOutcome),
    /// The cursor ran dry on this tick and was torn down.
    EndOfFeed,
    /// `stop` policy and the feed has already been consumed.
    Idle,
    /// The feed could not be opened or read; retried next tick.
    FeedUnavailable,
}

/// Streaming delivery: one row per tick from a lazily opened cursor.
pub struct StreamingIngestor {
    source: FeedSource,
    policy: EndOfFeedPolicy,
    ingestor: Ingestor,
    cursor: Option<FeedCursor>,
    exhausted: bool,
    /// Counters for the current pass over the feed.
    summary: IngestSummary,
}

impl StreamingIngestor {
    pub fn new(source: FeedSource, policy: EndOfFeedPolicy, ingestor: Ingestor) -> Self {
        Self {
            source,
            policy,
            ingestor,
            cursor: None,
            exhausted: false,
            summary: IngestSummary::default(),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn summary(&self) -> IngestSummary {
        self.summary
    }

    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        // ---
        if self.exhausted {
            return TickOutcome::Idle;
        }

        if self.cursor.is_none() {
            tracing::info!("Opening feed {}", self.source.name());
            match FeedCursor::open(self.source.clone()) {
                Ok(cursor) => self.cursor = Some(cursor),
                Err(e) => {
                    tracing::error!("Feed unavailable, will retry next tick: {}", e);
                    return TickOutcome::FeedUnavailable;
                }
            }
        }

        let Some(cursor) = self.cursor.as_mut() else {
            return TickOutcome::FeedUnavailable;
        };

        match cursor.next_row() {
            Ok(Some(row)) => {
                let outcome = self.ingestor.ingest(&row, now).await;
                self.summary.record(&outcome);
                TickOutcome::Ingested(outcome)
            }
            Ok(None) => {
                self.cursor = None;
                tracing::info!("Feed pass complete: {}", self.summary);
                self.summary = IngestSummary::default();
                match self.policy {
                    EndOfFeedPolicy::Stop => {
                        tracing::info!("Reached end of feed, streaming stopped");
                        self.exhausted = true;
                    }
                    EndOfFeedPolicy::Restart => {
                        tracing::info!("Reached end of feed, restarting on next tick");
                    }
                }
                TickOutcome::EndOfFeed
            }
            Err(e) => {
                tracing::error!("Error reading feed, cursor reset: {}", e);
                self.cursor = None;
                TickOutcome::FeedUnavailable
            }
        }
    }
}
