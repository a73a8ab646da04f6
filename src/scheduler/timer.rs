use std::{future::Future, time::Duration};

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

// ---

/// Fixed-period timer owned by the process.
///
/// The first firing happens immediately on [`Timer::start`]. A callback that
/// overruns the period delays the next firing instead of bursting.
#[derive(Debug)]
pub struct Timer {
    name: &'static str,
    period: Duration,
    stop_tx: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl Timer {
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self {
            name,
            period,
            stop_tx: None,
            handle: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start firing `callback` every period. A running timer is left as is.
    pub fn start<F, Fut>(&mut self, mut callback: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // ---
        if self.is_running() {
            tracing::warn!("Timer '{}' already running", self.name);
            return;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let name = self.name;
        let period = self.period;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::debug!("Timer '{}' started, period {:?}", name, period);

            loop {
                tokio::select! {
                    _ = interval.tick() => callback().await,
                    _ = stop_rx.changed() => break,
                }
            }
            tracing::debug!("Timer '{}' stopped", name);
        });

        self.stop_tx = Some(stop_tx);
        self.handle = Some(handle);
    }

    /// Signal the loop to exit and wait for an in-flight callback to finish.
    pub async fn stop(&mut self) {
        // ---
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::error!("Timer '{}' task ended abnormally: {}", self.name, e);
            }
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}
