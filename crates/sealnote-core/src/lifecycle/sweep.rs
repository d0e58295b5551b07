//! Periodic expiration sweep task.
//!
//! An explicit background loop rather than a framework-managed timer. Each
//! tick runs one sweep pass on a blocking worker with a deadline, so a
//! stuck persistence collaborator cannot wedge the loop. Because every
//! repository lock in the core is per-call, an abandoned pass holds no lock
//! that would block live message reads. Shutdown is signalled through a
//! watch channel and takes effect at the next loop iteration.

use std::{sync::Arc, time::Duration};

use tokio::sync::watch;

use super::{MessageLifecycle, MessageRepository};
use crate::{clock::Clock, envelope::KeyRepository};

/// Sweep timing configuration.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Time between sweep passes (default hourly)
    pub interval: Duration,
    /// Deadline for a single pass before it is abandoned
    pub tick_timeout: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self { interval: Duration::from_secs(3600), tick_timeout: Duration::from_secs(60) }
    }
}

/// Periodic sweep driver.
///
/// Owns a clone of the lifecycle (which shares the in-flight guard set, so
/// sweep passes and live reads stay mutually exclusive per message).
pub struct Sweeper<M, K>
where
    M: MessageRepository,
    K: KeyRepository,
{
    lifecycle: MessageLifecycle<M, K>,
    clock: Arc<dyn Clock>,
    config: SweeperConfig,
    shutdown: watch::Receiver<bool>,
}

impl<M, K> Sweeper<M, K>
where
    M: MessageRepository,
    K: KeyRepository,
{
    /// Create a sweeper. Send `true` on the watch channel to stop it.
    pub fn new(
        lifecycle: MessageLifecycle<M, K>,
        clock: Arc<dyn Clock>,
        config: SweeperConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self { lifecycle, clock, config, shutdown }
    }

    /// Run until shutdown is signalled.
    ///
    /// The first pass runs immediately; subsequent passes run every
    /// configured interval.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(interval_secs = self.config.interval.as_secs(), "sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                },
            }
        }

        tracing::info!("sweeper stopped");
    }

    async fn tick(&self) {
        let lifecycle = self.lifecycle.clone();
        let now = self.clock.unix_seconds();

        let pass = tokio::task::spawn_blocking(move || lifecycle.sweep(now));

        match tokio::time::timeout(self.config.tick_timeout, pass).await {
            Ok(Ok(Ok(report))) => {
                if report.expired > 0 {
                    tracing::info!(expired = report.expired, "sweep reclaimed messages");
                }
            },
            Ok(Ok(Err(err))) => {
                tracing::warn!(error = %err, "sweep pass failed");
            },
            Ok(Err(join_err)) => {
                tracing::warn!(error = %join_err, "sweep pass aborted");
            },
            Err(_) => {
                // The pass keeps running on the blocking pool but holds no
                // long-lived locks; live reads are unaffected
                tracing::warn!(
                    timeout_secs = self.config.tick_timeout.as_secs(),
                    "sweep pass exceeded its deadline; abandoning"
                );
            },
        }
    }
}

/// Create the shutdown channel for a [`Sweeper`].
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}
