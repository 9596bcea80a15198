use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::cache::resource_cache::ResourceCache;

/// Drives `ResourceCache::refresh_all` on a fixed delay.
pub struct RefreshScheduler {
    cache: Arc<ResourceCache>,
    interval: Duration,
    initial_delay: Duration,
}

impl RefreshScheduler {
    /// Start after a random delay within one interval, so bridges started together
    /// do not hit the vendor API at the same moment.
    pub fn new(cache: Arc<ResourceCache>, interval: Duration) -> Self {
        let initial_delay = start_delay(interval);
        Self { cache, interval, initial_delay }
    }

    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Tick until `shutdown` turns true or its sender goes away.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            "refresh loop starts in {:?}, interval {:?}",
            self.initial_delay, self.interval
        );
        let mut delay = self.initial_delay;

        loop {
            tokio::select! {
                _ = sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("refresh loop stopped");
                        return Ok(());
                    }
                    continue;
                }
            }

            match self.cache.refresh_all().await {
                Ok(summary) if summary.is_complete() => debug!("tick complete, {} notified", summary.notified),
                Ok(summary) => warn!("tick partially failed for {} resources", summary.failed.len()),
                Err(e) => warn!("tick aborted: {}", e),
            }
            delay = self.interval;
        }
    }
}

/// Uniform in `[0, interval)` at second granularity, zero for sub-second intervals.
pub fn start_delay(interval: Duration) -> Duration {
    let seconds = interval.as_secs();
    if seconds == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs(rand::thread_rng().gen_range(0..seconds))
}
