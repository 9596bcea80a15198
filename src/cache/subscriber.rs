use tracing::debug;

/// What a subscriber is handed at the end of every refresh tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheUpdate {
    pub url: String,
    /// best available payload, stale when `refreshed` is false
    pub payload: String,
    /// whether this tick's fetch of `url` succeeded
    pub refreshed: bool,
}

/// Consumer of cached resources.
///
/// Identified by `id`: one id holds one registration at a time.
/// Called from the refresh task, so implementations must not block for long.
pub trait Subscriber: Send + Sync {
    fn id(&self) -> &str;

    fn on_cache_updated(&self, update: &CacheUpdate);
}

/// Subscriber that only traces the updates it receives.
#[derive(Debug, Clone)]
pub struct LogSubscriber {
    id: String,
}

impl LogSubscriber {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_owned() }
    }
}

impl Subscriber for LogSubscriber {
    fn id(&self) -> &str {
        &self.id
    }

    fn on_cache_updated(&self, update: &CacheUpdate) {
        debug!(
            subscriber = %self.id,
            url = %update.url,
            refreshed = update.refreshed,
            bytes = update.payload.len(),
            "cache update received"
        );
    }
}
