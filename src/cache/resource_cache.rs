use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, trace, warn};

use crate::cache::subscriber::{CacheUpdate, Subscriber};
use crate::gateway::error::ApiError;
use crate::gateway::http_gateway::HttpGateway;
use crate::helpers::time::now;
use crate::observability::metrics::get_metrics;
use crate::utils::constants::EMPTY_PAYLOAD;

static SUCCESS_MSG: &str = "success";
static PARTIAL_MSG: &str = "partial";
static ERROR_MSG: &str = "error";

/// Last payload fetched for one url.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Clone)]
struct Subscription {
    url: String,
    subscriber: Arc<dyn Subscriber>,
}

#[derive(Default)]
struct CacheState {
    // url -> entry
    entries: HashMap<String, CacheEntry>,
    // subscriber id -> subscription
    subscriptions: HashMap<String, Subscription>,
}

impl CacheState {
    fn is_referenced(&self, url: &str) -> bool {
        self.subscriptions.values().any(|subscription| subscription.url == url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedResource {
    pub url: String,
    pub error: ApiError,
}

/// Outcome of one refresh tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub refreshed: Vec<String>,
    pub failed: Vec<FailedResource>,
    pub notified: usize,
}

impl RefreshSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Resource payloads shared by any number of subscribers, keyed by url.
///
/// An entry lives exactly as long as one subscription references its url, and
/// each distinct url is fetched once per tick however many subscribers share it.
/// The state lock is only taken for map reads and writes; fetches run outside it.
pub struct ResourceCache {
    gateway: Arc<HttpGateway>,
    state: RwLock<CacheState>,
    // serializes subscribe and unsubscribe so a url shared by concurrent subscribers
    // is fetched once and an eviction never lands between a priming check and its insert
    registration: Mutex<()>,
    // one tick at a time
    tick: Mutex<()>,
}

impl ResourceCache {
    pub fn new(gateway: Arc<HttpGateway>) -> Self {
        Self {
            gateway,
            state: RwLock::new(CacheState::default()),
            registration: Mutex::new(()),
            tick: Mutex::new(()),
        }
    }

    pub fn gateway(&self) -> &Arc<HttpGateway> {
        &self.gateway
    }

    /// Register `subscriber` for `url`, priming the entry when it is the first one.
    ///
    /// All-or-nothing: when the priming fetch fails nothing is registered.
    /// Registering an id again for the same url is a no-op, for another url it is rejected.
    pub async fn subscribe(&self, subscriber: Arc<dyn Subscriber>, url: &str) -> Result<(), ApiError> {
        let _registration = self.registration.lock().await;
        let id = subscriber.id().to_owned();
        debug!("registering subscriber '{}'", id);
        trace!("url {}", url);

        let has_entry = {
            let state = self.state.read().await;
            if let Some(existing) = state.subscriptions.get(&id) {
                if existing.url == url {
                    debug!("subscriber '{}' already registered", id);
                    return Ok(());
                }
                return Err(ApiError::AlreadySubscribed { id, url: existing.url.to_owned() });
            }
            state.entries.contains_key(url)
        };

        let fetched = if has_entry {
            None
        } else {
            Some(self.gateway.get(url).await.inspect_err(|e| {
                warn!("priming '{}' for subscriber '{}' failed: {}", url, id, e);
            })?)
        };

        let mut state = self.state.write().await;
        if let Some(payload) = fetched {
            state
                .entries
                .insert(url.to_owned(), CacheEntry { payload, fetched_at: now() });
        }
        state
            .subscriptions
            .insert(id, Subscription { url: url.to_owned(), subscriber });
        update_gauges(&state).await;
        Ok(())
    }

    /// Drop the registration of `subscriber_id`; the entry goes with its last subscriber.
    pub async fn unsubscribe(&self, subscriber_id: &str) {
        let _registration = self.registration.lock().await;
        let mut state = self.state.write().await;
        let Some(subscription) = state.subscriptions.remove(subscriber_id) else {
            return;
        };
        debug!("removed subscriber '{}'", subscriber_id);
        if !state.is_referenced(&subscription.url) {
            trace!("evicting {}", subscription.url);
            state.entries.remove(&subscription.url);
        }
        update_gauges(&state).await;
    }

    /// Last fetched payload, `{}` when nothing is cached. Never fetches.
    pub async fn read_cached(&self, url: &str) -> String {
        self.state
            .read()
            .await
            .entries
            .get(url)
            .map(|entry| entry.payload.to_owned())
            .unwrap_or_else(|| EMPTY_PAYLOAD.to_owned())
    }

    pub async fn entry(&self, url: &str) -> Option<CacheEntry> {
        self.state.read().await.entries.get(url).cloned()
    }

    /// Live read that bypasses the cache.
    pub async fn read_on_demand(&self, url: &str) -> Result<String, ApiError> {
        self.gateway.get(url).await
    }

    /// Post `body` to `url`. The cache picks the change up on the next tick.
    pub async fn write(&self, url: &str, body: &str) -> Result<String, ApiError> {
        self.gateway
            .post(url, body)
            .await
            .inspect_err(|e| warn!("writing to '{}' failed: {}", url, e))
    }

    pub async fn cached_urls(&self) -> Vec<String> {
        let state = self.state.read().await;
        state
            .entries
            .keys()
            .cloned()
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect()
    }

    pub async fn subscriber_count(&self) -> usize {
        self.state.read().await.subscriptions.len()
    }

    /// One refresh tick.
    ///
    /// Credentials are renewed first and a failure there aborts the tick. Then every
    /// distinct url is fetched once; a failed url keeps its previous payload. Only when
    /// all fetches are done is every subscriber notified with the best available payload.
    pub async fn refresh_all(&self) -> Result<RefreshSummary, ApiError> {
        let _tick = self.tick.lock().await;
        let metrics = get_metrics().await;
        info!("refresh cache cycle start");

        if let Err(e) = self.gateway.ensure_authenticated().await {
            error!("failed to update access token, skipping refresh: {}", e);
            metrics.refresh_ticks.with_label_values(&[ERROR_MSG]).inc();
            return Err(e);
        }

        let urls = self.cached_urls().await;
        let mut summary = RefreshSummary::default();

        for url in urls {
            trace!("refresh for {}", url);
            let started = now();
            match self.gateway.get(&url).await {
                Ok(payload) => {
                    let mut state = self.state.write().await;
                    match state.entries.get_mut(&url) {
                        Some(entry) if entry.fetched_at > started => {
                            debug!("'{}' was primed again while refreshing, keeping the newer payload", url);
                        }
                        Some(entry) => {
                            entry.payload = payload;
                            entry.fetched_at = now();
                            summary.refreshed.push(url);
                        }
                        // evicted while the request was in flight
                        None => {}
                    }
                }
                Err(error) => {
                    warn!("refreshing '{}' failed, keeping previous payload: {}", url, error);
                    summary.failed.push(FailedResource { url, error });
                }
            }
        }

        let deliveries: Vec<(Arc<dyn Subscriber>, CacheUpdate)> = {
            let state = self.state.read().await;
            state
                .subscriptions
                .values()
                .map(|subscription| {
                    let payload = state
                        .entries
                        .get(&subscription.url)
                        .map(|entry| entry.payload.to_owned())
                        .unwrap_or_else(|| EMPTY_PAYLOAD.to_owned());
                    let refreshed = summary.refreshed.contains(&subscription.url);
                    let update = CacheUpdate { url: subscription.url.to_owned(), payload, refreshed };
                    (subscription.subscriber.clone(), update)
                })
                .collect()
        };

        for (subscriber, update) in deliveries {
            trace!("sending out cache to '{}'", subscriber.id());
            subscriber.on_cache_updated(&update);
            summary.notified += 1;
        }

        let outcome = if summary.is_complete() { SUCCESS_MSG } else { PARTIAL_MSG };
        metrics.refresh_ticks.with_label_values(&[outcome]).inc();
        info!(
            "refresh cache cycle done: {} refreshed, {} failed, {} notified",
            summary.refreshed.len(),
            summary.failed.len(),
            summary.notified
        );
        Ok(summary)
    }
}

async fn update_gauges(state: &CacheState) {
    let metrics = get_metrics().await;
    metrics.cached_resources.set(state.entries.len() as i64);
    metrics.subscribers.set(state.subscriptions.len() as i64);
}
