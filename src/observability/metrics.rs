use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry};
use tracing::info;
use std::sync::Arc;
use tokio::sync::OnceCell;


// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE.get_or_init(|| async {
        info!("Initializing Metrics ...");
        Metrics::new()}
    ).await
}


#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Token endpoint
    pub token_exchanges: IntCounterVec,
    pub authenticated: IntGauge,

    // Vendor API
    pub resource_requests: IntCounterVec,
    pub resource_request_failures: IntCounterVec,
    pub resource_request_duration: HistogramVec,

    // Cache
    pub refresh_ticks: IntCounterVec,
    pub cached_resources: IntGauge,
    pub subscribers: IntGauge,

    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let metrics = Arc::new(Self {
            token_exchanges: IntCounterVec::new(Opts::new("token_exchanges_total", "Token endpoint exchanges: grant on success, failure reason otherwise"), &["outcome"]).unwrap(),
            authenticated: IntGauge::new("authenticated", "1 while a valid access token is held").unwrap(),

            resource_requests: IntCounterVec::new(Opts::new("resource_requests_total", "Vendor API requests by method"), &["method"]).unwrap(),
            resource_request_failures: IntCounterVec::new(Opts::new("resource_request_failures_total", "Failed vendor API calls by reason"), &["method", "reason"]).unwrap(),
            resource_request_duration: HistogramVec::new(HistogramOpts::new("resource_request_duration_seconds", "Vendor API call duration seconds, retries included").buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]), &["method"]).unwrap(),

            refresh_ticks: IntCounterVec::new(Opts::new("refresh_ticks_total", "Refresh ticks by outcome"), &["outcome"]).unwrap(),
            cached_resources: IntGauge::new("cached_resources", "Distinct resource urls held in the cache").unwrap(),
            subscribers: IntGauge::new("subscribers", "Registered cache subscribers").unwrap(),

            up: IntGauge::new("up", "1 if service is healthy").unwrap(),
            registry: Registry::new_custom(Some("bridgecache".into()), None).unwrap(),
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.token_exchanges.clone())).unwrap();
        reg.register(Box::new(metrics.authenticated.clone())).unwrap();
        reg.register(Box::new(metrics.resource_requests.clone())).unwrap();
        reg.register(Box::new(metrics.resource_request_failures.clone())).unwrap();
        reg.register(Box::new(metrics.resource_request_duration.clone())).unwrap();
        reg.register(Box::new(metrics.refresh_ticks.clone())).unwrap();
        reg.register(Box::new(metrics.cached_resources.clone())).unwrap();
        reg.register(Box::new(metrics.subscribers.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
