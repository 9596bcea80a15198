use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use http::{header::CONTENT_TYPE, StatusCode};
use prometheus::{Encoder, TextEncoder};
use tracing::{error, trace};

use crate::config::settings::MetricsConfig;
use crate::observability::metrics::Metrics;
use crate::server::server::AppState;

/// Prometheus scrape endpoint over the process-wide registry.
#[derive(Clone)]
pub struct MetricsState {
    metrics: Arc<Metrics>,
}

impl MetricsState {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    /// Empty router when metrics are disabled.
    pub fn router(&self, metrics_config: &MetricsConfig) -> Router<AppState> {
        if !metrics_config.is_enabled {
            return Router::new();
        }
        Router::new().route(&metrics_config.path, get(scrape))
    }
}

async fn scrape(State(state): State<AppState>) -> Response {
    let encoder = TextEncoder::new();
    let families = state.metrics_state.metrics.registry.gather();
    trace!("scraping {} metric families", families.len());

    match encoder.encode_to_string(&families) {
        Ok(text) => (StatusCode::OK, [(CONTENT_TYPE, encoder.format_type().to_owned())], text).into_response(),
        Err(e) => {
            error!("failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
