use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use axum::Router;
use tokio::sync::watch;
use tracing::info;

use crate::cache::resource_cache::ResourceCache;
use crate::config::settings::SettingsConfig;
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;
use crate::resources::urls::ResolvedResource;
use crate::server::resource_routes::ResourceRoutesState;

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
    pub resource_state: ResourceRoutesState,
}

impl AppState {
    pub fn new(
        metrics: &Arc<Metrics>,
        cache: Arc<ResourceCache>,
        resources: HashMap<String, ResolvedResource>,
    ) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.clone()),
            resource_state: ResourceRoutesState::new(cache, resources),
        }
    }
}

pub fn app(settings_config: &SettingsConfig, state: AppState) -> Router {
    Router::new()
        .merge(state.metrics_state.router(&settings_config.metrics))
        .merge(state.resource_state.router())
        .with_state(state)
}

/// Serve status, resources and metrics until `shutdown` flips. No-op without a server block.
pub async fn start(
    settings_config: &SettingsConfig,
    cache: Arc<ResourceCache>,
    resources: HashMap<String, ResolvedResource>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let Some(server_config) = &settings_config.server else {
        info!("no server configured, local http surface disabled");
        return Ok(());
    };

    let metrics = get_metrics().await;
    let app = app(settings_config, AppState::new(metrics, cache, resources));

    let bind_addr = format!("{}:{}", server_config.host, server_config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow!("unable to bind '{}': {}", bind_addr, e))?;
    info!("listening on {}", bind_addr);
    metrics.up.set(1);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
        })
        .await?;

    metrics.up.set(0);
    Ok(())
}
