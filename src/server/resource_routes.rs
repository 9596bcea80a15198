use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tracing::{debug, info};

use crate::cache::resource_cache::ResourceCache;
use crate::gateway::error::{ApiError, ConnectionStatus};
use crate::resources::urls::{ReadMode, ResolvedResource};
use crate::server::server::AppState;
use crate::utils::constants::CONTENT_TYPE_JSON;

#[derive(Clone)]
pub struct ResourceRoutesState {
    cache: Arc<ResourceCache>,
    resources: Arc<HashMap<String, ResolvedResource>>,
}

impl ResourceRoutesState {
    pub fn new(cache: Arc<ResourceCache>, resources: HashMap<String, ResolvedResource>) -> Self {
        Self { cache, resources: Arc::new(resources) }
    }

    pub fn router(&self) -> Router<AppState> {
        for id in self.resources.keys() {
            info!("served resource: /resources/{}", id);
        }
        Router::new()
            .route("/status", get(handle_status))
            .route("/resources/{id}", get(handle_read).post(handle_write))
    }
}

async fn handle_status(State(state): State<AppState>) -> Response {
    let cache = &state.resource_state.cache;
    let authenticated = cache.gateway().is_authenticated().await;
    let status = if authenticated {
        ConnectionStatus::Online
    } else {
        ConnectionStatus::OfflineConfigurationError
    };

    Json(json!({
        "status": status,
        "authenticated": authenticated,
        "cached_resources": cache.cached_urls().await.len(),
        "subscribers": cache.subscriber_count().await,
    }))
    .into_response()
}

async fn handle_read(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let routes = &state.resource_state;
    let Some(resource) = routes.resources.get(&id) else {
        return (StatusCode::NOT_FOUND, format!("unknown resource '{}'", id)).into_response();
    };
    debug!("read resource '{}' ({:?})", id, resource.read_mode);

    match resource.read_mode {
        ReadMode::Cached => json_response(routes.cache.read_cached(&resource.url).await),
        ReadMode::OnDemand => match routes.cache.read_on_demand(&resource.url).await {
            Ok(payload) => json_response(payload),
            Err(e) => error_response(&e),
        },
    }
}

async fn handle_write(State(state): State<AppState>, Path(id): Path<String>, body: String) -> Response {
    let routes = &state.resource_state;
    let Some(resource) = routes.resources.get(&id) else {
        return (StatusCode::NOT_FOUND, format!("unknown resource '{}'", id)).into_response();
    };

    match routes.cache.write(&resource.url, &body).await {
        Ok(payload) => json_response(payload),
        Err(e) => error_response(&e),
    }
}

fn json_response(payload: String) -> Response {
    (StatusCode::OK, [(CONTENT_TYPE, CONTENT_TYPE_JSON)], payload).into_response()
}

pub fn error_response(error: &ApiError) -> Response {
    let status = match error {
        ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        _ => match error.status() {
            ConnectionStatus::OfflineCommunicationError => StatusCode::BAD_GATEWAY,
            _ => StatusCode::SERVICE_UNAVAILABLE,
        },
    };
    (
        status,
        Json(json!({ "status": error.status(), "error": error.to_string() })),
    )
        .into_response()
}
