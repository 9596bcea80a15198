// tests/common/mod.rs
pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::routing::post;
use axum::Json;
use reqwest::Client;

use crate::cache::subscriber::{CacheUpdate, Subscriber};
use crate::config::service::{ApiConfig, CredentialsConfig, ServiceConfig};
use crate::config::settings::{RetryConfig, SettingsConfig};
use crate::gateway::http_gateway::HttpGateway;

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

/// Url on a port nothing listens on.
pub async fn closed_port_url(path: &str) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}{}", addr, path)
}

/// Service config against `base_url` with a short retry backoff.
pub fn test_config(base_url: &str, authorization_code: &str, refresh_token: &str) -> ServiceConfig {
    ServiceConfig {
        settings: SettingsConfig {
            timeout_ms: 2000,
            retry: RetryConfig { backoff_ms: 20 },
            ..SettingsConfig::default()
        },
        api: ApiConfig::new(base_url),
        credentials: CredentialsConfig {
            consumer_key: "key".to_owned(),
            consumer_secret: "secret".to_owned(),
            authorization_code: authorization_code.to_owned(),
            refresh_token: refresh_token.to_owned(),
            refresh_token_path: None,
        },
        resources: HashMap::new(),
    }
}

pub fn test_gateway(addr: SocketAddr, authorization_code: &str, refresh_token: &str) -> Arc<HttpGateway> {
    let config = test_config(&format!("http://{}/", addr), authorization_code, refresh_token);
    Arc::new(HttpGateway::new(build_reqwest_client(), &config).expect("gateway"))
}

/// `POST /oauth2/token` answering `access-N` / `refresh-N` for the N-th exchange.
pub fn token_router(counter: Arc<AtomicUsize>) -> Router {
    Router::new().route(
        "/oauth2/token",
        post(move |_form: String| {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Json(json!({
                    "access_token": format!("access-{}", n),
                    "refresh_token": format!("refresh-{}", n),
                    "token_type": "Bearer",
                    "expires_in": 3600
                }))
            }
        }),
    )
}

pub fn hits(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}

/// Subscriber keeping every update it is handed.
pub struct RecordingSubscriber {
    id: String,
    updates: Mutex<Vec<CacheUpdate>>,
}

impl RecordingSubscriber {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self { id: id.to_owned(), updates: Mutex::new(Vec::new()) })
    }

    pub fn updates(&self) -> Vec<CacheUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

impl Subscriber for RecordingSubscriber {
    fn id(&self) -> &str {
        &self.id
    }

    fn on_cache_updated(&self, update: &CacheUpdate) {
        self.updates.lock().unwrap().push(update.clone());
    }
}
