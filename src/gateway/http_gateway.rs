use std::time::Duration;

use anyhow::anyhow;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{Method, StatusCode};
use reqwest::Client;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

use crate::auth::exchanger::TokenExchanger;
use crate::auth::token_store::TokenStore;
use crate::config::service::ServiceConfig;
use crate::gateway::error::ApiError;
use crate::helpers::time::{get_instant, now};
use crate::observability::metrics::get_metrics;
use crate::utils::constants::CONTENT_TYPE_JSON;

/// Outcome of one attempt, before the retry state machine looks at it.
enum Attempt {
    Response { status: StatusCode, body: String },
    TransportFailure(String),
}

/// Authenticated access to the vendor API.
///
/// Every call makes sure a usable access token exists, then walks a small state
/// machine: a 401 renews the token and retries once, a transport failure pauses
/// and retries once, everything else is terminal. The token store is only
/// locked for the state transitions, never across network I/O.
pub struct HttpGateway {
    client: Client,
    timeout: Duration,
    backoff: Duration,
    tokens: RwLock<TokenStore>,
    exchanger: TokenExchanger,
    // serializes token exchanges
    exchange_guard: Mutex<()>,
    refresh_token_tx: watch::Sender<String>,
}

impl HttpGateway {
    pub fn new(client: Client, config: &ServiceConfig) -> anyhow::Result<Self> {
        let token_url = config
            .api
            .token_endpoint()
            .map_err(|e| anyhow!("invalid token url for '{}': {}", config.api.base_url, e))?;
        let timeout = Duration::from_millis(config.settings.timeout_ms);
        let credentials = &config.credentials;

        let exchanger = TokenExchanger::new(
            client.clone(),
            &token_url,
            &credentials.consumer_key,
            &credentials.consumer_secret,
            timeout,
        );
        let (refresh_token_tx, _) = watch::channel(credentials.refresh_token.to_owned());

        Ok(Self {
            client,
            timeout,
            backoff: Duration::from_millis(config.settings.retry.backoff_ms),
            tokens: RwLock::new(TokenStore::new(&credentials.authorization_code, &credentials.refresh_token)),
            exchanger,
            exchange_guard: Mutex::new(()),
            refresh_token_tx,
        })
    }

    pub async fn get(&self, url: &str) -> Result<String, ApiError> {
        self.send(Method::GET, url, None).await
    }

    pub async fn post(&self, url: &str, body: &str) -> Result<String, ApiError> {
        self.send(Method::POST, url, Some(body)).await
    }

    /// Replace the one-shot authorization code and the refresh token.
    pub async fn set_credentials(&self, authorization_code: &str, refresh_token: &str) {
        self.tokens.write().await.set_credentials(authorization_code, refresh_token);
        self.refresh_token_tx.send_replace(refresh_token.to_owned());
        get_metrics().await.authenticated.set(0);
    }

    /// Drop the access token, e.g. when the bridge goes away.
    pub async fn reset_access_token(&self) {
        self.tokens.write().await.reset_access_token();
        get_metrics().await.authenticated.set(0);
    }

    pub async fn is_authenticated(&self) -> bool {
        self.tokens.read().await.is_authenticated()
    }

    pub async fn needs_refresh(&self) -> bool {
        self.tokens.read().await.needs_refresh(now())
    }

    pub async fn current_refresh_token(&self) -> String {
        self.tokens.read().await.current_refresh_token().to_owned()
    }

    pub async fn authorization_code(&self) -> String {
        self.tokens.read().await.authorization_code().to_owned()
    }

    /// Receives the refresh token after every successful exchange.
    pub fn watch_refresh_token(&self) -> watch::Receiver<String> {
        self.refresh_token_tx.subscribe()
    }

    /// Exchange credentials when the store says renewal is due.
    pub async fn ensure_authenticated(&self) -> Result<(), ApiError> {
        if !self.needs_refresh().await {
            return Ok(());
        }
        self.renew(None).await
    }

    /// Run an exchange unless one is not needed anymore.
    ///
    /// `rejected` is the access token the server answered 401 for: when another
    /// caller already replaced it while we waited for the guard, nothing is done.
    async fn renew(&self, rejected: Option<&str>) -> Result<(), ApiError> {
        let _guard = self.exchange_guard.lock().await;

        let credentials = {
            let store = self.tokens.read().await;
            let superseded = match rejected {
                Some(rejected) => store.is_authenticated() && store.current_access_token() != rejected,
                None => !store.needs_refresh(now()),
            };
            if superseded {
                debug!("access token already renewed by a concurrent call");
                return Ok(());
            }
            store.snapshot()
        };

        let metrics = get_metrics().await;
        match self.exchanger.exchange(&credentials).await {
            Ok(exchange) => {
                let refresh_token = {
                    let mut store = self.tokens.write().await;
                    store.apply(&exchange.token, exchange.grant, now());
                    info!("access token renewed via {}, next renewal at {}", exchange.grant, store.refresh_due());
                    store.current_refresh_token().to_owned()
                };
                metrics.token_exchanges.with_label_values(&[exchange.grant.as_str()]).inc();
                metrics.authenticated.set(1);
                self.refresh_token_tx.send_replace(refresh_token);
                Ok(())
            }
            Err(e) => {
                self.tokens.write().await.reset_access_token();
                metrics.token_exchanges.with_label_values(&[e.reason()]).inc();
                metrics.authenticated.set(0);
                warn!("token exchange against '{}' failed: {}", self.exchanger.token_url(), e);
                Err(e)
            }
        }
    }

    async fn send(&self, method: Method, url: &str, body: Option<&str>) -> Result<String, ApiError> {
        let metrics = get_metrics().await;
        let start = get_instant();
        metrics.resource_requests.with_label_values(&[method.as_str()]).inc();

        let result = self.run_state_machine(&method, url, body).await;

        metrics.resource_request_duration.with_label_values(&[method.as_str()]).observe(start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            metrics.resource_request_failures.with_label_values(&[method.as_str(), e.reason()]).inc();
        }
        result
    }

    async fn run_state_machine(&self, method: &Method, url: &str, body: Option<&str>) -> Result<String, ApiError> {
        self.ensure_authenticated().await?;

        let mut is_retry = false;
        loop {
            let access_token = self.tokens.read().await.current_access_token().to_owned();

            match self.attempt(method, url, body, &access_token).await {
                Attempt::Response { status, body } if status.is_success() => return Ok(body),
                Attempt::Response { status: StatusCode::UNAUTHORIZED, .. } => {
                    if is_retry {
                        warn!("authentication failure for '{}' after access token refresh, failing here", url);
                        self.reset_access_token().await;
                        return Err(ApiError::AuthFailure { url: url.to_owned() });
                    }
                    warn!("unauthorized: updating access token and retrying '{}'", url);
                    self.renew(Some(&access_token)).await?;
                    is_retry = true;
                }
                Attempt::Response { status: StatusCode::TOO_MANY_REQUESTS, .. } => {
                    warn!("too many requests to '{}', failing here", url);
                    return Err(ApiError::RateLimited { url: url.to_owned() });
                }
                Attempt::Response { status: StatusCode::BAD_REQUEST, .. } => {
                    warn!("bad request to '{}', failing here", url);
                    return Err(ApiError::BadRequest { url: url.to_owned() });
                }
                Attempt::Response { status, .. } => {
                    warn!("requesting '{}' (method='{}') failed: {}", url, method, status);
                    return Err(ApiError::UnexpectedStatus {
                        url: url.to_owned(),
                        code: status.as_u16(),
                        reason: status.canonical_reason().unwrap_or_default().to_owned(),
                    });
                }
                Attempt::TransportFailure(message) => {
                    if is_retry {
                        warn!("{}: requesting '{}' (method='{}'), failing here", message, url, method);
                        return Err(ApiError::ConnectionFailure { url: url.to_owned(), message });
                    }
                    warn!("{}: retrying '{}' in {:?}", message, url, self.backoff);
                    sleep(self.backoff).await;
                    is_retry = true;
                }
            }
        }
    }

    async fn attempt(&self, method: &Method, url: &str, body: Option<&str>, access_token: &str) -> Attempt {
        let mut request = self
            .client
            .request(method.clone(), url)
            .timeout(self.timeout)
            .bearer_auth(access_token)
            .header(ACCEPT, CONTENT_TYPE_JSON)
            .header(CONTENT_TYPE, CONTENT_TYPE_JSON);
        if let Some(body) = body {
            request = request.body(body.to_owned());
        }

        trace!("sending {} '{}'", method, url);
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Attempt::TransportFailure(e.to_string()),
        };

        let status = response.status();
        match response.text().await {
            Ok(body) => Attempt::Response { status, body },
            Err(e) => Attempt::TransportFailure(e.to_string()),
        }
    }
}
