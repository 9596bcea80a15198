use serde::Serialize;
use thiserror::Error;

use crate::auth::token::GrantType;

/// Failures of the token endpoint, the vendor API and the cache registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Single failed attempt on the transport level (connection refused, timeout).
    #[error("transport error for '{url}': {message}")]
    Transport { url: String, message: String },

    /// Transport failed on the first attempt and on its retry.
    #[error("connection to '{url}' failed twice in a row, check network: {message}")]
    ConnectionFailure { url: String, message: String },

    #[error("token endpoint rejected the {grant} grant with status {status}")]
    Auth { grant: GrantType, status: u16 },

    #[error("no valid credential path: {0}")]
    NoCredentialPath(String),

    /// 401 again after the access token was renewed.
    #[error("authorization failed for '{url}' after access token refresh, check credentials")]
    AuthFailure { url: String },

    #[error("too many requests to '{url}', reduce refresh")]
    RateLimited { url: String },

    #[error("bad request to '{url}', configuration is incorrect")]
    BadRequest { url: String },

    #[error("unexpected status {code} {reason} from '{url}'")]
    UnexpectedStatus { url: String, code: u16, reason: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid url '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("subscriber '{id}' is already registered for '{url}'")]
    AlreadySubscribed { id: String, url: String },
}

/// Online/offline signal derived from the outcome of the last call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Online,
    OfflineConfigurationError,
    OfflineCommunicationError,
}

impl ApiError {
    pub fn status(&self) -> ConnectionStatus {
        match self {
            ApiError::Auth { .. }
            | ApiError::NoCredentialPath(_)
            | ApiError::AuthFailure { .. }
            | ApiError::BadRequest { .. }
            | ApiError::InvalidUrl { .. }
            | ApiError::AlreadySubscribed { .. } => ConnectionStatus::OfflineConfigurationError,
            ApiError::Transport { .. }
            | ApiError::ConnectionFailure { .. }
            | ApiError::RateLimited { .. }
            | ApiError::UnexpectedStatus { .. }
            | ApiError::InvalidResponse(_) => ConnectionStatus::OfflineCommunicationError,
        }
    }

    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            ApiError::Transport { .. } => "transport",
            ApiError::ConnectionFailure { .. } => "connection_failure",
            ApiError::Auth { .. } => "auth",
            ApiError::NoCredentialPath(_) => "no_credential_path",
            ApiError::AuthFailure { .. } => "auth_failure",
            ApiError::RateLimited { .. } => "rate_limited",
            ApiError::BadRequest { .. } => "bad_request",
            ApiError::UnexpectedStatus { .. } => "unexpected_status",
            ApiError::InvalidResponse(_) => "invalid_response",
            ApiError::InvalidUrl { .. } => "invalid_url",
            ApiError::AlreadySubscribed { .. } => "already_subscribed",
        }
    }
}
