//! Shared constants and invariants

/// Tokens are renewed this many seconds before the server-side expiry.
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 120;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1000;

pub const TOKEN_PATH: &str = "oauth2/token";
pub const CONTENT_PATH: &str = "v2/";

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Returned by cached reads when nothing is stored for a url.
pub const EMPTY_PAYLOAD: &str = "{}";
