use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::gateway::error::ApiError;
use crate::helpers::time::refresh_due_at;

const MAX_EXPIRES_IN_SECS: i64 = i32::MAX as i64;

/// OAuth2 grants the token endpoint is called with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrantType {
    AuthorizationCode,
    RefreshToken,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::RefreshToken => "refresh_token",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token endpoint response. Only built from a body carrying a non-empty `access_token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in_seconds: i64,
}

impl Token {
    pub fn new(access_token: &str, refresh_token: &str, expires_in_seconds: i64) -> Self {
        Self {
            access_token: access_token.to_owned(),
            refresh_token: refresh_token.to_owned(),
            token_type: "Bearer".to_owned(),
            expires_in_seconds,
        }
    }

    /// Parse a token endpoint body. Anything without a usable `access_token`
    /// (including a non-JSON body) is an invalid response, never a panic.
    pub fn from_response(body: &str) -> Result<Self, ApiError> {
        let json: Value = serde_json::from_str(body)
            .map_err(|e| ApiError::InvalidResponse(format!("token response is not JSON: {}", e)))?;

        let access_token = json
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::InvalidResponse("token response has no access_token".to_owned()))?;

        // expires_in is sent as a number by most servers, as a string by some
        let expires_in_seconds = match json.get("expires_in") {
            Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
            Some(Value::String(s)) => s.trim().parse::<i64>().unwrap_or_default(),
            _ => 0,
        }
        .clamp(0, MAX_EXPIRES_IN_SECS);

        Ok(Self {
            access_token: access_token.to_owned(),
            refresh_token: string_field(&json, "refresh_token"),
            token_type: string_field(&json, "token_type"),
            expires_in_seconds,
        })
    }

    pub fn refresh_due(&self, issued_at: DateTime<Utc>) -> DateTime<Utc> {
        refresh_due_at(issued_at, self.expires_in_seconds)
    }
}

fn string_field(json: &Value, field: &str) -> String {
    json.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}
