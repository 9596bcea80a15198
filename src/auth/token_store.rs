use chrono::{DateTime, Utc};

use crate::auth::token::{GrantType, Token};

/// Credentials the token endpoint is called with, copied out of the store
/// so no lock is held across the exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSnapshot {
    pub authorization_code: String,
    pub refresh_token: String,
}

/// Current OAuth2 state of one gateway.
#[derive(Debug, Clone)]
pub struct TokenStore {
    authorization_code: String,
    refresh_token: String,
    access_token: String,
    token_type: String,
    refresh_due: DateTime<Utc>,
}

impl TokenStore {
    pub fn new(authorization_code: &str, refresh_token: &str) -> Self {
        Self {
            authorization_code: authorization_code.to_owned(),
            refresh_token: refresh_token.to_owned(),
            access_token: String::new(),
            token_type: String::new(),
            refresh_due: Utc::now(),
        }
    }

    /// Replace code and refresh token; the access token is dropped and renewal is due now.
    pub fn set_credentials(&mut self, authorization_code: &str, refresh_token: &str) {
        self.authorization_code = authorization_code.to_owned();
        self.refresh_token = refresh_token.to_owned();
        self.reset_access_token();
    }

    pub fn reset_access_token(&mut self) {
        self.access_token.clear();
        self.token_type.clear();
        self.refresh_due = Utc::now();
    }

    pub fn is_authenticated(&self) -> bool {
        !self.access_token.is_empty()
    }

    pub fn current_access_token(&self) -> &str {
        &self.access_token
    }

    pub fn current_refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub fn authorization_code(&self) -> &str {
        &self.authorization_code
    }

    pub fn refresh_due(&self) -> DateTime<Utc> {
        self.refresh_due
    }

    /// An unconsumed authorization code always forces a renewal.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.access_token.is_empty() || self.refresh_due <= now || !self.authorization_code.is_empty()
    }

    pub fn snapshot(&self) -> CredentialSnapshot {
        CredentialSnapshot {
            authorization_code: self.authorization_code.to_owned(),
            refresh_token: self.refresh_token.to_owned(),
        }
    }

    /// Take over a freshly exchanged token.
    pub fn apply(&mut self, token: &Token, grant: GrantType, now: DateTime<Utc>) {
        self.access_token = token.access_token.to_owned();
        self.token_type = token.token_type.to_owned();
        self.refresh_due = token.refresh_due(now);
        // servers that do not rotate refresh tokens omit it from the response
        if !token.refresh_token.is_empty() {
            self.refresh_token = token.refresh_token.to_owned();
        }
        if grant == GrantType::AuthorizationCode {
            self.authorization_code.clear();
        }
    }
}
