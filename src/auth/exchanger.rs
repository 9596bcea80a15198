use std::time::Duration;

use base64::Engine;
use http::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::auth::token::{GrantType, Token};
use crate::auth::token_store::CredentialSnapshot;
use crate::gateway::error::ApiError;
use crate::utils::constants::CONTENT_TYPE_JSON;

/// Result of a successful exchange: the new token and the grant that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub token: Token,
    pub grant: GrantType,
}

/// Calls the OAuth2 token endpoint with basic client authentication.
#[derive(Debug, Clone)]
pub struct TokenExchanger {
    client: Client,
    token_url: String,
    basic_auth: String,
    timeout: Duration,
}

impl TokenExchanger {
    pub fn new(
        client: Client,
        token_url: &str,
        consumer_key: &str,
        consumer_secret: &str,
        timeout: Duration,
    ) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", consumer_key, consumer_secret));
        Self {
            client,
            token_url: token_url.to_owned(),
            basic_auth: format!("Basic {}", encoded),
            timeout,
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Authorization code first, refresh token as fallback.
    pub async fn exchange(&self, credentials: &CredentialSnapshot) -> Result<Exchange, ApiError> {
        if !credentials.authorization_code.is_empty() {
            match self
                .request_token(GrantType::AuthorizationCode, &credentials.authorization_code)
                .await
            {
                Ok(token) => {
                    info!("authorization code exchanged for a token pair");
                    return Ok(Exchange { token, grant: GrantType::AuthorizationCode });
                }
                Err(e) => warn!("authorization code failed to provide a token: {}", e),
            }
        }

        if credentials.refresh_token.is_empty() {
            return Err(ApiError::NoCredentialPath(
                "neither a usable authorization code nor a refresh token is configured".to_owned(),
            ));
        }

        let token = self
            .request_token(GrantType::RefreshToken, &credentials.refresh_token)
            .await
            .inspect_err(|e| warn!("refresh token failed to provide a token: {}", e))?;
        debug!("refresh token exchanged for a new access token");
        Ok(Exchange { token, grant: GrantType::RefreshToken })
    }

    async fn request_token(&self, grant: GrantType, secret: &str) -> Result<Token, ApiError> {
        let form: Vec<(&str, &str)> = match grant {
            GrantType::AuthorizationCode => vec![
                ("grant_type", grant.as_str()),
                ("redirect_uri", "none"),
                ("code", secret),
            ],
            GrantType::RefreshToken => vec![
                ("grant_type", grant.as_str()),
                ("refresh_token", secret),
            ],
        };

        let response = self
            .client
            .post(&self.token_url)
            .timeout(self.timeout)
            .header(AUTHORIZATION, &self.basic_auth)
            .header(ACCEPT, CONTENT_TYPE_JSON)
            // sets application/x-www-form-urlencoded
            .form(&form)
            .send()
            .await
            .map_err(|e| ApiError::Transport { url: self.token_url.to_owned(), message: e.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Auth { grant, status: status.as_u16() });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport { url: self.token_url.to_owned(), message: e.to_string() })?;
        Token::from_response(&body)
    }
}
