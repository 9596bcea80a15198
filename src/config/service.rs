use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

use crate::config::settings::SettingsConfig;
use crate::resources::urls::{ReadMode, ResourceType};
use crate::utils::constants::TOKEN_PATH;


/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    pub api: ApiConfig,
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub resources: HashMap<String, ResourceConfig>,
}

/// ================================
/// Vendor API
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// e.g. https://api.honeywell.com/
    pub base_url: String,
    /// defaults to `<base_url>oauth2/token`
    pub token_url: Option<String>,
}

impl ApiConfig {
    pub fn new(base_url: &str) -> Self {
        Self { base_url: base_url.to_owned(), token_url: None }
    }

    /// Base url with a guaranteed trailing slash, so relative joins keep its path.
    pub fn base(&self) -> Result<Url, url::ParseError> {
        let mut raw = self.base_url.trim().to_owned();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw)
    }

    pub fn token_endpoint(&self) -> Result<String, url::ParseError> {
        match &self.token_url {
            Some(token_url) => Url::parse(token_url).map(String::from),
            None => self.base()?.join(TOKEN_PATH).map(String::from),
        }
    }
}

/// ================================
/// OAuth2 client credentials
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CredentialsConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    /// one-shot code, exchanged for the first token pair
    #[serde(default)]
    pub authorization_code: String,
    #[serde(default)]
    pub refresh_token: String,
    /// file the current refresh token is persisted to and restored from
    pub refresh_token_path: Option<String>,
}

/// ================================
/// Resources
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ResourceConfig {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    #[serde(default)]
    pub location_id: u64,
    pub device_id: Option<String>,
    /// overrides the resource type's default read mode
    pub read: Option<ReadMode>,
}

impl ResourceConfig {
    pub fn read_mode(&self) -> ReadMode {
        self.read.unwrap_or_else(|| self.resource_type.default_read_mode())
    }
}
