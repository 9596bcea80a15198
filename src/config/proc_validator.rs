//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Validates:
//!   * consumer credentials are present
//!   * timeout / refresh interval are positive
//!   * api and token urls are absolute
//!   * logging level and metrics path
//!   * device-scoped resources name their device

use url::Url;

use crate::config::service::{ApiConfig, CredentialsConfig, ResourceConfig, ServiceConfig};
use crate::config::settings::SettingsConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_api(&cfg.api, &mut errors);
    validate_credentials(&cfg.credentials, &mut errors);

    for (resource_id, resource) in &cfg.resources {
        validate_resource(resource_id, resource, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if settings.timeout_ms == 0 {
        errors.push("settings.timeout_ms must be > 0".to_string());
    }
    if settings.refresh_interval_seconds == 0 {
        errors.push("settings.refresh_interval_seconds must be > 0".to_string());
    }
    if settings.metrics.is_enabled && !settings.metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            settings.metrics.path
        ));
    }
    if let Some(logging) = &settings.logging {
        if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' must be one of {:?}",
                logging.level, LOG_LEVELS
            ));
        }
    }
}

fn validate_api(api: &ApiConfig, errors: &mut Vec<String>) {
    if let Err(e) = api.base() {
        errors.push(format!("api.base_url '{}' is not an absolute url: {}", api.base_url, e));
    }
    if let Some(token_url) = &api.token_url {
        if let Err(e) = Url::parse(token_url) {
            errors.push(format!("api.token_url '{}' is not an absolute url: {}", token_url, e));
        }
    }
}

fn validate_credentials(credentials: &CredentialsConfig, errors: &mut Vec<String>) {
    if credentials.consumer_key.trim().is_empty() {
        errors.push("credentials.consumer_key must not be empty".to_string());
    }
    if credentials.consumer_secret.trim().is_empty() {
        errors.push("credentials.consumer_secret must not be empty".to_string());
    }
    if let Some(path) = &credentials.refresh_token_path {
        if path.trim().is_empty() {
            errors.push("credentials.refresh_token_path must not be empty when set".to_string());
        }
    }
}

fn validate_resource(resource_id: &str, resource: &ResourceConfig, errors: &mut Vec<String>) {
    let device_missing = resource
        .device_id
        .as_ref()
        .map(|device_id| device_id.trim().is_empty())
        .unwrap_or(true);

    if resource.resource_type.is_device_scoped() && device_missing {
        errors.push(format!(
            "resources['{}'] of type '{}' requires 'device_id'",
            resource_id,
            resource.resource_type.as_str()
        ));
    }
}
