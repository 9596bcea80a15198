use std::path::Path;
use anyhow::{anyhow, Result};
use tracing::info;

use crate::ServiceConfig;
use crate::config::proc_loader::file_to_config;

/// Load the bridge configuration, wrapping any failure with the offending path.
pub async fn run(config_path: &str) -> Result<ServiceConfig> {
    let path = Path::new(config_path);
    let service_config = file_to_config(path)
        .await
        .map_err(|e| anyhow!("invalid config '{}': {}", config_path, e))?;
    info!("config loaded from '{}', {} resources configured", config_path, service_config.resources.len());
    Ok(service_config)
}
