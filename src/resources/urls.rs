use std::collections::HashMap;

use serde::Deserialize;
use url::Url;

use crate::config::service::{ApiConfig, ResourceConfig, ServiceConfig};
use crate::gateway::error::ApiError;
use crate::utils::constants::CONTENT_PATH;

/// Vendor resources the bridge knows how to address.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Locations,
    Devices,
    Schedule,
    Thermostat,
    Fan,
    Priority,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Locations => "locations",
            ResourceType::Devices => "devices",
            ResourceType::Schedule => "schedule",
            ResourceType::Thermostat => "thermostat",
            ResourceType::Fan => "fan",
            ResourceType::Priority => "priority",
        }
    }

    /// Needs a device id in its path.
    pub fn is_device_scoped(&self) -> bool {
        matches!(
            self,
            ResourceType::Schedule | ResourceType::Thermostat | ResourceType::Fan | ResourceType::Priority
        )
    }

    /// Schedules must reflect live server state, everything else goes through the cache.
    pub fn default_read_mode(&self) -> ReadMode {
        match self {
            ResourceType::Schedule => ReadMode::OnDemand,
            _ => ReadMode::Cached,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
    Cached,
    OnDemand,
}

/// Builds resource urls against the content root of the vendor API.
#[derive(Debug, Clone)]
pub struct ResourceUrls {
    content_root: Url,
    consumer_key: String,
}

impl ResourceUrls {
    pub fn new(api: &ApiConfig, consumer_key: &str) -> Result<Self, ApiError> {
        let content_root = api
            .base()
            .and_then(|base| base.join(CONTENT_PATH))
            .map_err(|e| ApiError::InvalidUrl {
                url: api.base_url.to_owned(),
                message: e.to_string(),
            })?;

        Ok(Self { content_root, consumer_key: consumer_key.to_owned() })
    }

    pub fn for_config(&self, resource: &ResourceConfig) -> Result<String, ApiError> {
        self.url(resource.resource_type, resource.location_id, resource.device_id.as_deref())
    }

    pub fn url(
        &self,
        resource_type: ResourceType,
        location_id: u64,
        device_id: Option<&str>,
    ) -> Result<String, ApiError> {
        let device = match (resource_type.is_device_scoped(), device_id) {
            (true, Some(device)) if !device.trim().is_empty() => device.trim(),
            (true, _) => {
                return Err(ApiError::InvalidUrl {
                    url: self.content_root.to_string(),
                    message: format!("resource '{}' requires a device id", resource_type.as_str()),
                })
            }
            (false, _) => "",
        };

        let path = match resource_type {
            ResourceType::Locations => "locations".to_owned(),
            ResourceType::Devices => "devices".to_owned(),
            ResourceType::Schedule => format!("devices/schedule/{}", device),
            ResourceType::Thermostat => format!("devices/thermostats/{}", device),
            ResourceType::Priority => format!("devices/thermostats/{}/priority", device),
            ResourceType::Fan => format!("devices/thermostats/{}/fan", device),
        };

        let mut url = self.content_root.join(&path).map_err(|e| ApiError::InvalidUrl {
            url: format!("{}{}", self.content_root, path),
            message: e.to_string(),
        })?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("apikey", &self.consumer_key);
            if resource_type != ResourceType::Locations {
                query.append_pair("locationId", &location_id.to_string());
            }
            if resource_type == ResourceType::Schedule {
                query.append_pair("type", "regular");
            }
        }

        Ok(url.into())
    }
}

/// A configured resource with its url resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedResource {
    pub id: String,
    pub resource_type: ResourceType,
    pub url: String,
    pub read_mode: ReadMode,
}

/// Resolve every configured resource, failing on the first unusable one.
pub fn resolve_resources(config: &ServiceConfig) -> Result<HashMap<String, ResolvedResource>, ApiError> {
    let urls = ResourceUrls::new(&config.api, &config.credentials.consumer_key)?;
    config
        .resources
        .iter()
        .map(|(id, resource)| {
            let resolved = ResolvedResource {
                id: id.to_owned(),
                resource_type: resource.resource_type,
                url: urls.for_config(resource)?,
                read_mode: resource.read_mode(),
            };
            Ok((id.to_owned(), resolved))
        })
        .collect()
}
