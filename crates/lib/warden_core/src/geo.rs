//! Best-effort IP geolocation for login events.
//!
//! Lookups never fail a login: the coordinator bounds them with a timeout and
//! swallows every error, recording an empty location instead.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// AMap IP location endpoint.
const AMAP_IP_ENDPOINT: &str = "https://restapi.amap.com/v3/ip";

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("geolocation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("geolocation rejected: {0}")]
    Rejected(String),
}

/// Resolves an IP address to a human-readable location.
#[async_trait]
pub trait GeoLocator: Send + Sync {
    async fn locate(&self, ip: &str) -> Result<Option<String>, GeoError>;
}

/// Locator that knows nothing. Used when no provider is configured.
#[derive(Debug, Default, Clone)]
pub struct NoopLocator;

#[async_trait]
impl GeoLocator for NoopLocator {
    async fn locate(&self, _ip: &str) -> Result<Option<String>, GeoError> {
        Ok(None)
    }
}

/// AMap (restapi.amap.com) IP locator.
#[derive(Debug, Clone)]
pub struct AmapLocator {
    client: reqwest::Client,
    key: String,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct AmapResponse {
    status: String,
    #[serde(default)]
    info: String,
    // AMap answers `[]` instead of a string for unknown addresses.
    #[serde(default)]
    province: serde_json::Value,
    #[serde(default)]
    city: serde_json::Value,
}

impl AmapResponse {
    fn location(&self) -> Option<String> {
        let part = |v: &serde_json::Value| v.as_str().unwrap_or_default().to_string();
        let location = format!("{}{}", part(&self.province), part(&self.city));
        (!location.is_empty()).then_some(location)
    }
}

impl AmapLocator {
    pub fn new(key: impl Into<String>) -> Self {
        Self::with_endpoint(key, AMAP_IP_ENDPOINT)
    }

    pub fn with_endpoint(key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            key: key.into(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl GeoLocator for AmapLocator {
    async fn locate(&self, ip: &str) -> Result<Option<String>, GeoError> {
        let response: AmapResponse = self
            .client
            .get(&self.endpoint)
            .query(&[("key", self.key.as_str()), ("ip", ip)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.status != "1" {
            return Err(GeoError::Rejected(response.info));
        }
        Ok(response.location())
    }
}
