//! Plain re-fetch of a completed exchange's body.
//!
//! The re-read runs outside the original exchange's cache and auth state, so
//! it can fail, or return different content, independently of what the page
//! saw.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::config::TapConfig;
use crate::TapError;

#[async_trait]
pub trait BodyFetcher: Send + Sync {
    async fn fetch_body(&self, url: &str) -> Result<String, TapError>;
}

/// reqwest-backed fetcher.
pub struct HttpBodyFetcher {
    client: reqwest::Client,
}

impl HttpBodyFetcher {
    pub fn new(config: &TapConfig) -> Result<Self, TapError> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .build()
            .map_err(|err| TapError::Fetch(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BodyFetcher for HttpBodyFetcher {
    async fn fetch_body(&self, url: &str) -> Result<String, TapError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| TapError::Fetch(err.to_string()))?;
        let status = response.status();
        debug!(%url, status = status.as_u16(), "body re-fetched");
        response
            .text()
            .await
            .map_err(|err| TapError::Fetch(err.to_string()))
    }
}

/// Serves bodies from a fixed table; unknown URLs fail like a network error.
#[derive(Clone, Debug, Default)]
pub struct CannedBodyFetcher {
    bodies: HashMap<String, String>,
}

impl CannedBodyFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.bodies.insert(url.into(), body.into());
        self
    }
}

#[async_trait]
impl BodyFetcher for CannedBodyFetcher {
    async fn fetch_body(&self, url: &str) -> Result<String, TapError> {
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| TapError::Fetch(format!("no canned body for {url}")))
    }
}
