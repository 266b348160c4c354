//! Client configuration: the API credential and the service base URL.
//!
//! A `Config` is built once by the embedding application and handed to
//! `EasyPostClient::new`. Nothing in the crate mutates it afterwards, so two
//! clients with different credentials can live in the same process.

use std::env;

use url::Url;

use crate::error::{ApiError, Result};

/// Production endpoint of the v2 API.
pub const DEFAULT_BASE_URL: &str = "https://api.easypost.com/v2";

#[derive(Debug, Clone)]
pub struct Config {
    api_key: String,
    base_url: String,
}

impl Config {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different endpoint, e.g. a local mock server.
    ///
    /// The URL is taken as given; use `try_with_base_url` for input that
    /// has not been checked.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Like `with_base_url`, but rejects anything that is not an absolute
    /// `http` or `https` URL.
    pub fn try_with_base_url(self, base_url: &str) -> Result<Self> {
        let base_url = base_url.trim();
        let parsed = Url::parse(base_url)
            .map_err(|e| ApiError::Configuration(format!("base URL `{base_url}` is not valid: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::Configuration(format!(
                "base URL `{base_url}` must use http or https"
            )));
        }
        Ok(self.with_base_url(base_url))
    }

    /// Load configuration from environment variables
    ///
    /// # Environment Variables
    /// - `EASYPOST_API_KEY`: API key. Left empty when unset; operations then
    ///   fail with a configuration error.
    /// - `EASYPOST_BASE_URL`: Optional - absolute base URL (default: production)
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("EASYPOST_API_KEY").unwrap_or_default();
        let config = Self::new(api_key.trim());

        match env::var("EASYPOST_BASE_URL") {
            Ok(base_url) if !base_url.trim().is_empty() => config.try_with_base_url(&base_url),
            _ => Ok(config),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fails when no credential has been supplied.
    pub(crate) fn ensure_credential(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(ApiError::Configuration("missing credential".to_string()));
        }
        Ok(())
    }
}
