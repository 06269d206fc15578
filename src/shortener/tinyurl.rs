use async_trait::async_trait;
use reqwest::Client;

use super::ShortenService;
use crate::config::ShortenerConfig;
use crate::utils::validate_and_normalize_url;
use crate::{Error, Result};

/// TinyURL's plain-text creation API
pub struct TinyUrl {
    client: Client,
    endpoint: String,
}

impl TinyUrl {
    pub fn new() -> Self {
        Self::from_config(&ShortenerConfig::default())
    }

    pub fn from_config(config: &ShortenerConfig) -> Self {
        Self {
            client: Client::new(),
            endpoint: config.endpoint.clone(),
        }
    }

    /// Request URL for shortening `url`
    pub fn request_url(&self, url: &str) -> String {
        format!("{}?url={}", self.endpoint, urlencoding::encode(url))
    }
}

impl Default for TinyUrl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShortenService for TinyUrl {
    async fn shorten(&self, url: &str) -> Result<String> {
        let response = self.client.get(self.request_url(url)).send().await?;

        if !response.status().is_success() {
            return Err(Error::Shortener(format!("HTTP {}", response.status())));
        }

        let body = response.text().await?;
        let short = body.trim();
        validate_and_normalize_url(short)
            .map_err(|_| Error::Shortener(format!("unexpected response: {}", short)))?;

        Ok(short.to_string())
    }

    fn name(&self) -> &'static str {
        "TinyURL"
    }
}
