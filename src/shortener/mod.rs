use async_trait::async_trait;

pub mod tinyurl;

pub use tinyurl::TinyUrl;

use crate::Result;

/// Remote service that turns a long URL into a short one
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShortenService: Send + Sync {
    async fn shorten(&self, url: &str) -> Result<String>;

    /// Name of the service, for messages
    fn name(&self) -> &'static str;
}

/// Outcome of a shortening attempt. `url` is always usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortened {
    /// The short URL, or the original one when shortening failed
    pub url: String,

    /// Why shortening failed
    pub error: Option<String>,
}

impl Shortened {
    pub fn is_shortened(&self) -> bool {
        self.error.is_none()
    }
}

/// Shortens URLs, falling back to the original on any failure
pub struct UrlShortener<S> {
    service: S,
}

impl<S: ShortenService> UrlShortener<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub async fn shorten(&self, url: &str) -> Shortened {
        match self.service.shorten(url).await {
            Ok(short) => {
                tracing::info!("Shortened {} to {} via {}", url, short, self.service.name());
                Shortened {
                    url: short,
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!("Error shortening URL: {}", e);
                Shortened {
                    url: url.to_string(),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[tokio::test]
    async fn test_success_returns_short_url() {
        let mut service = MockShortenService::new();
        service
            .expect_shorten()
            .withf(|url| url == "https://www.youtube.com/watch?v=abc")
            .times(1)
            .returning(|_| Ok("https://tinyurl.com/2p8x7k".to_string()));
        service.expect_name().return_const("TinyURL");

        let shortened = UrlShortener::new(service)
            .shorten("https://www.youtube.com/watch?v=abc")
            .await;
        assert_eq!(shortened.url, "https://tinyurl.com/2p8x7k");
        assert!(shortened.is_shortened());
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_original() {
        let mut service = MockShortenService::new();
        service
            .expect_shorten()
            .returning(|_| Err(Error::Shortener("HTTP 503 Service Unavailable".to_string())));
        service.expect_name().return_const("TinyURL");

        let shortened = UrlShortener::new(service)
            .shorten("https://www.youtube.com/watch?v=abc")
            .await;
        assert_eq!(shortened.url, "https://www.youtube.com/watch?v=abc");
        assert_eq!(
            shortened.error.as_deref(),
            Some("URL shortening failed: HTTP 503 Service Unavailable")
        );
        assert!(!shortened.is_shortened());
    }
}
