use super::{Extractor, NormalizedDocument, readability};
use crate::config::ExtractionConfig;
use crate::error::{FetchError, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::debug;
use url::Url;

/// Fetches articles over HTTP(S) and runs them through [`readability::normalize_blocking`]
///
/// Every request is bounded by the configured timeout, redirect limit and
/// body size limit.
#[derive(Clone, Debug)]
pub struct HttpExtractor {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl HttpExtractor {
    /// Build an extractor from configuration
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }

    fn request_error(url: &Url, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Request {
                url: url.to_string(),
                reason: error.to_string(),
            }
        }
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    async fn extract(&self, url: &Url) -> std::result::Result<NormalizedDocument, FetchError> {
        let mut response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.5")
            .send()
            .await
            .map_err(|e| Self::request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // A missing content type is tolerated; a declared non-HTML one is not
        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
        {
            let lowered = content_type.to_ascii_lowercase();
            if !lowered.contains("html") {
                return Err(FetchError::UnsupportedContent {
                    url: url.to_string(),
                    content_type: content_type.to_string(),
                });
            }
        }

        if response
            .content_length()
            .is_some_and(|len| len > self.max_body_bytes as u64)
        {
            return Err(FetchError::TooLarge {
                limit: self.max_body_bytes,
            });
        }

        // Relative links resolve against where the redirects ended up
        let base = response.url().clone();

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Self::request_error(url, e))?
        {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_body_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url = %url, bytes = body.len(), "fetched article");

        let html = String::from_utf8_lossy(&body).into_owned();
        readability::normalize_blocking(html, base).await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
