//! Article extraction
//!
//! Turns an article URL (or client-supplied HTML) into a [`NormalizedDocument`]:
//! a title plus a cleaned-up body that the e-book generator can consume.
//!
//! The pipeline only depends on the [`Extractor`] trait. [`HttpExtractor`] is the
//! production implementation; tests substitute their own.

mod http;
pub mod readability;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use http::HttpExtractor;

use crate::error::FetchError;
use async_trait::async_trait;
use url::Url;

/// A readable article, ready for conversion
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedDocument {
    /// Article title
    pub title: String,
    /// Sanitized body markup (no `<html>`/`<body>` wrapper)
    pub body: String,
}

impl NormalizedDocument {
    /// Create a document from an already-sanitized body
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// Render a standalone XHTML-compatible document for the generator
    pub fn to_html(&self) -> String {
        let title = readability::escape_text(&self.title);
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n{body}\n</body>\n</html>\n",
            body = self.body
        )
    }
}

/// Fetches and normalizes articles
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Fetch the article at `url` and normalize it
    async fn extract(&self, url: &Url) -> Result<NormalizedDocument, FetchError>;

    /// Name of the implementation (for logging)
    fn name(&self) -> &'static str;
}
