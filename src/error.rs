//! Error types for paperboy
//!
//! This module provides the error taxonomy for the library:
//! - [`Error`] for operations on the pipeline itself (startup, submission, shutdown)
//! - [`ValidationError`] for submissions rejected before they enter the pipeline
//! - [`StageError`] and its per-stage sources for failures that end a job early
//!
//! Stage errors are never shown to clients verbatim. [`StageError::status_message`]
//! maps each one onto a fixed status string that the polling client understands.

use crate::types::Stage;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for paperboy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for paperboy
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "pipeline.queue_capacity")
        key: Option<String>,
    },

    /// Submission rejected by validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

/// Reasons a submission is rejected before a job is created
///
/// The `Display` text is returned to the submitting client as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No email address was supplied
    #[error("Please enter an email address.")]
    MissingEmail,

    /// The email address does not look like an address
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    /// No URL was supplied
    #[error("Please enter the URL of an article.")]
    MissingUrl,

    /// The URL could not be parsed as an absolute URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The URL is absolute but not HTTP(S)
    #[error("Invalid URL scheme {0:?}: only http and https are supported.")]
    UnsupportedScheme(String),

    /// The URL points at a blacklisted host
    #[error("Sorry, articles from {host} are blacklisted.")]
    Blacklisted {
        /// The host that matched the blacklist
        host: String,
    },
}

/// Article fetch and extraction failures
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be sent or the body could not be read
    #[error("request to {url} failed: {reason}")]
    Request {
        /// The requested URL
        url: String,
        /// Underlying transport error
        reason: String,
    },

    /// The server answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status {
        /// The requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The request did not finish in time
    #[error("request to {url} timed out")]
    Timeout {
        /// The requested URL
        url: String,
    },

    /// The response is not an HTML document
    #[error("{url} is not HTML (content type {content_type})")]
    UnsupportedContent {
        /// The requested URL
        url: String,
        /// The content type the server reported
        content_type: String,
    },

    /// The response body exceeds the configured size limit
    #[error("response body exceeds {limit} bytes")]
    TooLarge {
        /// Configured limit in bytes
        limit: usize,
    },

    /// Nothing readable was found in the document
    #[error("no readable content found at {url}")]
    NoContent {
        /// The article URL
        url: String,
    },

    /// The readability pass did not complete
    #[error("could not process the document from {url}: {reason}")]
    Parse {
        /// The article URL
        url: String,
        /// Why processing stopped
        reason: String,
    },
}

/// E-book generation failures
#[derive(Debug, Error)]
pub enum GenerationError {
    /// No generator is available on this host
    #[error("e-book generator unavailable: {0}")]
    Unavailable(String),

    /// The generator process could not be started
    #[error("failed to start {binary}: {reason}")]
    Spawn {
        /// Generator binary
        binary: PathBuf,
        /// OS error text
        reason: String,
    },

    /// The generator did not finish within the configured timeout
    #[error("generator timed out after {after:?}")]
    TimedOut {
        /// The timeout that elapsed
        after: Duration,
    },

    /// The generator exited without producing output
    #[error("generator exited with {code:?}: {output}")]
    Failed {
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// Tail of the generator's output
        output: String,
    },

    /// The input document path cannot be used
    #[error("invalid input document {path}")]
    InvalidInput {
        /// The offending path
        path: PathBuf,
    },
}

/// Email delivery failures
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Delivery credentials are missing
    #[error("mail delivery is not configured")]
    NotConfigured,

    /// The attachment exceeds the configured limit
    #[error("attachment is {size} bytes, limit is {limit}")]
    TooLarge {
        /// Attachment size in bytes
        size: u64,
        /// Configured limit in bytes
        limit: u64,
    },

    /// The attachment could not be read
    #[error("failed to read attachment {path}: {reason}")]
    Attachment {
        /// Attachment path
        path: PathBuf,
        /// OS error text
        reason: String,
    },

    /// The mail service could not be reached
    #[error("mail request failed: {0}")]
    Request(String),

    /// The mail service refused the message
    #[error("mail service returned HTTP {status}: {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },
}

/// Temporary file removal failure (best-effort, logged only)
#[derive(Debug, Error)]
#[error("failed to remove {path}: {source}")]
pub struct CleanupError {
    /// The path that could not be removed
    pub path: PathBuf,
    /// Underlying I/O error
    #[source]
    pub source: std::io::Error,
}

/// A failure that ends a job before delivery
#[derive(Debug, Error)]
pub enum StageError {
    /// Extraction failed
    #[error("extraction failed: {0}")]
    Fetch(#[from] FetchError),

    /// Conversion failed
    #[error("conversion failed: {0}")]
    Generation(#[from] GenerationError),

    /// Delivery failed
    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    /// The job's temporary files could not be written
    #[error("workspace error: {0}")]
    Workspace(#[from] std::io::Error),

    /// The stage operation panicked
    #[error("{stage} stage panicked: {detail}")]
    Panicked {
        /// Stage that panicked
        stage: Stage,
        /// Panic payload, if it was a string
        detail: String,
    },

    /// The next stage stopped taking jobs
    #[error("{stage} stage could not hand the job on: next queue closed")]
    Unroutable {
        /// Stage holding the job
        stage: Stage,
    },
}

impl StageError {
    /// The terminal status string published for this failure
    ///
    /// Every message matches the terminal vocabulary so polling clients stop.
    pub fn status_message(&self) -> &'static str {
        match self {
            StageError::Fetch(FetchError::TooLarge { .. }) => {
                "Sorry, that article is too large to process."
            }
            StageError::Fetch(_) => "Sorry, we failed to extract that article.",
            StageError::Generation(_) => "Sorry, conversion of that article failed.",
            StageError::Delivery(DeliveryError::TooLarge { .. }) => {
                "Sorry, the e-book is too large to email."
            }
            StageError::Delivery(_) => "Sorry, sending the email failed.",
            StageError::Workspace(_)
            | StageError::Panicked { .. }
            | StageError::Unroutable { .. } => {
                "Error: something went wrong processing that article."
            }
        }
    }
}
