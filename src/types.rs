//! Core types for paperboy

use crate::status_cache::Progress;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;
use utoipa::ToSchema;
use uuid::Uuid;

/// Unique identifier for a job
///
/// Generated from a random v4 UUID at submission time and used both as the
/// status cache key and as the ID handed back to the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobKey(Uuid);

impl JobKey {
    /// Generate a fresh random key
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl std::str::FromStr for JobKey {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Pipeline stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Article fetch and normalization
    Extract,
    /// E-book generation
    Convert,
    /// Email delivery
    Email,
    /// Temporary file removal
    Cleanup,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Extract => "extract",
            Stage::Convert => "convert",
            Stage::Email => "email",
            Stage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// A submission as received from a client
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Submission {
    /// Destination address
    #[serde(default)]
    pub email: String,
    /// Article URL
    #[serde(default)]
    pub url: String,
    /// Pre-extracted article HTML (e.g. sent by the bookmarklet)
    #[serde(default)]
    pub content: Option<String>,
}

impl Submission {
    /// Create a submission without pre-extracted content
    pub fn new(email: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            url: url.into(),
            content: None,
        }
    }

    /// Attach pre-extracted article HTML
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// One validated request travelling through the pipeline
///
/// A job is deliberately not `Clone`: exactly one value exists per
/// submission and it moves from queue to queue until Cleanup consumes it.
#[derive(Debug)]
pub struct Job {
    key: JobKey,
    email: String,
    url: Url,
    content: Option<String>,
    workspace: PathBuf,
    progress: Progress,
}

impl Job {
    pub(crate) fn new(
        key: JobKey,
        email: String,
        url: Url,
        content: Option<String>,
        workspace: PathBuf,
        progress: Progress,
    ) -> Self {
        Self {
            key,
            email,
            url,
            content,
            workspace,
            progress,
        }
    }

    /// Job key
    pub fn key(&self) -> JobKey {
        self.key
    }

    /// Destination address
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Article URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Pre-extracted article HTML, if the client supplied it
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.trim().is_empty())
    }

    /// Directory holding this job's temporary files
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Handle for publishing progress under this job's key
    pub fn progress(&self) -> &Progress {
        &self.progress
    }
}

/// Pipeline events for subscribers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A validated job entered the extraction queue
    Queued {
        /// Job key
        key: JobKey,
    },
    /// A stage failed and sent the job straight to Cleanup
    Diverted {
        /// Job key
        key: JobKey,
        /// Stage that failed
        stage: Stage,
        /// Internal failure description (for logs and operators)
        reason: String,
    },
    /// The e-book was handed to the mail service
    Delivered {
        /// Job key
        key: JobKey,
    },
    /// Cleanup finished; the job's lifecycle is over
    Cleaned {
        /// Job key
        key: JobKey,
        /// Whether the job was delivered
        delivered: bool,
    },
    /// The pipeline finished shutting down
    Shutdown,
}

/// Answer to a status poll
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatusReport {
    /// Latest progress message
    pub message: String,
    /// Whether the client can stop polling
    pub done: bool,
}

/// Answer to a submission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SubmitResponse {
    /// Confirmation or rejection message
    pub message: String,
    /// Job key to poll, present only when the job was accepted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl SubmitResponse {
    /// Message returned for accepted submissions
    pub const ACCEPTED: &'static str = "Submitted! Hang tight...";

    /// Response for an accepted job
    pub fn accepted(key: JobKey) -> Self {
        Self {
            message: Self::ACCEPTED.to_string(),
            id: Some(key.to_string()),
        }
    }

    /// Response for a rejected submission
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            id: None,
        }
    }
}
