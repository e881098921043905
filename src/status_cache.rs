//! Shared job status store with expiry
//!
//! Every stage publishes human-readable progress strings here under the
//! job's key, and the HTTP boundary reads them back when a client polls.
//! Entries expire a fixed time after their last write; reads treat expired
//! entries as absent and a background sweeper reclaims their memory.

use crate::types::{JobKey, StatusReport};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Message returned when a key has no live entry
pub const NOT_FOUND_MESSAGE: &str = "No job with that ID found.";

/// Matches status messages that mean the client can stop polling
static TERMINAL_VOCABULARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("(?i)done|failed|limited|invalid|error|sorry")
        .unwrap_or_else(|e| unreachable!("terminal vocabulary pattern is valid: {e}"))
});

/// Whether a status message marks the end of a job (successful or not)
pub fn is_terminal(message: &str) -> bool {
    TERMINAL_VOCABULARY.is_match(message)
}

struct Entry {
    message: String,
    expires_at: Instant,
}

/// Process-wide key → message map with per-entry expiry
///
/// Cloning is cheap: all clones share the same map. Writes are
/// last-write-wins and visible to readers immediately.
#[derive(Clone)]
pub struct StatusCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    ttl: Duration,
}

impl std::fmt::Debug for StatusCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl StatusCache {
    /// Create an empty cache whose entries live for `ttl` after each write
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Default time-to-live applied by [`set`](Self::set)
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store `message` under `key`, replacing any previous message
    pub fn set(&self, key: &str, message: impl Into<String>) {
        self.set_with_ttl(key, message, self.ttl);
    }

    /// Store `message` under `key` with an explicit time-to-live
    pub fn set_with_ttl(&self, key: &str, message: impl Into<String>, ttl: Duration) {
        let entry = Entry {
            message: message.into(),
            expires_at: Instant::now() + ttl,
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), entry);
    }

    /// Fetch the live message for `key`
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.message.clone())
    }

    /// Evict `key` immediately. Returns whether a live entry was removed.
    pub fn remove(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some_and(|entry| entry.expires_at > now)
    }

    /// Drop every expired entry and return how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    /// Whether there are no live entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Answer a client status poll
    ///
    /// Unknown or expired keys report [`NOT_FOUND_MESSAGE`] with `done = true`
    /// so clients stop polling.
    pub fn lookup(&self, key: &str) -> StatusReport {
        match self.get(key) {
            Some(message) => {
                let done = is_terminal(&message);
                StatusReport { message, done }
            }
            None => StatusReport {
                message: NOT_FOUND_MESSAGE.to_string(),
                done: true,
            },
        }
    }

    /// Reporting handle bound to one job's key
    pub fn progress(&self, key: JobKey) -> Progress {
        Progress {
            key,
            cache: self.clone(),
        }
    }

    /// Spawn the background task that purges expired entries every `interval`
    pub fn spawn_sweeper(
        &self,
        interval: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let purged = cache.purge_expired();
                        if purged > 0 {
                            debug!(purged, "purged expired status entries");
                        }
                    }
                }
            }
        })
    }
}

/// Publishes progress for a single job
#[derive(Clone, Debug)]
pub struct Progress {
    key: JobKey,
    cache: StatusCache,
}

impl Progress {
    /// The job this handle reports for
    pub fn key(&self) -> JobKey {
        self.key
    }

    /// Overwrite the job's status message
    pub fn report(&self, message: impl Into<String>) {
        let message = message.into();
        debug!(job = %self.key, %message, "progress");
        self.cache.set(&self.key.to_string(), message);
    }

    /// The job's current status message, if any
    pub fn current(&self) -> Option<String> {
        self.cache.get(&self.key.to_string())
    }
}
