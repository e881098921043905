//! Submission validation
//!
//! Runs before a job is created. A rejected submission never takes a queue
//! slot and never gets a status cache entry.

use crate::error::ValidationError;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Minimal address shape: something@something.tld, no whitespace
static EMAIL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$")
        .unwrap_or_else(|e| unreachable!("email pattern is valid: {e}"))
});

/// Checks submissions against address shape, URL shape and the host blacklist
#[derive(Clone, Debug, Default)]
pub struct Validator {
    /// Lowercased hosts without trailing dots
    blacklist: Vec<String>,
}

impl Validator {
    /// Build a validator rejecting `blacklist` hosts and their subdomains
    pub fn new<S: AsRef<str>>(blacklist: &[S]) -> Self {
        let blacklist = blacklist
            .iter()
            .map(|host| host.as_ref().trim().trim_end_matches('.').to_ascii_lowercase())
            .filter(|host| !host.is_empty())
            .collect();
        Self { blacklist }
    }

    /// Validate an email/URL pair, returning the parsed URL on success
    ///
    /// Email is checked first, so a submission with two bad fields reports
    /// the email problem.
    pub fn validate(&self, email: &str, url: &str) -> Result<Url, ValidationError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ValidationError::MissingEmail);
        }
        if !EMAIL_SHAPE.is_match(email) {
            return Err(ValidationError::InvalidEmail(email.to_string()));
        }

        let url = url.trim();
        if url.is_empty() {
            return Err(ValidationError::MissingUrl);
        }
        let parsed = Url::parse(url).map_err(|_| ValidationError::InvalidUrl(url.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => return Err(ValidationError::UnsupportedScheme(other.to_string())),
        }
        let host = match parsed.host_str() {
            Some(host) if !host.is_empty() => host.trim_end_matches('.').to_ascii_lowercase(),
            _ => return Err(ValidationError::InvalidUrl(url.to_string())),
        };
        if self.is_blacklisted(&host) {
            return Err(ValidationError::Blacklisted { host });
        }

        Ok(parsed)
    }

    /// Whether `host` equals a blacklisted host or is a subdomain of one
    pub fn is_blacklisted(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.blacklist.iter().any(|entry| {
            host == *entry
                || host
                    .strip_suffix(entry.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}
