//! Configuration types for paperboy

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

/// Main configuration for [`Pipeline`](crate::Pipeline)
///
/// Every section has defaults, so `Config::default()` runs a local pipeline
/// that can extract and convert but not deliver (no mail token).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Queue sizes, worker counts and working directory
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Status cache expiry
    #[serde(default)]
    pub status: StatusConfig,

    /// Submission validation
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Article fetching
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// E-book generation
    #[serde(default)]
    pub conversion: ConversionConfig,

    /// Email delivery
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// HTTP boundary
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.queue_capacity == 0 {
            return Err(Error::Config {
                message: "queue capacity must be at least 1".to_string(),
                key: Some("pipeline.queue_capacity".to_string()),
            });
        }
        let workers = &self.pipeline.workers;
        for (name, count) in [
            ("extract", workers.extract),
            ("convert", workers.convert),
            ("email", workers.email),
            ("cleanup", workers.cleanup),
        ] {
            if count == 0 {
                return Err(Error::Config {
                    message: format!("{name} stage needs at least one worker"),
                    key: Some(format!("pipeline.workers.{name}")),
                });
            }
        }
        if self.status.ttl.is_zero() {
            return Err(Error::Config {
                message: "status ttl must be greater than zero".to_string(),
                key: Some("status.ttl".to_string()),
            });
        }
        let rate_limit = &self.server.api.rate_limit;
        if rate_limit.enabled {
            for (name, value) in [
                ("requests_per_second", rate_limit.requests_per_second),
                ("burst_size", rate_limit.burst_size),
            ] {
                if value == 0 {
                    return Err(Error::Config {
                        message: format!("rate limit {name} must be at least 1"),
                        key: Some(format!("server.api.rate_limit.{name}")),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Pipeline wiring configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Capacity of each stage queue (default: 10)
    ///
    /// A full queue blocks its producer; a full extraction queue blocks submission.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Workers per stage
    #[serde(default)]
    pub workers: StageWorkers,

    /// Directory for per-job temporary files (default: "./work")
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// How long shutdown waits for queued jobs to drain (default: 30 seconds)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            workers: StageWorkers::default(),
            work_dir: default_work_dir(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Number of concurrent workers per stage (default: 1 each)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StageWorkers {
    /// Extraction workers
    #[serde(default = "default_workers")]
    pub extract: usize,
    /// Conversion workers
    #[serde(default = "default_workers")]
    pub convert: usize,
    /// Email workers
    #[serde(default = "default_workers")]
    pub email: usize,
    /// Cleanup workers
    #[serde(default = "default_workers")]
    pub cleanup: usize,
}

impl Default for StageWorkers {
    fn default() -> Self {
        Self {
            extract: default_workers(),
            convert: default_workers(),
            email: default_workers(),
            cleanup: default_workers(),
        }
    }
}

/// Status cache configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Lifetime of a status entry after its last write (default: 1 hour)
    #[serde(default = "default_status_ttl", with = "duration_serde")]
    pub ttl: Duration,

    /// How often expired entries are purged (default: 60 seconds)
    #[serde(default = "default_sweep_interval", with = "duration_serde")]
    pub sweep_interval: Duration,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            ttl: default_status_ttl(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

/// Submission validation configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Hosts whose articles are refused (subdomains included)
    #[serde(default)]
    pub blacklist: Vec<String>,
}

/// Article fetch configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Whole-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// User-Agent sent with article requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Largest accepted response body in bytes (default: 5 MiB)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Redirects followed before giving up (default: 5)
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            max_body_bytes: default_max_body_bytes(),
            max_redirects: default_max_redirects(),
        }
    }
}

/// E-book generator configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Path to the kindlegen executable (auto-detected if None)
    #[serde(default)]
    pub kindlegen_path: Option<PathBuf>,

    /// Whether to search PATH for kindlegen if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Generator timeout (default: 120 seconds, None = unbounded)
    #[serde(
        default = "default_conversion_timeout",
        with = "optional_duration_serde"
    )]
    pub timeout: Option<Duration>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            kindlegen_path: None,
            search_path: true,
            timeout: default_conversion_timeout(),
        }
    }
}

/// Mail API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Endpoint that accepts outgoing messages
    #[serde(default = "default_mail_api_url")]
    pub api_url: String,

    /// Server token for the mail API (None = delivery disabled)
    #[serde(default)]
    pub server_token: Option<String>,

    /// Sender address
    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// Mail API request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Largest attachment sent in bytes (default: 10 MiB)
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            api_url: default_mail_api_url(),
            server_token: None,
            from_address: default_from_address(),
            request_timeout: default_request_timeout(),
            max_attachment_bytes: default_max_attachment_bytes(),
        }
    }
}

/// External access configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServerIntegrationConfig {
    /// HTTP API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// HTTP API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8080)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for bookmarklet access from any page (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: false)
    #[serde(default)]
    pub swagger_ui: bool,

    /// Submission rate limiting
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: false,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Submission rate limiting configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Enable rate limiting (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Submissions per second per client IP (default: 1)
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Burst size (default: 5)
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,

    /// IPs exempt from rate limiting (e.g., localhost)
    #[serde(default = "default_exempt_ips")]
    pub exempt_ips: Vec<std::net::IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: default_requests_per_second(),
            burst_size: default_burst_size(),
            exempt_ips: default_exempt_ips(),
        }
    }
}

fn default_queue_capacity() -> usize {
    10
}

fn default_workers() -> usize {
    1
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("./work")
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_status_ttl() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("paperboy/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_body_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_max_redirects() -> usize {
    5
}

fn default_true() -> bool {
    true
}

fn default_conversion_timeout() -> Option<Duration> {
    Some(Duration::from_secs(120))
}

fn default_mail_api_url() -> String {
    "https://api.postmarkapp.com/email".to_string()
}

fn default_from_address() -> String {
    "paperboy@localhost".to_string()
}

fn default_max_attachment_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_requests_per_second() -> u32 {
    1
}

fn default_burst_size() -> u32 {
    5
}

fn default_exempt_ips() -> Vec<std::net::IpAddr> {
    vec![
        std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
        std::net::IpAddr::V6(std::net::Ipv6Addr::LOCALHOST),
    ]
}

// Duration as integer seconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration as integer seconds or null
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
