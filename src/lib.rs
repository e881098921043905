//! # paperboy
//!
//! Deliver web articles to e-readers. A client submits an email address and
//! an article URL; paperboy fetches and cleans up the article, converts it to
//! an e-book with kindlegen, and emails it as an attachment.
//!
//! ## Architecture
//!
//! Jobs flow through four stages connected by bounded queues:
//!
//! ```text
//! submit -> Extract -> Convert -> Email -> Cleanup
//!              \          \         \        ^
//!               `----------`---------`-------'  (on failure)
//! ```
//!
//! Every stage runs a pool of workers. A failing stage records a readable
//! message in the [`StatusCache`] and hands the job straight to Cleanup, so
//! temporary files are always removed. Clients poll the cache by job key.
//!
//! ## Quick Start
//!
//! ```no_run
//! use paperboy::{Config, Pipeline, Submission};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.delivery.server_token = Some("postmark-token".to_string());
//!
//!     let pipeline = Pipeline::new(config).await?;
//!
//!     let mut events = pipeline.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let key = pipeline
//!         .submit(Submission::new("reader@kindle.com", "https://example.com/story"))
//!         .await?;
//!     println!("{}", pipeline.lookup(&key.to_string()).message);
//!
//!     pipeline.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// HTTP API module
pub mod api;
/// Configuration types
pub mod config;
/// E-book generation
pub mod conversion;
/// Email delivery
pub mod delivery;
/// Error types
pub mod error;
/// Article fetching and normalization
pub mod extraction;
/// Stage workers, queues and orchestration
pub mod pipeline;
/// Per-job progress messages
pub mod status_cache;
/// Core types and events
pub mod types;
/// Submission validation
pub mod validation;

// Re-export commonly used types
pub use config::Config;
pub use error::{
    CleanupError, DeliveryError, Error, FetchError, GenerationError, Result, StageError,
    ValidationError,
};
pub use pipeline::{Collaborators, Pipeline};
pub use status_cache::StatusCache;
pub use types::{Event, JobKey, Stage, StatusReport, Submission, SubmitResponse};

/// Helper function to run the pipeline with graceful signal handling.
///
/// Waits for SIGTERM or Ctrl+C and then calls the pipeline's `shutdown()` method,
/// which stops intake and lets queued jobs drain.
///
/// # Example
///
/// ```no_run
/// use paperboy::{Config, Pipeline, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pipeline = Pipeline::new(Config::default()).await?;
///     let _api = pipeline.spawn_api_server();
///
///     run_with_shutdown(pipeline).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(pipeline: Pipeline) -> Result<()> {
    shutdown_after(pipeline, wait_for_signal()).await
}

async fn shutdown_after(
    pipeline: Pipeline,
    signal: impl std::future::Future<Output = ()>,
) -> Result<()> {
    signal.await;
    pipeline.shutdown().await
}

async fn wait_for_signal() {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = terminate => tracing::info!("received SIGTERM"),
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => tracing::info!("received Ctrl+C"),
            Err(e) => tracing::error!(error = %e, "failed to listen for Ctrl+C"),
        },
    }
}
