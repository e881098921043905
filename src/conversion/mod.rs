//! E-book generation
//!
//! The pipeline talks to the generator through the [`Converter`] trait:
//!
//! - [`KindlegenConverter`]: runs the external `kindlegen` binary
//! - [`UnavailableConverter`]: stand-in when no generator is installed; every
//!   conversion fails, so jobs still reach Cleanup with a failure status

mod kindlegen;
mod unavailable;

pub use kindlegen::KindlegenConverter;
pub use unavailable::UnavailableConverter;

use crate::config::ConversionConfig;
use crate::error::GenerationError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Turns a normalized HTML document on disk into an e-book file
#[async_trait]
pub trait Converter: Send + Sync {
    /// Convert `document`, returning the path of the generated file
    ///
    /// The output is written next to the input so the job's workspace
    /// removal also removes it.
    async fn convert(&self, document: &Path) -> Result<PathBuf, GenerationError>;

    /// Name of the implementation (for logging)
    fn name(&self) -> &'static str;
}

/// Pick a converter according to configuration
///
/// An explicit `kindlegen_path` wins; otherwise `PATH` is searched when
/// `search_path` is set. Falls back to [`UnavailableConverter`].
pub fn converter_from_config(config: &ConversionConfig) -> Arc<dyn Converter> {
    let converter: Arc<dyn Converter> = if let Some(path) = &config.kindlegen_path {
        Arc::new(KindlegenConverter::new(path.clone()).with_timeout(config.timeout))
    } else if config.search_path {
        match KindlegenConverter::from_path() {
            Some(converter) => Arc::new(converter.with_timeout(config.timeout)),
            None => Arc::new(UnavailableConverter),
        }
    } else {
        Arc::new(UnavailableConverter)
    };

    tracing::info!(converter = converter.name(), "e-book converter initialized");
    converter
}
