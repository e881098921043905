//! Converter used when no generator is installed

use super::Converter;
use crate::error::GenerationError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Converter that always fails
///
/// Keeps the pipeline running on hosts without `kindlegen`: every job is
/// diverted to Cleanup with a conversion failure instead of stalling.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableConverter;

#[async_trait]
impl Converter for UnavailableConverter {
    async fn convert(&self, _document: &Path) -> Result<PathBuf, GenerationError> {
        Err(GenerationError::Unavailable(
            "e-book conversion requires the kindlegen binary. \
             Configure kindlegen_path or ensure kindlegen is in PATH."
                .into(),
        ))
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}
