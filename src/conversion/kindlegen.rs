//! Converter backed by the external kindlegen binary

use super::Converter;
use crate::error::GenerationError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// How much generator output is kept for error reports
const OUTPUT_TAIL_CHARS: usize = 512;

/// Runs `kindlegen <document> -o <stem>.mobi` in the document's directory
///
/// kindlegen exits non-zero for warnings as well as errors, so success is
/// judged by whether the output file exists afterwards.
///
/// # Examples
///
/// ```no_run
/// use paperboy::conversion::{Converter, KindlegenConverter};
/// use std::path::Path;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let converter = KindlegenConverter::from_path()
///     .expect("kindlegen not found in PATH")
///     .with_timeout(Some(Duration::from_secs(60)));
///
/// let mobi = converter.convert(Path::new("/tmp/job/article.html")).await?;
/// println!("generated {}", mobi.display());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct KindlegenConverter {
    binary_path: PathBuf,
    timeout: Option<Duration>,
}

impl KindlegenConverter {
    /// Create a converter with an explicit binary path and no timeout
    pub fn new(binary_path: PathBuf) -> Self {
        Self {
            binary_path,
            timeout: None,
        }
    }

    /// Attempt to find kindlegen in PATH
    pub fn from_path() -> Option<Self> {
        which::which("kindlegen").ok().map(Self::new)
    }

    /// Bound each run; the child is killed when the bound elapses
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The binary this converter runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }
}

fn output_tail(stdout: &[u8], stderr: &[u8]) -> String {
    let mut combined = String::from_utf8_lossy(stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(stderr));
    let combined = combined.trim();
    let skip = combined.chars().count().saturating_sub(OUTPUT_TAIL_CHARS);
    combined.chars().skip(skip).collect()
}

#[async_trait]
impl Converter for KindlegenConverter {
    async fn convert(&self, document: &Path) -> Result<PathBuf, GenerationError> {
        let invalid = || GenerationError::InvalidInput {
            path: document.to_path_buf(),
        };
        let file_name = document.file_name().ok_or_else(invalid)?;
        let stem = document.file_stem().ok_or_else(invalid)?;
        let dir = match document.parent() {
            Some(parent) if parent.as_os_str().is_empty() => Path::new("."),
            Some(parent) => parent,
            None => return Err(invalid()),
        };

        let output_name = PathBuf::from(stem).with_extension("mobi");
        let output_path = dir.join(&output_name);

        debug!(
            binary = %self.binary_path.display(),
            document = %document.display(),
            "running kindlegen"
        );

        let mut command = Command::new(&self.binary_path);
        command
            .arg(file_name)
            .arg("-o")
            .arg(&output_name)
            .current_dir(dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let run = command.output();
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| GenerationError::TimedOut { after: limit })?,
            None => run.await,
        };
        let output = result.map_err(|e| GenerationError::Spawn {
            binary: self.binary_path.clone(),
            reason: e.to_string(),
        })?;

        if tokio::fs::try_exists(&output_path).await.unwrap_or(false) {
            if !output.status.success() {
                debug!(
                    code = ?output.status.code(),
                    "kindlegen reported warnings but produced output"
                );
            }
            return Ok(output_path);
        }

        Err(GenerationError::Failed {
            code: output.status.code(),
            output: output_tail(&output.stdout, &output.stderr),
        })
    }

    fn name(&self) -> &'static str {
        "kindlegen"
    }
}
