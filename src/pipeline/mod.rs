//! Job pipeline orchestration
//!
//! [`Pipeline`] owns the bounded queues between the stages and the worker
//! pools that serve them:
//!
//! ```text
//! submit → [extract] → [convert] → [email] → [cleanup]
//!              │           │          ╰──────────╯
//!              ╰───────────┴── divert ───────────╯
//! ```
//!
//! Every queue has the same capacity. A full queue suspends its producer,
//! so a burst of submissions eventually blocks [`Pipeline::submit`] itself.
//! Shutdown drops the submission sender; each stage drains, its workers
//! exit, and their senders closing ends the next stage in turn.

mod cleanup;
mod stages;
mod worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

use crate::config::Config;
use crate::conversion::{Converter, converter_from_config};
use crate::delivery::{Mailer, PostmarkMailer};
use crate::error::{Error, Result};
use crate::extraction::{Extractor, HttpExtractor};
use crate::status_cache::StatusCache;
use crate::types::{Event, Job, JobKey, Stage, StatusReport, Submission, SubmitResponse};
use crate::validation::Validator;
use stages::{ConvertStage, EmailStage, ExtractStage};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use worker::{Router, spawn_pool};

/// Status written before a job is queued
pub const WORKING_MESSAGE: &str = "Working...";

/// Response message for submissions that arrive during shutdown
pub const SHUTTING_DOWN_MESSAGE: &str = "Sorry, the service is shutting down. Please try again later.";

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// The external collaborators the stages call
#[derive(Clone)]
pub struct Collaborators {
    /// Article fetcher
    pub extractor: Arc<dyn Extractor>,
    /// E-book generator
    pub converter: Arc<dyn Converter>,
    /// Mail sender
    pub mailer: Arc<dyn Mailer>,
}

impl Collaborators {
    /// Production collaborators built from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            extractor: Arc::new(HttpExtractor::new(&config.extraction)?),
            converter: converter_from_config(&config.conversion),
            mailer: Arc::new(PostmarkMailer::new(&config.delivery)?),
        })
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("extractor", &self.extractor.name())
            .field("converter", &self.converter.name())
            .field("mailer", &self.mailer.name())
            .finish()
    }
}

/// Running pipeline (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<Config>,
    cache: StatusCache,
    validator: Arc<Validator>,
    /// Extraction queue sender; taken on shutdown
    intake: Arc<RwLock<Option<mpsc::Sender<Job>>>>,
    accepting_new: Arc<AtomicBool>,
    event_tx: broadcast::Sender<Event>,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
    sweeper: Arc<Mutex<Option<JoinHandle<()>>>>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Start a pipeline with the production collaborators
    pub async fn new(config: Config) -> Result<Self> {
        let collaborators = Collaborators::from_config(&config)?;
        Self::start(config, collaborators).await
    }

    /// Start a pipeline with explicit collaborators
    ///
    /// Validates the configuration, creates the work directory, and spawns
    /// the worker pools and the status cache sweeper.
    pub async fn start(config: Config, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        tokio::fs::create_dir_all(&config.pipeline.work_dir).await?;

        let capacity = config.pipeline.queue_capacity;
        let workers = &config.pipeline.workers;
        let cache = StatusCache::new(config.status.ttl);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let (intake_tx, intake_rx) = mpsc::channel(capacity);
        let (convert_tx, convert_rx) = mpsc::channel(capacity);
        let (email_tx, email_rx) = mpsc::channel(capacity);
        let (cleanup_tx, cleanup_rx) = mpsc::channel(capacity);

        let Collaborators {
            extractor,
            converter,
            mailer,
        } = collaborators;

        tracing::info!(
            extractor = extractor.name(),
            converter = converter.name(),
            mailer = mailer.name(),
            queue_capacity = capacity,
            "starting pipeline"
        );

        let mut handles = Vec::new();
        handles.extend(spawn_pool(
            Arc::new(ExtractStage::new(extractor)),
            workers.extract,
            intake_rx,
            Router::new(Stage::Extract, convert_tx, cleanup_tx.clone(), event_tx.clone()),
        ));
        handles.extend(spawn_pool(
            Arc::new(ConvertStage::new(converter)),
            workers.convert,
            convert_rx,
            Router::new(Stage::Convert, email_tx, cleanup_tx.clone(), event_tx.clone()),
        ));
        // Email forwards delivered jobs to Cleanup as well
        handles.extend(spawn_pool(
            Arc::new(EmailStage::new(mailer, event_tx.clone())),
            workers.email,
            email_rx,
            Router::new(Stage::Email, cleanup_tx.clone(), cleanup_tx, event_tx.clone()),
        ));
        handles.extend(cleanup::spawn_pool(
            workers.cleanup,
            cleanup_rx,
            event_tx.clone(),
        ));

        let cancel = CancellationToken::new();
        let sweeper = cache.spawn_sweeper(config.status.sweep_interval, cancel.clone());

        tracing::info!(workers = handles.len(), "pipeline started");

        Ok(Self {
            validator: Arc::new(Validator::new(&config.validation.blacklist)),
            config: Arc::new(config),
            cache,
            intake: Arc::new(RwLock::new(Some(intake_tx))),
            accepting_new: Arc::new(AtomicBool::new(true)),
            event_tx,
            workers: Arc::new(Mutex::new(handles)),
            sweeper: Arc::new(Mutex::new(Some(sweeper))),
            cancel,
        })
    }

    /// Validate a submission and queue it for extraction
    ///
    /// On success the job's status is already "Working..." when this returns.
    /// Waits while the extraction queue is full.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if the email or URL is rejected (nothing is queued or cached)
    /// - [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) has begun
    pub async fn submit(&self, submission: Submission) -> Result<JobKey> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let url = self
            .validator
            .validate(&submission.email, &submission.url)?;

        // Clone out so a blocked send doesn't hold the lock shutdown needs
        let intake = self
            .intake
            .read()
            .await
            .clone()
            .ok_or(Error::ShuttingDown)?;

        let key = JobKey::generate();
        let progress = self.cache.progress(key);
        progress.report(WORKING_MESSAGE);

        let job = Job::new(
            key,
            submission.email.trim().to_string(),
            url,
            submission.content,
            self.config.pipeline.work_dir.join(key.to_string()),
            progress,
        );

        if intake.send(job).await.is_err() {
            self.cache.remove(&key.to_string());
            return Err(Error::ShuttingDown);
        }

        tracing::info!(job = %key, "job queued");
        self.event_tx.send(Event::Queued { key }).ok();
        Ok(key)
    }

    /// Submit and render the client-facing response
    ///
    /// Rejections carry the validation message and no ID.
    pub async fn submit_for_client(&self, submission: Submission) -> SubmitResponse {
        match self.submit(submission).await {
            Ok(key) => SubmitResponse::accepted(key),
            Err(Error::Validation(e)) => SubmitResponse::rejected(e.to_string()),
            Err(Error::ShuttingDown) => SubmitResponse::rejected(SHUTTING_DOWN_MESSAGE),
            Err(e) => {
                tracing::error!(error = %e, "submission failed");
                SubmitResponse::rejected("Error: the article could not be submitted.")
            }
        }
    }

    /// Answer a status poll for `key`
    pub fn lookup(&self, key: &str) -> StatusReport {
        self.cache.lookup(key)
    }

    /// The shared status cache
    pub fn status_cache(&self) -> &StatusCache {
        &self.cache
    }

    /// Subscribe to pipeline events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Configuration the pipeline was started with
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Whether submissions are still accepted
    pub fn is_accepting(&self) -> bool {
        self.accepting_new.load(Ordering::SeqCst)
    }

    /// Gracefully shut the pipeline down
    ///
    /// 1. Stops accepting submissions
    /// 2. Closes the extraction queue so every stage drains in order
    /// 3. Waits up to `pipeline.shutdown_timeout`, then aborts remaining workers
    /// 4. Stops the status cache sweeper and emits [`Event::Shutdown`]
    ///
    /// Calling it again after the first call is a no-op.
    pub async fn shutdown(&self) -> Result<()> {
        if !self.accepting_new.swap(false, Ordering::SeqCst) {
            tracing::debug!("shutdown already in progress");
            return Ok(());
        }
        tracing::info!("Initiating graceful shutdown");

        self.intake.write().await.take();
        tracing::info!("Stopped accepting new jobs");

        let handles = std::mem::take(&mut *self.workers.lock().await);
        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        let timeout = self.config.pipeline.shutdown_timeout;

        match tokio::time::timeout(timeout, futures::future::join_all(handles)).await {
            Ok(results) => {
                let panicked = results.iter().filter(|r| r.is_err()).count();
                if panicked > 0 {
                    tracing::warn!(panicked, "some workers ended abnormally");
                }
                tracing::info!("All queued jobs drained");
            }
            Err(_) => {
                tracing::warn!(?timeout, "Timeout waiting for queued jobs, aborting workers");
                for abort in aborts {
                    abort.abort();
                }
            }
        }

        self.cancel.cancel();
        if let Some(sweeper) = self.sweeper.lock().await.take() {
            sweeper.await.ok();
        }

        self.event_tx.send(Event::Shutdown).ok();
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Spawn the HTTP API server in the background
    pub fn spawn_api_server(&self) -> JoinHandle<Result<()>> {
        let pipeline = Arc::new(self.clone());
        let config = self.config.clone();
        tokio::spawn(async move { crate::api::start_api_server(pipeline, config).await })
    }
}
