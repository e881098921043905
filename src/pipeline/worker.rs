//! Stage workers, outcome routing and panic isolation
//!
//! A stage only transforms its input into a [`StageOutcome`]. It never sees a
//! queue. The [`Router`] owned by each worker turns the outcome into exactly
//! one send: forward to the next stage, or divert to Cleanup after
//! publishing the failure status. A job therefore cannot leave a stage
//! without being routed somewhere.

use crate::error::StageError;
use crate::status_cache::Progress;
use crate::types::{Event, Job, JobKey, Stage};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// What Cleanup needs from a job
#[derive(Debug)]
pub(crate) struct Remains {
    pub(crate) key: JobKey,
    pub(crate) workspace: PathBuf,
    pub(crate) progress: Progress,
}

impl Remains {
    /// Copy the cleanup-relevant parts of a job that is still in flight
    pub(crate) fn of(job: &Job) -> Self {
        Self {
            key: job.key(),
            workspace: job.workspace().to_path_buf(),
            progress: job.progress().clone(),
        }
    }
}

impl From<Job> for Remains {
    fn from(job: Job) -> Self {
        Self::of(&job)
    }
}

/// A job on its way to Cleanup
#[derive(Debug)]
pub(crate) struct CleanupTicket {
    pub(crate) remains: Remains,
    pub(crate) delivered: bool,
}

impl CleanupTicket {
    pub(crate) fn delivered(job: Job) -> Self {
        Self {
            remains: job.into(),
            delivered: true,
        }
    }

    pub(crate) fn failed(remains: Remains) -> Self {
        Self {
            remains,
            delivered: false,
        }
    }
}

/// A job a stage gave up on, with the reason
#[derive(Debug)]
pub(crate) struct Diverted {
    pub(crate) job: Job,
    pub(crate) error: StageError,
}

/// Result of one stage operation
#[derive(Debug)]
pub(crate) enum StageOutcome<T> {
    /// Hand the value to the next stage
    Forward(T),
    /// Skip the remaining stages and go straight to Cleanup
    Divert(Diverted),
}

impl<T> StageOutcome<T> {
    pub(crate) fn divert(job: Job, error: impl Into<StageError>) -> Self {
        StageOutcome::Divert(Diverted {
            job,
            error: error.into(),
        })
    }
}

/// One forward stage of the pipeline
#[async_trait]
pub(crate) trait StageWorker: Send + Sync + 'static {
    /// Value taken from this stage's queue
    type Input: Send + 'static;
    /// Value sent to the next stage's queue
    type Output: Send + 'static;

    /// Which stage this is
    const STAGE: Stage;

    /// The job carried by an input
    fn job(input: &Self::Input) -> &Job;

    /// Process one input
    async fn process(&self, input: Self::Input) -> StageOutcome<Self::Output>;
}

/// Sends stage outcomes to the right queue
pub(crate) struct Router<T> {
    stage: Stage,
    forward: mpsc::Sender<T>,
    cleanup: mpsc::Sender<CleanupTicket>,
    event_tx: broadcast::Sender<Event>,
}

impl<T> Clone for Router<T> {
    fn clone(&self) -> Self {
        Self {
            stage: self.stage,
            forward: self.forward.clone(),
            cleanup: self.cleanup.clone(),
            event_tx: self.event_tx.clone(),
        }
    }
}

impl<T: Send + 'static> Router<T> {
    pub(crate) fn new(
        stage: Stage,
        forward: mpsc::Sender<T>,
        cleanup: mpsc::Sender<CleanupTicket>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            stage,
            forward,
            cleanup,
            event_tx,
        }
    }

    /// Send `value` to the next stage, or to Cleanup if that stage is gone
    async fn forward(&self, remains: Remains, value: T) {
        // Blocks while the next queue is full
        if self.forward.send(value).await.is_err() {
            self.divert(remains, StageError::Unroutable { stage: self.stage }).await;
        }
    }

    /// Publish the failure status, then queue the job for Cleanup
    async fn divert(&self, remains: Remains, error: StageError) {
        let key = remains.key;
        warn!(job = %key, stage = %self.stage, error = %error, "job diverted to cleanup");

        remains.progress.report(error.status_message());
        self.event_tx
            .send(Event::Diverted {
                key,
                stage: self.stage,
                reason: error.to_string(),
            })
            .ok();

        if self
            .cleanup
            .send(CleanupTicket::failed(remains))
            .await
            .is_err()
        {
            error!(job = %key, stage = %self.stage, "cleanup queue closed, job dropped");
        }
    }
}

/// Take the next item from a queue shared by several workers
///
/// The lock is held only while waiting, so items leave the queue in FIFO order.
pub(crate) async fn next_from<T>(inbox: &Mutex<mpsc::Receiver<T>>) -> Option<T> {
    inbox.lock().await.recv().await
}

/// Best-effort text of a panic payload
pub(crate) fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Spawn `workers` tasks that all serve `inbox` with `stage`
pub(crate) fn spawn_pool<S: StageWorker>(
    stage: Arc<S>,
    workers: usize,
    inbox: mpsc::Receiver<S::Input>,
    router: Router<S::Output>,
) -> Vec<JoinHandle<()>> {
    let inbox = Arc::new(Mutex::new(inbox));
    (0..workers)
        .map(|worker| {
            let stage = stage.clone();
            let inbox = inbox.clone();
            let router = router.clone();
            tokio::spawn(async move { run_worker(stage, worker, inbox, router).await })
        })
        .collect()
}

async fn run_worker<S: StageWorker>(
    stage: Arc<S>,
    worker: usize,
    inbox: Arc<Mutex<mpsc::Receiver<S::Input>>>,
    router: Router<S::Output>,
) {
    debug!(stage = %S::STAGE, worker, "stage worker started");

    while let Some(input) = next_from(&inbox).await {
        // Kept so a panicking job can still be cleaned up
        let remains = Remains::of(S::job(&input));
        let key = remains.key;

        match AssertUnwindSafe(stage.process(input)).catch_unwind().await {
            Ok(StageOutcome::Forward(output)) => router.forward(remains, output).await,
            Ok(StageOutcome::Divert(Diverted { job, error })) => {
                router.divert(job.into(), error).await
            }
            Err(payload) => {
                let detail = panic_detail(payload.as_ref());
                error!(job = %key, stage = %S::STAGE, worker, panic = %detail, "stage panicked");
                router
                    .divert(
                        remains,
                        StageError::Panicked {
                            stage: S::STAGE,
                            detail,
                        },
                    )
                    .await;
            }
        }
    }

    debug!(stage = %S::STAGE, worker, "stage queue closed, worker stopping");
}
