//! Cleanup stage: the convergence point for every job

use super::worker::{CleanupTicket, next_from, panic_detail};
use crate::error::CleanupError;
use crate::status_cache::is_terminal;
use crate::types::Event;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Published when a job reaches Cleanup without a terminal status
pub(crate) const UNREPORTED: &str = "Error: the job ended without reporting a result.";

/// Remove a job's workspace directory and everything in it
///
/// A workspace that was never created is not an error.
pub(crate) async fn remove_workspace(workspace: &Path) -> Result<(), CleanupError> {
    match tokio::fs::remove_dir_all(workspace).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(CleanupError {
            path: workspace.to_path_buf(),
            source,
        }),
    }
}

/// Release a job's resources and end its lifecycle
///
/// Never fails: removal errors are logged, and the upstream status message
/// is kept unless it is missing or not terminal.
pub(crate) async fn clean(ticket: CleanupTicket, event_tx: &broadcast::Sender<Event>) {
    let CleanupTicket { remains, delivered } = ticket;
    let key = remains.key;

    debug!(job = %key, workspace = %remains.workspace.display(), "running cleanup stage");

    if let Err(e) = remove_workspace(&remains.workspace).await {
        warn!(job = %key, error = %e, "failed to remove job workspace");
    }

    if !remains
        .progress
        .current()
        .is_some_and(|message| is_terminal(&message))
    {
        warn!(job = %key, "job reached cleanup without a terminal status");
        remains.progress.report(UNREPORTED);
    }

    event_tx.send(Event::Cleaned { key, delivered }).ok();
    debug!(job = %key, delivered, "job finished");
}

/// Spawn `workers` cleanup tasks sharing `inbox`
pub(crate) fn spawn_pool(
    workers: usize,
    inbox: mpsc::Receiver<CleanupTicket>,
    event_tx: broadcast::Sender<Event>,
) -> Vec<JoinHandle<()>> {
    let inbox = Arc::new(Mutex::new(inbox));
    (0..workers)
        .map(|worker| {
            let inbox = inbox.clone();
            let event_tx = event_tx.clone();
            tokio::spawn(async move {
                debug!(stage = "cleanup", worker, "stage worker started");
                while let Some(ticket) = next_from(&inbox).await {
                    let key = ticket.remains.key;
                    if let Err(payload) = AssertUnwindSafe(clean(ticket, &event_tx))
                        .catch_unwind()
                        .await
                    {
                        error!(
                            job = %key,
                            worker,
                            panic = %panic_detail(payload.as_ref()),
                            "cleanup panicked"
                        );
                    }
                }
                debug!(stage = "cleanup", worker, "stage queue closed, worker stopping");
            })
        })
        .collect()
}
