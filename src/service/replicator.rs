//! Best-effort background replication of lecture progress.
//!
//! Jobs go through a bounded queue drained by one worker task that runs up to
//! `concurrency` jobs at a time. Nothing is retried: a job that fails is
//! logged and reported back, and the owning session stays dirty so its next
//! debounce cycle sends the full state again.

use std::sync::Arc;

use futures::StreamExt as _;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::model::{LectureId, PendingSync, ProgressPayload, Session};
use crate::service::progress::ProgressStore;

/// One write of a session's state to the remote store.
#[derive(Debug)]
pub struct SyncJob {
    pub session: Session,
    pub lecture: LectureId,
    pub sync: PendingSync,
    /// Receives the outcome of the job.
    pub ack: Option<mpsc::UnboundedSender<SyncReport>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncReport {
    /// Every request of the job succeeded.
    Stored(PendingSync),
    Failed(PendingSync),
}

#[derive(Debug, Clone)]
pub struct Replicator {
    jobs: mpsc::Sender<SyncJob>,
}

impl Replicator {
    /// Start the worker. It stops once every [Replicator] clone is dropped and
    /// the queue is drained.
    pub fn spawn(
        store: Arc<dyn ProgressStore>, capacity: usize, concurrency: usize,
    ) -> (Self, JoinHandle<()>) {
        let (jobs, queue) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(store, queue, concurrency.max(1)));

        (Self { jobs }, worker)
    }

    /// Queue a job without waiting. Returns `false` when the job was dropped.
    pub fn submit(&self, job: SyncJob) -> bool {
        match self.jobs.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                tracing::warn!(lecture = %job.lecture, progress = job.sync.state.progress, "replication queue is full, dropping progress write");
                false
            }
            Err(TrySendError::Closed(job)) => {
                tracing::warn!(lecture = %job.lecture, progress = job.sync.state.progress, "replication queue is closed, dropping progress write");
                false
            }
        }
    }
}

async fn run_worker(store: Arc<dyn ProgressStore>, mut queue: mpsc::Receiver<SyncJob>, concurrency: usize) {
    futures::stream::poll_fn(|cx| queue.poll_recv(cx))
        .for_each_concurrent(concurrency, |job| replicate(store.as_ref(), job))
        .await;

    tracing::debug!("replication queue drained");
}

#[instrument(skip_all, fields(lecture = %job.lecture, user = %job.session.user.id))]
async fn replicate(store: &dyn ProgressStore, job: SyncJob) {
    let SyncJob {
        session,
        lecture,
        sync,
        ack,
    } = job;

    let report = if store_sync(store, &session, &lecture, &sync).await {
        SyncReport::Stored(sync)
    } else {
        SyncReport::Failed(sync)
    };

    if let Some(ack) = ack {
        let _ = ack.send(report);
    }
}

async fn store_sync(store: &dyn ProgressStore, session: &Session, lecture: &LectureId, sync: &PendingSync) -> bool {
    let payload = ProgressPayload::from(&sync.state);

    if let Err(error) = store.update_progress(session, lecture, &payload).await {
        tracing::warn!(%error, progress = payload.progress, "could not store lecture progress");
        return false;
    }

    if sync.completes {
        if let Err(error) = store.mark_complete(session, lecture).await {
            tracing::warn!(%error, "could not mark lecture as completed");
            return false;
        }

        tracing::info!("lecture completed");
    }

    tracing::debug!(progress = payload.progress, "lecture progress stored");
    true
}
