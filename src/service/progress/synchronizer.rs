use std::time::Duration;

use snafu::OptionExt as _;
use tokio::select;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::instrument;

use super::{ProgressError, SessionClosedSnafu};
use crate::config::ProgressConfig;
use crate::model::{LectureId, ProgressRecord, ProgressState, ProgressUpdate, Session};
use crate::service::replicator::{Replicator, SyncJob, SyncReport};

/// Timers of a viewing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Quiet period after the last observation before the state is replicated.
    pub debounce: Duration,
    /// Quiet period after which the session tears itself down.
    pub idle_timeout: Duration,
}

impl From<&ProgressConfig> for Timing {
    fn from(config: &ProgressConfig) -> Self {
        Self {
            debounce: config.debounce,
            idle_timeout: config.idle_timeout,
        }
    }
}

#[derive(Debug)]
enum Command {
    Observe {
        update: ProgressUpdate,
        reply: oneshot::Sender<ProgressState>,
    },
    Close,
}

/// Cheap handle for talking to a running synchronizer.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    lecture: LectureId,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ProgressState>,
}

impl SyncHandle {
    /// Merge an observation and restart the debounce window.
    pub async fn observe(&self, update: ProgressUpdate) -> Result<ProgressState, ProgressError> {
        let (reply, merged) = oneshot::channel();

        self.commands
            .send(Command::Observe { update, reply })
            .ok()
            .context(SessionClosedSnafu {
                lecture: self.lecture.clone(),
            })?;

        merged.await.ok().context(SessionClosedSnafu {
            lecture: self.lecture.clone(),
        })
    }

    /// The merged state as of the last observation.
    pub fn current(&self) -> ProgressState {
        *self.state.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// A running viewing session for one (student, lecture) pair.
#[derive(Debug)]
pub struct ProgressSynchronizer {
    handle: SyncHandle,
    task: JoinHandle<()>,
}

impl ProgressSynchronizer {
    /// Start the session task. `on_exit` runs once the task has finished,
    /// after the final sync has been queued.
    pub fn spawn(
        session: Session, lecture: LectureId, record: ProgressRecord, timing: Timing,
        replicator: Replicator, on_exit: impl FnOnce() + Send + 'static,
    ) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (state, state_receiver) = watch::channel(*record.current());
        let (acks, ack_receiver) = mpsc::unbounded_channel();

        let worker = Worker {
            session,
            lecture: lecture.clone(),
            record,
            timing,
            replicator,
            state,
            acks,
            in_flight: false,
            deferred: false,
        };

        let task = tokio::spawn(async move {
            worker.run(receiver, ack_receiver).await;
            on_exit();
        });

        let handle = SyncHandle {
            lecture,
            commands,
            state: state_receiver,
        };

        Self { handle, task }
    }

    pub fn handle(&self) -> &SyncHandle {
        &self.handle
    }

    /// Tear the session down and wait until the final sync has been queued.
    pub async fn close(self) {
        let _ = self.handle.commands.send(Command::Close);

        if let Err(error) = self.task.await {
            tracing::error!(lecture = %self.handle.lecture, %error, "progress session task failed");
        }
    }
}

struct Worker {
    session: Session,
    lecture: LectureId,
    record: ProgressRecord,
    timing: Timing,
    replicator: Replicator,
    state: watch::Sender<ProgressState>,
    acks: mpsc::UnboundedSender<SyncReport>,
    /// An acknowledged write has not reported back yet.
    in_flight: bool,
    /// The debounce fired while a write was in flight.
    deferred: bool,
}

impl Worker {
    #[instrument(skip_all, fields(lecture = %self.lecture, user = %self.session.user.id))]
    async fn run(
        mut self, mut commands: mpsc::UnboundedReceiver<Command>,
        mut acks: mpsc::UnboundedReceiver<SyncReport>,
    ) {
        tracing::info!(progress = self.record.current().progress, "progress session opened");

        let debounce = sleep(self.timing.debounce);
        let idle = sleep(self.timing.idle_timeout);
        tokio::pin!(debounce, idle);

        let mut scheduled = false;

        loop {
            select! {
                command = commands.recv() => match command {
                    Some(Command::Observe { update, reply }) => {
                        let merged = self.record.observe(update);
                        self.state.send_replace(merged);
                        let _ = reply.send(merged);

                        let now = Instant::now();
                        debounce.as_mut().reset(now + self.timing.debounce);
                        idle.as_mut().reset(now + self.timing.idle_timeout);
                        scheduled = true;
                    }
                    Some(Command::Close) | None => break,
                },

                Some(report) = acks.recv() => self.settle(report),

                () = &mut debounce, if scheduled => {
                    scheduled = false;

                    if self.in_flight {
                        self.deferred = true;
                    } else {
                        self.sync(true);
                    }
                }

                () = &mut idle => {
                    tracing::info!("progress session went idle");
                    break;
                }
            }
        }

        // teardown: fire and forget, nobody is left to acknowledge
        self.sync(false);
        tracing::info!(progress = self.record.current().progress, "progress session closed");
    }

    fn settle(&mut self, report: SyncReport) {
        match report {
            SyncReport::Stored(sync) => self.record.mark_synced(&sync),
            SyncReport::Failed(sync) => self.record.mark_failed(&sync),
        }

        self.in_flight = false;

        if self.deferred {
            self.deferred = false;
            self.sync(true);
        }
    }

    fn sync(&mut self, acknowledge: bool) {
        let Some(sync) = self.record.pending_sync() else {
            tracing::trace!("progress unchanged since last sync");
            return;
        };

        tracing::debug!(progress = sync.state.progress, completes = sync.completes, "replicating progress");

        let submitted = self.replicator.submit(SyncJob {
            session: self.session.clone(),
            lecture: self.lecture.clone(),
            sync,
            ack: acknowledge.then(|| self.acks.clone()),
        });

        if submitted {
            self.record.mark_submitted(&sync);
            self.in_flight = acknowledge;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::CompletionThreshold;
    use crate::service::progress::testing::{student_session, RecordingStore};

    const TIMING: Timing = Timing {
        debounce: Duration::from_secs(2),
        idle_timeout: Duration::from_secs(60 * 30),
    };

    fn start(store: &RecordingStore, initial: f64) -> ProgressSynchronizer {
        let (replicator, _worker) = Replicator::spawn(Arc::new(store.clone()), 16, 4);
        let record = ProgressRecord::new(initial, CompletionThreshold::DEFAULT);

        ProgressSynchronizer::spawn(student_session("s-1"), "lec-1".into(), record, TIMING, replicator, || {})
    }

    async fn wait(millis: u64) {
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_observations_syncs_once() {
        let store = RecordingStore::default();
        let sync = start(&store, 0.0);

        for progress in [10.0, 20.0, 30.0, 40.0, 50.0] {
            sync.handle().observe(ProgressUpdate::progress(progress)).await.unwrap();
            wait(200).await;
        }

        assert!(store.calls().is_empty(), "nothing is sent while observations keep arriving");

        wait(2_000).await;
        assert_eq!(store.updates(), vec![50.0], "one sync after the quiet period");

        wait(10_000).await;
        assert_eq!(store.updates(), vec![50.0], "an unchanged state is not sent again");
    }

    #[tokio::test(start_paused = true)]
    async fn regression_then_completion_scenario() {
        let store = RecordingStore::default();
        let sync = start(&store, 0.0);

        sync.handle().observe(ProgressUpdate::progress(30.0)).await.unwrap();
        let merged = sync.handle().observe(ProgressUpdate::progress(20.0)).await.unwrap();
        assert_eq!(merged.progress, 30.0);

        wait(2_100).await;
        assert_eq!(store.updates(), vec![30.0]);
        assert_eq!(store.completions(), 0);
        assert!(!sync.handle().current().is_completed);

        sync.handle().observe(ProgressUpdate::progress(95.0)).await.unwrap();
        wait(2_100).await;

        assert_eq!(store.updates(), vec![30.0, 95.0]);
        assert_eq!(store.completions(), 1, "mark-complete is sent exactly once");
        assert!(sync.handle().current().is_completed);

        sync.handle().observe(ProgressUpdate::progress(99.0)).await.unwrap();
        wait(2_100).await;
        assert_eq!(store.completions(), 1, "later syncs do not repeat mark-complete");
    }

    #[tokio::test(start_paused = true)]
    async fn close_flushes_unsynced_state_once() {
        let store = RecordingStore::default();
        let sync = start(&store, 10.0);

        sync.handle().observe(ProgressUpdate::progress(35.0)).await.unwrap();
        sync.handle().observe(ProgressUpdate::progress(40.0)).await.unwrap();
        sync.close().await;
        wait(10).await;

        assert_eq!(store.updates(), vec![40.0], "teardown sends the latest state once");
    }

    #[tokio::test(start_paused = true)]
    async fn close_without_changes_sends_nothing() {
        let store = RecordingStore::default();
        let sync = start(&store, 10.0);

        sync.handle().observe(ProgressUpdate::progress(5.0)).await.unwrap();
        sync.close().await;
        wait(10).await;

        assert!(store.calls().is_empty(), "a regression leaves nothing to sync");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_sync_is_resent_by_the_next_cycle() {
        let store = RecordingStore::failing();
        let sync = start(&store, 0.0);

        sync.handle().observe(ProgressUpdate::progress(30.0)).await.unwrap();
        wait(2_100).await;
        assert_eq!(store.updates(), vec![30.0]);

        store.set_failing(false);
        sync.handle().observe(ProgressUpdate { current_page: Some(3), ..Default::default() }).await.unwrap();
        wait(2_100).await;

        assert_eq!(store.updates(), vec![30.0, 30.0], "the full state is sent again");

        sync.close().await;
        wait(10).await;
        assert_eq!(store.updates(), vec![30.0, 30.0], "nothing left to flush after a successful sync");
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_state_is_not_sent_again() {
        let store = RecordingStore::default();
        let sync = start(&store, 0.0);

        sync.handle().observe(ProgressUpdate::progress(30.0)).await.unwrap();
        wait(2_100).await;
        assert_eq!(store.updates(), vec![30.0]);

        sync.handle().observe(ProgressUpdate::progress(20.0)).await.unwrap();
        sync.handle().observe(ProgressUpdate::progress(30.0)).await.unwrap();
        wait(2_100).await;

        assert_eq!(store.updates(), vec![30.0], "the debounce fired with nothing new to send");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_completion_is_marked_once() {
        let store = RecordingStore::slow(Duration::from_secs(3));
        let sync = start(&store, 0.0);

        sync.handle().observe(ProgressUpdate::progress(95.0)).await.unwrap();
        wait(2_100).await;
        sync.handle()
            .observe(ProgressUpdate {
                current_time: Some(1.0),
                ..Default::default()
            })
            .await
            .unwrap();
        wait(10_000).await;

        assert_eq!(store.updates(), vec![95.0, 95.0], "the later change waits for the first write");
        assert_eq!(store.completions(), 1);

        sync.close().await;
        wait(5_000).await;
        assert_eq!(store.completions(), 1, "teardown does not repeat mark-complete");
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_during_a_slow_completion_does_not_repeat_it() {
        let store = RecordingStore::slow(Duration::from_secs(3));
        let sync = start(&store, 0.0);

        sync.handle().observe(ProgressUpdate::progress(95.0)).await.unwrap();
        wait(2_100).await;
        sync.handle().observe(ProgressUpdate::progress(97.0)).await.unwrap();
        sync.close().await;
        wait(10_000).await;

        assert_eq!(store.updates(), vec![95.0, 97.0]);
        assert_eq!(store.completions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_tears_itself_down() {
        let store = RecordingStore::default();
        let (replicator, _worker) = Replicator::spawn(Arc::new(store.clone()), 16, 4);
        let record = ProgressRecord::new(0.0, CompletionThreshold::DEFAULT);
        let (exited, exit) = oneshot::channel();
        let timing = Timing {
            debounce: Duration::from_secs(2),
            idle_timeout: Duration::from_secs(60),
        };

        let sync = ProgressSynchronizer::spawn(student_session("s-1"), "lec-1".into(), record, timing, replicator, move || {
            let _ = exited.send(());
        });

        sync.handle().observe(ProgressUpdate::progress(12.0)).await.unwrap();
        exit.await.unwrap();

        assert!(sync.handle().is_closed());
        assert_eq!(store.updates(), vec![12.0]);

        let error = sync.handle().observe(ProgressUpdate::progress(20.0)).await.unwrap_err();
        assert!(matches!(error, ProgressError::SessionClosed { .. }));
    }
}
