use std::sync::Arc;

use dashmap::DashMap;
use snafu::OptionExt as _;
use tracing::instrument;

use super::{ProgressError, ProgressSynchronizer, SessionNotFoundSnafu, SyncHandle, Timing};
use crate::config::ProgressConfig;
use crate::model::{CompletionThreshold, LectureId, ProgressRecord, ProgressState, ProgressUpdate, Session};
use crate::service::replicator::Replicator;

/// A viewing session belongs to the exact session (token included) that
/// opened it. Callers presenting another token never reach it.
type SessionKey = (Session, LectureId);

/// Owner of every open viewing session.
#[derive(Debug, Clone)]
pub struct ProgressSessions {
    sessions: Arc<DashMap<SessionKey, ProgressSynchronizer>>,
    replicator: Replicator,
    timing: Timing,
    threshold: CompletionThreshold,
}

impl ProgressSessions {
    pub fn new(replicator: Replicator, config: &ProgressConfig) -> Self {
        Self {
            sessions: Arc::default(),
            replicator,
            timing: Timing::from(config),
            threshold: config.completion_threshold,
        }
    }

    /// Open a viewing session seeded with the server-provided progress.
    ///
    /// An existing session of the same caller for the same lecture is torn
    /// down first, which flushes whatever it had not synced yet.
    #[instrument(skip(self, session), fields(user = %session.user.id))]
    pub async fn open(
        &self, session: Session, lecture: LectureId, initial_progress: f64,
        threshold: Option<CompletionThreshold>,
    ) -> ProgressState {
        let key: SessionKey = (session.clone(), lecture.clone());

        if let Some((_key, existing)) = self.sessions.remove(&key) {
            tracing::info!("found an existing progress session for lecture `{}`, closing it", lecture);
            existing.close().await;
        }

        let record = ProgressRecord::new(initial_progress, threshold.unwrap_or(self.threshold));
        let state = *record.current();

        let on_exit = {
            let sessions = self.sessions.clone();
            let key = key.clone();

            move || {
                sessions.remove_if(&key, |_, session| session.handle().is_closed());
            }
        };

        let synchronizer = ProgressSynchronizer::spawn(
            session,
            lecture,
            record,
            self.timing,
            self.replicator.clone(),
            on_exit,
        );
        self.sessions.insert(key, synchronizer);

        state
    }

    pub async fn observe(
        &self, session: &Session, lecture: &LectureId, update: ProgressUpdate,
    ) -> Result<ProgressState, ProgressError> {
        let handle = self.handle(session, lecture)?;
        handle.observe(update).await
    }

    pub fn current(&self, session: &Session, lecture: &LectureId) -> Result<ProgressState, ProgressError> {
        self.handle(session, lecture).map(|handle| handle.current())
    }

    /// Tear a session down. Unsynced progress is queued for replication.
    #[instrument(skip(self, session), fields(user = %session.user.id))]
    pub async fn close(&self, session: &Session, lecture: &LectureId) -> Result<(), ProgressError> {
        let key = (session.clone(), lecture.clone());
        let (_key, synchronizer) = self
            .sessions
            .remove(&key)
            .context(SessionNotFoundSnafu {
                lecture: lecture.clone(),
            })?;

        synchronizer.close().await;
        Ok(())
    }

    /// Tear down every viewing session opened with `session`, used on sign-out.
    #[instrument(skip_all, fields(user = %session.user.id))]
    pub async fn close_owned_by(&self, session: &Session) {
        self.close_matching(|(owner, _lecture)| owner == session).await;
    }

    /// Tear down every open session, used on shutdown.
    pub async fn close_all(&self) {
        self.close_matching(|_| true).await;
    }

    async fn close_matching(&self, matches: impl Fn(&SessionKey) -> bool) {
        let keys: Vec<SessionKey> = self
            .sessions
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|key| matches(key))
            .collect();
        tracing::info!(count = keys.len(), "closing progress sessions");

        let closing = keys
            .into_iter()
            .filter_map(|key| self.sessions.remove(&key))
            .map(|(_key, synchronizer)| synchronizer.close());

        futures::future::join_all(closing).await;
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    // never hold a map guard across an await
    fn handle(&self, session: &Session, lecture: &LectureId) -> Result<SyncHandle, ProgressError> {
        let key = (session.clone(), lecture.clone());

        self.sessions
            .get(&key)
            .map(|entry| entry.handle().clone())
            .filter(|handle| !handle.is_closed())
            .context(SessionNotFoundSnafu {
                lecture: lecture.clone(),
            })
    }
}
