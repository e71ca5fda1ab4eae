//! Lecture progress synchronization.
//!
//! Each open viewing session is a [ProgressSynchronizer] task that merges
//! observations from the player and replicates the merged state after a
//! quiet period. [ProgressSessions] owns all of them.

use async_trait::async_trait;
use snafu::Snafu;

use crate::model::{LectureId, LectureProgress, ProgressPayload, Session};
use crate::service::api;

pub use sessions::*;
pub use synchronizer::*;

mod sessions;
mod synchronizer;

/// Remote store of lecture progress.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn update_progress(
        &self, session: &Session, lecture: &LectureId, payload: &ProgressPayload,
    ) -> api::Result<LectureProgress>;

    async fn mark_complete(&self, session: &Session, lecture: &LectureId) -> api::Result<()>;
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProgressError {
    #[snafu(display("no progress session is open for lecture `{lecture}`"))]
    SessionNotFound { lecture: LectureId },

    #[snafu(display("the progress session for lecture `{lecture}` has already closed"))]
    SessionClosed { lecture: LectureId },
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use reqwest::StatusCode;

    use super::*;
    use crate::model::{Role, SessionUser};
    use crate::service::api::ApiError;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum StoreCall {
        Update(f64),
        Complete,
    }

    /// In-memory [ProgressStore] that records every call.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct RecordingStore {
        calls: Arc<Mutex<Vec<StoreCall>>>,
        fail: Arc<AtomicBool>,
        delay: Duration,
    }

    impl RecordingStore {
        /// Progress writes take `delay` to complete.
        pub(crate) fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        pub(crate) fn failing() -> Self {
            let store = Self::default();
            store.set_failing(true);
            store
        }

        pub(crate) fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        pub(crate) fn calls(&self) -> Vec<StoreCall> {
            self.calls.lock().unwrap().clone()
        }

        pub(crate) fn updates(&self) -> Vec<f64> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    StoreCall::Update(progress) => Some(progress),
                    StoreCall::Complete => None,
                })
                .collect()
        }

        pub(crate) fn completions(&self) -> usize {
            self.calls()
                .iter()
                .filter(|call| **call == StoreCall::Complete)
                .count()
        }

        fn outcome(&self) -> api::Result<()> {
            if !self.fail.load(Ordering::SeqCst) {
                return Ok(());
            }

            Err(ApiError::Status {
                endpoint: "http://api.test/".parse().unwrap(),
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: "unavailable".into(),
            })
        }
    }

    #[async_trait]
    impl ProgressStore for RecordingStore {
        async fn update_progress(
            &self, _session: &Session, _lecture: &LectureId, payload: &ProgressPayload,
        ) -> api::Result<LectureProgress> {
            self.calls.lock().unwrap().push(StoreCall::Update(payload.progress));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.outcome()?;

            Ok(LectureProgress {
                progress: payload.progress,
                current_time: payload.current_time,
                current_page: payload.current_page,
                current_slide: payload.current_slide,
                is_completed: false,
                updated_at: None,
            })
        }

        async fn mark_complete(&self, _session: &Session, _lecture: &LectureId) -> api::Result<()> {
            self.calls.lock().unwrap().push(StoreCall::Complete);
            self.outcome()
        }
    }

    pub(crate) fn student_session(id: &str) -> Session {
        Session::new(
            format!("token-{id}"),
            SessionUser {
                id: id.into(),
                role: Role::Student,
            },
        )
    }
}
