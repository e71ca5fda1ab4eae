use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Progress percentage at which a lecture counts as completed.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionThreshold(f64);

impl CompletionThreshold {
    pub const DEFAULT: CompletionThreshold = CompletionThreshold(90.0);

    /// Clamps the threshold into `[0, 100]`. Non-finite values fall back to the default.
    pub fn new(percent: f64) -> Self {
        if percent.is_finite() {
            Self(percent.clamp(0.0, 100.0))
        } else {
            Self::DEFAULT
        }
    }

    pub fn percent(self) -> f64 {
        self.0
    }

    pub fn is_reached(self, progress: f64) -> bool {
        progress >= self.0
    }
}

impl std::str::FromStr for CompletionThreshold {
    type Err = std::num::ParseFloatError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        input.parse().map(Self::new)
    }
}

impl Default for CompletionThreshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Viewing progress of one student on one lecture.
///
/// Only one of the positional markers is meaningful for a given lecture:
/// `current_time` for videos, `current_page` for documents and
/// `current_slide` for slide decks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_slide: Option<u32>,
    pub is_completed: bool,
}

impl ProgressState {
    pub fn initial(progress: f64, threshold: CompletionThreshold) -> Self {
        Self {
            progress,
            current_time: None,
            current_page: None,
            current_slide: None,
            is_completed: threshold.is_reached(progress),
        }
    }
}

/// A partial observation reported by a lecture player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    #[validate(range(min = 0.0, max = 100.0))]
    pub progress: Option<f64>,
    #[validate(range(min = 0.0))]
    pub current_time: Option<f64>,
    pub current_page: Option<u32>,
    pub current_slide: Option<u32>,
    pub is_completed: Option<bool>,
}

impl ProgressUpdate {
    pub fn progress(progress: f64) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }
}

/// Payload of the remote progress update endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPayload {
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_slide: Option<u32>,
}

impl From<&ProgressState> for ProgressPayload {
    fn from(state: &ProgressState) -> Self {
        Self {
            progress: state.progress,
            current_time: state.current_time,
            current_page: state.current_page,
            current_slide: state.current_slide,
        }
    }
}

/// Progress record as stored by the remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LectureProgress {
    pub progress: f64,
    #[serde(default)]
    pub current_time: Option<f64>,
    #[serde(default)]
    pub current_page: Option<u32>,
    #[serde(default)]
    pub current_slide: Option<u32>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A write that brings the remote store up to date with a [ProgressRecord].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingSync {
    pub state: ProgressState,
    /// The state crosses into completion since the last successful sync.
    pub completes: bool,
}

/// Where the completion transition stands with the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    Unreported,
    /// A queued write carries the mark-complete call.
    Submitted,
    Reported,
}

/// In-memory progress of a viewing session together with the last snapshot
/// known to be stored remotely.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRecord {
    threshold: CompletionThreshold,
    current: ProgressState,
    synced: ProgressState,
    completion: Completion,
}

impl ProgressRecord {
    /// The initial state came from the server, so it starts out synced.
    pub fn new(initial_progress: f64, threshold: CompletionThreshold) -> Self {
        let state = ProgressState::initial(initial_progress, threshold);

        let completion = if state.is_completed {
            Completion::Reported
        } else {
            Completion::Unreported
        };

        Self {
            threshold,
            current: state,
            synced: state,
            completion,
        }
    }

    pub fn current(&self) -> &ProgressState {
        &self.current
    }

    pub fn synced(&self) -> &ProgressState {
        &self.synced
    }

    pub fn threshold(&self) -> CompletionThreshold {
        self.threshold
    }

    /// Merge an observation into the current state.
    ///
    /// Progress only moves forward, completion is sticky and positional
    /// markers are last-write-wins.
    pub fn observe(&mut self, update: ProgressUpdate) -> ProgressState {
        let state = &mut self.current;

        if let Some(progress) = update.progress {
            if progress > state.progress {
                state.progress = progress;
            }
        }

        if update.current_time.is_some() {
            state.current_time = update.current_time;
        }
        if update.current_page.is_some() {
            state.current_page = update.current_page;
        }
        if update.current_slide.is_some() {
            state.current_slide = update.current_slide;
        }

        state.is_completed = state.is_completed
            || update.is_completed == Some(true)
            || self.threshold.is_reached(state.progress);

        *state
    }

    pub fn is_dirty(&self) -> bool {
        self.current != self.synced
    }

    /// The write needed to bring the remote store up to date, if any.
    ///
    /// Mark-complete rides along only while no earlier write has claimed it.
    pub fn pending_sync(&self) -> Option<PendingSync> {
        let completes = self.current.is_completed && self.completion == Completion::Unreported;

        if !self.is_dirty() && !completes {
            return None;
        }

        Some(PendingSync {
            state: self.current,
            completes,
        })
    }

    /// The write was queued for replication.
    pub fn mark_submitted(&mut self, sync: &PendingSync) {
        if sync.completes {
            self.completion = Completion::Submitted;
        }
    }

    /// The write was stored remotely.
    pub fn mark_synced(&mut self, sync: &PendingSync) {
        self.synced = sync.state;

        if sync.completes {
            self.completion = Completion::Reported;
        }
    }

    /// The write never made it, so its completion has to be reported again.
    pub fn mark_failed(&mut self, sync: &PendingSync) {
        if sync.completes && self.completion == Completion::Submitted {
            self.completion = Completion::Unreported;
        }
    }
}
