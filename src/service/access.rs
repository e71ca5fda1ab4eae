//! Subject access gate.
//!
//! Students may only open a subject's content once they are eligible for it
//! (aptitude test passed, payment completed). Eligibility is decided by the
//! remote API; this module turns its answer into a routing verdict.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use crate::config::AccessConfig;
use crate::model::{AccessReport, Session, StudentId, SubjectId};
use crate::service::api;

/// Page students are sent to when they are not eligible yet.
pub const PENDING_ASSESSMENT_PATH: &str = "/student/assessment/pending";

#[async_trait]
pub trait AccessChecker: Send + Sync {
    async fn check_access(
        &self, session: &Session, student: &StudentId, subject: &SubjectId,
    ) -> api::Result<AccessReport>;
}

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessVerdict {
    Allowed,
    Denied(AccessReport),
    /// The check itself failed and the gate let the request through.
    ErrorAllowed,
    /// The check itself failed and the gate is configured to fail closed.
    ErrorDenied,
}

impl AccessVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessVerdict::Allowed | AccessVerdict::ErrorAllowed)
    }
}

#[derive(Clone)]
pub struct AccessGate {
    checker: Arc<dyn AccessChecker>,
    fail_open: bool,
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("fail_open", &self.fail_open)
            .finish_non_exhaustive()
    }
}

impl AccessGate {
    pub fn new(checker: Arc<dyn AccessChecker>, config: &AccessConfig) -> Self {
        Self {
            checker,
            fail_open: config.fail_open,
        }
    }

    #[instrument(skip(self, session))]
    pub async fn check(&self, session: &Session, student: &StudentId, subject: &SubjectId) -> AccessVerdict {
        match self.checker.check_access(session, student, subject).await {
            Ok(report) if report.has_access => {
                tracing::debug!("subject access granted");
                AccessVerdict::Allowed
            }
            Ok(report) => {
                tracing::info!(reason = ?report.reason, "subject access denied");
                AccessVerdict::Denied(report)
            }
            Err(error) if self.fail_open => {
                tracing::warn!(%error, "access check failed, letting the request through");
                AccessVerdict::ErrorAllowed
            }
            Err(error) => {
                tracing::warn!(%error, "access check failed, denying the request");
                AccessVerdict::ErrorDenied
            }
        }
    }
}

/// Subject id of a subject content path, e.g. `/student/subjects/{id}/...`.
///
/// Empty segments are skipped the same way the role gate skips them, so
/// `//student//subjects/math` is still a subject page.
pub fn subject_from_path(path: &str) -> Option<SubjectId> {
    let mut segments = path.split('/').filter(|segment| !segment.is_empty());

    match (segments.next(), segments.next(), segments.next()) {
        (Some("student"), Some("subjects"), Some(subject)) => Some(subject.into()),
        _ => None,
    }
}

/// Where a denied student is sent.
pub fn pending_assessment_location(subject: &SubjectId) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("subject", subject.as_str())
        .finish();

    format!("{PENDING_ASSESSMENT_PATH}?{query}")
}


#[cfg(test)]
mod tests {
    use super::testing::StaticChecker;
    use super::*;
    use crate::service::progress::testing::student_session;

    fn gate(checker: StaticChecker, fail_open: bool) -> AccessGate {
        AccessGate::new(Arc::new(checker), &AccessConfig { fail_open })
    }

    #[test]
    fn subject_is_extracted_from_content_paths() {
        assert_eq!(subject_from_path("/student/subjects/math"), Some("math".into()));
        assert_eq!(subject_from_path("/student/subjects/math/chapters/2"), Some("math".into()));
        assert_eq!(subject_from_path("/student/subjects/"), None);
        assert_eq!(subject_from_path("/student/dashboard"), None);
        assert_eq!(subject_from_path("/admin/subjects/math"), None);
        assert_eq!(subject_from_path("/student/subjectsmath"), None);
    }

    #[test]
    fn doubled_slashes_still_name_the_subject() {
        assert_eq!(subject_from_path("//student/subjects/math"), Some("math".into()));
        assert_eq!(subject_from_path("/student//subjects/math"), Some("math".into()));
        assert_eq!(subject_from_path("/student/subjects//math/"), Some("math".into()));
    }

    #[test]
    fn pending_location_encodes_subject() {
        assert_eq!(
            pending_assessment_location(&"math & science".into()),
            "/student/assessment/pending?subject=math+%26+science"
        );
    }

    #[tokio::test]
    async fn verdicts() {
        let session = student_session("s-1");
        let student = StudentId::from("s-1");

        let open = gate(StaticChecker::granting(&["math"]), true);
        assert_eq!(open.check(&session, &student, &"math".into()).await, AccessVerdict::Allowed);

        let verdict = open.check(&session, &student, &"physics".into()).await;
        assert!(matches!(verdict, AccessVerdict::Denied(ref report) if !report.has_access));
        assert!(!verdict.is_allowed());

        let broken = gate(StaticChecker::broken(), true);
        let verdict = broken.check(&session, &student, &"math".into()).await;
        assert_eq!(verdict, AccessVerdict::ErrorAllowed, "infrastructure errors fail open");
        assert!(verdict.is_allowed());

        let closed = gate(StaticChecker::broken(), false);
        let verdict = closed.check(&session, &student, &"math".into()).await;
        assert_eq!(verdict, AccessVerdict::ErrorDenied);
        assert!(!verdict.is_allowed());
    }
}
