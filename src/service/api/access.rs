use async_trait::async_trait;
use reqwest::Method;
use tracing::instrument;

use super::{ApiClient, Result};
use crate::model::{AccessReport, Session, StudentId, SubjectId};
use crate::service::access::AccessChecker;

impl ApiClient {
    /// Ask whether a student may open a subject's content.
    #[instrument(skip(self, session))]
    pub async fn check_access(
        &self, session: &Session, student: &StudentId, subject: &SubjectId,
    ) -> Result<AccessReport> {
        let endpoint = self.endpoint([
            "students",
            student.as_str(),
            "subjects",
            subject.as_str(),
            "access",
        ])?;
        let request = self.request(Method::GET, &endpoint, Some(session));

        self.fetch(&endpoint, request).await
    }
}

#[async_trait]
impl AccessChecker for ApiClient {
    async fn check_access(
        &self, session: &Session, student: &StudentId, subject: &SubjectId,
    ) -> Result<AccessReport> {
        ApiClient::check_access(self, session, student, subject).await
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::Path;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;
    use crate::model::{Role, SessionUser};
    use crate::service::api::tests::serve;

    #[tokio::test]
    async fn access_report_is_decoded() {
        let router = Router::new().route(
            "/v1/students/:student/subjects/:subject/access",
            get(|Path((student, subject)): Path<(String, String)>| async move {
                let has_access = subject != "physics";
                Json(json!({
                    "hasAccess": has_access,
                    "reason": format!("checked {student}"),
                    "requirements": { "aptitudeTest": !has_access },
                }))
            }),
        );
        let client = serve(router).await;
        let session = Session::new(
            "token",
            SessionUser {
                id: "s-1".into(),
                role: Role::Student,
            },
        );

        let physics = client
            .check_access(&session, &"s-1".into(), &"physics".into())
            .await
            .unwrap();
        assert!(!physics.has_access);
        assert_eq!(physics.reason.as_deref(), Some("checked s-1"));

        let math = client
            .check_access(&session, &"s-1".into(), &"math".into())
            .await
            .unwrap();
        assert!(math.has_access);
    }
}
