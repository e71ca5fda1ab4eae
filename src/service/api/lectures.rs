use async_trait::async_trait;
use reqwest::Method;
use tracing::instrument;

use super::{ApiClient, Result};
use crate::model::{LectureId, LectureProgress, ProgressPayload, Session};
use crate::service::progress::ProgressStore;

impl ApiClient {
    #[instrument(skip(self, session), fields(user = %session.user.id))]
    pub async fn update_progress(
        &self, session: &Session, lecture: &LectureId, payload: &ProgressPayload,
    ) -> Result<LectureProgress> {
        let endpoint = self.endpoint(["lectures", lecture.as_str(), "progress"])?;
        let request = self
            .request(Method::PUT, &endpoint, Some(session))
            .json(payload);

        self.fetch(&endpoint, request).await
    }

    #[instrument(skip(self, session), fields(user = %session.user.id))]
    pub async fn mark_complete(&self, session: &Session, lecture: &LectureId) -> Result<()> {
        let endpoint = self.endpoint(["lectures", lecture.as_str(), "complete"])?;
        let request = self.request(Method::POST, &endpoint, Some(session));

        self.execute(&endpoint, request).await
    }
}

#[async_trait]
impl ProgressStore for ApiClient {
    async fn update_progress(
        &self, session: &Session, lecture: &LectureId, payload: &ProgressPayload,
    ) -> Result<LectureProgress> {
        ApiClient::update_progress(self, session, lecture, payload).await
    }

    async fn mark_complete(&self, session: &Session, lecture: &LectureId) -> Result<()> {
        ApiClient::mark_complete(self, session, lecture).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{post, put};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use super::*;
    use crate::model::{Role, SessionUser};
    use crate::service::api::tests::serve;
    use crate::service::api::ApiError;

    fn session() -> Session {
        Session::new(
            "student-token",
            SessionUser {
                id: "s-1".into(),
                role: Role::Student,
            },
        )
    }

    #[tokio::test]
    async fn update_progress_sends_bearer_and_camel_case_body() {
        let seen: Arc<Mutex<Vec<(String, String, Value)>>> = Arc::default();

        let router = Router::new().route(
            "/v1/lectures/:id/progress",
            put({
                let seen = seen.clone();
                move |Path(id): Path<String>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    let auth = headers["authorization"].to_str().unwrap().to_string();
                    seen.lock().unwrap().push((id, auth, body.clone()));
                    Json(json!({ "progress": body["progress"], "currentTime": 42.5, "isCompleted": false }))
                }
            }),
        );
        let client = serve(router).await;

        let payload = ProgressPayload {
            progress: 30.0,
            current_time: Some(42.5),
            current_page: None,
            current_slide: None,
        };
        let stored = client
            .update_progress(&session(), &"lec-9".into(), &payload)
            .await
            .unwrap();

        assert_eq!(stored.progress, 30.0);
        assert_eq!(stored.current_time, Some(42.5));

        let seen = seen.lock().unwrap();
        let (id, auth, body) = &seen[0];
        assert_eq!(id, "lec-9");
        assert_eq!(auth, "Bearer student-token");
        assert_eq!(body, &json!({ "progress": 30.0, "currentTime": 42.5 }));
    }

    #[tokio::test]
    async fn unauthorized_response_is_reported() {
        let router = Router::new().route(
            "/v1/lectures/:id/complete",
            post(|| async { StatusCode::UNAUTHORIZED }),
        );
        let client = serve(router).await;

        let error = client
            .mark_complete(&session(), &"lec-9".into())
            .await
            .unwrap_err();

        assert!(error.is_unauthorized(), "401 must map to Unauthorized, got {error}");
    }

    #[tokio::test]
    async fn server_errors_keep_the_remote_message() {
        let router = Router::new().route(
            "/v1/lectures/:id/complete",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "message": "database unavailable" })),
                )
            }),
        );
        let client = serve(router).await;

        let error = client
            .mark_complete(&session(), &"lec-9".into())
            .await
            .unwrap_err();

        match error {
            ApiError::Status { status, message, .. } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(message, "database unavailable");
            }
            other => panic!("expected a status error, got {other:?}"),
        }
    }
}
