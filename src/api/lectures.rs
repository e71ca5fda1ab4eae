use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use snafu::ResultExt as _;
use tracing::instrument;
use validator::Validate;

use super::error::{validated, ProgressSnafu, Result};
use super::session::Student;
use super::state::App;
use crate::model::{CompletionThreshold, LectureId, ProgressState, ProgressUpdate};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OpenSession {
    #[validate(range(min = 0.0, max = 100.0))]
    pub initial_progress: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub completion_threshold: Option<f64>,
}

#[instrument(skip(app, student), fields(student = %student.id))]
pub async fn open(
    State(app): State<App>, student: Student, Path(lecture): Path<LectureId>,
    Json(payload): Json<OpenSession>,
) -> Result<(StatusCode, Json<ProgressState>)> {
    let payload = validated(payload)?;
    let threshold = payload.completion_threshold.map(CompletionThreshold::new);

    let state = app
        .progress
        .open(student.session, lecture, payload.initial_progress, threshold)
        .await;

    Ok((StatusCode::CREATED, Json(state)))
}

#[instrument(skip(app, student), fields(student = %student.id))]
pub async fn observe(
    State(app): State<App>, student: Student, Path(lecture): Path<LectureId>,
    Json(update): Json<ProgressUpdate>,
) -> Result<Json<ProgressState>> {
    let update = validated(update)?;
    let state = app.progress.observe(&student.session, &lecture, update).await.context(ProgressSnafu)?;

    Ok(Json(state))
}

pub async fn current(
    State(app): State<App>, student: Student, Path(lecture): Path<LectureId>,
) -> Result<Json<ProgressState>> {
    let state = app.progress.current(&student.session, &lecture).context(ProgressSnafu)?;

    Ok(Json(state))
}

#[instrument(skip(app, student), fields(student = %student.id))]
pub async fn close(
    State(app): State<App>, student: Student, Path(lecture): Path<LectureId>,
) -> Result<StatusCode> {
    app.progress.close(&student.session, &lecture).await.context(ProgressSnafu)?;

    Ok(StatusCode::NO_CONTENT)
}
