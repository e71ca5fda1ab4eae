use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use crate::api::state::App;
use crate::model::Session;
use crate::service::access::{pending_assessment_location, subject_from_path};

/// Keep students out of subject content they are not eligible for.
///
/// Runs after the role gate, which has already attached the session for
/// every page under the student area.
pub async fn subject_access(State(app): State<App>, request: Request, next: Next) -> Response {
    let Some(subject) = subject_from_path(request.uri().path()) else {
        return next.run(request).await;
    };

    let Some(session) = request.extensions().get::<Session>().cloned() else {
        return next.run(request).await;
    };

    let Some(student) = session.user.student_id() else {
        return next.run(request).await;
    };

    let verdict = app.access.check(&session, &student, &subject).await;

    if verdict.is_allowed() {
        next.run(request).await
    } else {
        Redirect::temporary(&pending_assessment_location(&subject)).into_response()
    }
}
