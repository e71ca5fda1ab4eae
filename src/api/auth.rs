use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::CookieJar;
use snafu::ResultExt as _;
use tracing::instrument;

use super::error::{validated, Result, UpstreamSnafu};
use super::session::{with_session, without_session};
use super::state::App;
use crate::model::{
    AuthResponse, Credentials, OtpVerification, PasswordReset, PasswordResetRequest, Session,
    SessionUser, User,
};

fn sign_in(app: &App, jar: CookieJar, response: AuthResponse) -> (CookieJar, Json<User>) {
    let AuthResponse { token, user } = response;
    let session = Session::new(token, user.session_user());

    tracing::info!(user = %user.id, role = %user.role, "signed in");

    (with_session(jar, &session, app.secure_cookies), Json(user))
}

#[instrument(skip_all)]
pub async fn login(
    State(app): State<App>, jar: CookieJar, Json(credentials): Json<Credentials>,
) -> Result<(CookieJar, Json<User>)> {
    let credentials = validated(credentials)?;
    let response = app.client().login(&credentials).await.context(UpstreamSnafu)?;

    Ok(sign_in(&app, jar, response))
}

#[instrument(skip_all)]
pub async fn verify_otp(
    State(app): State<App>, jar: CookieJar, Json(verification): Json<OtpVerification>,
) -> Result<(CookieJar, Json<User>)> {
    let verification = validated(verification)?;
    let response = app.client().verify_otp(&verification).await.context(UpstreamSnafu)?;

    Ok(sign_in(&app, jar, response))
}

/// Sign out locally even when the remote API cannot be reached.
///
/// Viewing sessions opened with the token are flushed before it is revoked.
#[instrument(skip_all)]
pub async fn logout(
    State(app): State<App>, jar: CookieJar, session: Option<Session>,
) -> (CookieJar, StatusCode) {
    if let Some(session) = session {
        app.progress.close_owned_by(&session).await;

        if let Err(error) = app.client().logout(&session).await {
            tracing::warn!(%error, user = %session.user.id, "remote logout failed");
        }
    }

    (without_session(jar), StatusCode::NO_CONTENT)
}

#[instrument(skip_all)]
pub async fn forgot_password(
    State(app): State<App>, Json(request): Json<PasswordResetRequest>,
) -> Result<StatusCode> {
    let request = validated(request)?;
    app.client().forgot_password(&request).await.context(UpstreamSnafu)?;

    Ok(StatusCode::ACCEPTED)
}

#[instrument(skip_all)]
pub async fn reset_password(
    State(app): State<App>, Json(reset): Json<PasswordReset>,
) -> Result<StatusCode> {
    let reset = validated(reset)?;
    app.client().reset_password(&reset).await.context(UpstreamSnafu)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(session: Session) -> Json<SessionUser> {
    Json(session.user)
}
