//! Cookie-backed sessions.
//!
//! The remote API issues a bearer token on sign-in. The token and the
//! user's identity are kept in three cookies so that page requests can be
//! routed without another round trip.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use snafu::OptionExt as _;

use super::error::{HttpError, NotAStudentSnafu, UnauthenticatedSnafu};
use crate::model::{Session, SessionUser, StudentId};

pub const TOKEN_COOKIE: &str = "token";
pub const USER_ID_COOKIE: &str = "user_id";
pub const ROLE_COOKIE: &str = "role";

/// Rebuild the session from the request cookies. Any missing or
/// malformed cookie means there is no session.
pub fn session_from_cookies(jar: &CookieJar) -> Option<Session> {
    let token = jar.get(TOKEN_COOKIE)?.value();
    let id = jar.get(USER_ID_COOKIE)?.value();
    let role = jar.get(ROLE_COOKIE)?.value().parse().ok()?;

    if token.is_empty() || id.is_empty() {
        return None;
    }

    Some(Session::new(token, SessionUser { id: id.into(), role }))
}

pub fn with_session(jar: CookieJar, session: &Session, secure: bool) -> CookieJar {
    let cookie = |name: &'static str, value: String, http_only: bool| {
        Cookie::build((name, value))
            .path("/")
            .http_only(http_only)
            .same_site(SameSite::Lax)
            .secure(secure)
    };

    jar.add(cookie(TOKEN_COOKIE, session.token.clone(), true))
        .add(cookie(USER_ID_COOKIE, session.user.id.to_string(), false))
        .add(cookie(ROLE_COOKIE, session.user.role.to_string(), false))
}

pub fn without_session(jar: CookieJar) -> CookieJar {
    [TOKEN_COOKIE, USER_ID_COOKIE, ROLE_COOKIE]
        .into_iter()
        .fold(jar, |jar, name| jar.remove(Cookie::build((name, "")).path("/")))
}

/// The session attached by the role gate, falling back to the cookies.
#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>() {
            return Ok(session.clone());
        }

        session_from_cookies(&CookieJar::from_headers(&parts.headers)).context(UnauthenticatedSnafu)
    }
}

/// A signed-in student.
#[derive(Debug, Clone)]
pub struct Student {
    pub session: Session,
    pub id: StudentId,
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Student {
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        let id = session.user.student_id().context(NotAStudentSnafu {
            role: session.user.role,
        })?;

        Ok(Student { session, id })
    }
}
