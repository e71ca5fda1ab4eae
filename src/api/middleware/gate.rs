//! Role-based routing for every request.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;

use crate::api::error::{HttpError, LOGIN_PATH};
use crate::api::session::session_from_cookies;
use crate::model::{Role, Session};

/// Pages anyone may open.
const PUBLIC_PAGES: &[&str] = &[
    LOGIN_PATH,
    "/register",
    "/forgot-password",
    "/reset-password",
    "/verify-otp",
    "/health",
    "/favicon.ico",
];

const PUBLIC_PREFIXES: &[&str] = &["/api/auth/", "/_next/", "/assets/"];

/// Public pages a signed-in user has no business on.
const SIGN_IN_PAGES: &[&str] = &[LOGIN_PATH, "/register", "/verify-otp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Pass,
    Redirect(String),
    Unauthenticated,
}

pub fn decide(path: &str, session: Option<&Session>) -> Decision {
    let role = session.map(|session| session.user.role);

    if path == "/" {
        return Decision::Redirect(role.map_or(LOGIN_PATH, Role::dashboard).to_owned());
    }

    if is_public(path) {
        return match role {
            Some(role) if matches_page(path, SIGN_IN_PAGES) => Decision::Redirect(role.dashboard().to_owned()),
            _ => Decision::Pass,
        };
    }

    if path.starts_with("/api/") {
        return match session {
            Some(_) => Decision::Pass,
            None => Decision::Unauthenticated,
        };
    }

    let Some(required) = Role::for_path(path) else {
        return Decision::Pass;
    };

    match role {
        None => Decision::Redirect(login_location(path)),
        Some(role) if role != required => Decision::Redirect(role.dashboard().to_owned()),
        Some(_) => Decision::Pass,
    }
}

fn is_public(path: &str) -> bool {
    matches_page(path, PUBLIC_PAGES) || PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

fn matches_page(path: &str, pages: &[&str]) -> bool {
    let path = path.strip_suffix('/').unwrap_or(path);
    pages.iter().any(|page| *page == path)
}

/// Login page that brings the user back to `path` afterwards.
pub fn login_location(path: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("redirect", path)
        .finish();

    format!("{LOGIN_PATH}?{query}")
}

pub async fn role_gate(jar: CookieJar, mut request: Request, next: Next) -> Response {
    let session = session_from_cookies(&jar);
    let path = request.uri().path();

    match decide(path, session.as_ref()) {
        Decision::Pass => {}
        Decision::Redirect(location) => {
            tracing::debug!(path, %location, "redirecting");
            return Redirect::temporary(&location).into_response();
        }
        Decision::Unauthenticated => return HttpError::Unauthenticated.into_response(),
    }

    if let Some(session) = session {
        request.extensions_mut().insert(session);
    }

    next.run(request).await
}
