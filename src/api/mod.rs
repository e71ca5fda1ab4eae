//! HTTP edge of the front-end.
//!
//! Serves the compiled front-end, routes every page request through the
//! role gate and the subject access gate, and exposes the JSON endpoints
//! the pages call.

use std::path::Path;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

mod auth;
mod error;
mod lectures;
mod middleware;
mod session;
mod state;

pub use error::*;
pub use session::{Student, ROLE_COOKIE, TOKEN_COOKIE, USER_ID_COOKIE};
pub use state::*;

pub fn create_router(app: App, static_dir: &Path) -> Router {
    let pages = ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api_routes())
        .fallback_service(pages)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn(middleware::role_gate))
                .layer(axum::middleware::from_fn_with_state(app.clone(), middleware::subject_access)),
        )
        .with_state(app)
}

fn api_routes() -> Router<App> {
    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/verify-otp", post(auth::verify_otp))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/auth/me", get(auth::me))
        .route("/lectures/:lecture/session", post(lectures::open).delete(lectures::close))
        .route("/lectures/:lecture/progress", get(lectures::current).post(lectures::observe))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Health {
    status: &'static str,
    open_sessions: usize,
}

async fn health(State(app): State<App>) -> Json<Health> {
    Json(Health {
        status: "ok",
        open_sessions: app.progress.len(),
    })
}
