use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use snafu::{ResultExt as _, Snafu};
use validator::{Validate, ValidationErrors};

use crate::model::Role;
use crate::service::api::ApiError;
use crate::service::progress::ProgressError;

pub type Result<T, E = HttpError> = ::std::result::Result<T, E>;

pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Snafu, Serialize)]
#[snafu(visibility(pub(crate)))]
#[serde(tag = "error", content = "data")]
pub enum HttpError {
    #[snafu(display("request is not authenticated"))]
    Unauthenticated,

    #[snafu(display("only students can track lecture progress"))]
    NotAStudent { role: Role },

    #[snafu(display("request body is invalid"))]
    Validation {
        #[serde(rename = "fields")]
        source: ValidationErrors,
    },

    #[snafu(display("{source}"))]
    Progress {
        #[serde(skip)]
        source: ProgressError,
    },

    #[snafu(display("the remote api request failed: {source}"))]
    Upstream {
        #[serde(skip)]
        source: ApiError,
    },
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::Unauthenticated => StatusCode::UNAUTHORIZED,
            HttpError::NotAStudent { .. } => StatusCode::FORBIDDEN,
            HttpError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            HttpError::Progress { .. } => StatusCode::NOT_FOUND,
            HttpError::Upstream { source } => match source.status() {
                Some(status) if status.is_client_error() => status,
                _ => StatusCode::BAD_GATEWAY,
            },
        }
    }

    /// Page the client should navigate to, if any.
    fn redirect(&self) -> Option<&'static str> {
        (self.status() == StatusCode::UNAUTHORIZED).then_some(LOGIN_PATH)
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect: Option<&'static str>,
    #[serde(flatten)]
    data: HttpError,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let content = ErrorResponse {
            message: self.to_string(),
            redirect: self.redirect(),
            data: self,
        };

        (status, Json(content)).into_response()
    }
}

/// Run form-level validation before anything is sent upstream.
pub fn validated<T: Validate>(payload: T) -> Result<T> {
    payload.validate().context(ValidationSnafu)?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(status: StatusCode) -> HttpError {
        HttpError::Upstream {
            source: ApiError::Status {
                endpoint: "http://api.test/".parse().unwrap(),
                status,
                message: String::new(),
            },
        }
    }

    #[test]
    fn upstream_status_mapping() {
        assert_eq!(upstream(StatusCode::NOT_FOUND).status(), StatusCode::NOT_FOUND);
        assert_eq!(upstream(StatusCode::INTERNAL_SERVER_ERROR).status(), StatusCode::BAD_GATEWAY);

        let unauthorized = HttpError::Upstream {
            source: ApiError::Unauthorized {
                endpoint: "http://api.test/".parse().unwrap(),
            },
        };
        assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unauthorized.redirect(), Some(LOGIN_PATH), "expired sessions go back to the login page");
    }

    #[test]
    fn body_carries_message_and_tag() {
        let body = serde_json::to_value(ErrorResponse {
            message: HttpError::Unauthenticated.to_string(),
            redirect: HttpError::Unauthenticated.redirect(),
            data: HttpError::Unauthenticated,
        })
        .unwrap();

        assert_eq!(body["error"], "Unauthenticated");
        assert_eq!(body["redirect"], "/login");
        assert_eq!(body["message"], "request is not authenticated");
    }
}
