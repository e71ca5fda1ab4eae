use reqwest::StatusCode;
use snafu::Snafu;
use url::Url;

pub type Result<T, E = ApiError> = ::std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub enum ApiError {
    #[snafu(display("could not build the HTTP client: {source}"))]
    BuildHttpClient { source: reqwest::Error },

    #[snafu(display("`{url}` cannot be used as the API base url"))]
    InvalidBaseUrl { url: Url },

    #[snafu(display("request to `{endpoint}` failed: {source}"))]
    Request { endpoint: Url, source: reqwest::Error },

    #[snafu(display("request to `{endpoint}` is not authorized"))]
    Unauthorized { endpoint: Url },

    #[snafu(display("`{endpoint}` responded with {status}: {message}"))]
    Status {
        endpoint: Url,
        status: StatusCode,
        message: String,
    },

    #[snafu(display("malformed response from `{endpoint}`: {source}"))]
    Decode { endpoint: Url, source: reqwest::Error },
}

impl ApiError {
    /// Status code returned by the remote API, if it answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}
