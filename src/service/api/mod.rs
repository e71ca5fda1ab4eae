//! Client for the remote LMS REST API.
//!
//! Every call that needs authentication takes the caller's [Session]
//! explicitly; the client itself holds no user state.

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use snafu::{OptionExt as _, ResultExt as _};
use url::Url;

use crate::config::ApiConfig;
use crate::model::Session;

pub use error::*;

mod access;
mod auth;
mod error;
mod lectures;

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context(BuildHttpClientSnafu)?;

        Self::with_client(http, config.base_url.clone())
    }

    pub fn with_client(http: reqwest::Client, base_url: Url) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return InvalidBaseUrlSnafu { url: base_url }.fail();
        }

        Ok(Self { http, base_url })
    }

    /// Resolve an endpoint below the base url. Segments are percent-encoded.
    fn endpoint<I>(&self, segments: I) -> Result<Url>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.base_url.clone();

        url.path_segments_mut()
            .ok()
            .context(InvalidBaseUrlSnafu {
                url: self.base_url.clone(),
            })?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    fn request(&self, method: Method, endpoint: &Url, session: Option<&Session>) -> RequestBuilder {
        let request = self.http.request(method, endpoint.clone());

        match session {
            Some(session) => request.bearer_auth(&session.token),
            None => request,
        }
    }

    async fn send(&self, endpoint: &Url, request: RequestBuilder) -> Result<Response> {
        tracing::debug!(%endpoint, "calling remote api");

        let response = request.send().await.context(RequestSnafu {
            endpoint: endpoint.clone(),
        })?;

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::info!(%endpoint, "remote api rejected the session");
            return UnauthorizedSnafu {
                endpoint: endpoint.clone(),
            }
            .fail();
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            return StatusSnafu {
                endpoint: endpoint.clone(),
                status,
                message: error_message(&body),
            }
            .fail();
        }

        Ok(response)
    }

    async fn fetch<T: DeserializeOwned>(&self, endpoint: &Url, request: RequestBuilder) -> Result<T> {
        let response = self.send(endpoint, request).await?;

        response.json().await.context(DecodeSnafu {
            endpoint: endpoint.clone(),
        })
    }

    async fn execute(&self, endpoint: &Url, request: RequestBuilder) -> Result<()> {
        self.send(endpoint, request).await.map(|_| ())
    }
}

/// Pull a human readable message out of an error body.
fn error_message(body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("message")?.as_str().map(str::to_owned));

    match message {
        Some(message) => message,
        None => body.chars().take(200).collect(),
    }
}
