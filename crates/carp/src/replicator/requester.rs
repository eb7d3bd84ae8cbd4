//! Authenticated HTTP client for the backend admin API.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderValue, Method, StatusCode, header::AUTHORIZATION};
use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use log::debug;
use reqwest::Client;
use thiserror::Error;

/// Default client side timeout for admin API calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Status and fully buffered body of an admin API response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

pub type RequestResult<T> = Result<T, RequestError>;

/// Sends admin API requests and returns the raw response.
///
/// Status codes are never interpreted here; decoding the body is the
/// caller's job.
#[async_trait]
pub trait Requester: Send + Sync {
    async fn send(&self, method: Method, url: &str) -> RequestResult<RawResponse>;

    async fn send_with_json_body(
        &self,
        method: Method,
        url: &str,
        payload: &serde_json::Value,
    ) -> RequestResult<RawResponse>;
}

/// [`Requester`] over reqwest with HTTP Basic credentials.
#[derive(Debug, Clone)]
pub struct HttpRequester {
    client: Client,
    authorization: Option<HeaderValue>,
}

impl HttpRequester {
    /// Create a requester. No credentials are sent when both are empty.
    pub fn new(username: &str, password: &str, timeout: Duration) -> RequestResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RequestError::Client(e.to_string()))?;

        let authorization = if username.is_empty() && password.is_empty() {
            None
        } else {
            let token = STANDARD.encode(format!("{}:{}", username, password));
            let mut value = HeaderValue::from_str(&format!("Basic {}", token))
                .map_err(|e| RequestError::Client(e.to_string()))?;
            value.set_sensitive(true);
            Some(value)
        };

        Ok(Self {
            client,
            authorization,
        })
    }

    async fn execute(&self, url: &str, builder: reqwest::RequestBuilder) -> RequestResult<RawResponse> {
        let builder = match &self.authorization {
            Some(value) => builder.header(AUTHORIZATION, value.clone()),
            None => builder,
        };

        let response = builder.send().await.map_err(|e| transport_error(url, e))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| transport_error(url, e))?;
        debug!("{} answered with status {}", url, status);

        Ok(RawResponse { status, body })
    }
}

fn transport_error(url: &str, error: reqwest::Error) -> RequestError {
    if error.is_timeout() {
        RequestError::Timeout {
            url: url.to_string(),
        }
    } else {
        RequestError::Transport {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl Requester for HttpRequester {
    async fn send(&self, method: Method, url: &str) -> RequestResult<RawResponse> {
        debug!("Sending {} {}", method, url);
        self.execute(url, self.client.request(method, url)).await
    }

    async fn send_with_json_body(
        &self,
        method: Method,
        url: &str,
        payload: &serde_json::Value,
    ) -> RequestResult<RawResponse> {
        debug!("Sending {} {} with JSON body", method, url);
        self.execute(url, self.client.request(method, url).json(payload))
            .await
    }
}
