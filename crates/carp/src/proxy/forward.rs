//! Forwarding to the backend.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderValue, StatusCode, Uri, header::HOST},
    response::{IntoResponse, Response},
};
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;
use log::{debug, error};

use crate::authorization::{AuthorizationChecker, PrincipalHeaderChecker};

/// Forwards requests to the backend, keeping path and query.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    target: Uri,
    checker: PrincipalHeaderChecker,
}

impl Forwarder {
    pub fn new(target: Uri, checker: PrincipalHeaderChecker) -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            target,
            checker,
        }
    }

    /// URI of `uri` on the backend. The target's path is used as prefix.
    fn target_uri(&self, uri: &Uri) -> Result<Uri, StatusCode> {
        let prefix = self.target.path().trim_end_matches('/');
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        let scheme = self.target.scheme_str().unwrap_or("http");
        let authority = self
            .target
            .authority()
            .map(|a| a.as_str())
            .unwrap_or_default();

        let target = format!("{}://{}{}{}", scheme, authority, prefix, path_and_query);
        target.parse().map_err(|e| {
            error!("Invalid target URI {}: {:?}", target, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
    }

    pub async fn forward(&self, mut req: Request) -> Result<Response, StatusCode> {
        let uri = self.target_uri(req.uri())?;
        debug!("Forwarding request to {}", uri);

        if !self.checker.is_authorized(req.headers()) {
            debug!(
                "Request to {} carries no {} header",
                uri.path(),
                self.checker.header()
            );
        }

        *req.uri_mut() = uri;

        if let Some(authority) = req.uri().authority() {
            let value = HeaderValue::from_str(authority.as_str()).map_err(|e| {
                error!("Invalid Host header value {}: {:?}", authority.as_str(), e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?;
            req.headers_mut().insert(HOST, value);
        }

        let response = self.client.request(req).await.map_err(|e| {
            error!("Forwarding request failed: {:?}", e);
            if e.is_connect() {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::BAD_GATEWAY
            }
        })?;

        let (parts, body) = response.into_parts();
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

/// Fallback handler forwarding everything that reaches the end of the pipeline.
pub async fn forward_request(State(forwarder): State<Forwarder>, req: Request) -> Response {
    match forwarder.forward(req).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}
