//! SSO capability consumed by the authentication stage.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{http::request::Parts, response::Response};

use crate::identity::Attributes;

/// Single-sign-on client.
///
/// The protocol itself (ticket validation, session cookies, back-channel
/// logout) lives in the implementation. The authentication stage only sees
/// this capability set and never touches the request body, so a request
/// body always reaches the backend intact.
#[async_trait]
pub trait SsoClient: Send + Sync {
    /// Manage SSO session state for the request.
    ///
    /// Implementations validate service tickets, read session cookies and
    /// record what they learn in `parts.extensions` for the query methods
    /// below. Returning `Err` short-circuits the pipeline with that response
    /// (for example a handled back-channel logout).
    async fn handle(&self, parts: &mut Parts) -> Result<(), Response>;

    /// Whether the request belongs to an authenticated SSO session.
    fn is_authenticated(&self, parts: &Parts) -> bool;

    /// Response sending the caller to the SSO login page.
    fn redirect_to_login(&self, parts: &Parts) -> Response;

    /// Response sending the caller to the SSO logout page.
    fn redirect_to_logout(&self, parts: &Parts) -> Response;

    /// True only on the first request of a newly established session.
    fn is_first_authenticated_request(&self, parts: &Parts) -> bool;

    /// Authenticated user name.
    fn username(&self, parts: &Parts) -> String;

    /// Attributes released by the SSO system for the authenticated user.
    fn attributes(&self, parts: &Parts) -> Attributes;
}

/// SSO clients for the two traffic classes.
#[derive(Clone)]
pub struct SsoClients {
    /// Cookie and ticket based session handling for browsers.
    pub browser: Arc<dyn SsoClient>,
    /// Session handling for API/REST callers.
    pub rest: Arc<dyn SsoClient>,
}

impl SsoClients {
    pub fn new(browser: Arc<dyn SsoClient>, rest: Arc<dyn SsoClient>) -> Self {
        Self { browser, rest }
    }

    /// Client responsible for the given traffic class.
    pub fn for_request(&self, browser: bool) -> &Arc<dyn SsoClient> {
        if browser { &self.browser } else { &self.rest }
    }
}
