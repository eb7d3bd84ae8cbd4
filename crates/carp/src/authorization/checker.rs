//! Checks on requests that already passed authorization.

use axum::http::{HeaderMap, HeaderName};

/// Decides whether a request already carries an authorization decision.
pub trait AuthorizationChecker: Send + Sync {
    fn is_authorized(&self, headers: &HeaderMap) -> bool;
}

/// Treats a request as authorized when the principal header is present and
/// non-empty. Used where the backend only looks at header presence.
#[derive(Debug, Clone)]
pub struct PrincipalHeaderChecker {
    header: HeaderName,
}

impl PrincipalHeaderChecker {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }
}

impl AuthorizationChecker for PrincipalHeaderChecker {
    fn is_authorized(&self, headers: &HeaderMap) -> bool {
        headers
            .get(&self.header)
            .is_some_and(|value| !value.as_bytes().is_empty())
    }
}
