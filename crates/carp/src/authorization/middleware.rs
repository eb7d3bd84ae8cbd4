//! Trust header injection.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use log::{debug, warn};

use crate::auth::UnauthenticatedRequest;
use crate::identity::{Identity, PrivilegeGroups};

/// Body of the response sent when the pipeline reaches this stage without an identity.
pub const MISSING_IDENTITY_MESSAGE: &str = "Could not extract user from request";

/// Names of the headers the backend trusts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustHeaders {
    pub principal: HeaderName,
    pub role: HeaderName,
    pub mail: HeaderName,
    pub name: HeaderName,
}

impl TrustHeaders {
    fn all(&self) -> [&HeaderName; 4] {
        [&self.principal, &self.role, &self.mail, &self.name]
    }

    /// Header values for a granted identity, or `None` if any value cannot be
    /// carried in a header.
    fn values(&self, identity: &Identity, groups: &PrivilegeGroups) -> Option<[HeaderValue; 4]> {
        let role = groups.role_for(identity.groups()).to_string();
        // The name header carries the mail address; backends key accounts on it.
        Some([
            HeaderValue::from_bytes(identity.username.as_bytes()).ok()?,
            HeaderValue::from_bytes(role.as_bytes()).ok()?,
            HeaderValue::from_bytes(identity.mail().as_bytes()).ok()?,
            HeaderValue::from_bytes(identity.mail().as_bytes()).ok()?,
        ])
    }

    fn strip(&self, headers: &mut HeaderMap) {
        for name in self.all() {
            headers.remove(name);
        }
    }
}

/// Authorization state shared across requests.
#[derive(Clone)]
pub struct AuthorizationState {
    inner: Arc<Inner>,
}

struct Inner {
    headers: TrustHeaders,
    groups: PrivilegeGroups,
}

impl AuthorizationState {
    pub fn new(headers: TrustHeaders, groups: PrivilegeGroups) -> Self {
        Self {
            inner: Arc::new(Inner { headers, groups }),
        }
    }

    pub fn headers(&self) -> &TrustHeaders {
        &self.inner.headers
    }

    /// Replace the trust headers on `headers` with the ones `identity` is entitled to.
    fn apply(&self, identity: &Identity, headers: &mut HeaderMap) {
        let Inner {
            headers: names,
            groups,
        } = self.inner.as_ref();

        if !groups.grants_access(identity.groups()) {
            debug!("User {} is not in any privilege group", identity.username);
            names.strip(headers);
            return;
        }

        let Some(values) = names.values(identity, groups) else {
            warn!(
                "Identity of user {} cannot be expressed as trust headers, denying",
                identity.username
            );
            names.strip(headers);
            return;
        };

        for (name, value) in names.all().into_iter().zip(values) {
            headers.insert(name.clone(), value);
        }
    }
}

/// Authorization middleware.
///
/// Requests let through unauthenticated are passed on untouched. Otherwise
/// the identity attached by the authentication stage decides the trust
/// headers: all four on grant, none on denial.
pub async fn authorization_middleware(
    State(state): State<AuthorizationState>,
    mut req: Request,
    next: Next,
) -> Response {
    if req.extensions().get::<UnauthenticatedRequest>().is_some() {
        debug!("Skipping authorization for unauthenticated request");
        return next.run(req).await;
    }

    let Some(identity) = req.extensions().get::<Identity>().cloned() else {
        warn!("No identity on request to {}", req.uri().path());
        return (StatusCode::INTERNAL_SERVER_ERROR, MISSING_IDENTITY_MESSAGE).into_response();
    };

    state.apply(&identity, req.headers_mut());
    next.run(req).await
}
