//! Authentication middleware.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{
        HeaderMap, HeaderValue, Uri,
        header::{REFERER, SET_COOKIE, USER_AGENT},
        request::Parts,
    },
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use log::{debug, warn};

use super::SsoClients;
use crate::identity::Identity;

/// User-Agent substring identifying browser traffic (compared case-insensitively).
pub const BROWSER_SIGNATURE: &str = "mozilla";

/// Query parameter carrying an SSO service ticket.
pub const SERVICE_TICKET_PARAMETER: &str = "ticket";

const LOGOUT_SUFFIX: &str = "/logout";

/// Marker placed in request extensions for REST requests that were let
/// through without authentication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnauthenticatedRequest;

/// SSO session cookie to expire when the caller logs out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub paths: Vec<String>,
}

/// Behaviour switches of the authentication stage.
#[derive(Debug, Clone, Default)]
pub struct AuthenticationSettings {
    /// Forward REST requests without authenticating them.
    pub forward_unauthenticated_rest_requests: bool,
    /// Referer suffix identifying the backend's logout page.
    pub logout_path: Option<String>,
    /// Path the backend redirects to after its logout page.
    pub logout_redirect_path: Option<String>,
    /// Cookie expired on logout.
    pub session_cookie: Option<SessionCookie>,
}

impl AuthenticationSettings {
    /// Whether the request asks to end the SSO session.
    pub fn is_logout_request(&self, parts: &Parts) -> bool {
        parts.uri.path().ends_with(LOGOUT_SUFFIX) || self.is_backend_logout_redirect(parts)
    }

    /// Clicking logout in the backend performs a browser side redirect from
    /// its logout page back to the redirect path, so the logout page itself
    /// never reaches the proxy. That case is recognised by the referer and
    /// holds whether or not the SSO session is still alive.
    fn is_backend_logout_redirect(&self, parts: &Parts) -> bool {
        let (Some(logout_path), Some(redirect_path)) =
            (&self.logout_path, &self.logout_redirect_path)
        else {
            return false;
        };

        let referer = parts
            .headers
            .get(REFERER)
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default();

        referer.ends_with(logout_path.as_str()) && parts.uri.path() == redirect_path
    }
}

/// Authentication state shared across requests.
#[derive(Clone)]
pub struct AuthenticationState {
    clients: SsoClients,
    settings: Arc<AuthenticationSettings>,
}

impl AuthenticationState {
    pub fn new(clients: SsoClients, settings: AuthenticationSettings) -> Self {
        Self {
            clients,
            settings: Arc::new(settings),
        }
    }

    /// Logout redirect with the session cookie expired on every configured path.
    fn logout_response(&self, clients_response: Response) -> Response {
        let mut response = clients_response;
        let Some(cookie) = &self.settings.session_cookie else {
            return response;
        };

        for path in &cookie.paths {
            let value = format!(
                "{}=; Path={}; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
                cookie.name, path
            );
            match HeaderValue::from_str(&value) {
                Ok(value) => {
                    response.headers_mut().append(SET_COOKIE, value);
                }
                Err(e) => warn!("Invalid session cookie for path {}: {:?}", path, e),
            }
        }

        response
    }
}

/// Whether the request was sent by a browser.
pub fn is_browser_request(headers: &HeaderMap) -> bool {
    headers
        .get(USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(|agent| agent.to_lowercase().contains(BROWSER_SIGNATURE))
        .unwrap_or(false)
}

/// Location of the same request without its service ticket, or `None` if the
/// request carries no ticket.
pub fn strip_service_ticket(uri: &Uri) -> Option<String> {
    let query = uri.query()?;

    let is_ticket = |pair: &str| pair.split('=').next() == Some(SERVICE_TICKET_PARAMETER);
    if !query.split('&').any(is_ticket) {
        return None;
    }

    let remaining: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty() && !is_ticket(pair))
        .collect();

    let mut location = uri.path().to_string();
    if !remaining.is_empty() {
        location.push('?');
        location.push_str(&remaining.join("&"));
    }

    Some(location)
}

/// Authentication middleware.
///
/// Browser requests go through the browser SSO client, everything else
/// through the REST client. Unauthenticated callers are sent to the login
/// page, logout requests to the logout page. Authenticated requests continue
/// with an [`Identity`] in their extensions.
pub async fn authentication_middleware(
    State(auth): State<AuthenticationState>,
    mut req: Request,
    next: Next,
) -> Response {
    let browser = is_browser_request(req.headers());
    debug!(
        "Authentication middleware called for {} request to {}",
        if browser { "browser" } else { "REST" },
        req.uri().path()
    );

    if !browser && auth.settings.forward_unauthenticated_rest_requests {
        debug!("Unauthenticated REST request is allowed");
        req.extensions_mut().insert(UnauthenticatedRequest);
        return next.run(req).await;
    }

    let client = auth.clients.for_request(browser);
    let (mut parts, body) = req.into_parts();

    if let Err(response) = client.handle(&mut parts).await {
        debug!("SSO client answered the request itself");
        return response;
    }

    if auth.settings.is_backend_logout_redirect(&parts) {
        debug!("Received logout redirect from the backend");
        return auth.logout_response(client.redirect_to_logout(&parts));
    }

    if !client.is_authenticated(&parts) {
        debug!("Unauthenticated user - redirect to login");
        return client.redirect_to_login(&parts);
    }

    let ticketless = browser
        .then(|| strip_service_ticket(&parts.uri))
        .flatten();
    if let Some(location) = ticketless {
        debug!("Removing service ticket from request by redirecting...");
        return Redirect::temporary(&location).into_response();
    }

    if auth.settings.is_logout_request(&parts) {
        debug!("Received logout request");
        return auth.logout_response(client.redirect_to_logout(&parts));
    }

    let identity = Identity::new(
        client.username(&parts),
        client.is_first_authenticated_request(&parts),
        client.attributes(&parts),
    );
    debug!(
        "Request by user {} (first request: {})",
        identity.username, identity.replicate
    );

    parts.extensions.insert(identity);
    next.run(Request::from_parts(parts, body)).await
}
