//! Authentication stage.
//!
//! Classifies requests as browser or REST traffic, drives the SSO client
//! for that class and attaches the caller's [`Identity`](crate::identity::Identity)
//! to the request for the stages behind it.

mod middleware;
mod sso;

pub use middleware::{
    AuthenticationSettings, AuthenticationState, BROWSER_SIGNATURE, SERVICE_TICKET_PARAMETER,
    SessionCookie, UnauthenticatedRequest, authentication_middleware, is_browser_request,
    strip_service_ticket,
};
pub use sso::{SsoClient, SsoClients};
