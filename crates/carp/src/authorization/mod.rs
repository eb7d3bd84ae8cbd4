//! Authorization stage.
//!
//! Derives the caller's role from privilege group membership and injects the
//! trust headers the backend relies on. It never blocks a request; the
//! backend rejects requests that lack the headers.

mod checker;
mod middleware;

pub use checker::{AuthorizationChecker, PrincipalHeaderChecker};
pub use middleware::{
    AuthorizationState, MISSING_IDENTITY_MESSAGE, TrustHeaders, authorization_middleware,
};
