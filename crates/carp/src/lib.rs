//! CAS authentication reverse proxy.
//!
//! Requests pass through an authentication stage driven by an [`SsoClient`],
//! an authorization stage injecting trust headers, and a replication stage
//! keeping the backend's users and groups in line with the SSO system,
//! before they are forwarded to the backend.
//!
//! The SSO protocol itself is provided by the embedding application through
//! [`SsoClient`]; [`proxy::serve`] runs the proxy with it.

pub mod auth;
pub mod authorization;
pub mod config;
pub mod identity;
pub mod logging;
pub mod proxy;
pub mod replicator;
pub mod supervisor;

pub use auth::{SsoClient, SsoClients};
pub use config::Configuration;
pub use identity::{Identity, Role};
