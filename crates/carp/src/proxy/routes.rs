//! Router composition.

use anyhow::{Context, Result};
use axum::{Router, middleware};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::forward::{Forwarder, forward_request};
use crate::auth::{AuthenticationState, SsoClients, authentication_middleware};
use crate::authorization::{AuthorizationState, PrincipalHeaderChecker, authorization_middleware};
use crate::config::Configuration;
use crate::replicator::{Replicator, replication_middleware};

/// Stages in front of the forwarder.
pub struct Pipeline {
    pub authentication: AuthenticationState,
    pub authorization: AuthorizationState,
    pub replicator: Replicator,
    pub forwarder: Forwarder,
}

impl Pipeline {
    pub fn from_configuration(config: &Configuration, clients: SsoClients) -> Result<Self> {
        let headers = config.trust_headers()?;
        let replicator = Replicator::new(config.replicator_configuration()?)
            .context("creating replicator")?;

        Ok(Self {
            authentication: AuthenticationState::new(clients, config.authentication_settings()),
            forwarder: Forwarder::new(
                config.target_uri()?,
                PrincipalHeaderChecker::new(headers.principal.clone()),
            ),
            authorization: AuthorizationState::new(headers, config.privilege_groups()),
            replicator,
        })
    }

    /// Authentication, then authorization, then replication, then forwarding.
    pub fn into_router(self) -> Router {
        // Layers run outermost first, so the first stage is added last.
        Router::new()
            .fallback(forward_request)
            .with_state(self.forwarder)
            .layer(middleware::from_fn_with_state(
                self.replicator,
                replication_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                self.authorization,
                authorization_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                self.authentication,
                authentication_middleware,
            ))
    }
}

/// Create the proxy router: unauthenticated static assets, everything else
/// through the pipeline.
pub fn create_router(config: &Configuration, clients: SsoClients) -> Result<Router> {
    let pipeline = Pipeline::from_configuration(config, clients)?.into_router();

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let mut router = Router::new();
    if let Some(mount) = &config.carp_resource_path {
        let mount = mount.trim_end_matches('/');
        router = router.nest_service(mount, ServeDir::new(&config.resource_path));
    }

    Ok(router.fallback_service(pipeline).layer(trace_layer))
}
