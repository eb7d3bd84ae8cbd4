//! Replication of SSO identities into the backend's own user store.
//!
//! On the first request of a new SSO session the backend account is looked
//! up (or created) and its group memberships are converged to the groups the
//! SSO system asserts. Replication is best effort: failures are logged and
//! never change the proxied response.

mod endpoints;
mod error;
mod groups;
mod password;
mod requester;
mod users;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use log::{debug, warn};
use serde::de::DeserializeOwned;

use crate::identity::Identity;

pub use endpoints::{Argument, EndpointTemplate, Endpoints};
pub use error::{AggregatedError, ReplicationError, ReplicationResult};
pub use groups::{DesiredGroupSet, GroupId, RemoteGroup};
pub use password::{PASSWORD_LENGTH, generate_password};
pub use requester::{
    DEFAULT_TIMEOUT, HttpRequester, RawResponse, RequestError, RequestResult, Requester,
};
pub use users::{RemoteUser, UserId};

/// Settings of the replicator.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Backend admin user.
    pub username: String,
    /// Backend admin password.
    pub password: String,
    /// Client side timeout of every admin API call.
    pub timeout: Duration,
    pub endpoints: Endpoints,
}

/// Converges backend users and groups to SSO identities.
#[derive(Clone)]
pub struct Replicator {
    requester: Arc<dyn Requester>,
    endpoints: Arc<Endpoints>,
}

impl Replicator {
    /// Create a replicator talking HTTP to the backend admin API.
    pub fn new(config: Configuration) -> RequestResult<Self> {
        let requester = HttpRequester::new(&config.username, &config.password, config.timeout)?;
        Ok(Self::with_requester(Arc::new(requester), config.endpoints))
    }

    /// Create a replicator on top of an arbitrary [`Requester`].
    pub fn with_requester(requester: Arc<dyn Requester>, endpoints: Endpoints) -> Self {
        Self {
            requester,
            endpoints: Arc::new(endpoints),
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Replicate `identity` into the backend.
    ///
    /// Groups are only touched once the user id is known. The removal pass
    /// runs even when adding groups failed.
    pub async fn replicate(&self, identity: &Identity) {
        debug!("Replicating user {}", identity.username);

        let user = match self.create_or_get_user(identity).await {
            Ok(user) => user,
            Err(e) => {
                warn!("Failed to replicate user {}: {}", identity.username, e);
                return;
            }
        };

        let desired = DesiredGroupSet::from_identity(identity);

        if let Err(e) = self.add_missing_groups(user, &desired).await {
            warn!(
                "Failed to add groups of user {}: {}",
                identity.username, e
            );
        }

        if let Err(e) = self.remove_non_existing_groups(user, &desired).await {
            warn!(
                "Failed to remove groups of user {}: {}",
                identity.username, e
            );
        }
    }
}

/// Replication middleware.
///
/// Replicates the request's identity on the first request of an SSO session
/// and then always continues with the next stage.
pub async fn replication_middleware(
    State(replicator): State<Replicator>,
    req: Request,
    next: Next,
) -> Response {
    let identity = req
        .extensions()
        .get::<Identity>()
        .filter(|identity| identity.replicate)
        .cloned();

    if let Some(identity) = identity {
        replicator.replicate(&identity).await;
    }

    next.run(req).await
}

/// Fail with [`ReplicationError::NotFound`] on 404 and
/// [`ReplicationError::UnexpectedStatus`] on anything but 200.
fn expect_found(url: &str, response: &RawResponse) -> ReplicationResult<()> {
    if response.status == StatusCode::NOT_FOUND {
        return Err(ReplicationError::NotFound {
            url: url.to_string(),
        });
    }
    expect_ok(url, response)
}

fn expect_ok(url: &str, response: &RawResponse) -> ReplicationResult<()> {
    if response.status != StatusCode::OK {
        return Err(ReplicationError::UnexpectedStatus {
            status: response.status,
            url: url.to_string(),
        });
    }
    Ok(())
}

fn decode<T: DeserializeOwned>(url: &str, response: &RawResponse) -> ReplicationResult<T> {
    serde_json::from_slice(&response.body).map_err(|source| ReplicationError::Decode {
        url: url.to_string(),
        source,
    })
}
