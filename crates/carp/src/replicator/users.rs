//! Backend user accounts.

use std::fmt;

use axum::http::Method;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::endpoints::Argument;
use super::error::{ReplicationError, ReplicationResult};
use super::password::generate_password;
use super::{Replicator, decode, expect_found, expect_ok};
use crate::identity::Identity;

/// Backend user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account as returned by the user lookup endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteUser {
    pub id: UserId,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub login: String,
}

/// Payload of the user creation endpoint.
#[derive(Debug, Serialize)]
struct NewUser<'a> {
    name: &'a str,
    email: &'a str,
    login: &'a str,
    password: String,
}

#[derive(Debug, Deserialize)]
struct CreateUserResponse {
    id: UserId,
    #[serde(default)]
    message: String,
}

impl Replicator {
    /// Id of the backend account for `identity`, creating the account if it
    /// does not exist yet.
    pub async fn create_or_get_user(&self, identity: &Identity) -> ReplicationResult<UserId> {
        match self.get_user(&identity.username).await {
            Ok(user) => Ok(user.id),
            Err(ReplicationError::NotFound { .. }) => self.create_user(identity).await,
            Err(e) => Err(e),
        }
    }

    /// Look up a backend account by login name.
    pub async fn get_user(&self, username: &str) -> ReplicationResult<RemoteUser> {
        let url = self
            .endpoints
            .get_user
            .format(&[Argument::Text(username)])?;

        let response = self.requester.send(Method::GET, &url).await?;
        expect_found(&url, &response)?;

        let user: RemoteUser = decode(&url, &response)?;
        debug!("Found user {} with id {}", user.login, user.id);
        Ok(user)
    }

    async fn create_user(&self, identity: &Identity) -> ReplicationResult<UserId> {
        let url = self.endpoints.create_user.format(&[])?;
        let payload = serde_json::to_value(NewUser {
            name: identity.display_name(),
            email: identity.mail(),
            login: &identity.username,
            password: generate_password(),
        })?;

        let response = self
            .requester
            .send_with_json_body(Method::POST, &url, &payload)
            .await?;
        expect_ok(&url, &response)?;

        let created: CreateUserResponse = decode(&url, &response)?;
        info!(
            "Created user {} with id {} ({})",
            identity.username, created.id, created.message
        );
        Ok(created.id)
    }
}
