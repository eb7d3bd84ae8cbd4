//! Backend group memberships.

use std::collections::BTreeSet;
use std::fmt;

use axum::http::Method;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::endpoints::Argument;
use super::error::{AggregatedError, ReplicationError, ReplicationResult};
use super::users::UserId;
use super::{Replicator, decode, expect_found, expect_ok};
use crate::identity::Identity;

/// Backend group id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Group as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteGroup {
    pub id: GroupId,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupSearchResponse {
    total_count: u64,
    #[serde(default, rename = "teams")]
    groups: Vec<RemoteGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateGroupResponse {
    #[serde(default)]
    message: String,
    team_id: GroupId,
}

/// Group names the backend account should be a member of.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredGroupSet(BTreeSet<String>);

impl DesiredGroupSet {
    pub fn from_identity(identity: &Identity) -> Self {
        identity.groups().iter().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<String> for DesiredGroupSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Replicator {
    /// Add the user to every desired group it is not a member of yet,
    /// creating groups the backend does not know.
    ///
    /// Every group is attempted; failures are collected and returned together.
    pub async fn add_missing_groups(
        &self,
        user: UserId,
        desired: &DesiredGroupSet,
    ) -> ReplicationResult<()> {
        let current = self.get_user_groups(user).await?;
        debug!("User {} is member of {} group(s)", user, current.len());

        let mut errors = AggregatedError::new("adding missing groups");
        for name in desired.iter() {
            if current.iter().any(|group| group.name == name) {
                continue;
            }

            debug!("Adding user {} to group {}", user, name);
            let result = match self.get_or_create_group(name).await {
                Ok(group) => self.add_member(group, user).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                debug!("Failed to add user {} to group {}: {}", user, name, e);
                errors.push(e.for_group(name));
            }
        }

        errors.into_result()
    }

    /// Remove the user from every group that is not desired anymore.
    ///
    /// Memberships are read again rather than reused from
    /// [`add_missing_groups`](Self::add_missing_groups).
    pub async fn remove_non_existing_groups(
        &self,
        user: UserId,
        desired: &DesiredGroupSet,
    ) -> ReplicationResult<()> {
        let current = self.get_user_groups(user).await?;

        let mut errors = AggregatedError::new("removing stale groups");
        for group in current.iter().filter(|g| !desired.contains(&g.name)) {
            debug!("Removing user {} from group {}", user, group.name);
            let result = match self.get_group_id_by_name(&group.name).await {
                Ok(id) => self.remove_member(id, user).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                debug!(
                    "Failed to remove user {} from group {}: {}",
                    user, group.name, e
                );
                errors.push(e.for_group(group.name.as_str()));
            }
        }

        errors.into_result()
    }

    /// Groups the user is currently a member of.
    pub async fn get_user_groups(&self, user: UserId) -> ReplicationResult<Vec<RemoteGroup>> {
        let url = self
            .endpoints
            .get_user_groups
            .format(&[Argument::Id(user.0)])?;

        let response = self.requester.send(Method::GET, &url).await?;
        expect_ok(&url, &response)?;
        decode(&url, &response)
    }

    /// Id of the single group called `name`.
    ///
    /// No match is [`ReplicationError::NotFound`], several matches are
    /// [`ReplicationError::AmbiguousGroup`] whatever the status code.
    pub async fn get_group_id_by_name(&self, name: &str) -> ReplicationResult<GroupId> {
        let url = self
            .endpoints
            .search_group
            .format(&[Argument::Text(name)])?;

        let response = self.requester.send(Method::GET, &url).await?;
        expect_found(&url, &response)?;

        let result: GroupSearchResponse = decode(&url, &response)?;
        match result.total_count {
            0 => Err(ReplicationError::NotFound { url }),
            1 => result
                .groups
                .first()
                .map(|group| group.id)
                .ok_or_else(|| ReplicationError::MalformedResponse {
                    url,
                    reason: "totalCount is 1 but no team listed".to_string(),
                }),
            count => Err(ReplicationError::AmbiguousGroup {
                name: name.to_string(),
                count,
            }),
        }
    }

    async fn get_or_create_group(&self, name: &str) -> ReplicationResult<GroupId> {
        match self.get_group_id_by_name(name).await {
            Err(ReplicationError::NotFound { .. }) => self.create_group(name).await,
            other => other,
        }
    }

    async fn create_group(&self, name: &str) -> ReplicationResult<GroupId> {
        let url = self.endpoints.create_group.format(&[])?;
        let response = self
            .requester
            .send_with_json_body(Method::POST, &url, &json!({ "name": name }))
            .await?;
        expect_ok(&url, &response)?;

        let created: CreateGroupResponse = decode(&url, &response)?;
        info!(
            "Created group {} with id {} ({})",
            name, created.team_id, created.message
        );
        Ok(created.team_id)
    }

    async fn add_member(&self, group: GroupId, user: UserId) -> ReplicationResult<()> {
        let url = self.endpoints.add_member.format(&[Argument::Id(group.0)])?;
        let response = self
            .requester
            .send_with_json_body(Method::POST, &url, &json!({ "UserId": user }))
            .await?;
        expect_ok(&url, &response)
    }

    async fn remove_member(&self, group: GroupId, user: UserId) -> ReplicationResult<()> {
        let url = self
            .endpoints
            .remove_member
            .format(&[Argument::Id(group.0), Argument::Id(user.0)])?;
        let response = self.requester.send(Method::DELETE, &url).await?;
        expect_ok(&url, &response)
    }
}
