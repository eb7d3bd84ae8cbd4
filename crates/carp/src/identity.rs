//! Caller identity asserted by the SSO system and the roles derived from it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// SSO attribute holding the caller's group memberships.
pub const GROUPS_ATTRIBUTE: &str = "groups";
/// SSO attribute holding the caller's mail address.
pub const MAIL_ATTRIBUTE: &str = "mail";
/// SSO attribute holding the caller's display name.
pub const DISPLAY_NAME_ATTRIBUTE: &str = "displayName";

/// Raw SSO assertion values. Keys are case-sensitive, values may repeat.
pub type Attributes = HashMap<String, Vec<String>>;

/// Identity established by the authentication stage for a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Login name of the caller.
    pub username: String,
    /// True only on the first request of a freshly established SSO session.
    pub replicate: bool,
    /// Raw SSO attributes.
    pub attributes: Attributes,
}

impl Identity {
    /// Create a new identity.
    pub fn new(username: impl Into<String>, replicate: bool, attributes: Attributes) -> Self {
        Self {
            username: username.into(),
            replicate,
            attributes,
        }
    }

    /// All values of an attribute, empty when the attribute is absent.
    pub fn attribute(&self, name: &str) -> &[String] {
        self.attributes
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// First value of an attribute, empty when the attribute is absent.
    pub fn first_attribute(&self, name: &str) -> &str {
        self.attribute(name)
            .first()
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Groups the caller is a member of.
    pub fn groups(&self) -> &[String] {
        self.attribute(GROUPS_ATTRIBUTE)
    }

    /// The caller's mail address.
    pub fn mail(&self) -> &str {
        self.first_attribute(MAIL_ATTRIBUTE)
    }

    /// The caller's display name.
    pub fn display_name(&self) -> &str {
        self.first_attribute(DISPLAY_NAME_ATTRIBUTE)
    }
}

/// Backend role, derived from privilege group membership.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Editor,
    Viewer,
    #[default]
    None,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "Admin"),
            Role::Editor => write!(f, "Editor"),
            Role::Viewer => write!(f, "Viewer"),
            Role::None => write!(f, "None"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "editor" => Ok(Role::Editor),
            "viewer" => Ok(Role::Viewer),
            "none" => Ok(Role::None),
            _ => Err(format!("unknown role: {}", s)),
        }
    }
}

/// The four privilege groups, in descending order of privilege.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegeGroups {
    pub super_admin: String,
    pub admin: String,
    pub writer: String,
    pub reader: String,
}

impl PrivilegeGroups {
    /// Groups paired with the role they grant, highest privilege first.
    pub fn ranked(&self) -> [(&str, Role); 4] {
        [
            (self.super_admin.as_str(), Role::Admin),
            (self.admin.as_str(), Role::Admin),
            (self.writer.as_str(), Role::Editor),
            (self.reader.as_str(), Role::Viewer),
        ]
    }

    /// Whether any of the given groups is a privilege group.
    pub fn grants_access(&self, groups: &[String]) -> bool {
        let ranked = self.ranked();
        groups
            .iter()
            .any(|group| ranked.iter().any(|(name, _)| *name == group.as_str()))
    }

    /// Highest role granted by the given groups; first match wins.
    pub fn role_for(&self, groups: &[String]) -> Role {
        self.ranked()
            .into_iter()
            .find(|(name, _)| groups.iter().any(|group| group.as_str() == *name))
            .map(|(_, role)| role)
            .unwrap_or_default()
    }
}
