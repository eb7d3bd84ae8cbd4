//! Backend admin API endpoint templates.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{ReplicationError, ReplicationResult};

/// Value substituted into an endpoint template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Argument<'a> {
    /// Free text, percent-encoded on substitution.
    Text(&'a str),
    /// Numeric id, rendered as decimal.
    Id(u64),
}

impl fmt::Display for Argument<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Text(text) => write!(f, "{}", urlencoding::encode(text)),
            Argument::Id(id) => write!(f, "{}", id),
        }
    }
}

/// URL with printf-style placeholders (`%s`, `%v`, `%d`; `%%` is a literal `%`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointTemplate(String);

impl EndpointTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of placeholders, or an error for an unknown directive.
    pub fn placeholder_count(&self) -> Result<usize, String> {
        let mut count = 0;
        let mut chars = self.0.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                continue;
            }
            match chars.next() {
                Some('%') => {}
                Some('s' | 'v' | 'd') => count += 1,
                Some(other) => return Err(format!("unknown directive %{}", other)),
                None => return Err("dangling %".to_string()),
            }
        }
        Ok(count)
    }

    /// Render the template with `args` substituted in order.
    pub fn format(&self, args: &[Argument<'_>]) -> ReplicationResult<String> {
        let invalid = |reason: String| ReplicationError::Endpoint {
            template: self.0.clone(),
            reason,
        };

        let mut out = String::with_capacity(self.0.len());
        let mut args = args.iter();
        let mut chars = self.0.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('%') => out.push('%'),
                Some('s' | 'v' | 'd') => {
                    let arg = args
                        .next()
                        .ok_or_else(|| invalid("too few arguments".to_string()))?;
                    out.push_str(&arg.to_string());
                }
                Some(other) => return Err(invalid(format!("unknown directive %{}", other))),
                None => return Err(invalid("dangling %".to_string())),
            }
        }

        if args.next().is_some() {
            return Err(invalid("too many arguments".to_string()));
        }
        Ok(out)
    }
}

impl fmt::Display for EndpointTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The backend admin API endpoints used during replication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoints {
    /// GET user by login name. Argument: user name.
    pub get_user: EndpointTemplate,
    /// POST new user.
    pub create_user: EndpointTemplate,
    /// GET groups of a user. Argument: user id.
    pub get_user_groups: EndpointTemplate,
    /// GET group search by name. Argument: group name.
    pub search_group: EndpointTemplate,
    /// POST new group.
    pub create_group: EndpointTemplate,
    /// POST group member. Argument: group id.
    pub add_member: EndpointTemplate,
    /// DELETE group member. Arguments: group id, user id.
    pub remove_member: EndpointTemplate,
}

impl Endpoints {
    /// Each template with its configuration key and expected argument count.
    pub fn arities(&self) -> [(&'static str, &EndpointTemplate, usize); 7] {
        [
            ("get-user-endpoint", &self.get_user, 1),
            ("create-user-endpoint", &self.create_user, 0),
            ("get-user-groups-endpoint", &self.get_user_groups, 1),
            ("search-team-by-name-endpoint", &self.search_group, 1),
            ("create-group-endpoint", &self.create_group, 0),
            ("add-user-to-group-endpoint", &self.add_member, 1),
            ("remove-user-from-group-endpoint", &self.remove_member, 2),
        ]
    }
}
