//! In-memory backend admin API for replication tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde_json::{Value, json};
use tokio::sync::Barrier;

use super::Replicator;
use super::endpoints::{EndpointTemplate, Endpoints};
use super::requester::{RawResponse, RequestResult, Requester};
use crate::identity::{
    Attributes, DISPLAY_NAME_ATTRIBUTE, GROUPS_ATTRIBUTE, Identity, MAIL_ATTRIBUTE,
};

pub const BASE_URL: &str = "http://grafana:3000/api";

pub fn endpoints() -> Endpoints {
    let url = |path: &str| EndpointTemplate::new(format!("{}{}", BASE_URL, path));
    Endpoints {
        get_user: url("/users/lookup?loginOrEmail=%s"),
        create_user: url("/admin/users"),
        get_user_groups: url("/users/%d/teams"),
        search_group: url("/teams/search?name=%s"),
        create_group: url("/teams"),
        add_member: url("/teams/%v/members"),
        remove_member: url("/teams/%v/members/%v"),
    }
}

pub fn replicator(api: &Arc<FakeAdminApi>) -> Replicator {
    Replicator::with_requester(api.clone(), endpoints())
}

pub fn identity(username: &str, groups: &[&str]) -> Identity {
    let mut attributes = Attributes::new();
    attributes.insert(
        GROUPS_ATTRIBUTE.to_string(),
        groups.iter().map(|g| g.to_string()).collect(),
    );
    attributes.insert(
        MAIL_ATTRIBUTE.to_string(),
        vec![format!("{}@example.com", username)],
    );
    attributes.insert(
        DISPLAY_NAME_ATTRIBUTE.to_string(),
        vec!["Alice Liddell".to_string()],
    );
    Identity::new(username, true, attributes)
}

#[derive(Default)]
struct State {
    calls: Vec<String>,
    bodies: Vec<Value>,
    /// (login, id); duplicates are possible when creations race.
    users: Vec<(String, u64)>,
    /// group name to id.
    groups: HashMap<String, u64>,
    /// (group id, user id).
    memberships: BTreeSet<(u64, u64)>,
    overrides: HashMap<String, (StatusCode, String)>,
    next_id: u64,
}

impl State {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        100 + self.next_id
    }
}

/// Stateful stand-in for the backend admin API. Records every call as
/// `"<METHOD> <path>"` relative to [`BASE_URL`].
#[derive(Default)]
pub struct FakeAdminApi {
    state: Mutex<State>,
    lookup_barrier: Option<Barrier>,
}

impl FakeAdminApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// User lookups wait until `n` of them are in flight.
    pub fn with_lookup_barrier(n: usize) -> Self {
        Self {
            lookup_barrier: Some(Barrier::new(n)),
            ..Self::default()
        }
    }

    pub fn add_user(&self, login: &str, id: u64) {
        self.state.lock().unwrap().users.push((login.to_string(), id));
    }

    pub fn add_group(&self, name: &str, id: u64) {
        self.state
            .lock()
            .unwrap()
            .groups
            .insert(name.to_string(), id);
    }

    pub fn add_membership(&self, group: u64, user: u64) {
        self.state.lock().unwrap().memberships.insert((group, user));
    }

    /// Answer `call` with a canned response instead of simulating it.
    pub fn respond(&self, call: &str, status: StatusCode, body: &str) {
        self.state
            .lock()
            .unwrap()
            .overrides
            .insert(call.to_string(), (status, body.to_string()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn last_body(&self) -> Option<Value> {
        self.state.lock().unwrap().bodies.last().cloned()
    }

    pub fn user_id(&self, login: &str) -> Option<u64> {
        let state = self.state.lock().unwrap();
        state
            .users
            .iter()
            .find(|(name, _)| name == login)
            .map(|(_, id)| *id)
    }

    pub fn users_named(&self, login: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.users.iter().filter(|(name, _)| name == login).count()
    }

    pub fn group_id(&self, name: &str) -> Option<u64> {
        self.state.lock().unwrap().groups.get(name).copied()
    }

    /// Sorted names of the groups `user` is a member of.
    pub fn groups_of(&self, user: u64) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut names: Vec<String> = state
            .memberships
            .iter()
            .filter(|(_, member)| *member == user)
            .filter_map(|(group, _)| {
                state
                    .groups
                    .iter()
                    .find(|(_, id)| *id == group)
                    .map(|(name, _)| name.clone())
            })
            .collect();
        names.sort();
        names
    }

    fn handle(&self, method: &Method, url: &str, body: Option<&Value>) -> RawResponse {
        let path = url.strip_prefix(BASE_URL).unwrap_or(url);
        let call = format!("{} {}", method, path);

        let mut state = self.state.lock().unwrap();
        state.calls.push(call.clone());
        if let Some(body) = body {
            state.bodies.push(body.clone());
        }
        if let Some((status, body)) = state.overrides.get(&call) {
            return RawResponse::new(*status, body.clone());
        }

        let (path, query) = path.split_once('?').unwrap_or((path, ""));
        let query = urlencoding::decode(query.split_once('=').map_or("", |(_, v)| v))
            .unwrap()
            .into_owned();
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

        match (method.as_str(), segments.as_slice()) {
            ("GET", ["users", "lookup"]) => match state.users.iter().find(|(n, _)| *n == query) {
                Some((login, id)) => ok(json!({
                    "id": id,
                    "email": format!("{}@example.com", login),
                    "name": login,
                    "login": login,
                })),
                None => RawResponse::new(StatusCode::NOT_FOUND, "User not found"),
            },
            ("POST", ["admin", "users"]) => {
                let login = body
                    .and_then(|b| b["login"].as_str())
                    .unwrap_or_default()
                    .to_string();
                let id = state.allocate_id();
                state.users.push((login, id));
                ok(json!({"id": id, "message": "User created"}))
            }
            ("GET", ["users", user, "teams"]) => {
                let user: u64 = user.parse().unwrap();
                let teams: Vec<Value> = state
                    .memberships
                    .iter()
                    .filter(|(_, member)| *member == user)
                    .filter_map(|(group, _)| {
                        state
                            .groups
                            .iter()
                            .find(|(_, id)| *id == group)
                            .map(|(name, id)| json!({"id": id, "name": name}))
                    })
                    .collect();
                ok(Value::Array(teams))
            }
            ("GET", ["teams", "search"]) => match state.groups.get(&query) {
                Some(id) => ok(json!({
                    "totalCount": 1,
                    "teams": [{"id": id, "name": query}],
                })),
                None => ok(json!({"totalCount": 0, "teams": []})),
            },
            ("POST", ["teams"]) => {
                let name = body
                    .and_then(|b| b["name"].as_str())
                    .unwrap_or_default()
                    .to_string();
                let id = state.allocate_id();
                state.groups.insert(name, id);
                ok(json!({"message": "Team created", "teamId": id}))
            }
            ("POST", ["teams", group, "members"]) => {
                let group: u64 = group.parse().unwrap();
                let user = body.and_then(|b| b["UserId"].as_u64()).unwrap();
                state.memberships.insert((group, user));
                ok(json!({"message": "Member added to Team"}))
            }
            ("DELETE", ["teams", group, "members", user]) => {
                let group: u64 = group.parse().unwrap();
                let user: u64 = user.parse().unwrap();
                if state.memberships.remove(&(group, user)) {
                    ok(json!({"message": "Team Member removed"}))
                } else {
                    RawResponse::new(StatusCode::NOT_FOUND, "Team member not found")
                }
            }
            _ => RawResponse::new(StatusCode::NOT_FOUND, "Not found"),
        }
    }
}

fn ok(body: Value) -> RawResponse {
    RawResponse::new(StatusCode::OK, body.to_string())
}

#[async_trait]
impl Requester for FakeAdminApi {
    async fn send(&self, method: Method, url: &str) -> RequestResult<RawResponse> {
        let response = self.handle(&method, url, None);
        if let Some(barrier) = &self.lookup_barrier {
            if url.contains("/users/lookup") {
                barrier.wait().await;
            }
        }
        Ok(response)
    }

    async fn send_with_json_body(
        &self,
        method: Method,
        url: &str,
        payload: &Value,
    ) -> RequestResult<RawResponse> {
        Ok(self.handle(&method, url, Some(payload)))
    }
}
