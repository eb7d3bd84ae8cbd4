//! Test utilities and common setup.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use carp::config::Configuration;
use carp::identity::{Attributes, GROUPS_ATTRIBUTE, MAIL_ATTRIBUTE};
use carp::proxy::create_router;
use carp::replicator::EndpointTemplate;
use carp::{SsoClient, SsoClients};
use serde_json::json;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const USER_HEADER: &str = "x-test-user";
pub const GROUPS_HEADER: &str = "x-test-groups";
pub const FIRST_REQUEST_HEADER: &str = "x-test-first";

pub const LOGIN_URL: &str = "https://cas.example.com/cas/login";
pub const LOGOUT_URL: &str = "https://cas.example.com/cas/logout";

pub const FIREFOX: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// SSO client reading the session from test headers.
pub struct HeaderSso;

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

#[async_trait]
impl SsoClient for HeaderSso {
    async fn handle(&self, _parts: &mut Parts) -> Result<(), Response> {
        Ok(())
    }

    fn is_authenticated(&self, parts: &Parts) -> bool {
        header(parts, USER_HEADER).is_some()
    }

    fn redirect_to_login(&self, _parts: &Parts) -> Response {
        Redirect::to(LOGIN_URL).into_response()
    }

    fn redirect_to_logout(&self, _parts: &Parts) -> Response {
        Redirect::to(LOGOUT_URL).into_response()
    }

    fn is_first_authenticated_request(&self, parts: &Parts) -> bool {
        header(parts, FIRST_REQUEST_HEADER).is_some()
    }

    fn username(&self, parts: &Parts) -> String {
        header(parts, USER_HEADER).unwrap_or_default().to_string()
    }

    fn attributes(&self, parts: &Parts) -> Attributes {
        let username = self.username(parts);
        let groups = header(parts, GROUPS_HEADER)
            .map(|g| g.split(',').map(str::to_string).collect())
            .unwrap_or_default();

        let mut attributes = Attributes::new();
        attributes.insert(GROUPS_ATTRIBUTE.to_string(), groups);
        attributes.insert(
            MAIL_ATTRIBUTE.to_string(),
            vec![format!("{}@example.com", username)],
        );
        attributes
    }
}

pub fn sso_clients() -> SsoClients {
    let client = Arc::new(HeaderSso);
    SsoClients::new(client.clone(), client)
}

/// Backend answer describing the request it received.
struct Echo;

impl Respond for Echo {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let headers: BTreeMap<String, String> = request
            .headers
            .iter()
            .filter(|(name, _)| name.as_str().starts_with("x-carp-"))
            .map(|(name, value)| {
                (name.to_string(), value.to_str().unwrap_or_default().to_string())
            })
            .collect();

        ResponseTemplate::new(200).set_body_json(json!({
            "method": request.method.to_string(),
            "path": request.url.path(),
            "query": request.url.query(),
            "headers": headers,
            "body": String::from_utf8_lossy(&request.body),
        }))
    }
}

/// Backend mock answering every request not matched by a more specific mock
/// with a description of that request.
pub async fn backend() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(Echo)
        .with_priority(10)
        .mount(&server)
        .await;
    server
}

pub fn configuration(backend: &MockServer) -> Configuration {
    let url = |path: &str| EndpointTemplate::new(format!("{}/api{}", backend.uri(), path));
    Configuration {
        target_url: backend.uri(),
        principal_header: "X-Carp-Principal".to_string(),
        role_header: "X-Carp-Role".to_string(),
        mail_header: "X-Carp-Mail".to_string(),
        name_header: "X-Carp-Name".to_string(),
        get_user_endpoint: url("/users/lookup?loginOrEmail=%s"),
        create_user_endpoint: url("/admin/users"),
        get_user_groups_endpoint: url("/users/%v/teams"),
        search_team_by_name_endpoint: url("/teams/search?name=%s"),
        create_group_endpoint: url("/teams"),
        add_user_to_group_endpoint: url("/teams/%v/members"),
        remove_user_from_group_endpoint: url("/teams/%v/members/%v"),
        admin_username: "admin".to_string(),
        admin_password: "admin".to_string(),
        super_admin_group: "cesAdmin".to_string(),
        admin_group: "grafanaAdmin".to_string(),
        writer_group: "grafanaWriter".to_string(),
        reader_group: "grafanaReader".to_string(),
        ..Configuration::default()
    }
}

/// Create the proxy router in front of `backend`.
pub fn test_app(config: &Configuration) -> Router {
    config.validate().unwrap();
    create_router(config, sso_clients()).unwrap()
}

/// Requests `backend` received whose path starts with `prefix`.
pub async fn received(backend: &MockServer, prefix: &str) -> Vec<Request> {
    backend
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path().starts_with(prefix))
        .collect()
}
