//! Proxy configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::http::{HeaderName, Uri};
use config::{Config, File, FileFormat};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::{AuthenticationSettings, SessionCookie};
use crate::authorization::TrustHeaders;
use crate::identity::PrivilegeGroups;
use crate::logging::{self, LogFormat};
use crate::replicator::{self, EndpointTemplate, Endpoints};

/// Configuration file used when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "carp.yml";

const REDACTED: &str = "********";

/// Proxy configuration as read from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Configuration {
    /// Public base URL of the proxied application.
    pub base_url: String,
    /// URL of the CAS server.
    pub cas_url: String,
    /// Service URL registered with CAS.
    pub service_url: String,
    /// Backend the pipeline forwards to.
    pub target_url: String,
    /// Directory holding proxy-owned static assets.
    pub resource_path: String,
    /// URL path the static assets are served under. Not served when unset.
    pub carp_resource_path: Option<String>,
    /// Skip TLS certificate checks when talking to CAS.
    pub skip_ssl_verification: bool,
    pub port: u16,

    pub principal_header: String,
    pub role_header: String,
    pub mail_header: String,
    pub name_header: String,

    /// Referer suffix of the backend's logout page.
    pub logout_path: Option<String>,
    /// Path the backend's logout page redirects to.
    pub logout_redirect_path: Option<String>,
    pub session_cookie_name: String,
    pub session_cookie_paths: Vec<String>,

    /// Let REST requests through without authentication.
    pub forward_unauthenticated_rest_requests: bool,

    pub log_level: String,
    pub log_format: LogFormat,

    pub get_user_endpoint: EndpointTemplate,
    pub create_user_endpoint: EndpointTemplate,
    pub get_user_groups_endpoint: EndpointTemplate,
    pub search_team_by_name_endpoint: EndpointTemplate,
    pub create_group_endpoint: EndpointTemplate,
    pub add_user_to_group_endpoint: EndpointTemplate,
    pub remove_user_from_group_endpoint: EndpointTemplate,

    /// Backend admin user. Accepts `env:VAR_NAME`.
    pub admin_username: String,
    /// Backend admin password. Accepts `env:VAR_NAME`.
    pub admin_password: String,
    pub request_timeout_seconds: u64,

    pub super_admin_group: String,
    pub admin_group: String,
    pub writer_group: String,
    pub reader_group: String,

    /// Companion application started alongside the proxy.
    pub application_exec_command: Option<String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            cas_url: String::new(),
            service_url: String::new(),
            target_url: String::new(),
            resource_path: "resources".to_string(),
            carp_resource_path: None,
            skip_ssl_verification: false,
            port: 8080,
            principal_header: "X-Carp-Principal".to_string(),
            role_header: "X-Carp-Role".to_string(),
            mail_header: "X-Carp-Mail".to_string(),
            name_header: "X-Carp-Name".to_string(),
            logout_path: None,
            logout_redirect_path: None,
            session_cookie_name: "_cas_session".to_string(),
            session_cookie_paths: vec!["/".to_string()],
            forward_unauthenticated_rest_requests: false,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            get_user_endpoint: EndpointTemplate::default(),
            create_user_endpoint: EndpointTemplate::default(),
            get_user_groups_endpoint: EndpointTemplate::default(),
            search_team_by_name_endpoint: EndpointTemplate::default(),
            create_group_endpoint: EndpointTemplate::default(),
            add_user_to_group_endpoint: EndpointTemplate::default(),
            remove_user_from_group_endpoint: EndpointTemplate::default(),
            admin_username: String::new(),
            admin_password: String::new(),
            request_timeout_seconds: replicator::DEFAULT_TIMEOUT.as_secs(),
            super_admin_group: String::new(),
            admin_group: String::new(),
            writer_group: String::new(),
            reader_group: String::new(),
            application_exec_command: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid path {path}: {message}")]
    Path { path: String, message: String },

    #[error(transparent)]
    Invalid(#[from] ConfigValidationError),
}

/// Load and validate the configuration file at `path`.
pub fn load(path: &Path) -> Result<Configuration, ConfigError> {
    let built = Config::builder()
        .set_default("port", 8080_i64)?
        .set_default("log-level", "info")?
        .add_source(File::from(path).format(FileFormat::Yaml).required(true))
        .build()?;

    let mut configuration: Configuration = built.try_deserialize()?;
    configuration.resource_path = expand_str_path(&configuration.resource_path)?
        .display()
        .to_string();

    configuration.validate()?;
    Ok(configuration)
}

fn expand_str_path(path: &str) -> Result<PathBuf, ConfigError> {
    shellexpand::full(path)
        .map(|expanded| PathBuf::from(expanded.as_ref()))
        .map_err(|e| ConfigError::Path {
            path: path.to_string(),
            message: e.to_string(),
        })
}

/// Expand `env:VAR_NAME` references.
fn resolve_secret(value: &str) -> Result<String, ConfigValidationError> {
    match value.strip_prefix("env:") {
        Some(var_name) => match std::env::var(var_name) {
            Ok(secret) if !secret.is_empty() => Ok(secret),
            Ok(_) => Err(ConfigValidationError::EnvVarEmpty(var_name.to_string())),
            Err(_) => Err(ConfigValidationError::EnvVarNotFound(var_name.to_string())),
        },
        None => Ok(value.to_string()),
    }
}

fn header_name(key: &'static str, value: &str) -> Result<HeaderName, ConfigValidationError> {
    HeaderName::try_from(value).map_err(|_| ConfigValidationError::InvalidHeaderName {
        key,
        value: value.to_string(),
    })
}

impl Configuration {
    /// Check the configuration for values the proxy cannot run with.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.port == 0 {
            return Err(ConfigValidationError::InvalidPort);
        }

        if self.log_level.parse::<LevelFilter>().is_err() {
            return Err(ConfigValidationError::InvalidLogLevel(
                self.log_level.clone(),
            ));
        }

        if self.request_timeout_seconds == 0 {
            return Err(ConfigValidationError::InvalidTimeout);
        }

        self.target_uri()?;
        self.trust_headers()?;

        for (key, template, expected) in self.endpoints().arities() {
            if template.as_str().is_empty() {
                return Err(ConfigValidationError::MissingValue(key));
            }
            match template.placeholder_count() {
                Ok(found) if found == expected => {}
                Ok(found) => {
                    return Err(ConfigValidationError::EndpointArity {
                        key,
                        expected,
                        found,
                    });
                }
                Err(reason) => return Err(ConfigValidationError::InvalidEndpoint { key, reason }),
            }
        }

        for (key, group) in [
            ("super-admin-group", &self.super_admin_group),
            ("admin-group", &self.admin_group),
            ("writer-group", &self.writer_group),
            ("reader-group", &self.reader_group),
        ] {
            if group.trim().is_empty() {
                return Err(ConfigValidationError::MissingValue(key));
            }
        }

        resolve_secret(&self.admin_username)?;
        resolve_secret(&self.admin_password)?;

        if let Some(mount) = &self.carp_resource_path {
            if !mount.starts_with('/') || mount.trim_end_matches('/').is_empty() {
                return Err(ConfigValidationError::InvalidResourcePath(mount.clone()));
            }
            if self.resource_path.is_empty() {
                return Err(ConfigValidationError::MissingValue("resource-path"));
            }
        }

        Ok(())
    }

    /// The forward target; must be an absolute `http` URL.
    pub fn target_uri(&self) -> Result<Uri, ConfigValidationError> {
        let invalid = || ConfigValidationError::InvalidTargetUrl(self.target_url.clone());

        if self.target_url.is_empty() {
            return Err(ConfigValidationError::MissingValue("target-url"));
        }
        let uri: Uri = self.target_url.parse().map_err(|_| invalid())?;
        if uri.scheme_str() != Some("http") || uri.authority().is_none() {
            return Err(invalid());
        }
        Ok(uri)
    }

    pub fn trust_headers(&self) -> Result<TrustHeaders, ConfigValidationError> {
        Ok(TrustHeaders {
            principal: header_name("principal-header", &self.principal_header)?,
            role: header_name("role-header", &self.role_header)?,
            mail: header_name("mail-header", &self.mail_header)?,
            name: header_name("name-header", &self.name_header)?,
        })
    }

    /// Configured log level; `info` if it does not parse.
    pub fn log_level_filter(&self) -> LevelFilter {
        logging::parse_level(&self.log_level)
    }

    pub fn privilege_groups(&self) -> PrivilegeGroups {
        PrivilegeGroups {
            super_admin: self.super_admin_group.clone(),
            admin: self.admin_group.clone(),
            writer: self.writer_group.clone(),
            reader: self.reader_group.clone(),
        }
    }

    pub fn authentication_settings(&self) -> AuthenticationSettings {
        AuthenticationSettings {
            forward_unauthenticated_rest_requests: self.forward_unauthenticated_rest_requests,
            logout_path: self.logout_path.clone(),
            logout_redirect_path: self.logout_redirect_path.clone(),
            session_cookie: Some(SessionCookie {
                name: self.session_cookie_name.clone(),
                paths: self.session_cookie_paths.clone(),
            })
            .filter(|cookie| !cookie.name.is_empty()),
        }
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            get_user: self.get_user_endpoint.clone(),
            create_user: self.create_user_endpoint.clone(),
            get_user_groups: self.get_user_groups_endpoint.clone(),
            search_group: self.search_team_by_name_endpoint.clone(),
            create_group: self.create_group_endpoint.clone(),
            add_member: self.add_user_to_group_endpoint.clone(),
            remove_member: self.remove_user_from_group_endpoint.clone(),
        }
    }

    /// Replicator settings with secrets resolved.
    pub fn replicator_configuration(
        &self,
    ) -> Result<replicator::Configuration, ConfigValidationError> {
        Ok(replicator::Configuration {
            username: resolve_secret(&self.admin_username)?,
            password: resolve_secret(&self.admin_password)?,
            timeout: Duration::from_secs(self.request_timeout_seconds),
            endpoints: self.endpoints(),
        })
    }

    /// Copy safe to print. Literal passwords are masked, `env:` references kept.
    pub fn redacted(&self) -> Configuration {
        let mut copy = self.clone();
        if !copy.admin_password.is_empty() && !copy.admin_password.starts_with("env:") {
            copy.admin_password = REDACTED.to_string();
        }
        copy
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// A required value is empty.
    MissingValue(&'static str),
    /// Port 0 cannot be listened on.
    InvalidPort,
    /// Not one of off, error, warn, info, debug, trace.
    InvalidLogLevel(String),
    /// Admin API calls need a non-zero timeout.
    InvalidTimeout,
    /// Target is not an absolute http URL.
    InvalidTargetUrl(String),
    /// Static asset mount path is not a sub path.
    InvalidResourcePath(String),
    /// A trust header name is not a valid HTTP header name.
    InvalidHeaderName { key: &'static str, value: String },
    /// Endpoint template with the wrong number of placeholders.
    EndpointArity {
        key: &'static str,
        expected: usize,
        found: usize,
    },
    /// Endpoint template that cannot be parsed.
    InvalidEndpoint { key: &'static str, reason: String },
    /// Environment variable not found (for `env:VAR_NAME` syntax).
    EnvVarNotFound(String),
    /// Environment variable is empty (for `env:VAR_NAME` syntax).
    EnvVarEmpty(String),
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingValue(key) => write!(f, "'{}' must be set.", key),
            Self::InvalidPort => write!(f, "'port' must be between 1 and 65535."),
            Self::InvalidLogLevel(level) => write!(
                f,
                "'log-level' must be one of off, error, warn, info, debug, trace, got '{}'.",
                level
            ),
            Self::InvalidTimeout => {
                write!(f, "'request-timeout-seconds' must be greater than 0.")
            }
            Self::InvalidTargetUrl(url) => {
                write!(f, "'target-url' must be an absolute http URL, got '{}'.", url)
            }
            Self::InvalidResourcePath(path) => {
                write!(
                    f,
                    "'carp-resource-path' must be an absolute path below '/', got '{}'.",
                    path
                )
            }
            Self::InvalidHeaderName { key, value } => {
                write!(f, "'{}' is not a valid header name: '{}'.", key, value)
            }
            Self::EndpointArity {
                key,
                expected,
                found,
            } => {
                write!(
                    f,
                    "'{}' must contain {} placeholder(s), found {}.",
                    key, expected, found
                )
            }
            Self::InvalidEndpoint { key, reason } => {
                write!(f, "'{}' is not a valid endpoint template: {}.", key, reason)
            }
            Self::EnvVarNotFound(var) => {
                write!(
                    f,
                    "Environment variable '{}' not found (referenced via env:{} in config).",
                    var, var
                )
            }
            Self::EnvVarEmpty(var) => {
                write!(
                    f,
                    "Environment variable '{}' is empty (referenced via env:{} in config).",
                    var, var
                )
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}
