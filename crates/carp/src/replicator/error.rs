//! Replication error types.

use std::fmt;

use axum::http::StatusCode;
use thiserror::Error;

use super::requester::RequestError;

/// Errors raised while reconciling the backend's users and groups.
#[derive(Debug, Error)]
pub enum ReplicationError {
    /// The request itself failed (transport, timeout, cancellation).
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The backend does not know the requested entity.
    #[error("not found: {url}")]
    NotFound { url: String },

    /// The backend answered with a status code the caller cannot handle.
    #[error("unexpected status code {status} from {url}")]
    UnexpectedStatus { status: StatusCode, url: String },

    /// The response body does not have the expected shape.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The response body decoded but is missing required data.
    #[error("malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    /// More than one backend group carries the same name.
    #[error("ambiguous group name {name}: {count} groups found")]
    AmbiguousGroup { name: String, count: u64 },

    /// An endpoint template could not be rendered.
    #[error("invalid endpoint template {template}: {reason}")]
    Endpoint { template: String, reason: String },

    /// A request payload could not be encoded.
    #[error("failed to encode request payload: {0}")]
    Encode(#[from] serde_json::Error),

    /// Reconciling a single group failed.
    #[error("group {group}: {source}")]
    Group {
        group: String,
        #[source]
        source: Box<ReplicationError>,
    },

    /// Several independent failures.
    #[error(transparent)]
    Aggregate(#[from] AggregatedError),
}

impl ReplicationError {
    /// Attach the group name this error belongs to.
    pub fn for_group(self, group: impl Into<String>) -> Self {
        ReplicationError::Group {
            group: group.into(),
            source: Box::new(self),
        }
    }

    /// The error beneath any per-group wrappers.
    pub fn root_cause(&self) -> &ReplicationError {
        match self {
            ReplicationError::Group { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root_cause(), ReplicationError::NotFound { .. })
    }
}

pub type ReplicationResult<T> = Result<T, ReplicationError>;

/// Independent failures of one reconciliation pass, all of them kept.
#[derive(Debug, Default)]
pub struct AggregatedError {
    operation: String,
    causes: Vec<ReplicationError>,
}

impl AggregatedError {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            causes: Vec::new(),
        }
    }

    pub fn push(&mut self, cause: ReplicationError) {
        self.causes.push(cause);
    }

    pub fn len(&self) -> usize {
        self.causes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.causes.is_empty()
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn causes(&self) -> &[ReplicationError] {
        &self.causes
    }

    /// Whether any cause, or the root cause beneath it, matches `predicate`.
    pub fn contains(&self, predicate: impl Fn(&ReplicationError) -> bool) -> bool {
        self.causes
            .iter()
            .any(|cause| predicate(cause) || predicate(cause.root_cause()))
    }

    /// `Ok` when nothing failed, the aggregate otherwise.
    pub fn into_result(self) -> ReplicationResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ReplicationError::Aggregate(self))
        }
    }
}

impl fmt::Display for AggregatedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed for {} group(s)", self.operation, self.causes.len())?;
        for cause in &self.causes {
            write!(f, "\n{}", cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregatedError {}
