use std::collections::BTreeSet;

use thiserror::Error;
use tracing::{debug, error};

use crate::engine::metrics::QualifiedPush;

/// Failures reported by the remote multi-session engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RemoteError {
    #[error("Remote engine ran out of memory: {0}")]
    OutOfMemory(String),

    #[error("Remote session error: {0}")]
    Session(String),
}

/// Errors that can occur while evaluating a query against the remote sessions.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Cannot execute an empty list of iterate handlers")]
    NoIterateHandlers,

    #[error("All scopes must match: expected {expected:?}, found {found:?}")]
    ScopeMismatch {
        expected: BTreeSet<String>,
        found: BTreeSet<String>,
    },

    #[error("Field is neither all int nor all string field: {0}")]
    FieldTypeAmbiguous(String),

    #[error(
        "Unsupported metric-filter shape: requires 1 group with target=1, positive=1, negative=0 \
         (numGroups={num_groups}, target={target}, positive={positive}, negative={negative})"
    )]
    UnsupportedMetricFilterShape {
        num_groups: usize,
        target: usize,
        positive: usize,
        negative: usize,
    },

    #[error("{0} cannot be evaluated over all groups at once")]
    BatchUnsupported(&'static str),

    #[error("{0} cannot be evaluated per term")]
    PerTermUnsupported(&'static str),

    #[error("Push was never registered: {0}")]
    UnregisteredPush(QualifiedPush),

    #[error("{0} was evaluated before register")]
    NotRegistered(&'static str),

    #[error("Unknown dataset session: {0}")]
    UnknownSession(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No group stats lookup named {0} for the current partition")]
    UnknownLookup(String),

    #[error("Invalid regex {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Number of groups [{num_groups}] exceeds the group limit [{limit}]")]
    GroupLimitExceeded { num_groups: usize, limit: usize },

    #[error("Cannot use window where the window overlaps missing data")]
    WindowOverlapsMissingData,

    #[error("Expected {expected} pushed stat(s) for dataset {session}, remote reported {actual}")]
    UnexpectedStatCount {
        session: String,
        expected: usize,
        actual: usize,
    },

    #[error("Remote call failed: {0}")]
    Remote(#[from] RemoteError),
}

impl ExecutionError {
    /// True when the remote engine signalled it ran out of resources.
    pub fn is_remote_resource(&self) -> bool {
        matches!(self, ExecutionError::Remote(RemoteError::OutOfMemory(_)))
    }

    pub fn log_error(&self) {
        match self {
            ExecutionError::NoIterateHandlers => {
                error!("Iterate batch had no handlers");
            }
            ExecutionError::ScopeMismatch { expected, found } => {
                error!("Iterate handler scopes differ");
                debug!("Scope mismatch details: expected={:?} found={:?}", expected, found);
            }
            ExecutionError::FieldTypeAmbiguous(field) => {
                error!("Field type is ambiguous across datasets: {}", field);
            }
            ExecutionError::UnsupportedMetricFilterShape {
                num_groups,
                target,
                positive,
                negative,
            } => {
                error!("Metric filter used outside its one-group shape");
                debug!(
                    "Metric filter shape: num_groups={} target={} positive={} negative={}",
                    num_groups, target, positive, negative
                );
            }
            ExecutionError::BatchUnsupported(node) => {
                error!("Batch evaluation unsupported for {}", node);
            }
            ExecutionError::PerTermUnsupported(node) => {
                error!("Per-term evaluation unsupported for {}", node);
            }
            ExecutionError::UnregisteredPush(push) => {
                error!("Evaluated an unregistered push: {}", push);
                debug!("Unregistered push details: {:?}", push);
            }
            ExecutionError::NotRegistered(node) => {
                error!("Evaluated {} before register", node);
            }
            ExecutionError::UnknownSession(name) => {
                error!("Unknown dataset session: {}", name);
            }
            ExecutionError::InvalidArgument(msg) => {
                error!("Invalid argument: {}", msg);
            }
            ExecutionError::UnknownLookup(name) => {
                error!("Unknown group stats lookup: {}", name);
            }
            ExecutionError::InvalidRegex { pattern, source } => {
                error!("Invalid regex: {}", pattern);
                debug!("Regex error details: {:?}", source);
            }
            ExecutionError::GroupLimitExceeded { num_groups, limit } => {
                error!("Group limit exceeded: {} > {}", num_groups, limit);
            }
            ExecutionError::WindowOverlapsMissingData => {
                error!("Window metric overlapped missing data");
            }
            ExecutionError::UnexpectedStatCount {
                session,
                expected,
                actual,
            } => {
                error!("Unexpected stat count for dataset {}", session);
                debug!("Stat count details: expected={} actual={}", expected, actual);
            }
            ExecutionError::Remote(e) => {
                error!("Remote call failed: {}", e);
                debug!("Remote error details: {:?}", e);
            }
        }
    }
}

pub type ExecResult<T> = Result<T, ExecutionError>;
