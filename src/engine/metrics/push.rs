use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::engine::groupkeys::GroupKeySet;

/// A per-document stat expression scoped to one dataset session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedPush {
    pub session_name: String,
    pub pushes: Vec<String>,
}

impl QualifiedPush {
    pub fn new<S: Into<String>>(session_name: impl Into<String>, pushes: Vec<S>) -> Self {
        Self {
            session_name: session_name.into(),
            pushes: pushes.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for QualifiedPush {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:[{}]", self.session_name, self.pushes.join(", "))
    }
}

/// Column index assigned to every pushed stat.
pub type PushIndexes = HashMap<QualifiedPush, usize>;

/// Anything that needs pushed stats before it can be evaluated.
pub trait Pushable {
    /// Every push this node or its children read.
    fn requires(&self) -> HashSet<QualifiedPush>;

    /// Captures assigned column indexes and the current partition. Called
    /// once per compiled command before any evaluation.
    fn register(&mut self, indexes: &PushIndexes, group_key_set: &Arc<GroupKeySet>);
}
