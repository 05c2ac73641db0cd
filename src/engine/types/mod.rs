use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Field term seen during iteration, borrowed from the row being visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Term<'a> {
    Int(i64),
    Str(&'a str),
}

impl<'a> Term<'a> {
    pub fn to_owned_value(&self) -> TermValue {
        match self {
            Term::Int(v) => TermValue::Int(*v),
            Term::Str(s) => TermValue::Str((*s).to_string()),
        }
    }

    /// Textual form used by string matching (regex, string equality).
    pub fn as_text(&self) -> std::borrow::Cow<'a, str> {
        match self {
            Term::Int(v) => std::borrow::Cow::Owned(v.to_string()),
            Term::Str(s) => std::borrow::Cow::Borrowed(s),
        }
    }
}

/// Owned term, as held by queries, filters and top-k results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TermValue {
    Int(i64),
    Str(String),
}

impl TermValue {
    pub fn as_term(&self) -> Term<'_> {
        match self {
            TermValue::Int(v) => Term::Int(*v),
            TermValue::Str(s) => Term::Str(s),
        }
    }

    /// Equality against a live term; ints and strings never match each other.
    pub fn matches(&self, term: Term<'_>) -> bool {
        match (self, term) {
            (TermValue::Int(a), Term::Int(b)) => *a == b,
            (TermValue::Str(a), Term::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Ord for TermValue {
    /// Ints sort numerically before strings, strings lexicographically.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (TermValue::Int(a), TermValue::Int(b)) => a.cmp(b),
            (TermValue::Str(a), TermValue::Str(b)) => a.cmp(b),
            (TermValue::Int(_), TermValue::Str(_)) => Ordering::Less,
            (TermValue::Str(_), TermValue::Int(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for TermValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TermValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermValue::Int(v) => write!(f, "{}", v),
            TermValue::Str(s) => f.write_str(s),
        }
    }
}

/// Field kind the remote engine iterates a field as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Str,
}
