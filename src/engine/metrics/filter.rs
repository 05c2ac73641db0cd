use std::collections::HashSet;
use std::sync::Arc;

use regex::Regex;

use super::aggregate::AggregateMetric;
use super::push::{PushIndexes, Pushable, QualifiedPush};
use super::state::EvalState;
use crate::engine::errors::{ExecResult, ExecutionError};
use crate::engine::groupkeys::GroupKeySet;
use crate::engine::types::{Term, TermValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    fn eval(self, l: f64, r: f64) -> bool {
        match self {
            CompareOp::Eq => l == r,
            CompareOp::Ne => l != r,
            CompareOp::Gt => l > r,
            CompareOp::Ge => l >= r,
            CompareOp::Lt => l < r,
            CompareOp::Le => l <= r,
        }
    }
}

/// Full-string match against the term text.
#[derive(Debug)]
pub struct TermRegex {
    pub pattern: String,
    regex: Regex,
}

impl TermRegex {
    pub fn new(pattern: &str) -> ExecResult<Self> {
        let regex =
            Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| ExecutionError::InvalidRegex {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Boolean expression over groups; sibling of `AggregateMetric`.
#[derive(Debug)]
pub enum AggregateFilter {
    Constant(bool),
    Not(Box<AggregateFilter>),
    And(Box<AggregateFilter>, Box<AggregateFilter>),
    Or(Box<AggregateFilter>, Box<AggregateFilter>),
    Compare(CompareOp, Box<AggregateMetric>, Box<AggregateMetric>),
    TermEquals(TermValue),
    TermRegex(TermRegex),
    /// Current group's own key is a DEFAULT bucket.
    IsDefaultGroup(Option<Arc<GroupKeySet>>),
}

impl AggregateFilter {
    pub fn always() -> Self {
        AggregateFilter::Constant(true)
    }

    pub fn never() -> Self {
        AggregateFilter::Constant(false)
    }

    pub fn not(inner: AggregateFilter) -> Self {
        AggregateFilter::Not(Box::new(inner))
    }

    pub fn and(left: AggregateFilter, right: AggregateFilter) -> Self {
        AggregateFilter::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: AggregateFilter, right: AggregateFilter) -> Self {
        AggregateFilter::Or(Box::new(left), Box::new(right))
    }

    pub fn compare(op: CompareOp, left: AggregateMetric, right: AggregateMetric) -> Self {
        AggregateFilter::Compare(op, Box::new(left), Box::new(right))
    }

    pub fn term_equals(term: TermValue) -> Self {
        AggregateFilter::TermEquals(term)
    }

    pub fn term_regex(pattern: &str) -> ExecResult<Self> {
        Ok(AggregateFilter::TermRegex(TermRegex::new(pattern)?))
    }

    pub fn is_default_group() -> Self {
        AggregateFilter::IsDefaultGroup(None)
    }

    /// Evaluates every group at once; index 0 is always false.
    pub fn get_group_stats(&self, stats: &[Vec<i64>], num_groups: usize) -> ExecResult<Vec<bool>> {
        let mut result = match self {
            AggregateFilter::Constant(v) => vec![*v; num_groups + 1],
            AggregateFilter::Not(inner) => inner
                .get_group_stats(stats, num_groups)?
                .into_iter()
                .map(|v| !v)
                .collect(),
            AggregateFilter::And(l, r) => {
                let l = l.get_group_stats(stats, num_groups)?;
                let r = r.get_group_stats(stats, num_groups)?;
                l.iter().zip(r.iter()).map(|(a, b)| *a && *b).collect()
            }
            AggregateFilter::Or(l, r) => {
                let l = l.get_group_stats(stats, num_groups)?;
                let r = r.get_group_stats(stats, num_groups)?;
                l.iter().zip(r.iter()).map(|(a, b)| *a || *b).collect()
            }
            AggregateFilter::Compare(op, l, r) => {
                let l = l.get_group_stats(stats, num_groups)?;
                let r = r.get_group_stats(stats, num_groups)?;
                l.iter().zip(r.iter()).map(|(a, b)| op.eval(*a, *b)).collect()
            }
            AggregateFilter::TermEquals(_) => {
                return Err(ExecutionError::BatchUnsupported("TermEquals"));
            }
            AggregateFilter::TermRegex(_) => {
                return Err(ExecutionError::BatchUnsupported("TermRegex"));
            }
            AggregateFilter::IsDefaultGroup(keys) => {
                let keys = keys
                    .as_ref()
                    .ok_or(ExecutionError::NotRegistered("IsDefaultGroup"))?;
                (0..=num_groups)
                    .map(|g| g > 0 && keys.group_key(g).is_default())
                    .collect()
            }
        };
        if let Some(first) = result.first_mut() {
            *first = false;
        }
        Ok(result)
    }

    /// Evaluates one (term, group) pair during a live iteration pass.
    pub fn allow(
        &self,
        term: Term<'_>,
        stats: &[i64],
        group: usize,
        state: &mut EvalState,
    ) -> ExecResult<bool> {
        match self {
            AggregateFilter::Constant(v) => Ok(*v),
            AggregateFilter::Not(inner) => Ok(!inner.allow(term, stats, group, state)?),
            AggregateFilter::And(l, r) => {
                let l = l.allow(term, stats, group, state)?;
                let r = r.allow(term, stats, group, state)?;
                Ok(l && r)
            }
            AggregateFilter::Or(l, r) => {
                let l = l.allow(term, stats, group, state)?;
                let r = r.allow(term, stats, group, state)?;
                Ok(l || r)
            }
            AggregateFilter::Compare(op, l, r) => {
                let l = l.apply(term, stats, group, state)?;
                let r = r.apply(term, stats, group, state)?;
                Ok(op.eval(l, r))
            }
            AggregateFilter::TermEquals(expected) => Ok(expected.matches(term)),
            AggregateFilter::TermRegex(regex) => Ok(regex.is_match(&term.as_text())),
            AggregateFilter::IsDefaultGroup(keys) => {
                let keys = keys
                    .as_ref()
                    .ok_or(ExecutionError::NotRegistered("IsDefaultGroup"))?;
                Ok(keys.group_key(group).is_default())
            }
        }
    }

    pub fn need_sorted(&self) -> bool {
        match self {
            AggregateFilter::Constant(_)
            | AggregateFilter::TermEquals(_)
            | AggregateFilter::TermRegex(_)
            | AggregateFilter::IsDefaultGroup(_) => false,
            AggregateFilter::Not(inner) => inner.need_sorted(),
            AggregateFilter::And(l, r) | AggregateFilter::Or(l, r) => {
                l.need_sorted() || r.need_sorted()
            }
            AggregateFilter::Compare(_, l, r) => l.need_sorted() || r.need_sorted(),
        }
    }

    pub fn need_group(&self) -> bool {
        match self {
            AggregateFilter::Constant(_)
            | AggregateFilter::TermEquals(_)
            | AggregateFilter::TermRegex(_) => false,
            AggregateFilter::IsDefaultGroup(_) => true,
            AggregateFilter::Not(inner) => inner.need_group(),
            AggregateFilter::And(l, r) | AggregateFilter::Or(l, r) => {
                l.need_group() || r.need_group()
            }
            AggregateFilter::Compare(_, l, r) => l.need_group() || r.need_group(),
        }
    }

    pub fn need_stats(&self) -> bool {
        match self {
            AggregateFilter::Constant(_)
            | AggregateFilter::TermEquals(_)
            | AggregateFilter::TermRegex(_)
            | AggregateFilter::IsDefaultGroup(_) => false,
            AggregateFilter::Not(inner) => inner.need_stats(),
            AggregateFilter::And(l, r) | AggregateFilter::Or(l, r) => {
                l.need_stats() || r.need_stats()
            }
            AggregateFilter::Compare(_, l, r) => l.need_stats() || r.need_stats(),
        }
    }
}

impl Pushable for AggregateFilter {
    fn requires(&self) -> HashSet<QualifiedPush> {
        match self {
            AggregateFilter::Constant(_)
            | AggregateFilter::TermEquals(_)
            | AggregateFilter::TermRegex(_)
            | AggregateFilter::IsDefaultGroup(_) => HashSet::new(),
            AggregateFilter::Not(inner) => inner.requires(),
            AggregateFilter::And(l, r) | AggregateFilter::Or(l, r) => {
                let mut pushes = l.requires();
                pushes.extend(r.requires());
                pushes
            }
            AggregateFilter::Compare(_, l, r) => {
                let mut pushes = l.requires();
                pushes.extend(r.requires());
                pushes
            }
        }
    }

    fn register(&mut self, indexes: &PushIndexes, group_key_set: &Arc<GroupKeySet>) {
        match self {
            AggregateFilter::Constant(_)
            | AggregateFilter::TermEquals(_)
            | AggregateFilter::TermRegex(_) => {}
            AggregateFilter::IsDefaultGroup(keys) => *keys = Some(group_key_set.clone()),
            AggregateFilter::Not(inner) => inner.register(indexes, group_key_set),
            AggregateFilter::And(l, r) | AggregateFilter::Or(l, r) => {
                l.register(indexes, group_key_set);
                r.register(indexes, group_key_set);
            }
            AggregateFilter::Compare(_, l, r) => {
                l.register(indexes, group_key_set);
                r.register(indexes, group_key_set);
            }
        }
    }
}
