use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use super::handler::IterateHandler;
use crate::engine::errors::ExecResult;
use crate::engine::groupkeys::GroupKeySet;
use crate::engine::metrics::{FoldOp, PushIndexes, Pushable, QualifiedPush};
use crate::engine::session::Session;
use crate::engine::types::Term;

/// Per group, the smallest or largest term of the field. String terms count
/// when they parse as integers. Groups without such a term report NaN.
#[derive(Debug)]
pub struct FieldExtreme {
    scope: BTreeSet<String>,
    op: FoldOp,
    values: Vec<Option<i64>>,
}

impl FieldExtreme {
    pub fn min(scope: BTreeSet<String>) -> Self {
        Self::new(scope, FoldOp::Min)
    }

    pub fn max(scope: BTreeSet<String>) -> Self {
        Self::new(scope, FoldOp::Max)
    }

    fn new(scope: BTreeSet<String>, op: FoldOp) -> Self {
        Self {
            scope,
            op,
            values: Vec::new(),
        }
    }
}

impl Pushable for FieldExtreme {
    fn requires(&self) -> HashSet<QualifiedPush> {
        HashSet::new()
    }

    fn register(&mut self, _indexes: &PushIndexes, group_key_set: &Arc<GroupKeySet>) {
        self.values = vec![None; group_key_set.num_groups() + 1];
    }
}

impl IterateHandler for FieldExtreme {
    type Output = Vec<f64>;

    fn scope(&self) -> &BTreeSet<String> {
        &self.scope
    }

    fn term(&mut self, term: Term<'_>, _stats: &[i64], group: usize) -> ExecResult<()> {
        let value = match term {
            Term::Int(v) => v,
            Term::Str(s) => match s.parse::<i64>() {
                Ok(v) => v,
                Err(_) => return Ok(()),
            },
        };
        if group >= self.values.len() {
            self.values.resize(group + 1, None);
        }
        let slot = &mut self.values[group];
        *slot = Some(match (*slot, self.op) {
            (None, _) => value,
            (Some(current), FoldOp::Min) => current.min(value),
            (Some(current), FoldOp::Max) => current.max(value),
        });
        Ok(())
    }

    fn need_sorted(&self) -> bool {
        false
    }

    fn need_group(&self) -> bool {
        true
    }

    fn need_stats(&self) -> bool {
        false
    }

    fn finish(&mut self, session: &mut Session) -> ExecResult<Vec<f64>> {
        let mut values = std::mem::take(&mut self.values);
        values.resize(session.num_groups + 1, None);
        Ok(values
            .into_iter()
            .map(|v| v.map_or(f64::NAN, |v| v as f64))
            .collect())
    }
}
