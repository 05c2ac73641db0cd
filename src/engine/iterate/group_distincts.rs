use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use super::handler::IterateHandler;
use crate::engine::errors::ExecResult;
use crate::engine::groupkeys::GroupKeySet;
use crate::engine::metrics::{AggregateFilter, EvalState, PushIndexes, Pushable, QualifiedPush};
use crate::engine::session::Session;
use crate::engine::types::Term;

/// Per group, the number of distinct terms `filter` allows.
#[derive(Debug)]
pub struct GroupDistincts {
    scope: BTreeSet<String>,
    filter: Option<AggregateFilter>,
    counts: Vec<i64>,
    state: EvalState,
}

impl GroupDistincts {
    pub fn new(scope: BTreeSet<String>, filter: Option<AggregateFilter>) -> Self {
        Self {
            scope,
            filter,
            counts: Vec::new(),
            state: EvalState::new(),
        }
    }
}

impl Pushable for GroupDistincts {
    fn requires(&self) -> HashSet<QualifiedPush> {
        self.filter
            .as_ref()
            .map(|f| f.requires())
            .unwrap_or_default()
    }

    fn register(&mut self, indexes: &PushIndexes, group_key_set: &Arc<GroupKeySet>) {
        if let Some(filter) = self.filter.as_mut() {
            filter.register(indexes, group_key_set);
        }
        self.counts = vec![0; group_key_set.num_groups() + 1];
        self.state.reset();
    }
}

impl IterateHandler for GroupDistincts {
    type Output = Vec<i64>;

    fn scope(&self) -> &BTreeSet<String> {
        &self.scope
    }

    // Merged rows are unique per (term, group), so every allowed row is a
    // new distinct term of its group.
    fn term(&mut self, term: Term<'_>, stats: &[i64], group: usize) -> ExecResult<()> {
        if let Some(filter) = &self.filter {
            if !filter.allow(term, stats, group, &mut self.state)? {
                return Ok(());
            }
        }
        if group >= self.counts.len() {
            self.counts.resize(group + 1, 0);
        }
        self.counts[group] += 1;
        Ok(())
    }

    fn need_sorted(&self) -> bool {
        self.filter.as_ref().is_some_and(|f| f.need_sorted())
    }

    fn need_group(&self) -> bool {
        true
    }

    fn need_stats(&self) -> bool {
        self.filter.as_ref().is_some_and(|f| f.need_stats())
    }

    fn finish(&mut self, session: &mut Session) -> ExecResult<Vec<i64>> {
        let mut counts = std::mem::take(&mut self.counts);
        counts.resize(session.num_groups + 1, 0);
        Ok(counts)
    }
}
