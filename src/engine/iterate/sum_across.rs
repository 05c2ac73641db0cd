use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use super::handler::IterateHandler;
use crate::engine::errors::ExecResult;
use crate::engine::groupkeys::GroupKeySet;
use crate::engine::metrics::{
    AggregateFilter, AggregateMetric, EvalState, PushIndexes, Pushable, QualifiedPush,
};
use crate::engine::session::Session;
use crate::engine::types::Term;

/// Per group, the sum of `metric` over every term `filter` allows.
#[derive(Debug)]
pub struct SumAcross {
    scope: BTreeSet<String>,
    metric: AggregateMetric,
    filter: Option<AggregateFilter>,
    sums: Vec<f64>,
    state: EvalState,
}

impl SumAcross {
    pub fn new(
        scope: BTreeSet<String>,
        metric: AggregateMetric,
        filter: Option<AggregateFilter>,
    ) -> Self {
        Self {
            scope,
            metric,
            filter,
            sums: Vec::new(),
            state: EvalState::new(),
        }
    }
}

impl Pushable for SumAcross {
    fn requires(&self) -> HashSet<QualifiedPush> {
        let mut pushes = self.metric.requires();
        if let Some(filter) = &self.filter {
            pushes.extend(filter.requires());
        }
        pushes
    }

    fn register(&mut self, indexes: &PushIndexes, group_key_set: &Arc<GroupKeySet>) {
        self.metric.register(indexes, group_key_set);
        if let Some(filter) = self.filter.as_mut() {
            filter.register(indexes, group_key_set);
        }
        self.sums = vec![0.0; group_key_set.num_groups() + 1];
        self.state.reset();
    }
}

impl IterateHandler for SumAcross {
    type Output = Vec<f64>;

    fn scope(&self) -> &BTreeSet<String> {
        &self.scope
    }

    fn term(&mut self, term: Term<'_>, stats: &[i64], group: usize) -> ExecResult<()> {
        if let Some(filter) = &self.filter {
            if !filter.allow(term, stats, group, &mut self.state)? {
                return Ok(());
            }
        }
        let value = self.metric.apply(term, stats, group, &mut self.state)?;
        if group >= self.sums.len() {
            self.sums.resize(group + 1, 0.0);
        }
        self.sums[group] += value;
        Ok(())
    }

    fn need_sorted(&self) -> bool {
        self.metric.need_sorted() || self.filter.as_ref().is_some_and(|f| f.need_sorted())
    }

    fn need_group(&self) -> bool {
        true
    }

    fn need_stats(&self) -> bool {
        self.metric.need_stats() || self.filter.as_ref().is_some_and(|f| f.need_stats())
    }

    fn finish(&mut self, session: &mut Session) -> ExecResult<Vec<f64>> {
        let mut sums = std::mem::take(&mut self.sums);
        sums.resize(session.num_groups + 1, 0.0);
        Ok(sums)
    }
}
