use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, BinaryHeap, HashSet};
use std::sync::Arc;

use super::handler::IterateHandler;
use crate::engine::errors::ExecResult;
use crate::engine::groupkeys::GroupKeySet;
use crate::engine::metrics::{
    AggregateFilter, AggregateMetric, EvalState, PushIndexes, Pushable, QualifiedPush,
};
use crate::engine::session::Session;
use crate::engine::types::{Term, TermValue};

/// Selected values of one term within one group.
#[derive(Debug, Clone, PartialEq)]
pub struct TermSelects {
    pub term: TermValue,
    pub selects: Vec<f64>,
    /// Value of the top-k metric, NaN without top-k.
    pub top_k_value: f64,
}

impl TermSelects {
    /// Higher value ranks better, NaN ranks below every number, and on
    /// equal values the smaller term ranks better.
    fn rank_cmp(&self, other: &Self) -> Ordering {
        let by_value = match (self.top_k_value.is_nan(), other.top_k_value.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.top_k_value.total_cmp(&other.top_k_value),
        };
        by_value.then_with(|| other.term.cmp(&self.term))
    }
}

struct Ranked(TermSelects);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.rank_cmp(&other.0)
    }
}

#[derive(Debug)]
pub struct TopK {
    pub limit: usize,
    pub metric: AggregateMetric,
}

/// Per-group buffer: visit order without top-k, a bounded heap of the best
/// `limit` terms with it.
enum GroupTerms {
    InOrder(Vec<TermSelects>),
    Best(BinaryHeap<Reverse<Ranked>>),
}

/// Collects the selected metrics of every allowed term per group,
/// optionally keeping only the top `k` terms by a ranking metric.
pub struct SimpleIterate {
    scope: BTreeSet<String>,
    selecting: Vec<AggregateMetric>,
    top_k: Option<TopK>,
    filter: Option<AggregateFilter>,
    groups: Vec<GroupTerms>,
    state: EvalState,
}

impl SimpleIterate {
    pub fn new(scope: BTreeSet<String>, selecting: Vec<AggregateMetric>) -> Self {
        Self {
            scope,
            selecting,
            top_k: None,
            filter: None,
            groups: Vec::new(),
            state: EvalState::new(),
        }
    }

    pub fn with_top_k(mut self, limit: usize, metric: AggregateMetric) -> Self {
        self.top_k = Some(TopK { limit, metric });
        self
    }

    pub fn with_filter(mut self, filter: AggregateFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    fn empty_group(&self) -> GroupTerms {
        match &self.top_k {
            Some(top_k) => GroupTerms::Best(BinaryHeap::with_capacity(top_k.limit + 1)),
            None => GroupTerms::InOrder(Vec::new()),
        }
    }

    fn metrics(&self) -> impl Iterator<Item = &AggregateMetric> {
        self.selecting
            .iter()
            .chain(self.top_k.as_ref().map(|t| &t.metric))
    }
}

impl Pushable for SimpleIterate {
    fn requires(&self) -> HashSet<QualifiedPush> {
        let mut pushes: HashSet<QualifiedPush> =
            self.metrics().flat_map(|m| m.requires()).collect();
        if let Some(filter) = &self.filter {
            pushes.extend(filter.requires());
        }
        pushes
    }

    fn register(&mut self, indexes: &PushIndexes, group_key_set: &Arc<GroupKeySet>) {
        for metric in self.selecting.iter_mut() {
            metric.register(indexes, group_key_set);
        }
        if let Some(top_k) = self.top_k.as_mut() {
            top_k.metric.register(indexes, group_key_set);
        }
        if let Some(filter) = self.filter.as_mut() {
            filter.register(indexes, group_key_set);
        }
        self.groups = (0..=group_key_set.num_groups())
            .map(|_| self.empty_group())
            .collect();
        self.state.reset();
    }
}

impl IterateHandler for SimpleIterate {
    /// Indexed by group; index 0 is always empty.
    type Output = Vec<Vec<TermSelects>>;

    fn scope(&self) -> &BTreeSet<String> {
        &self.scope
    }

    fn term(&mut self, term: Term<'_>, stats: &[i64], group: usize) -> ExecResult<()> {
        if let Some(filter) = &self.filter {
            if !filter.allow(term, stats, group, &mut self.state)? {
                return Ok(());
            }
        }
        let mut selects = Vec::with_capacity(self.selecting.len());
        for metric in &self.selecting {
            selects.push(metric.apply(term, stats, group, &mut self.state)?);
        }
        let top_k_value = match &self.top_k {
            Some(top_k) => top_k.metric.apply(term, stats, group, &mut self.state)?,
            None => f64::NAN,
        };
        let row = TermSelects {
            term: term.to_owned_value(),
            selects,
            top_k_value,
        };

        while group >= self.groups.len() {
            let empty = self.empty_group();
            self.groups.push(empty);
        }
        let limit = self.top_k.as_ref().map_or(0, |t| t.limit);
        match &mut self.groups[group] {
            GroupTerms::InOrder(rows) => rows.push(row),
            GroupTerms::Best(heap) => {
                heap.push(Reverse(Ranked(row)));
                if heap.len() > limit {
                    heap.pop();
                }
            }
        }
        Ok(())
    }

    fn need_sorted(&self) -> bool {
        self.metrics().any(|m| m.need_sorted())
            || self.filter.as_ref().is_some_and(|f| f.need_sorted())
    }

    fn need_group(&self) -> bool {
        true
    }

    fn need_stats(&self) -> bool {
        self.metrics().any(|m| m.need_stats())
            || self.filter.as_ref().is_some_and(|f| f.need_stats())
    }

    fn finish(&mut self, session: &mut Session) -> ExecResult<Self::Output> {
        let mut result: Vec<Vec<TermSelects>> = std::mem::take(&mut self.groups)
            .into_iter()
            .map(|group| match group {
                GroupTerms::InOrder(rows) => rows,
                GroupTerms::Best(heap) => {
                    let mut rows: Vec<TermSelects> =
                        heap.into_iter().map(|Reverse(Ranked(row))| row).collect();
                    rows.sort_by(|a, b| b.rank_cmp(a));
                    rows
                }
            })
            .collect();
        result.resize_with(session.num_groups + 1, Vec::new);
        if let Some(first) = result.first_mut() {
            first.clear();
        }
        Ok(result)
    }
}
