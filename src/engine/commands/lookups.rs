use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use super::group_stats::GetGroupStats;
use crate::engine::errors::{ExecResult, ExecutionError};
use crate::engine::groupkeys::GroupKeySet;
use crate::engine::iterate::{
    BoxedHandler, FieldExtreme, GroupDistincts, GroupPercentiles, IterateHandler, SumAcross,
    execute_multi, execute_single,
};
use crate::engine::metrics::{AggregateFilter, AggregateMetric, PushIndexes, Pushable, QualifiedPush};
use crate::engine::session::Session;
use crate::engine::types::Term;

/// Per group, the term of `field` at `percentile` percent of its documents.
#[derive(Debug, Clone)]
pub struct GetGroupPercentiles {
    pub scope: BTreeSet<String>,
    pub field: String,
    pub percentile: f64,
}

impl GetGroupPercentiles {
    pub fn evaluate(&self, session: &mut Session) -> ExecResult<Vec<i64>> {
        let handler = self.handler(session)?;
        execute_single(session, &self.field, handler)
    }

    fn handler(&self, session: &mut Session) -> ExecResult<GroupPercentiles> {
        GroupPercentiles::prepare(session, self.scope.clone(), &self.field, self.percentile)
    }
}

/// Per group, the smallest numeric term of `field`.
#[derive(Debug, Clone)]
pub struct GetFieldMin {
    pub scope: BTreeSet<String>,
    pub field: String,
}

impl GetFieldMin {
    pub fn evaluate(&self, session: &mut Session) -> ExecResult<Vec<f64>> {
        execute_single(session, &self.field, FieldExtreme::min(self.scope.clone()))
    }
}

/// Per group, the largest numeric term of `field`.
#[derive(Debug, Clone)]
pub struct GetFieldMax {
    pub scope: BTreeSet<String>,
    pub field: String,
}

impl GetFieldMax {
    pub fn evaluate(&self, session: &mut Session) -> ExecResult<Vec<f64>> {
        execute_single(session, &self.field, FieldExtreme::max(self.scope.clone()))
    }
}

/// One per-group value to compute and keep under a name.
#[derive(Debug)]
pub enum LookupComputation {
    Distincts {
        scope: BTreeSet<String>,
        field: String,
        filter: Option<AggregateFilter>,
    },
    SumAcross {
        scope: BTreeSet<String>,
        field: String,
        metric: AggregateMetric,
        filter: Option<AggregateFilter>,
    },
    Percentile(GetGroupPercentiles),
    FieldMin(GetFieldMin),
    FieldMax(GetFieldMax),
    GroupStats(AggregateMetric),
}

impl LookupComputation {
    fn field(&self) -> Option<&str> {
        match self {
            LookupComputation::Distincts { field, .. } | LookupComputation::SumAcross { field, .. } => {
                Some(field)
            }
            LookupComputation::Percentile(c) => Some(&c.field),
            LookupComputation::FieldMin(c) => Some(&c.field),
            LookupComputation::FieldMax(c) => Some(&c.field),
            LookupComputation::GroupStats(_) => None,
        }
    }
}

/// Computes every lookup and stores each under its name on the session, so
/// later metrics can read it back with `Session::lookup_metric`.
///
/// Iteration-based lookups share a single pass and must agree on the field.
#[derive(Debug)]
pub struct ComputeAndCreateGroupStatsLookups {
    pub computations: Vec<(LookupComputation, String)>,
}

impl ComputeAndCreateGroupStatsLookups {
    pub fn new(computations: Vec<(LookupComputation, String)>) -> Self {
        Self { computations }
    }

    pub fn execute(&mut self, session: &mut Session) -> ExecResult<()> {
        let fields: BTreeSet<&str> = self.computations.iter().filter_map(|(c, _)| c.field()).collect();
        if fields.len() > 1 {
            return Err(ExecutionError::InvalidArgument(format!(
                "lookups can only iterate one field per command, got {:?}",
                fields
            )));
        }
        let field = fields.into_iter().next().map(str::to_owned);

        let mut computed: Vec<(String, Vec<f64>)> = Vec::new();
        let mut names = Vec::new();
        let mut handlers: Vec<BoxedHandler<'_, Vec<f64>>> = Vec::new();
        // Metrics and filters carry evaluation state, so each runs once.
        for (computation, name) in std::mem::take(&mut self.computations) {
            match computation {
                LookupComputation::GroupStats(metric) => {
                    let mut stats = GetGroupStats::new(vec![metric]);
                    let values = stats.values(session)?.pop().unwrap_or_default();
                    computed.push((name, values));
                    continue;
                }
                LookupComputation::Distincts { scope, filter, .. } => {
                    handlers.push(Box::new(AsDoubles::new(
                        GroupDistincts::new(scope, filter),
                        longs_to_doubles,
                    )));
                }
                LookupComputation::SumAcross {
                    scope,
                    metric,
                    filter,
                    ..
                } => {
                    handlers.push(Box::new(SumAcross::new(scope, metric, filter)));
                }
                LookupComputation::Percentile(c) => {
                    handlers.push(Box::new(AsDoubles::new(c.handler(session)?, longs_to_doubles)));
                }
                LookupComputation::FieldMin(c) => {
                    handlers.push(Box::new(FieldExtreme::min(c.scope)));
                }
                LookupComputation::FieldMax(c) => {
                    handlers.push(Box::new(FieldExtreme::max(c.scope)));
                }
            }
            names.push(name);
        }

        if let Some(field) = field {
            debug!(target: "group_ql::commands", field = %field, handlers = handlers.len(), "Computing iterate lookups");
            let outputs = execute_multi(session, &field, handlers)?;
            computed.extend(names.into_iter().zip(outputs));
        }
        let count = computed.len();
        for (name, values) in computed {
            session.set_group_stats_lookup(name, values);
        }
        info!(target: "group_ql::commands", lookups = count, "Created group stats lookups");
        Ok(())
    }
}

fn longs_to_doubles(values: Vec<i64>) -> Vec<f64> {
    values.into_iter().map(|v| v as f64).collect()
}

/// Runs a handler in a pass whose outputs must all be doubles.
struct AsDoubles<H: IterateHandler> {
    inner: H,
    convert: fn(H::Output) -> Vec<f64>,
}

impl<H: IterateHandler> AsDoubles<H> {
    fn new(inner: H, convert: fn(H::Output) -> Vec<f64>) -> Self {
        Self { inner, convert }
    }
}

impl<H: IterateHandler> Pushable for AsDoubles<H> {
    fn requires(&self) -> HashSet<QualifiedPush> {
        self.inner.requires()
    }

    fn register(&mut self, indexes: &PushIndexes, group_key_set: &Arc<GroupKeySet>) {
        self.inner.register(indexes, group_key_set);
    }
}

impl<H: IterateHandler> IterateHandler for AsDoubles<H> {
    type Output = Vec<f64>;

    fn scope(&self) -> &BTreeSet<String> {
        self.inner.scope()
    }

    fn term(&mut self, term: Term<'_>, stats: &[i64], group: usize) -> ExecResult<()> {
        self.inner.term(term, stats, group)
    }

    fn need_sorted(&self) -> bool {
        self.inner.need_sorted()
    }

    fn need_group(&self) -> bool {
        self.inner.need_group()
    }

    fn need_stats(&self) -> bool {
        self.inner.need_stats()
    }

    fn finish(&mut self, session: &mut Session) -> ExecResult<Vec<f64>> {
        self.inner.finish(session).map(self.convert)
    }
}
