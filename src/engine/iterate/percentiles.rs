use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tracing::debug;

use super::handler::IterateHandler;
use crate::engine::errors::{ExecResult, ExecutionError};
use crate::engine::groupkeys::GroupKeySet;
use crate::engine::metrics::{PushIndexes, Pushable, QualifiedPush};
use crate::engine::session::Session;
use crate::engine::types::Term;

const COUNT: &str = "count()";

/// Per group, the first int term at which the running document count
/// reaches `percentile` percent of the documents holding the field.
/// Groups that never reach it report 0.
#[derive(Debug)]
pub struct GroupPercentiles {
    scope: BTreeSet<String>,
    required: Vec<f64>,
    count_columns: Vec<usize>,
    running: Vec<i64>,
    results: Vec<i64>,
}

impl GroupPercentiles {
    /// Counts, per group, the documents of `scope` holding `field`. Those
    /// counts fix the threshold each group must reach during the pass.
    pub fn prepare(
        session: &mut Session,
        scope: BTreeSet<String>,
        field: &str,
        percentile: f64,
    ) -> ExecResult<Self> {
        if !(0.0..=100.0).contains(&percentile) {
            return Err(ExecutionError::InvalidArgument(format!(
                "percentile must lie in [0, 100], got {}",
                percentile
            )));
        }
        let has_field = format!("hasintfield {}", field);
        let pushes: HashSet<QualifiedPush> = scope
            .iter()
            .map(|name| QualifiedPush::new(name.clone(), vec![has_field.as_str()]))
            .collect();
        let pushed = session.push_metrics(&pushes);
        let columns = pushed.and_then(|pushed| session.group_stats(&pushed));
        session.pop_stats()?;
        let columns = columns?;

        let num_groups = session.num_groups;
        let mut required = vec![0.0; num_groups + 1];
        for (g, slot) in required.iter_mut().enumerate().skip(1) {
            let count: i64 = columns.iter().map(|column| column[g]).sum();
            *slot = percentile / 100.0 * count as f64;
        }
        debug!(target: "group_ql::iterate", field, percentile, num_groups, "Computed percentile thresholds");
        Ok(Self {
            scope,
            required,
            count_columns: Vec::new(),
            running: vec![0; num_groups + 1],
            results: vec![0; num_groups + 1],
        })
    }
}

impl Pushable for GroupPercentiles {
    fn requires(&self) -> HashSet<QualifiedPush> {
        self.scope
            .iter()
            .map(|name| QualifiedPush::new(name.clone(), vec![COUNT]))
            .collect()
    }

    // Thresholds were sized for the partition `prepare` saw.
    fn register(&mut self, indexes: &PushIndexes, _group_key_set: &Arc<GroupKeySet>) {
        self.count_columns = self
            .scope
            .iter()
            .filter_map(|name| indexes.get(&QualifiedPush::new(name.clone(), vec![COUNT])))
            .copied()
            .collect();
        self.running = vec![0; self.required.len()];
        self.results = vec![0; self.required.len()];
    }
}

impl IterateHandler for GroupPercentiles {
    type Output = Vec<i64>;

    fn scope(&self) -> &BTreeSet<String> {
        &self.scope
    }

    fn term(&mut self, term: Term<'_>, stats: &[i64], group: usize) -> ExecResult<()> {
        let Term::Int(value) = term else {
            return Err(ExecutionError::InvalidArgument(
                "Cannot compute percentiles over a string field".into(),
            ));
        };
        if group >= self.running.len() {
            return Ok(());
        }
        let term_count: i64 = self
            .count_columns
            .iter()
            .map(|i| stats.get(*i).copied().unwrap_or(0))
            .sum();
        let before = self.running[group];
        let after = before + term_count;
        let required = self.required[group];
        if after as f64 >= required && (before as f64) < required {
            self.results[group] = value;
        }
        self.running[group] = after;
        Ok(())
    }

    fn need_sorted(&self) -> bool {
        true
    }

    fn need_group(&self) -> bool {
        true
    }

    fn need_stats(&self) -> bool {
        true
    }

    fn finish(&mut self, session: &mut Session) -> ExecResult<Vec<i64>> {
        let mut results = std::mem::take(&mut self.results);
        results.resize(session.num_groups + 1, 0);
        Ok(results)
    }
}
