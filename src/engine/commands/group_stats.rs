use std::collections::HashSet;

use tracing::info;

use crate::engine::errors::ExecResult;
use crate::engine::groupkeys::render_labels;
use crate::engine::metrics::{AggregateMetric, Pushable, QualifiedPush};
use crate::engine::session::Session;
use crate::shared::format::format_double;

/// Metric values of one group, in the order the metrics were given.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStats {
    pub group: usize,
    pub stats: Vec<f64>,
}

/// Evaluates metrics over every group at once.
#[derive(Debug)]
pub struct GetGroupStats {
    pub metrics: Vec<AggregateMetric>,
}

impl GetGroupStats {
    pub fn new(metrics: Vec<AggregateMetric>) -> Self {
        Self { metrics }
    }

    /// Rows for every present group, ascending by group.
    pub fn evaluate(&mut self, session: &mut Session) -> ExecResult<Vec<GroupStats>> {
        let per_metric = self.values(session)?;
        let rows: Vec<GroupStats> = (1..=session.num_groups)
            .filter(|g| session.group_key_set.is_present(*g))
            .map(|group| GroupStats {
                group,
                stats: per_metric.iter().map(|values| values[group]).collect(),
            })
            .collect();
        info!(
            target: "group_ql::commands",
            metrics = self.metrics.len(),
            rows = rows.len(),
            "Computed group stats"
        );
        Ok(rows)
    }

    /// One column per metric, indexed by group, present or not.
    pub fn values(&mut self, session: &mut Session) -> ExecResult<Vec<Vec<f64>>> {
        let pushes: HashSet<QualifiedPush> =
            self.metrics.iter().flat_map(|m| m.requires()).collect();
        let pushed = session.push_metrics(&pushes);
        let columns = pushed.and_then(|pushed| {
            for metric in self.metrics.iter_mut() {
                metric.register(&pushed.indexes, &session.group_key_set);
            }
            session.group_stats(&pushed)
        });
        session.pop_stats()?;
        let columns = columns?;

        self.metrics
            .iter()
            .map(|metric| metric.get_group_stats(&columns, session.num_groups))
            .collect()
    }
}

/// One output line per row: the group's labels followed by its values,
/// joined with the session's output format.
pub fn render_rows(session: &Session, rows: &[GroupStats]) -> Vec<String> {
    let format = session.options().output_format;
    rows.iter()
        .map(|row| {
            let mut cells = render_labels(&session.group_key_set, row.group, format);
            cells.extend(row.stats.iter().map(|v| format_double(*v)));
            format.join(&cells)
        })
        .collect()
}
