use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use roaring::RoaringBitmap;
use tracing::{debug, warn};

use super::dataset::DatasetSession;
use super::iterate::{IterateCallback, merge_ftgs};
use super::options::SessionOptions;
use crate::engine::errors::{ExecResult, ExecutionError};
use crate::engine::groupkeys::{GroupKeySet, MaskingGroupKeySet};
use crate::engine::metrics::{AggregateMetric, PushIndexes, QualifiedPush};
use crate::engine::remote::{GroupMove, GroupMultiRemapRule, QueryRemapRule};
use crate::engine::types::FieldKind;

/// Where one pushed stat lives on its dataset session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatColumn {
    /// Position on the dataset's own stat stack.
    pub local: usize,
    /// Position in the merged stats row handed to evaluators.
    pub global: usize,
}

/// Result of pushing a set of qualified pushes across datasets.
#[derive(Debug, Clone, Default)]
pub struct PushedMetrics {
    pub indexes: PushIndexes,
    pub per_session: BTreeMap<String, Vec<StatColumn>>,
}

impl PushedMetrics {
    pub fn num_stats(&self) -> usize {
        self.indexes.len()
    }
}

/// Holds every dataset session of one query, the current partition and its
/// labels. Accessed by one query thread at a time.
#[derive(Debug)]
pub struct Session {
    datasets: BTreeMap<String, DatasetSession>,
    pub group_key_set: Arc<GroupKeySet>,
    pub num_groups: usize,
    options: SessionOptions,
    /// Named per-group values computed on the current partition.
    lookups: BTreeMap<String, Vec<f64>>,
}

impl Session {
    pub fn new(datasets: BTreeMap<String, DatasetSession>, options: SessionOptions) -> Self {
        Self {
            datasets,
            group_key_set: GroupKeySet::initial(),
            num_groups: 1,
            options,
            lookups: BTreeMap::new(),
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn dataset_names(&self) -> BTreeSet<String> {
        self.datasets.keys().cloned().collect()
    }

    pub fn dataset(&self, name: &str) -> ExecResult<&DatasetSession> {
        self.datasets
            .get(name)
            .ok_or_else(|| ExecutionError::UnknownSession(name.to_string()))
    }

    pub fn dataset_mut(&mut self, name: &str) -> ExecResult<&mut DatasetSession> {
        self.datasets
            .get_mut(name)
            .ok_or_else(|| ExecutionError::UnknownSession(name.to_string()))
    }

    /// Datasets of `scope`, in name order. Unknown names are an error.
    pub fn scoped_mut(
        &mut self,
        scope: &BTreeSet<String>,
    ) -> ExecResult<Vec<(&String, &mut DatasetSession)>> {
        if let Some(missing) = scope.iter().find(|name| !self.datasets.contains_key(*name)) {
            return Err(ExecutionError::UnknownSession(missing.clone()));
        }
        Ok(self
            .datasets
            .iter_mut()
            .filter(|(name, _)| scope.contains(*name))
            .collect())
    }

    // Stats -----------------------------------------------------------------

    /// Pushes each distinct requirement once, in a deterministic order, and
    /// assigns it the next merged column index.
    pub fn push_metrics(&mut self, pushes: &HashSet<QualifiedPush>) -> ExecResult<PushedMetrics> {
        let mut ordered: Vec<&QualifiedPush> = pushes.iter().collect();
        ordered.sort();

        let mut pushed = PushedMetrics::default();
        for push in ordered {
            let dataset = self.dataset_mut(&push.session_name)?;
            let before = dataset.remote.num_stats();
            let after = dataset.remote.push_stats(&push.pushes)?;
            if after != before + 1 {
                return Err(ExecutionError::UnexpectedStatCount {
                    session: push.session_name.clone(),
                    expected: before + 1,
                    actual: after,
                });
            }
            let global = pushed.indexes.len();
            pushed.indexes.insert(push.clone(), global);
            pushed
                .per_session
                .entry(push.session_name.clone())
                .or_default()
                .push(StatColumn {
                    local: before,
                    global,
                });
            debug!(
                target: "group_ql::session",
                push = %push,
                local = before,
                global,
                "Pushed stat"
            );
        }
        Ok(pushed)
    }

    /// Pops every stat on every dataset session.
    pub fn pop_stats(&mut self) -> ExecResult<()> {
        for (name, dataset) in self.datasets.iter_mut() {
            let mut popped = 0;
            while dataset.remote.num_stats() > 0 {
                dataset.remote.pop_stat()?;
                popped += 1;
            }
            if popped > 0 {
                debug!(target: "group_ql::session", dataset = %name, popped, "Popped stats");
            }
        }
        Ok(())
    }

    /// Per-group totals of every pushed column, each `num_groups + 1` long.
    pub fn group_stats(&mut self, pushed: &PushedMetrics) -> ExecResult<Vec<Vec<i64>>> {
        self.group_stats_for(pushed, self.num_groups)
    }

    fn group_stats_for(
        &mut self,
        pushed: &PushedMetrics,
        num_groups: usize,
    ) -> ExecResult<Vec<Vec<i64>>> {
        let width = num_groups + 1;
        let mut columns = vec![vec![0i64; width]; pushed.num_stats()];
        for (name, stat_columns) in &pushed.per_session {
            let dataset = self
                .datasets
                .get_mut(name)
                .ok_or_else(|| ExecutionError::UnknownSession(name.clone()))?;
            for column in stat_columns {
                let values = dataset.remote.get_group_stats(column.local)?;
                for (g, v) in values.into_iter().take(width).enumerate() {
                    columns[column.global][g] = v;
                }
            }
        }
        Ok(columns)
    }

    // Lookups ---------------------------------------------------------------

    /// Stores `values[g]` for every group `g` of the current partition.
    pub fn set_group_stats_lookup(&mut self, name: impl Into<String>, values: Vec<f64>) {
        let name = name.into();
        debug!(target: "group_ql::session", lookup = %name, groups = values.len().saturating_sub(1), "Saved group stats lookup");
        self.lookups.insert(name, values);
    }

    /// A per-group constant reading the lookup saved as `name`.
    pub fn lookup_metric(&self, name: &str) -> ExecResult<AggregateMetric> {
        self.lookups
            .get(name)
            .map(|values| AggregateMetric::per_group_constant(values.clone()))
            .ok_or_else(|| ExecutionError::UnknownLookup(name.to_string()))
    }

    // Field types -----------------------------------------------------------

    pub fn is_int_field(&self, field: &str) -> bool {
        self.datasets.values().any(|d| d.is_int_field(field))
    }

    pub fn is_string_field(&self, field: &str) -> bool {
        !self.is_int_field(field) && self.datasets.values().any(|d| d.is_string_field(field))
    }

    pub fn field_kind(&self, field: &str) -> ExecResult<FieldKind> {
        if self.is_int_field(field) {
            Ok(FieldKind::Int)
        } else if self.is_string_field(field) {
            Ok(FieldKind::Str)
        } else {
            Err(ExecutionError::FieldTypeAmbiguous(field.to_string()))
        }
    }

    // Partition -------------------------------------------------------------

    pub fn check_group_limit(&self, num_groups: usize) -> ExecResult<()> {
        match self.options.group_limit {
            Some(limit) if num_groups > limit => {
                Err(ExecutionError::GroupLimitExceeded { num_groups, limit })
            }
            _ => Ok(()),
        }
    }

    /// Installs `keys` as the current partition, trusting that every group
    /// it describes may hold documents. Lookups of the old partition are
    /// dropped.
    pub fn assume_dense(&mut self, keys: Arc<GroupKeySet>) {
        self.num_groups = keys.num_groups();
        self.lookups.clear();
        debug!(
            target: "group_ql::session",
            kind = keys.kind(),
            num_groups = self.num_groups,
            "Installed group key set"
        );
        self.group_key_set = keys;
    }

    /// Installs `keys` masked down to the groups that hold documents in at
    /// least one dataset.
    /// The group count and key set change together, and only on success.
    pub fn densify(&mut self, keys: Arc<GroupKeySet>) -> ExecResult<()> {
        let num_groups = keys.num_groups();
        let counts: HashSet<QualifiedPush> = self
            .datasets
            .keys()
            .map(|name| QualifiedPush::new(name.clone(), vec!["count()"]))
            .collect();
        let pushed = self.push_metrics(&counts)?;
        let columns = self.group_stats_for(&pushed, num_groups);
        self.pop_stats()?;
        let columns = columns?;

        let mut presence = RoaringBitmap::new();
        for g in 1..=num_groups {
            if columns.iter().any(|column| column[g] > 0) {
                presence.insert(g as u32);
            }
        }
        debug!(
            target: "group_ql::session",
            present = presence.len(),
            num_groups,
            "Densified group key set"
        );
        self.num_groups = num_groups;
        self.group_key_set = MaskingGroupKeySet::create(keys, presence);
        self.lookups.clear();
        Ok(())
    }

    // Regroup primitives ----------------------------------------------------

    pub fn regroup(&mut self, rule: &QueryRemapRule, scope: &BTreeSet<String>) -> ExecResult<()> {
        for (name, dataset) in self.scoped_mut(scope)? {
            debug!(target: "group_ql::session", dataset = %name, ?rule, "regroup");
            dataset.remote.regroup(rule)?;
        }
        Ok(())
    }

    pub fn regroup_multi(
        &mut self,
        rules: &[GroupMultiRemapRule],
        scope: &BTreeSet<String>,
    ) -> ExecResult<()> {
        for (name, dataset) in self.scoped_mut(scope)? {
            debug!(target: "group_ql::session", dataset = %name, rules = rules.len(), "regroup_multi");
            dataset.remote.regroup_multi(rules)?;
        }
        Ok(())
    }

    pub fn int_or_regroup(
        &mut self,
        field: &str,
        terms: &[i64],
        groups: GroupMove,
        scope: &BTreeSet<String>,
    ) -> ExecResult<()> {
        for (name, dataset) in self.scoped_mut(scope)? {
            debug!(target: "group_ql::session", dataset = %name, field, terms = terms.len(), ?groups, "int_or_regroup");
            dataset.remote.int_or_regroup(field, terms, groups)?;
        }
        Ok(())
    }

    pub fn string_or_regroup(
        &mut self,
        field: &str,
        terms: &[String],
        groups: GroupMove,
        scope: &BTreeSet<String>,
    ) -> ExecResult<()> {
        for (name, dataset) in self.scoped_mut(scope)? {
            debug!(target: "group_ql::session", dataset = %name, field, terms = terms.len(), ?groups, "string_or_regroup");
            dataset.remote.string_or_regroup(field, terms, groups)?;
        }
        Ok(())
    }

    pub fn regex_regroup(
        &mut self,
        field: &str,
        regex: &str,
        groups: GroupMove,
        scope: &BTreeSet<String>,
    ) -> ExecResult<()> {
        for (name, dataset) in self.scoped_mut(scope)? {
            debug!(target: "group_ql::session", dataset = %name, field, regex, ?groups, "regex_regroup");
            dataset.remote.regex_regroup(field, regex, groups)?;
        }
        Ok(())
    }

    pub fn random_regroup(
        &mut self,
        field: &str,
        salt: &str,
        probability: f64,
        groups: GroupMove,
        scope: &BTreeSet<String>,
    ) -> ExecResult<()> {
        for (name, dataset) in self.scoped_mut(scope)? {
            let is_int_field = dataset.is_int_field(field);
            debug!(target: "group_ql::session", dataset = %name, field, probability, ?groups, "random_regroup");
            dataset
                .remote
                .random_regroup(field, is_int_field, salt, probability, groups)?;
        }
        Ok(())
    }

    /// Moves group `from[i]` to `to[i]` on every dataset; groups not listed
    /// are dropped.
    pub fn remap_groups(&mut self, from: &[usize], to: &[usize]) -> ExecResult<()> {
        if from.len() != to.len() {
            return Err(ExecutionError::InvalidArgument(format!(
                "remap needs matching group lists, got {} and {}",
                from.len(),
                to.len()
            )));
        }
        let rules: Vec<GroupMultiRemapRule> = from
            .iter()
            .zip(to.iter())
            .map(|(f, t)| GroupMultiRemapRule::unconditional(*f, *t))
            .collect();
        let scope = self.dataset_names();
        self.regroup_multi(&rules, &scope)
    }

    // Iteration -------------------------------------------------------------

    /// Runs one merged FTGS pass over `field` on the datasets of `scope`.
    /// Streams are requested sorted whenever more than one must be merged.
    pub fn iterate(
        &mut self,
        field: &str,
        kind: FieldKind,
        scope: &BTreeSet<String>,
        pushed: &PushedMetrics,
        callback: &mut dyn IterateCallback,
    ) -> ExecResult<()> {
        let force_sorted = self.options.sorted_iteration;
        let datasets = self.scoped_mut(scope)?;
        if datasets.is_empty() {
            warn!(target: "group_ql::session", field, "Iteration scope has no datasets");
            return Ok(());
        }
        let sorted = force_sorted || callback.need_sorted() || datasets.len() > 1;
        debug!(
            target: "group_ql::session",
            field,
            ?kind,
            sorted,
            datasets = datasets.len(),
            stats = pushed.num_stats(),
            "Starting FTGS iteration"
        );

        let mut streams = Vec::with_capacity(datasets.len());
        let mut columns: Vec<&[StatColumn]> = Vec::with_capacity(datasets.len());
        for (name, dataset) in datasets {
            columns.push(
                pushed
                    .per_session
                    .get(name)
                    .map(|c| c.as_slice())
                    .unwrap_or(&[]),
            );
            streams.push(dataset.remote.ftgs(field, kind, sorted)?);
        }
        merge_ftgs(streams, &columns, pushed.num_stats(), callback)
    }
}
