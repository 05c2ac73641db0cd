use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::engine::errors::{ExecResult, ExecutionError};
use crate::engine::groupkeys::{MetricBuckets, MetricRangeGroupKeySet, RandomGroupKeySet};
use crate::engine::remote::GroupMultiRemapRule;
use crate::engine::session::Session;

/// Splits every group into fixed-width buckets of a per-dataset stat.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRegroup {
    pub per_dataset_metric: BTreeMap<String, Vec<String>>,
    pub min: i64,
    pub max: i64,
    pub interval: i64,
    pub exclude_gutters: bool,
    /// Only honoured together with `exclude_gutters`: out-of-range values
    /// land in one DEFAULT bucket instead of being dropped.
    pub with_default: bool,
    pub from_predicate: bool,
}

impl MetricRegroup {
    pub fn execute(&self, session: &mut Session) -> ExecResult<()> {
        if self.interval <= 0 || self.max <= self.min {
            return Err(ExecutionError::InvalidArgument(format!(
                "metric regroup needs min < max and a positive interval, got [{}, {}) by {}",
                self.min, self.max, self.interval
            )));
        }
        let with_default_bucket = self.with_default && self.exclude_gutters;
        let no_gutters = self.exclude_gutters && !with_default_bucket;
        let data_buckets = ((self.max - self.min + self.interval - 1) / self.interval) as usize;
        let intermediate = data_buckets + if no_gutters { 0 } else { 2 };
        let groups_before = session.num_groups;
        session.check_group_limit(intermediate * groups_before)?;

        // Both gutters of a parent collapse onto its DEFAULT slot, which sits
        // right after the data buckets.
        let merge_rules: Vec<GroupMultiRemapRule> = if with_default_bucket {
            (1..=intermediate * groups_before)
                .map(|group| {
                    let offset = (group - 1) % intermediate;
                    let parent = 1 + (group - 1) / intermediate;
                    let base = 1 + (parent - 1) * (intermediate - 1);
                    let new_group = if offset >= intermediate - 2 {
                        base + intermediate - 2
                    } else {
                        base + offset
                    };
                    GroupMultiRemapRule::unconditional(group, new_group)
                })
                .collect()
        } else {
            Vec::new()
        };

        let scope = session.dataset_names();
        for (name, dataset) in session.scoped_mut(&scope)? {
            let Some(pushes) = self.per_dataset_metric.get(name) else {
                warn!(target: "group_ql::commands", dataset = %name, "No regroup metric for dataset, skipping");
                continue;
            };
            dataset.with_single_stat(pushes, |remote| {
                remote.metric_regroup(0, self.min, self.max, self.interval, no_gutters)?;
                if with_default_bucket {
                    remote.regroup_multi(&merge_rules)?;
                }
                Ok(())
            })?;
            debug!(target: "group_ql::commands", dataset = %name, intermediate, "Metric regrouped");
        }

        let num_buckets = if with_default_bucket {
            intermediate - 1
        } else {
            intermediate
        };
        let keys = MetricRangeGroupKeySet::create(
            session.group_key_set.clone(),
            MetricBuckets {
                min: self.min,
                interval: self.interval,
                num_buckets,
                exclude_gutters: self.exclude_gutters,
                with_default_bucket,
                from_predicate: self.from_predicate,
            },
        );
        session.assume_dense(keys);
        info!(target: "group_ql::commands", num_groups = session.num_groups, "Metric regroup done");
        Ok(())
    }
}

/// Spreads the single group into `k` pseudo-random buckets keyed by a
/// salted hash of a per-dataset stat.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomMetricRegroup {
    pub per_dataset_metric: BTreeMap<String, Vec<String>>,
    pub k: usize,
    pub salt: String,
}

impl RandomMetricRegroup {
    pub fn execute(&self, session: &mut Session) -> ExecResult<()> {
        if session.num_groups != 1 {
            return Err(ExecutionError::InvalidArgument(
                "Can only use RANDOM() regroup as first GROUP BY".into(),
            ));
        }
        if self.k == 0 {
            return Err(ExecutionError::InvalidArgument(
                "random regroup needs at least one bucket".into(),
            ));
        }
        session.check_group_limit(self.k + 1)?;

        let percentages: Vec<f64> = (1..self.k).map(|i| i as f64 / self.k as f64).collect();
        let result_groups: Vec<usize> = (2..=self.k + 1).collect();

        let scope = session.dataset_names();
        for (name, dataset) in session.scoped_mut(&scope)? {
            let Some(pushes) = self.per_dataset_metric.get(name) else {
                continue;
            };
            dataset.with_single_stat(pushes, |remote| {
                remote.random_metric_multi_regroup(0, &self.salt, 1, &percentages, &result_groups)
            })?;
        }

        let keys = RandomGroupKeySet::create(session.group_key_set.clone(), self.k + 1);
        session.assume_dense(keys);
        info!(target: "group_ql::commands", k = self.k, "Random metric regroup done");
        Ok(())
    }
}
