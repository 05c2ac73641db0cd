use std::sync::Arc;

use super::group_key::GroupKey;
use super::key_set::{GroupKeySet, inner_of};

/// Bucket layout of a metric regroup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricBuckets {
    pub min: i64,
    pub interval: i64,
    /// Children per parent, synthetic slots included.
    pub num_buckets: usize,
    pub exclude_gutters: bool,
    pub with_default_bucket: bool,
    /// Buckets are int terms of a predicate rather than numeric ranges.
    pub from_predicate: bool,
}

/// Fixed-width numeric buckets under each parent group.
///
/// When gutters are kept, the last inner slot is the high gutter and the
/// one before it the low gutter. Without gutters, a default bucket (if any)
/// takes the last slot.
#[derive(Debug)]
pub struct MetricRangeGroupKeySet {
    pub previous: Arc<GroupKeySet>,
    pub num_buckets: usize,
    pub num_groups: usize,
    buckets: MetricBuckets,
}

impl MetricRangeGroupKeySet {
    pub fn create(previous: Arc<GroupKeySet>, buckets: MetricBuckets) -> Arc<GroupKeySet> {
        let num_groups = previous.num_groups() * buckets.num_buckets;
        Arc::new(GroupKeySet::MetricRange(Self {
            previous,
            num_buckets: buckets.num_buckets,
            num_groups,
            buckets,
        }))
    }

    pub fn buckets(&self) -> &MetricBuckets {
        &self.buckets
    }

    pub fn group_key(&self, group: usize) -> GroupKey {
        let b = &self.buckets;
        let inner = inner_of(group, self.num_buckets);
        if !b.exclude_gutters && self.num_buckets >= 2 {
            if inner == self.num_buckets - 1 {
                return GroupKey::HighGutter {
                    min: b.min + b.interval * (self.num_buckets as i64 - 2),
                };
            }
            if inner == self.num_buckets - 2 {
                return GroupKey::LowGutter { max: b.min };
            }
        } else if b.with_default_bucket && self.num_buckets > 0 && inner == self.num_buckets - 1 {
            return GroupKey::default_bucket();
        }
        if b.from_predicate {
            GroupKey::Int(inner as i64)
        } else {
            let lo = b.min + b.interval * inner as i64;
            GroupKey::Range {
                min: lo,
                max: lo + b.interval,
            }
        }
    }
}
