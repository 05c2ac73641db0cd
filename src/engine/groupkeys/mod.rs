pub mod dumb;
pub mod group_key;
pub mod key_set;
pub mod labels;
pub mod masking;
pub mod metric_range;
pub mod time_range;

pub use dumb::DumbGroupKeySet;
pub use group_key::{DAY_KEYS, DEFAULT_GROUP_NAME, GroupKey};
pub use key_set::{
    DayOfWeekGroupKeySet, FieldInGroupKeySet, GroupKeySet, RandomGroupKeySet,
    SessionNameGroupKeySet,
};
pub use labels::{depth, group_keys, render_labels};
pub use masking::MaskingGroupKeySet;
pub use metric_range::{MetricBuckets, MetricRangeGroupKeySet};
pub use time_range::{DateTimeRangeGroupKeySet, YearMonthGroupKeySet};

#[cfg(test)]
mod time_range_test;
