pub mod command;
pub mod explode;
pub mod field_in;
pub mod group_filter;
pub mod group_stats;
pub mod lookups;
pub mod metric_regroup;
pub mod sibling;
pub mod time_regroup;

pub use command::{Command, CommandOutput, run_all};
pub use explode::{ExplodeOpts, ExplodePerGroup, ExplodeSessionNames, RegroupIntoParent};
pub use field_in::{IntRegroupFieldIn, StringRegroupFieldIn};
pub use group_filter::{ApplyFilterActions, ApplyGroupFilter};
pub use group_stats::{GetGroupStats, GroupStats, render_rows};
pub use lookups::{
    ComputeAndCreateGroupStatsLookups, GetFieldMax, GetFieldMin, GetGroupPercentiles,
    LookupComputation,
};
pub use metric_regroup::{MetricRegroup, RandomMetricRegroup};
pub use sibling::RegroupIntoLastSiblingWhere;
pub use time_regroup::{ExplodeDayOfWeek, ExplodeMonthOfYear, ExplodeTimeBuckets};

#[cfg(test)]
mod time_regroup_test;
