use tracing::debug;

use super::explode::{ExplodePerGroup, ExplodeSessionNames, RegroupIntoParent};
use super::field_in::{IntRegroupFieldIn, StringRegroupFieldIn};
use super::group_filter::{ApplyFilterActions, ApplyGroupFilter};
use super::group_stats::{GetGroupStats, GroupStats};
use super::lookups::{ComputeAndCreateGroupStatsLookups, GetFieldMax, GetFieldMin, GetGroupPercentiles};
use super::metric_regroup::{MetricRegroup, RandomMetricRegroup};
use super::sibling::RegroupIntoLastSiblingWhere;
use super::time_regroup::{ExplodeDayOfWeek, ExplodeMonthOfYear, ExplodeTimeBuckets};
use crate::engine::errors::ExecResult;
use crate::engine::session::Session;

/// One step of a query plan run against a `Session`.
#[derive(Debug)]
pub enum Command {
    GetGroupStats(GetGroupStats),
    ApplyGroupFilter(ApplyGroupFilter),
    ApplyFilterActions(ApplyFilterActions),
    MetricRegroup(MetricRegroup),
    RandomMetricRegroup(RandomMetricRegroup),
    ExplodePerGroup(ExplodePerGroup),
    ExplodeSessionNames(ExplodeSessionNames),
    ExplodeTimeBuckets(ExplodeTimeBuckets),
    ExplodeDayOfWeek(ExplodeDayOfWeek),
    ExplodeMonthOfYear(ExplodeMonthOfYear),
    RegroupIntoParent(RegroupIntoParent),
    RegroupIntoLastSiblingWhere(RegroupIntoLastSiblingWhere),
    IntRegroupFieldIn(IntRegroupFieldIn),
    StringRegroupFieldIn(StringRegroupFieldIn),
    GetGroupPercentiles(GetGroupPercentiles),
    GetFieldMin(GetFieldMin),
    GetFieldMax(GetFieldMax),
    ComputeAndCreateGroupStatsLookups(ComputeAndCreateGroupStatsLookups),
}

/// What a command hands back. Per-group vectors are indexed by group.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
    Done,
    Rows(Vec<GroupStats>),
    Longs(Vec<i64>),
    Doubles(Vec<f64>),
    /// Whether each group, starting at group 1, was merged away.
    Merged(Vec<bool>),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::GetGroupStats(_) => "get_group_stats",
            Command::ApplyGroupFilter(_) => "apply_group_filter",
            Command::ApplyFilterActions(_) => "apply_filter_actions",
            Command::MetricRegroup(_) => "metric_regroup",
            Command::RandomMetricRegroup(_) => "random_metric_regroup",
            Command::ExplodePerGroup(_) => "explode_per_group",
            Command::ExplodeSessionNames(_) => "explode_session_names",
            Command::ExplodeTimeBuckets(_) => "explode_time_buckets",
            Command::ExplodeDayOfWeek(_) => "explode_day_of_week",
            Command::ExplodeMonthOfYear(_) => "explode_month_of_year",
            Command::RegroupIntoParent(_) => "regroup_into_parent",
            Command::RegroupIntoLastSiblingWhere(_) => "regroup_into_last_sibling_where",
            Command::IntRegroupFieldIn(_) => "int_regroup_field_in",
            Command::StringRegroupFieldIn(_) => "string_regroup_field_in",
            Command::GetGroupPercentiles(_) => "get_group_percentiles",
            Command::GetFieldMin(_) => "get_field_min",
            Command::GetFieldMax(_) => "get_field_max",
            Command::ComputeAndCreateGroupStatsLookups(_) => "compute_and_create_group_stats_lookups",
        }
    }

    pub fn execute(&mut self, session: &mut Session) -> ExecResult<CommandOutput> {
        debug!(target: "group_ql::commands", command = self.name(), num_groups = session.num_groups, "Executing command");
        let result = match self {
            Command::GetGroupStats(c) => return c.evaluate(session).map(CommandOutput::Rows),
            Command::GetGroupPercentiles(c) => return c.evaluate(session).map(CommandOutput::Longs),
            Command::GetFieldMin(c) => return c.evaluate(session).map(CommandOutput::Doubles),
            Command::GetFieldMax(c) => return c.evaluate(session).map(CommandOutput::Doubles),
            Command::RegroupIntoLastSiblingWhere(c) => {
                return c.execute(session).map(CommandOutput::Merged);
            }
            Command::ApplyGroupFilter(c) => c.execute(session),
            Command::ApplyFilterActions(c) => c.execute(session),
            Command::MetricRegroup(c) => c.execute(session),
            Command::RandomMetricRegroup(c) => c.execute(session),
            Command::ExplodePerGroup(c) => c.execute(session),
            Command::ExplodeSessionNames(c) => c.execute(session),
            Command::ExplodeTimeBuckets(c) => c.execute(session),
            Command::ExplodeDayOfWeek(c) => c.execute(session),
            Command::ExplodeMonthOfYear(c) => c.execute(session),
            Command::RegroupIntoParent(c) => c.execute(session),
            Command::IntRegroupFieldIn(c) => c.execute(session),
            Command::StringRegroupFieldIn(c) => c.execute(session),
            Command::ComputeAndCreateGroupStatsLookups(c) => c.execute(session),
        };
        result.map(|_| CommandOutput::Done)
    }
}

/// Runs commands in order, stopping at the first failure. Returns the
/// output of every command that ran.
pub fn run_all(commands: &mut [Command], session: &mut Session) -> ExecResult<Vec<CommandOutput>> {
    let mut outputs = Vec::with_capacity(commands.len());
    for command in commands.iter_mut() {
        let output = command.execute(session).inspect_err(|e| e.log_error())?;
        outputs.push(output);
    }
    Ok(outputs)
}
