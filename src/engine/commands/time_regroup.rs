use chrono::{Datelike, Duration, NaiveDate, TimeZone};
use chrono_tz::Tz;
use tracing::{debug, info};

use crate::engine::errors::{ExecResult, ExecutionError};
use crate::engine::groupkeys::{DateTimeRangeGroupKeySet, DayOfWeekGroupKeySet, YearMonthGroupKeySet};
use crate::engine::session::Session;
use crate::shared::datetime::{add_months, start_of_day_millis};

const MILLIS_PER_SECOND: i64 = 1_000;
const SECONDS_PER_DAY: i64 = 86_400;

/// Buckets every group by each dataset's time field, `num_buckets` periods
/// of `period_seconds` from `start_seconds`. Documents outside the window
/// are dropped. Leaves the group key set untouched.
fn time_regroup(
    session: &mut Session,
    start_seconds: i64,
    period_seconds: i64,
    num_buckets: usize,
) -> ExecResult<()> {
    session.check_group_limit(num_buckets * session.num_groups)?;
    let end_seconds = start_seconds + period_seconds * num_buckets as i64;
    let scope = session.dataset_names();
    for (name, dataset) in session.scoped_mut(&scope)? {
        let pushes = vec![dataset.time_field.clone()];
        dataset.with_single_stat(&pushes, |remote| {
            remote.metric_regroup(0, start_seconds, end_seconds, period_seconds, true)
        })?;
        debug!(
            target: "group_ql::commands",
            dataset = %name,
            start_seconds,
            period_seconds,
            num_buckets,
            "Time regrouped"
        );
    }
    session.num_groups *= num_buckets;
    Ok(())
}

fn validate_window(start_millis: i64, end_millis: i64) -> ExecResult<()> {
    if end_millis <= start_millis {
        return Err(ExecutionError::InvalidArgument(format!(
            "time window [{}, {}) is empty",
            start_millis, end_millis
        )));
    }
    Ok(())
}

fn local_date(millis: i64, tz: Tz) -> ExecResult<NaiveDate> {
    tz.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.date_naive())
        .ok_or_else(|| ExecutionError::InvalidArgument(format!("timestamp out of range: {}", millis)))
}

/// Local calendar days covering `[start_millis, end_millis)`.
fn day_window(start_millis: i64, end_millis: i64, tz: Tz) -> ExecResult<(NaiveDate, usize)> {
    validate_window(start_millis, end_millis)?;
    let first = local_date(start_millis, tz)?;
    let last = local_date(end_millis - 1, tz)?;
    Ok((first, (last - first).num_days() as usize + 1))
}

/// Splits every group into fixed time periods.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplodeTimeBuckets {
    pub start_millis: i64,
    pub end_millis: i64,
    pub period_millis: i64,
    /// Label format; the configured date-time format when unset.
    pub format: Option<String>,
}

impl ExplodeTimeBuckets {
    pub fn execute(&self, session: &mut Session) -> ExecResult<()> {
        validate_window(self.start_millis, self.end_millis)?;
        if self.period_millis < MILLIS_PER_SECOND || self.period_millis % MILLIS_PER_SECOND != 0 {
            return Err(ExecutionError::InvalidArgument(format!(
                "time bucket period must be a whole number of seconds, got {}ms",
                self.period_millis
            )));
        }
        let span = self.end_millis - self.start_millis;
        let num_buckets = ((span + self.period_millis - 1) / self.period_millis) as usize;

        let head = session.group_key_set.clone();
        let groups_before = session.num_groups;
        time_regroup(
            session,
            self.start_millis.div_euclid(MILLIS_PER_SECOND),
            self.period_millis / MILLIS_PER_SECOND,
            num_buckets,
        )?;

        let time = &session.options().time;
        let format = self
            .format
            .clone()
            .unwrap_or_else(|| time.date_time_format.clone());
        let keys = DateTimeRangeGroupKeySet::create(
            head,
            self.start_millis,
            self.period_millis,
            num_buckets,
            format,
            time.timezone_or_utc(),
        );
        if groups_before == 1 {
            session.assume_dense(keys);
        } else {
            session.densify(keys)?;
        }
        info!(target: "group_ql::commands", num_buckets, num_groups = session.num_groups, "Time buckets exploded");
        Ok(())
    }
}

/// Splits every group into seven weekday children, Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExplodeDayOfWeek {
    pub start_millis: i64,
    pub end_millis: i64,
}

impl ExplodeDayOfWeek {
    pub fn execute(&self, session: &mut Session) -> ExecResult<()> {
        let tz = session.options().time.timezone_or_utc();
        let (first_day, num_days) = day_window(self.start_millis, self.end_millis, tz)?;
        let head = session.group_key_set.clone();
        let groups_before = session.num_groups;
        session.check_group_limit(groups_before * 7)?;

        let start_seconds = start_of_day_millis(first_day, tz).div_euclid(MILLIS_PER_SECOND);
        time_regroup(session, start_seconds, SECONDS_PER_DAY, num_days)?;

        let from: Vec<usize> = (1..=groups_before * num_days).collect();
        let to: Vec<usize> = from
            .iter()
            .map(|g| {
                let parent = 1 + (g - 1) / num_days;
                let day = first_day + Duration::days(((g - 1) % num_days) as i64);
                (parent - 1) * 7 + day.weekday().num_days_from_monday() as usize + 1
            })
            .collect();
        session.remap_groups(&from, &to)?;

        session.densify(DayOfWeekGroupKeySet::create(head))?;
        info!(target: "group_ql::commands", num_days, num_groups = session.num_groups, "Day of week exploded");
        Ok(())
    }
}

/// Splits every group into calendar months.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplodeMonthOfYear {
    pub start_millis: i64,
    pub end_millis: i64,
    pub format: Option<String>,
}

impl ExplodeMonthOfYear {
    pub fn execute(&self, session: &mut Session) -> ExecResult<()> {
        let time = session.options().time.clone();
        let tz = time.timezone_or_utc();
        let (first_day, num_days) = day_window(self.start_millis, self.end_millis, tz)?;
        let start_month = add_months(first_day, 0);
        let last_day = first_day + Duration::days(num_days as i64 - 1);
        let month_index = |date: NaiveDate| {
            ((date.year() - start_month.year()) * 12 + date.month0() as i32
                - start_month.month0() as i32) as usize
        };
        let num_months = month_index(last_day) + 1;

        let head = session.group_key_set.clone();
        let groups_before = session.num_groups;
        session.check_group_limit(groups_before * num_months)?;

        let start_seconds = start_of_day_millis(first_day, tz).div_euclid(MILLIS_PER_SECOND);
        time_regroup(session, start_seconds, SECONDS_PER_DAY, num_days)?;

        let from: Vec<usize> = (1..=groups_before * num_days).collect();
        let to: Vec<usize> = from
            .iter()
            .map(|g| {
                let parent = 1 + (g - 1) / num_days;
                let day = first_day + Duration::days(((g - 1) % num_days) as i64);
                (parent - 1) * num_months + month_index(day) + 1
            })
            .collect();
        session.remap_groups(&from, &to)?;

        let format = self.format.clone().unwrap_or(time.date_time_format);
        session.densify(YearMonthGroupKeySet::create(
            head,
            start_month,
            num_months,
            format,
            tz,
        ))?;
        info!(target: "group_ql::commands", num_months, num_groups = session.num_groups, "Month of year exploded");
        Ok(())
    }
}
