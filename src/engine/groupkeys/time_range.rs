use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;

use super::group_key::GroupKey;
use super::key_set::{GroupKeySet, inner_of};
use crate::shared::datetime::{add_months, format_time_range, start_of_day_millis};

/// Fixed-period time buckets starting at `earliest_start`.
#[derive(Debug)]
pub struct DateTimeRangeGroupKeySet {
    pub previous: Arc<GroupKeySet>,
    pub earliest_start: i64,
    pub period_millis: i64,
    pub num_buckets: usize,
    pub format: String,
    pub tz: Tz,
}

impl DateTimeRangeGroupKeySet {
    pub fn create(
        previous: Arc<GroupKeySet>,
        earliest_start: i64,
        period_millis: i64,
        num_buckets: usize,
        format: impl Into<String>,
        tz: Tz,
    ) -> Arc<GroupKeySet> {
        Arc::new(GroupKeySet::DateTimeRange(Self {
            previous,
            earliest_start,
            period_millis,
            num_buckets,
            format: format.into(),
            tz,
        }))
    }

    pub fn group_key(&self, group: usize) -> GroupKey {
        let inner = inner_of(group, self.num_buckets) as i64;
        let start = self.earliest_start + inner * self.period_millis;
        GroupKey::Str(format_time_range(
            start,
            start + self.period_millis,
            &self.format,
            self.tz,
        ))
    }
}

/// Calendar month buckets starting at the month of `start_month`.
#[derive(Debug)]
pub struct YearMonthGroupKeySet {
    pub previous: Arc<GroupKeySet>,
    pub start_month: NaiveDate,
    pub num_months: usize,
    pub format: String,
    pub tz: Tz,
}

impl YearMonthGroupKeySet {
    pub fn create(
        previous: Arc<GroupKeySet>,
        start_month: NaiveDate,
        num_months: usize,
        format: impl Into<String>,
        tz: Tz,
    ) -> Arc<GroupKeySet> {
        Arc::new(GroupKeySet::YearMonth(Self {
            previous,
            start_month: add_months(start_month, 0),
            num_months,
            format: format.into(),
            tz,
        }))
    }

    pub fn group_key(&self, group: usize) -> GroupKey {
        let inner = inner_of(group, self.num_months) as i32;
        let from = add_months(self.start_month, inner);
        let to = add_months(self.start_month, inner + 1);
        GroupKey::Str(format_time_range(
            start_of_day_millis(from, self.tz),
            start_of_day_millis(to, self.tz),
            &self.format,
            self.tz,
        ))
    }
}
