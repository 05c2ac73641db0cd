use chrono::NaiveDate;
use chrono_tz::Tz;

use super::key_set::GroupKeySet;
use super::render_labels;
use super::time_range::{DateTimeRangeGroupKeySet, YearMonthGroupKeySet};
use crate::shared::datetime::start_of_day_millis;
use crate::shared::format::OutputFormat;

const DAY: i64 = 86_400_000;
const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[test]
fn daily_buckets_render_time_ranges() {
    let start = start_of_day_millis(NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(), Tz::UTC);
    let keys = DateTimeRangeGroupKeySet::create(GroupKeySet::initial(), start, DAY, 3, FORMAT, Tz::UTC);

    assert_eq!(keys.num_groups(), 3);
    assert_eq!(
        keys.group_key(1).to_string(),
        "[2015-01-01 00:00:00, 2015-01-02 00:00:00)"
    );
    assert_eq!(
        keys.group_key(3).to_string(),
        "[2015-01-03 00:00:00, 2015-01-04 00:00:00)"
    );
    assert_eq!(
        render_labels(&keys, 2, OutputFormat::Csv),
        vec!["[2015-01-02 00:00:00, 2015-01-03 00:00:00)"]
    );
}

#[test]
fn month_buckets_follow_calendar_lengths() {
    let keys = YearMonthGroupKeySet::create(
        GroupKeySet::initial(),
        NaiveDate::from_ymd_opt(2015, 1, 15).unwrap(),
        3,
        "%Y-%m-%d",
        Tz::UTC,
    );

    assert_eq!(keys.num_groups(), 3);
    let labels: Vec<String> = (1..=3).map(|g| keys.group_key(g).to_string()).collect();
    assert_eq!(
        labels,
        vec![
            "[2015-01-01, 2015-02-01)",
            "[2015-02-01, 2015-03-01)",
            "[2015-03-01, 2015-04-01)",
        ]
    );
}
