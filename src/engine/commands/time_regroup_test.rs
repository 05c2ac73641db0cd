use chrono::NaiveDate;

use super::explode::{ExplodeOpts, ExplodePerGroup};
use super::group_stats::GetGroupStats;
use super::time_regroup::{ExplodeDayOfWeek, ExplodeMonthOfYear, ExplodeTimeBuckets};
use crate::engine::errors::ExecutionError;
use crate::engine::groupkeys::render_labels;
use crate::engine::metrics::{AggregateMetric, QualifiedPush};
use crate::engine::remote::RegroupTerm;
use crate::engine::session::Session;
use crate::shared::format::OutputFormat;
use crate::test_helpers::factory::Factory;

const DAY_MILLIS: i64 = 86_400_000;

fn seconds(year: i32, month: u32, day: u32, hour: u32) -> i64 {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
        .and_utc()
        .timestamp()
}

fn millis(year: i32, month: u32, day: u32) -> i64 {
    seconds(year, month, day, 0) * 1_000
}

/// Events on Thu 2015-01-01 (twice), Fri 01-02 and Sun 01-04.
fn early_january() -> Session {
    let event = |time: i64, country: &str| {
        Factory::document()
            .with("unixtime", time)
            .with("country", country)
            .create()
    };
    Factory::session()
        .with_dataset(
            "jobs",
            vec![
                event(seconds(2015, 1, 1, 1), "us"),
                event(seconds(2015, 1, 1, 2), "ca"),
                event(seconds(2015, 1, 2, 5), "us"),
                event(seconds(2015, 1, 4, 0), "us"),
            ],
        )
        .create()
}

fn table(session: &mut Session) -> Vec<(String, f64)> {
    let count = AggregateMetric::doc_stats(QualifiedPush::new("jobs", vec!["count()"]));
    let rows = GetGroupStats::new(vec![count]).evaluate(session).unwrap();
    rows.into_iter()
        .map(|row| {
            (
                render_labels(&session.group_key_set, row.group, OutputFormat::Tsv).join("/"),
                row.stats[0],
            )
        })
        .collect()
}

fn daily(format: Option<&str>) -> ExplodeTimeBuckets {
    ExplodeTimeBuckets {
        start_millis: millis(2015, 1, 1),
        end_millis: millis(2015, 1, 5),
        period_millis: DAY_MILLIS,
        format: format.map(str::to_string),
    }
}

#[test]
fn time_buckets_under_a_single_group_are_all_kept() {
    let mut session = early_january();

    daily(Some("%Y-%m-%d")).execute(&mut session).unwrap();

    assert_eq!(session.num_groups, 4);
    assert_eq!(
        table(&mut session),
        vec![
            ("[2015-01-01, 2015-01-02)".to_string(), 2.0),
            ("[2015-01-02, 2015-01-03)".to_string(), 1.0),
            ("[2015-01-03, 2015-01-04)".to_string(), 0.0),
            ("[2015-01-04, 2015-01-05)".to_string(), 1.0),
        ]
    );
}

#[test]
fn time_buckets_under_several_groups_hide_empty_ones() {
    let mut session = early_january();
    ExplodePerGroup::new(vec![ExplodeOpts::new(vec![
        RegroupTerm::string("country", "ca"),
        RegroupTerm::string("country", "us"),
    ])])
    .execute(&mut session)
    .unwrap();

    daily(None).execute(&mut session).unwrap();

    assert_eq!(session.num_groups, 8);
    assert_eq!(
        table(&mut session),
        vec![
            ("ca/[2015-01-01 00:00:00, 2015-01-02 00:00:00)".to_string(), 1.0),
            ("us/[2015-01-01 00:00:00, 2015-01-02 00:00:00)".to_string(), 1.0),
            ("us/[2015-01-02 00:00:00, 2015-01-03 00:00:00)".to_string(), 1.0),
            ("us/[2015-01-04 00:00:00, 2015-01-05 00:00:00)".to_string(), 1.0),
        ]
    );
}

#[test]
fn events_outside_the_window_are_dropped() {
    let mut session = early_january();
    let mut command = daily(None);
    command.start_millis = millis(2015, 1, 2);

    command.execute(&mut session).unwrap();

    let total: f64 = table(&mut session).iter().map(|(_, c)| c).sum();
    assert_eq!(total, 2.0);
}

#[test]
fn period_must_be_whole_seconds() {
    let mut session = early_january();
    let mut command = daily(None);
    command.period_millis = 1_500;

    let err = command.execute(&mut session).unwrap_err();

    assert!(matches!(err, ExecutionError::InvalidArgument(_)));
}

#[test]
fn day_of_week_folds_days_onto_weekdays() {
    let mut session = early_january();

    ExplodeDayOfWeek {
        start_millis: millis(2015, 1, 1),
        end_millis: millis(2015, 1, 15),
    }
    .execute(&mut session)
    .unwrap();

    assert_eq!(session.num_groups, 7);
    assert_eq!(
        table(&mut session),
        vec![
            ("Thursday".to_string(), 2.0),
            ("Friday".to_string(), 1.0),
            ("Sunday".to_string(), 1.0),
        ]
    );
}

#[test]
fn month_of_year_covers_every_touched_month() {
    let mut session = Factory::session()
        .with_dataset(
            "jobs",
            vec![
                Factory::document().with("unixtime", seconds(2015, 1, 15, 3)).create(),
                Factory::document().with("unixtime", seconds(2015, 1, 20, 3)).create(),
                Factory::document().with("unixtime", seconds(2015, 3, 2, 3)).create(),
            ],
        )
        .create();

    ExplodeMonthOfYear {
        start_millis: millis(2015, 1, 10),
        end_millis: millis(2015, 3, 5),
        format: Some("%Y-%m".into()),
    }
    .execute(&mut session)
    .unwrap();

    assert_eq!(session.num_groups, 3);
    assert_eq!(
        table(&mut session),
        vec![
            ("[2015-01, 2015-02)".to_string(), 2.0),
            ("[2015-03, 2015-04)".to_string(), 1.0),
        ]
    );
}

#[test]
fn empty_window_is_rejected() {
    let mut session = early_january();

    let err = ExplodeDayOfWeek {
        start_millis: millis(2015, 1, 2),
        end_millis: millis(2015, 1, 2),
    }
    .execute(&mut session)
    .unwrap_err();

    assert!(matches!(err, ExecutionError::InvalidArgument(_)));
}
