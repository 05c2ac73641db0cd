use std::collections::BTreeSet;

use super::execute::execute_single;
use super::field_extremes::FieldExtreme;
use super::group_distincts::GroupDistincts;
use super::percentiles::GroupPercentiles;
use super::simple_iterate::SimpleIterate;
use super::sum_across::SumAcross;
use crate::engine::errors::ExecutionError;
use crate::engine::metrics::{AggregateFilter, AggregateMetric, CompareOp, QualifiedPush};
use crate::engine::remote::GroupMove;
use crate::engine::session::Session;
use crate::engine::types::TermValue;
use crate::test_helpers::factory::Factory;

fn jobs() -> BTreeSet<String> {
    BTreeSet::from(["jobs".to_string()])
}

fn clicks() -> AggregateMetric {
    AggregateMetric::doc_stats(QualifiedPush::new("jobs", vec!["clicks"]))
}

/// Titles with click counts, split into two groups by country.
fn session() -> Session {
    let doc = |title: &str, country: &str, clicks: i64| {
        Factory::document()
            .with("title", title)
            .with("country", country)
            .with("clicks", clicks)
            .create()
    };
    let mut session = Factory::session()
        .with_dataset(
            "jobs",
            vec![
                doc("cook", "us", 5),
                doc("nurse", "us", 9),
                doc("driver", "us", 5),
                doc("idle", "us", 0),
                doc("cook", "ca", 2),
                doc("nurse", "ca", 1),
            ],
        )
        .create();
    session
        .string_or_regroup("country", &["us".to_string()], GroupMove::new(1, 2, 1), &jobs())
        .unwrap();
    session.num_groups = 2;
    session
}

#[test]
fn sum_across_respects_filter() {
    let mut session = session();
    let more_than_two = AggregateFilter::compare(CompareOp::Gt, clicks(), AggregateMetric::constant(2.0));

    let sums = execute_single(
        &mut session,
        "title",
        SumAcross::new(jobs(), clicks(), Some(more_than_two)),
    )
    .unwrap();

    assert_eq!(sums, vec![0.0, 19.0, 0.0]);
}

#[test]
fn group_distincts_counts_allowed_terms_per_group() {
    let mut session = session();

    let all = execute_single(&mut session, "title", GroupDistincts::new(jobs(), None)).unwrap();
    assert_eq!(all, vec![0, 4, 2]);

    let starts_with_n = AggregateFilter::term_regex("n.*").unwrap();
    let filtered =
        execute_single(&mut session, "title", GroupDistincts::new(jobs(), Some(starts_with_n)))
            .unwrap();
    assert_eq!(filtered, vec![0, 1, 1]);
}

#[test]
fn simple_iterate_keeps_visit_order_without_top_k() {
    let mut session = session();

    let rows = execute_single(
        &mut session,
        "title",
        SimpleIterate::new(jobs(), vec![clicks()]),
    )
    .unwrap();

    assert!(rows[0].is_empty());
    let ca: Vec<(TermValue, Vec<f64>)> = rows[2]
        .iter()
        .map(|r| (r.term.clone(), r.selects.clone()))
        .collect();
    assert_eq!(
        ca,
        vec![
            (TermValue::Str("cook".into()), vec![2.0]),
            (TermValue::Str("nurse".into()), vec![1.0]),
        ]
    );
}

#[test]
fn top_k_orders_descending_with_term_tie_break() {
    let mut session = session();

    let rows = execute_single(
        &mut session,
        "title",
        SimpleIterate::new(jobs(), vec![]).with_top_k(2, clicks()),
    )
    .unwrap();

    let us: Vec<(TermValue, f64)> = rows[1]
        .iter()
        .map(|r| (r.term.clone(), r.top_k_value))
        .collect();
    assert_eq!(
        us,
        vec![
            (TermValue::Str("nurse".into()), 9.0),
            (TermValue::Str("cook".into()), 5.0),
        ]
    );
    assert_eq!(rows[2].len(), 2);
}

#[test]
fn top_k_ranks_nan_lowest() {
    let mut session = session();
    // clicks / clicks is NaN for "idle".
    let ratio = AggregateMetric::divide(clicks(), clicks());

    let rows = execute_single(
        &mut session,
        "title",
        SimpleIterate::new(jobs(), vec![clicks()]).with_top_k(4, ratio),
    )
    .unwrap();

    let us = &rows[1];
    assert_eq!(us.len(), 4);
    assert_eq!(us[3].term, TermValue::Str("idle".into()));
    assert!(us[3].top_k_value.is_nan());
    let leaders: Vec<&TermValue> = us[..3].iter().map(|r| &r.term).collect();
    assert_eq!(
        leaders,
        vec![
            &TermValue::Str("cook".into()),
            &TermValue::Str("driver".into()),
            &TermValue::Str("nurse".into()),
        ]
    );
}

#[test]
fn simple_iterate_filter_drops_terms() {
    let mut session = session();

    let rows = execute_single(
        &mut session,
        "title",
        SimpleIterate::new(jobs(), vec![clicks()])
            .with_filter(AggregateFilter::term_equals(TermValue::Str("cook".into()))),
    )
    .unwrap();

    assert_eq!(rows[1].len(), 1);
    assert_eq!(rows[2].len(), 1);
    assert_eq!(rows[2][0].selects, vec![2.0]);
}

#[test]
fn percentile_is_the_term_where_the_running_count_crosses_the_threshold() {
    let mut session = session();

    let median = GroupPercentiles::prepare(&mut session, jobs(), "clicks", 50.0).unwrap();
    let values = execute_single(&mut session, "clicks", median).unwrap();

    assert_eq!(values, vec![0, 5, 1]);
    assert_eq!(session.dataset("jobs").unwrap().remote.num_stats(), 0);
}

#[test]
fn hundredth_percentile_is_the_largest_term() {
    let mut session = session();

    let top = GroupPercentiles::prepare(&mut session, jobs(), "clicks", 100.0).unwrap();
    let values = execute_single(&mut session, "clicks", top).unwrap();

    assert_eq!(values, vec![0, 9, 2]);
}

#[test]
fn percentile_outside_zero_to_hundred_is_rejected() {
    let mut session = session();

    let err = GroupPercentiles::prepare(&mut session, jobs(), "clicks", 101.0).unwrap_err();

    assert!(matches!(err, ExecutionError::InvalidArgument(_)));
}

#[test]
fn percentile_over_string_field_fails() {
    let mut session = session();

    let handler = GroupPercentiles::prepare(&mut session, jobs(), "title", 50.0).unwrap();
    let err = execute_single(&mut session, "title", handler).unwrap_err();

    assert!(matches!(err, ExecutionError::InvalidArgument(_)));
    assert_eq!(session.dataset("jobs").unwrap().remote.num_stats(), 0);
}

#[test]
fn field_min_and_max_per_group() {
    let mut session = session();

    let min = execute_single(&mut session, "clicks", FieldExtreme::min(jobs())).unwrap();
    let max = execute_single(&mut session, "clicks", FieldExtreme::max(jobs())).unwrap();

    assert_eq!(&min[1..], &[0.0, 1.0]);
    assert_eq!(&max[1..], &[9.0, 2.0]);
    assert!(min[0].is_nan());
}

#[test]
fn field_extremes_ignore_non_numeric_strings() {
    let mut session = session();

    let max = execute_single(&mut session, "title", FieldExtreme::max(jobs())).unwrap();

    assert!(max.iter().all(|v| v.is_nan()));
}
