use std::collections::{HashMap, HashSet};

use super::aggregate::AggregateMetric;
use super::filter::{AggregateFilter, CompareOp};
use super::push::{Pushable, QualifiedPush};
use super::state::EvalState;
use crate::engine::errors::ExecutionError;
use crate::engine::groupkeys::{GroupKeySet, MetricBuckets, MetricRangeGroupKeySet};
use crate::engine::types::{Term, TermValue};

fn push(name: &str) -> QualifiedPush {
    QualifiedPush::new("jobs", vec![name])
}

#[test]
fn compare_requires_both_operands() {
    let filter = AggregateFilter::compare(
        CompareOp::Gt,
        AggregateMetric::doc_stats(push("clicks")),
        AggregateMetric::doc_stats(push("impressions")),
    );
    assert_eq!(
        filter.requires(),
        HashSet::from([push("clicks"), push("impressions")])
    );
}

#[test]
fn compare_batch_and_per_term() {
    let mut filter = AggregateFilter::compare(
        CompareOp::Ge,
        AggregateMetric::doc_stats(push("clicks")),
        AggregateMetric::constant(5.0),
    );
    filter.register(&HashMap::from([(push("clicks"), 0)]), &GroupKeySet::initial());

    let stats = vec![vec![0, 4, 5, 6]];
    assert_eq!(
        filter.get_group_stats(&stats, 3).unwrap(),
        vec![false, false, true, true]
    );

    let mut state = EvalState::new();
    assert!(!filter.allow(Term::Int(1), &[4], 1, &mut state).unwrap());
    assert!(filter.allow(Term::Int(1), &[5], 1, &mut state).unwrap());
}

#[test]
fn boolean_algebra() {
    let t = AggregateFilter::always;
    let f = AggregateFilter::never;

    assert_eq!(AggregateFilter::and(t(), f()).get_group_stats(&[], 1).unwrap(), vec![false, false]);
    assert_eq!(AggregateFilter::or(t(), f()).get_group_stats(&[], 1).unwrap(), vec![false, true]);
    assert_eq!(AggregateFilter::not(f()).get_group_stats(&[], 2).unwrap(), vec![false, true, true]);

    let mut state = EvalState::new();
    assert!(AggregateFilter::not(f()).allow(Term::Int(0), &[], 1, &mut state).unwrap());
}

#[test]
fn term_equals_is_per_term_only() {
    let filter = AggregateFilter::term_equals(TermValue::Str("nurse".into()));
    let mut state = EvalState::new();

    assert!(filter.allow(Term::Str("nurse"), &[], 1, &mut state).unwrap());
    assert!(!filter.allow(Term::Str("doctor"), &[], 1, &mut state).unwrap());
    assert!(matches!(
        filter.get_group_stats(&[], 1),
        Err(ExecutionError::BatchUnsupported("TermEquals"))
    ));

    let int_filter = AggregateFilter::term_equals(TermValue::Int(3));
    assert!(int_filter.allow(Term::Int(3), &[], 1, &mut state).unwrap());
    assert!(!int_filter.allow(Term::Str("3"), &[], 1, &mut state).unwrap());
}

#[test]
fn term_regex_matches_whole_term() {
    let filter = AggregateFilter::term_regex("ab.*").unwrap();
    let mut state = EvalState::new();

    assert!(filter.allow(Term::Str("abc"), &[], 1, &mut state).unwrap());
    assert!(!filter.allow(Term::Str("xabc"), &[], 1, &mut state).unwrap());

    let digits = AggregateFilter::term_regex("1\\d+").unwrap();
    assert!(digits.allow(Term::Int(123), &[], 1, &mut state).unwrap());
    assert!(!digits.allow(Term::Int(23), &[], 1, &mut state).unwrap());

    assert!(matches!(
        digits.get_group_stats(&[], 1),
        Err(ExecutionError::BatchUnsupported("TermRegex"))
    ));
}

#[test]
fn invalid_regex_is_reported() {
    let err = AggregateFilter::term_regex("(unclosed").unwrap_err();
    assert!(matches!(err, ExecutionError::InvalidRegex { ref pattern, .. } if pattern == "(unclosed"));
}

#[test]
fn is_default_group_reads_registered_key_set() {
    let keys = MetricRangeGroupKeySet::create(
        GroupKeySet::initial(),
        MetricBuckets {
            min: 0,
            interval: 10,
            num_buckets: 3,
            exclude_gutters: true,
            with_default_bucket: true,
            from_predicate: false,
        },
    );
    let mut filter = AggregateFilter::is_default_group();
    filter.register(&HashMap::new(), &keys);

    assert_eq!(
        filter.get_group_stats(&[], 3).unwrap(),
        vec![false, false, false, true]
    );
    let mut state = EvalState::new();
    assert!(filter.allow(Term::Int(0), &[], 3, &mut state).unwrap());
    assert!(filter.need_group());
}
