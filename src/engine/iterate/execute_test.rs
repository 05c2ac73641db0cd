use std::collections::{BTreeMap, BTreeSet};

use super::execute::{execute_multi, execute_single};
use super::handler::BoxedHandler;
use super::sum_across::SumAcross;
use crate::engine::errors::{ExecutionError, RemoteError};
use crate::engine::metrics::{AggregateMetric, QualifiedPush};
use crate::engine::session::Session;
use crate::logging::init_for_tests;
use crate::test_helpers::factory::Factory;
use crate::test_helpers::memory_remote::CallLog;

fn scope(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn clicks(dataset: &str) -> AggregateMetric {
    AggregateMetric::doc_stats(QualifiedPush::new(dataset, vec!["clicks"]))
}

fn jobs_and_ads() -> (Session, BTreeMap<String, CallLog>) {
    Factory::session()
        .with_dataset(
            "jobs",
            vec![
                Factory::document().with("country", "us").with("clicks", 3).create(),
                Factory::document().with("country", "ca").with("clicks", 4).create(),
            ],
        )
        .with_dataset(
            "ads",
            vec![Factory::document().with("country", "us").with("clicks", 10).create()],
        )
        .create_with_logs()
}

#[test]
fn empty_handler_list_is_rejected() {
    init_for_tests();
    let (mut session, _) = jobs_and_ads();
    let handlers: Vec<BoxedHandler<'_, Vec<f64>>> = Vec::new();

    assert!(matches!(
        execute_multi(&mut session, "country", handlers),
        Err(ExecutionError::NoIterateHandlers)
    ));
}

#[test]
fn differing_scopes_fail_before_any_remote_call() {
    init_for_tests();
    let (mut session, logs) = jobs_and_ads();
    let handlers: Vec<BoxedHandler<'_, Vec<f64>>> = vec![
        Box::new(SumAcross::new(scope(&["jobs"]), clicks("jobs"), None)),
        Box::new(SumAcross::new(scope(&["jobs", "ads"]), clicks("ads"), None)),
    ];

    let err = execute_multi(&mut session, "country", handlers).unwrap_err();

    assert!(matches!(err, ExecutionError::ScopeMismatch { .. }));
    assert!(logs.values().all(|log| log.is_empty()));
}

#[test]
fn one_pass_serves_every_handler_and_pushes_shared_stats_once() {
    init_for_tests();
    let (mut session, logs) = jobs_and_ads();
    let everywhere = scope(&["ads", "jobs"]);
    let handlers: Vec<BoxedHandler<'_, Vec<f64>>> = vec![
        Box::new(SumAcross::new(everywhere.clone(), clicks("jobs"), None)),
        Box::new(SumAcross::new(
            everywhere,
            AggregateMetric::add(clicks("jobs"), clicks("ads")),
            None,
        )),
    ];

    let outputs = execute_multi(&mut session, "country", handlers).unwrap();

    assert_eq!(outputs, vec![vec![0.0, 7.0], vec![0.0, 17.0]]);
    assert_eq!(logs["jobs"].count("push_stats"), 1);
    assert_eq!(logs["jobs"].count("ftgs"), 1);
    assert_eq!(logs["ads"].count("ftgs"), 1);
    assert_eq!(session.dataset("jobs").unwrap().remote.num_stats(), 0);
    assert_eq!(session.dataset("ads").unwrap().remote.num_stats(), 0);
}

#[test]
fn stats_are_popped_when_iteration_fails() {
    init_for_tests();
    let (mut session, logs) = Factory::session()
        .with_dataset("jobs", vec![Factory::document().create()])
        .failing("jobs", "ftgs", RemoteError::OutOfMemory("ftgs".into()))
        .create_with_logs();

    let err = execute_single(
        &mut session,
        "country",
        SumAcross::new(scope(&["jobs"]), clicks("jobs"), None),
    )
    .unwrap_err();

    assert!(err.is_remote_resource());
    assert_eq!(logs["jobs"].count("pop_stat"), 1);
    assert_eq!(session.dataset("jobs").unwrap().remote.num_stats(), 0);
}

#[test]
fn ambiguous_field_fails_after_pushing_and_still_pops() {
    init_for_tests();
    let (mut session, logs) = jobs_and_ads();

    let err = execute_single(
        &mut session,
        "nowhere",
        SumAcross::new(scope(&["jobs"]), clicks("jobs"), None),
    )
    .unwrap_err();

    assert!(matches!(err, ExecutionError::FieldTypeAmbiguous(_)));
    assert_eq!(logs["jobs"].count("pop_stat"), 1);
}

#[test]
fn order_dependent_metric_forces_sorted_iteration() {
    init_for_tests();
    let (mut session, logs) = Factory::session()
        .with_dataset("jobs", vec![Factory::document().create()])
        .create_with_logs();

    execute_single(
        &mut session,
        "country",
        SumAcross::new(
            scope(&["jobs"]),
            AggregateMetric::iterate_lag(1, clicks("jobs")),
            None,
        ),
    )
    .unwrap();

    assert!(logs["jobs"].calls().iter().any(|c| c == "ftgs country Str true"));
}

#[test]
fn unsorted_iteration_for_single_dataset_without_order_needs() {
    init_for_tests();
    let (mut session, logs) = Factory::session()
        .with_dataset("jobs", vec![Factory::document().create()])
        .create_with_logs();

    execute_single(
        &mut session,
        "clicks",
        SumAcross::new(scope(&["jobs"]), clicks("jobs"), None),
    )
    .unwrap();

    assert!(logs["jobs"].calls().iter().any(|c| c == "ftgs clicks Int false"));
}
