use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::engine::errors::{ExecResult, ExecutionError};
use crate::engine::remote::{GroupMove, Query, QueryRemapRule};
use crate::engine::session::Session;

/// Moves documents between already allocated groups. Actions never touch
/// the session's `GroupKeySet`; the command that issues them does.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action")]
pub enum Action {
    #[serde(rename = "unconditionalAction")]
    Unconditional(UnconditionalAction),
    #[serde(rename = "intOrAction")]
    IntOr(IntOrAction),
    #[serde(rename = "stringOrAction")]
    StringOr(StringOrAction),
    #[serde(rename = "regexAction")]
    Regex(RegexAction),
    #[serde(rename = "sampleAction")]
    Sample(SampleAction),
    #[serde(rename = "queryAction")]
    Query(QueryAction),
    #[serde(rename = "metricAction")]
    Metric(MetricAction),
}

impl Action {
    /// Decodes the `{"action": "...", ...}` JSON form.
    pub fn from_json(json: &serde_json::Value) -> ExecResult<Self> {
        Action::deserialize(json)
            .map_err(|e| ExecutionError::InvalidArgument(format!("invalid action: {}", e)))
    }

    pub fn scope(&self) -> &BTreeSet<String> {
        match self {
            Action::Unconditional(a) => &a.scope,
            Action::IntOr(a) => &a.scope,
            Action::StringOr(a) => &a.scope,
            Action::Regex(a) => &a.scope,
            Action::Sample(a) => &a.scope,
            Action::Query(a) => &a.scope,
            Action::Metric(a) => &a.scope,
        }
    }

    pub fn apply(&self, session: &mut Session) -> ExecResult<()> {
        debug!(target: "group_ql::actions", action = %self, "Applying action");
        match self {
            Action::Unconditional(a) => a.apply(session),
            Action::IntOr(a) => a.apply(session),
            Action::StringOr(a) => a.apply(session),
            Action::Regex(a) => a.apply(session),
            Action::Sample(a) => a.apply(session),
            Action::Query(a) => a.apply(session),
            Action::Metric(a) => a.apply(session),
        }
    }
}

fn single(dataset: &str) -> BTreeSet<String> {
    BTreeSet::from([dataset.to_string()])
}

/// Every document of `target` goes to `new_group`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnconditionalAction {
    pub scope: BTreeSet<String>,
    pub target: usize,
    pub new_group: usize,
}

impl UnconditionalAction {
    pub fn new(scope: BTreeSet<String>, target: usize, new_group: usize) -> Self {
        Self {
            scope,
            target,
            new_group,
        }
    }

    fn apply(&self, session: &mut Session) -> ExecResult<()> {
        let rule = QueryRemapRule {
            target: self.target,
            query: Query::match_all(),
            negative: self.new_group,
            positive: self.new_group,
        };
        session.regroup(&rule, &self.scope)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntOrAction {
    pub scope: BTreeSet<String>,
    pub field: String,
    pub terms: BTreeSet<i64>,
    pub target: usize,
    pub positive: usize,
    pub negative: usize,
}

impl IntOrAction {
    fn groups(&self) -> GroupMove {
        GroupMove::new(self.target, self.negative, self.positive)
    }

    fn apply(&self, session: &mut Session) -> ExecResult<()> {
        let terms: Vec<i64> = self.terms.iter().copied().collect();
        for name in &self.scope {
            if session.dataset(name)?.is_int_field(&self.field) {
                session.int_or_regroup(&self.field, &terms, self.groups(), &single(name))?;
            } else {
                // Field is stored as strings on this dataset.
                let mut stringified: Vec<String> = terms.iter().map(|t| t.to_string()).collect();
                stringified.sort();
                session.string_or_regroup(&self.field, &stringified, self.groups(), &single(name))?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StringOrAction {
    pub scope: BTreeSet<String>,
    pub field: String,
    pub terms: BTreeSet<String>,
    pub target: usize,
    pub positive: usize,
    pub negative: usize,
}

impl StringOrAction {
    fn apply(&self, session: &mut Session) -> ExecResult<()> {
        let terms: Vec<String> = self.terms.iter().cloned().collect();
        session.string_or_regroup(
            &self.field,
            &terms,
            GroupMove::new(self.target, self.negative, self.positive),
            &self.scope,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegexAction {
    pub scope: BTreeSet<String>,
    pub field: String,
    pub regex: String,
    pub target: usize,
    pub positive: usize,
    pub negative: usize,
}

impl RegexAction {
    fn apply(&self, session: &mut Session) -> ExecResult<()> {
        regex::Regex::new(&self.regex).map_err(|source| ExecutionError::InvalidRegex {
            pattern: self.regex.clone(),
            source,
        })?;
        session.regex_regroup(
            &self.field,
            &self.regex,
            GroupMove::new(self.target, self.negative, self.positive),
            &self.scope,
        )
    }
}

/// Deterministic sample of `field`'s terms, salted by `seed`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleAction {
    pub scope: BTreeSet<String>,
    pub field: String,
    pub probability: f64,
    pub seed: String,
    pub target: usize,
    pub positive: usize,
    pub negative: usize,
}

impl SampleAction {
    fn apply(&self, session: &mut Session) -> ExecResult<()> {
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(ExecutionError::InvalidArgument(format!(
                "sample probability must be within [0, 1], got {}",
                self.probability
            )));
        }
        session.random_regroup(
            &self.field,
            &self.seed,
            self.probability,
            GroupMove::new(self.target, self.negative, self.positive),
            &self.scope,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryAction {
    pub scope: BTreeSet<String>,
    pub per_dataset_query: BTreeMap<String, Query>,
    pub target: usize,
    pub positive: usize,
    pub negative: usize,
}

impl QueryAction {
    fn apply(&self, session: &mut Session) -> ExecResult<()> {
        for name in &self.scope {
            let Some(query) = self.per_dataset_query.get(name) else {
                warn!(target: "group_ql::actions", dataset = %name, "No query for dataset, skipping");
                continue;
            };
            let rule = QueryRemapRule {
                target: self.target,
                query: query.clone(),
                negative: self.negative,
                positive: self.positive,
            };
            session.regroup(&rule, &single(name))?;
        }
        Ok(())
    }
}

/// Keeps documents whose per-dataset 0/1 stat is 1. Only valid while the
/// session has a single group.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricAction {
    pub scope: BTreeSet<String>,
    pub per_dataset_filter: BTreeMap<String, Vec<String>>,
    pub target: usize,
    pub positive: usize,
    pub negative: usize,
}

impl MetricAction {
    fn apply(&self, session: &mut Session) -> ExecResult<()> {
        if session.num_groups != 1 || self.target != 1 || self.positive != 1 || self.negative != 0
        {
            return Err(ExecutionError::UnsupportedMetricFilterShape {
                num_groups: session.num_groups,
                target: self.target,
                positive: self.positive,
                negative: self.negative,
            });
        }
        for (name, dataset) in session.scoped_mut(&self.scope)? {
            let Some(pushes) = self.per_dataset_filter.get(name) else {
                continue;
            };
            dataset.with_single_stat(pushes, |remote| remote.metric_filter(0, 1, 1, false))?;
            debug!(target: "group_ql::actions", dataset = %name, "Applied metric filter");
        }
        Ok(())
    }
}

/// Lists up to ten terms, otherwise only their count.
fn render_terms<T: fmt::Debug>(terms: &BTreeSet<T>) -> String {
    if terms.len() <= 10 {
        format!("{:?}", terms)
    } else {
        format!("({} terms)", terms.len())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Unconditional(a) => write!(
                f,
                "UnconditionalAction{{scope={:?}, target={}, newGroup={}}}",
                a.scope, a.target, a.new_group
            ),
            Action::IntOr(a) => write!(
                f,
                "IntOrAction{{scope={:?}, field={}, terms={}, target={}, positive={}, negative={}}}",
                a.scope,
                a.field,
                render_terms(&a.terms),
                a.target,
                a.positive,
                a.negative
            ),
            Action::StringOr(a) => write!(
                f,
                "StringOrAction{{scope={:?}, field={}, terms={}, target={}, positive={}, negative={}}}",
                a.scope,
                a.field,
                render_terms(&a.terms),
                a.target,
                a.positive,
                a.negative
            ),
            Action::Regex(a) => write!(
                f,
                "RegexAction{{scope={:?}, field={}, regex={}, target={}, positive={}, negative={}}}",
                a.scope, a.field, a.regex, a.target, a.positive, a.negative
            ),
            Action::Sample(a) => write!(
                f,
                "SampleAction{{scope={:?}, field={}, probability={}, seed={}, target={}, positive={}, negative={}}}",
                a.scope, a.field, a.probability, a.seed, a.target, a.positive, a.negative
            ),
            Action::Query(a) => write!(
                f,
                "QueryAction{{scope={:?}, datasets={:?}, target={}, positive={}, negative={}}}",
                a.scope,
                a.per_dataset_query.keys().collect::<Vec<_>>(),
                a.target,
                a.positive,
                a.negative
            ),
            Action::Metric(a) => write!(
                f,
                "MetricAction{{scope={:?}, filters={:?}, target={}, positive={}, negative={}}}",
                a.scope, a.per_dataset_filter, a.target, a.positive, a.negative
            ),
        }
    }
}
