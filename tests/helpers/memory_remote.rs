use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;

use ahash::RandomState;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;

use crate::engine::errors::RemoteError;
use crate::engine::remote::{
    BooleanOp, FtgsRow, FtgsStream, GroupMove, GroupMultiRemapRule, Query, QueryRemapRule,
    RegroupTerm, RemoteSession,
};
use crate::engine::types::{FieldKind, TermValue};

/// A document with multi-valued int and string fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryDocument {
    pub int_fields: HashMap<String, Vec<i64>>,
    pub string_fields: HashMap<String, Vec<String>>,
}

impl MemoryDocument {
    fn int_values(&self, field: &str) -> &[i64] {
        self.int_fields.get(field).map(|v| v.as_slice()).unwrap_or(&[])
    }

    fn string_values(&self, field: &str) -> &[String] {
        self.string_fields
            .get(field)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    fn has_term(&self, term: &RegroupTerm) -> bool {
        match &term.value {
            TermValue::Int(v) => self.int_values(&term.field).contains(v),
            TermValue::Str(s) => self.string_values(&term.field).contains(s),
        }
    }

    fn first_term_text(&self, field: &str) -> Option<String> {
        self.int_values(field)
            .first()
            .map(|v| v.to_string())
            .or_else(|| self.string_values(field).first().cloned())
    }
}

/// Shared record of every call a `MemoryRemoteSession` received.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn record(&self, call: impl Into<String>) {
        self.0.lock().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0.lock().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

/// In-memory stand-in for a remote dataset session.
///
/// Stat expressions are evaluated per document in reverse polish notation
/// over these tokens: `count()`, integer literals, int field names,
/// `field=value` (1 when the document holds the term) and `+ - * /`.
pub struct MemoryRemoteSession {
    docs: Vec<MemoryDocument>,
    groups: Vec<usize>,
    stats: Vec<Vec<i64>>,
    num_groups: usize,
    log: CallLog,
    failure: Option<(String, RemoteError)>,
}

impl MemoryRemoteSession {
    pub fn new(docs: Vec<MemoryDocument>) -> Self {
        let groups = vec![1; docs.len()];
        Self {
            docs,
            groups,
            stats: Vec::new(),
            num_groups: 1,
            log: CallLog::default(),
            failure: None,
        }
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    /// Fails the first call whose name starts with `call`.
    pub fn failing_on(mut self, call: &str, error: RemoteError) -> Self {
        self.failure = Some((call.to_string(), error));
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    pub fn groups(&self) -> &[usize] {
        &self.groups
    }

    fn call(&mut self, name: &str, detail: String) -> Result<(), RemoteError> {
        self.log.record(format!("{} {}", name, detail).trim_end().to_string());
        if let Some((call, _)) = &self.failure {
            if name.starts_with(call.as_str()) {
                if let Some((_, error)) = self.failure.take() {
                    return Err(error);
                }
            }
        }
        Ok(())
    }

    fn eval_stat(&self, doc: &MemoryDocument, tokens: &[String]) -> Result<i64, RemoteError> {
        let mut stack: Vec<i64> = Vec::new();
        for token in tokens {
            let value = match token.as_str() {
                "+" | "-" | "*" | "/" => {
                    let (Some(r), Some(l)) = (stack.pop(), stack.pop()) else {
                        return Err(RemoteError::Session(format!("stack underflow at {}", token)));
                    };
                    match token.as_str() {
                        "+" => l + r,
                        "-" => l - r,
                        "*" => l * r,
                        _ => {
                            if r == 0 {
                                0
                            } else {
                                l / r
                            }
                        }
                    }
                }
                "count()" => 1,
                other => {
                    if let Ok(literal) = other.parse::<i64>() {
                        literal
                    } else if let Some(field) = other.strip_prefix("hasintfield ") {
                        i64::from(!doc.int_values(field).is_empty())
                    } else if let Some((field, value)) = other.split_once('=') {
                        let term = match value.parse::<i64>() {
                            Ok(v) if doc.int_fields.contains_key(field) => RegroupTerm::int(field, v),
                            _ => RegroupTerm::string(field, value),
                        };
                        i64::from(doc.has_term(&term))
                    } else {
                        doc.int_values(other).first().copied().unwrap_or(0)
                    }
                }
            };
            stack.push(value);
        }
        match stack.as_slice() {
            [single] => Ok(*single),
            _ => Err(RemoteError::Session(format!(
                "stat {:?} left {} values",
                tokens,
                stack.len()
            ))),
        }
    }

    fn matches(&self, doc: &MemoryDocument, query: &Query) -> bool {
        match query {
            Query::Term(term) => doc.has_term(term),
            Query::Boolean { op, operands } => match op {
                BooleanOp::And => operands.iter().all(|q| self.matches(doc, q)),
                BooleanOp::Or => operands.iter().any(|q| self.matches(doc, q)),
                BooleanOp::Not => !operands.iter().any(|q| self.matches(doc, q)),
            },
            Query::Range {
                start,
                end,
                max_inclusive,
            } => match (&start.value, &end.value) {
                (TermValue::Int(lo), TermValue::Int(hi)) => doc
                    .int_values(&start.field)
                    .iter()
                    .any(|v| v >= lo && (v < hi || (*max_inclusive && v == hi))),
                (TermValue::Str(lo), TermValue::Str(hi)) => doc
                    .string_values(&start.field)
                    .iter()
                    .any(|v| v >= lo && (v < hi || (*max_inclusive && v == hi))),
                _ => false,
            },
        }
    }

    fn move_target(&mut self, groups: GroupMove, matched: impl Fn(&MemoryDocument) -> bool) {
        for (doc, group) in self.docs.iter().zip(self.groups.iter_mut()) {
            if *group == groups.target {
                *group = if matched(doc) {
                    groups.positive
                } else {
                    groups.negative
                };
            }
        }
        self.refresh_num_groups();
    }

    fn refresh_num_groups(&mut self) {
        self.num_groups = self.groups.iter().copied().max().unwrap_or(0).max(1);
    }

    fn salted_fraction(salt: &str, value: &str) -> f64 {
        let hasher_state = RandomState::with_seeds(1, 2, 3, 4);
        let mut hasher = hasher_state.build_hasher();
        salt.hash(&mut hasher);
        value.hash(&mut hasher);
        StdRng::seed_from_u64(hasher.finish()).r#gen::<f64>()
    }
}

impl RemoteSession for MemoryRemoteSession {
    fn push_stats(&mut self, stats: &[String]) -> Result<usize, RemoteError> {
        self.call("push_stats", stats.join(" "))?;
        let values = self
            .docs
            .iter()
            .map(|doc| self.eval_stat(doc, stats))
            .collect::<Result<Vec<i64>, RemoteError>>()?;
        self.stats.push(values);
        Ok(self.stats.len())
    }

    fn pop_stat(&mut self) -> Result<usize, RemoteError> {
        self.call("pop_stat", String::new())?;
        if self.stats.pop().is_none() {
            return Err(RemoteError::Session("no stat to pop".into()));
        }
        Ok(self.stats.len())
    }

    fn num_stats(&self) -> usize {
        self.stats.len()
    }

    fn num_groups(&self) -> usize {
        self.num_groups
    }

    fn get_group_stats(&mut self, stat: usize) -> Result<Vec<i64>, RemoteError> {
        self.call("get_group_stats", stat.to_string())?;
        let column = self
            .stats
            .get(stat)
            .ok_or_else(|| RemoteError::Session(format!("no stat {}", stat)))?;
        let mut sums = vec![0i64; self.num_groups + 1];
        for (value, group) in column.iter().zip(self.groups.iter()) {
            if *group > 0 && *group < sums.len() {
                sums[*group] += value;
            }
        }
        Ok(sums)
    }

    fn regroup(&mut self, rule: &QueryRemapRule) -> Result<usize, RemoteError> {
        self.call("regroup", format!("{}", rule.target))?;
        let matched: Vec<bool> = self
            .docs
            .iter()
            .map(|doc| self.matches(doc, &rule.query))
            .collect();
        for (hit, group) in matched.into_iter().zip(self.groups.iter_mut()) {
            if *group == rule.target {
                *group = if hit { rule.positive } else { rule.negative };
            }
        }
        self.refresh_num_groups();
        Ok(self.num_groups)
    }

    fn regroup_multi(&mut self, rules: &[GroupMultiRemapRule]) -> Result<usize, RemoteError> {
        self.call("regroup_multi", rules.len().to_string())?;
        let by_target: HashMap<usize, &GroupMultiRemapRule> =
            rules.iter().map(|r| (r.target, r)).collect();
        for (doc, group) in self.docs.iter().zip(self.groups.iter_mut()) {
            *group = match by_target.get(&*group) {
                None => 0,
                Some(rule) => rule
                    .conditions
                    .iter()
                    .position(|term| doc.has_term(term))
                    .map(|i| rule.positives[i])
                    .unwrap_or(rule.negative),
            };
        }
        self.refresh_num_groups();
        Ok(self.num_groups)
    }

    fn int_or_regroup(
        &mut self,
        field: &str,
        terms: &[i64],
        groups: GroupMove,
    ) -> Result<(), RemoteError> {
        self.call("int_or_regroup", format!("{} {:?}", field, terms))?;
        if !terms.windows(2).all(|w| w[0] <= w[1]) {
            return Err(RemoteError::Session("terms must be sorted".into()));
        }
        self.move_target(groups, |doc| {
            doc.int_values(field).iter().any(|v| terms.binary_search(v).is_ok())
        });
        Ok(())
    }

    fn string_or_regroup(
        &mut self,
        field: &str,
        terms: &[String],
        groups: GroupMove,
    ) -> Result<(), RemoteError> {
        self.call("string_or_regroup", format!("{} {:?}", field, terms))?;
        if !terms.windows(2).all(|w| w[0] <= w[1]) {
            return Err(RemoteError::Session("terms must be sorted".into()));
        }
        self.move_target(groups, |doc| {
            doc.string_values(field)
                .iter()
                .any(|v| terms.binary_search(v).is_ok())
        });
        Ok(())
    }

    fn regex_regroup(
        &mut self,
        field: &str,
        regex: &str,
        groups: GroupMove,
    ) -> Result<(), RemoteError> {
        self.call("regex_regroup", format!("{} {}", field, regex))?;
        let regex = Regex::new(&format!("^(?:{})$", regex))
            .map_err(|e| RemoteError::Session(e.to_string()))?;
        self.move_target(groups, |doc| {
            doc.string_values(field).iter().any(|v| regex.is_match(v))
        });
        Ok(())
    }

    fn random_regroup(
        &mut self,
        field: &str,
        is_int_field: bool,
        salt: &str,
        probability: f64,
        groups: GroupMove,
    ) -> Result<(), RemoteError> {
        self.call(
            "random_regroup",
            format!("{} {} {} {}", field, is_int_field, salt, probability),
        )?;
        self.move_target(groups, |doc| {
            doc.first_term_text(field)
                .is_some_and(|term| Self::salted_fraction(salt, &term) < probability)
        });
        Ok(())
    }

    fn metric_filter(
        &mut self,
        stat: usize,
        min: i64,
        max: i64,
        negate: bool,
    ) -> Result<usize, RemoteError> {
        self.call("metric_filter", format!("{} {} {} {}", stat, min, max, negate))?;
        let column = self
            .stats
            .get(stat)
            .ok_or_else(|| RemoteError::Session(format!("no stat {}", stat)))?;
        for (value, group) in column.iter().zip(self.groups.iter_mut()) {
            let inside = *value >= min && *value <= max;
            if *group > 0 && inside == negate {
                *group = 0;
            }
        }
        Ok(self.num_groups)
    }

    fn metric_regroup(
        &mut self,
        stat: usize,
        min: i64,
        max: i64,
        interval: i64,
        no_gutters: bool,
    ) -> Result<usize, RemoteError> {
        self.call(
            "metric_regroup",
            format!("{} {} {} {} {}", stat, min, max, interval, no_gutters),
        )?;
        if interval <= 0 || max <= min {
            return Err(RemoteError::Session("invalid bucket range".into()));
        }
        let column = self
            .stats
            .get(stat)
            .ok_or_else(|| RemoteError::Session(format!("no stat {}", stat)))?;
        let buckets = ((max - min) + interval - 1) / interval;
        let per_group = buckets as usize + if no_gutters { 0 } else { 2 };
        for (value, group) in column.iter().zip(self.groups.iter_mut()) {
            if *group == 0 {
                continue;
            }
            let inner = if *value >= min && *value < max {
                Some(((*value - min) / interval) as usize)
            } else if no_gutters {
                None
            } else if *value < min {
                Some(per_group - 2)
            } else {
                Some(per_group - 1)
            };
            *group = match inner {
                Some(inner) => (*group - 1) * per_group + inner + 1,
                None => 0,
            };
        }
        self.num_groups *= per_group;
        Ok(self.num_groups)
    }

    fn random_metric_multi_regroup(
        &mut self,
        stat: usize,
        salt: &str,
        target: usize,
        percentages: &[f64],
        result_groups: &[usize],
    ) -> Result<(), RemoteError> {
        self.call(
            "random_metric_multi_regroup",
            format!("{} {} {} {:?} {:?}", stat, salt, target, percentages, result_groups),
        )?;
        if result_groups.len() != percentages.len() + 1 {
            return Err(RemoteError::Session("need one more group than boundary".into()));
        }
        let column = self
            .stats
            .get(stat)
            .ok_or_else(|| RemoteError::Session(format!("no stat {}", stat)))?;
        for (value, group) in column.iter().zip(self.groups.iter_mut()) {
            if *group == target {
                let fraction = Self::salted_fraction(salt, &value.to_string());
                let bucket = percentages
                    .iter()
                    .position(|p| fraction < *p)
                    .unwrap_or(percentages.len());
                *group = result_groups[bucket];
            }
        }
        self.refresh_num_groups();
        Ok(())
    }

    fn ftgs(
        &mut self,
        field: &str,
        kind: FieldKind,
        sorted: bool,
    ) -> Result<FtgsStream<'_>, RemoteError> {
        self.call("ftgs", format!("{} {:?} {}", field, kind, sorted))?;
        let mut rows: BTreeMap<(TermValue, usize), Vec<i64>> = BTreeMap::new();
        for (i, doc) in self.docs.iter().enumerate() {
            let group = self.groups[i];
            if group == 0 {
                continue;
            }
            let terms: Vec<TermValue> = match kind {
                FieldKind::Int => doc.int_values(field).iter().map(|v| TermValue::Int(*v)).collect(),
                FieldKind::Str => doc
                    .string_values(field)
                    .iter()
                    .map(|v| TermValue::Str(v.clone()))
                    .collect(),
            };
            for term in terms {
                let sums = rows
                    .entry((term, group))
                    .or_insert_with(|| vec![0; self.stats.len()]);
                for (sum, column) in sums.iter_mut().zip(self.stats.iter()) {
                    *sum += column[i];
                }
            }
        }
        let rows: Vec<FtgsRow> = rows
            .into_iter()
            .map(|((term, group), stats)| FtgsRow { term, group, stats })
            .collect();
        Ok(Box::new(rows.into_iter().map(Ok)))
    }
}
