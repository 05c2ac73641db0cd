use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::filter::AggregateFilter;
use super::push::{PushIndexes, Pushable, QualifiedPush};
use super::state::{EvalState, NodeId};
use crate::engine::errors::{ExecResult, ExecutionError};
use crate::engine::groupkeys::GroupKeySet;
use crate::engine::types::Term;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Abs,
    Signum,
    /// Natural logarithm.
    Log,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    /// Truncated remainder, sign follows the dividend.
    Modulus,
    Power,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOp {
    Min,
    Max,
}

impl UnaryOp {
    fn eval(self, v: f64) -> f64 {
        match self {
            UnaryOp::Abs => v.abs(),
            UnaryOp::Signum => {
                if v == 0.0 || v.is_nan() {
                    v
                } else {
                    v.signum()
                }
            }
            UnaryOp::Log => v.ln(),
            UnaryOp::Negate => -v,
        }
    }
}

impl BinaryOp {
    fn eval(self, l: f64, r: f64) -> f64 {
        match self {
            BinaryOp::Add => l + r,
            BinaryOp::Subtract => l - r,
            BinaryOp::Multiply => l * r,
            BinaryOp::Divide => l / r,
            BinaryOp::Modulus => l % r,
            BinaryOp::Power => l.powf(r),
        }
    }
}

impl FoldOp {
    fn eval(self, acc: f64, v: f64) -> f64 {
        match self {
            FoldOp::Min => acc.min(v),
            FoldOp::Max => acc.max(v),
        }
    }
}

/// Leaf reading one pushed stat column.
#[derive(Debug)]
pub struct DocStats {
    pub push: QualifiedPush,
    index: Option<usize>,
}

impl DocStats {
    fn index(&self) -> ExecResult<usize> {
        self.index
            .ok_or_else(|| ExecutionError::UnregisteredPush(self.push.clone()))
    }
}

#[derive(Debug)]
pub struct IfThenElse {
    pub condition: AggregateFilter,
    pub true_case: AggregateMetric,
    pub false_case: AggregateMetric,
}

/// Value the same group produced `delay` terms earlier in the pass.
#[derive(Debug)]
pub struct IterateLag {
    id: NodeId,
    pub delay: usize,
    pub metric: Box<AggregateMetric>,
}

/// Value of the sibling group `delay` positions earlier under the same parent.
#[derive(Debug)]
pub struct ParentLag {
    id: NodeId,
    pub delay: usize,
    pub metric: Box<AggregateMetric>,
    keys: Option<Arc<GroupKeySet>>,
}

/// Sum over the last `size` sibling groups, current group included.
#[derive(Debug)]
pub struct Window {
    id: NodeId,
    pub size: usize,
    pub metric: Box<AggregateMetric>,
    keys: Option<Arc<GroupKeySet>>,
}

/// Cumulative sum over the sibling groups of the current one. With offset
/// 1 the current group is included; each further step reads the total as of
/// one sibling earlier.
#[derive(Debug)]
pub struct Running {
    id: NodeId,
    pub offset: usize,
    pub metric: Box<AggregateMetric>,
    keys: Option<Arc<GroupKeySet>>,
}

/// Total of the metric over every sibling group, reported on each of them.
#[derive(Debug)]
pub struct SumChildren {
    pub metric: Box<AggregateMetric>,
    keys: Option<Arc<GroupKeySet>>,
}

/// Numeric expression evaluated per group, either over the full stats
/// arrays at once or for one (term, group) pair during iteration.
#[derive(Debug)]
pub enum AggregateMetric {
    Constant(f64),
    DocStats(DocStats),
    Unary(UnaryOp, Box<AggregateMetric>),
    Binary(BinaryOp, Box<AggregateMetric>, Box<AggregateMetric>),
    Multiple(FoldOp, Vec<AggregateMetric>),
    IfThenElse(Box<IfThenElse>),
    IterateLag(IterateLag),
    ParentLag(ParentLag),
    Window(Window),
    Running(Running),
    SumChildren(SumChildren),
    /// Values indexed by group, usable per term.
    PerGroupConstant(Vec<f64>),
    /// Values indexed by group, only usable over all groups at once.
    MultiPerGroupConstant(Vec<f64>),
}

impl AggregateMetric {
    pub fn constant(value: f64) -> Self {
        AggregateMetric::Constant(value)
    }

    pub fn doc_stats(push: QualifiedPush) -> Self {
        AggregateMetric::DocStats(DocStats { push, index: None })
    }

    pub fn unary(op: UnaryOp, operand: AggregateMetric) -> Self {
        AggregateMetric::Unary(op, Box::new(operand))
    }

    pub fn binary(op: BinaryOp, left: AggregateMetric, right: AggregateMetric) -> Self {
        AggregateMetric::Binary(op, Box::new(left), Box::new(right))
    }

    pub fn add(left: AggregateMetric, right: AggregateMetric) -> Self {
        Self::binary(BinaryOp::Add, left, right)
    }

    pub fn subtract(left: AggregateMetric, right: AggregateMetric) -> Self {
        Self::binary(BinaryOp::Subtract, left, right)
    }

    pub fn multiply(left: AggregateMetric, right: AggregateMetric) -> Self {
        Self::binary(BinaryOp::Multiply, left, right)
    }

    pub fn divide(left: AggregateMetric, right: AggregateMetric) -> Self {
        Self::binary(BinaryOp::Divide, left, right)
    }

    pub fn modulus(left: AggregateMetric, right: AggregateMetric) -> Self {
        Self::binary(BinaryOp::Modulus, left, right)
    }

    pub fn power(left: AggregateMetric, right: AggregateMetric) -> Self {
        Self::binary(BinaryOp::Power, left, right)
    }

    pub fn log(operand: AggregateMetric) -> Self {
        Self::unary(UnaryOp::Log, operand)
    }

    pub fn abs(operand: AggregateMetric) -> Self {
        Self::unary(UnaryOp::Abs, operand)
    }

    pub fn min(metrics: Vec<AggregateMetric>) -> ExecResult<Self> {
        Self::multiple(FoldOp::Min, metrics)
    }

    pub fn max(metrics: Vec<AggregateMetric>) -> ExecResult<Self> {
        Self::multiple(FoldOp::Max, metrics)
    }

    fn multiple(op: FoldOp, metrics: Vec<AggregateMetric>) -> ExecResult<Self> {
        if metrics.len() < 2 {
            return Err(ExecutionError::InvalidArgument(format!(
                "{:?} needs at least 2 arguments, got {}",
                op,
                metrics.len()
            )));
        }
        Ok(AggregateMetric::Multiple(op, metrics))
    }

    pub fn if_then_else(
        condition: AggregateFilter,
        true_case: AggregateMetric,
        false_case: AggregateMetric,
    ) -> Self {
        AggregateMetric::IfThenElse(Box::new(IfThenElse {
            condition,
            true_case,
            false_case,
        }))
    }

    pub fn iterate_lag(delay: usize, metric: AggregateMetric) -> Self {
        AggregateMetric::IterateLag(IterateLag {
            id: NodeId::next(),
            delay,
            metric: Box::new(metric),
        })
    }

    pub fn parent_lag(delay: usize, metric: AggregateMetric) -> Self {
        AggregateMetric::ParentLag(ParentLag {
            id: NodeId::next(),
            delay,
            metric: Box::new(metric),
            keys: None,
        })
    }

    pub fn window(size: usize, metric: AggregateMetric) -> Self {
        AggregateMetric::Window(Window {
            id: NodeId::next(),
            size,
            metric: Box::new(metric),
            keys: None,
        })
    }

    pub fn running(offset: usize, metric: AggregateMetric) -> ExecResult<Self> {
        if offset == 0 {
            return Err(ExecutionError::InvalidArgument(
                "running needs an offset of at least 1".into(),
            ));
        }
        Ok(AggregateMetric::Running(Running {
            id: NodeId::next(),
            offset,
            metric: Box::new(metric),
            keys: None,
        }))
    }

    pub fn sum_children(metric: AggregateMetric) -> Self {
        AggregateMetric::SumChildren(SumChildren {
            metric: Box::new(metric),
            keys: None,
        })
    }

    /// `values[g]` is the value of group `g`; index 0 is ignored.
    pub fn per_group_constant(values: Vec<f64>) -> Self {
        AggregateMetric::PerGroupConstant(values)
    }

    pub fn multi_per_group_constant(values: Vec<f64>) -> Self {
        AggregateMetric::MultiPerGroupConstant(values)
    }

    /// Evaluates every group at once. `stats[column][group]`; the result has
    /// `num_groups + 1` entries with index 0 left at zero.
    pub fn get_group_stats(&self, stats: &[Vec<i64>], num_groups: usize) -> ExecResult<Vec<f64>> {
        match self {
            AggregateMetric::Constant(v) => Ok(per_group(num_groups, |_| *v)),
            AggregateMetric::DocStats(leaf) => {
                let index = leaf.index()?;
                let column = stats.get(index).ok_or_else(|| {
                    ExecutionError::InvalidArgument(format!(
                        "stat column {} missing ({} columns fetched)",
                        index,
                        stats.len()
                    ))
                })?;
                Ok(per_group(num_groups, |g| {
                    column.get(g).copied().unwrap_or(0) as f64
                }))
            }
            AggregateMetric::Unary(op, operand) => {
                let values = operand.get_group_stats(stats, num_groups)?;
                Ok(per_group(num_groups, |g| op.eval(values[g])))
            }
            AggregateMetric::Binary(op, left, right) => {
                let l = left.get_group_stats(stats, num_groups)?;
                let r = right.get_group_stats(stats, num_groups)?;
                Ok(per_group(num_groups, |g| op.eval(l[g], r[g])))
            }
            AggregateMetric::Multiple(op, metrics) => {
                let mut acc: Option<Vec<f64>> = None;
                for metric in metrics {
                    let values = metric.get_group_stats(stats, num_groups)?;
                    acc = Some(match acc {
                        None => values,
                        Some(prev) => per_group(num_groups, |g| op.eval(prev[g], values[g])),
                    });
                }
                Ok(acc.unwrap_or_else(|| vec![0.0; num_groups + 1]))
            }
            AggregateMetric::IfThenElse(node) => {
                // both branches are evaluated for every group
                let condition = node.condition.get_group_stats(stats, num_groups)?;
                let t = node.true_case.get_group_stats(stats, num_groups)?;
                let f = node.false_case.get_group_stats(stats, num_groups)?;
                Ok(per_group(num_groups, |g| if condition[g] { t[g] } else { f[g] }))
            }
            AggregateMetric::IterateLag(_) => Err(ExecutionError::BatchUnsupported("IterateLag")),
            AggregateMetric::ParentLag(node) => {
                let keys = node.keys.as_ref().ok_or(ExecutionError::NotRegistered("ParentLag"))?;
                let inner = node.metric.get_group_stats(stats, num_groups)?;
                let mut previous = VecDeque::with_capacity(node.delay + 1);
                Ok(per_group(num_groups, |g| {
                    parent_lag_step(keys, node.delay, &mut previous, g, inner[g])
                }))
            }
            AggregateMetric::Window(node) => {
                let keys = node.keys.as_ref().ok_or(ExecutionError::NotRegistered("Window"))?;
                let inner = node.metric.get_group_stats(stats, num_groups)?;
                let mut result = vec![0.0; num_groups + 1];
                let mut sum = 0.0;
                let mut current_parent = None;
                let mut count = 0;
                for g in 1..=num_groups {
                    let parent = keys.parent_group(g);
                    if current_parent != Some(parent) {
                        current_parent = Some(parent);
                        sum = 0.0;
                        count = 0;
                    }
                    sum += inner[g];
                    count += 1;
                    if count > node.size {
                        sum -= inner[g - node.size];
                    }
                    result[g] = sum;
                }
                Ok(result)
            }
            AggregateMetric::Running(node) => {
                let keys = node.keys.as_ref().ok_or(ExecutionError::NotRegistered("Running"))?;
                let inner = node.metric.get_group_stats(stats, num_groups)?;
                let mut totals = vec![0.0; num_groups + 1];
                for g in 1..=num_groups {
                    let carried = if g > 1 && keys.parent_group(g - 1) == keys.parent_group(g) {
                        totals[g - 1]
                    } else {
                        0.0
                    };
                    totals[g] = carried + inner[g];
                }
                Ok(per_group(num_groups, |g| {
                    match g.checked_sub(node.offset - 1) {
                        Some(t) if t >= 1 && keys.parent_group(t) == keys.parent_group(g) => {
                            totals[t]
                        }
                        _ => 0.0,
                    }
                }))
            }
            AggregateMetric::SumChildren(node) => {
                let keys = node
                    .keys
                    .as_ref()
                    .ok_or(ExecutionError::NotRegistered("SumChildren"))?;
                let inner = node.metric.get_group_stats(stats, num_groups)?;
                let mut by_parent: HashMap<usize, f64> = HashMap::new();
                for g in 1..=num_groups {
                    *by_parent.entry(keys.parent_group(g)).or_insert(0.0) += inner[g];
                }
                Ok(per_group(num_groups, |g| {
                    by_parent.get(&keys.parent_group(g)).copied().unwrap_or(0.0)
                }))
            }
            AggregateMetric::PerGroupConstant(values)
            | AggregateMetric::MultiPerGroupConstant(values) => Ok(per_group(num_groups, |g| {
                values.get(g).copied().unwrap_or(0.0)
            })),
        }
    }

    /// Evaluates one (term, group) pair during a live iteration pass.
    pub fn apply(
        &self,
        term: Term<'_>,
        stats: &[i64],
        group: usize,
        state: &mut EvalState,
    ) -> ExecResult<f64> {
        match self {
            AggregateMetric::Constant(v) => Ok(*v),
            AggregateMetric::DocStats(leaf) => {
                let index = leaf.index()?;
                stats.get(index).map(|v| *v as f64).ok_or_else(|| {
                    ExecutionError::InvalidArgument(format!(
                        "stat column {} missing ({} columns in row)",
                        index,
                        stats.len()
                    ))
                })
            }
            AggregateMetric::Unary(op, operand) => {
                Ok(op.eval(operand.apply(term, stats, group, state)?))
            }
            AggregateMetric::Binary(op, left, right) => {
                let l = left.apply(term, stats, group, state)?;
                let r = right.apply(term, stats, group, state)?;
                Ok(op.eval(l, r))
            }
            AggregateMetric::Multiple(op, metrics) => {
                let mut acc: Option<f64> = None;
                for metric in metrics {
                    let v = metric.apply(term, stats, group, state)?;
                    acc = Some(acc.map_or(v, |prev| op.eval(prev, v)));
                }
                Ok(acc.unwrap_or(0.0))
            }
            AggregateMetric::IfThenElse(node) => {
                if node.condition.allow(term, stats, group, state)? {
                    node.true_case.apply(term, stats, group, state)
                } else {
                    node.false_case.apply(term, stats, group, state)
                }
            }
            AggregateMetric::IterateLag(node) => {
                let value = node.metric.apply(term, stats, group, state)?;
                let queue = state
                    .lag_queues
                    .entry((node.id, group))
                    .or_insert_with(|| VecDeque::with_capacity(node.delay + 1));
                queue.push_back(value);
                if queue.len() == node.delay + 1 {
                    Ok(queue.pop_front().unwrap_or(0.0))
                } else {
                    Ok(0.0)
                }
            }
            AggregateMetric::ParentLag(node) => {
                let keys = node.keys.as_ref().ok_or(ExecutionError::NotRegistered("ParentLag"))?;
                let value = node.metric.apply(term, stats, group, state)?;
                let previous = state.parent_lag.entry(node.id).or_default();
                Ok(parent_lag_step(keys, node.delay, previous, group, value))
            }
            AggregateMetric::Window(node) => {
                let keys = node.keys.as_ref().ok_or(ExecutionError::NotRegistered("Window"))?;
                let value = node.metric.apply(term, stats, group, state)?;
                let window = state.windows.entry(node.id).or_default();
                if window.term.as_ref().is_some_and(|t| !t.matches(term)) {
                    let last = window.last_group;
                    let overlaps = (last + 1..=last + node.size)
                        .any(|g| window.sums.get(&g).is_some_and(|s| *s != 0.0));
                    if overlaps {
                        return Err(ExecutionError::WindowOverlapsMissingData);
                    }
                    window.sums.clear();
                }
                window.term = Some(term.to_owned_value());
                let parent = keys.parent_group(group);
                let num_groups = keys.num_groups();
                for offset in 0..node.size {
                    let target = group + offset;
                    if target <= num_groups && keys.parent_group(target) == parent {
                        *window.sums.entry(target).or_insert(0.0) += value;
                    }
                }
                window.last_group = group;
                Ok(window.sums.get(&group).copied().unwrap_or(0.0))
            }
            AggregateMetric::Running(node) => {
                let keys = node.keys.as_ref().ok_or(ExecutionError::NotRegistered("Running"))?;
                let value = node.metric.apply(term, stats, group, state)?;
                let parent = keys.parent_group(group);
                let running = state.running.entry(node.id).or_default();
                if running.parent != parent || running.term.as_ref().is_none_or(|t| !t.matches(term))
                {
                    running.term = Some(term.to_owned_value());
                    running.parent = parent;
                    running.totals.clear();
                }
                let total = running.totals.last().map_or(0.0, |(_, t)| *t) + value;
                running.totals.push((group, total));
                let Some(target) = group.checked_sub(node.offset - 1) else {
                    return Ok(0.0);
                };
                // Siblings the term skipped contributed nothing, so the total
                // at `target` is the last one recorded at or before it.
                Ok(running
                    .totals
                    .iter()
                    .rev()
                    .find(|(g, _)| *g <= target)
                    .map_or(0.0, |(_, t)| *t))
            }
            AggregateMetric::SumChildren(_) => Err(ExecutionError::PerTermUnsupported("SumChildren")),
            AggregateMetric::PerGroupConstant(values) => Ok(values.get(group).copied().unwrap_or(0.0)),
            AggregateMetric::MultiPerGroupConstant(_) => {
                Err(ExecutionError::PerTermUnsupported("MultiPerGroupConstant"))
            }
        }
    }

    /// True when per-term results depend on visiting terms in ascending order.
    pub fn need_sorted(&self) -> bool {
        match self {
            AggregateMetric::IterateLag(_)
            | AggregateMetric::Window(_)
            | AggregateMetric::Running(_) => true,
            _ => self.children_any(|m| m.need_sorted(), |f| f.need_sorted()),
        }
    }

    pub fn need_group(&self) -> bool {
        match self {
            AggregateMetric::IterateLag(_)
            | AggregateMetric::ParentLag(_)
            | AggregateMetric::Window(_)
            | AggregateMetric::Running(_)
            | AggregateMetric::SumChildren(_)
            | AggregateMetric::PerGroupConstant(_)
            | AggregateMetric::MultiPerGroupConstant(_) => true,
            _ => self.children_any(|m| m.need_group(), |f| f.need_group()),
        }
    }

    pub fn need_stats(&self) -> bool {
        match self {
            AggregateMetric::DocStats(_) => true,
            _ => self.children_any(|m| m.need_stats(), |f| f.need_stats()),
        }
    }

    fn children_any(
        &self,
        metric: impl Fn(&AggregateMetric) -> bool,
        filter: impl Fn(&AggregateFilter) -> bool,
    ) -> bool {
        match self {
            AggregateMetric::Constant(_)
            | AggregateMetric::DocStats(_)
            | AggregateMetric::PerGroupConstant(_)
            | AggregateMetric::MultiPerGroupConstant(_) => false,
            AggregateMetric::Unary(_, operand) => metric(operand),
            AggregateMetric::Binary(_, l, r) => metric(l) || metric(r),
            AggregateMetric::Multiple(_, metrics) => metrics.iter().any(|m| metric(m)),
            AggregateMetric::IfThenElse(node) => {
                filter(&node.condition) || metric(&node.true_case) || metric(&node.false_case)
            }
            AggregateMetric::IterateLag(node) => metric(&node.metric),
            AggregateMetric::ParentLag(node) => metric(&node.metric),
            AggregateMetric::Window(node) => metric(&node.metric),
            AggregateMetric::Running(node) => metric(&node.metric),
            AggregateMetric::SumChildren(node) => metric(&node.metric),
        }
    }
}

impl Pushable for AggregateMetric {
    fn requires(&self) -> HashSet<QualifiedPush> {
        match self {
            AggregateMetric::Constant(_)
            | AggregateMetric::PerGroupConstant(_)
            | AggregateMetric::MultiPerGroupConstant(_) => HashSet::new(),
            AggregateMetric::DocStats(leaf) => HashSet::from([leaf.push.clone()]),
            AggregateMetric::Unary(_, operand) => operand.requires(),
            AggregateMetric::Binary(_, l, r) => {
                let mut pushes = l.requires();
                pushes.extend(r.requires());
                pushes
            }
            AggregateMetric::Multiple(_, metrics) => {
                metrics.iter().flat_map(|m| m.requires()).collect()
            }
            AggregateMetric::IfThenElse(node) => {
                let mut pushes = node.condition.requires();
                pushes.extend(node.true_case.requires());
                pushes.extend(node.false_case.requires());
                pushes
            }
            AggregateMetric::IterateLag(node) => node.metric.requires(),
            AggregateMetric::ParentLag(node) => node.metric.requires(),
            AggregateMetric::Window(node) => node.metric.requires(),
            AggregateMetric::Running(node) => node.metric.requires(),
            AggregateMetric::SumChildren(node) => node.metric.requires(),
        }
    }

    fn register(&mut self, indexes: &PushIndexes, group_key_set: &Arc<GroupKeySet>) {
        match self {
            AggregateMetric::Constant(_)
            | AggregateMetric::PerGroupConstant(_)
            | AggregateMetric::MultiPerGroupConstant(_) => {}
            AggregateMetric::DocStats(leaf) => {
                leaf.index = indexes.get(&leaf.push).copied();
            }
            AggregateMetric::Unary(_, operand) => operand.register(indexes, group_key_set),
            AggregateMetric::Binary(_, l, r) => {
                l.register(indexes, group_key_set);
                r.register(indexes, group_key_set);
            }
            AggregateMetric::Multiple(_, metrics) => {
                for metric in metrics {
                    metric.register(indexes, group_key_set);
                }
            }
            AggregateMetric::IfThenElse(node) => {
                node.condition.register(indexes, group_key_set);
                node.true_case.register(indexes, group_key_set);
                node.false_case.register(indexes, group_key_set);
            }
            AggregateMetric::IterateLag(node) => node.metric.register(indexes, group_key_set),
            AggregateMetric::ParentLag(node) => {
                node.metric.register(indexes, group_key_set);
                node.keys = Some(group_key_set.clone());
            }
            AggregateMetric::Window(node) => {
                node.metric.register(indexes, group_key_set);
                node.keys = Some(group_key_set.clone());
            }
            AggregateMetric::Running(node) => {
                node.metric.register(indexes, group_key_set);
                node.keys = Some(group_key_set.clone());
            }
            AggregateMetric::SumChildren(node) => {
                node.metric.register(indexes, group_key_set);
                node.keys = Some(group_key_set.clone());
            }
        }
    }
}

fn per_group(num_groups: usize, mut f: impl FnMut(usize) -> f64) -> Vec<f64> {
    let mut result = vec![0.0; num_groups + 1];
    for (g, slot) in result.iter_mut().enumerate().skip(1) {
        *slot = f(g);
    }
    result
}

/// Looks back `delay` groups for a sibling under the same parent, then
/// records the current value. The queue holds at most `delay` entries.
fn parent_lag_step(
    keys: &GroupKeySet,
    delay: usize,
    previous: &mut VecDeque<(usize, f64)>,
    group: usize,
    value: f64,
) -> f64 {
    let parent = keys.parent_group(group);
    let target = group
        .checked_sub(delay)
        .filter(|t| previous.iter().any(|(g, _)| g == t) && keys.parent_group(*t) == parent);

    let mut result = 0.0;
    if let Some(target) = target {
        while let Some((g, score)) = previous.pop_front() {
            if g == target {
                result = score;
                break;
            }
        }
    }

    previous.push_back((group, value));
    if previous.len() > delay {
        previous.pop_front();
    }
    result
}
