use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::types::TermValue;

/// Identity of a stateful metric node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

impl NodeId {
    pub fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Running sums of a window node for the term being visited.
#[derive(Debug, Default)]
pub(crate) struct WindowState {
    pub term: Option<TermValue>,
    pub sums: HashMap<usize, f64>,
    pub last_group: usize,
}

/// Cumulative totals of a running node for the term and parent being visited.
#[derive(Debug, Default)]
pub(crate) struct RunningState {
    pub term: Option<TermValue>,
    pub parent: usize,
    /// `(group, total through group)`, ascending by group.
    pub totals: Vec<(usize, f64)>,
}

/// Mutable side table of the order-dependent metric nodes. One instance
/// lives for exactly one field iteration pass, so the expression trees
/// themselves stay immutable and reusable.
#[derive(Debug, Default)]
pub struct EvalState {
    pub(crate) lag_queues: HashMap<(NodeId, usize), VecDeque<f64>>,
    pub(crate) parent_lag: HashMap<NodeId, VecDeque<(usize, f64)>>,
    pub(crate) windows: HashMap<NodeId, WindowState>,
    pub(crate) running: HashMap<NodeId, RunningState>,
}

impl EvalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.lag_queues.clear();
        self.parent_lag.clear();
        self.windows.clear();
        self.running.clear();
    }
}
