pub mod query;

pub use query::{
    BooleanOp, FAKE_FIELD, GroupMove, GroupMultiRemapRule, Query, QueryRemapRule, RegroupTerm,
};

use crate::engine::errors::RemoteError;
use crate::engine::types::{FieldKind, TermValue};

/// One field-term-group-stats row.
#[derive(Debug, Clone, PartialEq)]
pub struct FtgsRow {
    pub term: TermValue,
    pub group: usize,
    /// One value per stat pushed on the session, in push order.
    pub stats: Vec<i64>,
}

pub type FtgsStream<'a> = Box<dyn Iterator<Item = Result<FtgsRow, RemoteError>> + 'a>;

/// Capabilities of one remote dataset session. Every call blocks until the
/// remote engine has applied it.
pub trait RemoteSession: Send {
    /// Pushes stat expressions; returns the number of stats now on the stack.
    fn push_stats(&mut self, stats: &[String]) -> Result<usize, RemoteError>;

    /// Removes the most recently pushed stat; returns the remaining count.
    fn pop_stat(&mut self) -> Result<usize, RemoteError>;

    fn num_stats(&self) -> usize;

    fn num_groups(&self) -> usize;

    /// Per-group totals of one pushed stat, indexed by group (0 unused).
    fn get_group_stats(&mut self, stat: usize) -> Result<Vec<i64>, RemoteError>;

    fn regroup(&mut self, rule: &QueryRemapRule) -> Result<usize, RemoteError>;

    /// Documents in groups without a rule move to group 0.
    fn regroup_multi(&mut self, rules: &[GroupMultiRemapRule]) -> Result<usize, RemoteError>;

    /// Terms must be sorted ascending.
    fn int_or_regroup(
        &mut self,
        field: &str,
        terms: &[i64],
        groups: GroupMove,
    ) -> Result<(), RemoteError>;

    /// Terms must be sorted ascending.
    fn string_or_regroup(
        &mut self,
        field: &str,
        terms: &[String],
        groups: GroupMove,
    ) -> Result<(), RemoteError>;

    fn regex_regroup(&mut self, field: &str, regex: &str, groups: GroupMove)
    -> Result<(), RemoteError>;

    /// Deterministic for a given `salt`: documents whose term hashes below
    /// `probability` go to the positive group.
    fn random_regroup(
        &mut self,
        field: &str,
        is_int_field: bool,
        salt: &str,
        probability: f64,
        groups: GroupMove,
    ) -> Result<(), RemoteError>;

    /// Keeps documents whose stat lies in `[min, max]` (or outside it when
    /// `negate`); the rest go to group 0. Returns the number of groups.
    fn metric_filter(
        &mut self,
        stat: usize,
        min: i64,
        max: i64,
        negate: bool,
    ) -> Result<usize, RemoteError>;

    /// Splits every group into fixed-width buckets of the stat. Without
    /// `no_gutters` two extra buckets per group catch values below `min` and
    /// at or above `max`. Returns the number of groups.
    fn metric_regroup(
        &mut self,
        stat: usize,
        min: i64,
        max: i64,
        interval: i64,
        no_gutters: bool,
    ) -> Result<usize, RemoteError>;

    /// Spreads documents of `target` over `result_groups` by a salted hash of
    /// the stat; `percentages` are the cumulative bucket boundaries.
    fn random_metric_multi_regroup(
        &mut self,
        stat: usize,
        salt: &str,
        target: usize,
        percentages: &[f64],
        result_groups: &[usize],
    ) -> Result<(), RemoteError>;

    /// Rows of every (term, group) pair with documents, ordered by term then
    /// group when `sorted`.
    fn ftgs(&mut self, field: &str, kind: FieldKind, sorted: bool) -> Result<FtgsStream<'_>, RemoteError>;
}
