use std::borrow::Cow;
use std::sync::Arc;

use super::dumb::DumbGroupKeySet;
use super::group_key::{DAY_KEYS, GroupKey};
use super::masking::MaskingGroupKeySet;
use super::metric_range::MetricRangeGroupKeySet;
use super::time_range::{DateTimeRangeGroupKeySet, YearMonthGroupKeySet};

/// One refinement step of the current partition. Nodes are immutable once
/// built and share their predecessors through `Arc`.
#[derive(Debug)]
pub enum GroupKeySet {
    /// Root of every chain: one group holding every document, or none once
    /// a filter has dropped it.
    Initial { num_groups: usize },
    Dumb(DumbGroupKeySet),
    MetricRange(MetricRangeGroupKeySet),
    DateTimeRange(DateTimeRangeGroupKeySet),
    YearMonth(YearMonthGroupKeySet),
    DayOfWeek(DayOfWeekGroupKeySet),
    SessionName(SessionNameGroupKeySet),
    FieldIn(FieldInGroupKeySet),
    Random(RandomGroupKeySet),
    Masking(MaskingGroupKeySet),
}

impl GroupKeySet {
    pub fn initial() -> Arc<GroupKeySet> {
        Arc::new(GroupKeySet::Initial { num_groups: 1 })
    }

    /// Root left after the single initial group was filtered away.
    pub fn empty() -> Arc<GroupKeySet> {
        Arc::new(GroupKeySet::Initial { num_groups: 0 })
    }

    pub fn previous(&self) -> Option<&Arc<GroupKeySet>> {
        match self {
            GroupKeySet::Initial { .. } => None,
            GroupKeySet::Dumb(s) => Some(&s.previous),
            GroupKeySet::MetricRange(s) => Some(&s.previous),
            GroupKeySet::DateTimeRange(s) => Some(&s.previous),
            GroupKeySet::YearMonth(s) => Some(&s.previous),
            GroupKeySet::DayOfWeek(s) => Some(&s.previous),
            GroupKeySet::SessionName(s) => Some(&s.previous),
            GroupKeySet::FieldIn(s) => Some(&s.previous),
            GroupKeySet::Random(s) => Some(&s.previous),
            GroupKeySet::Masking(s) => s.inner.previous(),
        }
    }

    pub fn parent_group(&self, group: usize) -> usize {
        match self {
            GroupKeySet::Initial { .. } => 0,
            GroupKeySet::Dumb(s) => s.parent_group(group),
            GroupKeySet::MetricRange(s) => parent_of(group, s.num_buckets),
            GroupKeySet::DateTimeRange(s) => parent_of(group, s.num_buckets),
            GroupKeySet::YearMonth(s) => parent_of(group, s.num_months),
            GroupKeySet::DayOfWeek(_) => parent_of(group, DAY_KEYS.len()),
            GroupKeySet::SessionName(s) => parent_of(group, s.names.len()),
            GroupKeySet::FieldIn(s) => parent_of(group, s.groups_per_parent()),
            GroupKeySet::Random(_) => 1,
            GroupKeySet::Masking(s) => s.inner.parent_group(group),
        }
    }

    pub fn group_key(&self, group: usize) -> Cow<'_, GroupKey> {
        match self {
            GroupKeySet::Initial { .. } => Cow::Owned(GroupKey::Empty),
            GroupKeySet::Dumb(s) => s.group_key(group),
            GroupKeySet::MetricRange(s) => Cow::Owned(s.group_key(group)),
            GroupKeySet::DateTimeRange(s) => Cow::Owned(s.group_key(group)),
            GroupKeySet::YearMonth(s) => Cow::Owned(s.group_key(group)),
            GroupKeySet::DayOfWeek(_) => Cow::Borrowed(&DAY_KEYS[inner_of(group, DAY_KEYS.len())]),
            GroupKeySet::SessionName(s) => match s.names.get(inner_of(group, s.names.len())) {
                Some(name) => Cow::Owned(GroupKey::Str(name.clone())),
                None => Cow::Owned(GroupKey::Empty),
            },
            GroupKeySet::FieldIn(s) => s.group_key(group),
            GroupKeySet::Random(_) => Cow::Owned(GroupKey::Int(group.saturating_sub(1) as i64)),
            GroupKeySet::Masking(s) => s.inner.group_key(group),
        }
    }

    pub fn num_groups(&self) -> usize {
        match self {
            GroupKeySet::Initial { num_groups } => *num_groups,
            GroupKeySet::Dumb(s) => s.num_groups(),
            GroupKeySet::MetricRange(s) => s.num_groups,
            GroupKeySet::DateTimeRange(s) => s.previous.num_groups() * s.num_buckets,
            GroupKeySet::YearMonth(s) => s.previous.num_groups() * s.num_months,
            GroupKeySet::DayOfWeek(s) => s.previous.num_groups() * DAY_KEYS.len(),
            GroupKeySet::SessionName(s) => s.previous.num_groups() * s.names.len(),
            GroupKeySet::FieldIn(s) => s.previous.num_groups() * s.groups_per_parent(),
            GroupKeySet::Random(s) => s.num_groups,
            GroupKeySet::Masking(s) => s.inner.num_groups(),
        }
    }

    pub fn is_present(&self, group: usize) -> bool {
        match self {
            GroupKeySet::Initial { num_groups } => group >= 1 && group <= *num_groups,
            GroupKeySet::Dumb(s) => s.is_present(group),
            GroupKeySet::Random(s) => group >= 2 && group <= s.num_groups,
            GroupKeySet::Masking(s) => s.is_present(group),
            GroupKeySet::MetricRange(_)
            | GroupKeySet::DateTimeRange(_)
            | GroupKeySet::YearMonth(_)
            | GroupKeySet::DayOfWeek(_)
            | GroupKeySet::SessionName(_)
            | GroupKeySet::FieldIn(_) => {
                group > 0
                    && group <= self.num_groups()
                    && self
                        .previous()
                        .is_some_and(|prev| prev.is_present(self.parent_group(group)))
            }
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GroupKeySet::Initial { .. } => "initial",
            GroupKeySet::Dumb(_) => "dumb",
            GroupKeySet::MetricRange(_) => "metric_range",
            GroupKeySet::DateTimeRange(_) => "date_time_range",
            GroupKeySet::YearMonth(_) => "year_month",
            GroupKeySet::DayOfWeek(_) => "day_of_week",
            GroupKeySet::SessionName(_) => "session_name",
            GroupKeySet::FieldIn(_) => "field_in",
            GroupKeySet::Random(_) => "random",
            GroupKeySet::Masking(_) => "masking",
        }
    }
}

pub(crate) fn parent_of(group: usize, factor: usize) -> usize {
    if group == 0 || factor == 0 {
        0
    } else {
        1 + (group - 1) / factor
    }
}

pub(crate) fn inner_of(group: usize, factor: usize) -> usize {
    if group == 0 || factor == 0 {
        0
    } else {
        (group - 1) % factor
    }
}

/// Seven children per parent, labelled Monday..Sunday.
#[derive(Debug)]
pub struct DayOfWeekGroupKeySet {
    pub previous: Arc<GroupKeySet>,
}

impl DayOfWeekGroupKeySet {
    pub fn create(previous: Arc<GroupKeySet>) -> Arc<GroupKeySet> {
        Arc::new(GroupKeySet::DayOfWeek(Self { previous }))
    }
}

/// One child per dataset name, in the order given.
#[derive(Debug)]
pub struct SessionNameGroupKeySet {
    pub previous: Arc<GroupKeySet>,
    pub names: Vec<String>,
}

impl SessionNameGroupKeySet {
    pub fn create(previous: Arc<GroupKeySet>, names: Vec<String>) -> Arc<GroupKeySet> {
        Arc::new(GroupKeySet::SessionName(Self { previous, names }))
    }
}

/// One child per listed term under each parent, plus a trailing DEFAULT
/// child when unmatched documents are kept.
#[derive(Debug)]
pub struct FieldInGroupKeySet {
    pub previous: Arc<GroupKeySet>,
    pub terms: Vec<GroupKey>,
    pub with_default: bool,
}

impl FieldInGroupKeySet {
    pub fn create(
        previous: Arc<GroupKeySet>,
        terms: Vec<GroupKey>,
        with_default: bool,
    ) -> Arc<GroupKeySet> {
        Arc::new(GroupKeySet::FieldIn(Self {
            previous,
            terms,
            with_default,
        }))
    }

    pub fn groups_per_parent(&self) -> usize {
        self.terms.len() + usize::from(self.with_default)
    }

    fn group_key(&self, group: usize) -> Cow<'_, GroupKey> {
        match self.terms.get(inner_of(group, self.groups_per_parent())) {
            Some(key) => Cow::Borrowed(key),
            None if self.with_default => Cow::Owned(GroupKey::default_bucket()),
            None => Cow::Owned(GroupKey::Empty),
        }
    }
}

/// Synthetic random buckets under the single initial group. Group 1 holds
/// documents no bucket claimed and is never present.
#[derive(Debug)]
pub struct RandomGroupKeySet {
    pub previous: Arc<GroupKeySet>,
    pub num_groups: usize,
}

impl RandomGroupKeySet {
    pub fn create(previous: Arc<GroupKeySet>, num_groups: usize) -> Arc<GroupKeySet> {
        Arc::new(GroupKeySet::Random(Self {
            previous,
            num_groups,
        }))
    }
}
