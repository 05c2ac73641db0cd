use std::borrow::Cow;
use std::sync::Arc;

use super::group_key::GroupKey;
use super::key_set::GroupKeySet;

/// Explicit per-group parent and key tables. Index 0 is unused and a `None`
/// key marks a pruned group.
#[derive(Debug)]
pub struct DumbGroupKeySet {
    pub previous: Arc<GroupKeySet>,
    group_parents: Vec<usize>,
    group_keys: Vec<Option<GroupKey>>,
}

impl DumbGroupKeySet {
    pub fn create(
        previous: Arc<GroupKeySet>,
        group_parents: Vec<usize>,
        group_keys: Vec<Option<GroupKey>>,
    ) -> Arc<GroupKeySet> {
        debug_assert_eq!(group_parents.len(), group_keys.len());
        Arc::new(GroupKeySet::Dumb(Self {
            previous,
            group_parents,
            group_keys,
        }))
    }

    pub fn num_groups(&self) -> usize {
        self.group_keys.len().saturating_sub(1)
    }

    pub fn parent_group(&self, group: usize) -> usize {
        self.group_parents.get(group).copied().unwrap_or(0)
    }

    pub fn group_key(&self, group: usize) -> Cow<'_, GroupKey> {
        match self.group_keys.get(group) {
            Some(Some(key)) => Cow::Borrowed(key),
            _ => Cow::Owned(GroupKey::Empty),
        }
    }

    pub fn is_present(&self, group: usize) -> bool {
        group > 0
            && matches!(self.group_keys.get(group), Some(Some(_)))
            && self.previous.is_present(self.parent_group(group))
    }
}
