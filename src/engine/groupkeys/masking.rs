use std::sync::Arc;

use roaring::RoaringBitmap;

use super::key_set::GroupKeySet;

/// Hides groups that hold no documents without renumbering anything.
#[derive(Debug)]
pub struct MaskingGroupKeySet {
    pub inner: Arc<GroupKeySet>,
    presence: RoaringBitmap,
}

impl MaskingGroupKeySet {
    pub fn create(inner: Arc<GroupKeySet>, presence: RoaringBitmap) -> Arc<GroupKeySet> {
        Arc::new(GroupKeySet::Masking(Self { inner, presence }))
    }

    pub fn is_present(&self, group: usize) -> bool {
        u32::try_from(group).is_ok_and(|g| self.presence.contains(g)) && self.inner.is_present(group)
    }
}
