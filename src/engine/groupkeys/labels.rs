use super::group_key::GroupKey;
use super::key_set::GroupKeySet;
use crate::shared::format::OutputFormat;

/// Label components of `group` from the root refinement down to `head`.
pub fn group_keys(head: &GroupKeySet, group: usize) -> Vec<GroupKey> {
    let mut keys = Vec::new();
    let mut node = head;
    let mut current = group;
    while let Some(previous) = node.previous() {
        keys.push(node.group_key(current).into_owned());
        current = node.parent_group(current);
        node = previous;
    }
    keys.reverse();
    keys
}

pub fn render_labels(head: &GroupKeySet, group: usize, format: OutputFormat) -> Vec<String> {
    group_keys(head, group)
        .iter()
        .map(|key| key.render(format))
        .collect()
}

/// Number of label components every group of `head` renders with.
pub fn depth(head: &GroupKeySet) -> usize {
    let mut depth = 0;
    let mut node = head;
    while let Some(previous) = node.previous() {
        depth += 1;
        node = previous;
    }
    depth
}
