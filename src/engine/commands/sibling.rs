use std::collections::HashMap;

use roaring::RoaringBitmap;
use tracing::{debug, info};

use super::group_filter::evaluate_filter;
use crate::engine::errors::ExecResult;
use crate::engine::groupkeys::MaskingGroupKeySet;
use crate::engine::metrics::AggregateFilter;
use crate::engine::session::Session;

/// Folds groups into the last sibling under their parent. Once the filter
/// allows a group, it and every later sibling except the last are merged
/// into that last sibling. Merged groups stay numbered but are masked out.
#[derive(Debug)]
pub struct RegroupIntoLastSiblingWhere {
    pub filter: AggregateFilter,
}

impl RegroupIntoLastSiblingWhere {
    pub fn new(filter: AggregateFilter) -> Self {
        Self { filter }
    }

    /// Returns, per group starting at group 1, whether it was merged away.
    pub fn execute(&mut self, session: &mut Session) -> ExecResult<Vec<bool>> {
        let allowed = evaluate_filter(&mut self.filter, session)?;
        let head = session.group_key_set.clone();
        let num_groups = session.num_groups;

        let mut last_child: HashMap<usize, usize> = HashMap::new();
        for group in 1..=num_groups {
            last_child.insert(head.parent_group(group), group);
        }

        let mut merged = vec![false; num_groups + 1];
        let mut current_parent = None;
        let mut cascading = false;
        for group in 1..=num_groups {
            let parent = head.parent_group(group);
            if current_parent != Some(parent) {
                current_parent = Some(parent);
                cascading = false;
            }
            cascading |= allowed.get(group).copied().unwrap_or(false);
            merged[group] = cascading && last_child.get(&parent) != Some(&group);
        }

        let from: Vec<usize> = (1..=num_groups).collect();
        let to: Vec<usize> = from
            .iter()
            .map(|&group| match last_child.get(&head.parent_group(group)) {
                Some(&last) if merged[group] => last,
                _ => group,
            })
            .collect();
        let count = merged.iter().filter(|m| **m).count();
        debug!(target: "group_ql::commands", num_groups, merged = count, "Merging into last siblings");

        if count > 0 {
            session.remap_groups(&from, &to)?;
            let mut presence = RoaringBitmap::new();
            for group in (1..=num_groups).filter(|g| !merged[*g]) {
                presence.insert(group as u32);
            }
            session.assume_dense(MaskingGroupKeySet::create(head, presence));
        }
        info!(target: "group_ql::commands", merged = count, "Last-sibling regroup done");
        Ok(merged.split_off(1))
    }
}
