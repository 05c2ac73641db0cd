use std::collections::HashSet;

use tracing::{debug, info};

use crate::engine::actions::Action;
use crate::engine::errors::ExecResult;
use crate::engine::groupkeys::{DumbGroupKeySet, GroupKey, GroupKeySet};
use crate::engine::metrics::{AggregateFilter, Pushable, QualifiedPush};
use crate::engine::session::Session;

/// Drops every group the filter rejects and renumbers the rest densely.
#[derive(Debug)]
pub struct ApplyGroupFilter {
    pub filter: AggregateFilter,
}

impl ApplyGroupFilter {
    pub fn new(filter: AggregateFilter) -> Self {
        Self { filter }
    }

    pub fn execute(&mut self, session: &mut Session) -> ExecResult<()> {
        let keep = evaluate_filter(&mut self.filter, session)?;
        let head = session.group_key_set.clone();
        let mut from = Vec::new();
        let mut to = Vec::new();
        let mut parents = vec![0];
        let mut keys: Vec<Option<GroupKey>> = vec![None];
        for group in 1..keep.len() {
            if keep[group] {
                from.push(group);
                to.push(parents.len());
                parents.push(head.parent_group(group));
                keys.push(Some(head.group_key(group).into_owned()));
            }
        }
        debug!(
            target: "group_ql::commands",
            before = session.num_groups,
            kept = from.len(),
            "Applying group filter"
        );
        session.remap_groups(&from, &to)?;

        match head.previous() {
            Some(previous) => {
                session.assume_dense(DumbGroupKeySet::create(previous.clone(), parents, keys))
            }
            // The initial partition has no labels to carry over.
            None if from.is_empty() => session.assume_dense(GroupKeySet::empty()),
            None => session.assume_dense(head.clone()),
        }
        info!(target: "group_ql::commands", num_groups = session.num_groups, "Group filter applied");
        Ok(())
    }
}

/// Whether `filter` allows each group, indexed by group.
pub(crate) fn evaluate_filter(
    filter: &mut AggregateFilter,
    session: &mut Session,
) -> ExecResult<Vec<bool>> {
    let pushes: HashSet<QualifiedPush> = filter.requires();
    let pushed = session.push_metrics(&pushes);
    let columns = pushed.and_then(|pushed| {
        filter.register(&pushed.indexes, &session.group_key_set);
        session.group_stats(&pushed)
    });
    session.pop_stats()?;
    filter.get_group_stats(&columns?, session.num_groups)
}

/// Applies actions in order.
#[derive(Debug, Clone)]
pub struct ApplyFilterActions {
    pub actions: Vec<Action>,
}

impl ApplyFilterActions {
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    pub fn execute(&self, session: &mut Session) -> ExecResult<()> {
        for action in &self.actions {
            action.apply(session)?;
        }
        Ok(())
    }
}
