use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::engine::actions::{Action, UnconditionalAction};
use crate::engine::errors::{ExecResult, ExecutionError};
use crate::engine::groupkeys::{DumbGroupKeySet, GroupKey, SessionNameGroupKeySet};
use crate::engine::remote::{GroupMultiRemapRule, RegroupTerm};
use crate::engine::session::Session;
use crate::engine::types::TermValue;

/// Children of one parent group: one per term, plus an optional bucket
/// for documents that hold none of them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExplodeOpts {
    pub terms: Vec<RegroupTerm>,
    pub default_name: Option<String>,
}

impl ExplodeOpts {
    pub fn new(terms: Vec<RegroupTerm>) -> Self {
        Self {
            terms,
            default_name: None,
        }
    }

    pub fn with_default(mut self, name: impl Into<String>) -> Self {
        self.default_name = Some(name.into());
        self
    }
}

/// Splits every group into one child per listed term.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplodePerGroup {
    /// Entry `i` describes group `i + 1`.
    pub per_group: Vec<ExplodeOpts>,
}

impl ExplodePerGroup {
    pub fn new(per_group: Vec<ExplodeOpts>) -> Self {
        Self { per_group }
    }

    pub fn execute(&self, session: &mut Session) -> ExecResult<()> {
        if self.per_group.len() != session.num_groups {
            return Err(ExecutionError::InvalidArgument(format!(
                "explode needs one entry per group, got {} for {} groups",
                self.per_group.len(),
                session.num_groups
            )));
        }

        let mut rules = Vec::with_capacity(self.per_group.len());
        let mut parents = vec![0];
        let mut keys: Vec<Option<GroupKey>> = vec![None];
        for (i, opts) in self.per_group.iter().enumerate() {
            let group = i + 1;
            let mut positives = Vec::with_capacity(opts.terms.len());
            for term in &opts.terms {
                positives.push(parents.len());
                parents.push(group);
                keys.push(Some(match &term.value {
                    TermValue::Int(v) => GroupKey::Int(*v),
                    TermValue::Str(s) => GroupKey::Str(s.clone()),
                }));
            }
            let negative = match &opts.default_name {
                Some(name) => {
                    parents.push(group);
                    keys.push(Some(GroupKey::Default(name.clone())));
                    parents.len() - 1
                }
                None => 0,
            };
            rules.push(GroupMultiRemapRule {
                target: group,
                negative,
                positives,
                conditions: opts.terms.clone(),
            });
        }

        let total = parents.len() - 1;
        session.check_group_limit(total)?;
        debug!(target: "group_ql::commands", groups = total, "Exploding groups by term");
        let scope = session.dataset_names();
        session.regroup_multi(&rules, &scope)?;

        let head = session.group_key_set.clone();
        session.assume_dense(DumbGroupKeySet::create(head, parents, keys));
        info!(target: "group_ql::commands", num_groups = session.num_groups, "Explode per group done");
        Ok(())
    }
}

/// Splits every group into one child per dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExplodeSessionNames;

impl ExplodeSessionNames {
    pub fn execute(&self, session: &mut Session) -> ExecResult<()> {
        let names: Vec<String> = session.dataset_names().into_iter().collect();
        let num_sessions = names.len();
        let num_groups = session.num_groups;
        session.check_group_limit(num_groups * num_sessions)?;

        // Highest group first: every target is at or above its source, so
        // a move never lands on a group still waiting to be moved.
        for (i, name) in names.iter().enumerate() {
            let scope = BTreeSet::from([name.clone()]);
            for group in (1..=num_groups).rev() {
                let new_group = (group - 1) * num_sessions + i + 1;
                Action::Unconditional(UnconditionalAction::new(scope.clone(), group, new_group))
                    .apply(session)?;
            }
        }

        let mut display_names = Vec::with_capacity(num_sessions);
        for name in &names {
            display_names.push(session.dataset(name)?.display_name.clone());
        }
        let head = session.group_key_set.clone();
        session.densify(SessionNameGroupKeySet::create(head, display_names))?;
        info!(target: "group_ql::commands", num_groups = session.num_groups, "Explode session names done");
        Ok(())
    }
}

/// Undoes the most recent group-by, folding every group into its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegroupIntoParent;

impl RegroupIntoParent {
    pub fn execute(&self, session: &mut Session) -> ExecResult<()> {
        let head = session.group_key_set.clone();
        let previous = head.previous().cloned().ok_or_else(|| {
            ExecutionError::InvalidArgument("no group-by to regroup from".into())
        })?;
        let from: Vec<usize> = (1..=session.num_groups).collect();
        let to: Vec<usize> = from.iter().map(|g| head.parent_group(*g)).collect();
        session.remap_groups(&from, &to)?;
        session.assume_dense(previous);
        info!(target: "group_ql::commands", num_groups = session.num_groups, "Regrouped into parent");
        Ok(())
    }
}
