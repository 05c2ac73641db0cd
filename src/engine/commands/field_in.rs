use tracing::{debug, info};

use crate::engine::errors::ExecResult;
use crate::engine::groupkeys::{FieldInGroupKeySet, GroupKey};
use crate::engine::remote::{GroupMultiRemapRule, RegroupTerm};
use crate::engine::session::Session;

/// Splits every group into one child per listed int term of `field`.
#[derive(Debug, Clone, PartialEq)]
pub struct IntRegroupFieldIn {
    pub field: String,
    pub terms: Vec<i64>,
    /// Keep documents holding none of the terms in a DEFAULT child.
    pub with_default: bool,
}

impl IntRegroupFieldIn {
    pub fn execute(&self, session: &mut Session) -> ExecResult<()> {
        let conditions = self
            .terms
            .iter()
            .map(|t| RegroupTerm::int(self.field.as_str(), *t))
            .collect();
        let keys = self.terms.iter().map(|t| GroupKey::Int(*t)).collect();
        regroup_field_in(session, conditions, keys, self.with_default)
    }
}

/// Splits every group into one child per listed string term of `field`.
#[derive(Debug, Clone, PartialEq)]
pub struct StringRegroupFieldIn {
    pub field: String,
    pub terms: Vec<String>,
    pub with_default: bool,
}

impl StringRegroupFieldIn {
    pub fn execute(&self, session: &mut Session) -> ExecResult<()> {
        let conditions = self
            .terms
            .iter()
            .map(|t| RegroupTerm::string(self.field.as_str(), t.as_str()))
            .collect();
        let keys = self.terms.iter().map(|t| GroupKey::Str(t.clone())).collect();
        regroup_field_in(session, conditions, keys, self.with_default)
    }
}

fn regroup_field_in(
    session: &mut Session,
    conditions: Vec<RegroupTerm>,
    keys: Vec<GroupKey>,
    with_default: bool,
) -> ExecResult<()> {
    let per_parent = conditions.len() + usize::from(with_default);
    let num_groups = session.num_groups;
    session.check_group_limit(num_groups * per_parent)?;

    let rules: Vec<GroupMultiRemapRule> = (1..=num_groups)
        .map(|group| {
            let base = 1 + (group - 1) * per_parent;
            GroupMultiRemapRule {
                target: group,
                negative: if with_default {
                    base + conditions.len()
                } else {
                    0
                },
                positives: (base..base + conditions.len()).collect(),
                conditions: conditions.clone(),
            }
        })
        .collect();
    debug!(
        target: "group_ql::commands",
        terms = conditions.len(),
        with_default,
        groups = num_groups * per_parent,
        "Regrouping by field terms"
    );
    let scope = session.dataset_names();
    session.regroup_multi(&rules, &scope)?;

    let head = session.group_key_set.clone();
    session.densify(FieldInGroupKeySet::create(head, keys, with_default))?;
    info!(target: "group_ql::commands", num_groups = session.num_groups, "Field-in regroup done");
    Ok(())
}
