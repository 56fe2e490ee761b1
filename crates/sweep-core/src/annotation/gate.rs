//! Edit gating for members owned by a sweep
//!
//! A member selected by an enclosing loop is driven by that loop and must
//! not be edited on the step itself. Loops only reach down to the first
//! opaque sub-plan reference, so the ancestor walk stops there too.

use crate::error::TreeError;
use crate::member::Member;
use crate::step::Step;
use crate::tree::{StepId, StepTree};
use crate::value::Value;
use std::collections::HashSet;

/// Why a member cannot be edited
#[derive(Debug, Clone, PartialEq)]
pub enum DisabledReason {
    /// An enclosing loop sweeps the member
    ClaimedBySweep(StepId),
    /// The member is not writable
    ReadOnly,
    /// The member's `enabled_if` rule does not hold
    ConditionUnmet {
        /// Controlling member
        member: String,
        /// Value it must hold
        expected: Value,
    },
}

/// Editability of one member on one step
#[derive(Debug, Clone, PartialEq)]
pub struct MemberEditState {
    /// Step shown
    pub step: StepId,
    /// Member shown
    pub member: Member,
    /// First reason the member is locked, `None` when editable
    pub disabled: Option<DisabledReason>,
}

impl MemberEditState {
    /// Whether the user may edit the member
    #[inline]
    #[must_use]
    pub fn is_editable(&self) -> bool {
        self.disabled.is_none()
    }
}

/// Nearest enclosing loop that sweeps `member` of `step`
#[must_use]
pub fn claiming_loop(tree: &StepTree, step: StepId, member: &Member) -> Option<StepId> {
    let mut visited = HashSet::from([step]);
    let mut current = tree.get(step)?.parent();
    while let Some(id) = current {
        if !visited.insert(id) {
            return None;
        }
        let node = tree.get(id)?;
        if node.step().step_type().is_opaque() {
            return None;
        }
        if let Some(sweep) = node.step().as_sweep_loop() {
            if sweep.claimed_members().contains(member) {
                return Some(id);
            }
        }
        current = node.parent();
    }
    None
}

/// Edit state of `member` on `step`
///
/// # Errors
/// Returns [`TreeError::UnknownStep`] if `step` is not in the tree.
pub fn edit_state(tree: &StepTree, step: StepId, member: &Member) -> Result<MemberEditState, TreeError> {
    let owner = tree.step(step)?;
    let disabled = if let Some(sweep) = claiming_loop(tree, step, member) {
        Some(DisabledReason::ClaimedBySweep(sweep))
    } else if !member.is_writable() {
        Some(DisabledReason::ReadOnly)
    } else {
        unmet_condition(owner, member)
    };
    Ok(MemberEditState {
        step,
        member: member.clone(),
        disabled,
    })
}

/// Edit states of every visible member of `step`
///
/// # Errors
/// See [`edit_state`].
pub fn edit_states(tree: &StepTree, step: StepId) -> Result<Vec<MemberEditState>, TreeError> {
    let members: Vec<Member> = tree
        .step(step)?
        .step_type()
        .members()
        .filter(Member::is_browsable)
        .collect();
    members
        .iter()
        .map(|member| edit_state(tree, step, member))
        .collect()
}

fn unmet_condition(owner: &dyn Step, member: &Member) -> Option<DisabledReason> {
    let rule = member.enabled_if()?;
    let controlling = owner.step_type().get_member(&rule.member)?;
    match controlling.get(owner) {
        Ok(current) if current == rule.equals => None,
        _ => Some(DisabledReason::ConditionUnmet {
            member: rule.member.clone(),
            expected: rule.equals.clone(),
        }),
    }
}
