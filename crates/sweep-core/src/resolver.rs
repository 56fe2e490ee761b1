//! Member resolution
//!
//! Walks the subtree under a sweep loop and groups the eligible members of
//! every descendant into equivalence classes keyed by
//! `(full display name, value type)`. Opaque sub-plan references contribute
//! their own members but hide their children.

use crate::member::{EquivalenceKey, Member};
use crate::tree::{StepId, StepTree};
use crate::value::Value;
use indexmap::IndexMap;

/// One member on one live step
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberInstance {
    /// Step holding the member
    pub step: StepId,
    /// The member
    pub member: Member,
}

/// Whether a member may take part in a sweep
#[must_use]
pub fn is_eligible(member: &Member) -> bool {
    member.is_readable() && member.is_writable() && member.is_browsable() && member.is_sweepable()
}

/// Eligible members under `root`, grouped by equivalence key
///
/// Keys and members appear in tree traversal order; each member appears once
/// even when several steps share its type. An empty map means nothing under
/// `root` can be swept.
#[must_use]
pub fn resolve(tree: &StepTree, root: StepId) -> IndexMap<EquivalenceKey, Vec<Member>> {
    let mut classes: IndexMap<EquivalenceKey, Vec<Member>> = IndexMap::new();
    for instance in instances(tree, root) {
        let members = classes.entry(instance.member.equivalence_key()).or_default();
        if !members.contains(&instance.member) {
            members.push(instance.member);
        }
    }
    classes
}

/// Every `(step, member)` pair under `root`, grouped by equivalence key
#[must_use]
pub fn resolve_instances(
    tree: &StepTree,
    root: StepId,
) -> IndexMap<EquivalenceKey, Vec<MemberInstance>> {
    let mut classes: IndexMap<EquivalenceKey, Vec<MemberInstance>> = IndexMap::new();
    for instance in instances(tree, root) {
        classes
            .entry(instance.member.equivalence_key())
            .or_default()
            .push(instance);
    }
    classes
}

/// Current value of the first-seen instance of each class
///
/// Used as the default of newly selected axes. Falls back to the declared
/// default when the live value cannot be read.
#[must_use]
pub fn resolve_defaults(tree: &StepTree, root: StepId) -> IndexMap<EquivalenceKey, Value> {
    let mut defaults = IndexMap::new();
    for instance in instances(tree, root) {
        let key = instance.member.equivalence_key();
        if defaults.contains_key(&key) {
            continue;
        }
        let value = tree
            .step(instance.step)
            .ok()
            .and_then(|step| instance.member.get(step).ok())
            .unwrap_or_else(|| instance.member.default_value().clone());
        defaults.insert(key, value);
    }
    defaults
}

/// Live instances of `members` under `root`, in tree order
///
/// A step matches a member when its type declares it. Disabled steps are
/// included: they still hold the member and must be restored.
#[must_use]
pub fn find_instances(tree: &StepTree, root: StepId, members: &[Member]) -> Vec<MemberInstance> {
    let mut out = Vec::new();
    for id in tree.descendants(root) {
        let Ok(step) = tree.step(id) else {
            continue;
        };
        let type_name = step.step_type().name();
        for member in members.iter().filter(|m| m.declaring_type() == type_name) {
            out.push(MemberInstance {
                step: id,
                member: member.clone(),
            });
        }
    }
    out
}

fn instances(tree: &StepTree, root: StepId) -> Vec<MemberInstance> {
    let mut out = Vec::new();
    for id in tree.descendants(root) {
        let Ok(step) = tree.step(id) else {
            continue;
        };
        for member in step.step_type().members().filter(is_eligible) {
            out.push(MemberInstance { step: id, member });
        }
    }
    out
}
