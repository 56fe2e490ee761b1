//! Member application, snapshots and restore
//!
//! Every targeted step receives its own copy of a point's value. Failures
//! are collected per `(axis, point, step, member)` and never stop the
//! remaining assignments.

use crate::clone::ValueCloner;
use crate::error::ApplyError;
use crate::member::MemberRef;
use crate::resolver::MemberInstance;
use crate::tree::{StepId, StepTree};
use crate::value::Value;

/// One axis value and the live members that receive it
#[derive(Debug, Clone)]
pub struct Assignment {
    /// Axis name, for reporting
    pub axis: String,
    /// Value to assign
    pub value: Value,
    /// Receiving members
    pub targets: Vec<MemberInstance>,
}

/// A member that could not be assigned or restored
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyFailure {
    /// Axis involved
    pub axis: String,
    /// Sweep point, `None` during restore
    pub index: Option<usize>,
    /// Step involved
    pub step: StepId,
    /// Member involved
    pub member: MemberRef,
    /// Cause
    pub error: ApplyError,
}

/// Aggregate of one or more application passes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    applied: usize,
    failures: Vec<ApplyFailure>,
}

impl ApplyReport {
    /// Empty report
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful assignments
    #[inline]
    #[must_use]
    pub fn applied(&self) -> usize {
        self.applied
    }

    /// Failed assignments
    #[inline]
    #[must_use]
    pub fn failures(&self) -> &[ApplyFailure] {
        &self.failures
    }

    /// Whether nothing failed
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: ApplyReport) {
        self.applied += other.applied;
        self.failures.extend(other.failures);
    }

    fn record(&mut self, axis: &str, index: Option<usize>, target: &MemberInstance, result: Result<(), ApplyError>) {
        match result {
            Ok(()) => self.applied += 1,
            Err(error) => {
                tracing::warn!(
                    axis,
                    index = ?index,
                    step = %target.step,
                    member = %target.member,
                    %error,
                    "member assignment failed"
                );
                self.failures.push(ApplyFailure {
                    axis: axis.to_string(),
                    index,
                    step: target.step,
                    member: target.member.member_ref(),
                    error,
                });
            }
        }
    }
}

/// Assign `assignment.value` to every target
pub fn apply_assignment(
    tree: &mut StepTree,
    assignment: &Assignment,
    index: Option<usize>,
    cloner: &ValueCloner,
    report: &mut ApplyReport,
) {
    for target in &assignment.targets {
        let result = assign(tree, target, &assignment.value, cloner);
        report.record(&assignment.axis, index, target, result);
    }
}

fn assign(tree: &mut StepTree, target: &MemberInstance, value: &Value, cloner: &ValueCloner) -> Result<(), ApplyError> {
    let copy = cloner.copy(value)?;
    let step = tree.step_mut(target.step)?;
    target.member.set(step, copy)?;
    Ok(())
}

#[derive(Debug, Clone)]
struct SnapshotEntry {
    target: MemberInstance,
    value: Value,
}

/// Original values of targeted members, owned by one execution
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Read the current value of every distinct target
    ///
    /// Unreadable targets are logged and left out.
    #[must_use]
    pub fn capture<'a>(tree: &StepTree, targets: impl IntoIterator<Item = &'a MemberInstance>) -> Self {
        let mut entries: Vec<SnapshotEntry> = Vec::new();
        for target in targets {
            if entries.iter().any(|e| &e.target == target) {
                continue;
            }
            let read = tree
                .step(target.step)
                .map_err(ApplyError::from)
                .and_then(|step| target.member.get(step).map_err(ApplyError::from));
            match read {
                Ok(value) => entries.push(SnapshotEntry {
                    target: target.clone(),
                    value,
                }),
                Err(error) => tracing::warn!(
                    step = %target.step,
                    member = %target.member,
                    %error,
                    "member cannot be snapshotted and will not be restored"
                ),
            }
        }
        Self { entries }
    }

    /// Number of captured members
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was captured
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write every captured value back
    pub fn restore(&self, tree: &mut StepTree) -> ApplyReport {
        let mut report = ApplyReport::new();
        for entry in &self.entries {
            let result = tree
                .step_mut(entry.target.step)
                .map_err(ApplyError::from)
                .and_then(|step| {
                    entry
                        .target
                        .member
                        .set(step, entry.value.clone())
                        .map_err(ApplyError::from)
                });
            let axis = entry.target.member.full_display_name();
            report.record(&axis, None, &entry.target, result);
        }
        tracing::debug!(restored = report.applied(), failed = report.failures().len(), "snapshot restored");
        report
    }
}
