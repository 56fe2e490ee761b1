//! Per-row editing projections
//!
//! Inside a row every selected axis is shown as one editable member whose
//! value comes from the row. `enabled_if` rules never hide a member in a
//! row: the controlling member may itself be swept.

use super::gate;
use crate::clone::ValueCloner;
use crate::error::{MemberError, SweepError};
use crate::member::{Member, MemberRef};
use crate::row::SweepRow;
use crate::sweep::SweepLoop;
use crate::tree::{StepId, StepTree};
use crate::types::TypeDescriptor;
use crate::value::Value;

/// One axis of one row, as presented for editing
#[derive(Debug, Clone, PartialEq)]
pub struct RowMemberProjection {
    /// Axis name
    pub axis: String,
    /// First member of the axis, used in error reports
    pub reference: MemberRef,
    /// Members behind the axis
    pub members: Vec<Member>,
    /// Axis value type
    pub value_type: TypeDescriptor,
    /// Row value, materialised from the live member if never written
    pub value: Value,
    /// Enclosing loop that drives these members, making the cell read-only
    pub claimed_by: Option<StepId>,
    /// A member carries an `enabled_if` rule that is ignored in this row
    pub enabled_if_bypassed: bool,
}

impl RowMemberProjection {
    /// Whether the cell accepts edits
    #[inline]
    #[must_use]
    pub fn is_editable(&self) -> bool {
        self.claimed_by.is_none() && self.members.iter().all(Member::is_writable)
    }

    /// Write `value` into `row` under this axis
    ///
    /// # Errors
    /// Returns [`MemberError::Rejected`] for a cell driven by another loop,
    /// [`MemberError::TypeMismatch`] for a value of the wrong type, or a
    /// clone failure.
    pub fn write(&self, row: &mut SweepRow, value: &Value, cloner: &ValueCloner) -> Result<(), SweepError> {
        let member = self.reference.clone();
        if let Some(owner) = self.claimed_by {
            return Err(MemberError::Rejected {
                member,
                reason: format!("driven by sweep {owner}"),
            }
            .into());
        }
        if !value.type_matches(&self.value_type) {
            return Err(MemberError::TypeMismatch {
                member,
                expected: self.value_type.clone(),
                actual: value.to_string(),
            }
            .into());
        }
        row.set(self.axis.clone(), value, cloner)?;
        Ok(())
    }
}

/// One projection per axis of the loop owning `row`
///
/// Cells never written are filled from the live members.
///
/// # Errors
/// Returns [`SweepError`] if the row is detached or a live value cannot be
/// read.
pub fn project_row(tree: &StepTree, row: &mut SweepRow, cloner: &ValueCloner) -> Result<Vec<RowMemberProjection>, SweepError> {
    let owner = row.owner().ok_or(crate::error::RowError::Detached)?;
    let sweep = tree.sweep_loop(owner)?;
    let mut out = Vec::new();
    for axis in sweep.axis_names() {
        let members = sweep.axis_members(&axis).unwrap_or_default();
        let Some(first) = members.first() else {
            continue;
        };
        let reference = first.member_ref();
        let value_type = first.value_type().clone();
        let claimed_by = members.iter().find_map(|m| gate::claiming_loop(tree, owner, m));
        let enabled_if_bypassed = members.iter().any(|m| m.enabled_if().is_some());
        let value = row.get(&axis, tree, cloner)?.clone();
        out.push(RowMemberProjection {
            axis,
            reference,
            members,
            value_type,
            value,
            claimed_by,
            enabled_if_bypassed,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::MemberDescriptor;
    use crate::param::SweepParam;
    use crate::registry::TypeRegistry;
    use crate::row::SweepRowCollection;
    use crate::step::{PropertyStep, StepType};
    use crate::sweep::ParameterSweep;
    use std::sync::Arc;

    fn dut() -> Arc<StepType> {
        StepType::builder("Dut")
            .member(MemberDescriptor::new("auto", TypeDescriptor::Bool, Value::Bool(false)))
            .member(
                MemberDescriptor::new("level", TypeDescriptor::Float, Value::Float(2.5))
                    .enabled_if("auto", Value::Bool(true)),
            )
            .build()
    }

    fn inner_sweep(tree: &mut StepTree, parent: Option<StepId>) -> StepId {
        let ty = dut();
        let level = ty.get_member("level").unwrap();
        let id = match parent {
            Some(p) => tree.add_child(p, "inner", ParameterSweep::new()).unwrap(),
            None => tree.add_root("inner", ParameterSweep::new()).unwrap(),
        };
        tree.add_child(id, "dut", PropertyStep::new(ty)).unwrap();
        let cloner = ValueCloner::new(Arc::clone(tree.registry()));
        tree.step_as_mut::<ParameterSweep>(id)
            .unwrap()
            .add_param(SweepParam::new([level]).unwrap(), &cloner)
            .unwrap();
        id
    }

    #[test]
    fn projects_live_value_and_accepts_edits() {
        let mut tree = StepTree::new(TypeRegistry::new());
        let id = inner_sweep(&mut tree, None);
        let cloner = ValueCloner::new(Arc::clone(tree.registry()));
        let mut rows = SweepRowCollection::with_owner(id);
        rows.push(SweepRow::new());
        let row = rows.get_mut(0).unwrap();

        let projections = project_row(&tree, row, &cloner).unwrap();
        assert_eq!(projections.len(), 1);
        let level = &projections[0];
        assert_eq!(level.value, Value::Float(2.5));
        assert!(level.enabled_if_bypassed);
        assert!(level.is_editable());

        level.write(row, &Value::Float(4.0), &cloner).unwrap();
        assert_eq!(row.cached("level"), Some(&Value::Float(4.0)));
        assert!(level.write(row, &Value::Int(4), &cloner).is_err());
    }

    #[test]
    fn members_driven_from_outside_are_read_only() {
        let mut tree = StepTree::new(TypeRegistry::new());
        let outer = tree.add_root("outer", ParameterSweep::new()).unwrap();
        let inner = inner_sweep(&mut tree, Some(outer));
        let level = dut().get_member("level").unwrap();
        let cloner = ValueCloner::new(Arc::clone(tree.registry()));
        tree.step_as_mut::<ParameterSweep>(outer)
            .unwrap()
            .add_param(SweepParam::new([level]).unwrap(), &cloner)
            .unwrap();

        let mut rows = SweepRowCollection::with_owner(inner);
        rows.push(SweepRow::new());
        let row = rows.get_mut(0).unwrap();
        let projections = project_row(&tree, row, &cloner).unwrap();
        assert_eq!(projections[0].claimed_by, Some(outer));
        assert!(!projections[0].is_editable());
        assert!(projections[0].write(row, &Value::Float(1.0), &cloner).is_err());
    }
}
