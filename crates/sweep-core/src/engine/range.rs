//! Range plan: one point per computed value

use super::{Assignment, Plan, PlannedPoint};
use crate::clone::ValueCloner;
use crate::error::{SweepError, ValidationError};
use crate::member::Member;
use crate::resolver::{find_instances, MemberInstance};
use crate::sweep::{RangeSweep, SweepLoop};
use crate::tree::{StepId, StepTree};
use crate::value::Value;

pub(super) fn plan(tree: &StepTree, loop_id: StepId, _cloner: &ValueCloner) -> Result<Plan, SweepError> {
    let sweep = tree.step_as::<RangeSweep>(loop_id)?;
    sweep.validate()?;

    // Int and float members receive differently typed values, so each
    // member gets its own assignment.
    let targets: Vec<(&Member, Vec<MemberInstance>)> = sweep
        .members()
        .iter()
        .map(|member| (member, find_instances(tree, loop_id, std::slice::from_ref(member))))
        .filter(|(_, instances)| !instances.is_empty())
        .collect();
    if targets.is_empty() {
        return Err(ValidationError::NoSweepableMembers.into());
    }

    let mut points = Vec::new();
    for (index, number) in sweep.values().into_iter().enumerate() {
        let assignments = targets
            .iter()
            .map(|(member, instances)| {
                let axis = member.full_display_name();
                match Value::from_f64(member.value_type(), number) {
                    Some(value) => Ok(Assignment {
                        axis,
                        value,
                        targets: instances.clone(),
                    }),
                    None => Err(ValidationError::UnrepresentableValue {
                        axis,
                        index,
                        value: number,
                    }),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        points.push(PlannedPoint { index, assignments });
    }
    Ok(Plan {
        points,
        restore: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::MemberDescriptor;
    use crate::registry::TypeRegistry;
    use crate::step::{PropertyStep, StepType};
    use crate::sweep::RangeBehavior;
    use crate::types::TypeDescriptor;
    use std::sync::Arc;

    fn fixture(range: RangeSweep) -> (StepTree, StepId, ValueCloner) {
        let ty = StepType::builder("Dut")
            .member(MemberDescriptor::new("level", TypeDescriptor::Float, Value::Float(0.5)))
            .member(MemberDescriptor::new("count", TypeDescriptor::Int, Value::Int(3)))
            .build();
        let mut range = range;
        range
            .set_members([ty.get_member("level").unwrap(), ty.get_member("count").unwrap()])
            .unwrap();
        let mut tree = StepTree::new(TypeRegistry::new());
        let root = tree.add_root("range", range).unwrap();
        tree.add_child(root, "dut", PropertyStep::new(ty)).unwrap();
        let cloner = ValueCloner::new(Arc::clone(tree.registry()));
        (tree, root, cloner)
    }

    #[test]
    fn typed_values_per_member() {
        let (tree, root, cloner) = fixture(RangeSweep::new(0.0, 10.0, 3));
        let plan = plan(&tree, root, &cloner).unwrap();
        assert_eq!(plan.points.len(), 3);
        let second = &plan.points[1].assignments;
        assert_eq!(second[0].value, Value::Float(5.0));
        assert_eq!(second[1].value, Value::Int(5));
    }

    #[test]
    fn exponential_bounds_are_checked() {
        let (tree, root, cloner) =
            fixture(RangeSweep::new(-1.0, 100.0, 3).with_behavior(RangeBehavior::Exponential));
        let err = plan(&tree, root, &cloner).unwrap_err();
        assert!(matches!(
            err,
            SweepError::Validation(ValidationError::SignMismatch { .. })
        ));
    }

    #[test]
    fn overflowing_points_are_rejected() {
        let (tree, root, cloner) = fixture(RangeSweep::new(1e308, 1e308, 3));
        let err = plan(&tree, root, &cloner).unwrap_err();
        assert!(matches!(
            err,
            SweepError::Validation(ValidationError::UnrepresentableValue { index: 0, .. })
        ));
    }

    #[test]
    fn single_point_rejected() {
        let (tree, root, cloner) = fixture(RangeSweep::new(1.0, 2.0, 1));
        let err = plan(&tree, root, &cloner).unwrap_err();
        assert!(matches!(
            err,
            SweepError::Validation(ValidationError::TooFewPoints { points: 1 })
        ));
    }
}
