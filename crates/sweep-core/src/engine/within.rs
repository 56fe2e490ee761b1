//! Within-run plan: every enabled point of a parameter sweep

use super::{Assignment, Plan, PlannedPoint};
use crate::clone::ValueCloner;
use crate::error::{SweepError, ValidationError};
use crate::param::SweepParam;
use crate::resolver::{find_instances, MemberInstance};
use crate::sweep::{ParameterSweep, SweepLoop};
use crate::tree::{StepId, StepTree};

pub(super) fn plan(tree: &StepTree, loop_id: StepId, _cloner: &ValueCloner) -> Result<Plan, SweepError> {
    let sweep = tree.step_as::<ParameterSweep>(loop_id)?;
    sweep.validate()?;
    let axes = parameter_axes(tree, loop_id, sweep)?;
    let points = sweep
        .enabled_indices()
        .into_iter()
        .map(|index| point(&axes, index))
        .collect();
    Ok(Plan {
        points,
        restore: true,
    })
}

/// Each axis with its live targets under the loop
pub(super) fn parameter_axes<'a>(
    tree: &StepTree,
    loop_id: StepId,
    sweep: &'a ParameterSweep,
) -> Result<Vec<(&'a SweepParam, Vec<MemberInstance>)>, ValidationError> {
    let axes: Vec<_> = sweep
        .params()
        .iter()
        .map(|param| (param, find_instances(tree, loop_id, param.members())))
        .collect();
    if axes.iter().all(|(_, targets)| targets.is_empty()) {
        return Err(ValidationError::NoSweepableMembers);
    }
    for (param, targets) in &axes {
        if targets.is_empty() {
            tracing::warn!(step = %loop_id, axis = %param.name(), "axis has no live members");
        }
    }
    Ok(axes)
}

/// Assignments of point `index`
pub(super) fn point(axes: &[(&SweepParam, Vec<MemberInstance>)], index: usize) -> PlannedPoint {
    let assignments = axes
        .iter()
        .filter_map(|(param, targets)| {
            param.value(index).map(|value| Assignment {
                axis: param.name().to_string(),
                value: value.clone(),
                targets: targets.clone(),
            })
        })
        .collect();
    PlannedPoint { index, assignments }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::MemberDescriptor;
    use crate::registry::TypeRegistry;
    use crate::resolver::resolve;
    use crate::step::{PropertyStep, StepType};
    use crate::types::TypeDescriptor;
    use crate::value::Value;
    use std::sync::Arc;

    fn fixture() -> (StepTree, StepId, ValueCloner) {
        let x = |ty: &str| {
            StepType::builder(ty)
                .member(MemberDescriptor::new("x", TypeDescriptor::Int, Value::Int(1)))
                .build()
        };
        let mut tree = StepTree::new(TypeRegistry::new());
        let root = tree.add_root("sweep", ParameterSweep::new()).unwrap();
        tree.add_child(root, "a", PropertyStep::new(x("A"))).unwrap();
        tree.add_child(root, "b", PropertyStep::new(x("B"))).unwrap();
        let cloner = ValueCloner::new(Arc::clone(tree.registry()));
        (tree, root, cloner)
    }

    fn select_all(tree: &mut StepTree, root: StepId, cloner: &ValueCloner, values: Vec<Value>) {
        let classes = resolve(tree, root);
        let sweep = tree.step_as_mut::<ParameterSweep>(root).unwrap();
        for members in classes.into_values() {
            let param = SweepParam::new(members).unwrap();
            let name = param.name().to_string();
            sweep.add_param(param, cloner).unwrap();
            sweep.set_series(&name, values.clone(), cloner).unwrap();
        }
    }

    #[test]
    fn one_point_per_enabled_index() {
        let (mut tree, root, cloner) = fixture();
        select_all(&mut tree, root, &cloner, vec![Value::Int(10), Value::Int(20), Value::Int(30)]);
        tree.step_as_mut::<ParameterSweep>(root)
            .unwrap()
            .set_enabled(1, false)
            .unwrap();

        let plan = plan(&tree, root, &cloner).unwrap();
        assert!(plan.restore);
        let indices: Vec<_> = plan.points.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 2]);
        let first = &plan.points[0].assignments[0];
        assert_eq!(first.value, Value::Int(10));
        assert_eq!(first.targets.len(), 2);
    }

    #[test]
    fn empty_selection_fails_validation() {
        let (tree, root, cloner) = fixture();
        let err = plan(&tree, root, &cloner).unwrap_err();
        assert!(matches!(err, SweepError::Validation(ValidationError::NoParameters)));
    }

    #[test]
    fn vanished_members_fail_validation() {
        let (mut tree, root, cloner) = fixture();
        select_all(&mut tree, root, &cloner, vec![Value::Int(10)]);
        for child in tree.children(root).to_vec() {
            tree.remove(child).unwrap();
        }
        let err = plan(&tree, root, &cloner).unwrap_err();
        assert!(matches!(
            err,
            SweepError::Validation(ValidationError::NoSweepableMembers)
        ));
    }
}
