//! Across-runs plan: the point after the cursor, no restore

use super::within::{parameter_axes, point};
use super::Plan;
use crate::clone::ValueCloner;
use crate::error::{SweepError, ValidationError};
use crate::sweep::{ParameterSweep, SweepLoop};
use crate::tree::{StepId, StepTree};

pub(super) fn plan(tree: &StepTree, loop_id: StepId, _cloner: &ValueCloner) -> Result<Plan, SweepError> {
    let sweep = tree.step_as::<ParameterSweep>(loop_id)?;
    sweep.validate()?;
    let axes = parameter_axes(tree, loop_id, sweep)?;
    let index = sweep
        .next_enabled_index()
        .ok_or(ValidationError::NoEnabledPoints)?;
    tracing::debug!(step = %loop_id, cursor = ?sweep.cursor(), index, "across-runs point selected");
    Ok(Plan {
        points: vec![point(&axes, index)],
        restore: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::MemberDescriptor;
    use crate::param::SweepParam;
    use crate::registry::TypeRegistry;
    use crate::step::{PropertyStep, StepType};
    use crate::sweep::SweepMode;
    use crate::types::TypeDescriptor;
    use crate::value::Value;
    use std::sync::Arc;

    #[test]
    fn follows_cursor_and_skips_disabled() {
        let ty = StepType::builder("A")
            .member(MemberDescriptor::new("x", TypeDescriptor::Int, Value::Int(1)))
            .build();
        let member = ty.get_member("x").unwrap();
        let mut tree = StepTree::new(TypeRegistry::new());
        let root = tree.add_root("sweep", ParameterSweep::new().with_mode(SweepMode::AcrossRuns)).unwrap();
        tree.add_child(root, "a", PropertyStep::new(ty)).unwrap();
        let cloner = ValueCloner::new(Arc::clone(tree.registry()));

        let sweep = tree.step_as_mut::<ParameterSweep>(root).unwrap();
        let param = SweepParam::new([member]).unwrap();
        let axis = param.name().to_string();
        sweep.add_param(param, &cloner).unwrap();
        sweep
            .set_series(&axis, vec![Value::Int(1), Value::Int(2), Value::Int(3)], &cloner)
            .unwrap();
        sweep.set_enabled(1, false).unwrap();

        let first = plan(&tree, root, &cloner).unwrap();
        assert!(!first.restore);
        assert_eq!(first.points.len(), 1);
        assert_eq!(first.points[0].index, 0);

        tree.step_as_mut::<ParameterSweep>(root)
            .unwrap()
            .set_cursor(Some(0));
        assert_eq!(plan(&tree, root, &cloner).unwrap().points[0].index, 2);

        tree.step_as_mut::<ParameterSweep>(root)
            .unwrap()
            .set_cursor(Some(2));
        assert_eq!(plan(&tree, root, &cloner).unwrap().points[0].index, 0);
    }
}
