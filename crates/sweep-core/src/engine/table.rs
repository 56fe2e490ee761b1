//! Table plan: one point per enabled row

use super::{Assignment, Plan, PlannedPoint};
use crate::clone::ValueCloner;
use crate::error::{SweepError, ValidationError};
use crate::resolver::{find_instances, MemberInstance};
use crate::sweep::{SweepColumn, SweepLoop, TableSweep};
use crate::tree::{StepId, StepTree};

pub(super) fn plan(tree: &StepTree, loop_id: StepId, cloner: &ValueCloner) -> Result<Plan, SweepError> {
    let sweep = tree.step_as::<TableSweep>(loop_id)?;
    sweep.validate()?;

    let columns: Vec<(&SweepColumn, Vec<MemberInstance>)> = sweep
        .columns()
        .iter()
        .map(|column| (column, find_instances(tree, loop_id, column.members())))
        .filter(|(_, targets)| !targets.is_empty())
        .collect();
    if columns.is_empty() {
        return Err(ValidationError::NoSweepableMembers.into());
    }

    // Cells never written are filled from the live values before any point
    // is applied.
    let mut points = Vec::new();
    for index in sweep.rows().enabled_indices() {
        let Some(row) = sweep.rows().get(index) else {
            continue;
        };
        let mut row = row.clone();
        let mut assignments = Vec::with_capacity(columns.len());
        for (column, targets) in &columns {
            let value = row.get(column.name(), tree, cloner)?.clone();
            assignments.push(Assignment {
                axis: column.name().to_string(),
                value,
                targets: targets.clone(),
            });
        }
        points.push(PlannedPoint { index, assignments });
    }
    Ok(Plan {
        points,
        restore: true,
    })
}
