//! Row table over a parameter sweep's columns

use crate::clone::{CloneOutcome, ValueCloner};
use crate::error::SweepError;
use crate::row::{SweepRow, SweepRowCollection};
use crate::sweep::ParameterSweep;
use crate::tree::{StepId, StepTree};

/// Rows of a parameter sweep, one per point
#[derive(Debug, Clone, PartialEq)]
pub struct RowTableView {
    loop_id: StepId,
    axes: Vec<String>,
    defaults: SweepRow,
    rows: SweepRowCollection,
}

impl RowTableView {
    /// Build fresh rows from the current axes
    ///
    /// # Errors
    /// Returns [`SweepError`] if `loop_id` is not a parameter sweep or a
    /// strict cloner cannot copy a value.
    pub fn read(tree: &StepTree, loop_id: StepId, cloner: &ValueCloner) -> Result<Self, SweepError> {
        let sweep = tree.step_as::<ParameterSweep>(loop_id)?;
        let rows = SweepRowCollection::from_params(sweep.params(), Some(loop_id), cloner)?;
        let mut defaults = SweepRow::new();
        for param in sweep.params() {
            defaults.set(param.name(), param.default_value(), cloner)?;
        }
        Ok(Self {
            loop_id,
            axes: sweep.params().iter().map(|p| p.name().to_string()).collect(),
            defaults,
            rows,
        })
    }

    /// Loop the view was read from
    #[inline]
    #[must_use]
    pub fn loop_id(&self) -> StepId {
        self.loop_id
    }

    /// Column names
    #[inline]
    #[must_use]
    pub fn axes(&self) -> &[String] {
        &self.axes
    }

    /// Rows as read
    #[inline]
    #[must_use]
    pub fn rows(&self) -> &SweepRowCollection {
        &self.rows
    }

    /// Series length at read time
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the series was empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows to edit; owned copies of [`Self::rows`]
    ///
    /// # Errors
    /// Returns [`crate::error::CloneError`] from a strict cloner.
    pub fn edit(&self, cloner: &ValueCloner) -> Result<SweepRowCollection, SweepError> {
        Ok(self.rows.deep_clone(cloner)?.value)
    }

    /// A row to append: a copy of the last row, or the axis defaults
    ///
    /// # Errors
    /// Returns [`crate::error::CloneError`] from a strict cloner.
    pub fn new_element(&self, cloner: &ValueCloner) -> Result<SweepRow, SweepError> {
        let template = self.rows.iter().last().unwrap_or(&self.defaults);
        let mut row = template.deep_clone(cloner)?.value.with_enabled(true);
        for axis in &self.axes {
            if row.cached(axis).is_none() {
                if let Some(value) = self.defaults.cached(axis) {
                    row.set(axis.clone(), value, cloner)?;
                }
            }
        }
        Ok(row)
    }

    /// Delta replacing the series with `rows`
    #[must_use]
    pub fn write(&self, rows: SweepRowCollection) -> RowTableDelta {
        RowTableDelta {
            loop_id: self.loop_id,
            rows,
        }
    }
}

/// Changes produced by [`RowTableView::write`]
#[derive(Debug, Clone, PartialEq)]
pub struct RowTableDelta {
    loop_id: StepId,
    rows: SweepRowCollection,
}

impl RowTableDelta {
    /// Rows to write
    #[inline]
    #[must_use]
    pub fn rows(&self) -> &SweepRowCollection {
        &self.rows
    }

    /// Resize every axis to the row count and write the cells back
    ///
    /// The axes are rebuilt aside and swapped in, so a failing cell leaves
    /// the sweep untouched.
    ///
    /// # Errors
    /// Returns [`SweepError`] if the loop is gone, a cell has the wrong
    /// type, or a strict cloner cannot copy a cell.
    pub fn apply(self, tree: &mut StepTree, cloner: &ValueCloner) -> Result<CloneOutcome, SweepError> {
        let sweep = tree.step_as_mut::<ParameterSweep>(self.loop_id)?;
        let mut params = sweep.params().to_vec();
        let outcome = self.rows.write_params(&mut params, cloner)?;
        sweep.replace_params(params)?;
        tracing::debug!(step = %self.loop_id, rows = self.rows.len(), ?outcome, "row table written");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::MemberDescriptor;
    use crate::param::SweepParam;
    use crate::registry::TypeRegistry;
    use crate::step::{PropertyStep, StepType};
    use crate::types::TypeDescriptor;
    use crate::value::Value;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn fixture(values: Vec<Value>) -> (StepTree, StepId, ValueCloner) {
        let ty = StepType::builder("A")
            .member(MemberDescriptor::new("x", TypeDescriptor::Int, Value::Int(3)))
            .build();
        let member = ty.get_member("x").unwrap();
        let mut tree = StepTree::new(TypeRegistry::new());
        let root = tree.add_root("sweep", ParameterSweep::new()).unwrap();
        tree.add_child(root, "a", PropertyStep::new(ty)).unwrap();
        let cloner = ValueCloner::new(Arc::clone(tree.registry()));
        let sweep = tree.step_as_mut::<ParameterSweep>(root).unwrap();
        sweep.add_param(SweepParam::new([member]).unwrap(), &cloner).unwrap();
        sweep.set_series("x", values, &cloner).unwrap();
        (tree, root, cloner)
    }

    #[test]
    fn new_element_copies_last_row() {
        let (tree, root, cloner) = fixture(vec![Value::Int(1), Value::Int(2)]);
        let view = RowTableView::read(&tree, root, &cloner).unwrap();
        assert_eq!(view.len(), 2);
        let row = view.new_element(&cloner).unwrap();
        assert_eq!(row.cached("x"), Some(&Value::Int(2)));
        assert!(row.is_enabled());
    }

    #[test]
    fn new_element_on_empty_uses_defaults() {
        let (tree, root, cloner) = fixture(Vec::new());
        let view = RowTableView::read(&tree, root, &cloner).unwrap();
        assert!(view.is_empty());
        let row = view.new_element(&cloner).unwrap();
        assert_eq!(row.cached("x"), Some(&Value::Int(3)));
    }

    #[test]
    fn write_resizes_and_copies_cells() {
        let (mut tree, root, cloner) = fixture(vec![Value::Int(1)]);
        let view = RowTableView::read(&tree, root, &cloner).unwrap();
        let mut rows = view.edit(&cloner).unwrap();
        rows.push(view.new_element(&cloner).unwrap());
        rows.push(SweepRow::new().with_enabled(false).with_value("x", Value::Int(9)));
        rows.get_mut(1)
            .unwrap()
            .set("x", &Value::Int(5), &cloner)
            .unwrap();
        view.write(rows).apply(&mut tree, &cloner).unwrap();

        let sweep = tree.step_as::<ParameterSweep>(root).unwrap();
        assert_eq!(sweep.len(), 3);
        assert_eq!(
            sweep.param("x").unwrap().values(),
            &[Value::Int(1), Value::Int(5), Value::Int(9)]
        );
        assert_eq!(sweep.enabled_indices(), vec![0, 1]);
        // the view is a snapshot and did not change
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn bad_cell_leaves_sweep_untouched() {
        let (mut tree, root, cloner) = fixture(vec![Value::Int(1)]);
        let view = RowTableView::read(&tree, root, &cloner).unwrap();
        let rows: SweepRowCollection = [SweepRow::new().with_value("x", Value::Text("no".into()))]
            .into_iter()
            .collect();
        assert!(view.write(rows).apply(&mut tree, &cloner).is_err());
        let sweep = tree.step_as::<ParameterSweep>(root).unwrap();
        assert_eq!(sweep.param("x").unwrap().values(), &[Value::Int(1)]);
    }
}
