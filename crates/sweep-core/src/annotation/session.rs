//! One edit cycle over a parameter sweep
//!
//! Views are read, the user edits produce a delta, and [`SweepEditor::commit`]
//! applies it and re-reads both the picker and the row table, so neither
//! view is left stale by a change made through the other.

use super::{PickerDelta, PickerView, RowTableDelta, RowTableView};
use crate::clone::ValueCloner;
use crate::error::SweepError;
use crate::tree::{StepId, StepTree};

/// Edits from one of the two views
#[derive(Debug, Clone, PartialEq)]
pub enum EditorDelta {
    /// Selection change
    Picker(PickerDelta),
    /// Row table change
    Table(RowTableDelta),
}

impl From<PickerDelta> for EditorDelta {
    fn from(delta: PickerDelta) -> Self {
        Self::Picker(delta)
    }
}

impl From<RowTableDelta> for EditorDelta {
    fn from(delta: RowTableDelta) -> Self {
        Self::Table(delta)
    }
}

/// Both views of one parameter sweep
#[derive(Debug, Clone, PartialEq)]
pub struct EditorViews {
    /// Member selection
    pub picker: PickerView,
    /// Rows of the current series
    pub table: RowTableView,
}

/// Edit session bound to one parameter sweep
#[derive(Debug, Clone)]
pub struct SweepEditor {
    loop_id: StepId,
    cloner: ValueCloner,
}

impl SweepEditor {
    /// Session for the sweep at `loop_id`
    #[must_use]
    pub fn new(loop_id: StepId, cloner: ValueCloner) -> Self {
        Self { loop_id, cloner }
    }

    /// Loop being edited
    #[inline]
    #[must_use]
    pub fn loop_id(&self) -> StepId {
        self.loop_id
    }

    /// Read both views
    ///
    /// # Errors
    /// Returns [`SweepError`] if the loop is not a parameter sweep.
    pub fn read(&self, tree: &StepTree) -> Result<EditorViews, SweepError> {
        Ok(EditorViews {
            picker: PickerView::read(tree, self.loop_id)?,
            table: RowTableView::read(tree, self.loop_id, &self.cloner)?,
        })
    }

    /// Apply `delta` and return freshly read views
    ///
    /// # Errors
    /// Returns the error of the failed apply; the sweep is left unchanged.
    pub fn commit(&self, tree: &mut StepTree, delta: impl Into<EditorDelta>) -> Result<EditorViews, SweepError> {
        match delta.into() {
            EditorDelta::Picker(delta) => delta.apply(tree, &self.cloner)?,
            EditorDelta::Table(delta) => {
                delta.apply(tree, &self.cloner)?;
            }
        }
        self.read(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::PickerChoice;
    use crate::member::MemberDescriptor;
    use crate::registry::TypeRegistry;
    use crate::step::{PropertyStep, StepType};
    use crate::sweep::ParameterSweep;
    use crate::types::TypeDescriptor;
    use crate::value::Value;
    use std::sync::Arc;

    #[test]
    fn commit_refreshes_both_views() {
        let ty = StepType::builder("A")
            .member(MemberDescriptor::new("x", TypeDescriptor::Int, Value::Int(1)))
            .build();
        let mut tree = StepTree::new(TypeRegistry::new());
        let root = tree.add_root("sweep", ParameterSweep::new()).unwrap();
        tree.add_child(root, "a", PropertyStep::new(ty)).unwrap();
        let editor = SweepEditor::new(root, ValueCloner::new(Arc::clone(tree.registry())));

        let views = editor.read(&tree).unwrap();
        assert!(views.table.axes().is_empty());
        let views = editor
            .commit(&mut tree, views.picker.write(&[PickerChoice::All]))
            .unwrap();
        assert_eq!(views.table.axes(), &["x".to_string()]);
        assert!(views.table.is_empty());

        let mut rows = views.table.edit(&editor.cloner).unwrap();
        rows.push(views.table.new_element(&editor.cloner).unwrap());
        rows.push(views.table.new_element(&editor.cloner).unwrap());
        let views = editor.commit(&mut tree, views.table.write(rows)).unwrap();
        assert_eq!(views.table.len(), 2);
        assert_eq!(views.picker.selected().len(), 1);
        assert_eq!(tree.step_as::<ParameterSweep>(root).unwrap().len(), 2);
    }
}
