//! Row-oriented table sweep
//!
//! Columns bind axis names to member classes; each row carries the values
//! of one sweep point. The rows themselves are exposed as a sweepable
//! member so an outer loop can sweep whole tables.

use super::{ChangeNotifier, SweepEvent, SweepKind, SweepLoop};
use crate::error::{ConstructionError, MemberError, ParamError, SweepError, ValidationError};
use crate::member::{Member, MemberDescriptor, MemberRef};
use crate::param::check_members;
use crate::row::{SweepRow, SweepRowCollection};
use crate::step::{Step, StepType};
use crate::tree::StepId;
use crate::types::TypeDescriptor;
use crate::value::Value;
use once_cell::sync::Lazy;
use std::any::Any;
use std::sync::Arc;

const TYPE_NAME: &str = "TableSweep";
const ROWS_MEMBER: &str = "rows";

static STEP_TYPE: Lazy<Arc<StepType>> = Lazy::new(|| {
    StepType::builder(TYPE_NAME)
        .member(
            MemberDescriptor::new(
                ROWS_MEMBER,
                TypeDescriptor::Rows,
                Value::Rows(SweepRowCollection::new()),
            )
            .display("Sweep Values"),
        )
        .build()
});

pub(super) fn step_type() -> Arc<StepType> {
    STEP_TYPE.clone()
}

/// One table column
#[derive(Debug, Clone, PartialEq)]
pub struct SweepColumn {
    name: String,
    value_type: TypeDescriptor,
    members: Vec<Member>,
}

impl SweepColumn {
    /// Column named `name` over `members`
    ///
    /// # Errors
    /// Returns [`ConstructionError`] if `members` is empty or mixes types.
    pub fn new(name: impl Into<String>, members: impl IntoIterator<Item = Member>) -> Result<Self, ConstructionError> {
        let members = check_members(members)?;
        Ok(Self {
            name: name.into(),
            value_type: members[0].value_type().clone(),
            members,
        })
    }

    /// Column name, used as the row cell key
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared member type
    #[inline]
    #[must_use]
    pub fn value_type(&self) -> &TypeDescriptor {
        &self.value_type
    }

    /// Controlled members
    #[inline]
    #[must_use]
    pub fn members(&self) -> &[Member] {
        &self.members
    }
}

/// Loop step iterating the enabled rows of a table
#[derive(Debug, Default)]
pub struct TableSweep {
    id: Option<StepId>,
    columns: Vec<SweepColumn>,
    rows: SweepRowCollection,
    notifier: ChangeNotifier,
}

impl TableSweep {
    /// Empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tree id, once attached
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<StepId> {
        self.id
    }

    /// Columns in order
    #[inline]
    #[must_use]
    pub fn columns(&self) -> &[SweepColumn] {
        &self.columns
    }

    /// Column by name
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&SweepColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Append a column
    ///
    /// # Errors
    /// Returns [`ParamError::DuplicateAxis`] if the name is taken.
    pub fn add_column(&mut self, column: SweepColumn) -> Result<(), SweepError> {
        if self.column(&column.name).is_some() {
            return Err(ParamError::DuplicateAxis(column.name).into());
        }
        self.columns.push(column);
        self.notifier.notify(SweepEvent::ParametersChanged);
        Ok(())
    }

    /// Replace all columns and rows
    pub fn replace(&mut self, columns: Vec<SweepColumn>, mut rows: SweepRowCollection) {
        rows.set_owner(self.id);
        self.columns = columns;
        self.rows = rows;
        self.notifier.notify(SweepEvent::ParametersChanged);
    }

    /// Rows in order
    #[inline]
    #[must_use]
    pub fn rows(&self) -> &SweepRowCollection {
        &self.rows
    }

    /// Replace the rows, adopting them
    pub fn set_rows(&mut self, mut rows: SweepRowCollection) {
        rows.set_owner(self.id);
        self.rows = rows;
        self.notifier.notify(SweepEvent::ParametersChanged);
    }

    /// Append a row
    pub fn push_row(&mut self, row: SweepRow) {
        self.rows.push(row);
        self.notifier.notify(SweepEvent::ParametersChanged);
    }

    /// Enable or disable row `index`
    ///
    /// # Errors
    /// Returns [`ParamError::IndexOutOfRange`] if there is no such row.
    pub fn set_row_enabled(&mut self, index: usize, enabled: bool) -> Result<(), ParamError> {
        let len = self.rows.len();
        let row = self.rows.get_mut(index).ok_or(ParamError::IndexOutOfRange {
            axis: TYPE_NAME.to_string(),
            index,
            len,
        })?;
        row.set_enabled(enabled);
        Ok(())
    }
}

impl Step for TableSweep {
    fn step_type(&self) -> &Arc<StepType> {
        &STEP_TYPE
    }

    fn read_raw(&self, member: &str) -> Option<Value> {
        (member == ROWS_MEMBER).then(|| Value::Rows(self.rows.clone()))
    }

    fn write_raw(&mut self, member: &str, value: Value) -> Result<(), MemberError> {
        let member_ref = MemberRef::new(TYPE_NAME, member);
        match (member, value) {
            (ROWS_MEMBER, Value::Rows(rows)) => {
                self.set_rows(rows);
                Ok(())
            }
            (ROWS_MEMBER, other) => Err(MemberError::TypeMismatch {
                member: member_ref,
                expected: TypeDescriptor::Rows,
                actual: other.to_string(),
            }),
            _ => Err(MemberError::Missing { member: member_ref }),
        }
    }

    fn attached(&mut self, id: StepId) {
        self.id = Some(id);
        self.rows.set_owner(Some(id));
    }

    fn as_sweep_loop(&self) -> Option<&dyn SweepLoop> {
        Some(self)
    }

    fn as_sweep_loop_mut(&mut self) -> Option<&mut dyn SweepLoop> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl SweepLoop for TableSweep {
    fn kind(&self) -> SweepKind {
        SweepKind::Table
    }

    fn axis_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    fn axis_members(&self, axis: &str) -> Option<Vec<Member>> {
        self.column(axis).map(|c| c.members.clone())
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.columns.is_empty() {
            return Err(ValidationError::NoParameters);
        }
        if self.rows.enabled_indices().is_empty() {
            return Err(ValidationError::NoEnabledPoints);
        }
        Ok(())
    }

    fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }
}
