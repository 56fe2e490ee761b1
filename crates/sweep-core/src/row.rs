//! Row-major view of sweep data
//!
//! A [`SweepRow`] is one sweep point: an enabled flag and a sparse map from
//! axis name to value. Missing cells are materialised lazily from the live
//! member under the owning loop. Rows refer to their loop by [`StepId`].

use crate::clone::{CloneOutcome, Cloned, ValueCloner};
use crate::error::{CloneError, RowError, SweepError};
use crate::param::SweepParam;
use crate::tree::{StepId, StepTree};
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One sweep point, row-major
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepRow {
    enabled: bool,
    values: IndexMap<String, Value>,
    #[serde(skip)]
    owner: Option<StepId>,
}

impl Default for SweepRow {
    fn default() -> Self {
        Self {
            enabled: true,
            values: IndexMap::new(),
            owner: None,
        }
    }
}

impl SweepRow {
    /// Enabled row with no cached cells
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style enabled flag
    #[inline]
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder-style raw cell, stored without cloning
    #[must_use]
    pub fn with_value(mut self, axis: impl Into<String>, value: Value) -> Self {
        self.values.insert(axis.into(), value);
        self
    }

    /// Whether the row takes part in the sweep
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable the row
    #[inline]
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Owning loop
    #[inline]
    #[must_use]
    pub fn owner(&self) -> Option<StepId> {
        self.owner
    }

    /// Cached cell, without materialising
    #[inline]
    #[must_use]
    pub fn cached(&self, axis: &str) -> Option<&Value> {
        self.values.get(axis)
    }

    /// Cached cells in insertion order
    pub fn cells(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Read a cell
    ///
    /// A cached value is returned as is. Otherwise the current value of the
    /// first step under the owning loop that exposes the axis is cloned into
    /// the cache.
    ///
    /// # Errors
    /// Returns [`RowError`] if the row is detached, the loop has no such
    /// axis, no step exposes it, or the live value cannot be read or copied.
    pub fn get(&mut self, axis: &str, tree: &StepTree, cloner: &ValueCloner) -> Result<&Value, RowError> {
        if !self.values.contains_key(axis) {
            let live = self.live_value(axis, tree)?;
            let copy = cloner.copy(&live)?;
            self.values.insert(axis.to_string(), copy);
        }
        Ok(&self.values[axis])
    }

    fn live_value(&self, axis: &str, tree: &StepTree) -> Result<Value, RowError> {
        let owner = self.owner.ok_or(RowError::Detached)?;
        let members = tree
            .sweep_loop(owner)?
            .axis_members(axis)
            .ok_or_else(|| RowError::UnknownAxis {
                owner,
                axis: axis.to_string(),
            })?;
        for id in tree.descendants(owner) {
            let step = tree.step(id)?;
            if let Some(member) = members
                .iter()
                .find(|m| m.declaring_type() == step.step_type().name())
            {
                return Ok(member.get(step)?);
            }
        }
        Err(RowError::NoLiveMember {
            owner,
            axis: axis.to_string(),
        })
    }

    /// Write a cell, storing a copy of `value`
    ///
    /// # Errors
    /// Returns [`CloneError`] if a strict cloner cannot copy the value.
    pub fn set(&mut self, axis: impl Into<String>, value: &Value, cloner: &ValueCloner) -> Result<CloneOutcome, CloneError> {
        let copy = cloner.clone_value(value)?;
        self.values.insert(axis.into(), copy.value);
        Ok(copy.outcome)
    }

    /// Drop a cached cell so the next read materialises it again
    pub fn forget(&mut self, axis: &str) -> Option<Value> {
        self.values.shift_remove(axis)
    }

    /// Deep copy, recursing into nested row tables
    ///
    /// # Errors
    /// Returns [`CloneError`] if a strict cloner cannot copy a cell.
    pub fn deep_clone(&self, cloner: &ValueCloner) -> Result<Cloned<SweepRow>, CloneError> {
        let mut outcome = CloneOutcome::Copied;
        let mut values = IndexMap::with_capacity(self.values.len());
        for (axis, value) in &self.values {
            let copy = cloner.clone_value(value)?;
            outcome = outcome.max(copy.outcome);
            values.insert(axis.clone(), copy.value);
        }
        Ok(Cloned::new(
            SweepRow {
                enabled: self.enabled,
                values,
                owner: self.owner,
            },
            outcome,
        ))
    }

    /// Transform every cached cell in place
    pub fn map_values(&mut self, mut f: impl FnMut(Value) -> Value) {
        let values = std::mem::take(&mut self.values);
        self.values = values.into_iter().map(|(k, v)| (k, f(v))).collect();
    }
}

impl PartialEq for SweepRow {
    fn eq(&self, other: &Self) -> bool {
        self.enabled == other.enabled && self.values == other.values
    }
}

/// Ordered rows sharing one owning loop
///
/// Every way of adding a row stamps it with the collection's owner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepRowCollection {
    #[serde(skip)]
    owner: Option<StepId>,
    rows: Vec<SweepRow>,
}

impl SweepRowCollection {
    /// Empty, detached collection
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty collection owned by `owner`
    #[inline]
    #[must_use]
    pub fn with_owner(owner: StepId) -> Self {
        Self {
            owner: Some(owner),
            rows: Vec::new(),
        }
    }

    /// Owning loop
    #[inline]
    #[must_use]
    pub fn owner(&self) -> Option<StepId> {
        self.owner
    }

    /// Change the owner and propagate it to every row
    pub fn set_owner(&mut self, owner: Option<StepId>) {
        self.owner = owner;
        for row in &mut self.rows {
            row.owner = owner;
        }
    }

    /// Append a row
    pub fn push(&mut self, mut row: SweepRow) {
        row.owner = self.owner;
        self.rows.push(row);
    }

    /// Insert a row at `index`, clamped to the end
    pub fn insert(&mut self, index: usize, mut row: SweepRow) {
        row.owner = self.owner;
        let index = index.min(self.rows.len());
        self.rows.insert(index, row);
    }

    /// Replace the row at `index`, returning the previous one
    pub fn set(&mut self, index: usize, mut row: SweepRow) -> Option<SweepRow> {
        row.owner = self.owner;
        let slot = self.rows.get_mut(index)?;
        let mut previous = std::mem::replace(slot, row);
        previous.owner = None;
        Some(previous)
    }

    /// Remove the row at `index`; it comes back detached
    pub fn remove(&mut self, index: usize) -> Option<SweepRow> {
        if index >= self.rows.len() {
            return None;
        }
        let mut row = self.rows.remove(index);
        row.owner = None;
        Some(row)
    }

    /// Keep the first `len` rows
    pub fn truncate(&mut self, len: usize) {
        self.rows.truncate(len);
    }

    /// Row at `index`
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&SweepRow> {
        self.rows.get(index)
    }

    /// Mutable row at `index`
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut SweepRow> {
        self.rows.get_mut(index)
    }

    /// Rows in order
    pub fn iter(&self) -> std::slice::Iter<'_, SweepRow> {
        self.rows.iter()
    }

    /// Mutable rows in order
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, SweepRow> {
        self.rows.iter_mut()
    }

    /// Number of rows
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Indices of enabled rows
    #[must_use]
    pub fn enabled_indices(&self) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.enabled)
            .map(|(i, _)| i)
            .collect()
    }

    /// Deep copy of every row, nested tables included
    ///
    /// # Errors
    /// Returns [`CloneError`] if a strict cloner cannot copy a cell.
    pub fn deep_clone(&self, cloner: &ValueCloner) -> Result<Cloned<SweepRowCollection>, CloneError> {
        let mut outcome = CloneOutcome::Copied;
        let mut rows = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let copy = row.deep_clone(cloner)?;
            outcome = outcome.max(copy.outcome);
            rows.push(copy.value);
        }
        Ok(Cloned::new(
            SweepRowCollection {
                owner: self.owner,
                rows,
            },
            outcome,
        ))
    }

    /// Row layout of column-oriented axes
    ///
    /// Row `i` is enabled when every axis enables point `i`; its cells are
    /// copies of each axis value.
    ///
    /// # Errors
    /// Returns [`CloneError`] if a strict cloner cannot copy a value.
    pub fn from_params(params: &[SweepParam], owner: Option<StepId>, cloner: &ValueCloner) -> Result<Self, CloneError> {
        let len = params.iter().map(SweepParam::len).max().unwrap_or(0);
        let mut rows = Self {
            owner,
            rows: Vec::with_capacity(len),
        };
        for index in 0..len {
            let mut row = SweepRow::new().with_enabled(params.iter().all(|p| p.is_enabled(index)));
            for param in params {
                if let Some(value) = param.value(index) {
                    row.set(param.name(), value, cloner)?;
                }
            }
            rows.push(row);
        }
        Ok(rows)
    }

    /// Write the rows back into column-oriented axes
    ///
    /// Every axis is resized to the row count; cached cells overwrite the
    /// matching slot and row flags become point flags.
    ///
    /// # Errors
    /// Returns [`SweepError`] if a cell has the wrong type for its axis or a
    /// strict cloner cannot copy it.
    pub fn write_params(&self, params: &mut [SweepParam], cloner: &ValueCloner) -> Result<CloneOutcome, SweepError> {
        let mut outcome = CloneOutcome::Copied;
        for param in params.iter_mut() {
            outcome = outcome.max(param.resize(self.rows.len(), cloner)?);
            for (index, row) in self.rows.iter().enumerate() {
                if let Some(value) = row.cached(param.name()) {
                    let copy = cloner.clone_value(value)?;
                    outcome = outcome.max(copy.outcome);
                    param.set_value(index, copy.value)?;
                }
                param.set_enabled(index, row.enabled)?;
            }
        }
        Ok(outcome)
    }
}

impl PartialEq for SweepRowCollection {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows
    }
}

impl<'a> IntoIterator for &'a SweepRowCollection {
    type Item = &'a SweepRow;
    type IntoIter = std::slice::Iter<'a, SweepRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl Extend<SweepRow> for SweepRowCollection {
    fn extend<I: IntoIterator<Item = SweepRow>>(&mut self, iter: I) {
        for row in iter {
            self.push(row);
        }
    }
}

impl FromIterator<SweepRow> for SweepRowCollection {
    fn from_iter<I: IntoIterator<Item = SweepRow>>(iter: I) -> Self {
        let mut rows = Self::new();
        rows.extend(iter);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::MemberDescriptor;
    use crate::registry::TypeRegistry;
    use crate::step::StepType;
    use crate::types::TypeDescriptor;
    use std::sync::Arc;

    fn cloner() -> ValueCloner {
        ValueCloner::new(Arc::new(TypeRegistry::new()))
    }

    fn x_param(values: &[i64]) -> SweepParam {
        let member = StepType::builder("A")
            .member(MemberDescriptor::new("x", TypeDescriptor::Int, Value::Int(0)))
            .build()
            .get_member("x")
            .unwrap();
        let mut p = SweepParam::new([member]).unwrap();
        p.resize(values.len(), &cloner()).unwrap();
        for (i, v) in values.iter().enumerate() {
            p.set_value(i, Value::Int(*v)).unwrap();
        }
        p
    }

    #[test]
    fn owner_propagates_on_every_insertion() {
        let mut rows = SweepRowCollection::with_owner(StepId(4));
        rows.push(SweepRow::new());
        rows.insert(0, SweepRow::new());
        rows.extend([SweepRow::new()]);
        assert!(rows.iter().all(|r| r.owner() == Some(StepId(4))));

        rows.set_owner(Some(StepId(9)));
        assert!(rows.iter().all(|r| r.owner() == Some(StepId(9))));

        let removed = rows.remove(0).unwrap();
        assert_eq!(removed.owner(), None);
    }

    #[test]
    fn detached_row_cannot_materialise() {
        let tree = StepTree::new(TypeRegistry::new());
        let mut row = SweepRow::new();
        assert_eq!(row.get("x", &tree, &cloner()).unwrap_err(), RowError::Detached);
    }

    #[test]
    fn deep_clone_copies_nested_tables() {
        let inner: SweepRowCollection = [SweepRow::new().with_value("y", Value::Int(1))]
            .into_iter()
            .collect();
        let row = SweepRow::new().with_value("nested", Value::Rows(inner));
        let mut copy = row.deep_clone(&cloner()).unwrap().value;
        copy.map_values(|v| match v {
            Value::Rows(mut rows) => {
                rows.push(SweepRow::new());
                Value::Rows(rows)
            }
            other => other,
        });
        let Some(Value::Rows(original)) = row.cached("nested") else {
            panic!("expected rows");
        };
        assert_eq!(original.len(), 1);
        assert_ne!(row, copy);
    }

    #[test]
    fn params_to_rows_and_back() {
        let mut params = vec![x_param(&[1, 2, 3])];
        params[0].set_enabled(1, false).unwrap();
        let mut rows = SweepRowCollection::from_params(&params, Some(StepId(0)), &cloner()).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(!rows.get(1).unwrap().is_enabled());

        rows.get_mut(2)
            .unwrap()
            .set("x", &Value::Int(30), &cloner())
            .unwrap();
        rows.push(SweepRow::new().with_value("x", Value::Int(40)));
        rows.write_params(&mut params, &cloner()).unwrap();
        assert_eq!(
            params[0].values(),
            &[Value::Int(1), Value::Int(2), Value::Int(30), Value::Int(40)]
        );
        assert_eq!(params[0].enabled_flags(), &[true, false, true, true]);
    }

    #[test]
    fn write_params_rejects_wrong_cell_type() {
        let mut params = vec![x_param(&[1])];
        let rows: SweepRowCollection = [SweepRow::new().with_value("x", Value::Bool(true))]
            .into_iter()
            .collect();
        assert!(rows.write_params(&mut params, &cloner()).is_err());
    }
}
