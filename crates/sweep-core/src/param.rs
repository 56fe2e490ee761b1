//! Sweep axes
//!
//! A [`SweepParam`] binds an equivalence class of members to a value series
//! with a parallel enabled array. Length consistency between the axes of one
//! loop is maintained by the owning loop, which resizes all of them together.

use crate::clone::{CloneOutcome, ValueCloner};
use crate::error::{CloneError, ConstructionError, ParamError};
use crate::member::{EquivalenceKey, Member};
use crate::types::TypeDescriptor;
use crate::value::Value;

/// A named sweep axis
#[derive(Debug, Clone)]
pub struct SweepParam {
    name: String,
    members: Vec<Member>,
    value_type: TypeDescriptor,
    values: Vec<Value>,
    enabled: Vec<bool>,
    default_value: Value,
}

impl SweepParam {
    /// Build an empty axis over `members`
    ///
    /// The axis is named after the first member's full display name and
    /// defaults to its declared default. Duplicate members are ignored.
    ///
    /// # Errors
    /// Returns [`ConstructionError`] if `members` is empty or the members do
    /// not share one value type.
    pub fn new(members: impl IntoIterator<Item = Member>) -> Result<Self, ConstructionError> {
        let members = check_members(members)?;
        let first = &members[0];
        Ok(Self {
            name: first.full_display_name(),
            value_type: first.value_type().clone(),
            default_value: first.default_value().clone(),
            members,
            values: Vec::new(),
            enabled: Vec::new(),
        })
    }

    /// Rebuild an axis from stored parts
    ///
    /// # Errors
    /// Returns a [`ConstructionError`] for a bad member set and a
    /// [`ParamError`] if a value does not match the axis type.
    pub fn restore(
        name: impl Into<String>,
        members: impl IntoIterator<Item = Member>,
        values: Vec<Value>,
        enabled: Vec<bool>,
    ) -> Result<Self, crate::error::SweepError> {
        let mut param = Self::new(members)?.with_name(name);
        for value in &values {
            param.check_value(value)?;
        }
        let mut enabled = enabled;
        enabled.resize(values.len(), true);
        param.values = values;
        param.enabled = enabled;
        Ok(param)
    }

    /// Override the axis name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Override the default used to seed slot 0
    ///
    /// # Errors
    /// Returns [`ConstructionError::DefaultTypeMismatch`] if the value does
    /// not match the axis type.
    pub fn with_default(mut self, value: Value) -> Result<Self, ConstructionError> {
        if !value.type_matches(&self.value_type) {
            return Err(ConstructionError::DefaultTypeMismatch {
                expected: self.value_type.clone(),
                value: value.to_string(),
            });
        }
        self.default_value = value;
        Ok(self)
    }

    /// Axis name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Controlled members, one per matching step type
    #[inline]
    #[must_use]
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Shared value type of all members
    #[inline]
    #[must_use]
    pub fn value_type(&self) -> &TypeDescriptor {
        &self.value_type
    }

    /// Value series
    #[inline]
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Enabled flags, parallel to [`Self::values`]
    #[inline]
    #[must_use]
    pub fn enabled_flags(&self) -> &[bool] {
        &self.enabled
    }

    /// Seed value for an empty series
    #[inline]
    #[must_use]
    pub fn default_value(&self) -> &Value {
        &self.default_value
    }

    /// Number of sweep points
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the series is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `index`
    #[inline]
    #[must_use]
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Whether point `index` is enabled; out-of-range points are not
    #[inline]
    #[must_use]
    pub fn is_enabled(&self, index: usize) -> bool {
        self.enabled.get(index).copied().unwrap_or(false)
    }

    /// Equivalence key shared by all members
    #[must_use]
    pub fn equivalence_key(&self) -> EquivalenceKey {
        EquivalenceKey::new(self.members[0].full_display_name(), self.value_type.clone())
    }

    /// Whether `member` is controlled by this axis
    #[must_use]
    pub fn contains_member(&self, member: &Member) -> bool {
        self.members.contains(member)
    }

    /// Whether both axes control exactly the same members
    #[must_use]
    pub fn same_members(&self, other: &Self) -> bool {
        let mut mine: Vec<&Member> = self.members.iter().collect();
        let mut theirs: Vec<&Member> = other.members.iter().collect();
        mine.sort();
        theirs.sort();
        mine == theirs
    }

    /// Grow or shrink the series to `len` points
    ///
    /// Growth clones the previous slot; slot 0 of an empty series clones the
    /// default. New points are enabled. Shrinking truncates. Returns the least
    /// isolated clone path taken.
    ///
    /// # Errors
    /// Returns [`CloneError`] if a strict cloner cannot copy a seed value.
    pub fn resize(&mut self, len: usize, cloner: &ValueCloner) -> Result<CloneOutcome, CloneError> {
        let mut outcome = CloneOutcome::Copied;
        if len <= self.values.len() {
            self.values.truncate(len);
            self.enabled.truncate(len);
            return Ok(outcome);
        }
        self.values.reserve(len - self.values.len());
        while self.values.len() < len {
            let seed = self.values.last().unwrap_or(&self.default_value);
            let copy = cloner.clone_value(seed)?;
            if copy.outcome.is_shared() {
                tracing::warn!(
                    axis = %self.name,
                    index = self.values.len(),
                    "new sweep point shares its value with the previous point"
                );
            }
            outcome = outcome.max(copy.outcome);
            self.values.push(copy.value);
        }
        self.enabled.resize(len, true);
        Ok(outcome)
    }

    /// Replace the value at `index`
    ///
    /// # Errors
    /// Returns [`ParamError`] if `index` is out of range or the value has the
    /// wrong type.
    pub fn set_value(&mut self, index: usize, value: Value) -> Result<(), ParamError> {
        self.check_value(&value)?;
        let len = self.values.len();
        let slot = self
            .values
            .get_mut(index)
            .ok_or_else(|| ParamError::IndexOutOfRange {
                axis: self.name.clone(),
                index,
                len,
            })?;
        *slot = value;
        Ok(())
    }

    /// Enable or disable point `index`
    ///
    /// # Errors
    /// Returns [`ParamError::IndexOutOfRange`] if `index` is out of range.
    pub fn set_enabled(&mut self, index: usize, enabled: bool) -> Result<(), ParamError> {
        let len = self.enabled.len();
        let slot = self
            .enabled
            .get_mut(index)
            .ok_or_else(|| ParamError::IndexOutOfRange {
                axis: self.name.clone(),
                index,
                len,
            })?;
        *slot = enabled;
        Ok(())
    }

    /// Replace the member set with the latest matching members
    ///
    /// # Errors
    /// Returns [`ConstructionError`] if `members` is empty or changes the
    /// value type.
    pub fn refresh_members(
        &mut self,
        members: impl IntoIterator<Item = Member>,
    ) -> Result<(), ConstructionError> {
        let members = check_members(members)?;
        if members[0].value_type() != &self.value_type {
            return Err(ConstructionError::TypeMismatch {
                member: members[0].member_ref(),
                expected: self.value_type.clone(),
                found: members[0].value_type().clone(),
            });
        }
        self.members = members;
        Ok(())
    }

    fn check_value(&self, value: &Value) -> Result<(), ParamError> {
        if value.type_matches(&self.value_type) {
            Ok(())
        } else {
            Err(ParamError::ValueTypeMismatch {
                axis: self.name.clone(),
                expected: self.value_type.clone(),
                value: value.to_string(),
            })
        }
    }
}

impl PartialEq for SweepParam {
    fn eq(&self, other: &Self) -> bool {
        self.same_members(other) && self.values == other.values && self.enabled == other.enabled
    }
}

pub(crate) fn check_members(members: impl IntoIterator<Item = Member>) -> Result<Vec<Member>, ConstructionError> {
    let mut unique: Vec<Member> = Vec::new();
    for member in members {
        if !unique.contains(&member) {
            unique.push(member);
        }
    }
    let Some(first) = unique.first() else {
        return Err(ConstructionError::EmptyMemberSet);
    };
    let expected = first.value_type().clone();
    if let Some(bad) = unique.iter().find(|m| m.value_type() != &expected) {
        return Err(ConstructionError::TypeMismatch {
            member: bad.member_ref(),
            expected,
            found: bad.value_type().clone(),
        });
    }
    Ok(unique)
}
