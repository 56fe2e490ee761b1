//! Column-oriented parameter sweep

use super::{ChangeNotifier, SweepEvent, SweepKind, SweepLoop};
use crate::clone::{CloneOutcome, ValueCloner};
use crate::error::{CloneError, MemberError, ParamError, SweepError, ValidationError};
use crate::member::{EquivalenceKey, Member, MemberDescriptor, MemberRef};
use crate::param::SweepParam;
use crate::resolver;
use crate::step::{Step, StepType};
use crate::tree::{StepId, StepTree};
use crate::types::TypeDescriptor;
use crate::value::Value;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

const TYPE_NAME: &str = "ParameterSweep";
const MODE_MEMBER: &str = "mode";

static STEP_TYPE: Lazy<Arc<StepType>> = Lazy::new(|| {
    StepType::builder(TYPE_NAME)
        .member(
            MemberDescriptor::new(
                MODE_MEMBER,
                SweepMode::descriptor(),
                Value::Enum(SweepMode::WithinRun.label().to_string()),
            )
            .display("Sweep Mode")
            .not_sweepable(),
        )
        .build()
});

pub(super) fn step_type() -> Arc<StepType> {
    STEP_TYPE.clone()
}

/// When the value series is consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepMode {
    /// Whole series inside one execution, then restore
    #[default]
    WithinRun,
    /// One enabled point per execution, cursor kept between executions
    AcrossRuns,
}

impl SweepMode {
    /// Enum variant name as shown to users
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::WithinRun => "Within Run",
            Self::AcrossRuns => "Across Runs",
        }
    }

    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::enumeration(
            "SweepMode",
            &[Self::WithinRun.label(), Self::AcrossRuns.label()],
        )
    }
}

impl fmt::Display for SweepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SweepMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "within" | "withinrun" => Ok(Self::WithinRun),
            "across" | "acrossruns" => Ok(Self::AcrossRuns),
            _ => Err(format!("unknown sweep mode '{s}'")),
        }
    }
}

/// Loop step driving one or more axes with a shared series length
#[derive(Debug, Default)]
pub struct ParameterSweep {
    id: Option<StepId>,
    mode: SweepMode,
    params: Vec<SweepParam>,
    len: usize,
    cursor: Option<usize>,
    notifier: ChangeNotifier,
}

impl ParameterSweep {
    /// Empty sweep
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style mode
    #[inline]
    #[must_use]
    pub fn with_mode(mut self, mode: SweepMode) -> Self {
        self.mode = mode;
        self
    }

    /// Tree id, once attached
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<StepId> {
        self.id
    }

    /// Sweep mode
    #[inline]
    #[must_use]
    pub fn mode(&self) -> SweepMode {
        self.mode
    }

    /// Change the sweep mode
    pub fn set_mode(&mut self, mode: SweepMode) {
        self.mode = mode;
    }

    /// Selected axes
    #[inline]
    #[must_use]
    pub fn params(&self) -> &[SweepParam] {
        &self.params
    }

    /// Axis by name
    #[must_use]
    pub fn param(&self, axis: &str) -> Option<&SweepParam> {
        self.params.iter().find(|p| p.name() == axis)
    }

    /// Axis by equivalence key
    #[must_use]
    pub fn param_by_key(&self, key: &EquivalenceKey) -> Option<&SweepParam> {
        self.params.iter().find(|p| &p.equivalence_key() == key)
    }

    /// Shared series length
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the series is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Resize every axis to `len` points
    ///
    /// Either every axis is resized or none is.
    ///
    /// # Errors
    /// Returns [`CloneError`] if a strict cloner cannot seed a new point.
    pub fn set_len(&mut self, len: usize, cloner: &ValueCloner) -> Result<CloneOutcome, CloneError> {
        let mut params = self.params.clone();
        let mut outcome = CloneOutcome::Copied;
        for param in &mut params {
            outcome = outcome.max(param.resize(len, cloner)?);
        }
        self.params = params;
        self.len = len;
        if let Some(cursor) = self.cursor {
            if cursor >= len {
                self.cursor = None;
            }
        }
        tracing::debug!(step = ?self.id, len, "sweep resized");
        self.notifier.notify(SweepEvent::ParametersChanged);
        Ok(outcome)
    }

    /// Run `edit` against a staged copy and keep its changes only on success
    ///
    /// Listeners hear one [`SweepEvent::ParametersChanged`] after a
    /// successful edit and nothing after a failed one.
    ///
    /// # Errors
    /// Returns the error of `edit`; the sweep is unchanged.
    pub fn transact<T, E>(&mut self, edit: impl FnOnce(&mut ParameterSweep) -> Result<T, E>) -> Result<T, E> {
        let mut staged = ParameterSweep {
            id: self.id,
            mode: self.mode,
            params: self.params.clone(),
            len: self.len,
            cursor: self.cursor,
            notifier: ChangeNotifier::default(),
        };
        match edit(&mut staged) {
            Ok(out) => {
                self.mode = staged.mode;
                self.params = staged.params;
                self.len = staged.len;
                self.cursor = staged.cursor;
                self.notifier.notify(SweepEvent::ParametersChanged);
                Ok(out)
            }
            Err(err) => {
                tracing::debug!(step = ?self.id, "sweep edit rolled back");
                Err(err)
            }
        }
    }

    /// Add an axis, resized to the current series length
    ///
    /// # Errors
    /// Returns [`ParamError::DuplicateAxis`] if an axis with the same
    /// members or name is already selected, or a [`CloneError`] from
    /// resizing.
    pub fn add_param(&mut self, mut param: SweepParam, cloner: &ValueCloner) -> Result<(), SweepError> {
        if self
            .params
            .iter()
            .any(|p| p.same_members(&param) || p.name() == param.name())
        {
            return Err(ParamError::DuplicateAxis(param.name().to_string()).into());
        }
        param.resize(self.len, cloner)?;
        tracing::info!(step = ?self.id, axis = %param.name(), members = param.members().len(), "axis added");
        self.params.push(param);
        self.notifier.notify(SweepEvent::ParametersChanged);
        Ok(())
    }

    /// Remove an axis by name
    pub fn remove_param(&mut self, axis: &str) -> Option<SweepParam> {
        let index = self.params.iter().position(|p| p.name() == axis)?;
        let removed = self.params.remove(index);
        tracing::info!(step = ?self.id, axis, "axis removed");
        self.notifier.notify(SweepEvent::ParametersChanged);
        Some(removed)
    }

    /// Replace the members of an axis
    ///
    /// # Errors
    /// Returns [`SweepError`] if the axis is unknown or the members do not
    /// fit it.
    pub fn refresh_members(&mut self, axis: &str, members: Vec<Member>) -> Result<(), SweepError> {
        self.param_mut(axis)?.refresh_members(members)?;
        Ok(())
    }

    /// Replace the whole axis set, adopting the length of the new axes
    ///
    /// # Errors
    /// Returns [`ValidationError::LengthMismatch`] if the axes disagree on
    /// length.
    pub fn replace_params(&mut self, params: Vec<SweepParam>) -> Result<(), ValidationError> {
        let len = params.first().map_or(0, SweepParam::len);
        if let Some(bad) = params.iter().find(|p| p.len() != len) {
            return Err(ValidationError::LengthMismatch {
                axis: bad.name().to_string(),
                expected: len,
                actual: bad.len(),
            });
        }
        self.params = params;
        self.len = len;
        self.cursor = None;
        self.notifier.notify(SweepEvent::ParametersChanged);
        Ok(())
    }

    /// Replace one value
    ///
    /// # Errors
    /// Returns [`ParamError`] for an unknown axis, a bad index or a wrong
    /// type.
    pub fn set_value(&mut self, axis: &str, index: usize, value: Value) -> Result<(), ParamError> {
        self.param_mut(axis)?.set_value(index, value)
    }

    /// Replace the series of one axis, resizing every axis to match
    ///
    /// On error no axis is changed.
    ///
    /// # Errors
    /// Returns [`SweepError`] for an unknown axis, a wrong value type or a
    /// strict clone failure.
    pub fn set_series(&mut self, axis: &str, values: Vec<Value>, cloner: &ValueCloner) -> Result<(), SweepError> {
        self.param_mut(axis)?;
        self.transact(|sweep| {
            sweep.set_len(values.len(), cloner)?;
            let param = sweep.param_mut(axis)?;
            for (index, value) in values.into_iter().enumerate() {
                param.set_value(index, value)?;
            }
            Ok::<_, SweepError>(())
        })
    }

    /// Enable or disable point `index` on every axis
    ///
    /// # Errors
    /// Returns [`ParamError::IndexOutOfRange`] if `index` is out of range.
    pub fn set_enabled(&mut self, index: usize, enabled: bool) -> Result<(), ParamError> {
        if index >= self.len {
            return Err(ParamError::IndexOutOfRange {
                axis: TYPE_NAME.to_string(),
                index,
                len: self.len,
            });
        }
        for param in &mut self.params {
            param.set_enabled(index, enabled)?;
        }
        Ok(())
    }

    /// Whether point `index` is enabled on every axis
    #[must_use]
    pub fn is_enabled(&self, index: usize) -> bool {
        index < self.len && self.params.iter().all(|p| p.is_enabled(index))
    }

    /// Enabled points in series order
    #[must_use]
    pub fn enabled_indices(&self) -> Vec<usize> {
        (0..self.len).filter(|i| self.is_enabled(*i)).collect()
    }

    /// Last point visited by an across-runs execution
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Position the across-runs cursor
    pub fn set_cursor(&mut self, cursor: Option<usize>) {
        self.cursor = cursor.filter(|c| *c < self.len);
    }

    /// Next enabled point after the cursor, wrapping to the first
    #[must_use]
    pub fn next_enabled_index(&self) -> Option<usize> {
        let enabled = self.enabled_indices();
        let after = match self.cursor {
            Some(cursor) => enabled.iter().copied().find(|i| *i > cursor),
            None => None,
        };
        after.or_else(|| enabled.first().copied())
    }

    /// Drop axes whose members vanished and refresh the others
    ///
    /// `available` is the current resolution of the subtree. Returns the
    /// names of dropped axes.
    pub fn prune(&mut self, available: &IndexMap<EquivalenceKey, Vec<Member>>) -> Vec<String> {
        let mut dropped = Vec::new();
        self.params.retain_mut(|param| {
            let keep = available
                .get(&param.equivalence_key())
                .is_some_and(|members| param.refresh_members(members.clone()).is_ok());
            if !keep {
                tracing::warn!(axis = %param.name(), "axis dropped: its members are gone");
                dropped.push(param.name().to_string());
            }
            keep
        });
        if !dropped.is_empty() {
            self.notifier.notify(SweepEvent::ParametersChanged);
        }
        dropped
    }

    /// [`Self::prune`] the sweep at `id` against its own subtree
    ///
    /// # Errors
    /// Returns [`SweepError::Tree`] if `id` is not a parameter sweep.
    pub fn prune_in(tree: &mut StepTree, id: StepId) -> Result<Vec<String>, SweepError> {
        tree.step_as::<ParameterSweep>(id)?;
        let available = resolver::resolve(tree, id);
        Ok(tree.step_as_mut::<ParameterSweep>(id)?.prune(&available))
    }

    fn param_mut(&mut self, axis: &str) -> Result<&mut SweepParam, ParamError> {
        self.params
            .iter_mut()
            .find(|p| p.name() == axis)
            .ok_or_else(|| ParamError::UnknownAxis(axis.to_string()))
    }
}

impl Step for ParameterSweep {
    fn step_type(&self) -> &Arc<StepType> {
        &STEP_TYPE
    }

    fn read_raw(&self, member: &str) -> Option<Value> {
        (member == MODE_MEMBER).then(|| Value::Enum(self.mode.label().to_string()))
    }

    fn write_raw(&mut self, member: &str, value: Value) -> Result<(), MemberError> {
        let member_ref = MemberRef::new(TYPE_NAME, member);
        if member != MODE_MEMBER {
            return Err(MemberError::Missing { member: member_ref });
        }
        match &value {
            Value::Enum(label) => {
                self.mode = label.parse().map_err(|reason| MemberError::Rejected {
                    member: member_ref,
                    reason,
                })?;
                Ok(())
            }
            other => Err(MemberError::TypeMismatch {
                member: member_ref,
                expected: SweepMode::descriptor(),
                actual: other.to_string(),
            }),
        }
    }

    fn attached(&mut self, id: StepId) {
        self.id = Some(id);
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

impl SweepLoop for ParameterSweep {
    fn kind(&self) -> SweepKind {
        SweepKind::Parameters
    }

    fn axis_names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.name().to_string()).collect()
    }

    fn axis_members(&self, axis: &str) -> Option<Vec<Member>> {
        self.param(axis).map(|p| p.members().to_vec())
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.params.is_empty() {
            return Err(ValidationError::NoParameters);
        }
        for param in &self.params {
            if param.len() != self.len || param.enabled_flags().len() != self.len {
                return Err(ValidationError::LengthMismatch {
                    axis: param.name().to_string(),
                    expected: self.len,
                    actual: param.len(),
                });
            }
        }
        if self.enabled_indices().is_empty() {
            return Err(ValidationError::NoEnabledPoints);
        }
        Ok(())
    }

    fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TypeRegistry;

    fn cloner() -> ValueCloner {
        ValueCloner::new(Arc::new(TypeRegistry::new()))
    }

    fn axis(ty: &str, name: &str) -> SweepParam {
        let member = StepType::builder(ty)
            .member(MemberDescriptor::new(name, TypeDescriptor::Int, Value::Int(0)))
            .build()
            .get_member(name)
            .unwrap();
        SweepParam::new([member]).unwrap()
    }

    #[test]
    fn mode_parses_loosely() {
        assert_eq!("within".parse::<SweepMode>().unwrap(), SweepMode::WithinRun);
        assert_eq!("Across Runs".parse::<SweepMode>().unwrap(), SweepMode::AcrossRuns);
        assert!("sideways".parse::<SweepMode>().is_err());
    }

    #[test]
    fn resize_keeps_axes_aligned() {
        let mut sweep = ParameterSweep::new();
        sweep.add_param(axis("A", "x"), &cloner()).unwrap();
        sweep.set_len(3, &cloner()).unwrap();
        sweep.add_param(axis("A", "y"), &cloner()).unwrap();
        assert!(sweep.params().iter().all(|p| p.len() == 3));
        sweep.set_len(1, &cloner()).unwrap();
        assert!(sweep.params().iter().all(|p| p.len() == 1));
    }

    #[test]
    fn duplicate_axis_rejected() {
        let mut sweep = ParameterSweep::new();
        sweep.add_param(axis("A", "x"), &cloner()).unwrap();
        let err = sweep.add_param(axis("A", "x"), &cloner()).unwrap_err();
        assert!(matches!(err, SweepError::Param(ParamError::DuplicateAxis(_))));
    }

    #[test]
    fn validation() {
        let mut sweep = ParameterSweep::new();
        assert_eq!(sweep.validate(), Err(ValidationError::NoParameters));
        sweep.add_param(axis("A", "x"), &cloner()).unwrap();
        assert_eq!(sweep.validate(), Err(ValidationError::NoEnabledPoints));
        sweep.set_len(2, &cloner()).unwrap();
        sweep.set_enabled(0, false).unwrap();
        sweep.set_enabled(1, false).unwrap();
        assert_eq!(sweep.validate(), Err(ValidationError::NoEnabledPoints));
        sweep.set_enabled(1, true).unwrap();
        assert_eq!(sweep.validate(), Ok(()));
    }

    #[test]
    fn cursor_wraps_over_enabled_points() {
        let mut sweep = ParameterSweep::new().with_mode(SweepMode::AcrossRuns);
        sweep.add_param(axis("A", "x"), &cloner()).unwrap();
        sweep.set_len(4, &cloner()).unwrap();
        sweep.set_enabled(2, false).unwrap();
        let mut visited = Vec::new();
        for _ in 0..4 {
            let next = sweep.next_enabled_index().unwrap();
            visited.push(next);
            sweep.set_cursor(Some(next));
        }
        assert_eq!(visited, vec![0, 1, 3, 0]);
    }

    #[test]
    fn mode_member_round_trips() {
        let mut sweep = ParameterSweep::new();
        let mode = step_type().get_member(MODE_MEMBER).unwrap();
        mode.set(&mut sweep, Value::Enum("Across Runs".into())).unwrap();
        assert_eq!(sweep.mode(), SweepMode::AcrossRuns);
        assert!(!mode.is_sweepable());
    }

    fn opaque_axis() -> SweepParam {
        let member = StepType::builder("Gen")
            .member(MemberDescriptor::new(
                "shape",
                TypeDescriptor::Object("Shape".into()),
                Value::Object(crate::value::ObjectRef::new(Shape)),
            ))
            .build()
            .get_member("shape")
            .unwrap();
        SweepParam::new([member]).unwrap()
    }

    #[derive(Debug)]
    struct Shape;

    impl crate::value::ObjectValue for Shape {
        fn type_name(&self) -> &str {
            "Shape"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn failed_resize_changes_no_axis() {
        let mut sweep = ParameterSweep::new();
        sweep.add_param(axis("A", "x"), &cloner()).unwrap();
        sweep.add_param(opaque_axis(), &cloner()).unwrap();

        let strict = cloner().with_strict(true);
        assert!(matches!(
            sweep.set_len(3, &strict),
            Err(CloneError::NotClonable { .. })
        ));
        assert_eq!(sweep.len(), 0);
        assert!(sweep.params().iter().all(|p| p.len() == 0));

        // the lenient cloner shares instead
        sweep.set_len(3, &cloner()).unwrap();
        assert!(sweep.params().iter().all(|p| p.len() == 3));
    }

    #[test]
    fn bad_series_leaves_sweep_unchanged() {
        let mut sweep = ParameterSweep::new();
        sweep.add_param(axis("A", "x"), &cloner()).unwrap();
        sweep.add_param(axis("A", "y"), &cloner()).unwrap();
        sweep
            .set_series("x", vec![Value::Int(1), Value::Int(2)], &cloner())
            .unwrap();

        let mut events = sweep.notifier().subscribe();
        events.borrow_and_update();
        let err = sweep
            .set_series(
                "x",
                vec![Value::Int(7), Value::Int(8), Value::Text("bad".into()), Value::Int(9)],
                &cloner(),
            )
            .unwrap_err();
        assert!(matches!(err, SweepError::Param(ParamError::ValueTypeMismatch { .. })));
        assert_eq!(sweep.len(), 2);
        assert_eq!(sweep.param("x").unwrap().values(), &[Value::Int(1), Value::Int(2)]);
        assert_eq!(sweep.param("y").unwrap().len(), 2);
        assert!(!events.has_changed().unwrap());
    }

    #[test]
    fn set_series_resizes_siblings() {
        let mut sweep = ParameterSweep::new();
        sweep.add_param(axis("A", "x"), &cloner()).unwrap();
        sweep.add_param(axis("A", "y"), &cloner()).unwrap();
        sweep
            .set_series("x", vec![Value::Int(1), Value::Int(2)], &cloner())
            .unwrap();
        assert_eq!(sweep.len(), 2);
        assert_eq!(sweep.param("y").unwrap().len(), 2);
        assert!(sweep.set_series("nope", vec![], &cloner()).is_err());
    }
}
