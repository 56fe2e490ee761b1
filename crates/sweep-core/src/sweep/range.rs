//! Range sweep over numeric members

use super::{ChangeNotifier, SweepEvent, SweepKind, SweepLoop};
use crate::error::{ConstructionError, MemberError, ValidationError};
use crate::member::{Member, MemberDescriptor, MemberRef};
use crate::step::{Step, StepType};
use crate::tree::StepId;
use crate::types::TypeDescriptor;
use crate::value::Value;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;

const TYPE_NAME: &str = "RangeSweep";
const START: &str = "start";
const STOP: &str = "stop";
const POINTS: &str = "points";
const BEHAVIOR: &str = "behavior";

static STEP_TYPE: Lazy<Arc<StepType>> = Lazy::new(|| {
    StepType::builder(TYPE_NAME)
        .member(MemberDescriptor::new(START, TypeDescriptor::Float, Value::Float(0.0)).display("Start"))
        .member(MemberDescriptor::new(STOP, TypeDescriptor::Float, Value::Float(1.0)).display("Stop"))
        .member(
            MemberDescriptor::new(POINTS, TypeDescriptor::Int, Value::Int(2))
                .display("Points")
                .validator(|v| match v {
                    Value::Int(n) if *n >= 0 && u32::try_from(*n).is_ok() => Ok(()),
                    _ => Err("point count must be a non-negative 32-bit integer".into()),
                }),
        )
        .member(
            MemberDescriptor::new(
                BEHAVIOR,
                RangeBehavior::descriptor(),
                Value::Enum(RangeBehavior::Linear.label().to_string()),
            )
            .display("Behavior")
            .not_sweepable(),
        )
        .build()
});

pub(super) fn step_type() -> Arc<StepType> {
    STEP_TYPE.clone()
}

/// Spacing of range points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeBehavior {
    /// Evenly spaced
    #[default]
    Linear,
    /// Evenly spaced in log10 space
    Exponential,
}

impl RangeBehavior {
    /// Enum variant name as shown to users
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Linear => "Linear",
            Self::Exponential => "Exponential",
        }
    }

    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::enumeration(
            "RangeBehavior",
            &[Self::Linear.label(), Self::Exponential.label()],
        )
    }

    fn from_label(label: &str) -> Option<Self> {
        [Self::Linear, Self::Exponential]
            .into_iter()
            .find(|b| b.label().eq_ignore_ascii_case(label))
    }
}

/// Loop step assigning a computed range to selected numeric members
#[derive(Debug)]
pub struct RangeSweep {
    id: Option<StepId>,
    start: f64,
    stop: f64,
    points: u32,
    behavior: RangeBehavior,
    members: Vec<Member>,
    notifier: ChangeNotifier,
}

impl RangeSweep {
    /// Linear range with no members selected
    #[must_use]
    pub fn new(start: f64, stop: f64, points: u32) -> Self {
        Self {
            id: None,
            start,
            stop,
            points,
            behavior: RangeBehavior::Linear,
            members: Vec::new(),
            notifier: ChangeNotifier::new(),
        }
    }

    /// Builder-style spacing
    #[inline]
    #[must_use]
    pub fn with_behavior(mut self, behavior: RangeBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Tree id, once attached
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<StepId> {
        self.id
    }

    /// First value
    #[inline]
    #[must_use]
    pub fn start(&self) -> f64 {
        self.start
    }

    /// Last value
    #[inline]
    #[must_use]
    pub fn stop(&self) -> f64 {
        self.stop
    }

    /// Number of points
    #[inline]
    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    /// Spacing
    #[inline]
    #[must_use]
    pub fn behavior(&self) -> RangeBehavior {
        self.behavior
    }

    /// Selected members
    #[inline]
    #[must_use]
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Select the members to assign
    ///
    /// Members may mix integer and float types; integers receive rounded
    /// values.
    ///
    /// # Errors
    /// Returns [`ConstructionError::NonNumericRangeMember`] for a
    /// non-numeric member.
    pub fn set_members(&mut self, members: impl IntoIterator<Item = Member>) -> Result<(), ConstructionError> {
        let mut selected: Vec<Member> = Vec::new();
        for member in members {
            if !member.value_type().is_numeric() {
                return Err(ConstructionError::NonNumericRangeMember {
                    member: member.member_ref(),
                    found: member.value_type().clone(),
                });
            }
            if !selected.contains(&member) {
                selected.push(member);
            }
        }
        self.members = selected;
        self.notifier.notify(SweepEvent::ParametersChanged);
        Ok(())
    }

    /// Distance between adjacent points
    ///
    /// Linear ranges return the additive step, exponential ranges the
    /// multiplicative factor. `None` for fewer than two points or invalid
    /// exponential bounds.
    #[must_use]
    pub fn step_size(&self) -> Option<f64> {
        if self.points < 2 {
            return None;
        }
        let intervals = f64::from(self.points - 1);
        match self.behavior {
            RangeBehavior::Linear => Some((self.stop - self.start) / intervals),
            RangeBehavior::Exponential => {
                if self.exponential_bounds_error().is_some() {
                    return None;
                }
                Some((self.stop / self.start).powf(1.0 / intervals))
            }
        }
    }

    /// Computed values in order
    ///
    /// One point yields `[start]`; invalid exponential bounds yield an empty
    /// range.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        match self.points {
            0 => Vec::new(),
            1 => vec![self.start],
            n => {
                let last = f64::from(n - 1);
                match self.behavior {
                    RangeBehavior::Linear => (0..n)
                        .map(|i| {
                            let i = f64::from(i);
                            (self.start * (last - i) + self.stop * i) / last
                        })
                        .collect(),
                    RangeBehavior::Exponential => {
                        if self.exponential_bounds_error().is_some() {
                            return Vec::new();
                        }
                        let sign = self.start.signum();
                        let lo = self.start.abs().log10();
                        let hi = self.stop.abs().log10();
                        (0..n)
                            .map(|i| {
                                let i = f64::from(i);
                                sign * 10f64.powf((lo * (last - i) + hi * i) / last)
                            })
                            .collect()
                    }
                }
            }
        }
    }

    fn exponential_bounds_error(&self) -> Option<ValidationError> {
        if self.start == 0.0 || self.stop == 0.0 {
            Some(ValidationError::ZeroBound {
                start: self.start,
                stop: self.stop,
            })
        } else if self.start.signum() != self.stop.signum() {
            Some(ValidationError::SignMismatch {
                start: self.start,
                stop: self.stop,
            })
        } else {
            None
        }
    }
}

impl Step for RangeSweep {
    fn step_type(&self) -> &Arc<StepType> {
        &STEP_TYPE
    }

    fn read_raw(&self, member: &str) -> Option<Value> {
        match member {
            START => Some(Value::Float(self.start)),
            STOP => Some(Value::Float(self.stop)),
            POINTS => Some(Value::Int(i64::from(self.points))),
            BEHAVIOR => Some(Value::Enum(self.behavior.label().to_string())),
            _ => None,
        }
    }

    fn write_raw(&mut self, member: &str, value: Value) -> Result<(), MemberError> {
        let member_ref = MemberRef::new(TYPE_NAME, member);
        let mismatch = |expected: TypeDescriptor, value: &Value| MemberError::TypeMismatch {
            member: MemberRef::new(TYPE_NAME, member),
            expected,
            actual: value.to_string(),
        };
        match (member, &value) {
            (START, Value::Float(v)) => self.start = *v,
            (STOP, Value::Float(v)) => self.stop = *v,
            (POINTS, Value::Int(n)) => {
                self.points = u32::try_from(*n).map_err(|e| MemberError::Rejected {
                    member: member_ref,
                    reason: e.to_string(),
                })?;
            }
            (BEHAVIOR, Value::Enum(label)) => {
                self.behavior = RangeBehavior::from_label(label).ok_or_else(|| MemberError::Rejected {
                    member: member_ref,
                    reason: format!("unknown behavior '{label}'"),
                })?;
            }
            (START | STOP, other) => return Err(mismatch(TypeDescriptor::Float, other)),
            (POINTS, other) => return Err(mismatch(TypeDescriptor::Int, other)),
            (BEHAVIOR, other) => return Err(mismatch(RangeBehavior::descriptor(), other)),
            _ => return Err(MemberError::Missing { member: member_ref }),
        }
        self.notifier.notify(SweepEvent::ParametersChanged);
        Ok(())
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

impl SweepLoop for RangeSweep {
    fn kind(&self) -> SweepKind {
        SweepKind::Range
    }

    fn axis_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for member in &self.members {
            let name = member.full_display_name();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    fn axis_members(&self, axis: &str) -> Option<Vec<Member>> {
        let members: Vec<Member> = self
            .members
            .iter()
            .filter(|m| m.full_display_name() == axis)
            .cloned()
            .collect();
        (!members.is_empty()).then_some(members)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.members.is_empty() {
            return Err(ValidationError::NoParameters);
        }
        if self.points <= 1 {
            return Err(ValidationError::TooFewPoints {
                points: self.points,
            });
        }
        if !self.start.is_finite() || !self.stop.is_finite() {
            return Err(ValidationError::NonFiniteBound {
                start: self.start,
                stop: self.stop,
            });
        }
        if self.behavior == RangeBehavior::Exponential {
            if let Some(err) = self.exponential_bounds_error() {
                return Err(err);
            }
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
    use proptest::prelude::*;

    fn freq() -> Member {
        StepType::builder("Source")
            .member(MemberDescriptor::new("freq", TypeDescriptor::Float, Value::Float(1.0)))
            .build()
            .get_member("freq")
            .unwrap()
    }

    fn close(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9)
    }

    #[test]
    fn linear_values_and_step() {
        let range = RangeSweep::new(0.0, 10.0, 5);
        assert!(close(&range.values(), &[0.0, 2.5, 5.0, 7.5, 10.0]));
        assert_eq!(range.step_size(), Some(2.5));
    }

    #[test]
    fn exponential_values_preserve_sign() {
        let range = RangeSweep::new(1.0, 1000.0, 4).with_behavior(RangeBehavior::Exponential);
        assert!(close(&range.values(), &[1.0, 10.0, 100.0, 1000.0]));
        assert!((range.step_size().unwrap() - 10.0).abs() < 1e-9);

        let negative = RangeSweep::new(-1.0, -100.0, 3).with_behavior(RangeBehavior::Exponential);
        assert!(close(&negative.values(), &[-1.0, -10.0, -100.0]));
    }

    #[test]
    fn validation_rules() {
        let mut range = RangeSweep::new(0.0, 1.0, 1);
        assert_eq!(range.validate(), Err(ValidationError::NoParameters));
        range.set_members([freq()]).unwrap();
        assert_eq!(range.validate(), Err(ValidationError::TooFewPoints { points: 1 }));

        let mut exp = RangeSweep::new(0.0, 10.0, 3).with_behavior(RangeBehavior::Exponential);
        exp.set_members([freq()]).unwrap();
        assert!(matches!(exp.validate(), Err(ValidationError::ZeroBound { .. })));

        let mut exp = RangeSweep::new(-1.0, 10.0, 3).with_behavior(RangeBehavior::Exponential);
        exp.set_members([freq()]).unwrap();
        assert!(matches!(exp.validate(), Err(ValidationError::SignMismatch { .. })));
        assert!(exp.values().is_empty());

        let mut nan = RangeSweep::new(f64::NAN, 1.0, 3);
        nan.set_members([freq()]).unwrap();
        assert!(matches!(nan.validate(), Err(ValidationError::NonFiniteBound { .. })));
    }

    #[test]
    fn non_numeric_member_rejected() {
        let text = StepType::builder("Log")
            .member(MemberDescriptor::new("msg", TypeDescriptor::Text, Value::Text(String::new())))
            .build()
            .get_member("msg")
            .unwrap();
        let mut range = RangeSweep::new(0.0, 1.0, 2);
        assert!(matches!(
            range.set_members([text]),
            Err(ConstructionError::NonNumericRangeMember { .. })
        ));
    }

    #[test]
    fn members_through_registry_handles() {
        let mut range = RangeSweep::new(0.0, 1.0, 2);
        let points = step_type().get_member(POINTS).unwrap();
        points.set(&mut range, Value::Int(7)).unwrap();
        assert_eq!(range.points(), 7);
        assert!(points.set(&mut range, Value::Int(-1)).is_err());
        let behavior = step_type().get_member(BEHAVIOR).unwrap();
        behavior.set(&mut range, Value::Enum("Exponential".into())).unwrap();
        assert_eq!(range.behavior(), RangeBehavior::Exponential);
    }

    proptest! {
        #[test]
        fn linear_endpoints_are_exact(start in -1e6f64..1e6, stop in -1e6f64..1e6, n in 2u32..50) {
            let values = RangeSweep::new(start, stop, n).values();
            prop_assert_eq!(values.len(), n as usize);
            prop_assert!((values[0] - start).abs() <= 1e-6 * start.abs().max(1.0));
            prop_assert!((values[values.len() - 1] - stop).abs() <= 1e-6 * stop.abs().max(1.0));
        }
    }
}
