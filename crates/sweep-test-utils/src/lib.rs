//! Testing utilities for the stepsweep workspace
//!
//! Shared step types, tree fixtures and a recording step runner.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use sweep_core::engine::{JoinRunHandle, ReadyHandle, ResultParameters};
use sweep_core::sweep::loop_step_types;
use sweep_core::{
    CancellationToken, MemberDescriptor, ObjectCodec, ObjectRef, ObjectValue, ParameterSweep,
    PropertyStep, RunError, RunHandle, RunOutcome, StepId, StepRunner, StepTree, StepType,
    SweepMode, SweepParam, TypeDescriptor, TypeRegistry, Value, ValueCloner,
};

pub const WAVEFORM: &str = "Waveform";

/// `A { x: int = 1, gain: float = 1.0 }`
pub fn type_a() -> Arc<StepType> {
    StepType::builder("A")
        .member(MemberDescriptor::new("x", TypeDescriptor::Int, Value::Int(1)))
        .member(
            MemberDescriptor::new("gain", TypeDescriptor::Float, Value::Float(1.0))
                .group(&["Amplifier"]),
        )
        .build()
}

/// `B { x: int = 1 }`
pub fn type_b() -> Arc<StepType> {
    StepType::builder("B")
        .member(MemberDescriptor::new("x", TypeDescriptor::Int, Value::Int(1)))
        .build()
}

/// Opaque sub-plan reference carrying its own `x`
pub fn plan_ref_type() -> Arc<StepType> {
    StepType::builder("PlanRef")
        .opaque()
        .member(MemberDescriptor::new("x", TypeDescriptor::Int, Value::Int(1)))
        .build()
}

/// `Generator { shape: Waveform }`
pub fn generator_type() -> Arc<StepType> {
    StepType::builder("Generator")
        .member(MemberDescriptor::new(
            "shape",
            TypeDescriptor::Object(WAVEFORM.to_string()),
            Value::Object(ObjectRef::new(Waveform::new(vec![0.0]))),
        ))
        .build()
}

/// Mutable reference-typed object with a text form
#[derive(Debug)]
pub struct Waveform {
    points: RwLock<Vec<f64>>,
}

impl Waveform {
    pub fn new(points: Vec<f64>) -> Self {
        Self {
            points: RwLock::new(points),
        }
    }

    pub fn points(&self) -> Vec<f64> {
        self.points.read().clone()
    }

    pub fn push(&self, point: f64) {
        self.points.write().push(point);
    }

    pub fn parse(text: &str) -> Result<Self, String> {
        let points = text
            .split(';')
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().parse::<f64>().map_err(|e| format!("{s}: {e}")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(points))
    }
}

impl ObjectValue for Waveform {
    fn type_name(&self) -> &str {
        WAVEFORM
    }

    fn to_text(&self) -> Option<String> {
        let parts: Vec<String> = self.points.read().iter().map(ToString::to_string).collect();
        Some(parts.join(";"))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Waveform value from its points
pub fn waveform(points: &[f64]) -> Value {
    Value::Object(ObjectRef::new(Waveform::new(points.to_vec())))
}

/// Registry with every fixture type, the loop types and the waveform codec
pub fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new()
        .with_step_type(type_a())
        .with_step_type(type_b())
        .with_step_type(plan_ref_type())
        .with_step_type(generator_type())
        .with_codec(
            WAVEFORM,
            ObjectCodec::new().with_parse(|text| Waveform::parse(text).map(ObjectRef::new)),
        );
    for ty in loop_step_types() {
        registry.register_step_type(ty);
    }
    registry
}

pub fn cloner(tree: &StepTree) -> ValueCloner {
    ValueCloner::new(Arc::clone(tree.registry()))
}

/// Parameter sweep with children `a: A` and `b: B`
pub struct SweepFixture {
    pub tree: StepTree,
    pub sweep: StepId,
    pub a: StepId,
    pub b: StepId,
}

impl SweepFixture {
    /// Sweep with no axes
    pub fn new(mode: SweepMode) -> Self {
        let mut tree = StepTree::new(registry());
        let sweep = tree.add_root("sweep", ParameterSweep::new().with_mode(mode)).unwrap();
        let a = tree.add_child(sweep, "a", PropertyStep::new(type_a())).unwrap();
        let b = tree.add_child(sweep, "b", PropertyStep::new(type_b())).unwrap();
        Self { tree, sweep, a, b }
    }

    /// Sweep `x` of both children over `values`
    pub fn with_x(mode: SweepMode, values: &[i64]) -> Self {
        let mut fixture = Self::new(mode);
        let members = vec![
            type_a().get_member("x").unwrap(),
            type_b().get_member("x").unwrap(),
        ];
        fixture.add_axis(members, values.iter().copied().map(Value::Int).collect());
        fixture
    }

    pub fn add_axis(&mut self, members: Vec<sweep_core::Member>, values: Vec<Value>) {
        let cloner = cloner(&self.tree);
        let param = SweepParam::new(members).unwrap();
        let axis = param.name().to_string();
        let sweep = self.sweep_mut();
        sweep.add_param(param, &cloner).unwrap();
        sweep.set_series(&axis, values, &cloner).unwrap();
    }

    pub fn sweep(&self) -> &ParameterSweep {
        self.tree.step_as::<ParameterSweep>(self.sweep).unwrap()
    }

    pub fn sweep_mut(&mut self) -> &mut ParameterSweep {
        self.tree.step_as_mut::<ParameterSweep>(self.sweep).unwrap()
    }

    /// Current value of `member` on `step`
    pub fn read(&self, step: StepId, member: &str) -> Value {
        self.tree.step(step).unwrap().read_raw(member).unwrap()
    }
}

/// What a [`RecordingRunner`] saw for one sweep point
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub params: ResultParameters,
    /// `(child, value of the watched member)` per started child
    pub values: Vec<(StepId, Option<Value>)>,
}

/// Step runner that records member values and finishes children at once
pub struct RecordingRunner {
    member: String,
    calls: Mutex<Vec<Recorded>>,
    break_at: Option<usize>,
    cancel_at: Option<usize>,
    fail_at: Option<usize>,
    delay: Option<Duration>,
}

impl RecordingRunner {
    /// Record the value of `member` on every child
    pub fn new(member: &str) -> Self {
        Self {
            member: member.to_string(),
            calls: Mutex::new(Vec::new()),
            break_at: None,
            cancel_at: None,
            fail_at: None,
            delay: None,
        }
    }

    /// Children request a break on the `call`-th point (0-based)
    pub fn break_at(mut self, call: usize) -> Self {
        self.break_at = Some(call);
        self
    }

    /// Cancel the token while running the `call`-th point
    pub fn cancel_at(mut self, call: usize) -> Self {
        self.cancel_at = Some(call);
        self
    }

    /// Refuse to start children on the `call`-th point
    pub fn fail_at(mut self, call: usize) -> Self {
        self.fail_at = Some(call);
        self
    }

    /// Run every child on a tokio task that sleeps for `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().clone()
    }

    /// Watched member value of the first child, per point
    pub fn first_child_values(&self) -> Vec<Value> {
        self.calls
            .lock()
            .iter()
            .filter_map(|r| r.values.first().and_then(|(_, v)| v.clone()))
            .collect()
    }
}

#[async_trait]
impl StepRunner for RecordingRunner {
    async fn run_children(
        &self,
        tree: &StepTree,
        children: &[StepId],
        params: &ResultParameters,
        token: &CancellationToken,
    ) -> Result<Vec<Box<dyn RunHandle>>, RunError> {
        let call = {
            let mut calls = self.calls.lock();
            calls.push(Recorded {
                params: params.clone(),
                values: children
                    .iter()
                    .map(|&id| (id, tree.step(id).ok().and_then(|s| s.read_raw(&self.member))))
                    .collect(),
            });
            calls.len() - 1
        };
        if self.fail_at == Some(call) {
            return Err(RunError::Runner(format!("refused point {call}")));
        }
        if self.cancel_at == Some(call) {
            token.cancel();
        }
        let request_break = self.break_at == Some(call);
        let handles = children
            .iter()
            .map(|&id| {
                let mut outcome = RunOutcome::new(id, sweep_core::Verdict::Pass);
                if request_break {
                    outcome = outcome.with_break();
                }
                match self.delay {
                    Some(delay) => Box::new(JoinRunHandle::new(
                        id,
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            outcome
                        }),
                    )) as Box<dyn RunHandle>,
                    None => Box::new(ReadyHandle::new(outcome)) as Box<dyn RunHandle>,
                }
            })
            .collect();
        Ok(handles)
    }
}
