//! Step types and step instances
//!
//! A [`StepType`] is the registration table for one kind of test step: its
//! name, whether it is an opaque sub-plan reference, and its members.
//! Instances implement [`Step`]; [`PropertyStep`] is the data-driven
//! implementation used for ordinary steps.

use crate::error::MemberError;
use crate::member::{Member, MemberDescriptor};
use crate::sweep::SweepLoop;
use crate::tree::StepId;
use crate::value::Value;
use indexmap::IndexMap;
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

/// Registration table for a step type
#[derive(Debug)]
pub struct StepType {
    name: Arc<str>,
    opaque: bool,
    members: Vec<Arc<MemberDescriptor>>,
}

impl StepType {
    /// Start building a step type
    #[must_use]
    pub fn builder(name: &str) -> StepTypeBuilder {
        StepTypeBuilder {
            name: Arc::from(name),
            opaque: false,
            members: Vec::new(),
        }
    }

    /// Type name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opaque sub-plan references hide their children from member resolution
    #[inline]
    #[must_use]
    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    /// All declared members in declaration order
    pub fn members(&self) -> impl Iterator<Item = Member> + '_ {
        self.members
            .iter()
            .map(|d| Member::new(self.name.clone(), d.clone()))
    }

    /// Look up a member by name
    #[must_use]
    pub fn get_member(&self, name: &str) -> Option<Member> {
        self.members
            .iter()
            .find(|d| d.name() == name)
            .map(|d| Member::new(self.name.clone(), d.clone()))
    }
}

/// Builder for [`StepType`]
#[derive(Debug)]
pub struct StepTypeBuilder {
    name: Arc<str>,
    opaque: bool,
    members: Vec<Arc<MemberDescriptor>>,
}

impl StepTypeBuilder {
    /// Declare a member
    #[must_use]
    pub fn member(mut self, descriptor: MemberDescriptor) -> Self {
        self.members.push(Arc::new(descriptor));
        self
    }

    /// Mark the type as an opaque sub-plan reference
    #[must_use]
    pub fn opaque(mut self) -> Self {
        self.opaque = true;
        self
    }

    /// Finish
    #[must_use]
    pub fn build(self) -> Arc<StepType> {
        Arc::new(StepType {
            name: self.name,
            opaque: self.opaque,
            members: self.members,
        })
    }
}

/// A test step instance
///
/// Members are accessed through [`Member::get`] and [`Member::set`], which
/// check access and types before delegating to `read_raw` / `write_raw`.
pub trait Step: Send + Sync + Debug {
    /// Registration table of this step's type
    fn step_type(&self) -> &Arc<StepType>;

    /// Read a member value without access checks
    fn read_raw(&self, member: &str) -> Option<Value>;

    /// Write a member value without access checks
    ///
    /// # Errors
    /// Returns [`MemberError`] if the step cannot hold the value.
    fn write_raw(&mut self, member: &str, value: Value) -> Result<(), MemberError>;

    /// Called when the step is placed in a tree
    fn attached(&mut self, _id: StepId) {}

    /// Sweep loop view, for steps that drive sweeps
    fn as_sweep_loop(&self) -> Option<&dyn SweepLoop> {
        None
    }

    /// Mutable sweep loop view
    fn as_sweep_loop_mut(&mut self) -> Option<&mut dyn SweepLoop> {
        None
    }

    /// Downcast support
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Step backed by a property map initialised from member defaults
#[derive(Debug, Clone)]
pub struct PropertyStep {
    step_type: Arc<StepType>,
    values: IndexMap<String, Value>,
}

impl PropertyStep {
    /// Create an instance with default member values
    #[must_use]
    pub fn new(step_type: Arc<StepType>) -> Self {
        let values = step_type
            .members()
            .map(|m| (m.name().to_string(), m.default_value().clone()))
            .collect();
        Self { step_type, values }
    }

    /// Builder-style raw assignment, bypassing access checks
    ///
    /// Unknown member names are ignored.
    #[must_use]
    pub fn with(mut self, member: &str, value: Value) -> Self {
        if let Some(slot) = self.values.get_mut(member) {
            *slot = value;
        }
        self
    }
}

impl Step for PropertyStep {
    fn step_type(&self) -> &Arc<StepType> {
        &self.step_type
    }

    fn read_raw(&self, member: &str) -> Option<Value> {
        self.values.get(member).cloned()
    }

    fn write_raw(&mut self, member: &str, value: Value) -> Result<(), MemberError> {
        match self.values.get_mut(member) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(MemberError::Missing {
                member: crate::member::MemberRef::new(self.step_type.name(), member),
            }),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
