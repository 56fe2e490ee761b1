//! Arena-backed step tree
//!
//! Every step lives in one [`StepTree`] and is addressed by a stable
//! [`StepId`]. Parents, children and sweep-row owners refer to each other by
//! id, so the tree holds no reference cycles.

use crate::error::TreeError;
use crate::registry::TypeRegistry;
use crate::step::Step;
use crate::sweep::SweepLoop;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Stable index of a step in its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StepId(pub u32);

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One slot of the arena
#[derive(Debug)]
pub struct StepNode {
    id: StepId,
    name: String,
    enabled: bool,
    parent: Option<StepId>,
    children: Vec<StepId>,
    step: Box<dyn Step>,
}

impl StepNode {
    /// Node id
    #[inline]
    #[must_use]
    pub fn id(&self) -> StepId {
        self.id
    }

    /// User-facing step name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the step takes part in execution
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Parent id, `None` for roots
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<StepId> {
        self.parent
    }

    /// Child ids in execution order
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[StepId] {
        &self.children
    }

    /// Step instance
    #[inline]
    #[must_use]
    pub fn step(&self) -> &dyn Step {
        self.step.as_ref()
    }

    /// Mutable step instance
    #[inline]
    pub fn step_mut(&mut self) -> &mut dyn Step {
        self.step.as_mut()
    }
}

/// Arena of steps plus the type registry they were built from
#[derive(Debug)]
pub struct StepTree {
    nodes: Vec<Option<StepNode>>,
    roots: Vec<StepId>,
    registry: Arc<TypeRegistry>,
}

impl StepTree {
    /// Empty tree over `registry`
    #[must_use]
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            registry: Arc::new(registry),
        }
    }

    /// Type registry shared by all steps
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Top-level steps
    #[inline]
    #[must_use]
    pub fn roots(&self) -> &[StepId] {
        &self.roots
    }

    /// Add a top-level step
    ///
    /// # Errors
    /// Returns [`TreeError::Full`] if no step id is left.
    pub fn add_root(&mut self, name: impl Into<String>, step: impl Step + 'static) -> Result<StepId, TreeError> {
        let id = self.insert(name.into(), None, Box::new(step))?;
        self.roots.push(id);
        Ok(id)
    }

    /// Add a step as the last child of `parent`
    ///
    /// # Errors
    /// Returns [`TreeError::UnknownStep`] if `parent` is not in the tree.
    pub fn add_child(
        &mut self,
        parent: StepId,
        name: impl Into<String>,
        step: impl Step + 'static,
    ) -> Result<StepId, TreeError> {
        self.add_boxed_child(parent, name, Box::new(step))
    }

    /// Add an already boxed step as the last child of `parent`
    ///
    /// # Errors
    /// Returns [`TreeError::UnknownStep`] if `parent` is not in the tree and
    /// [`TreeError::Full`] if no step id is left.
    pub fn add_boxed_child(
        &mut self,
        parent: StepId,
        name: impl Into<String>,
        step: Box<dyn Step>,
    ) -> Result<StepId, TreeError> {
        self.node(parent)?;
        let id = self.insert(name.into(), Some(parent), step)?;
        if let Some(node) = self.slot_mut(parent) {
            node.children.push(id);
        }
        Ok(id)
    }

    fn insert(&mut self, name: String, parent: Option<StepId>, mut step: Box<dyn Step>) -> Result<StepId, TreeError> {
        let id = next_id(self.nodes.len())?;
        step.attached(id);
        self.nodes.push(Some(StepNode {
            id,
            name,
            enabled: true,
            parent,
            children: Vec::new(),
            step,
        }));
        Ok(id)
    }

    /// Remove a step and its whole subtree
    ///
    /// # Errors
    /// Returns [`TreeError::UnknownStep`] if `id` is not in the tree.
    pub fn remove(&mut self, id: StepId) -> Result<(), TreeError> {
        let parent = self.node(id)?.parent;
        match parent {
            Some(parent) => {
                if let Some(node) = self.slot_mut(parent) {
                    node.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(current.0 as usize).and_then(Option::take) {
                stack.extend(node.children);
            }
        }
        Ok(())
    }

    /// Whether `id` is a live step
    #[inline]
    #[must_use]
    pub fn contains(&self, id: StepId) -> bool {
        self.get(id).is_some()
    }

    /// Look up a node
    #[inline]
    #[must_use]
    pub fn get(&self, id: StepId) -> Option<&StepNode> {
        self.nodes.get(id.0 as usize).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, id: StepId) -> Option<&mut StepNode> {
        self.nodes.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    /// Look up a node
    ///
    /// # Errors
    /// Returns [`TreeError::UnknownStep`] if `id` is not in the tree.
    pub fn node(&self, id: StepId) -> Result<&StepNode, TreeError> {
        self.get(id).ok_or(TreeError::UnknownStep(id))
    }

    /// Look up a node mutably
    ///
    /// # Errors
    /// Returns [`TreeError::UnknownStep`] if `id` is not in the tree.
    pub fn node_mut(&mut self, id: StepId) -> Result<&mut StepNode, TreeError> {
        self.slot_mut(id).ok_or(TreeError::UnknownStep(id))
    }

    /// Step instance of `id`
    ///
    /// # Errors
    /// Returns [`TreeError::UnknownStep`] if `id` is not in the tree.
    pub fn step(&self, id: StepId) -> Result<&dyn Step, TreeError> {
        Ok(self.node(id)?.step())
    }

    /// Mutable step instance of `id`
    ///
    /// # Errors
    /// Returns [`TreeError::UnknownStep`] if `id` is not in the tree.
    pub fn step_mut(&mut self, id: StepId) -> Result<&mut dyn Step, TreeError> {
        Ok(self.node_mut(id)?.step_mut())
    }

    /// Downcast the step at `id`
    ///
    /// # Errors
    /// Returns [`TreeError`] if `id` is unknown or not a `T`.
    pub fn step_as<T: Step + 'static>(&self, id: StepId) -> Result<&T, TreeError> {
        self.step(id)?
            .as_any()
            .downcast_ref::<T>()
            .ok_or(TreeError::WrongStepType {
                step: id,
                expected: std::any::type_name::<T>(),
            })
    }

    /// Mutably downcast the step at `id`
    ///
    /// # Errors
    /// Returns [`TreeError`] if `id` is unknown or not a `T`.
    pub fn step_as_mut<T: Step + 'static>(&mut self, id: StepId) -> Result<&mut T, TreeError> {
        self.step_mut(id)?
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or(TreeError::WrongStepType {
                step: id,
                expected: std::any::type_name::<T>(),
            })
    }

    /// Sweep loop view of the step at `id`
    ///
    /// # Errors
    /// Returns [`TreeError::NotASweep`] if the step does not drive a sweep.
    pub fn sweep_loop(&self, id: StepId) -> Result<&dyn SweepLoop, TreeError> {
        self.step(id)?.as_sweep_loop().ok_or(TreeError::NotASweep(id))
    }

    /// Mutable sweep loop view of the step at `id`
    ///
    /// # Errors
    /// Returns [`TreeError::NotASweep`] if the step does not drive a sweep.
    pub fn sweep_loop_mut(&mut self, id: StepId) -> Result<&mut dyn SweepLoop, TreeError> {
        self.step_mut(id)?
            .as_sweep_loop_mut()
            .ok_or(TreeError::NotASweep(id))
    }

    /// Children of `id`, empty for unknown ids
    #[must_use]
    pub fn children(&self, id: StepId) -> &[StepId] {
        match self.get(id) {
            Some(node) => &node.children,
            None => &[],
        }
    }

    /// Enabled children of `id` in execution order
    #[must_use]
    pub fn enabled_children(&self, id: StepId) -> Vec<StepId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.get(*c).is_some_and(StepNode::is_enabled))
            .collect()
    }

    /// Enable or disable a step
    ///
    /// # Errors
    /// Returns [`TreeError::UnknownStep`] if `id` is not in the tree.
    pub fn set_enabled(&mut self, id: StepId, enabled: bool) -> Result<(), TreeError> {
        self.node_mut(id)?.enabled = enabled;
        Ok(())
    }

    /// Descendants of `root` in pre-order, excluding `root` itself
    ///
    /// Opaque sub-plan references are listed but their children are not.
    #[must_use]
    pub fn descendants(&self, root: StepId) -> Vec<StepId> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(root);
        for child in self.children(root) {
            self.collect_descendants(*child, &mut visited, &mut out);
        }
        out
    }

    fn collect_descendants(&self, id: StepId, visited: &mut HashSet<StepId>, out: &mut Vec<StepId>) {
        if !visited.insert(id) {
            return;
        }
        let Some(node) = self.get(id) else {
            return;
        };
        out.push(id);
        if node.step().step_type().is_opaque() {
            return;
        }
        for child in &node.children {
            self.collect_descendants(*child, visited, out);
        }
    }

    /// Steps that drive sweeps, anywhere in the tree, in pre-order
    #[must_use]
    pub fn sweep_loops(&self) -> Vec<StepId> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        for root in &self.roots {
            self.collect_descendants(*root, &mut visited, &mut out);
        }
        out.retain(|id| self.sweep_loop(*id).is_ok());
        out
    }

    /// Number of live steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Whether the tree has no steps
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn next_id(len: usize) -> Result<StepId, TreeError> {
    u32::try_from(len).map(StepId).map_err(|_| TreeError::Full(len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::MemberDescriptor;
    use crate::step::{PropertyStep, StepType};
    use crate::types::TypeDescriptor;
    use crate::value::Value;

    fn plain() -> PropertyStep {
        PropertyStep::new(
            StepType::builder("Plain")
                .member(MemberDescriptor::new("x", TypeDescriptor::Int, Value::Int(1)))
                .build(),
        )
    }

    fn opaque() -> PropertyStep {
        PropertyStep::new(StepType::builder("PlanRef").opaque().build())
    }

    #[test]
    fn descendants_skip_opaque_interior() {
        let mut tree = StepTree::new(TypeRegistry::new());
        let root = tree.add_root("root", plain()).unwrap();
        let a = tree.add_child(root, "a", plain()).unwrap();
        let r = tree.add_child(root, "ref", opaque()).unwrap();
        let hidden = tree.add_child(r, "hidden", plain()).unwrap();
        let b = tree.add_child(a, "b", plain()).unwrap();

        let found = tree.descendants(root);
        assert_eq!(found, vec![a, b, r]);
        assert!(!found.contains(&hidden));
    }

    #[test]
    fn remove_drops_subtree() {
        let mut tree = StepTree::new(TypeRegistry::new());
        let root = tree.add_root("root", plain()).unwrap();
        let a = tree.add_child(root, "a", plain()).unwrap();
        let b = tree.add_child(a, "b", plain()).unwrap();
        tree.remove(a).unwrap();
        assert!(!tree.contains(a));
        assert!(!tree.contains(b));
        assert!(tree.children(root).is_empty());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn enabled_children_filters_disabled() {
        let mut tree = StepTree::new(TypeRegistry::new());
        let root = tree.add_root("root", plain()).unwrap();
        let a = tree.add_child(root, "a", plain()).unwrap();
        let b = tree.add_child(root, "b", plain()).unwrap();
        tree.set_enabled(a, false).unwrap();
        assert_eq!(tree.enabled_children(root), vec![b]);
    }

    #[test]
    fn unknown_parent_is_error() {
        let mut tree = StepTree::new(TypeRegistry::new());
        let err = tree.add_child(StepId(7), "x", plain()).unwrap_err();
        assert_eq!(err, TreeError::UnknownStep(StepId(7)));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn ids_never_wrap() {
        let last = u32::MAX as usize;
        assert_eq!(next_id(last), Ok(StepId(u32::MAX)));
        assert_eq!(next_id(last + 1), Err(TreeError::Full(last + 1)));
    }

    #[test]
    fn downcast_and_not_a_sweep() {
        let mut tree = StepTree::new(TypeRegistry::new());
        let root = tree.add_root("root", plain()).unwrap();
        assert!(tree.step_as::<PropertyStep>(root).is_ok());
        assert_eq!(tree.sweep_loop(root).unwrap_err(), TreeError::NotASweep(root));
    }
}
