//! Loop state machine
//!
//! `Idle -> Validating -> Iterating -> Restoring -> Idle`. Failed validation
//! returns straight to `Idle`; across-runs executions skip `Restoring`.

use crate::error::StateError;

/// Lifecycle of one loop execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoopState {
    /// Not running
    #[default]
    Idle,
    /// Pre-run checks
    Validating,
    /// Applying points and running children
    Iterating,
    /// Writing snapshots back
    Restoring,
}

/// Validate a state transition
///
/// # Errors
/// Returns [`StateError::IllegalTransition`] if `to` is not reachable from
/// `from`.
pub fn validate_transition(from: LoopState, to: LoopState) -> Result<(), StateError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(StateError::IllegalTransition { from, to })
    }
}

/// States reachable from `from`
#[must_use]
pub fn allowed_transitions(from: LoopState) -> &'static [LoopState] {
    use LoopState::{Idle, Iterating, Restoring, Validating};
    match from {
        Idle => &[Validating],
        Validating => &[Iterating, Idle],
        Iterating => &[Restoring, Idle],
        Restoring => &[Idle],
    }
}

/// Tracks the state of one execution
#[derive(Debug, Default)]
pub struct LoopStateMachine {
    state: LoopState,
}

impl LoopStateMachine {
    /// Machine in [`LoopState::Idle`]
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Move to `to`
    ///
    /// # Errors
    /// Returns [`StateError`] if the transition is not allowed; the state is
    /// unchanged.
    pub fn transition(&mut self, to: LoopState) -> Result<(), StateError> {
        validate_transition(self.state, to)?;
        tracing::trace!(from = ?self.state, ?to, "loop state transition");
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_state() -> impl Strategy<Value = LoopState> {
        prop_oneof![
            Just(LoopState::Idle),
            Just(LoopState::Validating),
            Just(LoopState::Iterating),
            Just(LoopState::Restoring),
        ]
    }

    #[test]
    fn full_cycle() {
        let mut machine = LoopStateMachine::new();
        for to in [
            LoopState::Validating,
            LoopState::Iterating,
            LoopState::Restoring,
            LoopState::Idle,
        ] {
            machine.transition(to).unwrap();
        }
        assert_eq!(machine.state(), LoopState::Idle);
    }

    #[test]
    fn cannot_skip_validation() {
        let mut machine = LoopStateMachine::new();
        assert_eq!(
            machine.transition(LoopState::Iterating),
            Err(StateError::IllegalTransition {
                from: LoopState::Idle,
                to: LoopState::Iterating
            })
        );
        assert_eq!(machine.state(), LoopState::Idle);
    }

    proptest! {
        #[test]
        fn machine_only_takes_allowed_steps(steps in prop::collection::vec(any_state(), 0..30)) {
            let mut machine = LoopStateMachine::new();
            for to in steps {
                let from = machine.state();
                let allowed = allowed_transitions(from).contains(&to);
                prop_assert_eq!(machine.transition(to).is_ok(), allowed);
                prop_assert_eq!(machine.state(), if allowed { to } else { from });
            }
        }
    }
}
