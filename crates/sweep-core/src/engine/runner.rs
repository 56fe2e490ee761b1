//! Step-execution collaborator interface
//!
//! The engine never runs steps itself. For every sweep point it hands the
//! enabled children, the result parameters of the point and the
//! cancellation token to a [`StepRunner`], then waits on the returned
//! [`RunHandle`]s.

use super::CancellationToken;
use crate::error::RunError;
use crate::tree::{StepId, StepTree};
use crate::value::Value;
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Verdict of one child run, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Verdict {
    /// No verdict set
    #[default]
    NotSet,
    /// Passed
    Pass,
    /// Result could not be decided
    Inconclusive,
    /// Failed
    Fail,
    /// Stopped before completion
    Aborted,
    /// Step raised an error
    Error,
}

/// Result of one child run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Child step
    pub step: StepId,
    /// Verdict
    pub verdict: Verdict,
    /// Child asked the enclosing loop to stop after this point
    pub break_requested: bool,
}

impl RunOutcome {
    /// Outcome without a break request
    #[inline]
    #[must_use]
    pub fn new(step: StepId, verdict: Verdict) -> Self {
        Self {
            step,
            verdict,
            break_requested: false,
        }
    }

    /// Builder-style break request
    #[inline]
    #[must_use]
    pub fn with_break(mut self) -> Self {
        self.break_requested = true;
        self
    }
}

/// Value attached to the results of one sweep point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultParameter {
    /// Display group
    pub group: String,
    /// Axis name
    pub name: String,
    /// Value for this point
    pub value: Value,
}

/// Result parameters of one sweep point, unique by `(group, name)`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultParameters(Vec<ResultParameter>);

impl ResultParameters {
    /// Empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter; an existing `(group, name)` keeps its first value
    pub fn push(&mut self, group: impl Into<String>, name: impl Into<String>, value: Value) {
        let group = group.into();
        let name = name.into();
        if self.0.iter().any(|p| p.group == group && p.name == name) {
            return;
        }
        self.0.push(ResultParameter { group, name, value });
    }

    /// Value of `name` in any group
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    /// Parameters in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, ResultParameter> {
        self.0.iter()
    }

    /// Number of parameters
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Handle to one started child run
#[async_trait]
pub trait RunHandle: Send {
    /// Child step
    fn step(&self) -> StepId;

    /// Wait until the child run completes
    ///
    /// # Errors
    /// Returns [`RunError`] if the run failed outside of its verdict.
    async fn wait_for_completion(&mut self) -> Result<RunOutcome, RunError>;
}

/// Runs the children of a loop for one sweep point
#[async_trait]
pub trait StepRunner: Send + Sync {
    /// Start `children` and return one handle per started child
    ///
    /// # Errors
    /// Returns [`RunError`] if the children cannot be started; the engine
    /// restores member values and propagates the error.
    async fn run_children(
        &self,
        tree: &StepTree,
        children: &[StepId],
        params: &ResultParameters,
        token: &CancellationToken,
    ) -> Result<Vec<Box<dyn RunHandle>>, RunError>;
}

/// Handle for a run that already completed
#[derive(Debug, Clone)]
pub struct ReadyHandle(RunOutcome);

impl ReadyHandle {
    /// Wrap a finished outcome
    #[inline]
    #[must_use]
    pub fn new(outcome: RunOutcome) -> Self {
        Self(outcome)
    }
}

#[async_trait]
impl RunHandle for ReadyHandle {
    fn step(&self) -> StepId {
        self.0.step
    }

    async fn wait_for_completion(&mut self) -> Result<RunOutcome, RunError> {
        Ok(self.0.clone())
    }
}

/// Handle for a run executing on a tokio task
#[derive(Debug)]
pub struct JoinRunHandle {
    step: StepId,
    task: Option<JoinHandle<RunOutcome>>,
    finished: Option<RunOutcome>,
}

impl JoinRunHandle {
    /// Track `task` as the run of `step`
    #[must_use]
    pub fn new(step: StepId, task: JoinHandle<RunOutcome>) -> Self {
        Self {
            step,
            task: Some(task),
            finished: None,
        }
    }
}

#[async_trait]
impl RunHandle for JoinRunHandle {
    fn step(&self) -> StepId {
        self.step
    }

    async fn wait_for_completion(&mut self) -> Result<RunOutcome, RunError> {
        if let Some(task) = self.task.take() {
            let outcome = task.await.map_err(|e| RunError::Aborted {
                step: self.step,
                reason: e.to_string(),
            })?;
            self.finished = Some(outcome);
        }
        self.finished.clone().ok_or(RunError::Aborted {
            step: self.step,
            reason: "run handle already failed".into(),
        })
    }
}

/// Wait for every handle, each bounded by `timeout` when set
///
/// All handles are awaited concurrently; the first failure in handle order
/// is returned.
///
/// # Errors
/// Returns [`RunError::Timeout`] if a child overruns the timeout, or the
/// handle's own error.
pub async fn wait_all(
    handles: Vec<Box<dyn RunHandle>>,
    timeout: Option<Duration>,
) -> Result<Vec<RunOutcome>, RunError> {
    let waits = handles.into_iter().map(|mut handle| async move {
        let step = handle.step();
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, handle.wait_for_completion()).await {
                Ok(result) => result,
                Err(_) => Err(RunError::Timeout {
                    step,
                    after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                }),
            },
            None => handle.wait_for_completion().await,
        }
    });
    join_all(waits).await.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_parameters_keep_first() {
        let mut params = ResultParameters::new();
        params.push("Sweep", "x", Value::Int(1));
        params.push("Sweep", "x", Value::Int(2));
        params.push("Other", "x", Value::Int(3));
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn verdict_severity_order() {
        assert!(Verdict::Fail > Verdict::Pass);
        assert!(Verdict::Error > Verdict::Aborted);
    }

    #[tokio::test]
    async fn join_handles_complete() {
        let task = tokio::spawn(async { RunOutcome::new(StepId(1), Verdict::Pass) });
        let handles: Vec<Box<dyn RunHandle>> = vec![
            Box::new(JoinRunHandle::new(StepId(1), task)),
            Box::new(ReadyHandle::new(RunOutcome::new(StepId(2), Verdict::Fail).with_break())),
        ];
        let outcomes = wait_all(handles, None).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].verdict, Verdict::Pass);
        assert!(outcomes[1].break_requested);
    }

    #[tokio::test]
    async fn slow_child_times_out() {
        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            RunOutcome::new(StepId(4), Verdict::Pass)
        });
        let handles: Vec<Box<dyn RunHandle>> = vec![Box::new(JoinRunHandle::new(StepId(4), task))];
        let err = wait_all(handles, Some(Duration::from_millis(10)))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RunError::Timeout {
                step: StepId(4),
                after_ms: 10
            }
        );
    }
}
