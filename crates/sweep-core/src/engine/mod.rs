//! Sweep execution engine
//!
//! Every loop kind is executed the same way: validate and build a plan of
//! sweep points, snapshot the targeted members, then for each point apply
//! its values, run the enabled children through the [`StepRunner`] and wait
//! for them. Within-run, range and table executions restore the snapshot at
//! the end, even when the runner fails; across-runs executions do not.

mod across;
mod apply;
mod cancel;
mod range;
mod runner;
mod state;
mod table;
mod within;

pub use apply::{apply_assignment, ApplyFailure, ApplyReport, Assignment, Snapshot};
pub use cancel::CancellationToken;
pub use runner::{
    wait_all, JoinRunHandle, ReadyHandle, ResultParameter, ResultParameters, RunHandle, RunOutcome,
    StepRunner, Verdict,
};
pub use state::{allowed_transitions, validate_transition, LoopState, LoopStateMachine};

use crate::clone::ValueCloner;
use crate::config::SweepConfig;
use crate::error::SweepError;
use crate::sweep::{ParameterSweep, SweepEvent, SweepKind, SweepMode};
use crate::tree::{StepId, StepTree};
use crate::value::Value;
use std::sync::Arc;

/// Result parameter carrying the point index
pub const ITERATION_PARAMETER: &str = "Iteration";

/// One sweep point of a plan
#[derive(Debug, Clone)]
pub(crate) struct PlannedPoint {
    pub(crate) index: usize,
    pub(crate) assignments: Vec<Assignment>,
}

/// Everything an execution needs, computed before the first point
#[derive(Debug, Clone)]
pub(crate) struct Plan {
    pub(crate) points: Vec<PlannedPoint>,
    pub(crate) restore: bool,
}

impl Plan {
    fn targets(&self) -> impl Iterator<Item = &crate::resolver::MemberInstance> {
        self.points
            .iter()
            .flat_map(|p| p.assignments.iter())
            .flat_map(|a| a.targets.iter())
    }
}

/// Children outcomes of one sweep point
#[derive(Debug, Clone, PartialEq)]
pub struct IterationOutcome {
    /// Sweep point
    pub index: usize,
    /// Result parameters handed to the runner
    pub params: ResultParameters,
    /// One outcome per started child
    pub children: Vec<RunOutcome>,
}

/// Report of one loop execution
#[derive(Debug, Clone, PartialEq)]
pub struct SweepSummary {
    /// Loop executed
    pub loop_id: StepId,
    /// Loop kind
    pub kind: SweepKind,
    /// Points processed, in order
    pub indices: Vec<usize>,
    /// Stopped because the token was cancelled
    pub cancelled: bool,
    /// Stopped because a child requested a break
    pub break_requested: bool,
    /// Failures while applying points
    pub apply: ApplyReport,
    /// Failures while restoring the snapshot
    pub restore: ApplyReport,
    /// Per-point child outcomes
    pub iterations: Vec<IterationOutcome>,
}

impl SweepSummary {
    fn new(loop_id: StepId, kind: SweepKind) -> Self {
        Self {
            loop_id,
            kind,
            indices: Vec::new(),
            cancelled: false,
            break_requested: false,
            apply: ApplyReport::new(),
            restore: ApplyReport::new(),
            iterations: Vec::new(),
        }
    }

    /// Number of points processed
    #[inline]
    #[must_use]
    pub fn iteration_count(&self) -> usize {
        self.indices.len()
    }

    /// Whether the execution stopped before its last point
    #[inline]
    #[must_use]
    pub fn stopped_early(&self) -> bool {
        self.cancelled || self.break_requested
    }

    /// Most severe verdict of any child
    #[must_use]
    pub fn worst_verdict(&self) -> Verdict {
        self.iterations
            .iter()
            .flat_map(|i| i.children.iter())
            .map(|c| c.verdict)
            .max()
            .unwrap_or_default()
    }
}

/// Executes sweep loops
#[derive(Debug, Clone, Default)]
pub struct SweepEngine {
    config: SweepConfig,
}

impl SweepEngine {
    /// Engine with `config`
    #[inline]
    #[must_use]
    pub fn new(config: SweepConfig) -> Self {
        Self { config }
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Execute the loop at `loop_id` according to its kind and mode
    ///
    /// # Errors
    /// Returns [`SweepError`] if `loop_id` is not a loop, validation fails,
    /// or the runner fails.
    pub async fn run(
        &self,
        tree: &mut StepTree,
        loop_id: StepId,
        runner: &dyn StepRunner,
        token: &CancellationToken,
    ) -> Result<SweepSummary, SweepError> {
        match tree.sweep_loop(loop_id)?.kind() {
            SweepKind::Parameters => match tree.step_as::<ParameterSweep>(loop_id)?.mode() {
                SweepMode::WithinRun => self.run_within(tree, loop_id, runner, token).await,
                SweepMode::AcrossRuns => self.run_across(tree, loop_id, runner, token).await,
            },
            SweepKind::Table => self.run_table(tree, loop_id, runner, token).await,
            SweepKind::Range => self.run_range(tree, loop_id, runner, token).await,
        }
    }

    /// Run every enabled point of a parameter sweep, then restore
    ///
    /// # Errors
    /// See [`Self::run`].
    pub async fn run_within(
        &self,
        tree: &mut StepTree,
        loop_id: StepId,
        runner: &dyn StepRunner,
        token: &CancellationToken,
    ) -> Result<SweepSummary, SweepError> {
        self.execute(tree, loop_id, SweepKind::Parameters, within::plan, runner, token)
            .await
    }

    /// Run the next enabled point of a parameter sweep and advance its cursor
    ///
    /// # Errors
    /// See [`Self::run`].
    pub async fn run_across(
        &self,
        tree: &mut StepTree,
        loop_id: StepId,
        runner: &dyn StepRunner,
        token: &CancellationToken,
    ) -> Result<SweepSummary, SweepError> {
        let summary = self
            .execute(tree, loop_id, SweepKind::Parameters, across::plan, runner, token)
            .await?;
        if let Some(index) = summary.indices.last() {
            tree.step_as_mut::<ParameterSweep>(loop_id)?
                .set_cursor(Some(*index));
        }
        Ok(summary)
    }

    /// Run every value of a range sweep, then restore
    ///
    /// # Errors
    /// See [`Self::run`].
    pub async fn run_range(
        &self,
        tree: &mut StepTree,
        loop_id: StepId,
        runner: &dyn StepRunner,
        token: &CancellationToken,
    ) -> Result<SweepSummary, SweepError> {
        self.execute(tree, loop_id, SweepKind::Range, range::plan, runner, token)
            .await
    }

    /// Run every enabled row of a table sweep, then restore
    ///
    /// # Errors
    /// See [`Self::run`].
    pub async fn run_table(
        &self,
        tree: &mut StepTree,
        loop_id: StepId,
        runner: &dyn StepRunner,
        token: &CancellationToken,
    ) -> Result<SweepSummary, SweepError> {
        self.execute(tree, loop_id, SweepKind::Table, table::plan, runner, token)
            .await
    }

    fn cloner(&self, tree: &StepTree) -> ValueCloner {
        self.config.cloner(Arc::clone(tree.registry()))
    }

    async fn execute(
        &self,
        tree: &mut StepTree,
        loop_id: StepId,
        kind: SweepKind,
        build: fn(&StepTree, StepId, &ValueCloner) -> Result<Plan, SweepError>,
        runner: &dyn StepRunner,
        token: &CancellationToken,
    ) -> Result<SweepSummary, SweepError> {
        let cloner = self.cloner(tree);
        let mut machine = LoopStateMachine::new();

        machine.transition(LoopState::Validating)?;
        let plan = match build(tree, loop_id, &cloner) {
            Ok(plan) => plan,
            Err(err) => {
                tracing::warn!(step = %loop_id, %kind, error = %err, "sweep validation failed");
                machine.transition(LoopState::Idle)?;
                return Err(err);
            }
        };
        let snapshot = if plan.restore {
            Snapshot::capture(tree, plan.targets())
        } else {
            Snapshot::default()
        };
        tracing::info!(
            step = %loop_id,
            %kind,
            points = plan.points.len(),
            targets = snapshot.len(),
            "sweep started"
        );

        machine.transition(LoopState::Iterating)?;
        let mut summary = SweepSummary::new(loop_id, kind);
        let outcome = self
            .iterate(tree, loop_id, &plan, &cloner, runner, token, &mut summary)
            .await;

        if plan.restore {
            machine.transition(LoopState::Restoring)?;
            summary.restore = snapshot.restore(tree);
            if let Ok(sweep) = tree.sweep_loop(loop_id) {
                sweep.notifier().notify(SweepEvent::ValuesChanged);
            }
        }
        machine.transition(LoopState::Idle)?;

        match outcome {
            Ok(()) => {
                tracing::info!(
                    step = %loop_id,
                    %kind,
                    iterations = summary.iteration_count(),
                    cancelled = summary.cancelled,
                    break_requested = summary.break_requested,
                    apply_failures = summary.apply.failures().len(),
                    "sweep finished"
                );
                Ok(summary)
            }
            Err(err) => {
                tracing::error!(step = %loop_id, %kind, error = %err, "sweep aborted by step runner");
                Err(err)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn iterate(
        &self,
        tree: &mut StepTree,
        loop_id: StepId,
        plan: &Plan,
        cloner: &ValueCloner,
        runner: &dyn StepRunner,
        token: &CancellationToken,
        summary: &mut SweepSummary,
    ) -> Result<(), SweepError> {
        for point in &plan.points {
            if token.is_cancelled() {
                tracing::info!(step = %loop_id, index = point.index, "sweep cancelled before point");
                summary.cancelled = true;
                break;
            }

            let mut report = ApplyReport::new();
            for assignment in &point.assignments {
                apply_assignment(tree, assignment, Some(point.index), cloner, &mut report);
            }
            summary.apply.merge(report);

            let params = self.result_parameters(point);
            let children = tree.enabled_children(loop_id);
            tracing::debug!(step = %loop_id, index = point.index, children = children.len(), "running sweep point");
            let handles = runner.run_children(tree, &children, &params, token).await?;
            let outcomes = wait_all(handles, self.config.child_wait_timeout()).await?;

            let break_requested = outcomes.iter().any(|o| o.break_requested);
            summary.indices.push(point.index);
            summary.iterations.push(IterationOutcome {
                index: point.index,
                params,
                children: outcomes,
            });
            if break_requested {
                tracing::info!(step = %loop_id, index = point.index, "child requested break");
                summary.break_requested = true;
                break;
            }
        }
        Ok(())
    }

    fn result_parameters(&self, point: &PlannedPoint) -> ResultParameters {
        let group = &self.config.result_group;
        let mut params = ResultParameters::new();
        for assignment in &point.assignments {
            params.push(group.clone(), assignment.axis.clone(), assignment.value.clone());
        }
        params.push(
            group.clone(),
            ITERATION_PARAMETER,
            Value::Int(i64::try_from(point.index).unwrap_or(i64::MAX)),
        );
        params
    }
}
