//! Sweep Core - parameter sweeps over test-step trees
//!
//! Loop steps re-run their children once per sweep point, writing a value
//! into every member the point controls first:
//! - Parses and resolves sweepable members across heterogeneous step types
//! - Stores value series as columns ([`ParameterSweep`]) or rows ([`TableSweep`])
//! - Computes numeric ranges ([`RangeSweep`])
//! - Applies, runs and restores through [`SweepEngine`]
//! - Offers editing projections in [`annotation`] and table import in [`import`]
//!
//! # Example
//!
//! ```rust,ignore
//! use sweep_core::prelude::*;
//!
//! # async fn example(tree: &mut StepTree, sweep: StepId, runner: &dyn StepRunner) -> SweepResult<()> {
//! let engine = SweepEngine::new(SweepConfig::default());
//! let summary = engine.run(tree, sweep, runner, &CancellationToken::new()).await?;
//!
//! println!("Ran {} points", summary.iteration_count());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

// Model
pub mod clone;
pub mod member;
pub mod param;
pub mod registry;
pub mod resolver;
pub mod row;
pub mod step;
pub mod sweep;
pub mod tree;
pub mod types;
pub mod value;

// Execution and editing
pub mod annotation;
pub mod engine;
pub mod import;
pub mod persist;

// Ambient
pub mod config;
pub mod error;
pub mod telemetry;

// Re-exports for convenience
pub use clone::{CloneOutcome, Cloned, ValueCloner};
pub use config::SweepConfig;
pub use engine::{
    CancellationToken, IterationOutcome, ResultParameters, RunHandle, RunOutcome, StepRunner,
    SweepEngine, SweepSummary, Verdict,
};
pub use error::{
    ApplyError, CloneError, ConfigError, ConstructionError, ImportError, MemberError, ParamError,
    RowError, RunError, StateError, SweepError, SweepResult, TreeError, ValidationError,
};
pub use member::{EquivalenceKey, Member, MemberDescriptor, MemberRef, GROUP_SEPARATOR};
pub use param::SweepParam;
pub use registry::{ObjectCodec, TypeRegistry};
pub use row::{SweepRow, SweepRowCollection};
pub use step::{PropertyStep, Step, StepType};
pub use sweep::{
    ParameterSweep, RangeBehavior, RangeSweep, SweepColumn, SweepKind, SweepLoop, SweepMode,
    TableSweep,
};
pub use tree::{StepId, StepTree};
pub use types::TypeDescriptor;
pub use value::{ObjectRef, ObjectValue, Value};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for building and running sweeps
    pub use crate::{
        CancellationToken, Member, MemberDescriptor, ParameterSweep, PropertyStep, RangeSweep,
        RunOutcome, Step, StepId, StepRunner, StepTree, StepType, SweepConfig, SweepEngine,
        SweepError, SweepLoop, SweepMode, SweepParam, SweepResult, TableSweep, TypeDescriptor,
        TypeRegistry, Value, ValueCloner,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
