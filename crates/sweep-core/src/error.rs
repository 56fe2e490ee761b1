//! Error types for sweep-core
//!
//! Provides error handling for:
//! - Construction of sweep axes (type mismatches within one class)
//! - Validation before a sweep runs
//! - Member application during iteration (aggregated, never fatal)
//! - Resolution of persisted members and imported table headers
//! - Value cloning (reported, never fatal unless strict)
//! - The external step-execution collaborator

use crate::engine::LoopState;
use crate::member::MemberRef;
use crate::tree::StepId;
use crate::types::{ParseValueError, TypeDescriptor};
use std::path::PathBuf;

/// Main sweep error type
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    /// Step tree lookup failed
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    /// Member access failed
    #[error("member error: {0}")]
    Member(#[from] MemberError),

    /// Sweep axis could not be built
    #[error("construction failed: {0}")]
    Construction(#[from] ConstructionError),

    /// Sweep is not runnable
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Parameter series access failed
    #[error("parameter error: {0}")]
    Param(#[from] ParamError),

    /// Value could not be copied
    #[error("clone failed: {0}")]
    Clone(#[from] CloneError),

    /// Row view access failed
    #[error("row error: {0}")]
    Row(#[from] RowError),

    /// Table import failed
    #[error("import failed: {0}")]
    Import(#[from] ImportError),

    /// Step-execution collaborator failed
    #[error("run failed: {0}")]
    Run(#[from] RunError),

    /// Loop state machine violation
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SweepError {
    /// Errors raised before execution starts
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Errors from the step-execution collaborator
    #[inline]
    #[must_use]
    pub fn is_run_failure(&self) -> bool {
        matches!(self, Self::Run(_))
    }
}

/// Step tree errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// No step with this id
    #[error("step {0} not found")]
    UnknownStep(StepId),

    /// Step is not of the requested type
    #[error("step {step} is not a {expected}")]
    WrongStepType {
        /// Step id
        step: StepId,
        /// Requested Rust type
        expected: &'static str,
    },

    /// Step does not drive a sweep
    #[error("step {0} is not a sweep loop")]
    NotASweep(StepId),

    /// Every step id is taken
    #[error("step tree is full ({0} steps)")]
    Full(usize),
}

/// Member access errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MemberError {
    /// Member is write-only
    #[error("{member} is not readable")]
    NotReadable {
        /// Member involved
        member: MemberRef,
    },

    /// Member is read-only
    #[error("{member} is not writable")]
    NotWritable {
        /// Member involved
        member: MemberRef,
    },

    /// Step does not hold the member
    #[error("{member} is missing on the step")]
    Missing {
        /// Member involved
        member: MemberRef,
    },

    /// Member used on a step of another type
    #[error("{member} does not belong to step type {owner}")]
    WrongOwner {
        /// Member involved
        member: MemberRef,
        /// Actual owner type
        owner: String,
    },

    /// Value does not match the declared type
    #[error("{member} expects {expected}, got {actual}")]
    TypeMismatch {
        /// Member involved
        member: MemberRef,
        /// Declared type
        expected: TypeDescriptor,
        /// Rendered offending value
        actual: String,
    },

    /// Validator rejected the value
    #[error("{member} rejected value: {reason}")]
    Rejected {
        /// Member involved
        member: MemberRef,
        /// Validator message
        reason: String,
    },
}

impl MemberError {
    /// Member the error refers to
    #[must_use]
    pub fn member(&self) -> &MemberRef {
        match self {
            Self::NotReadable { member }
            | Self::NotWritable { member }
            | Self::Missing { member }
            | Self::WrongOwner { member, .. }
            | Self::TypeMismatch { member, .. }
            | Self::Rejected { member, .. } => member,
        }
    }
}

/// Failure to assign or restore one member on one step
///
/// Collected into [`crate::engine::ApplyReport`]; never aborts a sweep.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApplyError {
    /// Member rejected the value
    #[error(transparent)]
    Member(#[from] MemberError),

    /// Per-step copy of the value failed
    #[error(transparent)]
    Clone(#[from] CloneError),

    /// Targeted step vanished
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Sweep axis construction errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConstructionError {
    /// Axis needs at least one member
    #[error("sweep axis needs at least one member")]
    EmptyMemberSet,

    /// Members of one axis disagree on value type
    #[error("type mismatch in axis: {member} is {found}, expected {expected}")]
    TypeMismatch {
        /// Offending member
        member: MemberRef,
        /// Type of the first member
        expected: TypeDescriptor,
        /// Type of the offending member
        found: TypeDescriptor,
    },

    /// Range sweeps need numeric members
    #[error("range sweep member {member} is not numeric ({found})")]
    NonNumericRangeMember {
        /// Offending member
        member: MemberRef,
        /// Its type
        found: TypeDescriptor,
    },

    /// Default value does not match the axis type
    #[error("default value {value} does not match axis type {expected}")]
    DefaultTypeMismatch {
        /// Axis type
        expected: TypeDescriptor,
        /// Rendered value
        value: String,
    },
}

/// Pre-run validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Nothing selected to sweep
    #[error("no parameters selected to sweep")]
    NoParameters,

    /// Every point is disabled or the series is empty
    #[error("no enabled sweep points")]
    NoEnabledPoints,

    /// Children expose nothing sweepable
    #[error("no sweepable members under the loop")]
    NoSweepableMembers,

    /// Range needs more than one point
    #[error("range sweeps need more than one point, got {points}")]
    TooFewPoints {
        /// Configured point count
        points: u32,
    },

    /// Exponential range with a zero bound
    #[error("exponential range bounds must be non-zero (start {start}, stop {stop})")]
    ZeroBound {
        /// Range start
        start: f64,
        /// Range stop
        stop: f64,
    },

    /// Exponential range crossing zero
    #[error("exponential range bounds must share a sign (start {start}, stop {stop})")]
    SignMismatch {
        /// Range start
        start: f64,
        /// Range stop
        stop: f64,
    },

    /// Range bound is NaN or infinite
    #[error("range bounds must be finite (start {start}, stop {stop})")]
    NonFiniteBound {
        /// Range start
        start: f64,
        /// Range stop
        stop: f64,
    },

    /// Computed range point does not fit the member type
    #[error("range point {index} ({value}) cannot be written to '{axis}'")]
    UnrepresentableValue {
        /// Member display name
        axis: String,
        /// Point index
        index: usize,
        /// Computed value
        value: f64,
    },

    /// Series lengths disagree
    #[error("axis '{axis}' has {actual} values, expected {expected}")]
    LengthMismatch {
        /// Axis name
        axis: String,
        /// Loop length
        expected: usize,
        /// Axis length
        actual: usize,
    },
}

/// Value series access errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamError {
    /// No axis with this name
    #[error("unknown axis '{0}'")]
    UnknownAxis(String),

    /// Index beyond the series
    #[error("index {index} out of range for axis '{axis}' (len {len})")]
    IndexOutOfRange {
        /// Axis name
        axis: String,
        /// Requested index
        index: usize,
        /// Series length
        len: usize,
    },

    /// Value does not match the axis type
    #[error("axis '{axis}' expects {expected}, got {value}")]
    ValueTypeMismatch {
        /// Axis name
        axis: String,
        /// Axis type
        expected: TypeDescriptor,
        /// Rendered value
        value: String,
    },

    /// An axis with the same members already exists
    #[error("axis '{0}' is already selected")]
    DuplicateAxis(String),
}

/// Value clone errors (strict mode only)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CloneError {
    /// Neither text nor JSON round trip is available
    #[error("value of type {type_name} cannot be copied")]
    NotClonable {
        /// Object type name
        type_name: String,
    },
}

/// Row view errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowError {
    /// Row has no owning loop
    #[error("row is not attached to a sweep loop")]
    Detached,

    /// Owning loop has no axis with this name
    #[error("loop {owner} has no axis '{axis}'")]
    UnknownAxis {
        /// Owning loop
        owner: StepId,
        /// Axis name
        axis: String,
    },

    /// No live step exposes the axis
    #[error("no step under loop {owner} exposes axis '{axis}'")]
    NoLiveMember {
        /// Owning loop
        owner: StepId,
        /// Axis name
        axis: String,
    },

    /// Reading the live member failed
    #[error(transparent)]
    Member(#[from] MemberError),

    /// Copying the live value failed
    #[error(transparent)]
    Clone(#[from] CloneError),

    /// Owner lookup failed
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Table import errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ImportError {
    /// Matrix has no header row
    #[error("table is empty")]
    EmptyTable,

    /// Header does not name a sweepable member
    #[error("column {column}: unrecognized header '{header}'")]
    UnknownHeader {
        /// Zero-based column
        column: usize,
        /// Header text
        header: String,
    },

    /// Header names several member classes of different types
    #[error("column {column}: header '{header}' is ambiguous between {candidates:?}")]
    AmbiguousHeader {
        /// Zero-based column
        column: usize,
        /// Header text
        header: String,
        /// Matching classes
        candidates: Vec<String>,
    },

    /// Same header twice
    #[error("column {column}: duplicate header '{header}'")]
    DuplicateHeader {
        /// Zero-based column
        column: usize,
        /// Header text
        header: String,
    },

    /// Row has the wrong number of cells
    #[error("row {row}: expected {expected} cells, found {actual}")]
    RaggedRow {
        /// One-based data row
        row: usize,
        /// Header width
        expected: usize,
        /// Actual width
        actual: usize,
    },

    /// Cell text could not be converted
    #[error("row {row}, column '{header}': {source}")]
    InvalidCell {
        /// One-based data row
        row: usize,
        /// Header text
        header: String,
        /// Conversion failure
        #[source]
        source: ParseValueError,
    },
}

/// Step-execution collaborator errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    /// Collaborator refused or failed to start children
    #[error("step runner failed: {0}")]
    Runner(String),

    /// A child did not complete in time
    #[error("step {step} did not complete within {after_ms} ms")]
    Timeout {
        /// Child step
        step: StepId,
        /// Configured timeout
        after_ms: u64,
    },

    /// A child task panicked or was aborted
    #[error("step {step} aborted: {reason}")]
    Aborted {
        /// Child step
        step: StepId,
        /// Failure detail
        reason: String,
    },
}

/// Loop state machine errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// Transition not allowed
    #[error("illegal loop state transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current state
        from: LoopState,
        /// Requested state
        to: LoopState,
    },
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML could not be parsed
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// File could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Subscriber installation failed
    #[error("telemetry setup failed: {0}")]
    Telemetry(String),
}

/// Result type alias for sweep operations
pub type SweepResult<T> = Result<T, SweepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_error_display_names_member() {
        let err = MemberError::NotWritable {
            member: MemberRef::new("Delay", "time"),
        };
        assert_eq!(err.to_string(), "Delay.time is not writable");
        assert_eq!(err.member(), &MemberRef::new("Delay", "time"));
    }

    #[test]
    fn validation_classification() {
        let err: SweepError = ValidationError::NoParameters.into();
        assert!(err.is_validation());
        assert!(!err.is_run_failure());
    }

    #[test]
    fn import_error_display() {
        let err = ImportError::UnknownHeader {
            column: 2,
            header: "Bogus".into(),
        };
        assert_eq!(err.to_string(), "column 2: unrecognized header 'Bogus'");
    }

    #[test]
    fn error_conversions() {
        let err: SweepError = TreeError::UnknownStep(StepId(3)).into();
        assert!(matches!(err, SweepError::Tree(TreeError::UnknownStep(StepId(3)))));
    }
}
