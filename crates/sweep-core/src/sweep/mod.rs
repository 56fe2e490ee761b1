//! Sweep loop steps
//!
//! Loops are ordinary steps in the tree that additionally implement
//! [`SweepLoop`]. Three kinds exist:
//! - [`ParameterSweep`]: column-oriented axes, run within one execution or
//!   one point per execution
//! - [`TableSweep`]: row-oriented table, filled by table import
//! - [`RangeSweep`]: computed linear or exponential range over numeric
//!   members

mod notify;
mod parameter;
mod range;
mod table;

pub use notify::{ChangeNotifier, Notification, SweepEvent};
pub use parameter::{ParameterSweep, SweepMode};
pub use range::{RangeBehavior, RangeSweep};
pub use table::{SweepColumn, TableSweep};

use crate::error::ValidationError;
use crate::member::Member;
use crate::step::StepType;
use std::fmt::{self, Debug, Display};
use std::sync::Arc;

/// Kind of sweep loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepKind {
    /// [`ParameterSweep`]
    Parameters,
    /// [`TableSweep`]
    Table,
    /// [`RangeSweep`]
    Range,
}

impl Display for SweepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parameters => write!(f, "parameters"),
            Self::Table => write!(f, "table"),
            Self::Range => write!(f, "range"),
        }
    }
}

/// Common view of every loop step
pub trait SweepLoop: Debug + Send + Sync {
    /// Loop kind
    fn kind(&self) -> SweepKind;

    /// Axis names in display order
    fn axis_names(&self) -> Vec<String>;

    /// Members controlled by `axis`
    fn axis_members(&self, axis: &str) -> Option<Vec<Member>>;

    /// Every member this loop controls
    fn claimed_members(&self) -> Vec<Member> {
        let mut out: Vec<Member> = Vec::new();
        for axis in self.axis_names() {
            for member in self.axis_members(&axis).unwrap_or_default() {
                if !out.contains(&member) {
                    out.push(member);
                }
            }
        }
        out
    }

    /// Pre-run checks
    ///
    /// # Errors
    /// Returns [`ValidationError`] if the loop cannot run.
    fn validate(&self) -> Result<(), ValidationError>;

    /// Change notifications
    fn notifier(&self) -> &ChangeNotifier;
}

/// Step types of all loop kinds, for registration
#[must_use]
pub fn loop_step_types() -> Vec<Arc<StepType>> {
    vec![
        parameter::step_type(),
        table::step_type(),
        range::step_type(),
    ]
}
