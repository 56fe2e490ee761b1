//! Saved form of parameter sweeps
//!
//! Axes are stored by member reference `(declaring type, member name)` and
//! reattached to the live tree on load. An axis whose members cannot all be
//! found, or whose stored values no longer fit, is dropped with a warning;
//! loading never fails because of one bad axis.

use crate::error::SweepError;
use crate::member::{Member, MemberRef};
use crate::param::SweepParam;
use crate::resolver;
use crate::sweep::{ParameterSweep, SweepMode};
use crate::tree::{StepId, StepTree};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Saved axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSweepParam {
    /// Axis name
    pub name: String,
    /// Members of the class
    pub members: Vec<MemberRef>,
    /// Value series
    pub values: Vec<Value>,
    /// Enabled flag per value
    #[serde(default)]
    pub enabled: Vec<bool>,
}

impl From<&SweepParam> for PersistedSweepParam {
    fn from(param: &SweepParam) -> Self {
        Self {
            name: param.name().to_string(),
            members: param.members().iter().map(Member::member_ref).collect(),
            values: param.values().to_vec(),
            enabled: param.enabled_flags().to_vec(),
        }
    }
}

/// Saved parameter sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedParameterSweep {
    /// Sweep mode
    #[serde(default)]
    pub mode: SweepMode,
    /// Across-runs cursor
    #[serde(default)]
    pub cursor: Option<usize>,
    /// Axes in display order
    #[serde(default)]
    pub params: Vec<PersistedSweepParam>,
}

impl PersistedParameterSweep {
    /// Serialize as pretty JSON
    ///
    /// # Errors
    /// Returns the serializer error; object values without a JSON form fall
    /// back to their text form and do not fail.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parse the JSON produced by [`Self::to_json`]
    ///
    /// Object values come back detached until [`load`] rehydrates them.
    ///
    /// # Errors
    /// Returns the deserializer error for malformed input.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Axis left out by [`load`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedAxis {
    /// Axis name
    pub name: String,
    /// Why it was dropped
    pub reason: String,
}

/// Outcome of [`load`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Axes restored, in order
    pub loaded: Vec<String>,
    /// Axes dropped
    pub dropped: Vec<DroppedAxis>,
}

impl LoadReport {
    /// Whether every axis was restored
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.dropped.is_empty()
    }
}

/// Capture the state of a parameter sweep
#[must_use]
pub fn save(sweep: &ParameterSweep) -> PersistedParameterSweep {
    PersistedParameterSweep {
        mode: sweep.mode(),
        cursor: sweep.cursor(),
        params: sweep.params().iter().map(PersistedSweepParam::from).collect(),
    }
}

/// Restore `persisted` into the parameter sweep at `loop_id`
///
/// Axes are rebuilt against the members currently under the loop. All
/// restored axes share the length of the first one; axes of another length
/// are dropped.
///
/// # Errors
/// Returns [`SweepError::Tree`] if `loop_id` is not a parameter sweep.
pub fn load(tree: &mut StepTree, loop_id: StepId, persisted: PersistedParameterSweep) -> Result<LoadReport, SweepError> {
    tree.step_as::<ParameterSweep>(loop_id)?;
    let live: HashMap<MemberRef, Member> = resolver::resolve(tree, loop_id)
        .into_values()
        .flatten()
        .map(|m| (m.member_ref(), m))
        .collect();
    let registry = tree.registry().clone();

    let mut report = LoadReport::default();
    let mut params: Vec<SweepParam> = Vec::with_capacity(persisted.params.len());
    for saved in persisted.params {
        let name = saved.name.clone();
        let restored = restore_param(saved, &live, |v| registry.rehydrate(v)).and_then(|param| {
            match params.first() {
                Some(first) if first.len() != param.len() => Err(format!(
                    "has {} values, other axes have {}",
                    param.len(),
                    first.len()
                )),
                _ => Ok(param),
            }
        });
        match restored {
            Ok(param) => {
                report.loaded.push(name);
                params.push(param);
            }
            Err(reason) => {
                tracing::warn!(step = %loop_id, axis = %name, %reason, "saved axis dropped");
                report.dropped.push(DroppedAxis { name, reason });
            }
        }
    }

    let sweep = tree.step_as_mut::<ParameterSweep>(loop_id)?;
    sweep.replace_params(params)?;
    sweep.set_mode(persisted.mode);
    sweep.set_cursor(persisted.cursor);
    tracing::info!(
        step = %loop_id,
        loaded = report.loaded.len(),
        dropped = report.dropped.len(),
        "sweep loaded"
    );
    Ok(report)
}

fn restore_param(
    saved: PersistedSweepParam,
    live: &HashMap<MemberRef, Member>,
    rehydrate: impl Fn(Value) -> Value,
) -> Result<SweepParam, String> {
    let mut members = Vec::with_capacity(saved.members.len());
    for reference in &saved.members {
        let member = live
            .get(reference)
            .ok_or_else(|| format!("member {reference} not found under the loop"))?;
        members.push(member.clone());
    }
    let values = saved.values.into_iter().map(rehydrate).collect();
    SweepParam::restore(saved.name, members, values, saved.enabled).map_err(|e| e.to_string())
}
