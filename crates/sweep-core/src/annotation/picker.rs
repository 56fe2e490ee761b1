//! Member picker: which member classes a parameter sweep drives

use crate::clone::ValueCloner;
use crate::error::{SweepError, TreeError};
use crate::member::{EquivalenceKey, Member};
use crate::param::SweepParam;
use crate::resolver;
use crate::sweep::ParameterSweep;
use crate::tree::{StepId, StepTree};
use crate::value::Value;
use std::collections::HashSet;

/// One pickable entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PickerChoice {
    /// Select every available class
    All,
    /// Clear the selection
    None,
    /// One member class
    Axis(EquivalenceKey),
}

/// A member class available under the loop
#[derive(Debug, Clone, PartialEq)]
pub struct PickerEntry {
    /// Class key
    pub key: EquivalenceKey,
    /// Live members of the class
    pub members: Vec<Member>,
    /// First live value, used to seed a new axis
    pub default: Value,
    /// Name of the axis driving the class, if selected
    pub axis: Option<String>,
}

impl PickerEntry {
    /// Whether an axis drives the class
    #[inline]
    #[must_use]
    pub fn is_selected(&self) -> bool {
        self.axis.is_some()
    }
}

/// Snapshot of available and selected classes
#[derive(Debug, Clone, PartialEq)]
pub struct PickerView {
    loop_id: StepId,
    entries: Vec<PickerEntry>,
    axes: Vec<(String, EquivalenceKey)>,
}

impl PickerView {
    /// Build the view from the live tree
    ///
    /// # Errors
    /// Returns [`TreeError`] if `loop_id` is not a parameter sweep.
    pub fn read(tree: &StepTree, loop_id: StepId) -> Result<Self, TreeError> {
        let sweep = tree.step_as::<ParameterSweep>(loop_id)?;
        let defaults = resolver::resolve_defaults(tree, loop_id);
        let axes: Vec<(String, EquivalenceKey)> = sweep
            .params()
            .iter()
            .map(|p| (p.name().to_string(), p.equivalence_key()))
            .collect();
        let mut entries = Vec::new();
        for (key, members) in resolver::resolve(tree, loop_id) {
            let Some(default) = defaults.get(&key).cloned() else {
                continue;
            };
            let axis = axes
                .iter()
                .find(|(_, k)| *k == key)
                .map(|(name, _)| name.clone());
            entries.push(PickerEntry {
                key,
                members,
                default,
                axis,
            });
        }
        Ok(Self {
            loop_id,
            entries,
            axes,
        })
    }

    /// Loop the view was read from
    #[inline]
    #[must_use]
    pub fn loop_id(&self) -> StepId {
        self.loop_id
    }

    /// Available classes in tree order
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[PickerEntry] {
        &self.entries
    }

    /// Sentinels followed by every available class
    #[must_use]
    pub fn choices(&self) -> Vec<PickerChoice> {
        let mut choices = vec![PickerChoice::All, PickerChoice::None];
        choices.extend(self.entries.iter().map(|e| PickerChoice::Axis(e.key.clone())));
        choices
    }

    /// Currently selected classes
    #[must_use]
    pub fn selected(&self) -> Vec<EquivalenceKey> {
        self.entries
            .iter()
            .filter(|e| e.is_selected())
            .map(|e| e.key.clone())
            .collect()
    }

    /// Diff `selection` against the current axes
    ///
    /// Choices are applied in order: `All` selects everything, `None`
    /// clears, `Axis` adds one class. Unavailable classes are ignored.
    #[must_use]
    pub fn write(&self, selection: &[PickerChoice]) -> PickerDelta {
        let mut wanted: HashSet<&EquivalenceKey> = HashSet::new();
        for choice in selection {
            match choice {
                PickerChoice::All => wanted.extend(self.entries.iter().map(|e| &e.key)),
                PickerChoice::None => wanted.clear(),
                PickerChoice::Axis(key) => {
                    if self.entries.iter().any(|e| e.key == *key) {
                        wanted.insert(key);
                    }
                }
            }
        }

        let mut delta = PickerDelta {
            loop_id: self.loop_id,
            drop: Vec::new(),
            add: Vec::new(),
            refresh: Vec::new(),
        };
        for (name, key) in &self.axes {
            if !wanted.contains(key) {
                delta.drop.push(name.clone());
            }
        }
        for entry in &self.entries {
            if !wanted.contains(&entry.key) {
                continue;
            }
            match &entry.axis {
                Some(name) => delta.refresh.push((name.clone(), entry.members.clone())),
                None => delta.add.push(entry.clone()),
            }
        }
        delta
    }
}

/// Changes produced by [`PickerView::write`]
#[derive(Debug, Clone, PartialEq)]
pub struct PickerDelta {
    loop_id: StepId,
    /// Axes to remove
    pub drop: Vec<String>,
    /// Classes to add as new axes
    pub add: Vec<PickerEntry>,
    /// Surviving axes and their latest members
    pub refresh: Vec<(String, Vec<Member>)>,
}

impl PickerDelta {
    /// Whether the delta changes nothing beyond refreshing members
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.drop.is_empty() && self.add.is_empty()
    }

    /// Apply to the loop the view was read from
    ///
    /// New axes are seeded with the class default and sized to the current
    /// series length. The selection changes as a whole or not at all.
    ///
    /// # Errors
    /// Returns [`SweepError`] if the loop is gone, a class no longer builds
    /// a valid axis, or a strict cloner cannot seed values.
    pub fn apply(self, tree: &mut StepTree, cloner: &ValueCloner) -> Result<(), SweepError> {
        let Self {
            loop_id,
            drop: dropped,
            add,
            refresh,
        } = self;
        tree.step_as_mut::<ParameterSweep>(loop_id)?.transact(|sweep| {
            for name in &dropped {
                sweep.remove_param(name);
            }
            for (name, members) in refresh {
                sweep.refresh_members(&name, members)?;
            }
            for entry in add {
                let param = SweepParam::new(entry.members)?.with_default(entry.default)?;
                sweep.add_param(param, cloner)?;
            }
            Ok::<_, SweepError>(())
        })
    }
}
