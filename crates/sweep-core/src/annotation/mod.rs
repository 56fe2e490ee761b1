//! Editing projections over sweep loops
//!
//! Each projection has a side-effect free `read` that builds an immutable
//! view from the tree and a `write` that turns user edits into a delta.
//! Deltas are the only way the projections mutate the model; they are
//! applied by [`SweepEditor::commit`], which re-reads both views afterwards.
//!
//! - [`PickerView`]: which member classes are swept
//! - [`RowTableView`]: the value series as rows
//! - [`project_row`]: one editable cell per axis of a row
//! - [`edit_state`]: whether a member may be edited where it is shown

mod aggregation;
mod gate;
mod picker;
mod preview;
mod row_members;
mod session;

pub use aggregation::{RowTableDelta, RowTableView};
pub use gate::{claiming_loop, edit_state, edit_states, DisabledReason, MemberEditState};
pub use picker::{PickerChoice, PickerDelta, PickerEntry, PickerView};
pub use preview::{preview_params, preview_series, preview_values, PREVIEW_LIMIT};
pub use row_members::{project_row, RowMemberProjection};
pub use session::{EditorDelta, EditorViews, SweepEditor};
