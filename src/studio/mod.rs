//! Pipeline editor state machine: the state container, its closed set of
//! actions, and the reducer that applies them.

pub mod action;
pub mod reducer;
pub mod state;

pub use action::{Action, Effect};
pub use reducer::{is_stale_completion, reduce};
pub use state::{
    DrawerState, DrawerType, EditorError, EditorMode, EditorSnapshot, EditorState, EditorWarning,
    GitDetails, PendingSave, RequestId, Selection, ViewMode,
};
