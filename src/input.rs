//! Input model: modifier keys, mouse buttons, UI state, and the gesture state machine.
//!
//! `Modifiers` and `Button` capture the user's intent at the time of a pointer
//! event. `UiState` is what the renderer and property editor see: the current
//! selection and the element loaded into the editor. `InputState` is the
//! active gesture tracked between pointer-down and pointer-up, carrying the
//! context needed to update render nodes on move and commit on release.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::camera::Point;
use crate::element::{Element, ElementId};
use crate::hit::ResizeAnchor;
use crate::transform::{AspectPolicy, BoxRect};

/// Keyboard modifier keys held during an event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// Whether the modifier combination extends the selection instead of replacing it.
    #[must_use]
    pub fn extends_selection(self) -> bool {
        self.shift || self.ctrl || self.meta
    }
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button (or single-finger tap).
    Primary,
    Middle,
    Secondary,
}

/// A keyboard key, named as reported by the browser (e.g. `"Delete"`, `"Escape"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key(pub String);

impl Key {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Persistent UI state visible to the renderer and the property editor.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    selected: Vec<ElementId>,
    /// Snapshot of the single selected element, loaded when it is selected and
    /// refreshed after every edit so the property editor never shows stale values.
    pub editor: Option<Element>,
}

impl UiState {
    /// Selected ids, in selection order.
    #[must_use]
    pub fn selected_ids(&self) -> &[ElementId] {
        &self.selected
    }

    /// The selected element when exactly one is selected.
    #[must_use]
    pub fn single_selection(&self) -> Option<&ElementId> {
        match self.selected.as_slice() {
            [id] => Some(id),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_selected(&self, id: &ElementId) -> bool {
        self.selected.contains(id)
    }

    #[must_use]
    pub fn has_selection(&self) -> bool {
        !self.selected.is_empty()
    }

    /// Replace the selection with one element and load it into the editor.
    pub(crate) fn select_only(&mut self, element: &Element) {
        self.selected = vec![element.id.clone()];
        self.editor = Some(element.clone());
    }

    /// Add or remove an element from the selection.
    pub(crate) fn toggle(&mut self, element: &Element) {
        if let Some(pos) = self.selected.iter().position(|id| id == &element.id) {
            self.selected.remove(pos);
        } else {
            self.selected.push(element.id.clone());
        }
        self.editor = match self.selected.as_slice() {
            [id] if id == &element.id => Some(element.clone()),
            _ => None,
        };
    }

    /// Drop one id from the selection. Returns whether it was selected.
    pub(crate) fn deselect(&mut self, id: &ElementId) -> bool {
        let before = self.selected.len();
        self.selected.retain(|s| s != id);
        if self.editor.as_ref().is_some_and(|e| &e.id == id) {
            self.editor = None;
        }
        self.selected.len() != before
    }

    /// Clear the selection. Returns whether anything was selected.
    pub(crate) fn clear(&mut self) -> bool {
        let had = !self.selected.is_empty();
        self.selected.clear();
        self.editor = None;
        had
    }

    /// Refresh the editor snapshot if `element` is the one loaded.
    pub(crate) fn refresh_editor(&mut self, element: &Element) {
        if self.editor.as_ref().is_some_and(|e| e.id == element.id) {
            self.editor = Some(element.clone());
        }
    }
}

/// Start position of one element in a (possibly group) drag.
#[derive(Debug, Clone, PartialEq)]
pub struct DragMember {
    pub id: ElementId,
    pub orig_x: f64,
    pub orig_y: f64,
}

/// Internal state for the input state machine.
///
/// Each active variant carries gesture context needed to update render nodes
/// on move and commit on pointer-up.
#[derive(Debug, Clone, Default)]
pub enum InputState {
    /// No gesture in progress; waiting for the next pointer-down.
    #[default]
    Idle,
    /// The user is moving the selected elements.
    DraggingElements {
        /// Draggable members of the selection with their start positions.
        members: Vec<DragMember>,
        /// Page-space pointer position at pointer-down.
        start: Point,
        /// Whether the pointer travelled far enough to count as a drag.
        moved: bool,
    },
    /// The user is resizing an element by dragging one of its eight handles.
    Resizing {
        id: ElementId,
        anchor: ResizeAnchor,
        /// Page-space pointer position at pointer-down.
        start: Point,
        /// Box at the start of the gesture.
        orig: BoxRect,
        /// Last accepted box; the fallback when a proposed box is rejected.
        current: BoxRect,
        policy: AspectPolicy,
        /// Whether the pointer travelled far enough to count as a resize.
        moved: bool,
    },
    /// The user is rotating an element by dragging the rotate handle.
    Rotating {
        id: ElementId,
        /// Box at the start of the gesture; rotation pivots on its center.
        orig: BoxRect,
        /// Pointer angle (degrees) around the center at pointer-down.
        start_angle: f64,
        start: Point,
        moved: bool,
    },
}

impl InputState {
    /// Whether a gesture is in progress.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}
