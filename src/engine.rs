//! Selection & transform controller.
//!
//! `EngineCore` interprets pointer and keyboard events against the active
//! page. Gestures only move render nodes; the model changes when a gesture
//! ends, through [`transform::commit`]. Every handler returns the list of
//! [`Action`]s the host should react to (redraw, cursor change, font load).

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::camera::{Camera, Point};
use crate::consts::{CLICK_SLOP, NEW_ELEMENT_CASCADE, NUDGE_STEP, NUDGE_STEP_LARGE, ROTATION_SNAP_DEG};
use crate::element::{Element, ElementId, ElementKind, ElementPatch};
use crate::hit::{HitPart, hit_test};
use crate::input::{Button, DragMember, InputState, Key, Modifiers, UiState};
use crate::pages::{Page, PageStore, ZMove};
use crate::render::NodeArena;
use crate::transform::{
    self, AspectPolicy, bound_box, hold_min_width, resize_box, rotate_about_center, snap_rotation,
};

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    ElementCreated(ElementId),
    ElementUpdated(ElementId),
    ElementDeleted(ElementId),
    SelectionChanged,
    /// The active page changed (or was reloaded); carries its index.
    PageChanged(usize),
    /// An operation was refused; the message is meant for the user.
    Rejected(String),
    SetCursor(&'static str),
    RenderNeeded,
    /// A text element uses this font family; load it before the next paint.
    FontRequested(String),
}

/// Core engine state: model, viewport, selection, gesture, and render nodes.
#[derive(Debug, Default)]
pub struct EngineCore {
    pages: PageStore,
    pub camera: Camera,
    ui: UiState,
    input: InputState,
    nodes: NodeArena,
    created: usize,
}

impl EngineCore {
    /// An engine holding one blank page of the given size.
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        let mut engine = Self { pages: PageStore::new(width, height), ..Self::default() };
        engine.nodes.sync(engine.pages.active_page());
        engine
    }

    // --- Data inputs ---

    /// Replace every page (e.g. after loading a template) and reset the session state.
    pub fn load_pages(&mut self, pages: Vec<Page>) -> Vec<Action> {
        self.pages = PageStore::from_pages(pages);
        self.created = 0;
        self.switch_context()
    }

    /// Fit the active page into a host container.
    pub fn set_viewport(&mut self, width: f64, height: f64, padding: f64) {
        let page = self.pages.active_page();
        self.camera = Camera::fit(page.width, page.height, width, height, padding);
    }

    // --- Queries ---

    #[must_use]
    pub fn pages(&self) -> &PageStore {
        &self.pages
    }

    #[must_use]
    pub fn active_page(&self) -> &Page {
        self.pages.active_page()
    }

    #[must_use]
    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    #[must_use]
    pub fn input(&self) -> &InputState {
        &self.input
    }

    #[must_use]
    pub fn nodes(&self) -> &NodeArena {
        &self.nodes
    }

    #[must_use]
    pub fn element(&self, id: &ElementId) -> Option<&Element> {
        self.pages.element(id)
    }

    #[must_use]
    pub fn selection(&self) -> &[ElementId] {
        self.ui.selected_ids()
    }

    // --- Pointer input ---

    pub fn on_pointer_down(&mut self, screen_pt: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        if button != Button::Primary {
            return Vec::new();
        }
        self.input = InputState::Idle;
        let pt = self.camera.screen_to_page(screen_pt);
        let page = self.pages.active_page();
        let hit = hit_test(pt, page, &self.nodes, &self.camera, self.ui.single_selection());

        let Some(hit) = hit else {
            let mut actions = Vec::new();
            if self.ui.clear() {
                actions.push(Action::SelectionChanged);
                actions.push(Action::RenderNeeded);
            }
            return actions;
        };
        let Some(element) = page.element(&hit.element_id) else {
            return Vec::new();
        };
        let orig = self.nodes.box_for(element);

        match hit.part {
            HitPart::ResizeHandle(anchor) => {
                self.input = InputState::Resizing {
                    id: hit.element_id,
                    anchor,
                    start: pt,
                    orig,
                    current: orig,
                    policy: AspectPolicy::for_element(element),
                    moved: false,
                };
                vec![Action::SetCursor(anchor.cursor())]
            }
            HitPart::RotateHandle => {
                self.input = InputState::Rotating {
                    id: hit.element_id,
                    orig,
                    start_angle: angle_deg(orig.center(), pt),
                    start: pt,
                    moved: false,
                };
                vec![Action::SetCursor("grabbing")]
            }
            HitPart::Body => {
                let element = element.clone();
                self.press_body(&element, pt, modifiers)
            }
        }
    }

    fn press_body(&mut self, element: &Element, pt: Point, modifiers: Modifiers) -> Vec<Action> {
        let mut actions = Vec::new();
        if modifiers.extends_selection() {
            self.ui.toggle(element);
            actions.push(Action::SelectionChanged);
            actions.push(Action::RenderNeeded);
            if !self.ui.is_selected(&element.id) {
                // The one survivor of a toggle-off becomes the editor target.
                let page = self.pages.active_page();
                if let Some(el) = self.ui.single_selection().and_then(|id| page.element(id)) {
                    self.ui.select_only(&el.clone());
                }
                return actions;
            }
        } else if !self.ui.is_selected(&element.id) {
            self.ui.select_only(element);
            actions.push(Action::SelectionChanged);
            actions.push(Action::RenderNeeded);
        }

        let page = self.pages.active_page();
        let members: Vec<DragMember> = self
            .ui
            .selected_ids()
            .iter()
            .filter_map(|id| page.element(id))
            .filter(|el| el.draggable)
            .map(|el| {
                let b = self.nodes.box_for(el);
                DragMember { id: el.id.clone(), orig_x: b.x, orig_y: b.y }
            })
            .collect();

        if !members.is_empty() {
            self.input = InputState::DraggingElements { members, start: pt, moved: false };
            actions.push(Action::SetCursor("move"));
        }
        actions
    }

    pub fn on_pointer_move(&mut self, screen_pt: Point, modifiers: Modifiers) -> Vec<Action> {
        let pt = self.camera.screen_to_page(screen_pt);
        if !self.input.is_active() {
            return vec![Action::SetCursor(self.hover_cursor(pt))];
        }

        match &mut self.input {
            InputState::Idle => Vec::new(),
            InputState::DraggingElements { members, start, moved } => {
                let (dx, dy) = (pt.x - start.x, pt.y - start.y);
                if !*moved && dx.hypot(dy) < CLICK_SLOP {
                    return Vec::new();
                }
                *moved = true;
                for m in members.iter() {
                    if let Some(node) = self.nodes.get_mut(&m.id) {
                        node.x = m.orig_x + dx;
                        node.y = m.orig_y + dy;
                    }
                }
                vec![Action::RenderNeeded]
            }
            InputState::Resizing { id, anchor, start, orig, current, policy, moved } => {
                let delta = Point::new(pt.x - start.x, pt.y - start.y);
                if !*moved && delta.x.hypot(delta.y) < CLICK_SLOP {
                    return Vec::new();
                }
                *moved = true;
                let proposed = resize_box(*orig, *anchor, delta, *policy);
                let min_width = self.pages.element(id).map_or(0.0, transform::min_live_width);
                let accepted = hold_min_width(bound_box(*current, proposed), *anchor, min_width);
                *current = accepted;
                if let Some(node) = self.nodes.get_mut(id) {
                    node.x = accepted.x;
                    node.y = accepted.y;
                    if orig.width > 0.0 && orig.height > 0.0 {
                        node.scale_x = accepted.width / orig.width;
                        node.scale_y = accepted.height / orig.height;
                    }
                }
                vec![Action::RenderNeeded]
            }
            InputState::Rotating { id, orig, start_angle, start, moved } => {
                if !*moved && pt.distance(*start) < CLICK_SLOP {
                    return Vec::new();
                }
                *moved = true;
                let mut rotation = orig.rotation + angle_deg(orig.center(), pt) - *start_angle;
                if modifiers.shift {
                    rotation = snap_rotation(rotation, ROTATION_SNAP_DEG);
                }
                let origin = rotate_about_center(*orig, rotation);
                if let Some(node) = self.nodes.get_mut(id) {
                    node.x = origin.x;
                    node.y = origin.y;
                    node.rotation = rotation;
                }
                vec![Action::RenderNeeded]
            }
        }
    }

    pub fn on_pointer_up(&mut self, _screen_pt: Point, button: Button, _modifiers: Modifiers) -> Vec<Action> {
        if button != Button::Primary {
            return Vec::new();
        }
        let mut actions = match std::mem::take(&mut self.input) {
            InputState::Idle => return Vec::new(),
            InputState::DraggingElements { moved: false, .. } => Vec::new(),
            InputState::DraggingElements { members, moved: true, .. } => {
                members.iter().filter_map(|m| self.commit_node(&m.id)).collect()
            }
            InputState::Resizing { id, moved: false, .. } | InputState::Rotating { id, moved: false, .. } => {
                // A press and release on a handle is a click on the handle.
                if let Some(el) = self.pages.element(&id) {
                    self.nodes.refresh(el);
                }
                if self.ui.clear() { vec![Action::SelectionChanged] } else { Vec::new() }
            }
            InputState::Resizing { id, .. } | InputState::Rotating { id, .. } => {
                self.commit_node(&id).into_iter().collect()
            }
        };
        if !actions.is_empty() {
            actions.push(Action::RenderNeeded);
        }
        actions.push(Action::SetCursor("default"));
        actions
    }

    fn hover_cursor(&self, pt: Point) -> &'static str {
        let page = self.pages.active_page();
        match hit_test(pt, page, &self.nodes, &self.camera, self.ui.single_selection()) {
            Some(hit) => match hit.part {
                HitPart::ResizeHandle(anchor) => anchor.cursor(),
                HitPart::RotateHandle => "grab",
                HitPart::Body => "move",
            },
            None => "default",
        }
    }

    /// Fold a node's live transform into its element.
    fn commit_node(&mut self, id: &ElementId) -> Option<Action> {
        let node = self.nodes.get_mut(id)?;
        if let Err(e) = self.pages.update_element(id, |el| transform::commit(el, node)) {
            warn!(element_id = %id, error = %e, "transform commit dropped");
            self.nodes.unmount(id);
            return None;
        }
        if let Some(el) = self.pages.element(id) {
            self.ui.refresh_editor(el);
        }
        Some(Action::ElementUpdated(id.clone()))
    }

    /// Commit whatever live transform `id`'s node carries.
    pub fn commit_transform(&mut self, id: &ElementId) -> Vec<Action> {
        match self.commit_node(id) {
            Some(action) => vec![action, Action::RenderNeeded],
            None => Vec::new(),
        }
    }

    // --- Keyboard input ---

    pub fn on_key_down(&mut self, key: &Key, modifiers: Modifiers) -> Vec<Action> {
        match key.0.as_str() {
            "Delete" | "Backspace" => {
                if self.input.is_active() {
                    return Vec::new();
                }
                self.delete_selected()
            }
            "Escape" => self.cancel(),
            "ArrowLeft" | "ArrowRight" | "ArrowUp" | "ArrowDown" => {
                if self.input.is_active() {
                    return Vec::new();
                }
                let step = if modifiers.shift { NUDGE_STEP_LARGE } else { NUDGE_STEP };
                let (dx, dy) = match key.0.as_str() {
                    "ArrowLeft" => (-step, 0.0),
                    "ArrowRight" => (step, 0.0),
                    "ArrowUp" => (0.0, -step),
                    _ => (0.0, step),
                };
                self.nudge_selected(dx, dy)
            }
            _ => Vec::new(),
        }
    }

    /// Abort the gesture in progress (restoring nodes) and clear the selection.
    fn cancel(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        let ids: Vec<ElementId> = match std::mem::take(&mut self.input) {
            InputState::Idle => Vec::new(),
            InputState::DraggingElements { members, .. } => members.into_iter().map(|m| m.id).collect(),
            InputState::Resizing { id, .. } | InputState::Rotating { id, .. } => vec![id],
        };
        for id in &ids {
            if let Some(el) = self.pages.element(id) {
                self.nodes.refresh(el);
            }
        }
        if !ids.is_empty() {
            actions.push(Action::SetCursor("default"));
        }
        if self.ui.clear() {
            actions.push(Action::SelectionChanged);
        }
        if !actions.is_empty() {
            actions.push(Action::RenderNeeded);
        }
        actions
    }

    fn nudge_selected(&mut self, dx: f64, dy: f64) -> Vec<Action> {
        let ids: Vec<ElementId> = self.ui.selected_ids().to_vec();
        let mut actions = Vec::new();
        for id in ids {
            if !self.pages.element(&id).is_some_and(|el| el.draggable) {
                continue;
            }
            let moved = self.pages.update_element(&id, |el| {
                el.x += dx;
                el.y += dy;
            });
            if moved.is_err() {
                continue;
            }
            if let Some(el) = self.pages.element(&id) {
                self.nodes.refresh(el);
                self.ui.refresh_editor(el);
            }
            actions.push(Action::ElementUpdated(id));
        }
        if !actions.is_empty() {
            actions.push(Action::RenderNeeded);
        }
        actions
    }

    // --- Element operations ---

    /// Add a new element with the given properties, cascaded near the page center,
    /// and select it.
    pub fn add_element(&mut self, kind: ElementKind) -> Vec<Action> {
        let page = self.pages.active_page();
        let mut element = Element::new(kind, 0.0, 0.0);
        let (w, h) = element.size();
        #[allow(clippy::cast_precision_loss)]
        let offset = NEW_ELEMENT_CASCADE * (self.created % 10) as f64;
        element.x = ((page.width - w) / 2.0).max(0.0) + offset;
        element.y = ((page.height - h) / 2.0).max(0.0) + offset;
        self.insert_element(element)
    }

    /// Insert a fully built element on top of the active page and select it.
    pub fn insert_element(&mut self, element: Element) -> Vec<Action> {
        let family = element.font_family().map(str::to_string);
        let id = match self.pages.insert_element(element) {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "element insert rejected");
                return vec![Action::Rejected(e.to_string())];
            }
        };
        self.created += 1;
        let mut actions = vec![Action::ElementCreated(id.clone())];
        if let Some(el) = self.pages.element(&id) {
            self.nodes.mount(el);
            self.ui.select_only(el);
            actions.push(Action::SelectionChanged);
        }
        if let Some(family) = family {
            actions.push(Action::FontRequested(family));
        }
        debug!(element_id = %id, "element created");
        actions.push(Action::RenderNeeded);
        actions
    }

    pub fn delete_element(&mut self, id: &ElementId) -> Vec<Action> {
        let mut actions = self.remove_one(id);
        if !actions.is_empty() {
            actions.push(Action::RenderNeeded);
        }
        actions
    }

    /// Delete every selected element.
    pub fn delete_selected(&mut self) -> Vec<Action> {
        let ids: Vec<ElementId> = self.ui.selected_ids().to_vec();
        let mut actions: Vec<Action> = ids.iter().flat_map(|id| self.remove_one(id)).collect();
        if !actions.is_empty() {
            actions.push(Action::RenderNeeded);
        }
        actions
    }

    fn remove_one(&mut self, id: &ElementId) -> Vec<Action> {
        if let Err(e) = self.pages.remove_element(id) {
            warn!(element_id = %id, error = %e, "delete ignored");
            return Vec::new();
        }
        self.nodes.unmount(id);
        if self.gesture_targets(id) {
            self.input = InputState::Idle;
        }
        let mut actions = vec![Action::ElementDeleted(id.clone())];
        if self.ui.deselect(id) {
            actions.push(Action::SelectionChanged);
        }
        debug!(element_id = %id, "element deleted");
        actions
    }

    fn gesture_targets(&self, id: &ElementId) -> bool {
        match &self.input {
            InputState::Idle => false,
            InputState::DraggingElements { members, .. } => members.iter().any(|m| &m.id == id),
            InputState::Resizing { id: target, .. } | InputState::Rotating { id: target, .. } => target == id,
        }
    }

    /// Apply a property edit from the editor panel.
    pub fn apply_patch(&mut self, id: &ElementId, patch: &ElementPatch) -> Vec<Action> {
        let mut applied = false;
        if let Err(e) = self.pages.update_element(id, |el| applied = el.apply_patch(patch)) {
            warn!(element_id = %id, error = %e, "patch ignored");
            return vec![Action::Rejected(e.to_string())];
        }
        if !applied {
            warn!(element_id = %id, "patch rejected");
            return vec![Action::Rejected(format!("invalid property update for {id}"))];
        }
        if let Some(el) = self.pages.element(id) {
            self.nodes.refresh(el);
            self.ui.refresh_editor(el);
        }
        let mut actions = vec![Action::ElementUpdated(id.clone())];
        if let Some(family) = patch.font_family() {
            actions.push(Action::FontRequested(family.to_string()));
        }
        actions.push(Action::RenderNeeded);
        actions
    }

    /// Change an element's stacking position.
    pub fn move_element(&mut self, id: &ElementId, to: ZMove) -> Vec<Action> {
        match self.pages.move_element(id, to) {
            Ok(true) => vec![Action::ElementUpdated(id.clone()), Action::RenderNeeded],
            Ok(false) => Vec::new(),
            Err(e) => vec![Action::Rejected(e.to_string())],
        }
    }

    /// Select one element programmatically (e.g. from a layer list).
    pub fn select(&mut self, id: &ElementId) -> Vec<Action> {
        let Some(el) = self.pages.element(id) else {
            return Vec::new();
        };
        self.ui.select_only(el);
        vec![Action::SelectionChanged, Action::RenderNeeded]
    }

    pub fn clear_selection(&mut self) -> Vec<Action> {
        if self.ui.clear() { vec![Action::SelectionChanged, Action::RenderNeeded] } else { Vec::new() }
    }

    /// Drop the selection, any gesture, and every render node.
    pub fn reset_interaction(&mut self) {
        self.input = InputState::Idle;
        self.ui.clear();
        self.nodes.clear();
    }

    // --- Page operations ---

    pub fn add_page(&mut self) -> Vec<Action> {
        self.pages.add_page();
        self.switch_context()
    }

    pub fn delete_page(&mut self, index: usize) -> Vec<Action> {
        match self.pages.delete_page(index) {
            Ok(()) => self.switch_context(),
            Err(e) => vec![Action::Rejected(e.to_string())],
        }
    }

    pub fn goto(&mut self, index: usize) -> Vec<Action> {
        match self.pages.goto(index) {
            Ok(true) => self.switch_context(),
            Ok(false) => Vec::new(),
            Err(e) => vec![Action::Rejected(e.to_string())],
        }
    }

    pub fn goto_prev(&mut self) -> Vec<Action> {
        if self.pages.goto_prev() { self.switch_context() } else { Vec::new() }
    }

    pub fn goto_next(&mut self) -> Vec<Action> {
        if self.pages.goto_next() { self.switch_context() } else { Vec::new() }
    }

    /// Set or clear the active page's background asset reference.
    pub fn set_background(&mut self, background: Option<String>) -> Vec<Action> {
        self.pages.set_background(background);
        vec![Action::RenderNeeded]
    }

    pub fn set_canvas_size(&mut self, width: f64, height: f64) -> Vec<Action> {
        if self.pages.set_canvas_size(width, height) {
            vec![Action::RenderNeeded]
        } else {
            vec![Action::Rejected(format!("invalid canvas size {width}x{height}"))]
        }
    }

    /// Swap the whole editing context over to the active page.
    fn switch_context(&mut self) -> Vec<Action> {
        self.input = InputState::Idle;
        let had_selection = self.ui.clear();
        self.nodes.clear();
        let page = self.pages.active_page();
        self.nodes.sync(page);

        let index = self.pages.active_index();
        debug!(page = index, elements = page.elements.len(), "page context switched");
        let mut actions = vec![Action::PageChanged(index)];
        if had_selection {
            actions.push(Action::SelectionChanged);
        }
        let families: BTreeSet<&str> = page.elements.iter().filter_map(Element::font_family).collect();
        actions.extend(families.into_iter().map(|f| Action::FontRequested(f.to_string())));
        actions.push(Action::RenderNeeded);
        actions
    }
}

/// Pointer angle around `center` in degrees (clockwise from +x, screen space).
fn angle_deg(center: Point, p: Point) -> f64 {
    (p.y - center.y).atan2(p.x - center.x).to_degrees()
}
