//! Render/sync layer: transient render nodes and display-list construction.
//!
//! The canvas backend is external. This module gives it two things:
//!
//! - [`NodeArena`]: the live transform of every mounted element, keyed by
//!   [`ElementId`]. Gestures mutate nodes; the model is only touched when a
//!   gesture commits (see [`crate::transform::commit`]). The element model never
//!   holds a handle into this arena.
//! - [`build_scene`]: a read-only pass over page, nodes, cache, and UI state
//!   that produces an ordered [`Scene`] of [`DrawOp`]s for the backend to paint.
//!   It does not mutate any application state.
//!
//! Cache misses and failures become deterministic placeholders so an element
//! whose image or QR bitmap is unavailable is still drawn, never skipped.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use std::collections::HashMap;

use crate::cache::{Bitmap, CacheKey, ImageCache};
use crate::element::{Border, Element, ElementId, ElementKind, Shadow, ShapeProps, TextProps};
use crate::input::UiState;
use crate::pages::Page;
use crate::transform::BoxRect;

// =============================================================
// Render nodes
// =============================================================

/// Live transform state of one mounted element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderNode {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    /// Accumulated horizontal scale of an in-progress resize. 1 when idle.
    pub scale_x: f64,
    /// Accumulated vertical scale of an in-progress resize. 1 when idle.
    pub scale_y: f64,
}

impl RenderNode {
    #[must_use]
    pub fn from_element(element: &Element) -> Self {
        Self { x: element.x, y: element.y, rotation: element.rotation, scale_x: 1.0, scale_y: 1.0 }
    }

    /// Re-sync with the model and drop any live scale.
    pub fn reset_to(&mut self, element: &Element) {
        *self = Self::from_element(element);
    }
}

/// Arena of render nodes keyed by element id, populated on mount/unmount.
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: HashMap<ElementId, RenderNode>,
}

impl NodeArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(&mut self, element: &Element) {
        self.nodes.insert(element.id.clone(), RenderNode::from_element(element));
    }

    pub fn unmount(&mut self, id: &ElementId) -> Option<RenderNode> {
        self.nodes.remove(id)
    }

    #[must_use]
    pub fn get(&self, id: &ElementId) -> Option<&RenderNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &ElementId) -> Option<&mut RenderNode> {
        self.nodes.get_mut(id)
    }

    /// Re-sync one node with its element after a model edit.
    pub fn refresh(&mut self, element: &Element) {
        match self.nodes.get_mut(&element.id) {
            Some(node) => node.reset_to(element),
            None => self.mount(element),
        }
    }

    /// Mount nodes for new elements and unmount nodes whose element is gone.
    pub fn sync(&mut self, page: &Page) {
        self.nodes.retain(|id, _| page.contains(id));
        for element in &page.elements {
            if !self.nodes.contains_key(&element.id) {
                self.mount(element);
            }
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The box an element currently occupies on screen: its node's live
    /// transform applied to the model size, or the model box when unmounted.
    #[must_use]
    pub fn box_for(&self, element: &Element) -> BoxRect {
        let (w, h) = element.size();
        match self.nodes.get(&element.id) {
            Some(n) => BoxRect { x: n.x, y: n.y, width: w * n.scale_x, height: h * n.scale_y, rotation: n.rotation },
            None => BoxRect { x: element.x, y: element.y, width: w, height: h, rotation: element.rotation },
        }
    }
}

// =============================================================
// Display list
// =============================================================

/// Label drawn inside an image slot that has no bitmap.
pub const IMAGE_PLACEHOLDER_LABEL: &str = "Image";

/// Label drawn inside a QR slot that has no bitmap.
pub const QR_PLACEHOLDER_LABEL: &str = "QR";

/// Common paint attributes of an element.
#[derive(Debug, Clone, PartialEq)]
pub struct Paint {
    pub opacity: f64,
    /// Present only when the shadow is visible.
    pub shadow: Option<Shadow>,
}

/// One drawing instruction, in paint order.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// Page background bitmap stretched to the canvas.
    Background { width: f64, height: f64, bitmap: Bitmap },
    /// Blank canvas fill (no background, or background not yet available).
    BlankBackground { width: f64, height: f64 },
    Text { id: ElementId, frame: BoxRect, props: TextProps, paint: Paint },
    Image { id: ElementId, frame: BoxRect, bitmap: Bitmap, border: Border, paint: Paint },
    Shape { id: ElementId, frame: BoxRect, props: ShapeProps, paint: Paint },
    QrCode { id: ElementId, frame: BoxRect, bitmap: Bitmap, border: Border, paint: Paint },
    /// Stand-in for an image or QR element whose bitmap is missing.
    Placeholder { id: ElementId, frame: BoxRect, label: &'static str, paint: Paint },
    /// Selection outline; `handles` is true when transform handles are shown.
    Selection { id: ElementId, frame: BoxRect, handles: bool },
}

/// A full frame for the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub width: f64,
    pub height: f64,
    pub ops: Vec<DrawOp>,
}

impl Scene {
    /// Ids of drawn elements in paint order.
    #[must_use]
    pub fn element_ids(&self) -> Vec<&ElementId> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { id, .. }
                | DrawOp::Image { id, .. }
                | DrawOp::Shape { id, .. }
                | DrawOp::QrCode { id, .. }
                | DrawOp::Placeholder { id, .. } => Some(id),
                DrawOp::Background { .. } | DrawOp::BlankBackground { .. } | DrawOp::Selection { .. } => None,
            })
            .collect()
    }

    /// Whether any transform handles are drawn.
    #[must_use]
    pub fn has_handles(&self) -> bool {
        self.ops.iter().any(|op| matches!(op, DrawOp::Selection { handles: true, .. }))
    }
}

/// Build the display list for `page`.
///
/// Layers: background, elements in array order (bottom first), selection UI.
#[must_use]
pub fn build_scene(page: &Page, nodes: &NodeArena, cache: &ImageCache, ui: &UiState) -> Scene {
    let mut ops = Vec::with_capacity(page.elements.len() + 2);

    // Layer 1: background.
    let background = page
        .background
        .as_ref()
        .and_then(|_| cache.bitmap(&CacheKey::Background));
    ops.push(match background {
        Some(bitmap) => DrawOp::Background { width: page.width, height: page.height, bitmap: bitmap.clone() },
        None => DrawOp::BlankBackground { width: page.width, height: page.height },
    });

    // Layer 2: elements in z-order.
    for element in &page.elements {
        ops.push(draw_element(element, nodes.box_for(element), cache));
    }

    // Layer 3: selection UI.
    let selected = ui.selected_ids();
    let handles = selected.len() == 1;
    for id in selected {
        if let Some(element) = page.element(id) {
            ops.push(DrawOp::Selection { id: id.clone(), frame: nodes.box_for(element), handles });
        }
    }

    Scene { width: page.width, height: page.height, ops }
}

fn draw_element(element: &Element, frame: BoxRect, cache: &ImageCache) -> DrawOp {
    let id = element.id.clone();
    let paint = Paint {
        opacity: element.effective_opacity(),
        shadow: element.shadow.is_visible().then(|| element.shadow.clone()),
    };
    let bitmap = cache.bitmap(&CacheKey::Element(element.id.clone())).cloned();

    match &element.kind {
        ElementKind::Text(t) => DrawOp::Text { id, frame, props: t.clone(), paint },
        ElementKind::Shape(s) => DrawOp::Shape { id, frame, props: s.clone(), paint },
        ElementKind::Image(i) => match bitmap {
            Some(bitmap) => DrawOp::Image { id, frame, bitmap, border: i.border.clone(), paint },
            None => DrawOp::Placeholder { id, frame, label: IMAGE_PLACEHOLDER_LABEL, paint },
        },
        ElementKind::Qrcode(q) => match bitmap {
            Some(bitmap) => DrawOp::QrCode { id, frame, bitmap, border: q.border.clone(), paint },
            None => DrawOp::Placeholder { id, frame, label: QR_PLACEHOLDER_LABEL, paint },
        },
    }
}
