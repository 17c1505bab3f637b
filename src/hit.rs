//! Hit-testing: which rendered node or transform handle is under a page point.
//!
//! Tests run against the live render nodes, not the raw model, so an element
//! mid-gesture is hit where it is drawn. Handles of the single selected
//! element are tested before any element body.

#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::camera::{Camera, Point};
use crate::consts::{HANDLE_RADIUS_PX, ROTATE_HANDLE_OFFSET_PX};
use crate::element::ElementId;
use crate::pages::Page;
use crate::render::NodeArena;
use crate::transform::BoxRect;

/// Which part of an element was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitPart {
    Body,
    ResizeHandle(ResizeAnchor),
    RotateHandle,
}

/// Anchor position for resize handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeAnchor {
    N,
    Ne,
    E,
    Se,
    S,
    Sw,
    W,
    Nw,
}

impl ResizeAnchor {
    pub const ALL: [ResizeAnchor; 8] = [
        ResizeAnchor::Nw,
        ResizeAnchor::N,
        ResizeAnchor::Ne,
        ResizeAnchor::E,
        ResizeAnchor::Se,
        ResizeAnchor::S,
        ResizeAnchor::Sw,
        ResizeAnchor::W,
    ];

    #[must_use]
    pub fn moves_left(self) -> bool {
        matches!(self, Self::Nw | Self::W | Self::Sw)
    }

    #[must_use]
    pub fn moves_right(self) -> bool {
        matches!(self, Self::Ne | Self::E | Self::Se)
    }

    #[must_use]
    pub fn moves_top(self) -> bool {
        matches!(self, Self::Nw | Self::N | Self::Ne)
    }

    #[must_use]
    pub fn moves_bottom(self) -> bool {
        matches!(self, Self::Sw | Self::S | Self::Se)
    }

    #[must_use]
    pub fn is_corner(self) -> bool {
        matches!(self, Self::Nw | Self::Ne | Self::Se | Self::Sw)
    }

    /// Handle position in the box's local frame.
    #[must_use]
    pub fn local_position(self, width: f64, height: f64) -> Point {
        let x = if self.moves_left() {
            0.0
        } else if self.moves_right() {
            width
        } else {
            width / 2.0
        };
        let y = if self.moves_top() {
            0.0
        } else if self.moves_bottom() {
            height
        } else {
            height / 2.0
        };
        Point::new(x, y)
    }

    /// CSS cursor name shown while hovering or dragging this handle.
    #[must_use]
    pub fn cursor(self) -> &'static str {
        match self {
            Self::N | Self::S => "ns-resize",
            Self::E | Self::W => "ew-resize",
            Self::Ne | Self::Sw => "nesw-resize",
            Self::Nw | Self::Se => "nwse-resize",
        }
    }
}

/// Result of a hit test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub element_id: ElementId,
    pub part: HitPart,
}

/// Page-space position of the rotate handle for a box.
#[must_use]
pub fn rotate_handle_position(b: &BoxRect, camera: &Camera) -> Point {
    let offset = camera.screen_dist_to_page(ROTATE_HANDLE_OFFSET_PX);
    b.to_page(Point::new(b.width / 2.0, -offset))
}

/// Test which handle of `b` (if any) is under `pt`.
#[must_use]
pub fn hit_handles(pt: Point, b: &BoxRect, camera: &Camera) -> Option<HitPart> {
    let slop = camera.screen_dist_to_page(HANDLE_RADIUS_PX);

    if pt.distance(rotate_handle_position(b, camera)) <= slop {
        return Some(HitPart::RotateHandle);
    }
    ResizeAnchor::ALL
        .into_iter()
        .find(|anchor| pt.distance(b.to_page(anchor.local_position(b.width, b.height))) <= slop)
        .map(HitPart::ResizeHandle)
}

/// Topmost element whose rendered node contains `pt`.
#[must_use]
pub fn hit_element(pt: Point, page: &Page, nodes: &NodeArena) -> Option<ElementId> {
    page.elements
        .iter()
        .rev()
        .find(|el| nodes.box_for(el).contains(pt))
        .map(|el| el.id.clone())
}

/// Test what is under `pt`, checking the selected element's handles first.
///
/// `selected` is the single selected element, if exactly one is selected;
/// handles are not shown (and therefore not hit) for multi-selections.
#[must_use]
pub fn hit_test(pt: Point, page: &Page, nodes: &NodeArena, camera: &Camera, selected: Option<&ElementId>) -> Option<Hit> {
    if let Some(id) = selected {
        if let Some(el) = page.element(id) {
            if let Some(part) = hit_handles(pt, &nodes.box_for(el), camera) {
                return Some(Hit { element_id: id.clone(), part });
            }
        }
    }
    hit_element(pt, page, nodes).map(|element_id| Hit { element_id, part: HitPart::Body })
}
