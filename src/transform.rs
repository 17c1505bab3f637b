//! Transform math: proposed boxes, the minimum-size guard, aspect policy, and
//! the commit routine that writes a finished gesture back into the model.
//!
//! During a gesture only the element's [`RenderNode`] changes: position,
//! rotation, and live scale factors. [`commit`] is the single place where a
//! node's accumulated transform becomes model data. It folds the scale into
//! the element's dimensions (and font size for text) and then resets the live
//! scale to 1, so the next gesture starts from the updated model instead of
//! multiplying against it a second time. Every element type goes through it.

#[cfg(test)]
#[path = "transform_test.rs"]
mod transform_test;

use crate::camera::Point;
use crate::consts::{MIN_BOX_SIZE, MIN_ELEMENT_SIZE, MIN_FONT_SIZE, MIN_TEXT_WIDTH};
use crate::element::{Element, ElementKind, ShapeType};
use crate::hit::ResizeAnchor;
use crate::render::RenderNode;

/// A possibly rotated box. `x`, `y` is the top-left corner, which is also the
/// rotation pivot; `rotation` is clockwise degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub rotation: f64,
}

impl BoxRect {
    /// Map a page point into this box's unrotated local frame (origin at top-left).
    #[must_use]
    pub fn to_local(&self, p: Point) -> Point {
        rotate_vec(Point::new(p.x - self.x, p.y - self.y), -self.rotation)
    }

    /// Map a local-frame point back to page coordinates.
    #[must_use]
    pub fn to_page(&self, local: Point) -> Point {
        let r = rotate_vec(local, self.rotation);
        Point::new(self.x + r.x, self.y + r.y)
    }

    /// Whether a page point falls inside the box (edges inclusive).
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        let l = self.to_local(p);
        l.x >= 0.0 && l.x <= self.width && l.y >= 0.0 && l.y <= self.height
    }

    #[must_use]
    pub fn center(&self) -> Point {
        self.to_page(Point::new(self.width / 2.0, self.height / 2.0))
    }
}

/// Rotate a vector clockwise by `deg` degrees (screen coordinates, y down).
#[must_use]
pub fn rotate_vec(v: Point, deg: f64) -> Point {
    let (sin, cos) = deg.to_radians().sin_cos();
    Point::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Bounding-box guard used while dragging handles: a proposed box smaller than
/// [`MIN_BOX_SIZE`] on either side (or inverted) is rejected and `old` is kept.
#[must_use]
pub fn bound_box(old: BoxRect, proposed: BoxRect) -> BoxRect {
    let valid = proposed.width >= MIN_BOX_SIZE
        && proposed.height >= MIN_BOX_SIZE
        && proposed.x.is_finite()
        && proposed.y.is_finite();
    if valid { proposed } else { old }
}

/// Narrowest live box a resize may produce for `element`. Text keeps its
/// committed width floor so the live box matches what commit will write.
#[must_use]
pub fn min_live_width(element: &Element) -> f64 {
    match &element.kind {
        ElementKind::Text(_) => MIN_TEXT_WIDTH,
        ElementKind::Image(_) | ElementKind::Shape(_) | ElementKind::Qrcode(_) => MIN_BOX_SIZE,
    }
}

/// Widen `b` to `min_width`, keeping the edge opposite the dragged handle fixed.
#[must_use]
pub fn hold_min_width(b: BoxRect, anchor: ResizeAnchor, min_width: f64) -> BoxRect {
    if b.width >= min_width {
        return b;
    }
    let grow = min_width - b.width;
    let origin = if anchor.moves_left() { b.to_page(Point::new(-grow, 0.0)) } else { Point::new(b.x, b.y) };
    BoxRect { x: origin.x, y: origin.y, width: min_width, ..b }
}

/// How width and height relate while resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectPolicy {
    /// Width and height scale independently.
    Free,
    /// Both dimensions scale by the same factor.
    Locked,
    /// Width always equals height.
    Square,
}

impl AspectPolicy {
    #[must_use]
    pub fn for_element(element: &Element) -> Self {
        match &element.kind {
            ElementKind::Image(i) if i.lock_ratio => Self::Locked,
            ElementKind::Shape(s) if s.shape_type == ShapeType::Circle => Self::Square,
            ElementKind::Text(_) | ElementKind::Image(_) | ElementKind::Shape(_) | ElementKind::Qrcode(_) => {
                Self::Free
            }
        }
    }
}

/// Proposed box for dragging `anchor` of `orig` by a page-space pointer delta.
///
/// The delta is applied in the box's local (unrotated) frame; the edge
/// opposite the anchor stays put. Corner drags under a locked or square
/// policy scale uniformly by the larger of the two axis factors.
#[must_use]
pub fn resize_box(orig: BoxRect, anchor: ResizeAnchor, delta: Point, policy: AspectPolicy) -> BoxRect {
    let d = rotate_vec(delta, -orig.rotation);
    let (mut left, mut top, mut right, mut bottom) = (0.0, 0.0, orig.width, orig.height);

    if anchor.moves_left() {
        left += d.x;
    }
    if anchor.moves_right() {
        right += d.x;
    }
    if anchor.moves_top() {
        top += d.y;
    }
    if anchor.moves_bottom() {
        bottom += d.y;
    }

    let mut width = right - left;
    let mut height = bottom - top;

    if policy != AspectPolicy::Free && anchor.is_corner() && orig.width > 0.0 && orig.height > 0.0 {
        let s = (width / orig.width).max(height / orig.height);
        width = orig.width * s;
        height = orig.height * s;
        if anchor.moves_left() {
            left = right - width;
        }
        if anchor.moves_top() {
            top = bottom - height;
        }
    }

    let origin = orig.to_page(Point::new(left, top));
    BoxRect { x: origin.x, y: origin.y, width, height, rotation: orig.rotation }
}

/// Top-left position that keeps `b`'s center fixed when rotated to `rotation`.
#[must_use]
pub fn rotate_about_center(b: BoxRect, rotation: f64) -> Point {
    let center = b.center();
    let half = rotate_vec(Point::new(b.width / 2.0, b.height / 2.0), rotation);
    Point::new(center.x - half.x, center.y - half.y)
}

/// Round `deg` to the nearest multiple of `step`.
#[must_use]
pub fn snap_rotation(deg: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return deg;
    }
    (deg / step).round() * step
}

/// Normalize degrees into `[0, 360)`.
#[must_use]
pub fn normalize_degrees(deg: f64) -> f64 {
    let d = deg.rem_euclid(360.0);
    if (d - 360.0).abs() < 1e-9 { 0.0 } else { d }
}

/// New model dimensions produced by folding a live scale into an element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeOutcome {
    pub width: f64,
    pub height: f64,
    /// New font size; text elements only.
    pub font_size: Option<f64>,
}

/// Compute the model dimensions for `element` scaled by `scale_x`×`scale_y`,
/// applying the type's size floor and aspect policy.
#[must_use]
pub fn resize_outcome(element: &Element, scale_x: f64, scale_y: f64) -> ResizeOutcome {
    let sx = scale_x.abs();
    let sy = scale_y.abs();
    let (w, h) = element.size();

    match &element.kind {
        ElementKind::Text(t) => ResizeOutcome {
            width: (w * sx).max(MIN_TEXT_WIDTH),
            height: h,
            font_size: Some((t.font_size * sy).round().max(MIN_FONT_SIZE)),
        },
        ElementKind::Image(_) | ElementKind::Shape(_) | ElementKind::Qrcode(_) => {
            let (width, height) = match AspectPolicy::for_element(element) {
                AspectPolicy::Free => (w * sx, h * sy),
                AspectPolicy::Locked => {
                    let s = dominant_scale(sx, sy);
                    (w * s, h * s)
                }
                AspectPolicy::Square => {
                    let side = (w * sx).max(h * sy);
                    (side, side)
                }
            };
            ResizeOutcome {
                width: width.max(MIN_ELEMENT_SIZE),
                height: height.max(MIN_ELEMENT_SIZE),
                font_size: None,
            }
        }
    }
}

/// The factor that moved further from 1; used for ratio-locked commits.
fn dominant_scale(sx: f64, sy: f64) -> f64 {
    if (sx - 1.0).abs() >= (sy - 1.0).abs() { sx } else { sy }
}

/// Fold a node's accumulated transform into its element and reset the node.
///
/// Writes position and rotation, folds the live scale into `width`/`height`
/// (and `fontSize` for text) through [`resize_outcome`], then resets the
/// node's scale to 1 and re-syncs it with the model.
pub fn commit(element: &mut Element, node: &mut RenderNode) {
    element.x = node.x;
    element.y = node.y;
    element.rotation = normalize_degrees(node.rotation);

    let scaled = (node.scale_x - 1.0).abs() > f64::EPSILON || (node.scale_y - 1.0).abs() > f64::EPSILON;
    if scaled {
        let outcome = resize_outcome(element, node.scale_x, node.scale_y);
        element.set_size(outcome.width, outcome.height);
        if let (Some(font_size), ElementKind::Text(t)) = (outcome.font_size, &mut element.kind) {
            t.font_size = font_size;
        }
    }

    node.reset_to(element);
}
