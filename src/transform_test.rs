#![allow(clippy::float_cmp)]

use super::*;
use crate::element::{ImageProps, QrProps, ShapeProps, TextProps};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn assert_point(p: Point, x: f64, y: f64) {
    assert!(approx(p.x, x) && approx(p.y, y), "expected ({x}, {y}), got ({}, {})", p.x, p.y);
}

fn rect(x: f64, y: f64, width: f64, height: f64, rotation: f64) -> BoxRect {
    BoxRect { x, y, width, height, rotation }
}

fn text_at(x: f64, y: f64) -> Element {
    Element::new(ElementKind::Text(TextProps::default()), x, y)
}

fn image(lock_ratio: bool) -> Element {
    Element::new(ElementKind::Image(ImageProps { lock_ratio, ..ImageProps::default() }), 0.0, 0.0)
}

fn shape(shape_type: ShapeType) -> Element {
    Element::new(ElementKind::Shape(ShapeProps::new(shape_type)), 0.0, 0.0)
}

// =============================================================
// BoxRect
// =============================================================

#[test]
fn local_and_page_frames_round_trip_under_rotation() {
    let b = rect(40.0, 60.0, 100.0, 50.0, 37.0);
    let p = Point::new(71.0, 88.0);
    let back = b.to_page(b.to_local(p));
    assert_point(back, 71.0, 88.0);
}

#[test]
fn contains_unrotated() {
    let b = rect(10.0, 10.0, 100.0, 50.0, 0.0);
    assert!(b.contains(Point::new(10.0, 10.0)));
    assert!(b.contains(Point::new(60.0, 35.0)));
    assert!(!b.contains(Point::new(111.0, 35.0)));
}

#[test]
fn contains_follows_rotation_about_top_left() {
    let b = rect(0.0, 0.0, 100.0, 50.0, 90.0);
    assert!(b.contains(Point::new(-25.0, 50.0)));
    assert!(!b.contains(Point::new(25.0, 25.0)));
}

#[test]
fn center_of_rotated_box() {
    let b = rect(0.0, 0.0, 100.0, 50.0, 180.0);
    assert_point(b.center(), -50.0, -25.0);
}

// =============================================================
// bound_box
// =============================================================

#[test]
fn bound_box_accepts_large_enough_box() {
    let old = rect(0.0, 0.0, 100.0, 100.0, 0.0);
    let proposed = rect(0.0, 0.0, 10.0, 10.0, 0.0);
    assert_eq!(bound_box(old, proposed), proposed);
}

#[test]
fn bound_box_rejects_below_minimum() {
    let old = rect(0.0, 0.0, 100.0, 100.0, 0.0);
    assert_eq!(bound_box(old, rect(0.0, 0.0, 9.0, 50.0, 0.0)), old);
    assert_eq!(bound_box(old, rect(0.0, 0.0, 50.0, 9.99, 0.0)), old);
    assert_eq!(bound_box(old, rect(0.0, 0.0, -40.0, 50.0, 0.0)), old);
}

#[test]
fn bound_box_rejects_non_finite_origin() {
    let old = rect(0.0, 0.0, 100.0, 100.0, 0.0);
    assert_eq!(bound_box(old, rect(f64::NAN, 0.0, 50.0, 50.0, 0.0)), old);
}

#[test]
fn hold_min_width_keeps_right_edge_for_left_handles() {
    let b = rect(100.0, 0.0, 30.0, 40.0, 0.0);
    let held = hold_min_width(b, ResizeAnchor::W, 50.0);
    assert_eq!((held.x, held.width), (80.0, 50.0));
    assert_eq!(held.x + held.width, b.x + b.width);

    let held = hold_min_width(b, ResizeAnchor::E, 50.0);
    assert_eq!((held.x, held.width), (100.0, 50.0));
}

#[test]
fn hold_min_width_follows_rotation() {
    let b = rect(0.0, 0.0, 30.0, 40.0, 90.0);
    let held = hold_min_width(b, ResizeAnchor::Sw, 50.0);
    assert_point(Point::new(held.x, held.y), 0.0, -20.0);
    assert_point(held.to_page(Point::new(held.width, 0.0)), b.to_page(Point::new(b.width, 0.0)).x, 30.0);
}

#[test]
fn hold_min_width_leaves_wide_boxes_alone() {
    let b = rect(5.0, 5.0, 80.0, 40.0, 0.0);
    assert_eq!(hold_min_width(b, ResizeAnchor::Nw, 50.0), b);
    assert_eq!(min_live_width(&text_at(0.0, 0.0)), MIN_TEXT_WIDTH);
    assert_eq!(min_live_width(&shape(ShapeType::Rectangle)), MIN_BOX_SIZE);
}

// =============================================================
// AspectPolicy
// =============================================================

#[test]
fn aspect_policy_per_element() {
    assert_eq!(AspectPolicy::for_element(&image(true)), AspectPolicy::Locked);
    assert_eq!(AspectPolicy::for_element(&image(false)), AspectPolicy::Free);
    assert_eq!(AspectPolicy::for_element(&shape(ShapeType::Circle)), AspectPolicy::Square);
    assert_eq!(AspectPolicy::for_element(&shape(ShapeType::Rectangle)), AspectPolicy::Free);
    assert_eq!(AspectPolicy::for_element(&text_at(0.0, 0.0)), AspectPolicy::Free);
}

// =============================================================
// resize_box
// =============================================================

#[test]
fn resize_se_free() {
    let b = resize_box(rect(0.0, 0.0, 100.0, 50.0, 0.0), ResizeAnchor::Se, Point::new(20.0, 10.0), AspectPolicy::Free);
    assert_eq!(b, rect(0.0, 0.0, 120.0, 60.0, 0.0));
}

#[test]
fn resize_nw_moves_origin() {
    let b = resize_box(rect(0.0, 0.0, 100.0, 50.0, 0.0), ResizeAnchor::Nw, Point::new(10.0, 10.0), AspectPolicy::Free);
    assert_eq!(b, rect(10.0, 10.0, 90.0, 40.0, 0.0));
}

#[test]
fn resize_edge_changes_one_axis() {
    let b = resize_box(rect(0.0, 0.0, 100.0, 50.0, 0.0), ResizeAnchor::E, Point::new(20.0, 30.0), AspectPolicy::Locked);
    assert_eq!(b, rect(0.0, 0.0, 120.0, 50.0, 0.0));
}

#[test]
fn resize_locked_corner_scales_uniformly() {
    let b = resize_box(rect(0.0, 0.0, 100.0, 50.0, 0.0), ResizeAnchor::Se, Point::new(100.0, 0.0), AspectPolicy::Locked);
    assert_eq!(b, rect(0.0, 0.0, 200.0, 100.0, 0.0));
}

#[test]
fn resize_locked_nw_keeps_opposite_corner() {
    let b = resize_box(rect(0.0, 0.0, 100.0, 50.0, 0.0), ResizeAnchor::Nw, Point::new(-100.0, 0.0), AspectPolicy::Locked);
    assert_eq!(b, rect(-100.0, -50.0, 200.0, 100.0, 0.0));
}

#[test]
fn resize_square_corner_keeps_equal_sides() {
    let b = resize_box(rect(0.0, 0.0, 100.0, 100.0, 0.0), ResizeAnchor::Se, Point::new(50.0, 10.0), AspectPolicy::Square);
    assert!(approx(b.width, b.height));
    assert!(approx(b.width, 150.0));
}

#[test]
fn resize_applies_delta_in_local_frame() {
    let b = resize_box(rect(100.0, 100.0, 100.0, 50.0, 90.0), ResizeAnchor::E, Point::new(0.0, 20.0), AspectPolicy::Free);
    assert!(approx(b.width, 120.0));
    assert!(approx(b.height, 50.0));
    assert_point(Point::new(b.x, b.y), 100.0, 100.0);
}

// =============================================================
// Rotation helpers
// =============================================================

#[test]
fn rotate_about_center_keeps_center_fixed() {
    let b = rect(0.0, 0.0, 100.0, 50.0, 0.0);
    let origin = rotate_about_center(b, 90.0);
    assert_point(origin, 75.0, -25.0);
    let rotated = rect(origin.x, origin.y, 100.0, 50.0, 90.0);
    assert_point(rotated.center(), 50.0, 25.0);
}

#[test]
fn snap_rotation_rounds_to_step() {
    assert_eq!(snap_rotation(22.0, 15.0), 15.0);
    assert_eq!(snap_rotation(23.0, 15.0), 30.0);
    assert_eq!(snap_rotation(-8.0, 15.0), -15.0);
    assert_eq!(snap_rotation(17.0, 0.0), 17.0);
}

#[test]
fn normalize_degrees_wraps_into_range() {
    assert_eq!(normalize_degrees(-90.0), 270.0);
    assert_eq!(normalize_degrees(360.0), 0.0);
    assert_eq!(normalize_degrees(725.0), 5.0);
    assert_eq!(normalize_degrees(0.0), 0.0);
}

// =============================================================
// resize_outcome
// =============================================================

#[test]
fn text_resize_scales_width_and_font() {
    let el = text_at(100.0, 100.0);
    let out = resize_outcome(&el, 1.5, 2.0);
    assert_eq!(out.width, 300.0);
    assert_eq!(out.font_size, Some(48.0));
}

#[test]
fn text_resize_respects_floors() {
    let out = resize_outcome(&text_at(0.0, 0.0), 0.1, 0.1);
    assert_eq!(out.width, MIN_TEXT_WIDTH);
    assert_eq!(out.font_size, Some(MIN_FONT_SIZE));
}

#[test]
fn locked_image_uses_dominant_scale() {
    let out = resize_outcome(&image(true), 2.0, 1.2);
    assert_eq!((out.width, out.height), (400.0, 300.0));
    assert!(out.font_size.is_none());
}

#[test]
fn unlocked_image_scales_independently() {
    let out = resize_outcome(&image(false), 2.0, 1.2);
    assert!(approx(out.width, 400.0));
    assert!(approx(out.height, 180.0));
}

#[test]
fn circle_stays_square() {
    let out = resize_outcome(&shape(ShapeType::Circle), 1.5, 1.0);
    assert_eq!((out.width, out.height), (150.0, 150.0));
}

#[test]
fn shape_and_qr_floor_at_minimum() {
    let out = resize_outcome(&shape(ShapeType::Rectangle), 0.01, 0.01);
    assert_eq!((out.width, out.height), (MIN_ELEMENT_SIZE, MIN_ELEMENT_SIZE));

    let qr = Element::new(ElementKind::Qrcode(QrProps::default()), 0.0, 0.0);
    let out = resize_outcome(&qr, 0.01, 2.0);
    assert_eq!((out.width, out.height), (MIN_ELEMENT_SIZE, 240.0));
}

#[test]
fn negative_scale_is_treated_as_magnitude() {
    let out = resize_outcome(&shape(ShapeType::Rectangle), -2.0, 1.0);
    assert_eq!(out.width, 300.0);
}

// =============================================================
// commit
// =============================================================

#[test]
fn commit_folds_scale_and_resets_node() {
    let mut el = text_at(100.0, 100.0);
    let mut node = RenderNode { x: 110.0, y: 90.0, rotation: -30.0, scale_x: 1.5, scale_y: 2.0 };
    commit(&mut el, &mut node);

    assert_eq!((el.x, el.y), (110.0, 90.0));
    assert_eq!(el.rotation, 330.0);
    let ElementKind::Text(ref t) = el.kind else { panic!("text expected") };
    assert_eq!(t.width, 300.0);
    assert_eq!(t.font_size, 48.0);
    assert_eq!((node.scale_x, node.scale_y), (1.0, 1.0));
    assert_eq!(node.rotation, 330.0);
}

#[test]
fn repeated_text_commits_compound_from_model() {
    let mut el = text_at(100.0, 100.0);
    let mut node = RenderNode::from_element(&el);

    node.scale_x = 1.5;
    node.scale_y = 2.0;
    commit(&mut el, &mut node);
    node.scale_x = 1.5;
    node.scale_y = 2.0;
    commit(&mut el, &mut node);

    let ElementKind::Text(ref t) = el.kind else { panic!("text expected") };
    assert_eq!(t.width, 450.0);
    assert_eq!(t.font_size, 96.0);
}

#[test]
fn commit_without_scale_keeps_size() {
    let mut el = shape(ShapeType::Rectangle);
    let mut node = RenderNode { x: 5.0, y: 6.0, rotation: 0.0, scale_x: 1.0, scale_y: 1.0 };
    commit(&mut el, &mut node);
    assert_eq!(el.size(), (150.0, 100.0));
    assert_eq!((el.x, el.y), (5.0, 6.0));
}
