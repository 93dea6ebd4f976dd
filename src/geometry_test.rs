#![allow(clippy::float_cmp)]

use super::*;

const EPSILON: f64 = 1e-10;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

// =============================================================
// Point
// =============================================================

#[test]
fn point_new() {
    let p = Point::new(3.0, 4.0);
    assert_eq!(p.x, 3.0);
    assert_eq!(p.y, 4.0);
}

#[test]
fn point_distance_is_euclidean() {
    let d = Point::new(0.0, 0.0).distance(Point::new(3.0, 4.0));
    assert!(approx_eq(d, 5.0));
}

#[test]
fn point_midpoint() {
    let m = Point::new(-2.0, 4.0).midpoint(Point::new(6.0, 0.0));
    assert_eq!(m, Point::new(2.0, 2.0));
}

#[test]
fn point_delta_from() {
    let d = Point::new(10.0, 5.0).delta_from(Point::new(4.0, 8.0));
    assert_eq!(d, Point::new(6.0, -3.0));
}

// =============================================================
// Rect
// =============================================================

#[test]
fn rect_contains_interior_and_edges() {
    let r = Rect::new(0.0, 0.0, 10.0, 10.0);
    assert!(r.contains(Point::new(5.0, 5.0)));
    assert!(r.contains(Point::new(0.0, 0.0)));
    assert!(r.contains(Point::new(10.0, 10.0)));
}

#[test]
fn rect_excludes_outside() {
    let r = Rect::new(0.0, 0.0, 10.0, 10.0);
    assert!(!r.contains(Point::new(10.1, 5.0)));
    assert!(!r.contains(Point::new(5.0, -0.1)));
}

// =============================================================
// Transform
// =============================================================

#[test]
fn transform_default_is_identity_scale() {
    let t = Transform::default();
    assert_eq!(t.scale_x, 1.0);
    assert_eq!(t.scale_y, 1.0);
    assert_eq!(t.position(), Point::new(0.0, 0.0));
}

#[test]
fn transform_compose_applies_parent_offset_and_scale() {
    let parent = Transform { x: 100.0, y: 50.0, scale_x: 2.0, scale_y: 3.0 };
    let local = Transform::at(10.0, 10.0);
    let world = parent.compose(&local);
    assert_eq!(world.x, 120.0);
    assert_eq!(world.y, 80.0);
    assert_eq!(world.scale_x, 2.0);
    assert_eq!(world.scale_y, 3.0);
}

#[test]
fn transform_serializes_camel_case() {
    let json = serde_json::to_value(Transform::at(1.0, 2.0)).unwrap_or_default();
    assert_eq!(json["scaleX"], 1.0);
    assert_eq!(json["x"], 1.0);
}
