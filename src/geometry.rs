//! Plain value types shared by every subsystem: points, rectangles, transforms.

#[cfg(test)]
#[path = "geometry_test.rs"]
mod geometry_test;

use serde::{Deserialize, Serialize};

/// A point in either screen or world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Point halfway between `self` and `other`.
    #[must_use]
    pub fn midpoint(self, other: Point) -> Point {
        Point { x: (self.x + other.x) * 0.5, y: (self.y + other.y) * 0.5 }
    }

    /// Component-wise `self - other`.
    #[must_use]
    pub fn delta_from(self, other: Point) -> Point {
        Point { x: self.x - other.x, y: self.y - other.y }
    }
}

/// Axis-aligned rectangle. `x`/`y` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Whether `p` lies inside or on the edge of the rectangle.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    /// Top-left corner.
    #[must_use]
    pub fn origin(&self) -> Point {
        Point { x: self.x, y: self.y }
    }
}

/// Position and scale of an object. Rotation is owned by the scene layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, scale_x: 1.0, scale_y: 1.0 }
    }
}

impl Transform {
    /// Unscaled transform at `(x, y)`.
    #[must_use]
    pub fn at(x: f64, y: f64) -> Self {
        Self { x, y, ..Self::default() }
    }

    #[must_use]
    pub fn position(&self) -> Point {
        Point { x: self.x, y: self.y }
    }

    /// Express `local` (relative to `self`) in the coordinate space `self` lives in.
    #[must_use]
    pub fn compose(&self, local: &Transform) -> Transform {
        Transform {
            x: self.x + local.x * self.scale_x,
            y: self.y + local.y * self.scale_y,
            scale_x: self.scale_x * local.scale_x,
            scale_y: self.scale_y * local.scale_y,
        }
    }
}
