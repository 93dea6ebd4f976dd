//! Viewport capability and the default pan/zoom camera.
//!
//! The runtime never does projection math of its own; it asks the viewport an
//! engine was created with. `Camera` is the implementation hosts use when
//! they have nothing fancier: a translated, uniformly scaled plane shown
//! inside a screen-space rectangle.

#[cfg(test)]
#[path = "viewport_test.rs"]
mod viewport_test;

use crate::geometry::{Point, Rect};

/// Screen↔world projection for one engine.
///
/// Screen coordinates are absolute (CSS pixels relative to the host surface),
/// not relative to [`Viewport::bounds`].
pub trait Viewport {
    /// Convert an absolute screen point to world coordinates.
    fn screen_to_world(&self, screen: Point) -> Point;

    /// Convert a world point to absolute screen coordinates.
    fn world_to_screen(&self, world: Point) -> Point;

    /// Screen-space rectangle the viewport occupies.
    fn bounds(&self) -> Rect;
}

/// Camera state for pan/zoom on the infinite canvas.
///
/// `pan_x` / `pan_y` are in CSS pixels relative to the viewport origin.
/// `zoom` is a scale factor (1.0 = no zoom).
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
    pub bounds: Rect,
}

impl Default for Camera {
    fn default() -> Self {
        Self { pan_x: 0.0, pan_y: 0.0, zoom: 1.0, bounds: Rect::default() }
    }
}

impl Camera {
    /// Unpanned, unzoomed camera filling `bounds`.
    #[must_use]
    pub fn with_bounds(bounds: Rect) -> Self {
        Self { bounds, ..Self::default() }
    }
}

impl Viewport for Camera {
    fn screen_to_world(&self, screen: Point) -> Point {
        Point {
            x: (screen.x - self.bounds.x - self.pan_x) / self.zoom,
            y: (screen.y - self.bounds.y - self.pan_y) / self.zoom,
        }
    }

    fn world_to_screen(&self, world: Point) -> Point {
        Point {
            x: world.x * self.zoom + self.pan_x + self.bounds.x,
            y: world.y * self.zoom + self.pan_y + self.bounds.y,
        }
    }

    fn bounds(&self) -> Rect {
        self.bounds
    }
}

/// Projection used when a subscriber's viewport cannot be resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityViewport;

impl Viewport for IdentityViewport {
    fn screen_to_world(&self, screen: Point) -> Point {
        screen
    }

    fn world_to_screen(&self, world: Point) -> Point {
        world
    }

    fn bounds(&self) -> Rect {
        Rect::default()
    }
}
