//! Raw input model: pointer ids, buttons, modifiers, and the pointer/wheel
//! events a host feeds into the gesture arbiter.
//!
//! Positions are absolute screen coordinates. `owner` is the object the host
//! hit-tested under the pointer, if any; the arbiter never hit-tests itself.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::Point;
use crate::object::ObjectId;

/// Host-assigned pointer identifier (mouse, pen, or one touch contact).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointerId(pub i32);

impl fmt::Display for PointerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Keyboard/mouse modifier keys held during an event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    /// Shift key is held.
    pub shift: bool,
    /// Ctrl key is held.
    pub ctrl: bool,
    /// Alt / Option key is held.
    pub alt: bool,
    /// Meta / Command key is held.
    pub meta: bool,
}

impl Modifiers {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Button {
    /// Left mouse button (or single-finger tap).
    #[default]
    Primary,
    /// Middle mouse button (scroll wheel click).
    Middle,
    /// Right mouse button (or two-finger tap).
    Secondary,
}

/// Wheel / trackpad scroll delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WheelDelta {
    /// Horizontal scroll amount in pixels.
    pub dx: f64,
    /// Vertical scroll amount in pixels (positive = down).
    pub dy: f64,
}

/// One pointer down/move/up/cancel event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    pub pointer_id: PointerId,
    /// Absolute screen position.
    pub screen: Point,
    /// Object under the pointer, as hit-tested by the host.
    pub owner: Option<ObjectId>,
    /// Host timestamp in milliseconds.
    pub timestamp: f64,
    pub button: Button,
    pub modifiers: Modifiers,
}

impl PointerInput {
    /// Primary-button input with no modifiers and no owner.
    #[must_use]
    pub fn new(pointer_id: i32, x: f64, y: f64, timestamp: f64) -> Self {
        Self {
            pointer_id: PointerId(pointer_id),
            screen: Point::new(x, y),
            owner: None,
            timestamp,
            button: Button::Primary,
            modifiers: Modifiers::none(),
        }
    }

    #[must_use]
    pub fn with_owner(mut self, owner: ObjectId) -> Self {
        self.owner = Some(owner);
        self
    }

    #[must_use]
    pub fn with_button(mut self, button: Button) -> Self {
        self.button = button;
        self
    }

    #[must_use]
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// One wheel / trackpad scroll event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelInput {
    pub screen: Point,
    pub owner: Option<ObjectId>,
    pub delta: WheelDelta,
    pub modifiers: Modifiers,
}

impl WheelInput {
    #[must_use]
    pub fn new(x: f64, y: f64, dx: f64, dy: f64) -> Self {
        Self {
            screen: Point::new(x, y),
            owner: None,
            delta: WheelDelta { dx, dy },
            modifiers: Modifiers::none(),
        }
    }

    #[must_use]
    pub fn with_owner(mut self, owner: ObjectId) -> Self {
        self.owner = Some(owner);
        self
    }

    #[must_use]
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}
