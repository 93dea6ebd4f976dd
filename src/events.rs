//! Semantic event kinds, payloads, and the typed subscription registry.
//!
//! Subscribers register for one [`EventKind`] under a [`Scope`]: either a
//! single object (fires only when that object is the event's logical owner)
//! or the global stream (fires for every event). Both scopes carry the
//! subscribing object's identity, which is what decides the viewport an
//! event is re-projected into for that subscriber.
//!
//! Lookup order is fixed: object-scoped subscriptions first, then global
//! ones, each in subscription order.

#[cfg(test)]
#[path = "events_test.rs"]
mod events_test;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::warn;

use crate::geometry::Point;
use crate::input::{Button, Modifiers, PointerId, WheelDelta};
use crate::object::ObjectId;
use crate::viewport::Viewport;

// =============================================================================
// KINDS
// =============================================================================

/// Every event the gesture arbiter emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    PointerDown,
    PointerMove,
    PointerUp,
    MouseWheel,
    DragStart,
    Drag,
    DragEnd,
    PinchStart,
    Pinch,
    PinchEnd,
}

impl EventKind {
    pub const DRAG: [EventKind; 3] = [EventKind::DragStart, EventKind::Drag, EventKind::DragEnd];
    pub const PINCH: [EventKind; 3] = [EventKind::PinchStart, EventKind::Pinch, EventKind::PinchEnd];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PointerDown => "pointerDown",
            Self::PointerMove => "pointerMove",
            Self::PointerUp => "pointerUp",
            Self::MouseWheel => "mouseWheel",
            Self::DragStart => "dragStart",
            Self::Drag => "drag",
            Self::DragEnd => "dragEnd",
            Self::PinchStart => "pinchStart",
            Self::Pinch => "pinch",
            Self::PinchEnd => "pinchEnd",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// A screen position projected into one subscriber's viewport.
///
/// `x`/`y` are world coordinates, `camera_*` are relative to the viewport's
/// top-left corner, and `screen_*` are the raw absolute coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPosition {
    pub x: f64,
    pub y: f64,
    pub camera_x: f64,
    pub camera_y: f64,
    pub screen_x: f64,
    pub screen_y: f64,
}

impl EventPosition {
    #[must_use]
    pub fn project(screen: Point, viewport: &dyn Viewport) -> Self {
        let world = viewport.screen_to_world(screen);
        let origin = viewport.bounds().origin();
        Self {
            x: world.x,
            y: world.y,
            camera_x: screen.x - origin.x,
            camera_y: screen.y - origin.y,
            screen_x: screen.x,
            screen_y: screen.y,
        }
    }

    /// World-space point.
    #[must_use]
    pub fn world(&self) -> Point {
        Point::new(self.x, self.y)
    }

    #[must_use]
    pub fn screen(&self) -> Point {
        Point::new(self.screen_x, self.screen_y)
    }
}

/// Payload delivered to subscribers. Kind-specific fields are `None` / empty
/// when they do not apply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GestureEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Logical owner: the object the pointer is attributed to.
    pub owner_id: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pointer_id: Option<PointerId>,
    /// Button pressed with the pointer; absent for wheel and pinch events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button: Option<Button>,
    pub position: EventPosition,
    pub modifiers: Modifiers,
    /// Drag start (drag kinds) or pinch start midpoint (pinch kinds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<EventPosition>,
    /// World-space `position - start` in this subscriber's viewport.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wheel: Option<WheelDelta>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pointer_list: Vec<EventPosition>,
    /// World-space distance between the pinch pointers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    /// Current screen distance over the pinch's starting screen distance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

impl GestureEvent {
    #[must_use]
    pub fn new(kind: EventKind, owner_id: Option<ObjectId>, position: EventPosition, modifiers: Modifiers) -> Self {
        Self {
            kind,
            owner_id,
            pointer_id: None,
            button: None,
            position,
            modifiers,
            start: None,
            delta: None,
            wheel: None,
            pointer_list: Vec::new(),
            distance: None,
            scale: None,
        }
    }

    #[must_use]
    pub fn with_pointer(mut self, pointer_id: PointerId) -> Self {
        self.pointer_id = Some(pointer_id);
        self
    }
}

// =============================================================================
// SUBSCRIPTIONS
// =============================================================================

/// Who a subscription listens for. Both variants carry the subscriber's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Only events whose logical owner is this object.
    Object(ObjectId),
    /// Every event, re-projected into this subscriber's viewport.
    Global(ObjectId),
}

impl Scope {
    /// Identity of the subscribing object.
    #[must_use]
    pub fn subscriber(self) -> ObjectId {
        match self {
            Scope::Object(id) | Scope::Global(id) => id,
        }
    }

    #[must_use]
    pub fn is_global(self) -> bool {
        matches!(self, Scope::Global(_))
    }

    /// Whether this scope receives events attributed to `owner`.
    #[must_use]
    pub fn matches(self, owner: Option<ObjectId>) -> bool {
        match self {
            Scope::Global(_) => true,
            Scope::Object(id) => owner == Some(id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

pub type EventCallback = Rc<RefCell<Box<dyn FnMut(&GestureEvent)>>>;

struct Subscription {
    kind: EventKind,
    scope: Scope,
    callback: EventCallback,
}

/// All live subscriptions, in subscription order.
#[derive(Default)]
pub struct EventRegistry {
    subscriptions: IndexMap<SubscriptionId, Subscription>,
    next_id: u64,
}

impl EventRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &mut self,
        kind: EventKind,
        scope: Scope,
        callback: impl FnMut(&GestureEvent) + 'static,
    ) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        let callback: EventCallback = Rc::new(RefCell::new(Box::new(callback)));
        self.subscriptions.insert(id, Subscription { kind, scope, callback });
        id
    }

    /// Drop every `kind` subscription held by `subscriber`, in either scope.
    /// Returns how many were removed.
    pub fn unsubscribe(&mut self, kind: EventKind, subscriber: ObjectId) -> usize {
        let before = self.subscriptions.len();
        self.subscriptions
            .retain(|_, sub| !(sub.kind == kind && sub.scope.subscriber() == subscriber));
        before - self.subscriptions.len()
    }

    /// Drop every subscription held by `subscriber`.
    pub fn unsubscribe_all(&mut self, subscriber: ObjectId) -> usize {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|_, sub| sub.scope.subscriber() != subscriber);
        before - self.subscriptions.len()
    }

    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.shift_remove(&id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Subscriptions for `kind` that receive an event owned by `owner`,
    /// object-scoped first, then global.
    #[must_use]
    pub fn targets(&self, kind: EventKind, owner: Option<ObjectId>) -> Vec<(Scope, EventCallback)> {
        let of_kind: Vec<&Subscription> = self.subscriptions.values().filter(|sub| sub.kind == kind).collect();
        let object_scoped = of_kind.iter().filter(|sub| !sub.scope.is_global() && sub.scope.matches(owner));
        let global = of_kind.iter().filter(|sub| sub.scope.is_global());
        object_scoped
            .chain(global)
            .map(|sub| (sub.scope, Rc::clone(&sub.callback)))
            .collect()
    }

    /// Callbacks registered for exactly `kind` under exactly `scope`.
    #[must_use]
    pub fn callbacks_for(&self, kind: EventKind, scope: Scope) -> Vec<EventCallback> {
        self.subscriptions
            .values()
            .filter(|sub| sub.kind == kind && sub.scope == scope)
            .map(|sub| Rc::clone(&sub.callback))
            .collect()
    }

    /// Distinct scopes interested in any of `kinds` for events owned by any
    /// of `owners`: object scopes first, then global scopes.
    #[must_use]
    pub fn interested(&self, kinds: &[EventKind], owners: &[ObjectId]) -> Vec<Scope> {
        let relevant: Vec<Scope> = self
            .subscriptions
            .values()
            .filter(|sub| kinds.contains(&sub.kind))
            .map(|sub| sub.scope)
            .collect();
        let object_scoped = relevant
            .iter()
            .filter(|scope| matches!(scope, Scope::Object(id) if owners.contains(id)));
        let global = relevant.iter().filter(|scope| scope.is_global());

        let mut scopes: Vec<Scope> = Vec::new();
        for scope in object_scoped.chain(global) {
            if !scopes.contains(scope) {
                scopes.push(*scope);
            }
        }
        scopes
    }
}

/// Invoke one callback, skipping it if it is already running.
pub(crate) fn invoke(callback: &EventCallback, event: &GestureEvent) -> bool {
    match callback.try_borrow_mut() {
        Ok(mut callback) => {
            callback(event);
            true
        }
        Err(_) => {
            warn!(kind = %event.kind, "event callback re-entered; skipped");
            false
        }
    }
}
