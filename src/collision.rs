//! Spatial overlap detection between colliders with persistent contact tracking.
//!
//! DESIGN
//! ======
//! Broad phase is a sweep line along x. Every collider contributes a left
//! and a right endpoint; all left endpoints are emitted before all right
//! endpoints and the list is stable-sorted by x, so at equal x a collider
//! entering is tested before one leaving. That keeps touching shapes
//! (inclusive narrow-phase tests) from being dropped by the broad phase.
//!
//! Narrow phase is an exhaustive match over the closed [`Shape`] set.
//!
//! Contact bookkeeping is per collider: a persistent contact map survives
//! across frames and a per-frame accumulator is rebuilt every step. The
//! difference between the two yields begin/end transitions.

#[cfg(test)]
#[path = "collision_test.rs"]
mod collision_test;

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::geometry::Point;
use crate::object::{ObjectId, Positionable};
use crate::registry::Registry;

/// Identifier of a collider within one collision engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ColliderId(u64);

impl fmt::Display for ColliderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "collider-{}", self.0)
    }
}

/// Hit-test primitive. Positions are the collider's world position: the
/// top-left corner for rects, the center for circles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    Point,
    Circle { radius: f64 },
    Rect { width: f64, height: f64 },
}

impl Shape {
    /// Horizontal extent `[left, right]` of the shape placed at `at`.
    #[must_use]
    pub fn x_extent(&self, at: Point) -> (f64, f64) {
        match *self {
            Shape::Point => (at.x, at.x),
            Shape::Circle { radius } => (at.x - radius, at.x + radius),
            Shape::Rect { width, .. } => (at.x.min(at.x + width), at.x.max(at.x + width)),
        }
    }
}

/// Edges of a rect placed at `at`: `(left, top, right, bottom)`.
fn rect_edges(at: Point, width: f64, height: f64) -> (f64, f64, f64, f64) {
    (at.x.min(at.x + width), at.y.min(at.y + height), at.x.max(at.x + width), at.y.max(at.y + height))
}

fn dist_sq(a: Point, b: Point) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

/// Exact overlap test between two placed shapes. Boundaries count as touching.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn intersects(a_at: Point, a: Shape, b_at: Point, b: Shape) -> bool {
    match (a, b) {
        (Shape::Rect { width: aw, height: ah }, Shape::Rect { width: bw, height: bh }) => {
            let (al, at, ar, ab) = rect_edges(a_at, aw, ah);
            let (bl, bt, br, bb) = rect_edges(b_at, bw, bh);
            al <= br && bl <= ar && at <= bb && bt <= ab
        }
        (Shape::Rect { width, height }, Shape::Circle { radius }) => rect_circle(a_at, width, height, b_at, radius),
        (Shape::Circle { radius }, Shape::Rect { width, height }) => rect_circle(b_at, width, height, a_at, radius),
        (Shape::Rect { width, height }, Shape::Point) => rect_point(a_at, width, height, b_at),
        (Shape::Point, Shape::Rect { width, height }) => rect_point(b_at, width, height, a_at),
        (Shape::Circle { radius: ar }, Shape::Circle { radius: br }) => {
            let reach = ar + br;
            dist_sq(a_at, b_at) <= reach * reach
        }
        (Shape::Circle { radius }, Shape::Point) => dist_sq(a_at, b_at) <= radius * radius,
        (Shape::Point, Shape::Circle { radius }) => dist_sq(a_at, b_at) <= radius * radius,
        (Shape::Point, Shape::Point) => a_at.x == b_at.x && a_at.y == b_at.y,
    }
}

fn rect_circle(rect_at: Point, width: f64, height: f64, center: Point, radius: f64) -> bool {
    let (l, t, r, b) = rect_edges(rect_at, width, height);
    let closest = Point::new(center.x.clamp(l, r), center.y.clamp(t, b));
    dist_sq(closest, center) <= radius * radius
}

fn rect_point(rect_at: Point, width: f64, height: f64, p: Point) -> bool {
    let (l, t, r, b) = rect_edges(rect_at, width, height);
    p.x >= l && p.x <= r && p.y >= t && p.y <= b
}

// =============================================================================
// CONTACT EVENTS
// =============================================================================

/// Phase of a contact between two colliders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactKind {
    /// First frame the pair touches.
    Begin,
    /// Every frame the pair touches, including the first.
    Collide,
    /// First frame the pair no longer touches.
    End,
}

/// One side of a contact transition. Pairs are reported once per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactEvent {
    pub kind: ContactKind,
    /// Collider whose callbacks fire.
    pub collider: ColliderId,
    pub owner: ObjectId,
    /// Collider it is touching (or stopped touching).
    pub other: ColliderId,
    pub other_owner: ObjectId,
}

pub type ContactCallback = Box<dyn FnMut(&ContactEvent)>;

/// Begin/collide/end callbacks attached to a collider.
#[derive(Default)]
pub struct ContactHandlers {
    begin: RefCell<Option<ContactCallback>>,
    collide: RefCell<Option<ContactCallback>>,
    end: RefCell<Option<ContactCallback>>,
}

impl ContactHandlers {
    /// Invoke the callback matching `event.kind`, if any.
    ///
    /// A callback that is already running (re-entrant dispatch) is skipped.
    pub fn dispatch(&self, event: &ContactEvent) {
        let slot = match event.kind {
            ContactKind::Begin => &self.begin,
            ContactKind::Collide => &self.collide,
            ContactKind::End => &self.end,
        };
        match slot.try_borrow_mut() {
            Ok(mut callback) => {
                if let Some(callback) = callback.as_mut() {
                    callback(event);
                }
            }
            Err(_) => warn!(collider = %event.collider, kind = ?event.kind, "contact callback re-entered; skipped"),
        }
    }
}

// =============================================================================
// COLLIDER
// =============================================================================

/// A shape bound to a positionable owner, offset from the owner's position.
pub struct Collider {
    owner: ObjectId,
    object: Weak<dyn Positionable>,
    shape: Shape,
    offset: Point,
    handlers: Rc<ContactHandlers>,
}

impl Collider {
    /// Bind `shape` to `owner` with no offset.
    #[must_use]
    pub fn new<T: Positionable + 'static>(owner: &Rc<T>, shape: Shape) -> Self {
        let object = Rc::downgrade(owner);
        let object: Weak<dyn Positionable> = object;
        Self {
            owner: owner.identity(),
            object,
            shape,
            offset: Point::default(),
            handlers: Rc::new(ContactHandlers::default()),
        }
    }

    /// Offset from the owner's world position.
    #[must_use]
    pub fn with_offset(mut self, offset: Point) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn on_begin(self, callback: impl FnMut(&ContactEvent) + 'static) -> Self {
        *self.handlers.begin.borrow_mut() = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn on_collide(self, callback: impl FnMut(&ContactEvent) + 'static) -> Self {
        *self.handlers.collide.borrow_mut() = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn on_end(self, callback: impl FnMut(&ContactEvent) + 'static) -> Self {
        *self.handlers.end.borrow_mut() = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    #[must_use]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    #[must_use]
    pub fn offset(&self) -> Point {
        self.offset
    }

    /// Owner's world position plus the local offset. `None` once the owner is dropped.
    #[must_use]
    pub fn world_position(&self, registry: &Registry) -> Option<Point> {
        let object = self.object.upgrade()?;
        let world = registry.world_transform_of(object.as_ref());
        Some(Point::new(world.x + self.offset.x, world.y + self.offset.y))
    }
}

struct ColliderSlot {
    collider: Collider,
    /// Colliders currently touching this one, with their owners.
    contacts: BTreeMap<ColliderId, ObjectId>,
    /// Colliders seen touching during the current step.
    frame_hits: BTreeSet<ColliderId>,
}

struct Placed {
    id: ColliderId,
    owner: ObjectId,
    at: Point,
    shape: Shape,
}

struct Endpoint {
    x: f64,
    index: usize,
    left: bool,
}

// =============================================================================
// ENGINE
// =============================================================================

/// Sweep-line collision detector for one engine.
#[derive(Default)]
pub struct CollisionEngine {
    colliders: IndexMap<ColliderId, ColliderSlot>,
    next_id: u64,
}

impl CollisionEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collider. Ids are never reused within one engine.
    pub fn add(&mut self, collider: Collider) -> ColliderId {
        self.next_id += 1;
        let id = ColliderId(self.next_id);
        self.colliders.insert(
            id,
            ColliderSlot { collider, contacts: BTreeMap::new(), frame_hits: BTreeSet::new() },
        );
        id
    }

    /// Remove a collider. Partners see an `End` on the next step.
    pub fn remove(&mut self, id: ColliderId) -> bool {
        self.colliders.shift_remove(&id).is_some()
    }

    /// Remove every collider owned by `owner`, returning how many were dropped.
    pub fn remove_owner(&mut self, owner: ObjectId) -> usize {
        let before = self.colliders.len();
        self.colliders.retain(|_, slot| slot.collider.owner != owner);
        before - self.colliders.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: ColliderId) -> Option<&Collider> {
        self.colliders.get(&id).map(|slot| &slot.collider)
    }

    /// Colliders currently in contact with `id`.
    #[must_use]
    pub fn contacts(&self, id: ColliderId) -> Vec<ColliderId> {
        self.colliders
            .get(&id)
            .map(|slot| slot.contacts.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Callback set of `id`, shareable outside any borrow of the engine.
    #[must_use]
    pub fn handlers(&self, id: ColliderId) -> Option<Rc<ContactHandlers>> {
        self.colliders.get(&id).map(|slot| Rc::clone(&slot.collider.handlers))
    }

    /// Run one detection pass.
    ///
    /// `locate` returns a collider's world position, or `None` when its owner
    /// is gone, in which case the collider is dropped before the sweep.
    /// Returned events are ordered: per confirmed pair in sweep order, the
    /// earlier-active side first; then end transitions in collider order.
    pub fn step<F>(&mut self, locate: F) -> Vec<ContactEvent>
    where
        F: Fn(&Collider) -> Option<Point>,
    {
        let mut placed = Vec::with_capacity(self.colliders.len());
        let mut dead = Vec::new();
        for (id, slot) in &self.colliders {
            match locate(&slot.collider) {
                Some(at) => placed.push(Placed { id: *id, owner: slot.collider.owner, at, shape: slot.collider.shape }),
                None => dead.push(*id),
            }
        }
        for id in dead {
            debug!(collider = %id, "collider owner dropped; removing collider");
            self.colliders.shift_remove(&id);
        }

        let mut events = Vec::new();
        for (a, b) in sweep(&placed) {
            self.touch(&placed[a], &placed[b], &mut events);
            self.touch(&placed[b], &placed[a], &mut events);
        }

        for (id, slot) in &mut self.colliders {
            let ended: Vec<(ColliderId, ObjectId)> = slot
                .contacts
                .iter()
                .filter(|(other, _)| !slot.frame_hits.contains(*other))
                .map(|(other, owner)| (*other, *owner))
                .collect();
            for (other, other_owner) in ended {
                slot.contacts.remove(&other);
                events.push(ContactEvent {
                    kind: ContactKind::End,
                    collider: *id,
                    owner: slot.collider.owner,
                    other,
                    other_owner,
                });
            }
            slot.frame_hits.clear();
        }
        events
    }

    /// Record that `this` touches `other` this frame.
    fn touch(&mut self, this: &Placed, other: &Placed, events: &mut Vec<ContactEvent>) {
        let Some(slot) = self.colliders.get_mut(&this.id) else {
            return;
        };
        slot.frame_hits.insert(other.id);
        let base = ContactEvent {
            kind: ContactKind::Collide,
            collider: this.id,
            owner: this.owner,
            other: other.id,
            other_owner: other.owner,
        };
        if slot.contacts.insert(other.id, other.owner).is_none() {
            events.push(ContactEvent { kind: ContactKind::Begin, ..base });
        }
        events.push(base);
    }
}

/// Broad + narrow phase. Returns intersecting index pairs `(earlier, entering)`.
///
/// Ties on x are not broken by insertion order alone: every left endpoint is
/// queued ahead of every right endpoint before the stable sort, so a collider
/// entering at the exact x another one leaves is still tested against it.
/// Among endpoints of the same side, insertion order holds.
fn sweep(placed: &[Placed]) -> Vec<(usize, usize)> {
    let mut endpoints: Vec<Endpoint> = Vec::with_capacity(placed.len() * 2);
    for (index, p) in placed.iter().enumerate() {
        let (left, _) = p.shape.x_extent(p.at);
        endpoints.push(Endpoint { x: left + 0.0, index, left: true });
    }
    for (index, p) in placed.iter().enumerate() {
        let (_, right) = p.shape.x_extent(p.at);
        endpoints.push(Endpoint { x: right + 0.0, index, left: false });
    }
    // `+ 0.0` above folds -0.0 into 0.0; total_cmp would otherwise order them apart.
    endpoints.sort_by(|a, b| a.x.total_cmp(&b.x));

    let mut active: Vec<usize> = Vec::new();
    let mut pairs = Vec::new();
    for ep in endpoints {
        if ep.left {
            let entering = &placed[ep.index];
            for &other in &active {
                let candidate = &placed[other];
                if intersects(candidate.at, candidate.shape, entering.at, entering.shape) {
                    pairs.push((other, ep.index));
                }
            }
            active.push(ep.index);
        } else {
            active.retain(|&i| i != ep.index);
        }
    }
    pairs
}
