//! Gesture arbiter: raw pointer/wheel input → pointer records, drag and pinch
//! gestures, and semantic events delivered to subscribers.
//!
//! DESIGN
//! ======
//! Pointer records are keyed by pointer id. Gesture records live in one
//! table keyed by gesture: a drag by its pointer id, a pinch by the
//! ordered pair `(earlier, later)` of pointer ids, ordered by press time.
//! Pressing 3 then 5 therefore always yields `Pinch(3, 5)`.
//!
//! A drag's member list is fixed when the pointer goes down: the scopes that
//! are interested in drag events for the pointer's owner at that moment.
//! Only [`GestureArbiter::transfer_drag`] changes it afterwards.
//!
//! Every event is projected separately for each receiving subscriber, into
//! the viewport of the engine that owns the subscriber. A subscriber whose
//! object is gone (dropped, removed, or its engine unregistered) is skipped.
//!
//! Events are built while the arbiter state is borrowed and delivered after
//! the borrow is released, so callbacks may feed input back in, subscribe,
//! or transfer drags.
//!
//! Admission control runs before any event of the admitting pointer-down is
//! delivered; no callback ever observes more active drags than the limit.

#[cfg(test)]
#[path = "gesture_test.rs"]
mod gesture_test;

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::consts::PINCH_MIN_POINTERS;
use crate::events::{
    EventCallback, EventKind, EventPosition, EventRegistry, GestureEvent, Scope, SubscriptionId, invoke,
};
use crate::geometry::Point;
use crate::input::{Button, Modifiers, PointerId, PointerInput, WheelInput};
use crate::object::ObjectId;
use crate::registry::{Registry, SharedRegistry};
use crate::viewport::{IdentityViewport, Viewport};

// =============================================================================
// RECORDS
// =============================================================================

/// One tracked pointer. Coordinates are absolute screen positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerRecord {
    pub id: PointerId,
    /// Logical owner; changed by [`GestureArbiter::transfer_drag`].
    pub owner: Option<ObjectId>,
    pub start: Point,
    pub previous: Point,
    pub current: Point,
    pub move_count: u32,
    /// Host timestamp of the pointer-down.
    pub timestamp: f64,
    pub button: Button,
    pub modifiers: Modifiers,
    /// Arrival order; breaks timestamp ties.
    seq: u64,
}

impl PointerRecord {
    fn press_order(&self, other: &PointerRecord) -> std::cmp::Ordering {
        self.timestamp.total_cmp(&other.timestamp).then(self.seq.cmp(&other.seq))
    }
}

/// Key of a gesture record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum GestureKey {
    Drag(PointerId),
    /// `(earlier, later)` by press order.
    Pinch(PointerId, PointerId),
}

impl GestureKey {
    fn involves(self, pointer: PointerId) -> bool {
        match self {
            GestureKey::Drag(id) => id == pointer,
            GestureKey::Pinch(a, b) => a == pointer || b == pointer,
        }
    }
}

#[derive(Debug, Clone)]
struct DragGesture {
    members: Vec<Scope>,
    initiator: Option<ObjectId>,
    /// False while pre-registered by a transfer and waiting for pointer-down.
    started: bool,
    timestamp: f64,
    seq: u64,
}

#[derive(Debug, Clone)]
struct PinchGesture {
    members: Vec<Scope>,
    owner: Option<ObjectId>,
    start: (Point, Point),
    current: (Point, Point),
    start_distance: f64,
    distance: f64,
    modifiers: Modifiers,
}

impl PinchGesture {
    fn scale(&self) -> f64 {
        if self.start_distance > 0.0 { self.distance / self.start_distance } else { 1.0 }
    }
}

#[derive(Debug, Clone)]
enum GestureRecord {
    Drag(DragGesture),
    Pinch(PinchGesture),
}

// =============================================================================
// DELIVERY
// =============================================================================

struct Delivery {
    subscriber: ObjectId,
    callback: EventCallback,
    event: GestureEvent,
}

/// Events waiting to be delivered once all borrows are released.
struct Outbox<'a> {
    registry: &'a Registry,
    deliveries: Vec<Delivery>,
}

impl<'a> Outbox<'a> {
    fn new(registry: &'a Registry) -> Self {
        Self { registry, deliveries: Vec::new() }
    }

    fn viewport(&self, subscriber: ObjectId) -> Rc<dyn Viewport> {
        match self.registry.viewport_of(subscriber) {
            Some(viewport) => viewport,
            None => {
                warn!(%subscriber, "no viewport for subscriber; using identity projection");
                Rc::new(IdentityViewport)
            }
        }
    }

    /// Build one event in `scope`'s viewport and queue it for each callback.
    fn emit<F>(&mut self, scope: Scope, callbacks: Vec<EventCallback>, build: F)
    where
        F: Fn(&dyn Viewport) -> GestureEvent,
    {
        if callbacks.is_empty() {
            return;
        }
        let subscriber = scope.subscriber();
        if !self.registry.is_live(subscriber) {
            debug!(%subscriber, "subscriber no longer live; event skipped");
            return;
        }
        let viewport = self.viewport(subscriber);
        let event = build(viewport.as_ref());
        for callback in callbacks {
            self.deliveries.push(Delivery { subscriber, callback, event: event.clone() });
        }
    }

    /// Pointer-level event to every subscription that matches `owner`.
    fn pointer_event(
        &mut self,
        events: &EventRegistry,
        kind: EventKind,
        owner: Option<ObjectId>,
        pointer: PointerId,
        button: Button,
        screen: Point,
        modifiers: Modifiers,
    ) {
        for (scope, callback) in events.targets(kind, owner) {
            self.emit(scope, vec![callback], |viewport| {
                let mut event = GestureEvent::new(kind, owner, EventPosition::project(screen, viewport), modifiers)
                    .with_pointer(pointer);
                event.button = Some(button);
                event
            });
        }
    }

    /// Drag-level event for each of `members`, with `start` and `delta`
    /// computed in the member's own viewport.
    fn drag_event<'s>(
        &mut self,
        events: &EventRegistry,
        kind: EventKind,
        members: impl IntoIterator<Item = &'s Scope>,
        record: &PointerRecord,
        at: Point,
    ) {
        for &scope in members {
            self.emit(scope, events.callbacks_for(kind, scope), |viewport| {
                let start = EventPosition::project(record.start, viewport);
                let position = EventPosition::project(at, viewport);
                let mut event = GestureEvent::new(kind, record.owner, position, record.modifiers).with_pointer(record.id);
                event.button = Some(record.button);
                event.start = Some(start);
                event.delta = Some(position.world().delta_from(start.world()));
                event
            });
        }
    }

    fn pinch_event(&mut self, events: &EventRegistry, kind: EventKind, pinch: &PinchGesture) {
        let (a, b) = if kind == EventKind::PinchStart { pinch.start } else { pinch.current };
        for &scope in &pinch.members {
            self.emit(scope, events.callbacks_for(kind, scope), |viewport| {
                let pa = EventPosition::project(a, viewport);
                let pb = EventPosition::project(b, viewport);
                let position = EventPosition::project(a.midpoint(b), viewport);
                let mut event = GestureEvent::new(kind, pinch.owner, position, pinch.modifiers);
                event.start = Some(EventPosition::project(pinch.start.0.midpoint(pinch.start.1), viewport));
                event.pointer_list = vec![pa, pb];
                event.distance = Some(pa.world().distance(pb.world()));
                event.scale = Some(if kind == EventKind::PinchStart { 1.0 } else { pinch.scale() });
                event
            });
        }
    }

    fn into_deliveries(self) -> Vec<Delivery> {
        self.deliveries
    }
}

/// Run queued deliveries in order. Liveness is checked again right before
/// each call, since an earlier callback may have removed a later subscriber.
fn deliver(registry: &SharedRegistry, deliveries: Vec<Delivery>) {
    for Delivery { subscriber, callback, event } in deliveries {
        let live = registry.borrow().is_live(subscriber);
        if !live {
            debug!(%subscriber, kind = %event.kind, "subscriber left during delivery; event skipped");
            continue;
        }
        invoke(&callback, &event);
    }
}

fn inside_any_viewport(registry: &Registry, screen: Point) -> bool {
    registry.engines().iter().any(|engine| engine.viewport().bounds().contains(screen))
}

// =============================================================================
// STATE
// =============================================================================

struct ArbiterState {
    config: RuntimeConfig,
    pointers: IndexMap<PointerId, PointerRecord>,
    gestures: IndexMap<GestureKey, GestureRecord>,
    events: EventRegistry,
    next_seq: u64,
}

impl ArbiterState {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn active_drag_count(&self) -> usize {
        self.gestures
            .values()
            .filter(|gesture| matches!(gesture, GestureRecord::Drag(drag) if drag.started))
            .count()
    }

    fn oldest_drag(&self) -> Option<PointerId> {
        self.gestures
            .iter()
            .filter_map(|(key, gesture)| match (key, gesture) {
                (GestureKey::Drag(id), GestureRecord::Drag(drag)) if drag.started => Some((*id, drag)),
                _ => None,
            })
            .min_by(|(_, a), (_, b)| a.timestamp.total_cmp(&b.timestamp).then(a.seq.cmp(&b.seq)))
            .map(|(id, _)| id)
    }

    /// Evict the oldest drags until the limit holds, ending each for its
    /// members at the pointer's last known position.
    fn admit(&mut self, out: &mut Outbox<'_>) {
        let Some(limit) = self.config.drag_limit() else {
            return;
        };
        while self.active_drag_count() > limit {
            let Some(oldest) = self.oldest_drag() else {
                break;
            };
            let Some(GestureRecord::Drag(drag)) = self.gestures.shift_remove(&GestureKey::Drag(oldest)) else {
                break;
            };
            info!(pointer = %oldest, limit, "drag evicted by admission control");
            if let Some(record) = self.pointers.get(&oldest) {
                out.drag_event(&self.events, EventKind::DragEnd, &drag.members, record, record.current);
            }
        }
    }

    /// Fire pointer-up, end the pointer's drag and every pinch it takes part
    /// in, and forget the pointer.
    fn release(&mut self, id: PointerId, out: &mut Outbox<'_>) -> bool {
        let Some(record) = self.pointers.shift_remove(&id) else {
            return false;
        };
        out.pointer_event(
            &self.events,
            EventKind::PointerUp,
            record.owner,
            id,
            record.button,
            record.current,
            record.modifiers,
        );
        if let Some(GestureRecord::Drag(drag)) = self.gestures.shift_remove(&GestureKey::Drag(id)) {
            if drag.started {
                out.drag_event(&self.events, EventKind::DragEnd, &drag.members, &record, record.current);
            }
        }
        let pinches: Vec<GestureKey> = self
            .gestures
            .keys()
            .filter(|key| matches!(key, GestureKey::Pinch(..)) && key.involves(id))
            .copied()
            .collect();
        for key in pinches {
            if let Some(GestureRecord::Pinch(pinch)) = self.gestures.shift_remove(&key) {
                out.pinch_event(&self.events, EventKind::PinchEnd, &pinch);
            }
        }
        true
    }

    /// Advance a tracked pointer: `pointerMove`, `drag` to the members that
    /// match the pointer's owner, then pinch detection. Returns `false` for
    /// an untracked pointer.
    fn track_move(&mut self, input: &PointerInput, out: &mut Outbox<'_>) -> bool {
        let id = input.pointer_id;
        let Some(record) = self.pointers.get_mut(&id) else {
            return false;
        };
        record.previous = record.current;
        record.current = input.screen;
        record.move_count += 1;
        record.modifiers = input.modifiers;
        let record = *record;

        out.pointer_event(
            &self.events,
            EventKind::PointerMove,
            record.owner,
            id,
            record.button,
            record.current,
            record.modifiers,
        );
        if let Some(GestureRecord::Drag(drag)) = self.gestures.get(&GestureKey::Drag(id)) {
            if drag.started {
                let members = drag.members.iter().filter(|scope| scope.matches(record.owner));
                out.drag_event(&self.events, EventKind::Drag, members, &record, record.current);
            }
        }
        if self.config.pinch_enabled && self.pointers.len() >= PINCH_MIN_POINTERS {
            self.update_pinches(out);
        }
        true
    }

    /// Start or advance a pinch for every pair of tracked pointers.
    fn update_pinches(&mut self, out: &mut Outbox<'_>) {
        let mut ordered: Vec<PointerRecord> = self.pointers.values().copied().collect();
        ordered.sort_by(PointerRecord::press_order);

        for (i, a) in ordered.iter().enumerate() {
            for b in &ordered[i + 1..] {
                let key = GestureKey::Pinch(a.id, b.id);
                let current = (a.current, b.current);
                let distance = a.current.distance(b.current);
                if let Some(GestureRecord::Pinch(pinch)) = self.gestures.get_mut(&key) {
                    pinch.current = current;
                    pinch.distance = distance;
                    pinch.modifiers = b.modifiers;
                    out.pinch_event(&self.events, EventKind::Pinch, pinch);
                    continue;
                }
                let mut owners: Vec<ObjectId> = a.owner.into_iter().collect();
                if let Some(owner) = b.owner.filter(|owner| !owners.contains(owner)) {
                    owners.push(owner);
                }
                let pinch = PinchGesture {
                    members: self.events.interested(&EventKind::PINCH, &owners),
                    owner: a.owner.or(b.owner),
                    start: (a.start, b.start),
                    current,
                    start_distance: a.start.distance(b.start),
                    distance,
                    modifiers: b.modifiers,
                };
                debug!(first = %a.id, second = %b.id, "pinch started");
                out.pinch_event(&self.events, EventKind::PinchStart, &pinch);
                self.gestures.insert(key, GestureRecord::Pinch(pinch));
            }
        }
    }

    /// Drop everything tied to `ids` without firing events.
    fn forget(&mut self, ids: &[ObjectId]) {
        for id in ids {
            self.events.unsubscribe_all(*id);
        }
        let orphaned: Vec<PointerId> = self
            .pointers
            .values()
            .filter(|record| record.owner.is_some_and(|owner| ids.contains(&owner)))
            .map(|record| record.id)
            .collect();
        for pointer in &orphaned {
            self.pointers.shift_remove(pointer);
        }
        self.gestures
            .retain(|key, _| !orphaned.iter().any(|pointer| key.involves(*pointer)));
        for gesture in self.gestures.values_mut() {
            let members = match gesture {
                GestureRecord::Drag(drag) => &mut drag.members,
                GestureRecord::Pinch(pinch) => &mut pinch.members,
            };
            members.retain(|scope| !ids.contains(&scope.subscriber()));
        }
    }
}

// =============================================================================
// ARBITER
// =============================================================================

/// Shared handle to the gesture tables. Clones refer to the same arbiter.
#[derive(Clone)]
pub struct GestureArbiter {
    state: Rc<RefCell<ArbiterState>>,
    registry: SharedRegistry,
}

impl GestureArbiter {
    pub(crate) fn new(config: RuntimeConfig, registry: SharedRegistry) -> Self {
        Self {
            state: Rc::new(RefCell::new(ArbiterState {
                config,
                pointers: IndexMap::new(),
                gestures: IndexMap::new(),
                events: EventRegistry::new(),
                next_seq: 0,
            })),
            registry,
        }
    }

    #[must_use]
    pub fn config(&self) -> RuntimeConfig {
        self.state.borrow().config
    }

    // --- Subscriptions ---

    /// Subscribe to `kind` under `scope`. Returns `None` (and does nothing)
    /// when the subscribing object is not live in a registered engine.
    pub fn subscribe(
        &self,
        kind: EventKind,
        scope: Scope,
        callback: impl FnMut(&GestureEvent) + 'static,
    ) -> Option<SubscriptionId> {
        let subscriber = scope.subscriber();
        if !self.registry.borrow().is_live(subscriber) {
            debug!(%kind, %subscriber, "subscriber not registered; subscribe ignored");
            return None;
        }
        Some(self.state.borrow_mut().events.subscribe(kind, scope, callback))
    }

    /// Drop `subscriber`'s subscriptions to `kind`, in either scope.
    pub fn unsubscribe(&self, kind: EventKind, subscriber: ObjectId) -> usize {
        self.state.borrow_mut().events.unsubscribe(kind, subscriber)
    }

    pub fn unsubscribe_all(&self, subscriber: ObjectId) -> usize {
        self.state.borrow_mut().events.unsubscribe_all(subscriber)
    }

    pub fn remove_subscription(&self, id: SubscriptionId) -> bool {
        self.state.borrow_mut().events.remove(id)
    }

    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.state.borrow().events.len()
    }

    // --- Input ---

    /// Handle a pointer-down.
    ///
    /// Ignored when the pointer is untracked and outside every registered
    /// viewport. A pointer that is already tracked is released first.
    pub fn pointer_down(&self, input: PointerInput) {
        let id = input.pointer_id;
        let deliveries = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            let registry = self.registry.borrow();
            let mut out = Outbox::new(&registry);

            let tracked = state.pointers.contains_key(&id);
            if !tracked && !inside_any_viewport(&registry, input.screen) {
                debug!(pointer = %id, "pointer-down outside every viewport; ignored");
                return;
            }
            if tracked {
                debug!(pointer = %id, "pointer-down for tracked pointer; releasing previous");
                state.release(id, &mut out);
            }

            let seq = state.next_seq();
            let mut record = PointerRecord {
                id,
                owner: input.owner,
                start: input.screen,
                previous: input.screen,
                current: input.screen,
                move_count: 0,
                timestamp: input.timestamp,
                button: input.button,
                modifiers: input.modifiers,
                seq,
            };
            out.pointer_event(
                &state.events,
                EventKind::PointerDown,
                record.owner,
                id,
                input.button,
                input.screen,
                input.modifiers,
            );

            let owners: Vec<ObjectId> = input.owner.into_iter().collect();
            let interested = state.events.interested(&EventKind::DRAG, &owners);
            let members = match state.gestures.get_mut(&GestureKey::Drag(id)) {
                Some(GestureRecord::Drag(drag)) => {
                    for scope in interested {
                        if !drag.members.contains(&scope) {
                            drag.members.push(scope);
                        }
                    }
                    if drag.initiator.is_some() {
                        record.owner = drag.initiator;
                    }
                    drag.started = true;
                    drag.timestamp = input.timestamp;
                    drag.seq = seq;
                    drag.members.clone()
                }
                _ => {
                    state.gestures.insert(
                        GestureKey::Drag(id),
                        GestureRecord::Drag(DragGesture {
                            members: interested.clone(),
                            initiator: input.owner,
                            started: true,
                            timestamp: input.timestamp,
                            seq,
                        }),
                    );
                    interested
                }
            };
            state.pointers.insert(id, record);
            out.drag_event(&state.events, EventKind::DragStart, &members, &record, record.start);

            state.admit(&mut out);
            out.into_deliveries()
        };
        deliver(&self.registry, deliveries);
    }

    /// Handle a pointer-move.
    ///
    /// Untracked pointers inside a viewport only produce `pointerMove`.
    pub fn pointer_move(&self, input: PointerInput) {
        let id = input.pointer_id;
        let deliveries = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            let registry = self.registry.borrow();
            let mut out = Outbox::new(&registry);

            let tracked = state.track_move(&input, &mut out);
            if !tracked && inside_any_viewport(&registry, input.screen) {
                out.pointer_event(
                    &state.events,
                    EventKind::PointerMove,
                    input.owner,
                    id,
                    input.button,
                    input.screen,
                    input.modifiers,
                );
            }
            out.into_deliveries()
        };
        deliver(&self.registry, deliveries);
    }

    /// Handle a pointer-up: `pointerUp`, then `dragEnd` to every drag member,
    /// then `pinchEnd` for every pinch the pointer was part of.
    pub fn pointer_up(&self, input: PointerInput) {
        let id = input.pointer_id;
        let deliveries = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            let registry = self.registry.borrow();
            let mut out = Outbox::new(&registry);

            let Some(record) = state.pointers.get_mut(&id) else {
                debug!(pointer = %id, "pointer-up for untracked pointer; ignored");
                return;
            };
            record.previous = record.current;
            record.current = input.screen;
            record.modifiers = input.modifiers;
            state.release(id, &mut out);
            out.into_deliveries()
        };
        deliver(&self.registry, deliveries);
    }

    /// Identical to [`GestureArbiter::pointer_up`].
    pub fn pointer_cancel(&self, input: PointerInput) {
        self.pointer_up(input);
    }

    /// Forward a wheel event as `mouseWheel`. Not gesture-tracked.
    pub fn wheel(&self, input: WheelInput) {
        let deliveries = {
            let state = self.state.borrow();
            let registry = self.registry.borrow();
            if !inside_any_viewport(&registry, input.screen) {
                debug!("wheel outside every viewport; ignored");
                return;
            }
            let mut out = Outbox::new(&registry);
            for (scope, callback) in state.events.targets(EventKind::MouseWheel, input.owner) {
                out.emit(scope, vec![callback], |viewport| {
                    let position = EventPosition::project(input.screen, viewport);
                    let mut event = GestureEvent::new(EventKind::MouseWheel, input.owner, position, input.modifiers);
                    event.wheel = Some(input.delta);
                    event
                });
            }
            out.into_deliveries()
        };
        deliver(&self.registry, deliveries);
    }

    // --- Transfer ---

    /// Re-own a drag: the pointer's logical owner becomes `new_owner` and the
    /// drag's member list grows by the scopes interested in `new_owner`.
    /// Newly added members of a running drag receive `dragStart`.
    ///
    /// For an untracked pointer the drag is pre-registered and picked up by
    /// the next pointer-down with that id. Returns `false` when `new_owner`
    /// is not live or the tracked pointer no longer has a drag.
    pub fn transfer_drag(&self, pointer: PointerId, new_owner: ObjectId) -> bool {
        let deliveries = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            let registry = self.registry.borrow();
            if !registry.is_live(new_owner) {
                debug!(%pointer, owner = %new_owner, "transfer target not registered; ignored");
                return false;
            }
            let mut out = Outbox::new(&registry);
            let interested = state.events.interested(&EventKind::DRAG, &[new_owner]);
            let record = state.pointers.get_mut(&pointer).map(|record| {
                record.owner = Some(new_owner);
                *record
            });

            match (state.gestures.get_mut(&GestureKey::Drag(pointer)), record) {
                (Some(GestureRecord::Drag(drag)), record) => {
                    let added: Vec<Scope> =
                        interested.into_iter().filter(|scope| !drag.members.contains(scope)).collect();
                    drag.members.extend(added.iter().copied());
                    drag.initiator = Some(new_owner);
                    if let (true, Some(record)) = (drag.started, record) {
                        out.drag_event(&state.events, EventKind::DragStart, &added, &record, record.current);
                    }
                }
                (_, Some(_)) => {
                    debug!(%pointer, "tracked pointer has no drag to transfer");
                    return false;
                }
                (_, None) => {
                    state.gestures.insert(
                        GestureKey::Drag(pointer),
                        GestureRecord::Drag(DragGesture {
                            members: interested,
                            initiator: Some(new_owner),
                            started: false,
                            timestamp: 0.0,
                            seq: 0,
                        }),
                    );
                }
            }
            out.into_deliveries()
        };
        deliver(&self.registry, deliveries);
        true
    }

    // --- Queries ---

    /// Drags that have started and not ended.
    #[must_use]
    pub fn active_drag_count(&self) -> usize {
        self.state.borrow().active_drag_count()
    }

    /// Tracked pointer ids in press order.
    #[must_use]
    pub fn tracked_pointers(&self) -> Vec<PointerId> {
        self.state.borrow().pointers.keys().copied().collect()
    }

    #[must_use]
    pub fn pointer(&self, id: PointerId) -> Option<PointerRecord> {
        self.state.borrow().pointers.get(&id).copied()
    }

    /// Keys of the live pinch gestures.
    #[must_use]
    pub fn pinch_keys(&self) -> Vec<(PointerId, PointerId)> {
        self.state
            .borrow()
            .gestures
            .keys()
            .filter_map(|key| match key {
                GestureKey::Pinch(a, b) => Some((*a, *b)),
                GestureKey::Drag(_) => None,
            })
            .collect()
    }

    /// Member scopes of the drag for `pointer`, empty if there is none.
    #[must_use]
    pub fn drag_members(&self, pointer: PointerId) -> Vec<Scope> {
        match self.state.borrow().gestures.get(&GestureKey::Drag(pointer)) {
            Some(GestureRecord::Drag(drag)) => drag.members.clone(),
            _ => Vec::new(),
        }
    }

    // --- Lifecycle ---

    /// Drop pointers, gestures, and subscriptions tied to `ids` without
    /// firing events.
    pub(crate) fn forget_objects(&self, ids: &[ObjectId]) {
        if ids.is_empty() {
            return;
        }
        self.state.borrow_mut().forget(ids);
    }

    /// Drop every pointer and gesture record. Subscriptions are kept.
    pub fn reset(&self) {
        let mut state = self.state.borrow_mut();
        if !state.pointers.is_empty() || !state.gestures.is_empty() {
            info!(pointers = state.pointers.len(), gestures = state.gestures.len(), "gesture tables reset");
        }
        state.pointers.clear();
        state.gestures.clear();
    }
}
