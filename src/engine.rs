//! Engine: one independent viewport instance sharing the global scheduler.
//!
//! An engine owns its viewport, an optional collision engine, the animation
//! callbacks that run every ANIMATION stage, and (through the shared
//! registry) the set of objects it is responsible for. Engines are cheap
//! handles; clones refer to the same instance.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::collision::{ColliderId, Collider, CollisionEngine};
use crate::object::{ObjectId, Positionable};
use crate::registry::{Registry, SharedRegistry};
use crate::scheduler::{FrameInfo, Stage, contain};
use crate::viewport::Viewport;

/// Identity of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineId(Uuid);

impl EngineId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an animation callback within its engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnimationId(u64);

/// What an animation wants after running for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationStep {
    /// Run again next ANIMATION stage.
    Continue,
    /// Remove the animation.
    Done,
}

pub type AnimationFn = Box<dyn FnMut(&FrameInfo) -> AnimationStep>;

struct EngineInner {
    id: EngineId,
    viewport: Rc<dyn Viewport>,
    registry: Weak<RefCell<Registry>>,
    collisions: RefCell<Option<CollisionEngine>>,
    animations: RefCell<IndexMap<AnimationId, Rc<RefCell<AnimationFn>>>>,
    next_animation: Cell<u64>,
    destroyed: Cell<bool>,
}

/// Handle to one engine.
#[derive(Clone)]
pub struct Engine {
    inner: Rc<EngineInner>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("id", &self.inner.id)
            .field("destroyed", &self.inner.destroyed.get())
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub(crate) fn new(viewport: Rc<dyn Viewport>, registry: &SharedRegistry, with_collisions: bool) -> Self {
        Self {
            inner: Rc::new(EngineInner {
                id: EngineId::new(),
                viewport,
                registry: Rc::downgrade(registry),
                collisions: RefCell::new(with_collisions.then(CollisionEngine::new)),
                animations: RefCell::new(IndexMap::new()),
                next_animation: Cell::new(0),
                destroyed: Cell::new(false),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> EngineId {
        self.inner.id
    }

    #[must_use]
    pub fn viewport(&self) -> Rc<dyn Viewport> {
        Rc::clone(&self.inner.viewport)
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    #[must_use]
    pub fn has_collisions(&self) -> bool {
        self.inner.collisions.borrow().is_some()
    }

    // --- Objects ---

    /// Make this engine responsible for `object`. A destroyed engine ignores the call.
    pub fn add_object<T: Positionable + 'static>(&self, object: &Rc<T>) -> bool {
        if self.is_destroyed() {
            debug!(engine = %self.id(), "add_object on destroyed engine ignored");
            return false;
        }
        let Some(registry) = self.inner.registry.upgrade() else {
            return false;
        };
        let weak = Rc::downgrade(object);
        let weak: Weak<dyn Positionable> = weak;
        registry.borrow_mut().insert_object(self.id(), object.identity(), weak);
        true
    }

    /// Stop tracking `id`, along with any colliders it owns.
    pub fn remove_object(&self, id: ObjectId) -> bool {
        let Some(registry) = self.inner.registry.upgrade() else {
            return false;
        };
        if registry.borrow().owner_engine(id) != Some(self.id()) {
            return false;
        }
        registry.borrow_mut().remove_object(id);
        if let Some(world) = self.inner.collisions.borrow_mut().as_mut() {
            world.remove_owner(id);
        }
        true
    }

    #[must_use]
    pub fn contains_object(&self, id: ObjectId) -> bool {
        self.inner
            .registry
            .upgrade()
            .is_some_and(|registry| registry.borrow().owner_engine(id) == Some(self.id()))
    }

    #[must_use]
    pub fn object_count(&self) -> usize {
        self.inner
            .registry
            .upgrade()
            .map_or(0, |registry| registry.borrow().object_count(self.id()))
    }

    // --- Colliders ---

    /// Attach a collider. Its owner must belong to this engine and the engine
    /// must have a collision engine; otherwise the call is a no-op.
    pub fn add_collider(&self, collider: Collider) -> Option<ColliderId> {
        if !self.contains_object(collider.owner()) {
            debug!(engine = %self.id(), owner = %collider.owner(), "collider owner not in engine; ignored");
            return None;
        }
        let mut slot = self.inner.collisions.borrow_mut();
        let Some(world) = slot.as_mut() else {
            debug!(engine = %self.id(), "engine has no collision engine; collider ignored");
            return None;
        };
        Some(world.add(collider))
    }

    pub fn remove_collider(&self, id: ColliderId) -> bool {
        self.inner
            .collisions
            .borrow_mut()
            .as_mut()
            .is_some_and(|world| world.remove(id))
    }

    #[must_use]
    pub fn collider_count(&self) -> usize {
        self.inner.collisions.borrow().as_ref().map_or(0, CollisionEngine::len)
    }

    /// Colliders currently touching `id`.
    #[must_use]
    pub fn contacts(&self, id: ColliderId) -> Vec<ColliderId> {
        self.inner
            .collisions
            .borrow()
            .as_ref()
            .map(|world| world.contacts(id))
            .unwrap_or_default()
    }

    /// Run one collision pass and deliver contact callbacks. Returns the
    /// number of contact events produced.
    pub(crate) fn detect_collisions(&self) -> usize {
        let Some(registry) = self.inner.registry.upgrade() else {
            return 0;
        };
        let deliveries = {
            let registry = registry.borrow();
            let mut slot = self.inner.collisions.borrow_mut();
            let Some(world) = slot.as_mut() else {
                return 0;
            };
            let events = world.step(|collider| collider.world_position(&registry));
            events
                .into_iter()
                .filter_map(|event| world.handlers(event.collider).map(|handlers| (handlers, event)))
                .collect::<Vec<_>>()
        };
        for (handlers, event) in &deliveries {
            contain(Stage::PostRender, || handlers.dispatch(event));
        }
        deliveries.len()
    }

    // --- Animations ---

    /// Run `animation` every ANIMATION stage until it returns [`AnimationStep::Done`].
    pub fn animate(&self, animation: impl FnMut(&FrameInfo) -> AnimationStep + 'static) -> AnimationId {
        let id = AnimationId(self.inner.next_animation.get() + 1);
        self.inner.next_animation.set(id.0);
        self.inner
            .animations
            .borrow_mut()
            .insert(id, Rc::new(RefCell::new(Box::new(animation))));
        id
    }

    pub fn cancel_animation(&self, id: AnimationId) -> bool {
        self.inner.animations.borrow_mut().shift_remove(&id).is_some()
    }

    #[must_use]
    pub fn animation_count(&self) -> usize {
        self.inner.animations.borrow().len()
    }

    pub(crate) fn run_animations(&self, frame: &FrameInfo) {
        let running: Vec<(AnimationId, Rc<RefCell<AnimationFn>>)> = self
            .inner
            .animations
            .borrow()
            .iter()
            .map(|(id, animation)| (*id, Rc::clone(animation)))
            .collect();
        for (id, animation) in running {
            let step = match animation.try_borrow_mut() {
                // A panicking animation is dropped rather than retried every frame.
                Ok(mut animation) => contain(frame.stage, || animation(frame)).unwrap_or(AnimationStep::Done),
                Err(_) => {
                    warn!(engine = %self.id(), "animation re-entered; skipped");
                    continue;
                }
            };
            if step == AnimationStep::Done {
                self.inner.animations.borrow_mut().shift_remove(&id);
            }
        }
    }

    // --- Lifecycle ---

    /// Mark destroyed and release everything the engine owns. Returns the
    /// ids of the objects dropped from the shared registry.
    pub(crate) fn teardown(&self) -> Vec<ObjectId> {
        self.inner.destroyed.set(true);
        self.inner.animations.borrow_mut().clear();
        if let Some(world) = self.inner.collisions.borrow_mut().as_mut() {
            *world = CollisionEngine::new();
        }
        self.inner
            .registry
            .upgrade()
            .map(|registry| registry.borrow_mut().remove_engine_objects(self.id()))
            .unwrap_or_default()
    }
}
