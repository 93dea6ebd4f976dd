//! Shared registry of engines and the objects they own.
//!
//! One flat table maps every object identity to its owning engine. Engines,
//! the scheduler, and the gesture arbiter all resolve ownership here instead
//! of each keeping their own association.

#[cfg(test)]
#[path = "registry_test.rs"]
mod registry_test;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::engine::{Engine, EngineId};
use crate::geometry::Transform;
use crate::object::{ObjectId, Positionable, world_transform};
use crate::viewport::Viewport;

pub(crate) type SharedRegistry = Rc<RefCell<Registry>>;

struct ObjectEntry {
    engine: EngineId,
    object: Weak<dyn Positionable>,
}

/// Engines in registration order plus the object → engine index.
#[derive(Default)]
pub struct Registry {
    engines: IndexMap<EngineId, Engine>,
    objects: HashMap<ObjectId, ObjectEntry>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Engines ---

    /// Add an engine. Returns `false` if it was already registered.
    pub fn register_engine(&mut self, engine: Engine) -> bool {
        if self.engines.contains_key(&engine.id()) {
            return false;
        }
        self.engines.insert(engine.id(), engine);
        true
    }

    /// Remove an engine. Returns `false` if it was not registered.
    pub fn unregister_engine(&mut self, id: EngineId) -> bool {
        self.engines.shift_remove(&id).is_some()
    }

    #[must_use]
    pub fn is_registered(&self, id: EngineId) -> bool {
        self.engines.contains_key(&id)
    }

    /// Registered engines in registration order.
    #[must_use]
    pub fn engines(&self) -> Vec<Engine> {
        self.engines.values().cloned().collect()
    }

    #[must_use]
    pub fn engine_count(&self) -> usize {
        self.engines.len()
    }

    // --- Objects ---

    /// Record `object` as owned by `engine`, replacing any previous owner.
    pub fn insert_object(&mut self, engine: EngineId, id: ObjectId, object: Weak<dyn Positionable>) {
        self.objects.insert(id, ObjectEntry { engine, object });
    }

    /// Forget an object. Returns `true` if it was present.
    pub fn remove_object(&mut self, id: ObjectId) -> bool {
        self.objects.remove(&id).is_some()
    }

    /// Drop every object owned by `engine`, returning their ids.
    pub fn remove_engine_objects(&mut self, engine: EngineId) -> Vec<ObjectId> {
        let ids: Vec<ObjectId> = self
            .objects
            .iter()
            .filter(|(_, entry)| entry.engine == engine)
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            self.objects.remove(id);
        }
        ids
    }

    /// Engine owning `id`, whether or not that engine is registered.
    #[must_use]
    pub fn owner_engine(&self, id: ObjectId) -> Option<EngineId> {
        self.objects.get(&id).map(|entry| entry.engine)
    }

    /// Registered engine owning a live object `id`.
    #[must_use]
    pub fn live_engine_of(&self, id: ObjectId) -> Option<&Engine> {
        let entry = self.objects.get(&id)?;
        if entry.object.strong_count() == 0 {
            return None;
        }
        self.engines.get(&entry.engine)
    }

    /// Upgrade the object handle for `id`, if it is still alive.
    #[must_use]
    pub fn object(&self, id: ObjectId) -> Option<Rc<dyn Positionable>> {
        self.objects.get(&id).and_then(|entry| entry.object.upgrade())
    }

    /// Whether `id` is registered, alive, and owned by a registered engine.
    #[must_use]
    pub fn is_live(&self, id: ObjectId) -> bool {
        self.live_engine_of(id).is_some()
    }

    #[must_use]
    pub fn object_count(&self, engine: EngineId) -> usize {
        self.objects.values().filter(|entry| entry.engine == engine).count()
    }

    /// Viewport that `id` is displayed in.
    #[must_use]
    pub fn viewport_of(&self, id: ObjectId) -> Option<Rc<dyn Viewport>> {
        self.live_engine_of(id).map(Engine::viewport)
    }

    /// World transform of `object` with single-level parent composition.
    #[must_use]
    pub fn world_transform_of(&self, object: &dyn Positionable) -> Transform {
        world_transform(object, |parent| self.object(parent).map(|p| p.transform()))
    }
}
