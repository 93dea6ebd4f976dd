//! Top-level handle: one registry, one scheduler, one gesture arbiter.
//!
//! Hosts build a single [`Runtime`] per process, create engines from it, and
//! register them. The scheduler's frame clock runs while at least one engine
//! is registered; when the last one leaves, the gesture tables are cleared
//! as well.

#[cfg(test)]
#[path = "runtime_test.rs"]
mod runtime_test;

use std::cell::RefCell;
use std::rc::Rc;

use tracing::info;

use crate::config::RuntimeConfig;
use crate::engine::Engine;
use crate::error::UpdateError;
use crate::gesture::GestureArbiter;
use crate::object::ObjectId;
use crate::registry::{Registry, SharedRegistry};
use crate::scheduler::{FrameClock, FrameInfo, ManualClock, Scheduler, Stage, UpdateHandle};
use crate::viewport::Viewport;

pub struct Runtime {
    config: RuntimeConfig,
    registry: SharedRegistry,
    scheduler: Scheduler,
    arbiter: GestureArbiter,
}

impl Runtime {
    /// Build a runtime driven by `clock`.
    #[must_use]
    pub fn new(config: RuntimeConfig, clock: Box<dyn FrameClock>) -> Self {
        let registry: SharedRegistry = Rc::new(RefCell::new(Registry::new()));
        Self {
            config,
            scheduler: Scheduler::new(clock, Rc::clone(&registry)),
            arbiter: GestureArbiter::new(config, Rc::clone(&registry)),
            registry,
        }
    }

    /// Build a runtime driven by a [`ManualClock`], returned alongside so the
    /// caller can observe start/stop.
    #[must_use]
    pub fn headless(config: RuntimeConfig) -> (Self, ManualClock) {
        let clock = ManualClock::new();
        (Self::new(config, Box::new(clock.clone())), clock)
    }

    #[must_use]
    pub fn config(&self) -> RuntimeConfig {
        self.config
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn arbiter(&self) -> &GestureArbiter {
        &self.arbiter
    }

    // --- Engines ---

    /// Create an unregistered engine; it gets a collision engine when the
    /// config enables collisions.
    #[must_use]
    pub fn create_engine(&self, viewport: Rc<dyn Viewport>) -> Engine {
        self.create_engine_with(viewport, self.config.collisions_enabled)
    }

    #[must_use]
    pub fn create_engine_with(&self, viewport: Rc<dyn Viewport>, collisions: bool) -> Engine {
        Engine::new(viewport, &self.registry, collisions)
    }

    pub fn register_engine(&self, engine: &Engine) -> bool {
        self.scheduler.register(engine)
    }

    /// Unregister `engine`. Clears the gesture tables when it was the last one.
    pub fn unregister_engine(&self, engine: &Engine) -> bool {
        let removed = self.scheduler.unregister(engine);
        if removed && self.scheduler.engine_count() == 0 {
            self.arbiter.reset();
        }
        removed
    }

    /// Unregister and tear down `engine`: its objects leave the shared
    /// registry and their pointers and subscriptions are dropped. Returns the
    /// removed object ids.
    pub fn destroy_engine(&self, engine: &Engine) -> Vec<ObjectId> {
        self.unregister_engine(engine);
        let removed = engine.teardown();
        self.arbiter.forget_objects(&removed);
        info!(engine = %engine.id(), objects = removed.len(), "engine destroyed");
        removed
    }

    /// Registered engines in registration order.
    #[must_use]
    pub fn engines(&self) -> Vec<Engine> {
        self.registry.borrow().engines()
    }

    // --- Frame ---

    /// See [`Scheduler::queue_update`].
    pub fn queue_update(
        &self,
        stage: Stage,
        owner: ObjectId,
        id: impl Into<String>,
        callback: impl FnOnce(&FrameInfo) -> Result<(), UpdateError> + 'static,
    ) -> UpdateHandle {
        self.scheduler.queue_update(stage, owner, id, callback)
    }

    /// Run one frame. Call from the host's frame callback while the clock runs.
    pub fn tick(&self, now: f64) -> bool {
        self.scheduler.tick(now)
    }
}
