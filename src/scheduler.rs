//! Global multi-stage update scheduler.
//!
//! DESIGN
//! ======
//! Every tick runs a fixed pipeline over all registered engines:
//!
//! ```text
//! READ_1 → WRITE_1 → READ_2 → WRITE_2 → ANIMATION → READ_3 → WRITE_3 → POST_RENDER
//! ```
//!
//! Work is queued per `(engine, stage, owner, id)` into one flat,
//! insertion-ordered store. Requeueing the same key before it runs replaces
//! the stored callbacks (last writer wins). When a stage starts, its entries
//! are taken out of the store in one go, so anything queued while the stage
//! runs lands in the store for the *next* tick. Within a stage, engines run
//! in registration order and each engine only ever sees its own entries.
//!
//! The scheduler never spawns its frame source. A [`FrameClock`] is started
//! when the first engine registers and stopped when the last one leaves; the
//! host calls [`Scheduler::tick`] from whatever drives its frames.
//!
//! No borrow of scheduler state is held while user code runs, which is what
//! allows callbacks to queue more work, register engines, or subscribe.
//! Every host callback runs under [`contain`]: a panic is logged and the
//! stage moves on to the next callback.

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod scheduler_test;

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::engine::{Engine, EngineId};
use crate::error::UpdateError;
use crate::object::ObjectId;
use crate::registry::SharedRegistry;

// =============================================================================
// STAGES
// =============================================================================

/// One phase of the per-frame pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Read1,
    Write1,
    Read2,
    Write2,
    Animation,
    Read3,
    Write3,
    /// Collision detection and passive observers. Not queueable.
    PostRender,
    /// Between ticks. Not queueable.
    Idle,
}

impl Stage {
    /// Queueable stages in execution order.
    pub const PIPELINE: [Stage; 7] = [
        Stage::Read1,
        Stage::Write1,
        Stage::Read2,
        Stage::Write2,
        Stage::Animation,
        Stage::Read3,
        Stage::Write3,
    ];

    /// Whether work can be queued for this stage.
    #[must_use]
    pub fn is_queueable(self) -> bool {
        !matches!(self, Stage::PostRender | Stage::Idle)
    }

    /// Layout-measurement stage.
    #[must_use]
    pub fn is_read(self) -> bool {
        matches!(self, Stage::Read1 | Stage::Read2 | Stage::Read3)
    }

    /// Mutation stage.
    #[must_use]
    pub fn is_write(self) -> bool {
        matches!(self, Stage::Write1 | Stage::Write2 | Stage::Write3)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Read1 => "READ_1",
            Stage::Write1 => "WRITE_1",
            Stage::Read2 => "READ_2",
            Stage::Write2 => "WRITE_2",
            Stage::Animation => "ANIMATION",
            Stage::Read3 => "READ_3",
            Stage::Write3 => "WRITE_3",
            Stage::PostRender => "POST_RENDER",
            Stage::Idle => "IDLE",
        };
        f.write_str(name)
    }
}

/// Context handed to every callback run by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Tick counter, starting at 1.
    pub frame: u64,
    /// Host timestamp passed to [`Scheduler::tick`], in milliseconds.
    pub now: f64,
    pub stage: Stage,
}

/// Run one host callback, catching a panic so the rest of the stage still runs.
/// Returns `None` when the callback panicked.
pub(crate) fn contain<R>(stage: Stage, callback: impl FnOnce() -> R) -> Option<R> {
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(value) => Some(value),
        Err(payload) => {
            warn!(%stage, reason = panic_reason(payload.as_ref()), "callback panicked; skipped");
            None
        }
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> &str {
    if let Some(reason) = payload.downcast_ref::<&str>() {
        reason
    } else if let Some(reason) = payload.downcast_ref::<String>() {
        reason.as_str()
    } else {
        "non-string panic payload"
    }
}

// =============================================================================
// FRAME CLOCK
// =============================================================================

/// External frame source. The host owns the actual timer; the scheduler only
/// tells it when frames are wanted.
pub trait FrameClock {
    fn start(&mut self);
    fn stop(&mut self);
}

#[derive(Debug, Default)]
struct ManualClockState {
    running: Cell<bool>,
    starts: Cell<u32>,
    stops: Cell<u32>,
}

/// Clock for hosts that call [`Scheduler::tick`] themselves. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    state: Rc<ManualClockState>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.running.get()
    }

    /// How many times the scheduler has started the clock.
    #[must_use]
    pub fn starts(&self) -> u32 {
        self.state.starts.get()
    }

    /// How many times the scheduler has stopped the clock.
    #[must_use]
    pub fn stops(&self) -> u32 {
        self.state.stops.get()
    }
}

impl FrameClock for ManualClock {
    fn start(&mut self) {
        self.state.running.set(true);
        self.state.starts.set(self.state.starts.get() + 1);
    }

    fn stop(&mut self) {
        self.state.running.set(false);
        self.state.stops.set(self.state.stops.get() + 1);
    }
}

// =============================================================================
// QUEUE STORE
// =============================================================================

pub type UpdateFn = Box<dyn FnOnce(&FrameInfo) -> Result<(), UpdateError>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QueueKey {
    engine: EngineId,
    stage: Stage,
    owner: ObjectId,
    id: String,
}

struct QueueEntry {
    callbacks: Vec<UpdateFn>,
}

/// Identifier of a stage or post-render observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type StageObserver = Rc<RefCell<Box<dyn FnMut(Stage)>>>;
type FrameObserver = Rc<RefCell<Box<dyn FnMut(&FrameInfo)>>>;

struct SchedulerState {
    clock: Box<dyn FrameClock>,
    running: bool,
    ticking: bool,
    frame: u64,
    current: Stage,
    store: IndexMap<QueueKey, QueueEntry>,
    stage_observers: IndexMap<ObserverId, StageObserver>,
    post_render_observers: IndexMap<ObserverId, FrameObserver>,
    next_observer: u64,
}

/// Handle returned by [`Scheduler::queue_update`].
///
/// Inert when the update was dropped (unknown owner, unqueueable stage) or
/// once the entry has run.
#[derive(Clone)]
pub struct UpdateHandle {
    state: Weak<RefCell<SchedulerState>>,
    key: Option<QueueKey>,
}

impl UpdateHandle {
    fn inert() -> Self {
        Self { state: Weak::new(), key: None }
    }

    /// Whether the entry is still waiting for its stage.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        let (Some(state), Some(key)) = (self.state.upgrade(), &self.key) else {
            return false;
        };
        state.borrow().store.contains_key(key)
    }

    /// Append a callback to the pending entry instead of replacing it.
    /// Returns `false` if the entry is no longer pending.
    pub fn add_callback(
        &self,
        callback: impl FnOnce(&FrameInfo) -> Result<(), UpdateError> + 'static,
    ) -> bool {
        let (Some(state), Some(key)) = (self.state.upgrade(), &self.key) else {
            return false;
        };
        let mut state = state.borrow_mut();
        match state.store.get_mut(key) {
            Some(entry) => {
                entry.callbacks.push(Box::new(callback));
                true
            }
            None => false,
        }
    }

    /// Drop the pending entry. Callbacks already running cannot be aborted.
    pub fn cancel(&self) -> bool {
        let (Some(state), Some(key)) = (self.state.upgrade(), &self.key) else {
            return false;
        };
        state.borrow_mut().store.shift_remove(key).is_some()
    }
}

// =============================================================================
// SCHEDULER
// =============================================================================

/// The frame pipeline shared by every engine. Clones refer to the same scheduler.
#[derive(Clone)]
pub struct Scheduler {
    state: Rc<RefCell<SchedulerState>>,
    registry: SharedRegistry,
}

impl Scheduler {
    pub(crate) fn new(clock: Box<dyn FrameClock>, registry: SharedRegistry) -> Self {
        Self {
            state: Rc::new(RefCell::new(SchedulerState {
                clock,
                running: false,
                ticking: false,
                frame: 0,
                current: Stage::Idle,
                store: IndexMap::new(),
                stage_observers: IndexMap::new(),
                post_render_observers: IndexMap::new(),
                next_observer: 0,
            })),
            registry,
        }
    }

    // --- Registration ---

    /// Add `engine` to the pipeline. Idempotent; the clock starts with the
    /// first engine. Destroyed engines are refused.
    pub fn register(&self, engine: &Engine) -> bool {
        if engine.is_destroyed() {
            debug!(engine = %engine.id(), "register of destroyed engine ignored");
            return false;
        }
        let (added, count) = {
            let mut registry = self.registry.borrow_mut();
            let added = registry.register_engine(engine.clone());
            (added, registry.engine_count())
        };
        if !added {
            return false;
        }
        info!(engine = %engine.id(), engines = count, "engine registered");
        let mut state = self.state.borrow_mut();
        if !state.running {
            state.running = true;
            state.clock.start();
            info!("frame clock started");
        }
        true
    }

    /// Remove `engine` from the pipeline and drop its pending work. Idempotent;
    /// the clock stops with the last engine.
    pub fn unregister(&self, engine: &Engine) -> bool {
        let (removed, count) = {
            let mut registry = self.registry.borrow_mut();
            let removed = registry.unregister_engine(engine.id());
            (removed, registry.engine_count())
        };
        if !removed {
            return false;
        }
        info!(engine = %engine.id(), engines = count, "engine unregistered");
        let mut state = self.state.borrow_mut();
        let id = engine.id();
        state.store.retain(|key, _| key.engine != id);
        if count == 0 && state.running {
            state.running = false;
            state.clock.stop();
            info!("frame clock stopped");
        }
        true
    }

    #[must_use]
    pub fn engine_count(&self) -> usize {
        self.registry.borrow().engine_count()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.borrow().running
    }

    // --- Queueing ---

    /// Queue `callback` for `stage` of the next tick under `(owner, id)`.
    ///
    /// A second call with the same `(owner, id)` and stage before the stage
    /// runs replaces the stored callbacks. Use [`UpdateHandle::add_callback`]
    /// to append instead. Unknown owners, owners of unregistered engines, and
    /// unqueueable stages are silently dropped.
    pub fn queue_update(
        &self,
        stage: Stage,
        owner: ObjectId,
        id: impl Into<String>,
        callback: impl FnOnce(&FrameInfo) -> Result<(), UpdateError> + 'static,
    ) -> UpdateHandle {
        let id = id.into();
        if !stage.is_queueable() {
            debug!(%stage, %owner, %id, "stage is not queueable; update dropped");
            return UpdateHandle::inert();
        }
        let Some(engine) = self.registry.borrow().live_engine_of(owner).map(Engine::id) else {
            debug!(%stage, %owner, %id, "owner not registered; update dropped");
            return UpdateHandle::inert();
        };
        let key = QueueKey { engine, stage, owner, id };
        self.state
            .borrow_mut()
            .store
            .insert(key.clone(), QueueEntry { callbacks: vec![Box::new(callback)] });
        UpdateHandle { state: Rc::downgrade(&self.state), key: Some(key) }
    }

    /// Entries waiting for `stage`.
    #[must_use]
    pub fn pending(&self, stage: Stage) -> usize {
        self.state.borrow().store.keys().filter(|key| key.stage == stage).count()
    }

    /// Stage currently executing, [`Stage::Idle`] between ticks.
    #[must_use]
    pub fn current_stage(&self) -> Stage {
        self.state.borrow().current
    }

    /// Number of ticks run so far.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.state.borrow().frame
    }

    // --- Observers ---

    /// Observe each stage as it starts, including [`Stage::PostRender`].
    pub fn add_stage_observer(&self, observer: impl FnMut(Stage) + 'static) -> ObserverId {
        let mut state = self.state.borrow_mut();
        let id = next_observer_id(&mut state);
        state.stage_observers.insert(id, Rc::new(RefCell::new(Box::new(observer))));
        id
    }

    /// Run `observer` after collision detection on every tick.
    pub fn on_post_render(&self, observer: impl FnMut(&FrameInfo) + 'static) -> ObserverId {
        let mut state = self.state.borrow_mut();
        let id = next_observer_id(&mut state);
        state.post_render_observers.insert(id, Rc::new(RefCell::new(Box::new(observer))));
        id
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut state = self.state.borrow_mut();
        state.stage_observers.shift_remove(&id).is_some() || state.post_render_observers.shift_remove(&id).is_some()
    }

    // --- Tick ---

    /// Run one full pipeline. Returns `false` without doing anything when no
    /// engine is registered or when called from inside a running tick.
    pub fn tick(&self, now: f64) -> bool {
        let frame = {
            let mut state = self.state.borrow_mut();
            if state.ticking {
                warn!(frame = state.frame, "tick requested while a tick is in progress; ignored");
                return false;
            }
            if !state.running {
                return false;
            }
            state.ticking = true;
            state.frame += 1;
            state.frame
        };

        let _idle_on_exit = TickGuard { state: &self.state };

        let engines = self.registry.borrow().engines();
        for stage in Stage::PIPELINE {
            self.run_stage(&engines, FrameInfo { frame, now, stage });
        }
        self.run_post_render(&engines, FrameInfo { frame, now, stage: Stage::PostRender });
        true
    }

    fn begin_stage(&self, stage: Stage) {
        let observers: Vec<StageObserver> = {
            let mut state = self.state.borrow_mut();
            state.current = stage;
            state.stage_observers.values().cloned().collect()
        };
        for observer in observers {
            match observer.try_borrow_mut() {
                Ok(mut observer) => {
                    contain(stage, || observer(stage));
                }
                Err(_) => warn!(%stage, "stage observer re-entered; skipped"),
            }
        }
    }

    fn run_stage(&self, engines: &[Engine], info: FrameInfo) {
        let stage = info.stage;
        self.begin_stage(stage);

        let mut batch: IndexMap<QueueKey, QueueEntry> = {
            let mut state = self.state.borrow_mut();
            let store = std::mem::take(&mut state.store);
            let (batch, rest): (IndexMap<_, _>, IndexMap<_, _>) =
                store.into_iter().partition(|(key, _)| key.stage == stage);
            state.store = rest;
            batch
        };

        for engine in engines {
            let id = engine.id();
            if engine.is_destroyed() || !self.registry.borrow().is_registered(id) {
                continue;
            }
            let mine: Vec<(QueueKey, QueueEntry)> = {
                let (mine, rest): (IndexMap<_, _>, IndexMap<_, _>) =
                    std::mem::take(&mut batch).into_iter().partition(|(key, _)| key.engine == id);
                batch = rest;
                mine.into_iter().collect()
            };

            let mut owners: Vec<ObjectId> = Vec::new();
            for (key, entry) in mine {
                if self.registry.borrow().owner_engine(key.owner) != Some(id) {
                    debug!(%stage, owner = %key.owner, id = %key.id, "owner left engine; update dropped");
                    continue;
                }
                for callback in entry.callbacks {
                    if let Some(Err(error)) = contain(stage, || callback(&info)) {
                        warn!(%stage, owner = %key.owner, id = %key.id, %error, "update callback failed");
                    }
                }
                if !owners.contains(&key.owner) {
                    owners.push(key.owner);
                }
            }

            if stage == Stage::Animation {
                engine.run_animations(&info);
            }

            for owner in owners {
                let object = self.registry.borrow().object(owner);
                if let Some(object) = object {
                    contain(stage, || object.stage_complete(stage));
                }
            }
        }

        if !batch.is_empty() {
            debug!(%stage, dropped = batch.len(), "updates for unregistered engines dropped");
        }
    }

    fn run_post_render(&self, engines: &[Engine], info: FrameInfo) {
        self.begin_stage(Stage::PostRender);
        for engine in engines {
            if !engine.is_destroyed() {
                engine.detect_collisions();
            }
        }
        let observers: Vec<FrameObserver> = self.state.borrow().post_render_observers.values().cloned().collect();
        for observer in observers {
            match observer.try_borrow_mut() {
                Ok(mut observer) => {
                    contain(Stage::PostRender, || observer(&info));
                }
                Err(_) => warn!("post-render observer re-entered; skipped"),
            }
        }
    }
}

/// Returns the scheduler to idle when a tick ends, including by unwinding.
struct TickGuard<'a> {
    state: &'a RefCell<SchedulerState>,
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        match self.state.try_borrow_mut() {
            Ok(mut state) => {
                state.current = Stage::Idle;
                state.ticking = false;
            }
            Err(_) => warn!("scheduler state borrowed at end of tick; left ticking"),
        }
    }
}

fn next_observer_id(state: &mut SchedulerState) -> ObserverId {
    state.next_observer += 1;
    ObserverId(state.next_observer)
}
