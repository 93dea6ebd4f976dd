use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::*;
use crate::engine::AnimationStep;
use crate::fixtures::TestObject;
use crate::registry::Registry;
use crate::viewport::Camera;

// =============================================================
// Helpers
// =============================================================

struct Harness {
    scheduler: Scheduler,
    registry: SharedRegistry,
    clock: ManualClock,
}

fn harness() -> Harness {
    let registry: SharedRegistry = Rc::new(RefCell::new(Registry::new()));
    let clock = ManualClock::new();
    let scheduler = Scheduler::new(Box::new(clock.clone()), Rc::clone(&registry));
    Harness { scheduler, registry, clock }
}

impl Harness {
    fn engine(&self) -> Engine {
        let engine = Engine::new(Rc::new(Camera::default()), &self.registry, true);
        self.scheduler.register(&engine);
        engine
    }
}

type Log = Rc<RefCell<Vec<String>>>;

fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

fn record(log: &Log, entry: &str) -> impl FnOnce(&FrameInfo) -> Result<(), UpdateError> + 'static {
    let log = Rc::clone(log);
    let entry = entry.to_string();
    move |_| {
        log.borrow_mut().push(entry);
        Ok(())
    }
}

// =============================================================
// Stage
// =============================================================

#[test]
fn pipeline_order_is_fixed() {
    assert_eq!(
        Stage::PIPELINE,
        [Stage::Read1, Stage::Write1, Stage::Read2, Stage::Write2, Stage::Animation, Stage::Read3, Stage::Write3]
    );
}

#[test]
fn stage_classification() {
    assert!(Stage::Read2.is_read());
    assert!(Stage::Write3.is_write());
    assert!(!Stage::Animation.is_read());
    assert!(!Stage::Idle.is_queueable());
    assert!(!Stage::PostRender.is_queueable());
    assert_eq!(Stage::Write1.to_string(), "WRITE_1");
}

// =============================================================
// Coalescing
// =============================================================

#[test]
fn requeue_same_key_keeps_only_last_callback() {
    let h = harness();
    let engine = h.engine();
    let obj = TestObject::at(0.0, 0.0);
    engine.add_object(&obj);
    let log = log();

    for i in 0..5 {
        h.scheduler.queue_update(Stage::Write1, obj.id(), "transform", record(&log, &format!("call-{i}")));
    }
    assert_eq!(h.scheduler.pending(Stage::Write1), 1);
    assert!(h.scheduler.tick(16.0));
    assert_eq!(*log.borrow(), vec!["call-4".to_string()]);
}

#[test]
fn add_callback_appends_to_pending_entry() {
    let h = harness();
    let engine = h.engine();
    let obj = TestObject::at(0.0, 0.0);
    engine.add_object(&obj);
    let log = log();

    let handle = h.scheduler.queue_update(Stage::Read1, obj.id(), "measure", record(&log, "first"));
    assert!(handle.add_callback(record(&log, "second")));
    h.scheduler.tick(0.0);
    assert_eq!(*log.borrow(), vec!["first".to_string(), "second".to_string()]);
    assert!(!handle.is_pending());
    assert!(!handle.add_callback(record(&log, "late")));
}

#[test]
fn different_ids_for_same_owner_both_run_in_insertion_order() {
    let h = harness();
    let engine = h.engine();
    let obj = TestObject::at(0.0, 0.0);
    engine.add_object(&obj);
    let log = log();

    h.scheduler.queue_update(Stage::Write2, obj.id(), "b", record(&log, "b"));
    h.scheduler.queue_update(Stage::Write2, obj.id(), "a", record(&log, "a"));
    h.scheduler.tick(0.0);
    assert_eq!(*log.borrow(), vec!["b".to_string(), "a".to_string()]);
}

#[test]
fn cancel_drops_pending_entry() {
    let h = harness();
    let engine = h.engine();
    let obj = TestObject::at(0.0, 0.0);
    engine.add_object(&obj);
    let log = log();

    let handle = h.scheduler.queue_update(Stage::Write1, obj.id(), "x", record(&log, "x"));
    assert!(handle.cancel());
    h.scheduler.tick(0.0);
    assert!(log.borrow().is_empty());
}

// =============================================================
// Stage order
// =============================================================

#[test]
fn stage_trace_repeats_without_interleaving() {
    let h = harness();
    let _engine = h.engine();
    let trace: Rc<RefCell<Vec<Stage>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&trace);
    h.scheduler.add_stage_observer(move |stage| sink.borrow_mut().push(stage));

    for frame in 0..3 {
        h.scheduler.tick(f64::from(frame) * 16.0);
    }

    let one_tick = [
        Stage::Read1,
        Stage::Write1,
        Stage::Read2,
        Stage::Write2,
        Stage::Animation,
        Stage::Read3,
        Stage::Write3,
        Stage::PostRender,
    ];
    let expected: Vec<Stage> = one_tick.iter().copied().cycle().take(one_tick.len() * 3).collect();
    assert_eq!(*trace.borrow(), expected);
    assert_eq!(h.scheduler.current_stage(), Stage::Idle);
    assert_eq!(h.scheduler.frame(), 3);
}

#[test]
fn callbacks_see_their_stage() {
    let h = harness();
    let engine = h.engine();
    let obj = TestObject::at(0.0, 0.0);
    engine.add_object(&obj);
    let seen = Rc::new(Cell::new(None));
    let sink = Rc::clone(&seen);
    h.scheduler.queue_update(Stage::Read3, obj.id(), "x", move |info| {
        sink.set(Some(info.stage));
        Ok(())
    });
    h.scheduler.tick(0.0);
    assert_eq!(seen.get(), Some(Stage::Read3));
}

#[test]
fn same_stage_requeue_during_stage_runs_next_tick() {
    let h = harness();
    let engine = h.engine();
    let obj = TestObject::at(0.0, 0.0);
    engine.add_object(&obj);
    let log = log();

    let scheduler = h.scheduler.clone();
    let inner_log = Rc::clone(&log);
    let owner = obj.id();
    h.scheduler.queue_update(Stage::Write1, owner, "outer", move |_| {
        inner_log.borrow_mut().push("outer".into());
        scheduler.queue_update(Stage::Write1, owner, "inner", record(&inner_log, "inner"));
        Ok(())
    });

    h.scheduler.tick(0.0);
    assert_eq!(*log.borrow(), vec!["outer".to_string()]);
    assert_eq!(h.scheduler.pending(Stage::Write1), 1);
    h.scheduler.tick(16.0);
    assert_eq!(*log.borrow(), vec!["outer".to_string(), "inner".to_string()]);
}

#[test]
fn queue_for_later_stage_during_tick_runs_same_tick() {
    let h = harness();
    let engine = h.engine();
    let obj = TestObject::at(0.0, 0.0);
    engine.add_object(&obj);
    let log = log();

    let scheduler = h.scheduler.clone();
    let inner_log = Rc::clone(&log);
    let owner = obj.id();
    h.scheduler.queue_update(Stage::Read1, owner, "measure", move |_| {
        scheduler.queue_update(Stage::Write1, owner, "apply", record(&inner_log, "apply"));
        Ok(())
    });
    h.scheduler.tick(0.0);
    assert_eq!(*log.borrow(), vec!["apply".to_string()]);
}

// =============================================================
// Engines and owners
// =============================================================

#[test]
fn engines_run_in_registration_order() {
    let h = harness();
    let first = h.engine();
    let second = h.engine();
    let a = TestObject::at(0.0, 0.0);
    let b = TestObject::at(0.0, 0.0);
    first.add_object(&a);
    second.add_object(&b);
    let log = log();

    h.scheduler.queue_update(Stage::Write1, b.id(), "x", record(&log, "second"));
    h.scheduler.queue_update(Stage::Write1, a.id(), "x", record(&log, "first"));
    h.scheduler.tick(0.0);
    assert_eq!(*log.borrow(), vec!["first".to_string(), "second".to_string()]);
}

#[test]
fn stage_complete_fires_once_per_owner_per_stage() {
    let h = harness();
    let engine = h.engine();
    let obj = TestObject::at(0.0, 0.0);
    engine.add_object(&obj);

    h.scheduler.queue_update(Stage::Write1, obj.id(), "a", |_| Ok(()));
    h.scheduler.queue_update(Stage::Write1, obj.id(), "b", |_| Ok(()));
    h.scheduler.queue_update(Stage::Read2, obj.id(), "c", |_| Ok(()));
    h.scheduler.tick(0.0);
    assert_eq!(obj.completed(), vec![Stage::Write1, Stage::Read2]);
}

#[test]
fn unknown_owner_is_silent_noop() {
    let h = harness();
    let _engine = h.engine();
    let stranger = TestObject::at(0.0, 0.0);
    let log = log();

    let handle = h.scheduler.queue_update(Stage::Write1, stranger.id(), "x", record(&log, "x"));
    assert!(!handle.is_pending());
    assert!(!handle.add_callback(|_| Ok(())));
    h.scheduler.tick(0.0);
    assert!(log.borrow().is_empty());
}

#[test]
fn unqueueable_stage_is_dropped() {
    let h = harness();
    let engine = h.engine();
    let obj = TestObject::at(0.0, 0.0);
    engine.add_object(&obj);
    let handle = h.scheduler.queue_update(Stage::PostRender, obj.id(), "x", |_| Ok(()));
    assert!(!handle.is_pending());
}

#[test]
fn dropped_object_is_not_queued() {
    let h = harness();
    let engine = h.engine();
    let obj = TestObject::at(0.0, 0.0);
    engine.add_object(&obj);
    let id = obj.id();
    drop(obj);
    let handle = h.scheduler.queue_update(Stage::Write1, id, "x", |_| Ok(()));
    assert!(!handle.is_pending());
}

#[test]
fn failing_callback_does_not_abort_stage() {
    let h = harness();
    let engine = h.engine();
    let a = TestObject::at(0.0, 0.0);
    let b = TestObject::at(0.0, 0.0);
    engine.add_object(&a);
    engine.add_object(&b);
    let log = log();

    h.scheduler.queue_update(Stage::Write1, a.id(), "x", |_| Err(UpdateError::failed("boom")));
    h.scheduler.queue_update(Stage::Write1, b.id(), "x", record(&log, "b"));
    h.scheduler.queue_update(Stage::Write2, a.id(), "y", record(&log, "a-later"));
    h.scheduler.tick(0.0);
    assert_eq!(*log.borrow(), vec!["b".to_string(), "a-later".to_string()]);
}

#[test]
fn panicking_callback_is_contained() {
    let h = harness();
    let engine = h.engine();
    let a = TestObject::at(0.0, 0.0);
    let b = TestObject::at(0.0, 0.0);
    engine.add_object(&a);
    engine.add_object(&b);
    let log = log();

    h.scheduler.queue_update(Stage::Write1, a.id(), "x", |_| panic!("layout exploded"));
    h.scheduler.queue_update(Stage::Write1, b.id(), "x", record(&log, "b"));
    h.scheduler.queue_update(Stage::Read3, a.id(), "y", record(&log, "a-later"));
    assert!(h.scheduler.tick(0.0));
    assert_eq!(*log.borrow(), vec!["b".to_string(), "a-later".to_string()]);
    assert_eq!(h.scheduler.current_stage(), Stage::Idle);

    h.scheduler.queue_update(Stage::Read1, a.id(), "z", record(&log, "next-frame"));
    assert!(h.scheduler.tick(16.0));
    assert_eq!(log.borrow().last().map(String::as_str), Some("next-frame"));
}

#[test]
fn panicking_observer_and_animation_do_not_stop_the_tick() {
    let h = harness();
    let engine = h.engine();
    let obj = TestObject::at(0.0, 0.0);
    engine.add_object(&obj);
    let log = log();

    h.scheduler.add_stage_observer(|stage| {
        if stage == Stage::Read2 {
            panic!("observer exploded");
        }
    });
    engine.animate(|_| panic!("animation exploded"));
    h.scheduler.queue_update(Stage::Write3, obj.id(), "x", record(&log, "write-3"));

    assert!(h.scheduler.tick(0.0));
    assert_eq!(*log.borrow(), vec!["write-3".to_string()]);
    assert_eq!(engine.animation_count(), 0);
    assert!(h.scheduler.tick(16.0));
}

#[test]
fn unregister_drops_pending_work_for_that_engine_only() {
    let h = harness();
    let gone = h.engine();
    let kept = h.engine();
    let a = TestObject::at(0.0, 0.0);
    let b = TestObject::at(0.0, 0.0);
    gone.add_object(&a);
    kept.add_object(&b);
    let log = log();

    h.scheduler.queue_update(Stage::Write1, a.id(), "x", record(&log, "gone"));
    h.scheduler.queue_update(Stage::Write1, b.id(), "x", record(&log, "kept"));
    h.scheduler.unregister(&gone);
    h.scheduler.tick(0.0);
    assert_eq!(*log.borrow(), vec!["kept".to_string()]);
}

// =============================================================
// Lifecycle
// =============================================================

#[test]
fn clock_starts_with_first_engine_and_stops_with_last() {
    let h = harness();
    assert!(!h.scheduler.is_running());
    assert!(!h.scheduler.tick(0.0));

    let a = h.engine();
    let b = h.engine();
    assert!(h.clock.is_running());
    assert_eq!(h.clock.starts(), 1);

    h.scheduler.unregister(&a);
    assert!(h.clock.is_running());
    h.scheduler.unregister(&b);
    assert!(!h.clock.is_running());
    assert_eq!(h.clock.stops(), 1);
    assert!(!h.scheduler.tick(16.0));
}

#[test]
fn registering_twice_is_idempotent() {
    let h = harness();
    let engine = h.engine();
    assert!(!h.scheduler.register(&engine));
    assert_eq!(h.scheduler.engine_count(), 1);
    assert_eq!(h.clock.starts(), 1);

    let obj = TestObject::at(0.0, 0.0);
    engine.add_object(&obj);
    let count = Rc::new(Cell::new(0));
    let sink = Rc::clone(&count);
    h.scheduler.queue_update(Stage::Write1, obj.id(), "x", move |_| {
        sink.set(sink.get() + 1);
        Ok(())
    });
    h.scheduler.tick(0.0);
    assert_eq!(count.get(), 1);
    assert_eq!(obj.completed(), vec![Stage::Write1]);
}

#[test]
fn unregistering_twice_is_idempotent() {
    let h = harness();
    let engine = h.engine();
    assert!(h.scheduler.unregister(&engine));
    assert!(!h.scheduler.unregister(&engine));
    assert_eq!(h.clock.stops(), 1);
}

#[test]
fn tick_inside_tick_is_refused() {
    let h = harness();
    let engine = h.engine();
    let obj = TestObject::at(0.0, 0.0);
    engine.add_object(&obj);
    let nested = Rc::new(Cell::new(true));
    let sink = Rc::clone(&nested);
    let scheduler = h.scheduler.clone();
    h.scheduler.queue_update(Stage::Write1, obj.id(), "x", move |_| {
        sink.set(scheduler.tick(1.0));
        Ok(())
    });
    assert!(h.scheduler.tick(0.0));
    assert!(!nested.get());
    assert_eq!(h.scheduler.frame(), 1);
}

// =============================================================
// Animation and post-render
// =============================================================

#[test]
fn animations_run_each_tick_until_done() {
    let h = harness();
    let engine = h.engine();
    let runs = Rc::new(Cell::new(0));
    let sink = Rc::clone(&runs);
    engine.animate(move |info| {
        assert_eq!(info.stage, Stage::Animation);
        sink.set(sink.get() + 1);
        if sink.get() == 2 { AnimationStep::Done } else { AnimationStep::Continue }
    });
    for i in 0..4 {
        h.scheduler.tick(f64::from(i));
    }
    assert_eq!(runs.get(), 2);
    assert_eq!(engine.animation_count(), 0);
}

#[test]
fn post_render_observer_runs_after_write_stages() {
    let h = harness();
    let engine = h.engine();
    let obj = TestObject::at(0.0, 0.0);
    engine.add_object(&obj);
    let log = log();

    h.scheduler.queue_update(Stage::Write3, obj.id(), "x", record(&log, "write3"));
    let sink = Rc::clone(&log);
    let id = h.scheduler.on_post_render(move |info| sink.borrow_mut().push(format!("post:{}", info.frame)));
    h.scheduler.tick(0.0);
    assert_eq!(*log.borrow(), vec!["write3".to_string(), "post:1".to_string()]);

    assert!(h.scheduler.remove_observer(id));
    h.scheduler.tick(16.0);
    assert_eq!(log.borrow().len(), 2);
}
