//! In-process runtime for interactive diagram editors.
//!
//! The runtime positions nothing itself. Hosts hand it [`object::Positionable`]
//! objects grouped into engines (one per viewport), and the runtime provides
//! three shared services on top: a fixed per-frame update pipeline that keeps
//! layout reads apart from writes, sweep-line collision detection with
//! persistent contacts, and a gesture arbiter that turns raw pointer input
//! into drag and pinch events for any number of subscribers.
//!
//! Everything is single-threaded. The host owns the frame source and calls
//! [`runtime::Runtime::tick`] once per frame.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`runtime`] | Top-level handle wiring registry, scheduler, and arbiter |
//! | [`scheduler`] | Stage pipeline, coalescing queue store, frame clock |
//! | [`engine`] | One viewport instance: objects, colliders, animations |
//! | [`collision`] | Shapes, colliders, sweep-line contact detection |
//! | [`gesture`] | Pointer and gesture records, admission control |
//! | [`events`] | Event kinds, payloads, typed subscription registry |
//! | [`input`] | Raw pointer and wheel input types |
//! | [`registry`] | Shared engine and object ownership table |
//! | [`object`] | Positionable capability and world-transform resolution |
//! | [`viewport`] | Viewport capability and the pan/zoom camera |
//! | [`geometry`] | Points, rectangles, transforms |
//! | [`config`] | Runtime configuration from env or JSON |
//! | [`error`] | Error types |
//! | [`consts`] | Shared constants |

pub mod collision;
pub mod config;
pub mod consts;
pub mod engine;
pub mod error;
pub mod events;
pub mod geometry;
pub mod gesture;
pub mod input;
pub mod object;
pub mod registry;
pub mod runtime;
pub mod scheduler;
pub mod viewport;

#[cfg(test)]
#[path = "fixtures_test.rs"]
pub(crate) mod fixtures;
