//! Positionable capability: the only thing the runtime knows about scene objects.
//!
//! The scene graph itself (transform trees, styling, node/connector logic)
//! lives with the host. Engines hold objects weakly, so an object dropped by
//! the host simply stops receiving work.

#[cfg(test)]
#[path = "object_test.rs"]
mod object_test;

use uuid::Uuid;

use crate::geometry::Transform;
use crate::scheduler::Stage;

/// Stable identity of a positionable object.
pub type ObjectId = Uuid;

/// Anything the runtime can position, queue work for, or hit-test.
pub trait Positionable {
    /// Stable identity; must not change for the lifetime of the object.
    fn identity(&self) -> ObjectId;

    /// Transform relative to [`Positionable::parent`], or to the world when
    /// there is no parent.
    fn transform(&self) -> Transform;

    /// Immediate parent, if any.
    fn parent(&self) -> Option<ObjectId> {
        None
    }

    /// Called at most once per stage per tick after all of this object's
    /// queued callbacks for `stage` have run.
    fn stage_complete(&self, _stage: Stage) {}
}

/// World transform of `object`, composed with its immediate parent only.
///
/// Grandparents are not consulted: a parent's own `transform()` is taken as
/// already being in world space.
pub fn world_transform<F>(object: &dyn Positionable, lookup_parent: F) -> Transform
where
    F: FnOnce(ObjectId) -> Option<Transform>,
{
    let local = object.transform();
    match object.parent().and_then(lookup_parent) {
        Some(parent) => parent.compose(&local),
        None => local,
    }
}
