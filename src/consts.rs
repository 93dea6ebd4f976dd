//! Shared constants for the runtime crate.

// ── Gestures ────────────────────────────────────────────────────

/// Env var naming the drag admission limit (`<= 0` disables the limit).
pub const ENV_MAX_SIMULTANEOUS_DRAGS: &str = "BOARD_MAX_SIMULTANEOUS_DRAGS";

/// Env var toggling pinch detection.
pub const ENV_PINCH_ENABLED: &str = "BOARD_PINCH_ENABLED";

/// Minimum pointer count before pinch detection runs.
pub const PINCH_MIN_POINTERS: usize = 2;

// ── Collision ───────────────────────────────────────────────────

/// Env var toggling whether new engines get a collision engine.
pub const ENV_COLLISIONS_ENABLED: &str = "BOARD_COLLISIONS_ENABLED";
