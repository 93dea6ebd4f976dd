//! Error types surfaced by the runtime.
//!
//! Most runtime operations are infallible by contract: acting on an unknown
//! identity is a logged no-op. Errors exist only where a caller can act on
//! them: configuration parsing and update callbacks reporting failure.

/// Error returned while building a [`crate::config::RuntimeConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable was set to a value that does not parse.
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
    /// The JSON config document was malformed.
    #[error("failed to parse runtime config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure reported by a queued update callback.
///
/// The scheduler logs the error and moves on to the next callback; a failing
/// callback never aborts the stage.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// The object the callback targets is gone.
    #[error("object {0} is no longer available")]
    ObjectGone(crate::object::ObjectId),
    /// Any other failure, described by the callback.
    #[error("{0}")]
    Failed(String),
}

impl UpdateError {
    /// Convenience constructor for [`UpdateError::Failed`].
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
