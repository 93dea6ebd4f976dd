//! Runtime configuration parsed from environment variables or JSON.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use serde::Deserialize;

use crate::consts::{ENV_COLLISIONS_ENABLED, ENV_MAX_SIMULTANEOUS_DRAGS, ENV_PINCH_ENABLED};
use crate::error::ConfigError;

/// Tunables shared by every engine in one runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Upper bound on concurrent drag gestures. Zero or negative means unbounded.
    pub max_simultaneous_drags: i64,
    /// Whether two or more tracked pointers produce pinch gestures.
    pub pinch_enabled: bool,
    /// Whether engines get a collision engine unless they opt out.
    pub collisions_enabled: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { max_simultaneous_drags: 0, pinch_enabled: true, collisions_enabled: true }
    }
}

impl RuntimeConfig {
    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `BOARD_MAX_SIMULTANEOUS_DRAGS`: integer, default unbounded
    /// - `BOARD_PINCH_ENABLED`: `true`/`false`/`1`/`0`, default `true`
    /// - `BOARD_COLLISIONS_ENABLED`: `true`/`false`/`1`/`0`, default `true`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] when a set variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| match std::env::var(key) {
            Ok(value) => Some(value),
            Err(_) => None,
        })
    }

    /// Build config from an arbitrary key lookup (env-shaped).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] when a present key does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            max_simultaneous_drags: parse_i64(ENV_MAX_SIMULTANEOUS_DRAGS, lookup(ENV_MAX_SIMULTANEOUS_DRAGS))?
                .unwrap_or(defaults.max_simultaneous_drags),
            pinch_enabled: parse_bool(ENV_PINCH_ENABLED, lookup(ENV_PINCH_ENABLED))?.unwrap_or(defaults.pinch_enabled),
            collisions_enabled: parse_bool(ENV_COLLISIONS_ENABLED, lookup(ENV_COLLISIONS_ENABLED))?
                .unwrap_or(defaults.collisions_enabled),
        })
    }

    /// Parse config from a JSON document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] for malformed input.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// The effective drag limit, `None` when admission control is disabled.
    #[must_use]
    pub fn drag_limit(&self) -> Option<usize> {
        usize::try_from(self.max_simultaneous_drags).map_or(None, |n| (n > 0).then_some(n))
    }
}

fn parse_i64(var: &'static str, raw: Option<String>) -> Result<Option<i64>, ConfigError> {
    match raw {
        None => Ok(None),
        Some(value) => match value.trim().parse::<i64>() {
            Ok(n) => Ok(Some(n)),
            Err(_) => Err(ConfigError::InvalidEnv { var, value }),
        },
    }
}

fn parse_bool(var: &'static str, raw: Option<String>) -> Result<Option<bool>, ConfigError> {
    match raw.as_deref().map(str::trim) {
        None => Ok(None),
        Some("1" | "true" | "yes" | "on") => Ok(Some(true)),
        Some("0" | "false" | "no" | "off") => Ok(Some(false)),
        Some(other) => Err(ConfigError::InvalidEnv { var, value: other.to_string() }),
    }
}
