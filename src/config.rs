//! Environment-driven configuration for sessions and the database pool.
//!
//! Every knob has a compiled-in default; unset or unparsable variables fall
//! back to it. `.env` is loaded by the binary before any of this runs.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use canvas::camera::ZoomLimits;
use canvas::consts::{HISTORY_DEPTH, ZOOM_MAX, ZOOM_MIN, ZOOM_STEP};
use tracing::warn;

const DEFAULT_WRITE_QUEUE_CAPACITY: usize = 1024;
const DEFAULT_FEED_CAPACITY: usize = 1024;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("zoom bounds invalid: min {min}, max {max}, step {step}")]
    ZoomBounds { min: f64, max: f64, step: f64 },
    #[error("{0} must be at least 1")]
    Zero(&'static str),
}

/// Parse `key` from the environment, falling back to `default` when unset or invalid.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    let Ok(raw) = std::env::var(key) else {
        return default;
    };
    match raw.parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!(key, value = %raw, "config: unparsable value; using default");
            default
        }
    }
}

/// Per-session tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    /// Undo steps retained; oldest evicted first.
    pub history_depth: usize,
    pub zoom: ZoomLimits,
    /// Bounded queue between the pipeline and the remote writer task.
    pub write_queue_capacity: usize,
    /// Bounded queue between a change-feed subscription and the session.
    pub feed_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_depth: HISTORY_DEPTH,
            zoom: ZoomLimits { min: ZOOM_MIN, max: ZOOM_MAX, step: ZOOM_STEP },
            write_queue_capacity: DEFAULT_WRITE_QUEUE_CAPACITY,
            feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Read `NOTEBOARD_*` variables over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the resulting values are inconsistent.
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();
        let config = Self {
            history_depth: env_parse("NOTEBOARD_HISTORY_DEPTH", d.history_depth),
            zoom: ZoomLimits {
                min: env_parse("NOTEBOARD_ZOOM_MIN", d.zoom.min),
                max: env_parse("NOTEBOARD_ZOOM_MAX", d.zoom.max),
                step: env_parse("NOTEBOARD_ZOOM_STEP", d.zoom.step),
            },
            write_queue_capacity: env_parse("NOTEBOARD_WRITE_QUEUE_CAPACITY", d.write_queue_capacity),
            feed_capacity: env_parse("NOTEBOARD_FEED_CAPACITY", d.feed_capacity),
        };
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Zoom bounds must satisfy `0 < min <= max` with a step above 1; depth
    /// and queue sizes must be non-zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ZoomLimits { min, max, step } = self.zoom;
        if !(min > 0.0 && min <= max && step > 1.0) {
            return Err(ConfigError::ZoomBounds { min, max, step });
        }
        if self.history_depth == 0 {
            return Err(ConfigError::Zero("NOTEBOARD_HISTORY_DEPTH"));
        }
        if self.write_queue_capacity == 0 {
            return Err(ConfigError::Zero("NOTEBOARD_WRITE_QUEUE_CAPACITY"));
        }
        if self.feed_capacity == 0 {
            return Err(ConfigError::Zero("NOTEBOARD_FEED_CAPACITY"));
        }
        Ok(())
    }
}

/// Postgres connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub database_url: String,
    pub max_connections: u32,
}

impl DbConfig {
    #[must_use]
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
        }
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `DATABASE_URL` is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var("DATABASE_URL") {
            Ok(url) if !url.is_empty() => Ok(Self::new(url)),
            _ => Err(ConfigError::Missing("DATABASE_URL")),
        }
    }
}
