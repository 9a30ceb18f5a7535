//! Runtime configuration and environment loaders.
use std::env;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Horizontal extents of the countdown track that progress handles are laid
/// out on. Progress 0.0 maps to `start`, 1.0 (due) maps to `end`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackExtents {
    pub start: f32,
    pub end: f32,
}

impl TrackExtents {
    pub const fn new(start: f32, end: f32) -> Self {
        Self { start, end }
    }

    /// Linear position on the track for a progress fraction.
    pub fn position(&self, progress: f32) -> f32 {
        let t = progress.clamp(0.0, 1.0);
        self.start + (self.end - self.start) * t
    }
}

impl Default for TrackExtents {
    fn default() -> Self {
        Self::new(0.0, 1.0)
    }
}

/// Configuration shared by the dispatcher and the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Capacity of each event bus topic.
    pub event_buffer_size: usize,
    /// Whether the scheduler clock starts paused (a `ResumeTime` action
    /// starts it).
    pub start_paused: bool,
    /// Extents forwarded to progress handles.
    pub track: TrackExtents,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 100,
            start_paused: true,
            track: TrackExtents::default(),
        }
    }
}

impl RuntimeConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `CASCADE_EVENT_BUFFER` - Event bus capacity per topic (default: 100)
    /// - `CASCADE_START_PAUSED` - Start the scheduler paused (default: true)
    /// - `CASCADE_TRACK_START` - Track start coordinate (default: 0.0)
    /// - `CASCADE_TRACK_END` - Track end coordinate (default: 1.0)
    ///
    /// Unset variables keep their defaults; malformed ones are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(capacity) = read_env::<usize>("CASCADE_EVENT_BUFFER", "positive integer")? {
            config.event_buffer_size = capacity.max(1);
        }

        if let Some(paused) = read_env::<bool>("CASCADE_START_PAUSED", "boolean")? {
            config.start_paused = paused;
        }

        if let Some(start) = read_env::<f32>("CASCADE_TRACK_START", "number")? {
            config.track.start = start;
        }
        if let Some(end) = read_env::<f32>("CASCADE_TRACK_END", "number")? {
            config.track.end = end;
        }
        if config.track.start == config.track.end {
            return Err(ConfigError::DegenerateTrack(config.track.start));
        }

        Ok(config)
    }
}

/// Reads and parses an environment variable.
///
/// Returns `Ok(None)` when the variable is unset.
pub fn read_env<T>(key: &'static str, expected: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
{
    let Ok(value) = env::var(key) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            key,
            value,
            expected,
        })
}
