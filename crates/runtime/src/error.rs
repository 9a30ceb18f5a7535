//! Error types surfaced by the runtime.
//!
//! Handler failures are not represented here: handlers return
//! [`anyhow::Error`] and the dispatcher contains them per callback.

use thiserror::Error;

/// Reasons the dispatcher refused a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// A top-level dispatch is already resolving; the new one was dropped.
    #[error("cannot perform {action}: another action is already being performed")]
    AlreadyPerforming { action: &'static str },

    /// `add_reaction` was called while no phase was collecting reactions.
    #[error("cannot add reaction {action}: no action is being performed")]
    NoActivePhase { action: &'static str },
}

/// Invalid configuration values read from the environment.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{key}={value:?} is not a valid {expected}")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("track extents must differ (start = end = {0})")]
    DegenerateTrack(f32),
}
