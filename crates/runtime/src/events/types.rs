//! Event types for different topics.

use serde::{Deserialize, Serialize};

use crate::dispatch::Phase;

/// Events emitted while the dispatcher resolves an action tree.
///
/// `depth` is 0 for the top-level action and grows by one per nested
/// reaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchEvent {
    /// Resolution of an action started.
    ActionStarted { action: String, depth: usize },

    /// No performer is registered for the action's kind.
    PerformerMissing { action: String, depth: usize },

    /// A handler returned an error; the pipeline continued.
    HandlerFailed {
        action: String,
        phase: Phase,
        handler: String,
        error: String,
    },

    /// All three phases (and every nested reaction) finished.
    ActionCompleted { action: String, depth: usize },

    /// A top-level dispatch was refused because another one is in flight.
    Rejected { action: String },
}

/// Events emitted by the delayed-action scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScheduleEvent {
    /// An action was queued with the given countdown (seconds).
    Scheduled {
        entry: u64,
        action: String,
        countdown: f32,
    },

    /// A due entry was handed to the dispatcher.
    Dispatched { entry: u64, action: String },

    /// A pending entry was cancelled before it ran.
    Cancelled { entry: u64, action: String },

    /// The clock was paused by a `PauseTime` action.
    Paused,

    /// The clock was resumed by a `ResumeTime` action.
    Resumed,
}
