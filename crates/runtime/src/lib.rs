//! Reaction-based action resolution with a delayed-action scheduler.
//!
//! Two cooperating components form the core:
//!
//! - [`ActionSystem`] resolves one action at a time through a pre → perform →
//!   post pipeline, draining reactions queued by handlers depth-first
//! - [`TimeSystem`] holds actions with countdowns and hands due ones to the
//!   dispatcher, draining every due entry before the clock moves again
//!
//! Modules are organized by responsibility:
//! - [`action`] defines action identity (kinds) and type-erased sharing
//! - [`dispatch`] hosts the dispatcher, its registry, and the handler trait
//! - [`schedule`] hosts the countdown scheduler and its collaborators
//! - [`events`] provides a topic-based event bus for observers
//! - [`config`] and [`error`] carry configuration and error types
//!
//! Everything runs cooperatively on a single tokio task; handlers suspend by
//! awaiting, never by blocking.
pub mod action;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod schedule;

mod utils;

pub use action::{Action, ActionKind};
pub use config::{RuntimeConfig, TrackExtents};
pub use dispatch::{
    ActionSystem, FnHandler, Handler, HandlerResult, IntoAction, Phase, ReactionTiming,
    Subscription, handler_fn,
};
pub use error::{ConfigError, DispatchError};
pub use events::{DispatchEvent, Event, EventBus, ScheduleEvent, Topic};
pub use schedule::{EntryId, PauseTime, ProgressHandle, ResumeTime, TimeSystem};

/// Builds a dispatcher and a scheduler sharing one event bus, with the
/// scheduler's clock control performers attached.
pub fn build(config: &RuntimeConfig) -> (ActionSystem, TimeSystem) {
    let actions = ActionSystem::with_config(config);
    let time = TimeSystem::new(actions.clone(), config);
    time.enable();
    (actions, time)
}
