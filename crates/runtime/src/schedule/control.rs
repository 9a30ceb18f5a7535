//! Clock control action kinds.
//!
//! The scheduler attaches performers for these in
//! [`TimeSystem::enable`](super::TimeSystem::enable). Dispatch them like any
//! other action, immediately or with a delay.

use crate::action::Action;

/// Halts countdown advancement and clears the playing flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PauseTime;

impl Action for PauseTime {}

/// Restarts countdown advancement and sets the playing flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResumeTime;

impl Action for ResumeTime {}
