//! Topic-based event bus for dispatcher and scheduler events.
//!
//! Events are best-effort notifications for observers (timeline views,
//! journals, tests). Publishing never blocks and never fails the pipeline.

mod bus;
mod types;

pub use bus::{Event, EventBus, Topic};
pub use types::{DispatchEvent, ScheduleEvent};
