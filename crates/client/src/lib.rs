//! Headless skirmish client.
//!
//! Composes the runtime and the battle rules into a runnable match:
//!
//! ```text
//! Skirmish
//!   ├─→ TimeSystem::run   (scheduler on the wall clock)
//!   ├─→ hero autopilot    (plays a card every `hero_interval`)
//!   ├─→ Timeline          (cast progress, via CastBar)
//!   └─→ JournalWorker     (runtime events → events.jsonl)
//! ```
pub mod config;
pub mod driver;
pub mod journal;
pub mod logging;
pub mod timeline;

pub use config::SkirmishConfig;
pub use driver::{Report, Skirmish, choose_play};
pub use journal::{EventJournal, JournalWorker, read_journal};
pub use timeline::{Slot, Timeline};
