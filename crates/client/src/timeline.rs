//! Headless cast timeline: tracks the progress of every card being cast.
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use game_battle::{Card, CastBar, Combatant};
use runtime::{ProgressHandle, TrackExtents};
use tracing::{debug, trace};

/// One cast in flight as seen on the timeline.
#[derive(Clone, Debug, PartialEq)]
pub struct Slot {
    pub caster: String,
    pub card: String,
    pub progress: f32,
    pub position: f32,
}

#[derive(Default)]
struct Slots {
    next: AtomicU64,
    open: Mutex<BTreeMap<u64, Slot>>,
}

impl Slots {
    fn open(&self) -> MutexGuard<'_, BTreeMap<u64, Slot>> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// [`CastBar`] that keeps the latest progress of each open cast.
#[derive(Clone, Default)]
pub struct Timeline {
    slots: Arc<Slots>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open casts, oldest first.
    pub fn snapshot(&self) -> Vec<Slot> {
        self.slots.open().values().cloned().collect()
    }

    pub fn active(&self) -> usize {
        self.slots.open().len()
    }
}

impl CastBar for Timeline {
    fn open(&self, caster: &Combatant, card: &Card) -> Arc<dyn ProgressHandle> {
        let id = self.slots.next.fetch_add(1, Ordering::Relaxed);
        self.slots.open().insert(
            id,
            Slot {
                caster: caster.name.clone(),
                card: card.name.clone(),
                progress: 0.0,
                position: 0.0,
            },
        );
        debug!(target: "skirmish::timeline", slot = id, caster = %caster.name, card = %card.name, "Cast opened");
        Arc::new(SlotHandle {
            id,
            slots: Arc::clone(&self.slots),
        })
    }
}

struct SlotHandle {
    id: u64,
    slots: Arc<Slots>,
}

impl ProgressHandle for SlotHandle {
    fn update(&self, progress: f32, track: TrackExtents) {
        if let Some(slot) = self.slots.open().get_mut(&self.id) {
            slot.progress = progress;
            slot.position = track.position(progress);
            trace!(target: "skirmish::timeline", slot = self.id, progress, position = slot.position);
        }
    }

    fn release(&self) {
        if let Some(slot) = self.slots.open().remove(&self.id) {
            debug!(
                target: "skirmish::timeline",
                slot = self.id,
                card = %slot.card,
                progress = slot.progress,
                "Cast closed"
            );
        }
    }
}
