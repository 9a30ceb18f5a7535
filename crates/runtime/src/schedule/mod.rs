//! Countdown scheduler for delayed actions.
//!
//! [`TimeSystem`] holds actions that should run after a delay. Each
//! [`tick`](TimeSystem::tick) advances every countdown by the elapsed time
//! (unless paused) and, once the earliest entry is due, *drains*: every due
//! entry is handed to the [`ActionSystem`] one after another, including
//! entries that became due because a dispatched action scheduled them, before
//! the clock is allowed to move again.
//!
//! The entry list is small (tens of entries) and is fully re-sorted at every
//! dispatch point. Entries with equal countdowns run in insertion order.

mod control;
mod entry;
mod progress;

pub use control::{PauseTime, ResumeTime};
pub use entry::EntryId;
pub use progress::ProgressHandle;

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use crate::action::Action;
use crate::config::{RuntimeConfig, TrackExtents};
use crate::dispatch::{ActionSystem, IntoAction, handler_fn};
use crate::events::{Event, ScheduleEvent, Topic};
use crate::utils::lock;
use entry::{ScheduledEntry, sort_entries};

struct SchedulerState {
    entries: Vec<ScheduledEntry>,
    next_id: u64,
    paused: bool,
    /// Whether the clock restarts when the current drain ends. Cleared by a
    /// `PauseTime` dispatched mid-drain.
    resume_after_drain: bool,
    playing: bool,
    draining: bool,
    in_flight: Option<EntryId>,
}

struct Inner {
    actions: ActionSystem,
    track: TrackExtents,
    state: Mutex<SchedulerState>,
}

/// Cloneable handle to a scheduler instance.
#[derive(Clone)]
pub struct TimeSystem {
    inner: Arc<Inner>,
}

/// Ends a drain, even one cut short by a panicking handler: clears the drain
/// markers and restarts the clock unless a `PauseTime` ran meanwhile.
struct DrainGuard<'a> {
    scheduler: &'a TimeSystem,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.scheduler.state();
        state.draining = false;
        state.in_flight = None;
        if state.resume_after_drain {
            state.paused = false;
        }
    }
}

impl TimeSystem {
    pub fn new(actions: ActionSystem, config: &RuntimeConfig) -> Self {
        let paused = config.start_paused;
        Self {
            inner: Arc::new(Inner {
                actions,
                track: config.track,
                state: Mutex::new(SchedulerState {
                    entries: Vec::new(),
                    next_id: 0,
                    paused,
                    resume_after_drain: !paused,
                    playing: !paused,
                    draining: false,
                    in_flight: None,
                }),
            }),
        }
    }

    pub fn actions(&self) -> &ActionSystem {
        &self.inner.actions
    }

    /// Subscribe to scheduler events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.inner.actions.events().subscribe(Topic::Schedule)
    }

    /// Attaches the [`PauseTime`] and [`ResumeTime`] performers.
    pub fn enable(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.actions.attach_performer(
            handler_fn(move |_: Arc<PauseTime>, _| {
                let weak = Weak::clone(&weak);
                async move {
                    if let Some(inner) = weak.upgrade() {
                        TimeSystem { inner }.apply_pause();
                    }
                    Ok(())
                }
            })
            .named("TimeSystem::pause"),
        );

        let weak = Arc::downgrade(&self.inner);
        self.inner.actions.attach_performer(
            handler_fn(move |_: Arc<ResumeTime>, _| {
                let weak = Weak::clone(&weak);
                async move {
                    if let Some(inner) = weak.upgrade() {
                        TimeSystem { inner }.apply_resume();
                    }
                    Ok(())
                }
            })
            .named("TimeSystem::resume"),
        );
    }

    /// Detaches the clock control performers.
    pub fn disable(&self) {
        self.inner.actions.detach_performer::<PauseTime>();
        self.inner.actions.detach_performer::<ResumeTime>();
    }

    /// Schedules `action` to run after `countdown` seconds. A countdown at or
    /// below zero is due on the next tick.
    pub fn add_action(&self, action: impl IntoAction, countdown: f32) -> EntryId {
        self.schedule(action.into_action(), countdown, None)
    }

    /// Like [`add_action`](Self::add_action), with a visual handle that
    /// receives progress updates and is released when the entry leaves the
    /// queue.
    pub fn add_action_with_progress(
        &self,
        action: impl IntoAction,
        countdown: f32,
        handle: Arc<dyn ProgressHandle>,
    ) -> EntryId {
        self.schedule(action.into_action(), countdown, Some(handle))
    }

    fn schedule(
        &self,
        action: Arc<dyn Action>,
        countdown: f32,
        progress: Option<Arc<dyn ProgressHandle>>,
    ) -> EntryId {
        let name = action.name();
        let (id, pending) = {
            let mut state = self.state();
            state.next_id += 1;
            let id = EntryId(state.next_id);
            state.entries.push(ScheduledEntry {
                id,
                action,
                countdown,
                total: countdown,
                progress: progress.clone(),
            });
            (id, state.entries.len())
        };

        debug!(
            target: "runtime::schedule",
            entry = %id,
            action = name,
            countdown,
            pending,
            "Action scheduled"
        );
        if let Some(handle) = progress {
            handle.update(0.0, self.inner.track);
        }
        self.inner.actions.events().publish(ScheduleEvent::Scheduled {
            entry: id.0,
            action: name.to_string(),
            countdown,
        });
        id
    }

    /// Cancels every pending entry of kind `A` matching `predicate`.
    ///
    /// The entry currently being dispatched is left alone. Returns the number
    /// of entries removed.
    pub fn remove_actions<A: Action>(&self, predicate: impl Fn(&A) -> bool) -> usize {
        let candidates: Vec<EntryId> = self
            .snapshot()
            .into_iter()
            .filter(|(_, action, _)| action.downcast_ref::<A>().is_some_and(&predicate))
            .map(|(id, _, _)| id)
            .collect();
        self.cancel(|id| candidates.contains(&id))
    }

    /// Cancels every pending entry except the one being dispatched.
    pub fn clear_all_actions(&self) -> usize {
        self.cancel(|_| true)
    }

    fn cancel(&self, mut select: impl FnMut(EntryId) -> bool) -> usize {
        let removed: Vec<ScheduledEntry> = {
            let mut state = self.state();
            let in_flight = state.in_flight;
            let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.entries)
                .into_iter()
                .partition(|entry| Some(entry.id) != in_flight && select(entry.id));
            state.entries = kept;
            removed
        };

        for entry in &removed {
            debug!(
                target: "runtime::schedule",
                entry = %entry.id,
                action = entry.action.name(),
                countdown = entry.countdown,
                "Action cancelled"
            );
            entry.release();
            self.inner.actions.events().publish(ScheduleEvent::Cancelled {
                entry: entry.id.0,
                action: entry.action.name().to_string(),
            });
        }
        removed.len()
    }

    /// Remaining countdown of the scheduled instance `action` (matched by
    /// identity), or `None` if it is not queued.
    pub fn remaining_countdown<A: Action + ?Sized>(&self, action: &Arc<A>) -> Option<f32> {
        let target = Arc::as_ptr(action).cast::<()>();
        self.state()
            .entries
            .iter()
            .find(|entry| Arc::as_ptr(&entry.action).cast::<()>() == target)
            .map(|entry| entry.countdown)
    }

    /// Remaining countdown of the first queued entry of kind `A` matching
    /// `predicate`, or `None`.
    pub fn remaining_countdown_where<A: Action>(
        &self,
        predicate: impl Fn(&A) -> bool,
    ) -> Option<f32> {
        self.snapshot()
            .into_iter()
            .find(|(_, action, _)| action.downcast_ref::<A>().is_some_and(&predicate))
            .map(|(_, _, countdown)| countdown)
    }

    /// Remaining countdown of a specific entry.
    pub fn remaining_countdown_of(&self, id: EntryId) -> Option<f32> {
        self.state()
            .entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.countdown)
    }

    /// Queued actions in their current order.
    pub fn pending_actions(&self) -> Vec<Arc<dyn Action>> {
        self.snapshot()
            .into_iter()
            .map(|(_, action, _)| action)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().entries.is_empty()
    }

    pub fn is_paused(&self) -> bool {
        self.state().paused
    }

    /// False while the player-facing clock is stopped by `PauseTime`; stays
    /// true while only a drain holds the clock.
    pub fn is_playing(&self) -> bool {
        self.state().playing
    }

    pub fn is_draining(&self) -> bool {
        self.state().draining
    }

    /// Advances the scheduler by one step.
    ///
    /// Does nothing while a drain is running, when nothing is queued, or while
    /// the dispatcher is resolving something else. Otherwise advances the
    /// countdowns (if unpaused) and drains every due entry before returning.
    pub async fn tick(&self, elapsed: Duration) {
        let (updates, due) = {
            let mut state = self.state();
            if state.draining || state.entries.is_empty() || self.inner.actions.is_performing() {
                return;
            }

            let mut updates = Vec::new();
            if !state.paused {
                let seconds = elapsed.as_secs_f32();
                for entry in &mut state.entries {
                    entry.countdown -= seconds;
                    if let Some(handle) = &entry.progress {
                        updates.push((Arc::clone(handle), entry.progress_fraction()));
                    }
                }
            }

            sort_entries(&mut state.entries);
            let due = state.entries.first().is_some_and(ScheduledEntry::is_due);
            if due {
                state.draining = true;
                state.resume_after_drain = !state.paused;
                state.paused = true;
            }
            (updates, due)
        };

        for (handle, progress) in updates {
            handle.update(progress, self.inner.track);
        }

        if due {
            self.drain().await;
        }
    }

    async fn drain(&self) {
        let _guard = DrainGuard { scheduler: self };
        trace!(target: "runtime::schedule", "Drain started");

        loop {
            let (id, action) = {
                let mut state = self.state();
                let Some(head) = state.entries.first().filter(|entry| entry.is_due()) else {
                    break;
                };
                let next = (head.id, Arc::clone(&head.action));
                state.in_flight = Some(next.0);
                next
            };

            debug!(
                target: "runtime::schedule",
                entry = %id,
                action = action.name(),
                pending = self.len(),
                "Executing scheduled action"
            );
            self.inner.actions.events().publish(ScheduleEvent::Dispatched {
                entry: id.0,
                action: action.name().to_string(),
            });

            if let Err(err) = self.inner.actions.perform_and_wait(action).await {
                warn!(
                    target: "runtime::schedule",
                    entry = %id,
                    error = %err,
                    "Dispatcher busy, leaving entry queued"
                );
                self.state().in_flight = None;
                break;
            }

            let finished = {
                let mut state = self.state();
                state.in_flight = None;
                let index = state.entries.iter().position(|entry| entry.id == id);
                let finished = index.map(|index| state.entries.remove(index));
                // Dispatching may have scheduled new entries with any countdown.
                sort_entries(&mut state.entries);
                finished
            };

            match finished {
                Some(entry) => entry.release(),
                None => error!(
                    target: "runtime::schedule",
                    entry = %id,
                    "Executed entry missing from queue"
                ),
            }
        }

        trace!(target: "runtime::schedule", "Drain finished");
    }

    /// Drives the scheduler from the wall clock until `shutdown` turns true
    /// or its sender is dropped.
    ///
    /// Time spent inside a tick (draining) is not counted toward the next
    /// one, so countdowns only advance while nothing is resolving.
    pub async fn run(&self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = Instant::now();

        info!(target: "runtime::schedule", period_ms = period.as_millis() as u64, "Scheduler running");
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick(Instant::now().duration_since(last)).await;
                    last = Instant::now();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!(target: "runtime::schedule", "Scheduler stopped");
    }

    fn apply_pause(&self) {
        let changed = {
            let mut state = self.state();
            let changed = state.playing;
            state.paused = true;
            state.resume_after_drain = false;
            state.playing = false;
            changed
        };
        if changed {
            info!(target: "runtime::schedule", "Clock paused");
            self.inner.actions.events().publish(ScheduleEvent::Paused);
        }
    }

    fn apply_resume(&self) {
        let changed = {
            let mut state = self.state();
            let changed = !state.playing;
            state.paused = false;
            state.resume_after_drain = true;
            state.playing = true;
            changed
        };
        if changed {
            info!(target: "runtime::schedule", "Clock resumed");
            self.inner.actions.events().publish(ScheduleEvent::Resumed);
        }
    }

    fn snapshot(&self) -> Vec<(EntryId, Arc<dyn Action>, f32)> {
        self.state()
            .entries
            .iter()
            .map(|entry| (entry.id, Arc::clone(&entry.action), entry.countdown))
            .collect()
    }

    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        lock(&self.inner.state)
    }
}
