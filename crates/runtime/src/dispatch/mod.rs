//! Single-flight action dispatcher.
//!
//! [`ActionSystem`] resolves one action at a time through a fixed three-phase
//! pipeline:
//!
//! 1. **Pre**: every pre reaction registered for the kind, in order
//! 2. **Perform**: the kind's single performer
//! 3. **Post**: every post reaction registered for the kind, in order
//!
//! Handlers may queue follow-up actions with [`ActionSystem::add_reaction`].
//! Reactions queued during a phase are collected in that phase's list and
//! resolved depth-first (each one through its own full pipeline, including
//! whatever it queues in turn) before the next phase starts.
//!
//! # Failure handling
//!
//! - A missing performer is logged and the pipeline continues
//! - A handler returning `Err` is logged; its siblings still run
//! - A second top-level dispatch while one is in flight is rejected, not queued

mod handler;
mod registry;

pub use handler::{FnHandler, Handler, HandlerResult, handler_fn};
pub use registry::{ReactionTiming, Subscription};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::action::{Action, ActionKind};
use crate::config::RuntimeConfig;
use crate::error::DispatchError;
use crate::events::{DispatchEvent, Event, EventBus, Topic};
use crate::utils::lock;
use handler::{BoxFuture, erase};
use registry::{RegisteredHandler, Registry};

/// Resolution phase of a single action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    Pre,
    Perform,
    Post,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Pre, Phase::Perform, Phase::Post];
}

/// Conversion into the shared action representation used by the runtime.
pub trait IntoAction: Send + 'static {
    fn into_action(self) -> Arc<dyn Action>;
}

impl<A: Action> IntoAction for A {
    fn into_action(self) -> Arc<dyn Action> {
        Arc::new(self)
    }
}

impl<A: Action> IntoAction for Arc<A> {
    fn into_action(self) -> Arc<dyn Action> {
        self
    }
}

impl IntoAction for Arc<dyn Action> {
    fn into_action(self) -> Arc<dyn Action> {
        self
    }
}

struct Inner {
    registry: Mutex<Registry>,
    performing: AtomicBool,
    /// One reaction list per phase currently collecting reactions.
    frames: Mutex<Vec<Vec<Arc<dyn Action>>>>,
    events: EventBus,
}

/// Cloneable handle to a dispatcher instance.
///
/// Each instance owns its registry, so independent dispatchers never see
/// each other's handlers.
#[derive(Clone)]
pub struct ActionSystem {
    inner: Arc<Inner>,
}

/// Releases the single-flight flag even if a handler panics.
struct PerformingGuard {
    inner: Arc<Inner>,
}

impl Drop for PerformingGuard {
    fn drop(&mut self) {
        lock(&self.inner.frames).clear();
        self.inner.performing.store(false, Ordering::Release);
    }
}

impl ActionSystem {
    pub fn new(events: EventBus) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(Registry::default()),
                performing: AtomicBool::new(false),
                frames: Mutex::new(Vec::new()),
                events,
            }),
        }
    }

    pub fn with_config(config: &RuntimeConfig) -> Self {
        Self::new(EventBus::with_capacity(config.event_buffer_size))
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Subscribe to dispatcher events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe(Topic::Dispatch)
    }

    /// Whether an action tree is currently being resolved.
    pub fn is_performing(&self) -> bool {
        self.inner.performing.load(Ordering::Acquire)
    }

    /// Starts resolving `action` in a background task.
    ///
    /// The busy flag is taken synchronously, so a second call made right
    /// after this one is rejected even before the task first runs.
    pub fn perform(&self, action: impl IntoAction) -> Result<JoinHandle<()>, DispatchError> {
        self.perform_then(action, || {})
    }

    /// Like [`perform`](Self::perform), invoking `on_complete` once the whole
    /// tree (including nested reactions) has resolved.
    ///
    /// The dispatcher is already idle when `on_complete` runs, so it may start
    /// the next action.
    pub fn perform_then(
        &self,
        action: impl IntoAction,
        on_complete: impl FnOnce() + Send + 'static,
    ) -> Result<JoinHandle<()>, DispatchError> {
        let action = action.into_action();
        let guard = self.begin(action.as_ref())?;
        let system = self.clone();

        Ok(tokio::spawn(async move {
            system.flow(action, 0).await;
            drop(guard);
            on_complete();
        }))
    }

    /// Resolves `action` and returns once the whole tree has finished.
    ///
    /// Returns immediately with [`DispatchError::AlreadyPerforming`] when the
    /// dispatcher is busy.
    pub async fn perform_and_wait(&self, action: impl IntoAction) -> Result<(), DispatchError> {
        let action = action.into_action();
        let _guard = self.begin(action.as_ref())?;
        self.flow(action, 0).await;
        Ok(())
    }

    /// Queues `action` on the list of the phase currently collecting
    /// reactions. It resolves depth-first once that phase's handlers are done.
    pub fn add_reaction(&self, action: impl IntoAction) -> Result<(), DispatchError> {
        let action = action.into_action();
        let mut frames = lock(&self.inner.frames);
        match frames.last_mut() {
            Some(frame) => {
                trace!(
                    target: "runtime::dispatch",
                    reaction = action.name(),
                    "Reaction queued"
                );
                frame.push(action);
                Ok(())
            }
            None => {
                warn!(
                    target: "runtime::dispatch",
                    reaction = action.name(),
                    "Reaction added outside of any resolution, dropped"
                );
                Err(DispatchError::NoActivePhase {
                    action: action.name(),
                })
            }
        }
    }

    /// Installs the performer for kind `A`, replacing any existing one.
    pub fn attach_performer<A: Action>(&self, handler: impl Handler<A>) {
        let kind = ActionKind::of::<A>();
        let name = handler.name();
        if self.registry().attach_performer(kind, name, erase(handler)) {
            debug!(
                target: "runtime::dispatch",
                kind = kind.name(),
                performer = name,
                "Replaced existing performer"
            );
        }
    }

    /// Removes the performer for kind `A`. Returns whether one was installed.
    pub fn detach_performer<A: Action>(&self) -> bool {
        self.registry().detach_performer(ActionKind::of::<A>())
    }

    pub fn has_performer<A: Action>(&self) -> bool {
        self.registry().performer(ActionKind::of::<A>()).is_some()
    }

    /// Adds a pre or post reaction for kind `A`, after those already
    /// registered.
    pub fn subscribe_reaction<A: Action>(
        &self,
        handler: impl Handler<A>,
        timing: ReactionTiming,
    ) -> Subscription {
        let name = handler.name();
        self.registry()
            .subscribe(ActionKind::of::<A>(), timing, name, erase(handler))
    }

    /// Removes a reaction. Returns false if it was already gone.
    pub fn unsubscribe_reaction(&self, subscription: &Subscription) -> bool {
        self.registry().unsubscribe(subscription)
    }

    pub fn reaction_count<A: Action>(&self, timing: ReactionTiming) -> usize {
        self.registry()
            .reaction_count(ActionKind::of::<A>(), timing)
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        lock(&self.inner.registry)
    }

    fn begin(&self, action: &dyn Action) -> Result<PerformingGuard, DispatchError> {
        if self
            .inner
            .performing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(
                target: "runtime::dispatch",
                action = action.name(),
                "Performing action while already performing action"
            );
            self.inner.events.publish(DispatchEvent::Rejected {
                action: action.name().to_string(),
            });
            return Err(DispatchError::AlreadyPerforming {
                action: action.name(),
            });
        }

        lock(&self.inner.frames).clear();
        Ok(PerformingGuard {
            inner: Arc::clone(&self.inner),
        })
    }

    /// Resolves one action and everything it transitively triggers.
    fn flow(&self, action: Arc<dyn Action>, depth: usize) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let name = action.name();
            debug!(target: "runtime::dispatch", action = name, depth, "Resolving action");
            self.inner.events.publish(DispatchEvent::ActionStarted {
                action: name.to_string(),
                depth,
            });

            for phase in Phase::ALL {
                lock(&self.inner.frames).push(Vec::new());
                self.run_phase(phase, &action, depth).await;
                let reactions = lock(&self.inner.frames).pop().unwrap_or_default();

                for reaction in reactions {
                    self.flow(reaction, depth + 1).await;
                }
            }

            debug!(target: "runtime::dispatch", action = name, depth, "Action resolved");
            self.inner.events.publish(DispatchEvent::ActionCompleted {
                action: name.to_string(),
                depth,
            });
        })
    }

    async fn run_phase(&self, phase: Phase, action: &Arc<dyn Action>, depth: usize) {
        let kind = action.kind();
        let handlers = self.handlers_for(phase, kind);

        if phase == Phase::Perform && handlers.is_empty() {
            error!(
                target: "runtime::dispatch",
                action = kind.name(),
                depth,
                "No performer for action"
            );
            self.inner.events.publish(DispatchEvent::PerformerMissing {
                action: kind.name().to_string(),
                depth,
            });
            return;
        }

        for handler in handlers {
            trace!(
                target: "runtime::dispatch",
                action = kind.name(),
                %phase,
                handler = handler.name,
                "Running handler"
            );
            if let Err(err) = (handler.run)(Arc::clone(action), self.clone()).await {
                error!(
                    target: "runtime::dispatch",
                    action = kind.name(),
                    %phase,
                    handler = handler.name,
                    error = %err,
                    "Handler failed, continuing"
                );
                self.inner.events.publish(DispatchEvent::HandlerFailed {
                    action: kind.name().to_string(),
                    phase,
                    handler: handler.name.to_string(),
                    error: format!("{err:#}"),
                });
            }
        }
    }

    fn handlers_for(&self, phase: Phase, kind: ActionKind) -> Vec<RegisteredHandler> {
        let registry = self.registry();
        match phase {
            Phase::Pre => registry.reactions(kind, ReactionTiming::Pre),
            Phase::Perform => registry.performer(kind).into_iter().collect(),
            Phase::Post => registry.reactions(kind, ReactionTiming::Post),
        }
    }
}

impl Default for ActionSystem {
    fn default() -> Self {
        Self::new(EventBus::default())
    }
}
