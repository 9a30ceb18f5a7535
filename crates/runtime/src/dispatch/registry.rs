//! Per-dispatcher registry of performers and reactions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::handler::ErasedHandler;
use crate::action::ActionKind;

/// When a reaction runs relative to its action's performer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ReactionTiming {
    Pre,
    Post,
}

/// Token returned by [`ActionSystem::subscribe_reaction`](super::ActionSystem::subscribe_reaction).
///
/// Pass it back to `unsubscribe_reaction` to remove exactly that callback.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: u64,
    kind: ActionKind,
    timing: ReactionTiming,
}

impl Subscription {
    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn timing(&self) -> ReactionTiming {
        self.timing
    }
}

#[derive(Clone)]
pub(crate) struct RegisteredHandler {
    pub(crate) id: u64,
    pub(crate) name: &'static str,
    pub(crate) run: ErasedHandler,
}

/// Three independent tables keyed by action kind.
///
/// Reaction lists keep registration order. Performers are single-valued;
/// attaching again replaces the previous one.
#[derive(Default)]
pub(crate) struct Registry {
    pre: HashMap<ActionKind, Vec<RegisteredHandler>>,
    post: HashMap<ActionKind, Vec<RegisteredHandler>>,
    performers: HashMap<ActionKind, RegisteredHandler>,
    next_id: u64,
}

impl Registry {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn table(&self, timing: ReactionTiming) -> &HashMap<ActionKind, Vec<RegisteredHandler>> {
        match timing {
            ReactionTiming::Pre => &self.pre,
            ReactionTiming::Post => &self.post,
        }
    }

    fn table_mut(
        &mut self,
        timing: ReactionTiming,
    ) -> &mut HashMap<ActionKind, Vec<RegisteredHandler>> {
        match timing {
            ReactionTiming::Pre => &mut self.pre,
            ReactionTiming::Post => &mut self.post,
        }
    }

    /// Installs the performer for `kind`. Returns true if one was replaced.
    pub(crate) fn attach_performer(
        &mut self,
        kind: ActionKind,
        name: &'static str,
        run: ErasedHandler,
    ) -> bool {
        let id = self.next_id();
        self.performers
            .insert(kind, RegisteredHandler { id, name, run })
            .is_some()
    }

    pub(crate) fn detach_performer(&mut self, kind: ActionKind) -> bool {
        self.performers.remove(&kind).is_some()
    }

    pub(crate) fn performer(&self, kind: ActionKind) -> Option<RegisteredHandler> {
        self.performers.get(&kind).cloned()
    }

    pub(crate) fn subscribe(
        &mut self,
        kind: ActionKind,
        timing: ReactionTiming,
        name: &'static str,
        run: ErasedHandler,
    ) -> Subscription {
        let id = self.next_id();
        self.table_mut(timing)
            .entry(kind)
            .or_default()
            .push(RegisteredHandler { id, name, run });
        Subscription { id, kind, timing }
    }

    pub(crate) fn unsubscribe(&mut self, subscription: &Subscription) -> bool {
        let table = self.table_mut(subscription.timing);
        let Some(handlers) = table.get_mut(&subscription.kind) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|handler| handler.id != subscription.id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            table.remove(&subscription.kind);
        }
        removed
    }

    /// Snapshot of the reactions for `kind`, in registration order.
    pub(crate) fn reactions(&self, kind: ActionKind, timing: ReactionTiming) -> Vec<RegisteredHandler> {
        self.table(timing).get(&kind).cloned().unwrap_or_default()
    }

    pub(crate) fn reaction_count(&self, kind: ActionKind, timing: ReactionTiming) -> usize {
        self.table(timing).get(&kind).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::action::Action;
    use crate::dispatch::ActionSystem;
    use crate::dispatch::handler::{BoxFuture, HandlerResult};

    #[derive(Debug)]
    struct Strike;
    impl Action for Strike {}

    #[derive(Debug)]
    struct Guard;
    impl Action for Guard {}

    fn noop() -> ErasedHandler {
        Arc::new(|_: Arc<dyn Action>, _: ActionSystem| {
            Box::pin(async { Ok(()) }) as BoxFuture<'static, HandlerResult>
        })
    }

    fn names(handlers: &[RegisteredHandler]) -> Vec<&'static str> {
        handlers.iter().map(|h| h.name).collect()
    }

    #[test]
    fn reactions_keep_registration_order_per_timing() {
        let mut registry = Registry::default();
        let strike = ActionKind::of::<Strike>();

        registry.subscribe(strike, ReactionTiming::Pre, "first", noop());
        registry.subscribe(strike, ReactionTiming::Post, "after", noop());
        registry.subscribe(strike, ReactionTiming::Pre, "second", noop());

        assert_eq!(
            names(&registry.reactions(strike, ReactionTiming::Pre)),
            ["first", "second"]
        );
        assert_eq!(
            names(&registry.reactions(strike, ReactionTiming::Post)),
            ["after"]
        );
        assert!(
            registry
                .reactions(ActionKind::of::<Guard>(), ReactionTiming::Pre)
                .is_empty()
        );
    }

    #[test]
    fn unsubscribe_removes_only_the_token_owner() {
        let mut registry = Registry::default();
        let strike = ActionKind::of::<Strike>();

        let first = registry.subscribe(strike, ReactionTiming::Pre, "same", noop());
        let second = registry.subscribe(strike, ReactionTiming::Pre, "same", noop());

        assert!(registry.unsubscribe(&first));
        assert!(!registry.unsubscribe(&first));
        assert_eq!(registry.reaction_count(strike, ReactionTiming::Pre), 1);

        assert!(registry.unsubscribe(&second));
        assert_eq!(registry.reaction_count(strike, ReactionTiming::Pre), 0);
    }

    #[test]
    fn attaching_a_performer_replaces_the_previous_one() {
        let mut registry = Registry::default();
        let strike = ActionKind::of::<Strike>();

        assert!(!registry.attach_performer(strike, "old", noop()));
        assert!(registry.attach_performer(strike, "new", noop()));
        assert_eq!(registry.performer(strike).map(|h| h.name), Some("new"));

        assert!(registry.detach_performer(strike));
        assert!(!registry.detach_performer(strike));
        assert!(registry.performer(strike).is_none());
    }
}
