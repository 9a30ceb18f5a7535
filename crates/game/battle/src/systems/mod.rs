//! Rule systems.
//!
//! Each system attaches its performers and reactions in `enable` and removes
//! them again in `disable`. Systems never call each other directly; they talk
//! through actions, either as reactions (resolved inside the current tree) or
//! as scheduled entries on the [`TimeSystem`].

mod burn;
mod cards;
mod damage;
mod death;
mod enemy;
mod mana;
mod outcome;

pub use burn::BurnSystem;
pub use cards::{CardSystem, CastBar};
pub use damage::DamageSystem;
pub use death::DeathSystem;
pub use enemy::EnemySystem;
pub use mana::ManaSystem;
pub use outcome::OutcomeSystem;

use std::sync::{Arc, Mutex, PoisonError};

use runtime::{ActionSystem, Subscription, TimeSystem};

use crate::battlefield::Battlefield;
use crate::config::BattleConfig;

/// Everything a system needs to register handlers and touch state.
#[derive(Clone)]
pub struct BattleContext {
    pub actions: ActionSystem,
    pub time: TimeSystem,
    pub field: Battlefield,
    pub config: Arc<BattleConfig>,
}

/// Reaction subscriptions a system holds between `enable` and `disable`.
#[derive(Default)]
pub(crate) struct Subscriptions(Mutex<Vec<Subscription>>);

impl Subscriptions {
    pub(crate) fn push(&self, subscription: Subscription) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscription);
    }

    pub(crate) fn release(&self, actions: &ActionSystem) {
        let subscriptions =
            std::mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner));
        for subscription in &subscriptions {
            actions.unsubscribe_reaction(subscription);
        }
    }
}
