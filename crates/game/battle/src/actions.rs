//! Battle action kinds.
//!
//! Actions are plain data. The systems in [`crate::systems`] attach the
//! performers and reactions that give them meaning.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use runtime::Action;

use crate::battlefield::{CombatantId, DrawReason, Outcome};
use crate::card::{Card, Effect};

/// Pays mana for a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendMana {
    pub caster: CombatantId,
    pub amount: u32,
}

impl Action for SpendMana {}

/// Periodic mana regeneration for every living combatant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefillMana {
    pub amount: u32,
}

impl Action for RefillMana {}

/// An attack fanning out into one [`DealDamage`] per target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attack {
    pub caster: Option<CombatantId>,
    pub targets: Vec<CombatantId>,
    pub amount: u32,
}

impl Action for Attack {}

/// One hit on one combatant.
///
/// `amount` is the damage as dealt; armor pre reactions record what they
/// soak up with [`absorb`](Self::absorb), and the performer applies only
/// [`remaining`](Self::remaining).
#[derive(Debug)]
pub struct DealDamage {
    /// `None` for damage with no source, such as burn.
    pub caster: Option<CombatantId>,
    pub target: CombatantId,
    pub amount: u32,
    absorbed: AtomicU32,
}

impl DealDamage {
    pub fn new(caster: Option<CombatantId>, target: CombatantId, amount: u32) -> Self {
        Self {
            caster,
            target,
            amount,
            absorbed: AtomicU32::new(0),
        }
    }

    pub fn absorbed(&self) -> u32 {
        self.absorbed.load(Ordering::Acquire).min(self.amount)
    }

    pub fn remaining(&self) -> u32 {
        self.amount - self.absorbed()
    }

    pub(crate) fn absorb(&self, amount: u32) {
        self.absorbed.fetch_add(amount, Ordering::AcqRel);
    }
}

impl Action for DealDamage {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillCombatant {
    pub target: CombatantId,
    pub killer: Option<CombatantId>,
}

impl Action for KillCombatant {}

/// A combatant starts casting a card.
///
/// The mana check happens in a pre reaction; the performer only schedules the
/// cast when the card was paid for.
#[derive(Debug)]
pub struct PlayCard {
    pub caster: CombatantId,
    pub card: Card,
    pub targets: Vec<CombatantId>,
    paid: AtomicBool,
}

impl PlayCard {
    pub fn new(caster: CombatantId, card: Card, targets: Vec<CombatantId>) -> Self {
        Self {
            caster,
            card,
            targets,
            paid: AtomicBool::new(false),
        }
    }

    pub fn is_paid(&self) -> bool {
        self.paid.load(Ordering::Acquire)
    }

    pub(crate) fn mark_paid(&self) {
        self.paid.store(true, Ordering::Release);
    }
}

impl Action for PlayCard {}

/// Moves cards from the owner's draw pile into their hand, reshuffling the
/// discard pile into the draw pile when it runs out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawCards {
    pub owner: CombatantId,
    pub amount: usize,
    pub reason: DrawReason,
}

impl Action for DrawCards {}

/// Puts a card that finished (or lost) its cast onto the discard pile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscardCard {
    pub owner: CombatantId,
    pub card: String,
}

impl Action for DiscardCard {}

/// A card's effect resolving once its cast time has elapsed.
#[derive(Debug, Clone, PartialEq)]
pub struct CastEffect {
    pub caster: CombatantId,
    pub card: String,
    pub effect: Effect,
    pub targets: Vec<CombatantId>,
}

impl Action for CastEffect {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddBurn {
    pub target: CombatantId,
    pub stacks: u32,
}

impl Action for AddBurn {}

/// One burn tick: deals `damage` and consumes a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyBurn {
    pub target: CombatantId,
    pub damage: u32,
}

impl Action for ApplyBurn {}

/// An enemy deciding what to play next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnemyIntent {
    pub enemy: CombatantId,
}

impl Action for EnemyIntent {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndBattle {
    pub outcome: Outcome,
}

impl Action for EndBattle {}
