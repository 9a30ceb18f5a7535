//! Shared battle state.
//!
//! [`Battlefield`] is a cloneable handle over the combatants and the battle
//! outcome. Systems read and mutate it from inside their handlers; every
//! access is a short critical section that never spans an `.await`.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::card::Card;
use crate::error::BattleError;

// ============================================================================
// Identity
// ============================================================================

/// Stable identifier of a combatant within one battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CombatantId(pub u32);

impl CombatantId {
    /// The hero always occupies slot 0.
    pub const HERO: Self = Self(0);

    pub fn is_hero(self) -> bool {
        self == Self::HERO
    }
}

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_hero() {
            f.write_str("hero")
        } else {
            write!(f, "enemy#{}", self.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Side {
    Hero,
    Enemy,
}

/// How a battle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Outcome {
    Victory,
    Defeat,
}

/// Why cards are being drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum DrawReason {
    /// Opening hand at battle start.
    Initial,
    /// A card effect.
    CardEffect,
    /// The periodic draw.
    Timed,
}

// ============================================================================
// Combatant
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combatant {
    pub id: CombatantId,
    pub name: String,
    pub side: Side,
    pub health: u32,
    pub max_health: u32,
    /// Pool that soaks up part of every hit until exhausted.
    pub armor: u32,
    /// Share of each hit routed into the armor pool, in `[0, 1]`.
    pub armor_ratio: f32,
    pub mana: u32,
    pub max_mana: u32,
    pub burn: u32,
    pub alive: bool,
    pub hand: Vec<Card>,
    /// Top of the pile first.
    pub draw_pile: Vec<Card>,
    pub discard_pile: Vec<Card>,
    /// Cards taken out of the hand whose cast has not resolved yet.
    pub casting: Vec<Card>,
}

/// Result of applying one hit to a combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub dealt: u32,
    pub lethal: bool,
}

/// Result of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drawn {
    pub cards: usize,
    /// Whether the discard pile was shuffled back into the draw pile.
    pub reshuffled: bool,
}

impl Combatant {
    pub fn new(name: impl Into<String>, side: Side, health: u32) -> Self {
        Self {
            id: CombatantId::HERO,
            name: name.into(),
            side,
            health,
            max_health: health,
            armor: 0,
            armor_ratio: 0.0,
            mana: 0,
            max_mana: 0,
            burn: 0,
            alive: true,
            hand: Vec::new(),
            draw_pile: Vec::new(),
            discard_pile: Vec::new(),
            casting: Vec::new(),
        }
    }

    pub fn with_mana(mut self, mana: u32, max_mana: u32) -> Self {
        self.max_mana = max_mana;
        self.mana = mana.min(max_mana);
        self
    }

    pub fn with_armor(mut self, armor: u32, ratio: f32) -> Self {
        self.armor = armor;
        self.armor_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn with_hand(mut self, hand: Vec<Card>) -> Self {
        self.hand = hand;
        self
    }

    pub fn with_deck(mut self, deck: Vec<Card>) -> Self {
        self.draw_pile = deck;
        self
    }

    /// Dead, or at zero health and waiting for its kill to resolve.
    pub fn is_down(&self) -> bool {
        !self.alive || self.health == 0
    }

    /// Routes `armor_ratio` of a hit into the armor pool, rounded and capped
    /// by what is left of it. Returns the amount soaked up.
    pub fn absorb(&mut self, amount: u32) -> u32 {
        let wanted = (amount as f32 * self.armor_ratio).round() as u32;
        let absorbed = wanted.min(self.armor).min(amount);
        self.armor -= absorbed;
        absorbed
    }

    pub fn take_damage(&mut self, amount: u32) -> Hit {
        let dealt = amount.min(self.health);
        self.health -= dealt;
        Hit {
            dealt,
            lethal: self.health == 0,
        }
    }

    /// Adds mana up to the cap. Returns the amount actually gained.
    pub fn refill(&mut self, amount: u32) -> u32 {
        let before = self.mana;
        self.mana = self.mana.saturating_add(amount).min(self.max_mana);
        self.mana - before
    }

    pub fn spend(&mut self, amount: u32) -> Result<u32, BattleError> {
        if self.mana < amount {
            return Err(BattleError::InsufficientMana {
                id: self.id,
                required: amount,
                available: self.mana,
            });
        }
        self.mana -= amount;
        Ok(self.mana)
    }

    /// Draws up to `amount` cards from the top of the draw pile. When the
    /// pile runs short, the discard pile is shuffled into it and drawing
    /// continues.
    pub fn draw(&mut self, amount: usize, rng: &mut impl Rng) -> Drawn {
        let mut drawn = Drawn {
            cards: 0,
            reshuffled: false,
        };
        while drawn.cards < amount {
            if self.draw_pile.is_empty() {
                if drawn.reshuffled || self.discard_pile.is_empty() {
                    break;
                }
                self.draw_pile.append(&mut self.discard_pile);
                self.draw_pile.shuffle(rng);
                drawn.reshuffled = true;
            }
            let card = self.draw_pile.remove(0);
            self.hand.push(card);
            drawn.cards += 1;
        }
        drawn
    }

    /// Moves the first card named `name` from the hand to the casting area.
    pub fn begin_cast(&mut self, name: &str) -> Option<Card> {
        let index = self.hand.iter().position(|card| card.name == name)?;
        let card = self.hand.remove(index);
        self.casting.push(card.clone());
        Some(card)
    }

    /// Moves the first casting card named `name` onto the discard pile.
    /// Returns false when no such cast is pending.
    pub fn finish_cast(&mut self, name: &str) -> bool {
        let Some(index) = self.casting.iter().position(|card| card.name == name) else {
            return false;
        };
        let card = self.casting.remove(index);
        self.discard_pile.push(card);
        true
    }
}

// ============================================================================
// Battlefield
// ============================================================================

#[derive(Debug, Default)]
struct BattleState {
    combatants: Vec<Combatant>,
    outcome: Option<Outcome>,
}

/// Cloneable handle to the state of one battle.
#[derive(Clone, Debug)]
pub struct Battlefield {
    state: Arc<Mutex<BattleState>>,
}

impl Battlefield {
    /// Creates a battlefield with `hero` in slot 0.
    pub fn new(mut hero: Combatant) -> Self {
        hero.id = CombatantId::HERO;
        hero.side = Side::Hero;
        Self {
            state: Arc::new(Mutex::new(BattleState {
                combatants: vec![hero],
                outcome: None,
            })),
        }
    }

    pub fn add_enemy(&self, mut enemy: Combatant) -> CombatantId {
        let mut state = self.state();
        let id = CombatantId(state.combatants.len() as u32);
        enemy.id = id;
        enemy.side = Side::Enemy;
        state.combatants.push(enemy);
        id
    }

    pub fn hero(&self) -> Combatant {
        self.state().combatants[0].clone()
    }

    pub fn combatant(&self, id: CombatantId) -> Option<Combatant> {
        self.state().combatants.get(id.0 as usize).cloned()
    }

    pub fn is_alive(&self, id: CombatantId) -> bool {
        self.state()
            .combatants
            .get(id.0 as usize)
            .is_some_and(|c| !c.is_down())
    }

    /// Every combatant, hero first.
    pub fn ids(&self) -> Vec<CombatantId> {
        self.state().combatants.iter().map(|c| c.id).collect()
    }

    pub fn enemies(&self) -> Vec<CombatantId> {
        self.state()
            .combatants
            .iter()
            .filter(|c| c.side == Side::Enemy)
            .map(|c| c.id)
            .collect()
    }

    pub fn living_enemies(&self) -> Vec<CombatantId> {
        self.state()
            .combatants
            .iter()
            .filter(|c| c.side == Side::Enemy && !c.is_down())
            .map(|c| c.id)
            .collect()
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.state().outcome
    }

    pub fn is_over(&self) -> bool {
        self.outcome().is_some()
    }

    /// Records the outcome unless one is already set. Returns whether this
    /// call decided the battle.
    pub(crate) fn record_outcome(&self, outcome: Outcome) -> bool {
        let mut state = self.state();
        if state.outcome.is_some() {
            return false;
        }
        state.outcome = Some(outcome);
        true
    }

    /// Runs `f` against one combatant.
    pub(crate) fn update<R>(
        &self,
        id: CombatantId,
        f: impl FnOnce(&mut Combatant) -> R,
    ) -> Result<R, BattleError> {
        let mut state = self.state();
        let combatant = state
            .combatants
            .get_mut(id.0 as usize)
            .ok_or(BattleError::UnknownCombatant(id))?;
        Ok(f(combatant))
    }

    /// Refills every living combatant. Returns `(id, new mana)` for those
    /// that gained anything.
    pub(crate) fn refill_all(&self, amount: u32) -> Vec<(CombatantId, u32)> {
        self.state()
            .combatants
            .iter_mut()
            .filter(|c| !c.is_down())
            .filter_map(|c| (c.refill(amount) > 0).then_some((c.id, c.mana)))
            .collect()
    }

    fn state(&self) -> MutexGuard<'_, BattleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
