//! Cards and their effects.

use serde::{Deserialize, Serialize};

/// What a card does once its cast time has elapsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    /// Hits every target for `amount`.
    Damage { amount: u32 },
    /// Adds `stacks` of burn to every target.
    Burn { stacks: u32 },
    /// The caster draws `cards` cards; targets are ignored.
    Draw { cards: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub name: String,
    /// Mana paid when the card is played.
    pub mana: u32,
    /// Seconds between playing the card and its effect resolving.
    pub cast_time: f32,
    pub effect: Effect,
}

impl Card {
    pub fn new(name: impl Into<String>, mana: u32, cast_time: f32, effect: Effect) -> Self {
        Self {
            name: name.into(),
            mana,
            cast_time,
            effect,
        }
    }
}
