//! Battle tuning.

use serde::{Deserialize, Serialize};

/// Numbers shared by the battle systems.
///
/// Intervals are in scheduler seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    pub max_mana: u32,
    pub initial_mana: u32,
    /// Mana every living combatant regains per refill.
    pub refill_amount: u32,
    pub refill_interval: f32,
    /// Delay between an enemy's decisions.
    pub intent_interval: f32,
    /// Damage per burn tick.
    pub burn_damage: u32,
    pub burn_interval: f32,
    /// Hand size dealt at battle start; timed draws stop at it.
    pub hand_size: usize,
    /// Delay between timed single-card draws.
    pub draw_interval: f32,
    /// Seed for enemy card choice and deck reshuffles.
    pub seed: u64,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            max_mana: 100,
            initial_mana: 60,
            refill_amount: 2,
            refill_interval: 1.0,
            intent_interval: 3.0,
            burn_damage: 2,
            burn_interval: 1.0,
            hand_size: 5,
            draw_interval: 4.0,
            seed: 0,
        }
    }
}
