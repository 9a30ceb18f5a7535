//! Stock cards and combatants for a quick skirmish.

use crate::battlefield::{Combatant, Side};
use crate::card::{Card, Effect};
use crate::config::BattleConfig;

pub fn strike() -> Card {
    Card::new("Strike", 10, 1.0, Effect::Damage { amount: 6 })
}

pub fn fireball() -> Card {
    Card::new("Fireball", 25, 2.5, Effect::Damage { amount: 14 })
}

pub fn ignite() -> Card {
    Card::new("Ignite", 15, 1.5, Effect::Burn { stacks: 3 })
}

pub fn insight() -> Card {
    Card::new("Insight", 5, 0.5, Effect::Draw { cards: 2 })
}

pub fn claw() -> Card {
    Card::new("Claw", 10, 2.0, Effect::Damage { amount: 4 })
}

pub fn spit() -> Card {
    Card::new("Spit", 15, 3.0, Effect::Burn { stacks: 2 })
}

pub fn hero(config: &BattleConfig) -> Combatant {
    Combatant::new("Hero", Side::Hero, 40)
        .with_mana(config.initial_mana, config.max_mana)
        .with_armor(6, 0.5)
        .with_hand(vec![strike(), fireball(), ignite()])
        .with_deck(vec![insight(), strike(), fireball(), strike(), ignite()])
}

pub fn goblin(name: &str, config: &BattleConfig) -> Combatant {
    Combatant::new(name, Side::Enemy, 18)
        .with_mana(config.initial_mana / 2, config.max_mana / 2)
        .with_hand(vec![claw(), spit()])
}
