//! Enemy intents: every so often each enemy plays a random affordable card
//! at the hero.

use std::sync::{Arc, Mutex, PoisonError};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use runtime::handler_fn;
use tracing::{debug, trace};

use super::BattleContext;
use crate::actions::{EnemyIntent, PlayCard};
use crate::battlefield::CombatantId;
use crate::card::Card;

pub struct EnemySystem {
    ctx: BattleContext,
    rng: Arc<Mutex<StdRng>>,
}

impl EnemySystem {
    pub fn new(ctx: BattleContext) -> Self {
        let rng = StdRng::seed_from_u64(ctx.config.seed);
        Self {
            ctx,
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    pub fn enable(&self) {
        let ctx = self.ctx.clone();
        let rng = Arc::clone(&self.rng);
        self.ctx.actions.attach_performer(
            handler_fn(move |intent: Arc<EnemyIntent>, actions| {
                let ctx = ctx.clone();
                let rng = Arc::clone(&rng);
                async move {
                    let Some(enemy) = ctx.field.combatant(intent.enemy) else {
                        return Ok(());
                    };
                    if enemy.is_down() || ctx.field.is_over() {
                        trace!(target: "battle::enemy", enemy = %intent.enemy, "Intent dropped");
                        return Ok(());
                    }

                    match choose_card(&rng, &enemy.hand, enemy.mana) {
                        Some(card) => {
                            debug!(
                                target: "battle::enemy",
                                enemy = %intent.enemy,
                                card = %card.name,
                                "Enemy plays a card"
                            );
                            actions.add_reaction(PlayCard::new(
                                intent.enemy,
                                card,
                                vec![CombatantId::HERO],
                            ))?;
                        }
                        None => trace!(target: "battle::enemy", enemy = %intent.enemy, mana = enemy.mana, "Nothing affordable"),
                    }

                    ctx.time.add_action(
                        EnemyIntent {
                            enemy: intent.enemy,
                        },
                        ctx.config.intent_interval,
                    );
                    Ok(())
                }
            })
            .named("EnemySystem::intent"),
        );
    }

    pub fn disable(&self) {
        self.ctx.actions.detach_performer::<EnemyIntent>();
    }

    /// Schedules the first intent of every living enemy.
    pub fn start(&self) {
        for enemy in self.ctx.field.living_enemies() {
            self.ctx
                .time
                .add_action(EnemyIntent { enemy }, self.ctx.config.intent_interval);
        }
    }
}

fn choose_card(rng: &Mutex<StdRng>, hand: &[Card], mana: u32) -> Option<Card> {
    let affordable: Vec<&Card> = hand.iter().filter(|card| card.mana <= mana).collect();
    let mut rng = rng.lock().unwrap_or_else(PoisonError::into_inner);
    affordable.choose(&mut *rng).map(|&card| card.clone())
}
