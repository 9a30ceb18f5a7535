//! Attacks and damage resolution.
//!
//! Armor is a `DealDamage` pre reaction: it records what it soaks up on the
//! hit itself, and the performer applies only the remainder to health.

use std::sync::Arc;

use async_trait::async_trait;
use runtime::{ActionSystem, Handler, HandlerResult, ReactionTiming, handler_fn};
use tracing::{debug, info};

use super::{BattleContext, Subscriptions};
use crate::actions::{Attack, DealDamage, EndBattle, KillCombatant};
use crate::battlefield::{Outcome, Side};

pub struct DamageSystem {
    ctx: BattleContext,
    subscriptions: Subscriptions,
}

impl DamageSystem {
    pub fn new(ctx: BattleContext) -> Self {
        Self {
            ctx,
            subscriptions: Subscriptions::default(),
        }
    }

    pub fn enable(&self) {
        let field = self.ctx.field.clone();
        self.subscriptions.push(self.ctx.actions.subscribe_reaction(
            handler_fn(move |hit: Arc<DealDamage>, _| {
                let field = field.clone();
                async move {
                    // Unknown targets are left to the performer.
                    let absorbed = field
                        .update(hit.target, |target| {
                            if target.is_down() {
                                0
                            } else {
                                target.absorb(hit.amount)
                            }
                        })
                        .unwrap_or(0);
                    if absorbed > 0 {
                        hit.absorb(absorbed);
                        debug!(target: "battle::damage", combatant = %hit.target, absorbed, "Armor absorbed damage");
                    }
                    Ok(())
                }
            })
            .named("DamageSystem::armor"),
            ReactionTiming::Pre,
        ));

        self.ctx.actions.attach_performer(PerformAttack);
        self.ctx.actions.attach_performer(PerformDealDamage {
            ctx: self.ctx.clone(),
        });
    }

    pub fn disable(&self) {
        self.subscriptions.release(&self.ctx.actions);
        self.ctx.actions.detach_performer::<Attack>();
        self.ctx.actions.detach_performer::<DealDamage>();
    }
}

struct PerformAttack;

#[async_trait]
impl Handler<Attack> for PerformAttack {
    fn name(&self) -> &'static str {
        "DamageSystem::attack"
    }

    async fn handle(&self, attack: Arc<Attack>, actions: &ActionSystem) -> HandlerResult {
        for &target in &attack.targets {
            actions.add_reaction(DealDamage::new(attack.caster, target, attack.amount))?;
        }
        Ok(())
    }
}

struct PerformDealDamage {
    ctx: BattleContext,
}

#[async_trait]
impl Handler<DealDamage> for PerformDealDamage {
    fn name(&self) -> &'static str {
        "DamageSystem::deal_damage"
    }

    async fn handle(&self, hit: Arc<DealDamage>, actions: &ActionSystem) -> HandlerResult {
        let resolved = self.ctx.field.update(hit.target, |target| {
            if target.is_down() {
                return None;
            }
            let outcome = target.take_damage(hit.remaining());
            if outcome.lethal && target.side == Side::Hero {
                target.alive = false;
            }
            Some((outcome, target.side, target.health))
        });

        // Targets that died or never existed are stale references.
        let Ok(Some((outcome, side, health))) = resolved else {
            debug!(target: "battle::damage", combatant = %hit.target, "Damage on stale target ignored");
            return Ok(());
        };

        debug!(
            target: "battle::damage",
            combatant = %hit.target,
            amount = hit.amount,
            absorbed = hit.absorbed(),
            dealt = outcome.dealt,
            health,
            "Damage dealt"
        );

        if outcome.lethal {
            match side {
                Side::Enemy => actions.add_reaction(KillCombatant {
                    target: hit.target,
                    killer: hit.caster,
                })?,
                Side::Hero => {
                    info!(target: "battle::damage", "Hero has fallen");
                    self.ctx.time.add_action(
                        EndBattle {
                            outcome: Outcome::Defeat,
                        },
                        0.0,
                    );
                }
            }
        }
        Ok(())
    }
}
