//! Burn status: stacks that tick for damage once per interval.

use std::sync::Arc;

use runtime::handler_fn;
use tracing::{debug, trace};

use super::BattleContext;
use crate::actions::{AddBurn, ApplyBurn, DealDamage};
use crate::battlefield::CombatantId;

pub struct BurnSystem {
    ctx: BattleContext,
}

impl BurnSystem {
    pub fn new(ctx: BattleContext) -> Self {
        Self { ctx }
    }

    pub fn enable(&self) {
        let ctx = self.ctx.clone();
        self.ctx.actions.attach_performer(
            handler_fn(move |add: Arc<AddBurn>, _| {
                let ctx = ctx.clone();
                async move {
                    let before = ctx.field.update(add.target, |c| {
                        if c.is_down() {
                            return None;
                        }
                        let before = c.burn;
                        c.burn += add.stacks;
                        Some(before)
                    })?;
                    let Some(before) = before else {
                        return Ok(());
                    };
                    debug!(
                        target: "battle::burn",
                        combatant = %add.target,
                        stacks = before + add.stacks,
                        "Burn added"
                    );

                    // A burning target already has its next tick queued.
                    if before == 0 && add.stacks > 0 {
                        schedule_tick(&ctx, add.target);
                    }
                    Ok(())
                }
            })
            .named("BurnSystem::add"),
        );

        let ctx = self.ctx.clone();
        self.ctx.actions.attach_performer(
            handler_fn(move |tick: Arc<ApplyBurn>, actions| {
                let ctx = ctx.clone();
                async move {
                    let left = ctx.field.update(tick.target, |c| {
                        if c.is_down() || c.burn == 0 {
                            return None;
                        }
                        c.burn -= 1;
                        Some(c.burn)
                    })?;
                    let Some(left) = left else {
                        trace!(target: "battle::burn", combatant = %tick.target, "Burn tick on cleared target");
                        return Ok(());
                    };

                    actions.add_reaction(DealDamage::new(None, tick.target, tick.damage))?;
                    if left > 0 {
                        schedule_tick(&ctx, tick.target);
                    }
                    Ok(())
                }
            })
            .named("BurnSystem::tick"),
        );
    }

    pub fn disable(&self) {
        self.ctx.actions.detach_performer::<AddBurn>();
        self.ctx.actions.detach_performer::<ApplyBurn>();
    }
}

fn schedule_tick(ctx: &BattleContext, target: CombatantId) {
    ctx.time.add_action(
        ApplyBurn {
            target,
            damage: ctx.config.burn_damage,
        },
        ctx.config.burn_interval,
    );
}
