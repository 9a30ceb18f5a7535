//! Mana spending and periodic refill.

use std::sync::Arc;

use runtime::{EntryId, handler_fn};
use tracing::{debug, trace, warn};

use super::BattleContext;
use crate::actions::{RefillMana, SpendMana};

pub struct ManaSystem {
    ctx: BattleContext,
}

impl ManaSystem {
    pub fn new(ctx: BattleContext) -> Self {
        Self { ctx }
    }

    pub fn enable(&self) {
        let field = self.ctx.field.clone();
        self.ctx.actions.attach_performer(
            handler_fn(move |spend: Arc<SpendMana>, _| {
                let field = field.clone();
                async move {
                    match field.update(spend.caster, |c| c.spend(spend.amount))? {
                        Ok(left) => {
                            debug!(
                                target: "battle::mana",
                                caster = %spend.caster,
                                amount = spend.amount,
                                left,
                                "Mana spent"
                            );
                            Ok(())
                        }
                        Err(err) => {
                            warn!(target: "battle::mana", caster = %spend.caster, %err, "Not enough mana");
                            Err(err.into())
                        }
                    }
                }
            })
            .named("ManaSystem::spend"),
        );

        let ctx = self.ctx.clone();
        self.ctx.actions.attach_performer(
            handler_fn(move |refill: Arc<RefillMana>, _| {
                let ctx = ctx.clone();
                async move {
                    let refilled = ctx.field.refill_all(refill.amount);
                    trace!(
                        target: "battle::mana",
                        amount = refill.amount,
                        refilled = refilled.len(),
                        "Mana refilled"
                    );

                    if !ctx.field.is_over() {
                        ctx.time.add_action(
                            RefillMana {
                                amount: ctx.config.refill_amount,
                            },
                            ctx.config.refill_interval,
                        );
                    }
                    Ok(())
                }
            })
            .named("ManaSystem::refill"),
        );
    }

    pub fn disable(&self) {
        self.ctx.actions.detach_performer::<SpendMana>();
        self.ctx.actions.detach_performer::<RefillMana>();
    }

    /// Schedules the first refill. Each refill schedules the next one.
    pub fn start(&self) -> EntryId {
        self.ctx.time.add_action(
            RefillMana {
                amount: self.ctx.config.refill_amount,
            },
            self.ctx.config.refill_interval,
        )
    }
}
