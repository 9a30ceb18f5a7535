//! Combatant death and its cleanup.

use std::sync::Arc;

use runtime::{Action, ActionSystem, HandlerResult, ReactionTiming, handler_fn};
use tracing::{debug, info};

use super::{BattleContext, Subscriptions};
use crate::actions::{
    ApplyBurn, CastEffect, DiscardCard, DrawCards, EndBattle, EnemyIntent, KillCombatant,
};
use crate::battlefield::Outcome;

pub struct DeathSystem {
    ctx: BattleContext,
    subscriptions: Subscriptions,
}

impl DeathSystem {
    pub fn new(ctx: BattleContext) -> Self {
        Self {
            ctx,
            subscriptions: Subscriptions::default(),
        }
    }

    pub fn enable(&self) {
        let field = self.ctx.field.clone();
        self.ctx.actions.attach_performer(
            handler_fn(move |kill: Arc<KillCombatant>, _| {
                let field = field.clone();
                async move {
                    let was_alive = field.update(kill.target, |c| {
                        let was_alive = c.alive;
                        c.alive = false;
                        c.health = 0;
                        c.burn = 0;
                        was_alive
                    })?;
                    if was_alive {
                        info!(
                            target: "battle::death",
                            combatant = %kill.target,
                            killer = ?kill.killer,
                            "Combatant killed"
                        );
                    }
                    Ok(())
                }
            })
            .named("DeathSystem::kill"),
        );

        let ctx = self.ctx.clone();
        self.subscriptions.push(self.ctx.actions.subscribe_reaction(
            handler_fn(move |kill: Arc<KillCombatant>, actions| {
                let ctx = ctx.clone();
                async move { clean_up_after(&ctx, &kill, &actions) }
            })
            .named("DeathSystem::clean_up"),
            ReactionTiming::Post,
        ));
    }

    pub fn disable(&self) {
        self.ctx.actions.detach_performer::<KillCombatant>();
        self.subscriptions.release(&self.ctx.actions);
    }
}

/// Cancels scheduled work that involves the dead combatant, discards the
/// cards of cancelled casts, and declares victory once no enemy is left.
fn clean_up_after(
    ctx: &BattleContext,
    kill: &KillCombatant,
    actions: &ActionSystem,
) -> HandlerResult {
    let dead = kill.target;
    let field = &ctx.field;

    let doomed = |cast: &CastEffect| {
        cast.caster == dead || cast.targets.iter().all(|&t| !field.is_alive(t))
    };
    let matching: Vec<Arc<dyn Action>> = ctx
        .time
        .pending_actions()
        .into_iter()
        .filter(|action| action.downcast_ref::<CastEffect>().is_some_and(doomed))
        .collect();
    let casts = ctx.time.remove_actions::<CastEffect>(doomed);
    let intents = ctx.time.remove_actions::<EnemyIntent>(|intent| intent.enemy == dead);
    let burns = ctx.time.remove_actions::<ApplyBurn>(|burn| burn.target == dead);
    let draws = ctx.time.remove_actions::<DrawCards>(|draw| draw.owner == dead);
    debug!(
        target: "battle::death",
        combatant = %dead,
        casts,
        intents,
        burns,
        draws,
        "Cancelled scheduled actions"
    );

    // The entry being dispatched survives removal and discards its own card.
    let still_pending = ctx.time.pending_actions();
    for action in matching {
        if still_pending.iter().any(|p| Arc::ptr_eq(p, &action)) {
            continue;
        }
        if let Some(cast) = action.downcast_ref::<CastEffect>() {
            actions.add_reaction(DiscardCard {
                owner: cast.caster,
                card: cast.card.clone(),
            })?;
        }
    }

    let decided = ctx
        .time
        .remaining_countdown_where::<EndBattle>(|_| true)
        .is_some();
    if field.living_enemies().is_empty() && !field.is_over() && !decided {
        info!(target: "battle::death", "No enemies left");
        ctx.time.add_action(
            EndBattle {
                outcome: Outcome::Victory,
            },
            0.0,
        );
    }
    Ok(())
}
