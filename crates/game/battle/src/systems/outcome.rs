//! Ending the battle.

use std::sync::Arc;

use runtime::{PauseTime, handler_fn};
use tracing::{debug, info};

use super::BattleContext;
use crate::actions::EndBattle;

pub struct OutcomeSystem {
    ctx: BattleContext,
}

impl OutcomeSystem {
    pub fn new(ctx: BattleContext) -> Self {
        Self { ctx }
    }

    /// The `EndBattle` performer records the first outcome and stops the
    /// clock with a `PauseTime` reaction.
    pub fn enable(&self) {
        let field = self.ctx.field.clone();
        self.ctx.actions.attach_performer(
            handler_fn(move |end: Arc<EndBattle>, actions| {
                let field = field.clone();
                async move {
                    if !field.record_outcome(end.outcome) {
                        debug!(target: "battle::outcome", outcome = %end.outcome, "Battle already decided");
                        return Ok(());
                    }
                    info!(target: "battle::outcome", outcome = %end.outcome, "Battle over");
                    actions.add_reaction(PauseTime)?;
                    Ok(())
                }
            })
            .named("OutcomeSystem::end"),
        );
    }

    pub fn disable(&self) {
        self.ctx.actions.detach_performer::<EndBattle>();
    }
}
