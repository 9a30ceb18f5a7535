//! Card-battle rules built on the action runtime.
//!
//! A battle is a [`Battlefield`] plus a set of systems that register
//! performers and reactions on a shared [`ActionSystem`] and schedule delayed
//! work (cast times, mana refill, card draws, burn ticks, enemy intents) on a
//! [`TimeSystem`]. [`Battle`] wires them together:
//!
//! ```ignore
//! let (actions, time) = runtime::build(&RuntimeConfig::default());
//! let field = Battlefield::new(content::hero(&config));
//! field.add_enemy(content::goblin("Goblin", &config));
//!
//! let battle = Battle::new(actions, time.clone(), field, config);
//! battle.enable();
//! battle.start().await?;
//! loop {
//!     time.tick(step).await;
//!     if battle.outcome().is_some() { break; }
//! }
//! ```
pub mod actions;
pub mod battlefield;
pub mod card;
pub mod config;
pub mod content;
pub mod error;
pub mod systems;

pub use actions::{
    AddBurn, ApplyBurn, Attack, CastEffect, DealDamage, DiscardCard, DrawCards, EndBattle,
    EnemyIntent, KillCombatant, PlayCard, RefillMana, SpendMana,
};
pub use battlefield::{
    Battlefield, Combatant, CombatantId, DrawReason, Drawn, Hit, Outcome, Side,
};
pub use card::{Card, Effect};
pub use config::BattleConfig;
pub use error::BattleError;
pub use systems::{BattleContext, CastBar};

use std::sync::Arc;

use runtime::{ActionSystem, ResumeTime, TimeSystem};
use tracing::info;

use systems::{
    BurnSystem, CardSystem, DamageSystem, DeathSystem, EnemySystem, ManaSystem, OutcomeSystem,
};

/// One battle: its state and the systems enforcing its rules.
///
/// Dropping a `Battle` disables its systems, detaching their handlers from
/// the dispatcher.
pub struct Battle {
    ctx: BattleContext,
    mana: ManaSystem,
    damage: DamageSystem,
    death: DeathSystem,
    cards: CardSystem,
    burn: BurnSystem,
    enemies: EnemySystem,
    outcome: OutcomeSystem,
}

impl Battle {
    pub fn new(
        actions: ActionSystem,
        time: TimeSystem,
        field: Battlefield,
        config: BattleConfig,
    ) -> Self {
        Self::with_cast_bar(actions, time, field, config, None)
    }

    /// Like [`new`](Self::new), opening a progress handle from `cast_bar`
    /// for every card cast.
    pub fn with_cast_bar(
        actions: ActionSystem,
        time: TimeSystem,
        field: Battlefield,
        config: BattleConfig,
        cast_bar: Option<Arc<dyn CastBar>>,
    ) -> Self {
        let ctx = BattleContext {
            actions,
            time,
            field,
            config: Arc::new(config),
        };
        Self {
            mana: ManaSystem::new(ctx.clone()),
            damage: DamageSystem::new(ctx.clone()),
            death: DeathSystem::new(ctx.clone()),
            cards: CardSystem::new(ctx.clone(), cast_bar),
            burn: BurnSystem::new(ctx.clone()),
            enemies: EnemySystem::new(ctx.clone()),
            outcome: OutcomeSystem::new(ctx.clone()),
            ctx,
        }
    }

    pub fn enable(&self) {
        self.mana.enable();
        self.damage.enable();
        self.death.enable();
        self.cards.enable();
        self.burn.enable();
        self.enemies.enable();
        self.outcome.enable();
    }

    pub fn disable(&self) {
        self.mana.disable();
        self.damage.disable();
        self.death.disable();
        self.cards.disable();
        self.burn.disable();
        self.enemies.disable();
        self.outcome.disable();
    }

    /// Deals opening hands, schedules the recurring work (mana refill, card
    /// draws, enemy intents) and starts the clock.
    pub async fn start(&self) -> Result<(), BattleError> {
        self.cards.deal().await?;
        self.mana.start();
        self.cards.start();
        self.enemies.start();
        info!(
            target: "battle",
            enemies = self.ctx.field.enemies().len(),
            seed = self.ctx.config.seed,
            "Battle started"
        );
        self.ctx.actions.perform_and_wait(ResumeTime).await?;
        Ok(())
    }

    /// Plays card `index` from `caster`'s hand at `targets` and waits for the
    /// play to resolve. The effect itself lands after the card's cast time.
    ///
    /// Fails without casting when the caster cannot pay for the card.
    pub async fn play_card(
        &self,
        caster: CombatantId,
        index: usize,
        targets: Vec<CombatantId>,
    ) -> Result<(), BattleError> {
        let combatant = self
            .ctx
            .field
            .combatant(caster)
            .ok_or(BattleError::UnknownCombatant(caster))?;
        let card = combatant
            .hand
            .get(index)
            .cloned()
            .ok_or(BattleError::UnknownCard { caster, index })?;

        if combatant.is_down() {
            return Err(BattleError::Down(caster));
        }

        let required = card.mana;
        let play = Arc::new(PlayCard::new(caster, card, targets));
        self.ctx.actions.perform_and_wait(Arc::clone(&play)).await?;

        if play.is_paid() {
            Ok(())
        } else {
            Err(BattleError::InsufficientMana {
                id: caster,
                required,
                available: combatant.mana,
            })
        }
    }

    pub fn context(&self) -> &BattleContext {
        &self.ctx
    }

    pub fn field(&self) -> &Battlefield {
        &self.ctx.field
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.ctx.field.outcome()
    }
}

impl Drop for Battle {
    fn drop(&mut self) {
        self.disable();
    }
}
