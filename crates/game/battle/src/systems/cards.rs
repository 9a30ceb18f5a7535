//! Playing cards and resolving their effects.
//!
//! Playing a card is a three-step affair:
//!
//! 1. a `PlayCard` pre reaction checks the card is in hand and the caster's
//!    mana, and queues `SpendMana`, which resolves before the performer runs
//! 2. the `PlayCard` performer moves the card from the hand to the caster's
//!    casting slot and schedules a `CastEffect` after the card's cast time,
//!    with a progress handle from the [`CastBar`] when one is installed
//! 3. the `CastEffect` performer discards the card and turns the effect into
//!    an `Attack`, `AddBurn` or `DrawCards` reactions
//!
//! Cards cycle through per-combatant piles: draw pile, hand, casting,
//! discard pile. An empty draw pile is refilled from the discard pile with a
//! seeded shuffle.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use runtime::{
    ActionSystem, DispatchError, Handler, HandlerResult, ProgressHandle, ReactionTiming,
    handler_fn,
};
use tracing::{debug, trace, warn};

use super::{BattleContext, Subscriptions};
use crate::actions::{
    AddBurn, Attack, CastEffect, DiscardCard, DrawCards, PlayCard, SpendMana,
};
use crate::battlefield::{Combatant, CombatantId, DrawReason};
use crate::card::{Card, Effect};
use crate::error::BattleError;

/// Source of progress handles for cards being cast, such as a timeline view
/// that shows one slot per cast.
pub trait CastBar: Send + Sync {
    fn open(&self, caster: &Combatant, card: &Card) -> Arc<dyn ProgressHandle>;
}

pub struct CardSystem {
    ctx: BattleContext,
    cast_bar: Option<Arc<dyn CastBar>>,
    /// Reshuffles; kept apart from the enemy intent stream so that one does
    /// not shift the other.
    rng: Arc<Mutex<StdRng>>,
    subscriptions: Subscriptions,
}

impl CardSystem {
    pub fn new(ctx: BattleContext, cast_bar: Option<Arc<dyn CastBar>>) -> Self {
        let rng = StdRng::seed_from_u64(ctx.config.seed.wrapping_add(1));
        Self {
            ctx,
            cast_bar,
            rng: Arc::new(Mutex::new(rng)),
            subscriptions: Subscriptions::default(),
        }
    }

    pub fn enable(&self) {
        let field = self.ctx.field.clone();
        self.subscriptions.push(self.ctx.actions.subscribe_reaction(
            handler_fn(move |play: Arc<PlayCard>, actions| {
                let field = field.clone();
                async move {
                    let caster = field.combatant(play.caster).with_context(|| {
                        format!("{} plays {} from off the battlefield", play.caster, play.card.name)
                    })?;
                    if caster.is_down() {
                        return Err(BattleError::Down(play.caster).into());
                    }
                    if !caster.hand.iter().any(|card| card.name == play.card.name) {
                        warn!(target: "battle::cards", caster = %play.caster, card = %play.card.name, "Card is not in hand");
                        return Err(BattleError::CardNotInHand {
                            caster: play.caster,
                            card: play.card.name.clone(),
                        }
                        .into());
                    }
                    if caster.mana < play.card.mana {
                        warn!(
                            target: "battle::cards",
                            caster = %play.caster,
                            card = %play.card.name,
                            mana = caster.mana,
                            cost = play.card.mana,
                            "Card cannot be paid for"
                        );
                        return Err(BattleError::InsufficientMana {
                            id: play.caster,
                            required: play.card.mana,
                            available: caster.mana,
                        }
                        .into());
                    }

                    play.mark_paid();
                    actions.add_reaction(SpendMana {
                        caster: play.caster,
                        amount: play.card.mana,
                    })?;
                    Ok(())
                }
            })
            .named("CardSystem::pay"),
            ReactionTiming::Pre,
        ));

        self.ctx.actions.attach_performer(StartCast {
            ctx: self.ctx.clone(),
            cast_bar: self.cast_bar.clone(),
        });

        let field = self.ctx.field.clone();
        self.ctx.actions.attach_performer(
            handler_fn(move |cast: Arc<CastEffect>, actions| {
                let field = field.clone();
                async move {
                    // The card leaves the casting slot whether or not the
                    // effect lands.
                    actions.add_reaction(DiscardCard {
                        owner: cast.caster,
                        card: cast.card.clone(),
                    })?;

                    if !field.is_alive(cast.caster) {
                        debug!(target: "battle::cards", caster = %cast.caster, "Caster is down, cast fizzles");
                        return Ok(());
                    }
                    if let Effect::Draw { cards } = cast.effect {
                        debug!(target: "battle::cards", caster = %cast.caster, card = %cast.card, "Cast resolves");
                        actions.add_reaction(DrawCards {
                            owner: cast.caster,
                            amount: cards,
                            reason: DrawReason::CardEffect,
                        })?;
                        return Ok(());
                    }

                    let targets: Vec<CombatantId> = cast
                        .targets
                        .iter()
                        .copied()
                        .filter(|&t| field.is_alive(t))
                        .collect();
                    if targets.is_empty() {
                        debug!(target: "battle::cards", card = %cast.card, "No living targets, cast fizzles");
                        return Ok(());
                    }

                    debug!(target: "battle::cards", caster = %cast.caster, card = %cast.card, "Cast resolves");
                    match cast.effect {
                        Effect::Damage { amount } => actions.add_reaction(Attack {
                            caster: Some(cast.caster),
                            targets,
                            amount,
                        })?,
                        Effect::Burn { stacks } => {
                            for target in targets {
                                actions.add_reaction(AddBurn { target, stacks })?;
                            }
                        }
                        Effect::Draw { .. } => {}
                    }
                    Ok(())
                }
            })
            .named("CardSystem::resolve"),
        );

        let ctx = self.ctx.clone();
        let rng = Arc::clone(&self.rng);
        self.ctx.actions.attach_performer(
            handler_fn(move |draw: Arc<DrawCards>, _| {
                let ctx = ctx.clone();
                let rng = Arc::clone(&rng);
                async move {
                    let hand_size = ctx.config.hand_size;
                    let drawn = {
                        let mut rng = rng.lock().unwrap_or_else(PoisonError::into_inner);
                        ctx.field.update(draw.owner, |c| {
                            if c.is_down() {
                                return None;
                            }
                            let amount = match draw.reason {
                                DrawReason::Timed => {
                                    draw.amount.min(hand_size.saturating_sub(c.hand.len()))
                                }
                                DrawReason::Initial | DrawReason::CardEffect => draw.amount,
                            };
                            Some(c.draw(amount, &mut *rng))
                        })?
                    };

                    let Some(drawn) = drawn else {
                        trace!(target: "battle::cards", owner = %draw.owner, "Owner is down, no draw");
                        return Ok(());
                    };
                    debug!(
                        target: "battle::cards",
                        owner = %draw.owner,
                        reason = %draw.reason,
                        cards = drawn.cards,
                        reshuffled = drawn.reshuffled,
                        "Cards drawn"
                    );

                    if draw.reason == DrawReason::Timed
                        && ctx.field.is_alive(draw.owner)
                        && !ctx.field.is_over()
                    {
                        ctx.time.add_action(
                            DrawCards {
                                owner: draw.owner,
                                amount: 1,
                                reason: DrawReason::Timed,
                            },
                            ctx.config.draw_interval,
                        );
                    }
                    Ok(())
                }
            })
            .named("CardSystem::draw"),
        );

        let field = self.ctx.field.clone();
        self.ctx.actions.attach_performer(
            handler_fn(move |discard: Arc<DiscardCard>, _| {
                let field = field.clone();
                async move {
                    if field.update(discard.owner, |c| c.finish_cast(&discard.card))? {
                        trace!(target: "battle::cards", owner = %discard.owner, card = %discard.card, "Card discarded");
                    } else {
                        debug!(target: "battle::cards", owner = %discard.owner, card = %discard.card, "Card was not being cast");
                    }
                    Ok(())
                }
            })
            .named("CardSystem::discard"),
        );
    }

    pub fn disable(&self) {
        self.subscriptions.release(&self.ctx.actions);
        self.ctx.actions.detach_performer::<PlayCard>();
        self.ctx.actions.detach_performer::<CastEffect>();
        self.ctx.actions.detach_performer::<DrawCards>();
        self.ctx.actions.detach_performer::<DiscardCard>();
    }

    /// Fills every hand up to the configured hand size.
    pub async fn deal(&self) -> Result<(), DispatchError> {
        for owner in self.ctx.field.ids() {
            let Some(combatant) = self.ctx.field.combatant(owner) else {
                continue;
            };
            let amount = self.ctx.config.hand_size.saturating_sub(combatant.hand.len());
            if amount > 0 {
                self.ctx
                    .actions
                    .perform_and_wait(DrawCards {
                        owner,
                        amount,
                        reason: DrawReason::Initial,
                    })
                    .await?;
            }
        }
        Ok(())
    }

    /// Schedules the first timed draw for every living combatant. Each timed
    /// draw schedules the next one.
    pub fn start(&self) {
        for owner in self.ctx.field.ids() {
            if self.ctx.field.is_alive(owner) {
                self.ctx.time.add_action(
                    DrawCards {
                        owner,
                        amount: 1,
                        reason: DrawReason::Timed,
                    },
                    self.ctx.config.draw_interval,
                );
            }
        }
    }
}

struct StartCast {
    ctx: BattleContext,
    cast_bar: Option<Arc<dyn CastBar>>,
}

#[async_trait]
impl Handler<PlayCard> for StartCast {
    fn name(&self) -> &'static str {
        "CardSystem::start_cast"
    }

    async fn handle(&self, play: Arc<PlayCard>, _: &ActionSystem) -> HandlerResult {
        if !play.is_paid() {
            debug!(target: "battle::cards", card = %play.card.name, "Unpaid card not cast");
            return Ok(());
        }
        let taken = self
            .ctx
            .field
            .update(play.caster, |c| c.begin_cast(&play.card.name))?;
        if taken.is_none() {
            warn!(target: "battle::cards", caster = %play.caster, card = %play.card.name, "Card left the hand before casting");
            return Err(BattleError::CardNotInHand {
                caster: play.caster,
                card: play.card.name.clone(),
            }
            .into());
        }

        let cast = CastEffect {
            caster: play.caster,
            card: play.card.name.clone(),
            effect: play.card.effect.clone(),
            targets: play.targets.clone(),
        };
        let bar = match (&self.cast_bar, self.ctx.field.combatant(play.caster)) {
            (Some(bar), Some(caster)) => Some(bar.open(&caster, &play.card)),
            _ => None,
        };

        let entry = match bar {
            Some(handle) => {
                self.ctx
                    .time
                    .add_action_with_progress(cast, play.card.cast_time, handle)
            }
            None => self.ctx.time.add_action(cast, play.card.cast_time),
        };
        debug!(
            target: "battle::cards",
            caster = %play.caster,
            card = %play.card.name,
            %entry,
            cast_time = play.card.cast_time,
            "Cast started"
        );
        Ok(())
    }
}
