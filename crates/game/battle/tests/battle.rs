use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use game_battle::{
    AddBurn, ApplyBurn, Attack, Battle, BattleConfig, BattleError, Battlefield, Card, CastBar,
    CastEffect, Combatant, CombatantId, DealDamage, DiscardCard, DrawCards, DrawReason, Effect,
    EnemyIntent, Outcome, PlayCard, Side, content,
};
use runtime::{
    ActionSystem, ProgressHandle, ReactionTiming, RuntimeConfig, TimeSystem, TrackExtents,
};

const SECOND: Duration = Duration::from_secs(1);

struct Harness {
    battle: Battle,
    actions: ActionSystem,
    time: TimeSystem,
}

impl Harness {
    fn new(field: Battlefield) -> Self {
        Self::with_cast_bar(field, None)
    }

    fn with_cast_bar(field: Battlefield, cast_bar: Option<Arc<dyn CastBar>>) -> Self {
        let (actions, time) = runtime::build(&RuntimeConfig::default());
        let battle = Battle::with_cast_bar(
            actions.clone(),
            time.clone(),
            field,
            BattleConfig::default(),
            cast_bar,
        );
        battle.enable();
        Self {
            battle,
            actions,
            time,
        }
    }

    async fn ticks(&self, count: usize) {
        for _ in 0..count {
            self.time.tick(SECOND).await;
        }
    }

    fn field(&self) -> &Battlefield {
        self.battle.field()
    }
}

fn hero() -> Combatant {
    content::hero(&BattleConfig::default())
}

fn rat() -> Combatant {
    Combatant::new("Rat", Side::Enemy, 10)
}

fn names(cards: &[Card]) -> Vec<&str> {
    cards.iter().map(|card| card.name.as_str()).collect()
}

#[tokio::test]
async fn mana_refills_every_interval() {
    let h = Harness::new(Battlefield::new(hero()));
    h.battle.start().await.unwrap();
    assert_eq!(h.field().hero().mana, 60);

    h.ticks(3).await;

    assert_eq!(h.field().hero().mana, 66);
    assert_eq!(
        h.time.remaining_countdown_where::<game_battle::RefillMana>(|_| true),
        Some(1.0)
    );
}

#[tokio::test]
async fn lethal_cast_ends_the_battle_in_victory() {
    let field = Battlefield::new(hero());
    let rat = field.add_enemy(rat());
    let h = Harness::new(field);
    h.battle.start().await.unwrap();

    // Fireball: 25 mana, 2.5 s cast, 14 damage.
    h.battle.play_card(CombatantId::HERO, 1, vec![rat]).await.unwrap();
    assert_eq!(h.field().hero().mana, 35);

    h.ticks(2).await;
    assert!(h.field().is_alive(rat));
    assert!(h.battle.outcome().is_none());

    h.ticks(1).await;
    assert!(!h.field().is_alive(rat));
    assert_eq!(h.battle.outcome(), Some(Outcome::Victory));
    assert!(!h.time.is_playing());
    assert!(h.time.is_paused());
    assert_eq!(h.field().hero().mana, 41);
    assert_eq!(
        h.time.remaining_countdown_where::<EnemyIntent>(|_| true),
        None
    );

    // The clock stays stopped once the battle is decided.
    h.ticks(5).await;
    assert_eq!(h.field().hero().mana, 41);
}

#[tokio::test]
async fn unaffordable_card_is_not_cast() {
    let field = Battlefield::new(hero().with_mana(5, 100));
    let rat = field.add_enemy(rat());
    let h = Harness::new(field);

    let err = h
        .battle
        .play_card(CombatantId::HERO, 0, vec![rat])
        .await
        .unwrap_err();

    assert_eq!(
        err,
        BattleError::InsufficientMana {
            id: CombatantId::HERO,
            required: 10,
            available: 5
        }
    );
    assert_eq!(h.field().hero().mana, 5);
    assert_eq!(h.time.remaining_countdown_where::<CastEffect>(|_| true), None);
}

#[tokio::test]
async fn unknown_card_index_is_rejected() {
    let h = Harness::new(Battlefield::new(hero()));
    assert_eq!(
        h.battle.play_card(CombatantId::HERO, 9, vec![]).await,
        Err(BattleError::UnknownCard {
            caster: CombatantId::HERO,
            index: 9
        })
    );
}

#[tokio::test]
async fn hero_death_ends_the_battle_in_defeat() {
    let field = Battlefield::new(hero());
    let rat = field.add_enemy(rat());
    let h = Harness::new(field);
    h.battle.start().await.unwrap();

    h.actions
        .perform_and_wait(Attack {
            caster: Some(rat),
            targets: vec![CombatantId::HERO],
            amount: 200,
        })
        .await
        .unwrap();
    assert!(!h.field().hero().alive);
    assert!(h.battle.outcome().is_none());

    h.time.tick(Duration::ZERO).await;
    assert_eq!(h.battle.outcome(), Some(Outcome::Defeat));
}

#[tokio::test]
async fn armor_soaks_part_of_each_hit() {
    let h = Harness::new(Battlefield::new(hero()));

    let hit = Arc::new(DealDamage::new(None, CombatantId::HERO, 10));
    h.actions.perform_and_wait(Arc::clone(&hit)).await.unwrap();

    assert_eq!((hit.absorbed(), hit.remaining()), (5, 5));
    let hero = h.field().hero();
    assert_eq!((hero.armor, hero.health), (1, 35));
}

#[tokio::test]
async fn armor_runs_out_after_enough_hits() {
    let h = Harness::new(Battlefield::new(hero()));

    for _ in 0..2 {
        h.actions
            .perform_and_wait(DealDamage::new(None, CombatantId::HERO, 10))
            .await
            .unwrap();
    }

    // 5 absorbed by the first hit, the last point of armor by the second.
    let hero = h.field().hero();
    assert_eq!((hero.armor, hero.health), (0, 26));
}

#[tokio::test]
async fn damage_on_stale_targets_is_ignored() {
    let field = Battlefield::new(hero());
    let rat = field.add_enemy(rat());
    let h = Harness::new(field);
    let mut events = h.actions.subscribe_events();

    h.actions
        .perform_and_wait(Attack {
            caster: None,
            targets: vec![rat, rat, CombatantId(42)],
            amount: 50,
        })
        .await
        .unwrap();

    assert!(!h.field().is_alive(rat));
    let failures = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|event| {
            matches!(
                event,
                runtime::Event::Dispatch(runtime::DispatchEvent::HandlerFailed { .. })
            )
        })
        .count();
    assert_eq!(failures, 0);
}

#[tokio::test]
async fn burn_ticks_until_stacks_run_out() {
    let field = Battlefield::new(hero());
    let rat = field.add_enemy(rat());
    let h = Harness::new(field);
    h.battle.start().await.unwrap();

    h.actions
        .perform_and_wait(AddBurn {
            target: rat,
            stacks: 3,
        })
        .await
        .unwrap();
    assert_eq!(h.field().combatant(rat).unwrap().burn, 3);

    h.ticks(3).await;

    let burnt = h.field().combatant(rat).unwrap();
    assert_eq!((burnt.health, burnt.burn), (4, 0));
    assert_eq!(h.time.remaining_countdown_where::<ApplyBurn>(|_| true), None);
}

#[tokio::test]
async fn stacking_burn_keeps_a_single_tick_queued() {
    let field = Battlefield::new(hero());
    let rat = field.add_enemy(rat());
    let h = Harness::new(field);

    for _ in 0..2 {
        h.actions
            .perform_and_wait(AddBurn {
                target: rat,
                stacks: 2,
            })
            .await
            .unwrap();
    }

    let ticks = h
        .time
        .pending_actions()
        .iter()
        .filter(|action| action.is::<ApplyBurn>())
        .count();
    assert_eq!(ticks, 1);
    assert_eq!(h.field().combatant(rat).unwrap().burn, 4);
}

#[tokio::test]
async fn killing_a_caster_cancels_its_pending_casts() {
    let field = Battlefield::new(hero());
    let goblin = field.add_enemy(content::goblin("Goblin", &BattleConfig::default()));
    let h = Harness::new(field);

    h.actions
        .perform_and_wait(PlayCard::new(goblin, content::claw(), vec![CombatantId::HERO]))
        .await
        .unwrap();
    assert_eq!(
        h.time.remaining_countdown_where::<CastEffect>(|cast| cast.caster == goblin),
        Some(2.0)
    );

    h.actions
        .perform_and_wait(Attack {
            caster: Some(CombatantId::HERO),
            targets: vec![goblin],
            amount: 100,
        })
        .await
        .unwrap();

    assert_eq!(
        h.time.remaining_countdown_where::<CastEffect>(|cast| cast.caster == goblin),
        None
    );
    let goblin = h.field().combatant(goblin).unwrap();
    assert!(goblin.casting.is_empty());
    assert_eq!(names(&goblin.discard_pile), ["Claw"]);
    assert_eq!(
        h.time
            .remaining_countdown_where::<game_battle::EndBattle>(|end| end.outcome
                == Outcome::Victory),
        Some(0.0)
    );
}

#[tokio::test]
async fn enemies_act_on_their_intent_interval() {
    let field = Battlefield::new(hero());
    let goblin = field.add_enemy(content::goblin("Goblin", &BattleConfig::default()));
    let h = Harness::new(field);
    h.battle.start().await.unwrap();

    h.ticks(2).await;
    assert_eq!(
        h.time.remaining_countdown_where::<CastEffect>(|_| true),
        None
    );

    h.ticks(1).await;
    let cast = h
        .time
        .remaining_countdown_where::<CastEffect>(|cast| {
            cast.caster == goblin && cast.targets == [CombatantId::HERO]
        });
    assert!(cast.is_some());
    assert!(h.field().combatant(goblin).unwrap().mana < 36);
    assert_eq!(
        h.time
            .remaining_countdown_where::<EnemyIntent>(|intent| intent.enemy == goblin),
        Some(3.0)
    );
}

#[derive(Default)]
struct CountingBar {
    opened: AtomicUsize,
    released: Arc<AtomicUsize>,
    last: Arc<Mutex<f32>>,
}

struct Slot {
    released: Arc<AtomicUsize>,
    last: Arc<Mutex<f32>>,
}

impl ProgressHandle for Slot {
    fn update(&self, progress: f32, _: TrackExtents) {
        *self.last.lock().unwrap() = progress;
    }

    fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl CastBar for CountingBar {
    fn open(&self, _: &Combatant, _: &game_battle::Card) -> Arc<dyn ProgressHandle> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Arc::new(Slot {
            released: Arc::clone(&self.released),
            last: Arc::clone(&self.last),
        })
    }
}

#[tokio::test]
async fn casts_report_progress_to_the_cast_bar() {
    let field = Battlefield::new(hero());
    let rat = field.add_enemy(rat());
    let bar = Arc::new(CountingBar::default());
    let h = Harness::with_cast_bar(field, Some(bar.clone()));
    h.battle.start().await.unwrap();

    // Strike: 1 s cast.
    h.battle.play_card(CombatantId::HERO, 0, vec![rat]).await.unwrap();
    assert_eq!(bar.opened.load(Ordering::SeqCst), 1);

    h.ticks(1).await;

    assert_eq!(*bar.last.lock().unwrap(), 1.0);
    assert_eq!(bar.released.load(Ordering::SeqCst), 1);
    assert_eq!(h.field().combatant(rat).unwrap().health, 4);
}

#[tokio::test]
async fn burn_card_applies_stacks_to_targets() {
    let field = Battlefield::new(hero());
    let rat = field.add_enemy(rat());
    let h = Harness::new(field);

    h.actions
        .perform_and_wait(CastEffect {
            caster: CombatantId::HERO,
            card: "Ignite".into(),
            effect: Effect::Burn { stacks: 3 },
            targets: vec![rat],
        })
        .await
        .unwrap();

    assert_eq!(h.field().combatant(rat).unwrap().burn, 3);
}

#[tokio::test]
async fn disabling_detaches_every_handler() {
    let h = Harness::new(Battlefield::new(hero()));
    assert!(h.actions.has_performer::<DealDamage>());
    assert_eq!(h.actions.reaction_count::<PlayCard>(ReactionTiming::Pre), 1);
    assert_eq!(h.actions.reaction_count::<DealDamage>(ReactionTiming::Pre), 1);

    h.battle.disable();

    assert!(!h.actions.has_performer::<DealDamage>());
    assert!(!h.actions.has_performer::<PlayCard>());
    assert!(!h.actions.has_performer::<DrawCards>());
    assert!(!h.actions.has_performer::<DiscardCard>());
    assert_eq!(h.actions.reaction_count::<DealDamage>(ReactionTiming::Pre), 0);
    assert_eq!(h.actions.reaction_count::<PlayCard>(ReactionTiming::Pre), 0);
    assert_eq!(
        h.actions
            .reaction_count::<game_battle::KillCombatant>(ReactionTiming::Post),
        0
    );
}

#[tokio::test]
async fn played_card_moves_from_hand_through_casting_to_discard() {
    let field = Battlefield::new(hero());
    let rat = field.add_enemy(rat());
    let h = Harness::new(field);

    h.battle.play_card(CombatantId::HERO, 0, vec![rat]).await.unwrap();
    let hero = h.field().hero();
    assert_eq!(names(&hero.hand), ["Fireball", "Ignite"]);
    assert_eq!(names(&hero.casting), ["Strike"]);
    assert!(hero.discard_pile.is_empty());

    h.ticks(1).await;

    let hero = h.field().hero();
    assert!(hero.casting.is_empty());
    assert_eq!(names(&hero.discard_pile), ["Strike"]);
    assert_eq!(h.field().combatant(rat).unwrap().health, 4);
}

#[tokio::test]
async fn card_being_cast_cannot_be_played_again() {
    let field = Battlefield::new(
        Combatant::new("Hero", Side::Hero, 40)
            .with_mana(100, 100)
            .with_hand(vec![content::strike()]),
    );
    let rat = field.add_enemy(rat());
    let h = Harness::new(field);

    h.battle.play_card(CombatantId::HERO, 0, vec![rat]).await.unwrap();
    assert_eq!(
        h.battle.play_card(CombatantId::HERO, 0, vec![rat]).await,
        Err(BattleError::UnknownCard {
            caster: CombatantId::HERO,
            index: 0
        })
    );

    // Bypassing the hand lookup still fails the in-hand check.
    let replay = Arc::new(PlayCard::new(CombatantId::HERO, content::strike(), vec![rat]));
    h.actions.perform_and_wait(Arc::clone(&replay)).await.unwrap();
    assert!(!replay.is_paid());

    let casts = h
        .time
        .pending_actions()
        .iter()
        .filter(|action| action.is::<CastEffect>())
        .count();
    assert_eq!(casts, 1);
    assert_eq!(h.field().hero().mana, 90);
}

#[tokio::test]
async fn drawing_recycles_the_discard_pile() {
    let field = Battlefield::new(
        Combatant::new("Hero", Side::Hero, 40)
            .with_mana(100, 100)
            .with_hand(vec![content::strike()]),
    );
    let rat = field.add_enemy(rat());
    let h = Harness::new(field);

    h.battle.play_card(CombatantId::HERO, 0, vec![rat]).await.unwrap();
    h.ticks(1).await;
    assert_eq!(names(&h.field().hero().discard_pile), ["Strike"]);

    h.actions
        .perform_and_wait(DrawCards {
            owner: CombatantId::HERO,
            amount: 2,
            reason: DrawReason::CardEffect,
        })
        .await
        .unwrap();

    let hero = h.field().hero();
    assert_eq!(names(&hero.hand), ["Strike"]);
    assert!(hero.draw_pile.is_empty());
    assert!(hero.discard_pile.is_empty());
}

#[tokio::test]
async fn draw_card_effect_draws_from_the_pile() {
    let field = Battlefield::new(hero().with_hand(vec![content::insight()]));
    let h = Harness::new(field);

    // Insight: 5 mana, 0.5 s cast, draw 2.
    h.battle.play_card(CombatantId::HERO, 0, vec![]).await.unwrap();
    assert!(h.field().hero().hand.is_empty());

    h.ticks(1).await;

    let hero = h.field().hero();
    assert_eq!(names(&hero.hand), ["Insight", "Strike"]);
    assert_eq!(names(&hero.discard_pile), ["Insight"]);
    assert_eq!(hero.draw_pile.len(), 3);
}

#[tokio::test]
async fn start_deals_opening_hands() {
    let field = Battlefield::new(hero());
    let goblin = field.add_enemy(content::goblin("Goblin", &BattleConfig::default()));
    let h = Harness::new(field);

    h.battle.start().await.unwrap();

    let hero = h.field().hero();
    assert_eq!(
        names(&hero.hand),
        ["Strike", "Fireball", "Ignite", "Insight", "Strike"]
    );
    assert_eq!(hero.draw_pile.len(), 3);
    // Nothing to draw from.
    assert_eq!(h.field().combatant(goblin).unwrap().hand.len(), 2);
}

#[tokio::test]
async fn timed_draw_tops_up_the_hand() {
    let field = Battlefield::new(hero());
    let rat = field.add_enemy(rat());
    let h = Harness::new(field);
    h.battle.start().await.unwrap();
    assert_eq!(
        h.time.remaining_countdown_where::<DrawCards>(|draw| {
            draw.owner == CombatantId::HERO && draw.reason == DrawReason::Timed
        }),
        Some(4.0)
    );

    h.battle.play_card(CombatantId::HERO, 0, vec![rat]).await.unwrap();
    assert_eq!(h.field().hero().hand.len(), 4);

    h.ticks(4).await;

    let hero = h.field().hero();
    assert_eq!(hero.hand.len(), 5);
    assert_eq!(hero.draw_pile.len(), 2);
    assert_eq!(
        h.time.remaining_countdown_where::<DrawCards>(|draw| draw.owner == CombatantId::HERO),
        Some(4.0)
    );
}

#[tokio::test]
async fn killing_a_combatant_cancels_its_timed_draws() {
    let field = Battlefield::new(hero());
    let rat = field.add_enemy(rat());
    let other = field.add_enemy(Combatant::new("Other rat", Side::Enemy, 10));
    let h = Harness::new(field);
    h.battle.start().await.unwrap();

    h.actions
        .perform_and_wait(Attack {
            caster: Some(CombatantId::HERO),
            targets: vec![rat],
            amount: 50,
        })
        .await
        .unwrap();

    assert_eq!(
        h.time.remaining_countdown_where::<DrawCards>(|draw| draw.owner == rat),
        None
    );
    assert!(
        h.time
            .remaining_countdown_where::<DrawCards>(|draw| draw.owner == other)
            .is_some()
    );
}
