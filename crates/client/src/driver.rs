//! Runs one skirmish: the scheduler on the wall clock plus a hero autopilot.
use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use game_battle::{Battle, BattleError, Battlefield, CombatantId, Outcome, content};
use runtime::{ActionSystem, DispatchError, TimeSystem};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::SkirmishConfig;
use crate::timeline::Timeline;

/// How a skirmish ended.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    /// `None` when the time limit or the stop signal came first.
    pub outcome: Option<Outcome>,
    pub elapsed: std::time::Duration,
    pub cards_played: usize,
    pub hero_health: u32,
}

pub struct Skirmish {
    battle: Battle,
    actions: ActionSystem,
    time: TimeSystem,
    timeline: Timeline,
    config: SkirmishConfig,
}

impl Skirmish {
    /// The stock hero against `config.enemies` goblins.
    pub fn new(config: SkirmishConfig) -> Self {
        let field = Battlefield::new(content::hero(&config.battle));
        for n in 1..=config.enemies {
            field.add_enemy(content::goblin(&format!("Goblin {n}"), &config.battle));
        }
        Self::with_field(config, field)
    }

    pub fn with_field(config: SkirmishConfig, field: Battlefield) -> Self {
        let (actions, time) = runtime::build(&config.runtime);
        let timeline = Timeline::new();
        let battle = Battle::with_cast_bar(
            actions.clone(),
            time.clone(),
            field,
            config.battle.clone(),
            Some(Arc::new(timeline.clone())),
        );
        battle.enable();
        Self {
            battle,
            actions,
            time,
            timeline,
            config,
        }
    }

    pub fn actions(&self) -> &ActionSystem {
        &self.actions
    }

    pub fn battle(&self) -> &Battle {
        &self.battle
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Starts the battle and plays it out until it is decided, the time limit
    /// passes, or `stop` resolves.
    pub async fn run(&self, stop: impl Future<Output = ()>) -> Result<Report> {
        let started = Instant::now();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = {
            let time = self.time.clone();
            let period = self.config.tick;
            tokio::spawn(async move { time.run(period, shutdown_rx).await })
        };

        self.battle
            .start()
            .await
            .context("Failed to start the battle")?;

        let deadline = tokio::time::sleep(self.config.max_duration);
        tokio::pin!(deadline);
        tokio::pin!(stop);

        let mut hero_clock = tokio::time::interval(self.config.hero_interval);
        hero_clock.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut watch_outcome = tokio::time::interval(self.config.tick);
        watch_outcome.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut cards_played = 0;

        while self.battle.outcome().is_none() {
            tokio::select! {
                _ = hero_clock.tick() => {
                    if self.hero_turn().await? {
                        cards_played += 1;
                    }
                }
                _ = watch_outcome.tick() => {
                    debug!(target: "skirmish", casts = self.timeline.active(), pending = self.time.len());
                }
                _ = &mut deadline => {
                    warn!(target: "skirmish", limit_s = self.config.max_duration.as_secs(), "Time limit reached");
                    break;
                }
                _ = &mut stop => {
                    info!(target: "skirmish", "Stop requested");
                    break;
                }
            }
        }

        let _ = shutdown_tx.send(true);
        scheduler.await.context("Scheduler task failed")?;

        let report = Report {
            outcome: self.battle.outcome(),
            elapsed: started.elapsed(),
            cards_played,
            hero_health: self.battle.field().hero().health,
        };
        info!(
            target: "skirmish",
            outcome = ?report.outcome,
            elapsed_s = report.elapsed.as_secs_f32(),
            cards = report.cards_played,
            hero_health = report.hero_health,
            "Skirmish finished"
        );
        Ok(report)
    }

    /// Plays the hero's next card, if any. Returns whether a card was cast.
    async fn hero_turn(&self) -> Result<bool> {
        let Some((index, target)) = choose_play(self.battle.field()) else {
            return Ok(false);
        };

        match self
            .battle
            .play_card(CombatantId::HERO, index, vec![target])
            .await
        {
            Ok(()) => Ok(true),
            // A drain holds the dispatcher or mana ran short; try again next turn.
            Err(BattleError::Dispatch(DispatchError::AlreadyPerforming { .. }))
            | Err(BattleError::InsufficientMana { .. })
            | Err(BattleError::Down(_)) => Ok(false),
            Err(err) => Err(err).context("Hero failed to play a card"),
        }
    }
}

/// The hero's autopilot: the most expensive affordable card at the first
/// living enemy.
pub fn choose_play(field: &Battlefield) -> Option<(usize, CombatantId)> {
    let hero = field.hero();
    if hero.is_down() {
        return None;
    }
    let target = field.living_enemies().into_iter().next()?;
    let (index, _) = hero
        .hand
        .iter()
        .enumerate()
        .filter(|(_, card)| card.mana <= hero.mana)
        .max_by_key(|(_, card)| card.mana)?;
    Some((index, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_battle::{BattleConfig, Combatant, Side};
    use std::time::Duration;

    fn rat() -> Combatant {
        Combatant::new("Rat", Side::Enemy, 10)
    }

    #[test]
    fn autopilot_picks_the_priciest_affordable_card() {
        let config = BattleConfig::default();
        let field = Battlefield::new(content::hero(&config).with_mana(20, 100));
        let rat = field.add_enemy(rat());

        // Strike (10) and Ignite (15) are affordable, Fireball (25) is not.
        assert_eq!(choose_play(&field), Some((2, rat)));
    }

    #[test]
    fn autopilot_waits_without_mana_or_targets() {
        let config = BattleConfig::default();
        let broke = Battlefield::new(content::hero(&config).with_mana(5, 100));
        broke.add_enemy(rat());
        assert_eq!(choose_play(&broke), None);

        let empty = Battlefield::new(content::hero(&config));
        assert_eq!(choose_play(&empty), None);
    }

    #[tokio::test(start_paused = true)]
    async fn skirmish_plays_out_to_victory() {
        let config = SkirmishConfig::default();
        let field = Battlefield::new(content::hero(&config.battle));
        field.add_enemy(rat());
        let skirmish = Skirmish::with_field(config, field);

        let report = skirmish.run(std::future::pending()).await.unwrap();

        assert_eq!(report.outcome, Some(Outcome::Victory));
        assert!(report.cards_played >= 1);
        assert!(report.elapsed < Duration::from_secs(10));
        assert_eq!(skirmish.timeline().active(), 0);
        assert!(!skirmish.time.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_signal_ends_an_undecided_skirmish() {
        let config = SkirmishConfig {
            hero_interval: Duration::from_secs(3600),
            ..SkirmishConfig::default()
        };
        let skirmish = Skirmish::new(config);

        let report = skirmish
            .run(tokio::time::sleep(Duration::from_millis(200)))
            .await
            .unwrap();

        assert_eq!(report.outcome, None);
        assert_eq!(report.cards_played, 1);
    }
}
