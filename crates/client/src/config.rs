//! Skirmish configuration loaded from the environment.
use std::time::Duration;

use game_battle::BattleConfig;
use runtime::config::read_env;
use runtime::{ConfigError, RuntimeConfig};

/// Everything the skirmish binary needs to set up a battle and drive it.
#[derive(Clone, Debug)]
pub struct SkirmishConfig {
    pub runtime: RuntimeConfig,
    pub battle: BattleConfig,
    /// Wall-clock period between scheduler ticks.
    pub tick: Duration,
    /// Give up on a battle that has not ended after this long.
    pub max_duration: Duration,
    /// Delay between the hero's card plays.
    pub hero_interval: Duration,
    /// Goblins the hero faces.
    pub enemies: usize,
    pub session_id: Option<String>,
    /// Write every runtime event to `events.jsonl` in the session directory.
    pub journal: bool,
}

impl Default for SkirmishConfig {
    fn default() -> Self {
        Self {
            runtime: RuntimeConfig::default(),
            battle: BattleConfig::default(),
            tick: Duration::from_millis(50),
            max_duration: Duration::from_secs(120),
            hero_interval: Duration::from_millis(1500),
            enemies: 2,
            session_id: None,
            journal: true,
        }
    }
}

impl SkirmishConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables (plus the `CASCADE_*` ones read by
    /// [`RuntimeConfig::from_env`]):
    /// - `SKIRMISH_TICK_MS` - Scheduler tick period in milliseconds (default: 50)
    /// - `SKIRMISH_MAX_SECONDS` - Battle time limit (default: 120)
    /// - `SKIRMISH_SEED` - Seed for enemy decisions (default: 0)
    /// - `SKIRMISH_ENEMIES` - Number of goblins (default: 2)
    /// - `SKIRMISH_SESSION_ID` - Session identifier for logs (default: auto-generated)
    /// - `SKIRMISH_JOURNAL` - Write the event journal (default: true)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self {
            runtime: RuntimeConfig::from_env()?,
            ..Self::default()
        };

        if let Some(ms) = read_env::<u64>("SKIRMISH_TICK_MS", "milliseconds")? {
            config.tick = Duration::from_millis(ms.max(1));
        }

        if let Some(seconds) = read_env::<u64>("SKIRMISH_MAX_SECONDS", "seconds")? {
            config.max_duration = Duration::from_secs(seconds);
        }

        if let Some(seed) = read_env::<u64>("SKIRMISH_SEED", "unsigned integer")? {
            config.battle.seed = seed;
        }

        if let Some(enemies) = read_env::<usize>("SKIRMISH_ENEMIES", "unsigned integer")? {
            config.enemies = enemies;
        }

        config.session_id = std::env::var("SKIRMISH_SESSION_ID")
            .ok()
            .filter(|id| !id.trim().is_empty());

        if let Some(journal) = read_env::<bool>("SKIRMISH_JOURNAL", "boolean")? {
            config.journal = journal;
        }

        Ok(config)
    }
}
