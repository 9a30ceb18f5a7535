//! Skirmish binary.
//!
//! Plays one hero-versus-goblins battle without a frontend. Configuration
//! comes from the environment (see [`SkirmishConfig::from_env`]); logs and the
//! event journal land in the per-session log directory.
//!
//! ```bash
//! SKIRMISH_SEED=7 RUST_LOG=battle=debug cargo run -p skirmish
//! ```

use anyhow::{Context, Result};
use runtime::Topic;
use skirmish::journal::JOURNAL_FILE;
use skirmish::{EventJournal, JournalWorker, Skirmish, SkirmishConfig, logging};
use tokio::sync::watch;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env file if it exists (silently ignore if not found)
    dotenvy::dotenv().ok();

    let config = SkirmishConfig::from_env().context("Invalid configuration")?;
    let session_id = logging::session_id(config.session_id.as_deref());
    let session = logging::setup_logging(&logging::log_dir(), session_id)?;

    tracing::info!("Starting skirmish");
    tracing::info!("Session ID: {}", session.id);
    tracing::info!(
        "Seed: {}, enemies: {}, tick: {:?}",
        config.battle.seed,
        config.enemies,
        config.tick
    );

    let journal_enabled = config.journal;
    let skirmish = Skirmish::new(config);

    let (journal_stop, journal_shutdown) = watch::channel(false);
    let journal = if journal_enabled {
        let receivers = skirmish
            .actions()
            .events()
            .subscribe_multiple(&[Topic::Dispatch, Topic::Schedule]);
        let journal = EventJournal::create(&session.dir, JOURNAL_FILE)?;
        let worker = JournalWorker::new(journal, receivers, journal_shutdown)?;
        Some(tokio::spawn(worker.run()))
    } else {
        None
    };

    let report = skirmish
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    let _ = journal_stop.send(true);
    if let Some(journal) = journal {
        let written = journal.await.context("Journal task failed")??;
        tracing::info!("Journal: {} events in {}/{}", written, session.dir.display(), JOURNAL_FILE);
    }

    match report.outcome {
        Some(outcome) => println!(
            "{outcome} after {:.1}s ({} cards played, hero at {} hp)",
            report.elapsed.as_secs_f32(),
            report.cards_played,
            report.hero_health
        ),
        None => println!("undecided after {:.1}s", report.elapsed.as_secs_f32()),
    }

    Ok(())
}
