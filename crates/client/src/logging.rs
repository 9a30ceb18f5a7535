//! Logging setup: per-session log file plus stderr.
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Files of one skirmish session live under `log_dir()/<session_id>/`.
pub struct Session {
    pub id: String,
    pub dir: PathBuf,
    _guard: WorkerGuard,
}

/// Get the platform-specific log directory
///
/// - macOS: `~/Library/Caches/skirmish/logs`
/// - Linux: `~/.cache/skirmish/logs` (or `$XDG_CACHE_HOME/skirmish/logs`)
/// - Windows: `%LOCALAPPDATA%\skirmish\logs`
/// - Fallback: `/tmp/skirmish/logs`
pub fn log_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "skirmish")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("/tmp/skirmish"))
        .join("logs")
}

pub fn session_id(configured: Option<&str>) -> String {
    configured.map(str::to_owned).unwrap_or_else(|| {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        format!("session_{timestamp}")
    })
}

/// Setup logging to both stderr and `<root>/<session>/skirmish.log`.
///
/// The returned [`Session`] owns the file writer's guard; keep it alive until
/// the program exits so buffered lines are flushed.
pub fn setup_logging(root: &Path, session_id: String) -> Result<Session> {
    let dir = root.join(&session_id);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    let file_appender = tracing_appender::rolling::never(&dir, "skirmish.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false);
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!("Logging initialized: session={}", session_id);
    tracing::info!("Log file: {}/skirmish.log", dir.display());

    Ok(Session {
        id: session_id,
        dir,
        _guard: guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_session_id_wins() {
        assert_eq!(session_id(Some("replay")), "replay");
        assert!(session_id(None).starts_with("session_"));
    }
}
