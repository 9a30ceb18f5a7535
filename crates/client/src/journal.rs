//! JSON-lines journal of runtime events.
//!
//! Each line is one [`Event`] in serde's externally tagged form, e.g.
//! `{"Dispatch":{"ActionStarted":{"action":"PlayCard","depth":0}}}`.
//! Events from different topics are interleaved in arrival order, which
//! may differ from publish order across topics.
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use runtime::{Event, Topic};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

pub const JOURNAL_FILE: &str = "events.jsonl";

/// Append-only event file.
pub struct EventJournal {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl EventJournal {
    /// Creates `base_dir/filename`, failing if the file already exists.
    pub fn create(base_dir: impl AsRef<Path>, filename: impl AsRef<str>) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        std::fs::create_dir_all(base_dir)
            .with_context(|| format!("Failed to create {}", base_dir.display()))?;

        let path = base_dir.join(filename.as_ref());
        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to create journal {}", path.display()))?;

        debug!(target: "skirmish::journal", path = %path.display(), "Created journal");
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn append(&mut self, event: &Event) -> Result<()> {
        serde_json::to_writer(&mut self.writer, event).context("Failed to encode event")?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush journal")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

/// Reads every event from a journal file.
pub fn read_journal(path: impl AsRef<Path>) -> Result<Vec<Event>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open journal {}", path.display()))?;

    BufReader::new(file)
        .lines()
        .enumerate()
        .filter(|(_, line)| line.as_ref().map_or(true, |l| !l.trim().is_empty()))
        .map(|(index, line)| {
            let line = line?;
            serde_json::from_str(&line)
                .with_context(|| format!("Malformed event on line {}", index + 1))
        })
        .collect()
}

/// Background task copying dispatch and schedule events into a journal.
pub struct JournalWorker {
    journal: EventJournal,
    dispatch_rx: broadcast::Receiver<Event>,
    schedule_rx: broadcast::Receiver<Event>,
    shutdown: watch::Receiver<bool>,
    lost: u64,
}

impl JournalWorker {
    /// `receivers` must hold both topics, as returned by
    /// `EventBus::subscribe_multiple(&[Topic::Dispatch, Topic::Schedule])`.
    pub fn new(
        journal: EventJournal,
        mut receivers: HashMap<Topic, broadcast::Receiver<Event>>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let mut take = |topic: Topic| {
            receivers
                .remove(&topic)
                .with_context(|| format!("Missing {topic} receiver"))
        };
        Ok(Self {
            dispatch_rx: take(Topic::Dispatch)?,
            schedule_rx: take(Topic::Schedule)?,
            journal,
            shutdown,
            lost: 0,
        })
    }

    /// Runs until shutdown is signalled or both topics close, then writes
    /// whatever is still buffered. Returns the number of events written.
    pub async fn run(mut self) -> Result<u64> {
        info!(target: "skirmish::journal", path = %self.journal.path().display(), "Journal started");
        let mut dispatch_open = true;
        let mut schedule_open = true;

        while dispatch_open || schedule_open {
            tokio::select! {
                event = self.dispatch_rx.recv(), if dispatch_open => {
                    dispatch_open = self.record(Topic::Dispatch, event)?;
                }
                event = self.schedule_rx.recv(), if schedule_open => {
                    schedule_open = self.record(Topic::Schedule, event)?;
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.drain_buffered()?;
        self.journal.flush()?;

        let written = self.journal.written();
        info!(
            target: "skirmish::journal",
            written,
            lost = self.lost,
            "Journal closed"
        );
        Ok(written)
    }

    /// Returns whether the topic is still open.
    fn record(
        &mut self,
        topic: Topic,
        received: Result<Event, broadcast::error::RecvError>,
    ) -> Result<bool> {
        match received {
            Ok(event) => {
                self.journal.append(&event)?;
                Ok(true)
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(target: "skirmish::journal", %topic, skipped, "Journal fell behind; events lost");
                self.lost += skipped;
                Ok(true)
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!(target: "skirmish::journal", %topic, "Topic closed");
                Ok(false)
            }
        }
    }

    fn drain_buffered(&mut self) -> Result<()> {
        use broadcast::error::TryRecvError;

        for topic in [Topic::Dispatch, Topic::Schedule] {
            loop {
                let rx = match topic {
                    Topic::Dispatch => &mut self.dispatch_rx,
                    Topic::Schedule => &mut self.schedule_rx,
                };
                match rx.try_recv() {
                    Ok(event) => self.journal.append(&event)?,
                    Err(TryRecvError::Lagged(skipped)) => self.lost += skipped,
                    Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runtime::{DispatchEvent, EventBus, ScheduleEvent};
    use tempfile::TempDir;

    fn started(action: &str) -> Event {
        DispatchEvent::ActionStarted {
            action: action.into(),
            depth: 0,
        }
        .into()
    }

    #[test]
    fn journal_lines_read_back_in_order() {
        let dir = TempDir::new().unwrap();
        let mut journal = EventJournal::create(dir.path(), JOURNAL_FILE).unwrap();
        journal.append(&started("PlayCard")).unwrap();
        journal.append(&ScheduleEvent::Paused.into()).unwrap();
        journal.flush().unwrap();

        let raw = std::fs::read_to_string(journal.path()).unwrap();
        assert_eq!(
            raw.lines().next(),
            Some(r#"{"Dispatch":{"ActionStarted":{"action":"PlayCard","depth":0}}}"#)
        );

        let events = read_journal(journal.path()).unwrap();
        assert_eq!(events, vec![started("PlayCard"), ScheduleEvent::Paused.into()]);
        assert_eq!(journal.written(), 2);
    }

    #[test]
    fn create_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        EventJournal::create(dir.path(), JOURNAL_FILE).unwrap();
        assert!(EventJournal::create(dir.path(), JOURNAL_FILE).is_err());
    }

    #[test]
    fn malformed_line_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(JOURNAL_FILE);
        std::fs::write(&path, "\"Paused\"\n{not json}\n").unwrap();

        let err = read_journal(&path).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[tokio::test]
    async fn worker_writes_events_from_both_topics() {
        let dir = TempDir::new().unwrap();
        let bus = EventBus::new();
        let receivers = bus.subscribe_multiple(&[Topic::Dispatch, Topic::Schedule]);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let journal = EventJournal::create(dir.path(), JOURNAL_FILE).unwrap();
        let path = journal.path().to_path_buf();
        let worker = JournalWorker::new(journal, receivers, shutdown_rx).unwrap();

        bus.publish(DispatchEvent::ActionStarted {
            action: "Attack".into(),
            depth: 0,
        });
        bus.publish(ScheduleEvent::Resumed);
        bus.publish(DispatchEvent::ActionCompleted {
            action: "Attack".into(),
            depth: 0,
        });

        let task = tokio::spawn(worker.run());
        shutdown_tx.send(true).unwrap();
        let written = task.await.unwrap().unwrap();

        assert_eq!(written, 3);
        let events = read_journal(&path).unwrap();
        assert_eq!(events.len(), 3);
        assert!(events.contains(&ScheduleEvent::Resumed.into()));
    }

    #[test]
    fn worker_requires_both_topics() {
        let dir = TempDir::new().unwrap();
        let bus = EventBus::new();
        let receivers = bus.subscribe_multiple(&[Topic::Dispatch]);
        let (_tx, rx) = watch::channel(false);
        let journal = EventJournal::create(dir.path(), JOURNAL_FILE).unwrap();

        assert!(JournalWorker::new(journal, receivers, rx).is_err());
    }
}
