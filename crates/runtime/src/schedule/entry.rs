use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::progress::ProgressHandle;
use crate::action::Action;

/// Identifier of a scheduled entry.
///
/// Ids increase monotonically per scheduler, so they also encode insertion
/// order, which breaks ties between equal countdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) struct ScheduledEntry {
    pub(crate) id: EntryId,
    pub(crate) action: Arc<dyn Action>,
    /// Seconds left; at or below zero means due.
    pub(crate) countdown: f32,
    /// Countdown at scheduling time.
    pub(crate) total: f32,
    pub(crate) progress: Option<Arc<dyn ProgressHandle>>,
}

impl ScheduledEntry {
    pub(crate) fn is_due(&self) -> bool {
        self.countdown <= 0.0
    }

    /// Elapsed fraction of the entry's duration in `[0, 1]`.
    pub(crate) fn progress_fraction(&self) -> f32 {
        if self.total <= 0.0 {
            return 1.0;
        }
        (1.0 - self.countdown / self.total).clamp(0.0, 1.0)
    }

    pub(crate) fn release(&self) {
        if let Some(handle) = &self.progress {
            handle.release();
        }
    }
}

/// Ascending countdown, then insertion order.
pub(crate) fn sort_entries(entries: &mut [ScheduledEntry]) {
    entries.sort_by(|a, b| {
        a.countdown
            .total_cmp(&b.countdown)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Tick;
    impl Action for Tick {}

    fn entry(id: u64, countdown: f32) -> ScheduledEntry {
        ScheduledEntry {
            id: EntryId(id),
            action: Arc::new(Tick),
            countdown,
            total: countdown,
            progress: None,
        }
    }

    #[test]
    fn sorts_by_countdown_then_insertion() {
        let mut entries = vec![entry(1, 2.0), entry(2, 0.5), entry(3, 2.0), entry(4, -1.0)];
        sort_entries(&mut entries);
        let order: Vec<u64> = entries.iter().map(|e| e.id.0).collect();
        assert_eq!(order, [4, 2, 1, 3]);
    }

    #[test]
    fn progress_grows_toward_due() {
        let mut e = entry(1, 4.0);
        assert_eq!(e.progress_fraction(), 0.0);
        e.countdown = 1.0;
        assert_eq!(e.progress_fraction(), 0.75);
        e.countdown = -2.0;
        assert_eq!(e.progress_fraction(), 1.0);
        assert!(e.is_due());

        assert_eq!(entry(2, 0.0).progress_fraction(), 1.0);
    }
}
