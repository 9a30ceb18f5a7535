//! Visual progress collaborator for scheduled entries.

use crate::config::TrackExtents;

/// Handle to an external visual (a timeline slot, a cast bar) that tracks one
/// scheduled entry.
///
/// The scheduler never inspects the handle. It pushes progress while the
/// clock runs and calls [`release`](Self::release) exactly once before the
/// entry is dropped, whether the entry ran or was cancelled.
pub trait ProgressHandle: Send + Sync {
    /// `progress` is the elapsed fraction of the entry's duration, clamped to
    /// `[0, 1]`: 0.0 when just scheduled, 1.0 when due.
    fn update(&self, progress: f32, track: TrackExtents);

    fn release(&self);
}
