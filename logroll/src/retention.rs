//! Retention: bounding how many segments a sink keeps.
//!
//! A pass lists the sink's segments, orders them by sequence number and
//! deletes the oldest ones beyond `max_backups`. Deletions are idempotent
//! (a segment already gone counts as pruned) and best-effort: a failure is
//! recorded in the [`PruneReport`] and the pass moves on.
//!
//! Segments still owned by the archive worker are never touched. If one of
//! them falls in the excess range it is skipped for this pass, and the
//! worker runs another pass once it is done with it. Younger segments are
//! never deleted in its place, so the segments that survive a pass are
//! always the most recent ones.
//!
//! `max_backups == 0` means unbounded retention and every pass is a no-op.

use std::io;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{PruneError, SinkError};
use crate::namer::SegmentNamer;
use crate::segment::{PendingArchives, Segment, SegmentState};
use crate::stats::SinkStats;
use crate::writer::sync_dir;

/// Outcome of one retention pass.
#[derive(Debug, Default)]
pub struct PruneReport {
    /// Segments deleted (or found already deleted).
    pub pruned: Vec<Segment>,
    /// Segments left on disk after the pass.
    pub retained: usize,
    /// Excess segments skipped because compression was still pending.
    pub skipped_pending: usize,
    /// One entry per failed scan or deletion.
    pub errors: Vec<PruneError>,
}

impl PruneReport {
    /// Number of segments deleted.
    pub fn pruned_count(&self) -> usize {
        self.pruned.len()
    }

    /// Returns `true` if every deletion succeeded.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Turns a report with failures into an error.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Prune`] carrying the first recorded failure.
    pub fn into_result(mut self) -> crate::error::Result<Self> {
        if self.errors.is_empty() {
            Ok(self)
        } else {
            Err(SinkError::from(self.errors.remove(0)))
        }
    }
}

/// Enforces the retention cap for one sink.
#[derive(Debug, Clone)]
pub struct RetentionManager {
    namer: SegmentNamer,
    max_backups: usize,
    pending: PendingArchives,
}

impl RetentionManager {
    /// Creates a manager keeping at most `max_backups` segments
    /// (`0` = unbounded).
    pub fn new(namer: SegmentNamer, max_backups: usize, pending: PendingArchives) -> Self {
        Self {
            namer,
            max_backups,
            pending,
        }
    }

    /// The configured cap.
    pub fn max_backups(&self) -> usize {
        self.max_backups
    }

    /// Runs one retention pass.
    pub fn enforce(&self) -> PruneReport {
        let mut report = PruneReport::default();

        if self.max_backups == 0 {
            debug!(dir = %self.namer.dir().display(), "unbounded retention, nothing to prune");
            return report;
        }

        let segments = match self.namer.scan(&self.pending) {
            Ok(segments) => segments,
            Err(e) => {
                let err = PruneError::Scan {
                    dir: self.namer.dir().to_path_buf(),
                    source: e,
                };
                warn!("retention scan failed: {err}");
                report.errors.push(err);
                return report;
            }
        };

        let excess = segments.len().saturating_sub(self.max_backups);
        report.retained = segments.len();

        for segment in segments.into_iter().take(excess) {
            if segment.state == SegmentState::PendingArchive {
                debug!(seq = segment.seq, "segment pending archive, skipping prune");
                report.skipped_pending += 1;
                continue;
            }

            let mut deleted = true;
            for path in segment.paths() {
                if let Err(err) = remove_segment_file(path) {
                    warn!("retention: {err}");
                    report.errors.push(err);
                    deleted = false;
                }
            }

            if deleted {
                debug!(seq = segment.seq, path = %segment.path.display(), "pruned segment");
                report.retained -= 1;
                report.pruned.push(segment);
            }
        }

        if !report.pruned.is_empty()
            && let Err(e) = sync_dir(self.namer.dir())
        {
            warn!("failed to sync '{}' after pruning: {e}", self.namer.dir().display());
        }

        report
    }

    /// Runs one retention pass and adds its outcome to `stats`.
    pub(crate) fn enforce_recorded(&self, stats: &SinkStats) -> PruneReport {
        let report = self.enforce();
        stats.record_pruned(report.pruned_count(), report.errors.len());
        report
    }
}

fn remove_segment_file(path: &Path) -> Result<(), PruneError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PruneError::Delete {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
