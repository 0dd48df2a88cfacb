//! Rotation: retiring the active file as a segment and starting a new one.
//!
//! # Protocol
//!
//! 1. Flush, fsync and close the active file.
//! 2. Take the next sequence number and compute the segment path.
//! 3. Rename the active file to the segment path. `rename(2)` is atomic on
//!    one filesystem and fails with `EXDEV` across devices; there is no
//!    copy-and-delete fallback. An existing file at the segment path is
//!    never overwritten.
//! 4. Create a fresh, empty active file at the base path.
//! 5. Archive the segment: inline, or on the archive worker.
//! 6. Run a retention pass.
//!
//! A failure in steps 1-4 aborts the rotation and the sink moves to
//! [`SinkState::Closed`]. Failures in steps 5-6 are logged and counted only.

use std::fs;
use std::io;
use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::compress::{ArchiveWorker, archive_segment};
use crate::config::{CompressionMode, SinkConfig};
use crate::error::{OpenError, Result, RotateError};
use crate::namer::{SegmentNamer, next_seq};
use crate::retention::RetentionManager;
use crate::segment::{PendingArchives, Segment, SegmentState};
use crate::stats::SinkStats;
use crate::writer::{ActiveFile, sync_dir};

/// Lifecycle state of a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkState {
    /// Accepting writes.
    Active,
    /// Between closing the old active file and opening the new one. Only
    /// ever seen from inside the sink's lock.
    Rotating,
    /// No further writes are accepted.
    Closed,
}

/// Owns everything rotation needs besides the active file itself.
#[derive(Debug)]
pub(crate) struct Rotator {
    namer: SegmentNamer,
    next_seq: u64,
    compression: CompressionMode,
    pending: PendingArchives,
    retention: RetentionManager,
    worker: Option<ArchiveWorker>,
    stats: Arc<SinkStats>,
}

impl Rotator {
    /// Builds the rotator for `config`, starting the archive worker when
    /// background compression is configured.
    pub(crate) fn new(config: &SinkConfig, stats: Arc<SinkStats>) -> Result<Self> {
        let namer = SegmentNamer::new(&config.base_path, config.naming);
        let pending = PendingArchives::new();
        let retention = RetentionManager::new(namer.clone(), config.max_backups, pending.clone());

        let worker = if config.compression == CompressionMode::Background {
            let worker = ArchiveWorker::spawn(retention.clone(), pending.clone(), stats.clone())
                .map_err(|e| OpenError::ArchiveWorker { source: e })?;
            Some(worker)
        } else {
            None
        };

        Ok(Self {
            namer,
            next_seq: 1,
            compression: config.compression,
            pending,
            retention,
            worker,
            stats,
        })
    }

    pub(crate) fn namer(&self) -> &SegmentNamer {
        &self.namer
    }

    pub(crate) fn pending(&self) -> &PendingArchives {
        &self.pending
    }

    /// Brings on-disk segments to a consistent state after a restart and
    /// resumes the sequence counter after the newest one.
    pub(crate) fn recover(&mut self) -> Result<()> {
        let scan_error = |e: io::Error| OpenError::Scan {
            dir: self.namer.dir().to_path_buf(),
            source: e,
        };

        for tmp in self.namer.scan_temp_files().map_err(scan_error)? {
            match fs::remove_file(&tmp) {
                Ok(()) => debug!(path = %tmp.display(), "removed interrupted archive"),
                Err(e) => warn!("failed to remove interrupted archive '{}': {e}", tmp.display()),
            }
        }

        let segments = self.namer.scan(&self.pending).map_err(scan_error)?;
        self.next_seq = next_seq(&segments);

        for pair in segments.windows(2) {
            if pair[0].seq == pair[1].seq {
                warn!(
                    seq = pair[0].seq,
                    "segments '{}' and '{}' share a sequence number, keeping both",
                    pair[0].path.display(),
                    pair[1].path.display()
                );
            }
        }

        for segment in &segments {
            if let Some(leftover) = &segment.leftover {
                // The archive was renamed into place, so it is complete.
                match fs::remove_file(leftover) {
                    Ok(()) => debug!(path = %leftover.display(), "removed archived leftover"),
                    Err(e) => warn!("failed to remove '{}': {e}", leftover.display()),
                }
            }
        }

        if self.compression.is_enabled() {
            for segment in segments.into_iter().filter(|s| !s.compressed) {
                self.archive(segment);
            }
        }

        self.retention.enforce_recorded(&self.stats);
        Ok(())
    }

    /// Retires `active` as the next segment and returns the fresh active file.
    ///
    /// `active` is consumed; on error there is no open active file left.
    pub(crate) fn rotate(&mut self, active: ActiveFile) -> Result<ActiveFile> {
        let base_path = active.path().to_path_buf();
        let size = active.size();

        active.close().map_err(|e| RotateError::CloseActive {
            path: base_path.clone(),
            source: e,
        })?;

        let seq = self.next_seq;
        let segment_path = self.namer.segment_path(seq, SystemTime::now());
        if fs::symlink_metadata(&segment_path).is_ok() {
            return Err(RotateError::SegmentExists { path: segment_path }.into());
        }

        fs::rename(&base_path, &segment_path).map_err(|e| RotateError::Rename {
            from: base_path.clone(),
            to: segment_path.clone(),
            source: e,
        })?;
        self.next_seq += 1;

        if let Err(e) = sync_dir(self.namer.dir()) {
            warn!("failed to sync '{}' after rotation: {e}", self.namer.dir().display());
        }

        let fresh = ActiveFile::create_fresh(&base_path).map_err(|e| RotateError::Reopen {
            path: base_path.clone(),
            source: e,
        })?;

        self.stats.record_rotation();
        info!(seq, size, path = %segment_path.display(), "rotated active file");

        self.archive(Segment {
            path: segment_path,
            seq,
            compressed: false,
            size,
            state: SegmentState::Plain,
            leftover: None,
        });
        self.retention.enforce_recorded(&self.stats);

        Ok(fresh)
    }

    fn archive(&self, segment: Segment) {
        match (self.compression, &self.worker) {
            (CompressionMode::Disabled, _) => {}
            (CompressionMode::Background, Some(worker)) => {
                if let Err(segment) = worker.submit(segment) {
                    warn!(seq = segment.seq, "archive worker unavailable, compressing inline");
                    archive_segment(&segment, &self.stats);
                }
            }
            (CompressionMode::Inline | CompressionMode::Background, _) => {
                archive_segment(&segment, &self.stats);
            }
        }
    }

    /// Stops the archive worker after it has drained its queue.
    pub(crate) fn shutdown(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.shutdown();
        }
    }
}
