//! Retired segment metadata and the pending-archive set.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

/// Archive state of a retired segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentState {
    /// Queued for background compression. Retention must not touch it.
    PendingArchive,
    /// Compressed and final.
    Archived,
    /// Uncompressed and final, either by configuration or because
    /// compression failed.
    Plain,
}

/// A retired (non-active) file produced by one rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    /// Current on-disk path.
    pub path: PathBuf,
    /// Per-sink sequence number; the only ordering key.
    pub seq: u64,
    /// Whether `path` holds Snappy-framed data.
    pub compressed: bool,
    /// Size of `path` in bytes.
    pub size: u64,
    /// Archive state at the time this value was produced.
    pub state: SegmentState,
    /// Uncompressed file left next to a finished archive by an interrupted
    /// compression. Removed together with the segment.
    #[serde(skip)]
    pub(crate) leftover: Option<PathBuf>,
}

impl Segment {
    /// Every path that belongs to this segment on disk.
    pub(crate) fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        std::iter::once(&self.path).chain(self.leftover.iter())
    }
}

/// Sequence numbers of segments currently owned by the archive worker.
///
/// Shared between the rotation path, the archive worker and retention.
#[derive(Debug, Clone, Default)]
pub struct PendingArchives {
    inner: Arc<Mutex<BTreeSet<u64>>>,
}

impl PendingArchives {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a segment as pending compression.
    pub fn insert(&self, seq: u64) {
        self.inner.lock().insert(seq);
    }

    /// Marks a segment as no longer pending.
    pub fn finish(&self, seq: u64) {
        self.inner.lock().remove(&seq);
    }

    /// Returns `true` if the segment is queued or being compressed.
    pub fn contains(&self, seq: u64) -> bool {
        self.inner.lock().contains(&seq)
    }

    /// Number of pending segments.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
