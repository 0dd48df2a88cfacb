//! Counters for the sink's background and failure paths.
//!
//! Compression and prune errors never reach the caller of `write`; these
//! counters, along with `tracing` events, are how they become visible.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters shared by the sink, its rotator and its archive worker.
#[derive(Debug, Default)]
pub struct SinkStats {
    rotations: AtomicU64,
    bytes_written: AtomicU64,
    compressed: AtomicU64,
    compress_failures: AtomicU64,
    pruned: AtomicU64,
    prune_failures: AtomicU64,
}

/// Point-in-time copy of [`SinkStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Completed rotations.
    pub rotations: u64,
    /// Bytes accepted by `write` since the sink was opened.
    pub bytes_written: u64,
    /// Segments archived successfully.
    pub compressed: u64,
    /// Segments left uncompressed because archiving failed.
    pub compress_failures: u64,
    /// Segments deleted by retention.
    pub pruned: u64,
    /// Segment deletions that failed.
    pub prune_failures: u64,
}

impl SinkStats {
    pub(crate) fn record_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self, bytes: usize) {
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_compressed(&self) {
        self.compressed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_compress_failure(&self) {
        self.compress_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pruned(&self, count: usize, failures: usize) {
        self.pruned.fetch_add(count as u64, Ordering::Relaxed);
        self.prune_failures.fetch_add(failures as u64, Ordering::Relaxed);
    }

    /// Reads all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            rotations: self.rotations.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            compressed: self.compressed.load(Ordering::Relaxed),
            compress_failures: self.compress_failures.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
            prune_failures: self.prune_failures.load(Ordering::Relaxed),
        }
    }
}
