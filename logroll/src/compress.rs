//! Archiving retired segments with Snappy.
//!
//! A segment is streamed through the Snappy frame format into
//! `{segment}.sz.tmp`, which is fsynced and renamed to `{segment}.sz`. Only
//! after the directory entry is durable is the plain segment removed. A
//! crash at any point leaves either the intact original, or the original
//! plus a finished archive (collapsed by the next scan), plus at most one
//! `.tmp` file that the next open discards.
//!
//! Compression runs either inline on the rotation path or on the sink's
//! [`ArchiveWorker`] thread. Failures are never fatal: the plain segment
//! stays where it is.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use snap::read::FrameDecoder;
use snap::write::FrameEncoder;
use tracing::{debug, info, warn};

use crate::error::{CompressError, Result};
use crate::namer::{compressed_path, temp_path};
use crate::retention::RetentionManager;
use crate::segment::{PendingArchives, Segment, SegmentState};
use crate::stats::SinkStats;
use crate::writer::sync_dir;

/// Streams segments into Snappy-framed archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct Compressor;

impl Compressor {
    /// Creates a compressor.
    pub fn new() -> Self {
        Self
    }

    /// Compresses `segment` and removes the plain file.
    ///
    /// Returns the archived segment. An already compressed segment is
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// - [`CompressError::Io`] if the archive could not be written; the
    ///   plain segment is untouched and no archive is left behind
    /// - [`CompressError::RemoveSource`] if the archive is durable but the
    ///   plain file could not be removed
    pub fn compress(&self, segment: &Segment) -> Result<Segment> {
        if segment.compressed {
            return Ok(segment.clone());
        }

        let dest = compressed_path(&segment.path);
        let tmp = temp_path(&dest);

        let persisted = write_archive(&segment.path, &tmp)
            .and_then(|()| fs::rename(&tmp, &dest))
            .and_then(|()| sync_dir(parent_dir(&dest)));
        if let Err(e) = persisted {
            // Best effort: a leftover .tmp is discarded on the next open.
            let _ = fs::remove_file(&tmp);
            return Err(CompressError::Io {
                path: segment.path.clone(),
                source: e,
            }
            .into());
        }

        let size = fs::metadata(&dest)
            .map_err(|e| CompressError::Io {
                path: dest.clone(),
                source: e,
            })?
            .len();

        fs::remove_file(&segment.path).map_err(|e| CompressError::RemoveSource {
            path: segment.path.clone(),
            source: e,
        })?;

        Ok(Segment {
            path: dest,
            seq: segment.seq,
            compressed: true,
            size,
            state: SegmentState::Archived,
            leftover: None,
        })
    }
}

fn write_archive(src: &Path, tmp: &Path) -> io::Result<()> {
    let mut reader = BufReader::new(File::open(src)?);
    let mut encoder = FrameEncoder::new(File::create(tmp)?);
    io::copy(&mut reader, &mut encoder)?;

    let file = encoder
        .into_inner()
        .map_err(|e| io::Error::new(e.error().kind(), e.error().to_string()))?;
    file.sync_all()
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Opens a segment for reading, decompressing archived segments on the fly.
///
/// # Errors
///
/// Returns [`CompressError::Read`] if the file cannot be opened.
pub fn open_segment(segment: &Segment) -> Result<Box<dyn Read + Send>> {
    let file = File::open(&segment.path).map_err(|e| CompressError::Read {
        path: segment.path.clone(),
        source: e,
    })?;

    if segment.compressed {
        Ok(Box::new(FrameDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Reads a segment's original bytes.
///
/// # Errors
///
/// Returns [`CompressError::Read`] if the file cannot be read or is not a
/// valid Snappy frame stream.
pub fn read_segment(segment: &Segment) -> Result<Vec<u8>> {
    let mut reader = open_segment(segment)?;
    let mut data = Vec::new();
    reader
        .read_to_end(&mut data)
        .map_err(|e| CompressError::Read {
            path: segment.path.clone(),
            source: e,
        })?;
    Ok(data)
}

/// Compresses a segment, logging and counting the outcome.
///
/// Returns the archived segment, or `None` if the plain segment was kept.
pub(crate) fn archive_segment(segment: &Segment, stats: &SinkStats) -> Option<Segment> {
    match Compressor::new().compress(segment) {
        Ok(archived) => {
            info!(
                seq = archived.seq,
                path = %archived.path.display(),
                original = segment.size,
                compressed = archived.size,
                "archived segment"
            );
            stats.record_compressed();
            Some(archived)
        }
        Err(e) => {
            warn!(seq = segment.seq, "keeping segment uncompressed: {e}");
            stats.record_compress_failure();
            None
        }
    }
}

/// Background thread that compresses segments handed over by the rotator.
///
/// Each submitted segment is marked pending until its compression is over,
/// then a retention pass runs to catch up on anything skipped meanwhile.
#[derive(Debug)]
pub(crate) struct ArchiveWorker {
    sender: Option<Sender<Segment>>,
    handle: Option<JoinHandle<()>>,
    pending: PendingArchives,
}

impl ArchiveWorker {
    /// Starts the worker thread.
    pub(crate) fn spawn(
        retention: RetentionManager,
        pending: PendingArchives,
        stats: Arc<SinkStats>,
    ) -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Segment>();
        let worker_pending = pending.clone();

        let handle = thread::Builder::new()
            .name("logroll-archive".to_string())
            .spawn(move || {
                for segment in receiver {
                    archive_segment(&segment, &stats);
                    worker_pending.finish(segment.seq);
                    retention.enforce_recorded(&stats);
                }
                debug!("archive worker drained");
            })?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
            pending,
        })
    }

    /// Queues a segment, marking it pending first.
    ///
    /// Hands the segment back if the worker is gone.
    pub(crate) fn submit(&self, segment: Segment) -> std::result::Result<(), Segment> {
        let Some(sender) = &self.sender else {
            return Err(segment);
        };

        let seq = segment.seq;
        self.pending.insert(seq);
        sender.send(segment).map_err(|mpsc::SendError(segment)| {
            self.pending.finish(seq);
            segment
        })
    }

    /// Stops accepting work and waits for queued segments to finish.
    pub(crate) fn shutdown(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("archive worker panicked");
        }
    }
}

impl Drop for ArchiveWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
