//! The rotating sink: the public `write`/`close` surface.
//!
//! # Concurrency
//!
//! All mutable state (active file, accumulated size, lifecycle state,
//! sequence counter) lives in one `SinkInner` behind a single
//! `parking_lot::Mutex`. A `write` takes the lock once and holds it across
//! the size check, the rotation it may trigger and the append, so no caller
//! can observe a half-rotated sink or append to a handle that is about to
//! be renamed. `close`, `flush`, `sync` and manual `rotate` take the same
//! lock.
//!
//! Background archiving and the retention passes it triggers run outside
//! this lock; they coordinate through [`PendingArchives`] instead.
//!
//! # Size policy
//!
//! Rotation happens *before* a write that would push the active file past
//! `max_segment_size`. The active file therefore never exceeds the limit,
//! except when a single write is larger than the limit on its own: such a
//! write lands whole in a fresh file. An empty active file is never rotated
//! into an empty segment.

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::config::SinkConfig;
use crate::error::{Result, SinkError, WriteError};
use crate::namer::SegmentNamer;
use crate::rotate::{Rotator, SinkState};
use crate::segment::{PendingArchives, Segment};
use crate::stats::{SinkStats, StatsSnapshot};
use crate::writer::ActiveFile;

/// A size-rotated, retention-bounded log file.
///
/// `LogSink` is `Send + Sync`; share it between threads with an `Arc`.
///
/// # Example
///
/// ```rust,no_run
/// use logroll::{CompressionMode, LogSink, SinkConfig};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let sink = LogSink::open(
///     SinkConfig::new("./logs/app.log", 1024 * 1024)
///         .with_max_backups(5)
///         .with_compression(CompressionMode::Background),
/// )?;
///
/// sink.write(b"service started\n")?;
/// sink.close()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct LogSink {
    config: SinkConfig,
    namer: SegmentNamer,
    pending: PendingArchives,
    stats: Arc<SinkStats>,
    inner: Mutex<SinkInner>,
}

/// State guarded by the sink's lock.
#[derive(Debug)]
struct SinkInner {
    state: SinkState,
    /// `None` once closed, or after a rotation failed part-way.
    active: Option<ActiveFile>,
    rotator: Rotator,
}

impl LogSink {
    /// Opens or creates the active file and recovers existing segments.
    ///
    /// An existing active file is appended to and its length counts toward
    /// the first rotation. Recovery removes interrupted archives, resumes
    /// the sequence counter after the newest segment, archives plain
    /// segments when compression is enabled and runs one retention pass.
    ///
    /// # Errors
    ///
    /// - [`SinkError::Config`] if the configuration is invalid
    /// - [`SinkError::Open`] if the active file cannot be opened, the
    ///   directory cannot be scanned or the archive worker cannot start
    pub fn open(config: SinkConfig) -> Result<Self> {
        config.validate()?;

        let stats = Arc::new(SinkStats::default());
        let active = ActiveFile::open(&config.base_path)?;
        let mut rotator = Rotator::new(&config, stats.clone())?;
        rotator.recover()?;

        info!(
            path = %config.base_path.display(),
            size = active.size(),
            max_segment_size = config.max_segment_size,
            max_backups = config.max_backups,
            "opened log sink"
        );

        Ok(Self {
            namer: rotator.namer().clone(),
            pending: rotator.pending().clone(),
            config,
            stats,
            inner: Mutex::new(SinkInner {
                state: SinkState::Active,
                active: Some(active),
                rotator,
            }),
        })
    }

    /// Appends `data` to the active file, rotating first if it would
    /// overflow the segment size.
    ///
    /// Returns the number of bytes written, which is `data.len()` on
    /// success. Record framing is the caller's concern: the sink never
    /// splits or joins writes.
    ///
    /// # Errors
    ///
    /// - [`SinkError::Closed`] after `close()` or a failed rotation
    /// - [`SinkError::Rotate`] if the rotation this write triggered failed;
    ///   nothing was appended and the sink is now closed
    /// - [`SinkError::Write`] if the append failed; the sink stays active
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        self.inner.lock().write(data, &self.config, &self.stats)
    }

    /// Rotates the active file now, regardless of its size.
    ///
    /// Returns `false` without rotating if the active file is empty.
    ///
    /// # Errors
    ///
    /// - [`SinkError::Closed`] if the sink is closed
    /// - [`SinkError::Rotate`] if rotation failed; the sink is now closed
    pub fn rotate(&self) -> Result<bool> {
        let mut inner = self.inner.lock();
        let active = inner.active_mut()?;
        if active.size() == 0 {
            return Ok(false);
        }
        inner.rotate()?;
        Ok(true)
    }

    /// Flushes the active file.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Closed`] or [`SinkError::Write`].
    pub fn flush(&self) -> Result<()> {
        self.inner.lock().active_mut()?.flush()
    }

    /// Flushes and fsyncs the active file.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Closed`] or [`SinkError::Write`].
    pub fn sync(&self) -> Result<()> {
        self.inner.lock().active_mut()?.sync()
    }

    /// Flushes and releases the active file and waits for background
    /// archiving to finish.
    ///
    /// Closing an already closed sink is a no-op that returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Write`] if the final flush or fsync failed. The
    /// sink is closed either way.
    pub fn close(&self) -> Result<()> {
        self.inner.lock().close()
    }

    /// Bytes in the active file, or 0 once closed.
    pub fn current_size(&self) -> u64 {
        self.inner.lock().active.as_ref().map_or(0, ActiveFile::size)
    }

    /// Lifecycle state.
    pub fn state(&self) -> SinkState {
        self.inner.lock().state
    }

    /// Lists retired segments, oldest first.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the directory cannot be read.
    pub fn segments(&self) -> io::Result<Vec<Segment>> {
        self.namer.scan(&self.pending)
    }

    /// Counters for rotation, archiving and retention.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// The configuration this sink was opened with.
    pub fn config(&self) -> &SinkConfig {
        &self.config
    }
}

impl SinkInner {
    fn active_mut(&mut self) -> Result<&mut ActiveFile> {
        match (self.state, self.active.as_mut()) {
            (SinkState::Active, Some(active)) => Ok(active),
            _ => Err(SinkError::Closed),
        }
    }

    fn write(&mut self, data: &[u8], config: &SinkConfig, stats: &SinkStats) -> Result<usize> {
        let current = self.active_mut()?.size();
        if data.is_empty() {
            return Ok(0);
        }

        if current > 0 && current + data.len() as u64 > config.max_segment_size {
            self.rotate()?;
        }

        let active = self.active_mut()?;
        let written = active.append(data)?;
        if config.sync_on_write {
            active.sync()?;
        }

        stats.record_write(written);
        Ok(written)
    }

    fn rotate(&mut self) -> Result<()> {
        let Some(active) = self.active.take() else {
            return Err(SinkError::Closed);
        };

        self.state = SinkState::Rotating;
        match self.rotator.rotate(active) {
            Ok(fresh) => {
                self.active = Some(fresh);
                self.state = SinkState::Active;
                Ok(())
            }
            Err(e) => {
                self.state = SinkState::Closed;
                error!("rotation failed, sink closed until reopened: {e}");
                Err(e)
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        let result = match self.active.take() {
            Some(active) => {
                let path = active.path().to_path_buf();
                active
                    .close()
                    .map_err(|e| SinkError::from(WriteError::Sync { path, source: e }))
            }
            None => Ok(()),
        };

        self.state = SinkState::Closed;
        self.rotator.shutdown();
        result
    }
}

impl Drop for LogSink {
    fn drop(&mut self) {
        if let Err(e) = self.inner.get_mut().close() {
            warn!("failed to close log sink on drop: {e}");
        }
    }
}

impl io::Write for &LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        LogSink::write(self, buf).map_err(io::Error::other)
    }

    fn flush(&mut self) -> io::Result<()> {
        LogSink::flush(self).map_err(io::Error::other)
    }
}

impl io::Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        LogSink::write(self, buf).map_err(io::Error::other)
    }

    fn flush(&mut self) -> io::Result<()> {
        LogSink::flush(self).map_err(io::Error::other)
    }
}
