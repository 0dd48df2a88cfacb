//! # logroll
//!
//! Size-rotated, retention-bounded log file sink.
//!
//! logroll is the file-rotation primitive a logging facade sits on top of:
//! callers hand it fully formatted byte records, and it appends them to an
//! active file, retires that file as a numbered segment when it would grow
//! past a size limit, optionally archives retired segments with Snappy, and
//! deletes the oldest segments beyond a retention cap. It does no
//! formatting, has no severity levels and ships nothing anywhere.
//!
//! ## Key Properties
//!
//! - Rotate-before-overshoot: the active file never exceeds the size limit,
//!   except for a single write that is larger than the limit on its own
//! - One lock per sink covers check, rotate and append, so concurrent
//!   writers never interleave or observe a half-rotated file
//! - Segment order comes from a per-sink sequence number in the file name,
//!   never from modification times
//! - Archives are durable before their source is removed; a crash leaves
//!   the original intact
//! - Compression and pruning failures are logged and counted, never
//!   returned from `write`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use logroll::{CompressionMode, LogSink, SinkConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Rotate at 10 MiB, keep the 7 newest segments, archive in the background
//! let config = SinkConfig::new("./logs/app.log", 10 * 1024 * 1024)
//!     .with_max_backups(7)
//!     .with_compression(CompressionMode::Background);
//!
//! let sink = LogSink::open(config)?;
//! sink.write(b"2024-01-01T00:00:00Z INFO started\n")?;
//!
//! for segment in sink.segments()? {
//!     println!("{} ({} bytes)", segment.path.display(), segment.size);
//! }
//!
//! sink.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`LogSink`] — Public handle; the lock around write, rotate and close
//! - [`SinkConfig`] — Base path, size limit, retention cap, compression mode
//! - [`Segment`] — A retired file with its sequence number and archive state
//! - [`RetentionManager`] — Deletes the oldest segments beyond the cap
//! - [`Compressor`] — Streams a segment into a Snappy-framed archive
//!
//! ## Modules
//!
//! - [`sink`] — Sink lifecycle, write path, concurrency guard
//! - [`rotate`] — Rotation protocol and sink state machine
//! - [`writer`] — Active file handle and size accounting
//! - [`namer`] — Segment naming, parsing and directory scans
//! - [`segment`] — Segment metadata and the pending-archive set
//! - [`compress`] — Snappy archiving and the background archive worker
//! - [`retention`] — Retention passes and prune reports
//! - [`config`] — Sink configuration
//! - [`stats`] — Counters for rotation, archiving and pruning
//! - [`error`] — Error types

pub mod compress;
pub mod config;
pub mod error;
pub mod namer;
pub mod retention;
pub mod rotate;
pub mod segment;
pub mod sink;
pub mod stats;
pub mod writer;

pub use compress::{Compressor, open_segment, read_segment};
pub use config::{CompressionMode, NamingScheme, SinkConfig};
pub use error::{Result, SinkError};
pub use retention::{PruneReport, RetentionManager};
pub use rotate::SinkState;
pub use segment::{PendingArchives, Segment, SegmentState};
pub use sink::LogSink;
pub use stats::StatsSnapshot;
