//! Error types for the logroll rotating sink.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for all sink operations.
///
/// Only [`SinkError::Open`], [`SinkError::Write`], [`SinkError::Rotate`],
/// [`SinkError::Config`] and [`SinkError::Closed`] are ever returned from the
/// write path. Compression and prune failures are reported through logs,
/// [`crate::stats::SinkStats`] and [`crate::retention::PruneReport`]; a
/// standalone retention pass turns its report into [`SinkError::Prune`] with
/// [`crate::retention::PruneReport::into_result`].
#[derive(Error, Debug)]
pub enum SinkError {
    /// The active file could not be opened when constructing the sink.
    #[error("open error: {0}")]
    Open(#[from] OpenError),

    /// Appending to the active file failed.
    #[error("write error: {0}")]
    Write(#[from] WriteError),

    /// Rotation failed; the sink is closed until it is reopened.
    #[error("rotate error: {0}")]
    Rotate(#[from] RotateError),

    /// Archiving a retired segment failed.
    #[error("compress error: {0}")]
    Compress(#[from] CompressError),

    /// Enforcing the retention cap failed.
    #[error("prune error: {0}")]
    Prune(#[from] PruneError),

    /// The sink configuration is invalid or could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The sink has been closed, either by `close()` or by a failed rotation.
    #[error("sink is closed")]
    Closed,
}

/// Errors that can occur when opening the active file.
#[derive(Error, Debug)]
pub enum OpenError {
    /// The parent directory could not be created.
    #[error("failed to create directory '{}': {source}", path.display())]
    CreateDir {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The active file could not be opened or created.
    #[error("failed to open active file '{}': {source}", path.display())]
    ActiveFile {
        /// The active file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The background archive thread could not be started.
    #[error("failed to start archive worker: {source}")]
    ArchiveWorker {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Existing segments could not be listed while recovering state.
    #[error("failed to scan segments in '{}': {source}", dir.display())]
    Scan {
        /// The directory being scanned.
        dir: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while appending to the active file.
#[derive(Error, Debug)]
pub enum WriteError {
    /// The OS rejected the write.
    #[error("failed to write '{}' after {written} of {requested} bytes: {source}", path.display())]
    Io {
        /// The active file path.
        path: PathBuf,
        /// Bytes that reached the file before the failure.
        written: usize,
        /// Bytes the caller asked to write.
        requested: usize,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The OS accepted zero bytes before the record was complete.
    #[error("short write to '{}': {written} of {requested} bytes", path.display())]
    ShortWrite {
        /// The active file path.
        path: PathBuf,
        /// Bytes that reached the file.
        written: usize,
        /// Bytes the caller asked to write.
        requested: usize,
    },

    /// Flushing the active file failed.
    #[error("failed to flush '{}': {source}", path.display())]
    Flush {
        /// The active file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Syncing the active file to disk failed.
    #[error("failed to sync '{}' to disk: {source}", path.display())]
    Sync {
        /// The active file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while rotating the active file into a segment.
#[derive(Error, Debug)]
pub enum RotateError {
    /// Flushing or syncing the active file before the rename failed.
    #[error("failed to close active file '{}': {source}", path.display())]
    CloseActive {
        /// The active file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The computed segment path is already taken.
    #[error("segment '{}' already exists; refusing to overwrite", path.display())]
    SegmentExists {
        /// The conflicting segment path.
        path: PathBuf,
    },

    /// Renaming the active file to its segment path failed.
    ///
    /// Cross-device renames surface here; the sink never falls back to
    /// copy and delete.
    #[error("failed to rename '{}' to '{}': {source}", from.display(), to.display())]
    Rename {
        /// The active file path.
        from: PathBuf,
        /// The segment path.
        to: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Creating the fresh active file failed.
    #[error("failed to reopen active file '{}': {source}", path.display())]
    Reopen {
        /// The active file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while compressing a retired segment.
#[derive(Error, Debug)]
pub enum CompressError {
    /// Reading, encoding or persisting the archive failed.
    #[error("failed to compress segment '{}': {source}", path.display())]
    Io {
        /// The segment being compressed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The archive was written but the plain source could not be removed.
    #[error("compressed '{}' but failed to remove source: {source}", path.display())]
    RemoveSource {
        /// The plain segment path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Reading a segment back failed.
    #[error("failed to read segment '{}': {source}", path.display())]
    Read {
        /// The segment path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while enforcing retention.
#[derive(Error, Debug)]
pub enum PruneError {
    /// The segment directory could not be listed.
    #[error("failed to scan segments in '{}': {source}", dir.display())]
    Scan {
        /// The directory being scanned.
        dir: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A segment could not be deleted.
    #[error("failed to delete segment '{}': {source}", path.display())]
    Delete {
        /// The segment path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur when validating or loading a sink configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `max_segment_size` must be positive.
    #[error("max_segment_size must be > 0")]
    ZeroSegmentSize,

    /// `base_path` must name a file.
    #[error("base_path must name a file, got '{}'", path.display())]
    InvalidBasePath {
        /// The rejected path.
        path: PathBuf,
    },

    /// The configuration file could not be read.
    #[error("failed to read config '{}': {source}", path.display())]
    Load {
        /// The config file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`crate::SinkConfig`].
    #[error("failed to parse config '{}': {source}", path.display())]
    Parse {
        /// The config file path.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Type alias for `Result<T, SinkError>`.
pub type Result<T> = std::result::Result<T, SinkError>;
