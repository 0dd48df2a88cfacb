//! Sink configuration.
//!
//! A [`SinkConfig`] is the only input needed to construct a
//! [`LogSink`](crate::LogSink). It derives serde so any external loader
//! (YAML, TOML, environment) can produce one; [`SinkConfig::load`] covers
//! the plain JSON case.
//!
//! # Example
//!
//! ```rust
//! use logroll::{CompressionMode, SinkConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SinkConfig::new("/var/log/app/app.log", 10 * 1024 * 1024)
//!     .with_max_backups(7)
//!     .with_compression(CompressionMode::Background);
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// How retired segments are archived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionMode {
    /// Segments stay uncompressed.
    #[default]
    Disabled,
    /// Segments are compressed on the rotation path, while writers wait.
    Inline,
    /// Segments are handed to a per-sink archive thread.
    Background,
}

impl CompressionMode {
    /// Returns `true` unless compression is disabled.
    pub fn is_enabled(self) -> bool {
        self != Self::Disabled
    }
}

/// Naming scheme for retired segments.
///
/// Both schemes embed a zero-padded per-sink sequence number, which is the
/// only ordering key. The timestamp variant only makes names easier for an
/// operator to read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingScheme {
    /// `{base_path}.{seq:06}`
    #[default]
    Sequence,
    /// `{base_path}.{seq:06}-{unix_seconds}`
    SequenceTimestamp,
}

/// Configuration for one rotating sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Path of the active file. Segments are created next to it.
    pub base_path: PathBuf,

    /// Size in bytes above which the active file is rotated.
    ///
    /// A write that would push the active file past this size rotates first.
    /// A single write larger than this is still written whole.
    pub max_segment_size: u64,

    /// Number of retired segments to keep.
    ///
    /// `0` means unbounded retention: nothing is ever pruned.
    #[serde(default)]
    pub max_backups: usize,

    /// Archiving of retired segments.
    #[serde(default)]
    pub compression: CompressionMode,

    /// How segment names are built.
    #[serde(default)]
    pub naming: NamingScheme,

    /// Fsync the active file after every write.
    #[serde(default)]
    pub sync_on_write: bool,
}

impl SinkConfig {
    /// Creates a configuration with unbounded retention and no compression.
    pub fn new<P: Into<PathBuf>>(base_path: P, max_segment_size: u64) -> Self {
        Self {
            base_path: base_path.into(),
            max_segment_size,
            max_backups: 0,
            compression: CompressionMode::Disabled,
            naming: NamingScheme::Sequence,
            sync_on_write: false,
        }
    }

    /// Sets the retention cap (`0` = unbounded).
    #[must_use]
    pub fn with_max_backups(mut self, max_backups: usize) -> Self {
        self.max_backups = max_backups;
        self
    }

    /// Sets the compression mode.
    #[must_use]
    pub fn with_compression(mut self, compression: CompressionMode) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the segment naming scheme.
    #[must_use]
    pub fn with_naming(mut self, naming: NamingScheme) -> Self {
        self.naming = naming;
        self
    }

    /// Enables or disables fsync after every write.
    #[must_use]
    pub fn with_sync_on_write(mut self, sync_on_write: bool) -> Self {
        self.sync_on_write = sync_on_write;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::ZeroSegmentSize`] if `max_segment_size` is 0
    /// - [`ConfigError::InvalidBasePath`] if `base_path` has no file name
    pub fn validate(&self) -> Result<()> {
        if self.max_segment_size == 0 {
            return Err(ConfigError::ZeroSegmentSize.into());
        }

        if self.base_path.file_name().is_none() {
            return Err(ConfigError::InvalidBasePath {
                path: self.base_path.clone(),
            }
            .into());
        }

        Ok(())
    }

    /// Loads and validates a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] or [`ConfigError::Parse`] if the file
    /// cannot be read or decoded, or a validation error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&data).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }
}
