//! Segment naming and discovery.
//!
//! Every retired segment of a sink lives next to the active file and embeds
//! a per-sink sequence number in its name:
//!
//! ```text
//! logs/
//! ├── app.log                      <- active file (base_path)
//! ├── app.log.000001.sz            <- oldest segment, compressed
//! ├── app.log.000002.sz
//! ├── app.log.000003               <- newest segment, not yet compressed
//! └── app.log.000003.sz.tmp        <- compression in flight, never a segment
//! ```
//!
//! With [`NamingScheme::SequenceTimestamp`] names look like
//! `app.log.000003-1700000000`. Ordering always uses the parsed sequence
//! number, compared numerically, so it survives more than 999 999 rotations
//! and is independent of file modification times.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::NamingScheme;
use crate::segment::{PendingArchives, Segment, SegmentState};

/// Suffix appended to compressed segments.
pub const COMPRESSED_SUFFIX: &str = ".sz";

/// Suffix appended to archives while they are being written.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Width of the zero-padded sequence number.
const SEQ_WIDTH: usize = 6;

/// Name fields recovered from a segment file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedName {
    /// Sequence number.
    pub seq: u64,
    /// Whether the name carries the compression suffix.
    pub compressed: bool,
}

/// Computes and recognises segment names for one sink.
#[derive(Debug, Clone)]
pub struct SegmentNamer {
    dir: PathBuf,
    file_name: String,
    scheme: NamingScheme,
}

impl SegmentNamer {
    /// Creates a namer for the sink whose active file is `base_path`.
    pub fn new(base_path: &Path, scheme: NamingScheme) -> Self {
        let dir = match base_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = base_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            dir,
            file_name,
            scheme,
        }
    }

    /// Directory holding the active file and its segments.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the (uncompressed) segment with sequence number `seq`.
    pub fn segment_path(&self, seq: u64, now: SystemTime) -> PathBuf {
        let name = match self.scheme {
            NamingScheme::Sequence => {
                format!("{}.{seq:0width$}", self.file_name, width = SEQ_WIDTH)
            }
            NamingScheme::SequenceTimestamp => {
                let secs = now.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs());
                format!("{}.{seq:0width$}-{secs}", self.file_name, width = SEQ_WIDTH)
            }
        };
        self.dir.join(name)
    }

    /// Parses a file name produced by this namer.
    ///
    /// Returns `None` for the active file, temporary archives and files that
    /// belong to other sinks.
    pub fn parse(&self, name: &str) -> Option<ParsedName> {
        let rest = name.strip_prefix(self.file_name.as_str())?.strip_prefix('.')?;
        let (rest, compressed) = match rest.strip_suffix(COMPRESSED_SUFFIX) {
            Some(stem) => (stem, true),
            None => (rest, false),
        };

        let digits = match rest.split_once('-') {
            Some((digits, secs)) if is_digits(secs) => digits,
            Some(_) => return None,
            None => rest,
        };
        if !is_digits(digits) {
            return None;
        }

        let seq = digits.parse().ok()?;
        Some(ParsedName { seq, compressed })
    }

    /// Lists the sink's segments, ordered oldest first by sequence number.
    ///
    /// Segments whose sequence is in `pending` are reported as
    /// [`SegmentState::PendingArchive`]. When a plain file and its own
    /// compressed twin (`X` and `X.sz`) both exist, the compressed one wins
    /// and the plain file is recorded as a leftover. Any other files that
    /// share a sequence number are reported as separate segments, ordered
    /// by name.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the directory cannot be read.
    pub fn scan(&self, pending: &PendingArchives) -> io::Result<Vec<Segment>> {
        // Keyed by sequence, then by the name without the compressed suffix,
        // so only a file and its own archive collapse together.
        let mut by_stem: BTreeMap<(u64, String), Segment> = BTreeMap::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let Some(parsed) = self.parse(&name) else {
                continue;
            };
            let metadata = match entry.metadata() {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                // Removed between read_dir and stat by a concurrent prune.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };

            let stem = match name.strip_suffix(COMPRESSED_SUFFIX) {
                Some(stem) if parsed.compressed => stem.to_owned(),
                _ => name.clone(),
            };
            let path = entry.path();
            match by_stem.get_mut(&(parsed.seq, stem.clone())) {
                Some(existing) if parsed.compressed => {
                    let plain = std::mem::replace(&mut existing.path, path);
                    existing.leftover = Some(plain);
                    existing.compressed = true;
                    existing.size = metadata.len();
                }
                Some(existing) => {
                    existing.leftover = Some(path);
                }
                None => {
                    by_stem.insert(
                        (parsed.seq, stem),
                        Segment {
                            path,
                            seq: parsed.seq,
                            compressed: parsed.compressed,
                            size: metadata.len(),
                            state: SegmentState::Plain,
                            leftover: None,
                        },
                    );
                }
            }
        }

        Ok(by_stem
            .into_values()
            .map(|mut segment| {
                segment.state = if pending.contains(segment.seq) {
                    SegmentState::PendingArchive
                } else if segment.compressed {
                    SegmentState::Archived
                } else {
                    SegmentState::Plain
                };
                segment
            })
            .collect())
    }

    /// Lists temporary archive files left by an interrupted compression.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the directory cannot be read.
    pub fn scan_temp_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut stale = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if let Some(archive) = name.strip_suffix(TEMP_SUFFIX)
                && self.parse(archive).is_some_and(|p| p.compressed)
            {
                stale.push(entry.path());
            }
        }
        Ok(stale)
    }
}

/// Next sequence number after the newest of `segments` (sequences start at 1).
pub fn next_seq(segments: &[Segment]) -> u64 {
    segments.iter().map(|s| s.seq).max().map_or(1, |max| max + 1)
}

/// `path` with [`COMPRESSED_SUFFIX`] appended.
pub fn compressed_path(path: &Path) -> PathBuf {
    with_suffix(path, COMPRESSED_SUFFIX)
}

/// `path` with [`TEMP_SUFFIX`] appended.
pub fn temp_path(path: &Path) -> PathBuf {
    with_suffix(path, TEMP_SUFFIX)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn namer(dir: &Path) -> SegmentNamer {
        SegmentNamer::new(&dir.join("app.log"), NamingScheme::Sequence)
    }

    #[test]
    fn test_segment_path_is_zero_padded() {
        let namer = SegmentNamer::new(Path::new("/logs/app.log"), NamingScheme::Sequence);
        assert_eq!(
            namer.segment_path(7, SystemTime::now()),
            PathBuf::from("/logs/app.log.000007")
        );
        assert_eq!(
            namer.segment_path(1_234_567, SystemTime::now()),
            PathBuf::from("/logs/app.log.1234567")
        );
    }

    #[test]
    fn test_segment_path_with_timestamp() {
        let namer = SegmentNamer::new(
            Path::new("/logs/app.log"),
            NamingScheme::SequenceTimestamp,
        );
        let now = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert_eq!(
            namer.segment_path(3, now),
            PathBuf::from("/logs/app.log.000003-1700000000")
        );
    }

    #[test]
    fn test_relative_base_path_uses_current_dir() {
        let namer = SegmentNamer::new(Path::new("app.log"), NamingScheme::Sequence);
        assert_eq!(namer.dir(), Path::new("."));
    }

    #[test]
    fn test_parse_accepts_both_schemes() {
        let namer = SegmentNamer::new(Path::new("app.log"), NamingScheme::Sequence);

        assert_eq!(
            namer.parse("app.log.000012"),
            Some(ParsedName {
                seq: 12,
                compressed: false
            })
        );
        assert_eq!(
            namer.parse("app.log.000012.sz"),
            Some(ParsedName {
                seq: 12,
                compressed: true
            })
        );
        assert_eq!(
            namer.parse("app.log.000004-1700000000.sz"),
            Some(ParsedName {
                seq: 4,
                compressed: true
            })
        );
    }

    #[test]
    fn test_parse_rejects_foreign_names() {
        let namer = SegmentNamer::new(Path::new("app.log"), NamingScheme::Sequence);

        assert_eq!(namer.parse("app.log"), None);
        assert_eq!(namer.parse("app.log.000001.sz.tmp"), None);
        assert_eq!(namer.parse("app.log.bak"), None);
        assert_eq!(namer.parse("app.log.000001-abc"), None);
        assert_eq!(namer.parse("other.log.000001"), None);
        assert_eq!(namer.parse("app.log.old.000001"), None);
        assert_eq!(namer.parse("app.log."), None);
    }

    #[test]
    fn test_scan_orders_numerically() {
        let temp_dir = tempdir().unwrap();
        let namer = namer(temp_dir.path());

        for name in ["app.log.1000000", "app.log.000009", "app.log.000010.sz", "app.log"] {
            fs::write(temp_dir.path().join(name), b"x").unwrap();
        }

        let segments = namer.scan(&PendingArchives::new()).unwrap();
        let seqs: Vec<u64> = segments.iter().map(|s| s.seq).collect();
        assert_eq!(seqs, vec![9, 10, 1_000_000]);
        assert_eq!(segments[1].state, SegmentState::Archived);
        assert_eq!(segments[0].state, SegmentState::Plain);
    }

    #[test]
    fn test_scan_collapses_plain_and_compressed() {
        let temp_dir = tempdir().unwrap();
        let namer = namer(temp_dir.path());

        fs::write(temp_dir.path().join("app.log.000001"), b"plain data").unwrap();
        fs::write(temp_dir.path().join("app.log.000001.sz"), b"sz").unwrap();

        let segments = namer.scan(&PendingArchives::new()).unwrap();
        assert_eq!(segments.len(), 1);
        assert!(segments[0].compressed);
        assert_eq!(segments[0].size, 2);
        assert_eq!(
            segments[0].leftover.as_deref(),
            Some(temp_dir.path().join("app.log.000001").as_path())
        );
    }

    #[test]
    fn test_scan_keeps_unrelated_files_with_same_sequence() {
        let temp_dir = tempdir().unwrap();
        let namer = namer(temp_dir.path());

        fs::write(temp_dir.path().join("app.log.000003"), b"plain A").unwrap();
        fs::write(temp_dir.path().join("app.log.000003-1700000000"), b"plain B").unwrap();
        fs::write(temp_dir.path().join("app.log.000005.sz"), b"sz A").unwrap();
        fs::write(temp_dir.path().join("app.log.000005-1700000000.sz"), b"sz B").unwrap();

        let segments = namer.scan(&PendingArchives::new()).unwrap();
        let names: Vec<String> = segments
            .iter()
            .map(|s| s.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "app.log.000003",
                "app.log.000003-1700000000",
                "app.log.000005.sz",
                "app.log.000005-1700000000.sz",
            ]
        );
        assert!(segments.iter().all(|s| s.leftover.is_none()));
    }

    #[test]
    fn test_scan_marks_pending() {
        let temp_dir = tempdir().unwrap();
        let namer = namer(temp_dir.path());
        fs::write(temp_dir.path().join("app.log.000002"), b"x").unwrap();

        let pending = PendingArchives::new();
        pending.insert(2);

        let segments = namer.scan(&pending).unwrap();
        assert_eq!(segments[0].state, SegmentState::PendingArchive);
    }

    #[test]
    fn test_scan_temp_files() {
        let temp_dir = tempdir().unwrap();
        let namer = namer(temp_dir.path());
        fs::write(temp_dir.path().join("app.log.000002.sz.tmp"), b"x").unwrap();
        fs::write(temp_dir.path().join("unrelated.tmp"), b"x").unwrap();

        let stale = namer.scan_temp_files().unwrap();
        assert_eq!(stale, vec![temp_dir.path().join("app.log.000002.sz.tmp")]);
    }

    #[test]
    fn test_next_seq() {
        assert_eq!(next_seq(&[]), 1);

        let temp_dir = tempdir().unwrap();
        let namer = namer(temp_dir.path());
        fs::write(temp_dir.path().join("app.log.000004"), b"x").unwrap();
        fs::write(temp_dir.path().join("app.log.000002.sz"), b"x").unwrap();
        let segments = namer.scan(&PendingArchives::new()).unwrap();
        assert_eq!(next_seq(&segments), 5);
    }

    #[test]
    fn test_suffix_helpers() {
        let path = Path::new("/logs/app.log.000001");
        assert_eq!(compressed_path(path), PathBuf::from("/logs/app.log.000001.sz"));
        assert_eq!(
            temp_path(&compressed_path(path)),
            PathBuf::from("/logs/app.log.000001.sz.tmp")
        );
    }
}
