//! The active file: handle, path and accumulated size.
//!
//! [`ActiveFile`] knows nothing about thresholds or rotation; the sink asks
//! it for its size, appends through it, and replaces it when rotating.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{OpenError, Result, WriteError};

/// The currently open file receiving new writes for a sink.
#[derive(Debug)]
pub struct ActiveFile {
    path: PathBuf,
    file: File,
    /// Bytes in the file, including bytes written before the sink opened it.
    size: u64,
}

impl ActiveFile {
    /// Opens `path` for appending, creating it and its parent directory when
    /// missing. An existing file is reused and its length becomes the
    /// starting size.
    ///
    /// # Errors
    ///
    /// Returns [`OpenError`] if the directory or file cannot be created or
    /// inspected.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| OpenError::CreateDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| OpenError::ActiveFile {
                path: path.to_path_buf(),
                source: e,
            })?;
        let size = file
            .metadata()
            .map_err(|e| OpenError::ActiveFile {
                path: path.to_path_buf(),
                source: e,
            })?
            .len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            size,
        })
    }

    /// Creates an empty file at `path`, truncating anything already there.
    ///
    /// Used after a rotation: the size always starts at zero.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from the OS.
    pub fn create_fresh(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            size: 0,
        })
    }

    /// Path of the active file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written to the file so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Appends `data` in full.
    ///
    /// On failure `size` still advances by the bytes that did reach the
    /// file, and the error reports that count.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Io`] on an OS error and
    /// [`WriteError::ShortWrite`] if the OS stops accepting bytes.
    pub fn append(&mut self, data: &[u8]) -> Result<usize> {
        let mut written = 0;

        while written < data.len() {
            match self.file.write(&data[written..]) {
                Ok(0) => {
                    self.size += written as u64;
                    return Err(WriteError::ShortWrite {
                        path: self.path.clone(),
                        written,
                        requested: data.len(),
                    }
                    .into());
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    self.size += written as u64;
                    return Err(WriteError::Io {
                        path: self.path.clone(),
                        written,
                        requested: data.len(),
                        source: e,
                    }
                    .into());
                }
            }
        }

        self.size += written as u64;
        Ok(written)
    }

    /// Flushes buffered data to the OS.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Flush`] on failure.
    pub fn flush(&mut self) -> Result<()> {
        self.file.flush().map_err(|e| WriteError::Flush {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(())
    }

    /// Flushes and fsyncs the file.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Sync`] on failure.
    pub fn sync(&mut self) -> Result<()> {
        self.flush()?;
        self.file.sync_all().map_err(|e| WriteError::Sync {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(())
    }

    /// Flushes, fsyncs and releases the handle.
    ///
    /// # Errors
    ///
    /// Returns the I/O error; the handle is released either way.
    pub fn close(mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_all()
    }
}

/// Fsyncs a directory so renames, creations and deletions in it are durable.
///
/// # Errors
///
/// Returns the I/O error from opening or syncing the directory.
#[cfg(unix)]
pub(crate) fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

/// Directory fsync is not available on this platform; metadata durability
/// is left to the filesystem journal.
#[cfg(not(unix))]
pub(crate) fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
