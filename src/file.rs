//! Input acquisition for `.swiftsourceinfo` containers.
//!
//! Provides [`FileBuffer`], which presents the full input as a single addressable
//! byte buffer regardless of where it came from. Files on disk are memory-mapped
//! for efficient access; standard input and in-memory data are held in an owned
//! buffer. Both decode passes read from this one buffer for the lifetime of the run.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use swiftsourceinfo::FileBuffer;
//! use std::path::Path;
//!
//! let buffer = FileBuffer::from_file(Path::new("Module.swiftsourceinfo"))?;
//! assert!(!buffer.data().is_empty());
//! # Ok::<(), swiftsourceinfo::Error>(())
//! ```

use std::{fs::File, io::Read, path::Path};

use memmap2::Mmap;

use crate::Result;

/// The full contents of one input, backed either by a memory-mapped file or by
/// an owned in-memory buffer.
pub enum FileBuffer {
    /// Memory-mapped view of a file on disk
    Mapped(Mmap),
    /// Owned buffer, used for standard input and in-memory data
    Owned(Vec<u8>),
}

impl FileBuffer {
    /// Memory-map the file at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped,
    /// and [`crate::Error::Empty`] if it contains no data.
    pub fn from_file(path: &Path) -> Result<FileBuffer> {
        let file = File::open(path)?;
        // Safety: the mapping is read-only and held for the lifetime of the run.
        let mmap = unsafe { Mmap::map(&file)? };
        if mmap.is_empty() {
            return Err(crate::Error::Empty);
        }

        Ok(FileBuffer::Mapped(mmap))
    }

    /// Read standard input to the end.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] on read failure and
    /// [`crate::Error::Empty`] if standard input yields no data.
    pub fn from_stdin() -> Result<FileBuffer> {
        let mut data = Vec::new();
        std::io::stdin().read_to_end(&mut data)?;
        if data.is_empty() {
            return Err(crate::Error::Empty);
        }

        Ok(FileBuffer::Owned(data))
    }

    /// Wrap an already loaded buffer.
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] if `data` is empty.
    pub fn from_mem(data: Vec<u8>) -> Result<FileBuffer> {
        if data.is_empty() {
            return Err(crate::Error::Empty);
        }

        Ok(FileBuffer::Owned(data))
    }

    /// Access the underlying bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        match self {
            FileBuffer::Mapped(mmap) => mmap,
            FileBuffer::Owned(data) => data,
        }
    }
}
