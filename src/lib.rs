//! # swiftsourceinfo
//!
//! Decode, inspect, and rewrite Swift `.swiftsourceinfo` files.
//!
//! A `.swiftsourceinfo` file is a compiler-emitted metadata container in the LLVM
//! bitstream format. Per source file it stores content fingerprints, timestamps and
//! sizes; per declaration it stores source locations and documentation ranges. Source
//! files are referenced everywhere as byte offsets into a shared table of
//! NUL-terminated path strings, which is what makes the format relocatable — and what
//! this crate can rewrite.
//!
//! # Architecture
//!
//! The crate is layered, leaves first:
//!
//! - [`bitstream`] - Generic LLVM bitstream cursor and writer: nested blocks,
//!   per-block abbreviation scopes, records with optional attached blobs.
//! - [`sourceinfo`] - The `.swiftsourceinfo` payload: the format walker, the
//!   [`SourceInfo`] document model over the five extracted regions, the on-disk
//!   USR hash table reader, the path/offset remapping engine, and the rewrite
//!   driver that re-walks the original container substituting the remapped blobs.
//! - [`FileBuffer`] - Input acquisition via memory mapping or an owned buffer.
//!
//! Rewriting is a two-pass design: the first pass extracts zero-copy views of the
//! five regions, remapping materializes owned copies and rebuilds the string table,
//! and the second pass replays the original block/record structure byte-for-byte
//! while swapping in the rewritten region blobs.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use swiftsourceinfo::{FileBuffer, SourceInfo};
//! use std::path::Path;
//!
//! let buffer = FileBuffer::from_file(Path::new("Module.swiftsourceinfo"))?;
//! let info = SourceInfo::parse(buffer.data())?;
//!
//! for record in info.source_files()? {
//!     println!("{} ({} bytes)", info.file_path(record.file_id)?, record.file_size);
//! }
//! # Ok::<(), swiftsourceinfo::Error>(())
//! ```
//!
//! Remapping file paths and writing the result back:
//!
//! ```rust,no_run
//! use swiftsourceinfo::{
//!     sourceinfo::{rewrite_source_info, FilePathRemapper},
//!     FileBuffer, SourceInfo,
//! };
//! use regex::Regex;
//!
//! let buffer = FileBuffer::from_file("Module.swiftsourceinfo".as_ref())?;
//! let mut info = SourceInfo::parse(buffer.data())?;
//!
//! let mut remapper = FilePathRemapper::new();
//! remapper.add_remap(Regex::new("^/old/").unwrap(), "/new/");
//! let report = info.remap_file_paths(&remapper)?;
//!
//! for (old, new) in &report {
//!     println!("{} -> {}", old, new);
//! }
//!
//! let output = rewrite_source_info(&info, buffer.data())?;
//! std::fs::write("Module.remapped.swiftsourceinfo", output)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

pub mod bitstream;
pub mod sourceinfo;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use swiftsourceinfo::prelude::*;
///
/// let buffer = FileBuffer::from_file("Module.swiftsourceinfo".as_ref())?;
/// let info = SourceInfo::parse(buffer.data())?;
/// # Ok::<(), swiftsourceinfo::Error>(())
/// ```
pub mod prelude;

/// Represents a Result from this library, with [`crate::Error`] as the error type
pub type Result<T> = std::result::Result<T, Error>;

pub use error::Error;
pub use file::FileBuffer;
pub use sourceinfo::{SourceInfo, UsrTable};
