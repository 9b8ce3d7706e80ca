//! Curated re-exports for glob imports.
//!
//! Pulls the types most users need into scope with a single
//! `use swiftsourceinfo::prelude::*;`.

pub use crate::bitstream::{BitstreamCursor, BitstreamWriter, Entry};
pub use crate::sourceinfo::{
    rewrite_source_info, FileIdRemapper, FilePathRemapper, SourceInfo, UsrTable,
};
pub use crate::{Error, FileBuffer, Result};
