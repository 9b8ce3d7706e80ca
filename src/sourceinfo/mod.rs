//! The `.swiftsourceinfo` payload: format constants, document model, USR table,
//! remapping engine, and the rewrite driver.
//!
//! # Architecture
//!
//! A `.swiftsourceinfo` container wraps two block kinds of interest - the module
//! source-info block and, nested inside it, the decl-locs block. Within the
//! decl-locs block five abbreviation ids are reserved, each carrying one named
//! byte region as its record blob:
//!
//! | Abbreviation id | Region |
//! |-----------------|--------|
//! | 4 | source-file list (fixed-size [`SourceFileRecord`]s) |
//! | 5 | basic declaration locations (fixed-size [`DeclLocRecord`]s) |
//! | 6 | declaration-USR hash table ([`UsrTable`]) |
//! | 7 | text data (NUL-terminated path strings) |
//! | 8 | documentation ranges |
//!
//! Every "file id" field in the fixed-size records is a byte offset into the text
//! data region, not an opaque identifier. [`SourceInfo`] exposes the regions and
//! the offset-deduplicating [`SourceInfo::remap_file_paths`] operation;
//! [`rewrite_source_info`] re-walks the original container and substitutes the
//! rewritten regions while leaving every other byte untouched.
//!
//! The constants in this module mirror Swift's serialization internals and are
//! not guaranteed to be stable across Swift versions.

mod document;
mod records;
mod remap;
mod rewrite;
mod usrs;

pub use document::SourceInfo;
pub use records::{DeclLocRecord, DocRange, LocationDirective, SourceFileRecord};
pub use remap::{FileIdRemapper, FilePathRemapper};
pub use rewrite::rewrite_source_info;
pub use usrs::UsrTable;

use crate::{bitstream::BitstreamCursor, Result};

/// Magic signature of serialized source info files.
pub const SOURCEINFO_SIGNATURE: [u8; 4] = [0xF0, 0x9F, 0x8F, 0x8E];

/// Block id of the control block; skipped wholesale during decoding.
pub const CONTROL_BLOCK_ID: u64 = 9;
/// Block id of the module source-info block.
pub const MODULE_SOURCEINFO_BLOCK_ID: u64 = 192;
/// Block id of the decl-locs block holding the five regions.
pub const DECL_LOCS_BLOCK_ID: u64 = 193;

/// Abbreviation id of the source-file list record.
pub const SOURCE_FILE_LIST_ABBREV_ID: u32 = 4;
/// Abbreviation id of the basic declaration locations record.
pub const BASIC_DECL_LOCS_ABBREV_ID: u32 = 5;
/// Abbreviation id of the declaration-USR table record.
pub const DECL_USRS_ABBREV_ID: u32 = 6;
/// Abbreviation id of the text data record.
pub const TEXT_DATA_ABBREV_ID: u32 = 7;
/// Abbreviation id of the documentation ranges record.
pub const DOC_RANGES_ABBREV_ID: u32 = 8;

/// Hash seed of the on-disk declaration-USR table.
pub const SOURCEINFO_HASH_SEED: u32 = 5387;

/// Consume and verify the 4-byte magic signature at the cursor position.
///
/// # Errors
/// Returns [`crate::Error::NotSupported`] if the signature does not match and
/// [`crate::Error::OutOfBounds`] if the input is shorter than the signature.
pub(crate) fn check_signature(cursor: &mut BitstreamCursor<'_>) -> Result<()> {
    for expected in SOURCEINFO_SIGNATURE {
        if cursor.read(8)? != u64::from(expected) {
            return Err(crate::Error::NotSupported);
        }
    }
    Ok(())
}
