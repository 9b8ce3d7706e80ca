//! Generic LLVM bitstream decoding and re-encoding.
//!
//! The bitstream container is a self-describing binary envelope of nested, typed
//! blocks. Each block owns its own abbreviation-id width and its own list of
//! abbreviation definitions; records inside a block are encoded either through one
//! of those abbreviations or through the generic unabbreviated form. Certain
//! abbreviated records carry an attached raw byte blob, exempt from the record's
//! scalar-field encoding.
//!
//! # Architecture
//!
//! - [`BitstreamCursor`] - Sequential, bit-position-tracking reader. Produces
//!   [`Entry`] values lazily; entries are consumed immediately, never buffered
//!   into a whole-document tree.
//! - [`BitstreamWriter`] - The write-side mirror: opens and closes blocks with
//!   length backpatching, replays abbreviation definitions verbatim, and emits
//!   records preserving the abbreviation id observed at decode time.
//! - [`Abbrev`] / [`AbbrevOp`] - Positionally-typed record encoding templates.
//!
//! The cursor and writer share the grammar but no state; rewriting a container is
//! done by re-walking the original input with a fresh cursor and echoing every
//! entry into a writer.
//!
//! # Usage Examples
//!
//! ```rust
//! use swiftsourceinfo::bitstream::{BitstreamCursor, BitstreamWriter, Entry};
//!
//! let mut writer = BitstreamWriter::new();
//! writer.enter_subblock(8, 3);
//! writer.emit_record(1, &[42, 7]);
//! writer.exit_block()?;
//! let bytes = writer.into_bytes();
//!
//! let mut cursor = BitstreamCursor::new(&bytes);
//! let Entry::SubBlock { id: 8 } = cursor.advance()? else { panic!() };
//! cursor.enter_block()?;
//! let Entry::Record { abbrev_id } = cursor.advance()? else { panic!() };
//! let (code, fields, blob) = cursor.read_record(abbrev_id)?;
//! assert_eq!((code, fields, blob), (1, vec![42, 7], None));
//! # Ok::<(), swiftsourceinfo::Error>(())
//! ```

mod abbrev;
mod cursor;
mod writer;

pub use abbrev::{decode_char6, encode_char6, Abbrev, AbbrevOp};
pub use cursor::{BitstreamCursor, Entry};
pub use writer::BitstreamWriter;

/// Built-in abbreviation id terminating the current block.
pub const END_BLOCK: u32 = 0;
/// Built-in abbreviation id introducing a nested block.
pub const ENTER_SUBBLOCK: u32 = 1;
/// Built-in abbreviation id introducing an abbreviation definition.
pub const DEFINE_ABBREV: u32 = 2;
/// Built-in abbreviation id for records encoded without an abbreviation.
pub const UNABBREV_RECORD: u32 = 3;
/// First id available for block-defined abbreviations.
pub const FIRST_APPLICATION_ABBREV: u32 = 4;

/// Abbreviation-id width at the outermost stream level.
pub(crate) const TOP_LEVEL_ABBREV_WIDTH: u32 = 2;
