//! Abbreviation definitions for the bitstream encoding.
//!
//! An abbreviation is a reusable, positionally-typed encoding template for records
//! within a block. Abbreviations are scoped to the block that defines them and are
//! numbered sequentially starting at [`crate::bitstream::FIRST_APPLICATION_ABBREV`],
//! after the four reserved built-in ids.

use crate::Result;

/// Operand encoding codes as they appear in a `DEFINE_ABBREV` record.
pub(crate) mod encoding {
    pub const FIXED: u64 = 1;
    pub const VBR: u64 = 2;
    pub const ARRAY: u64 = 3;
    pub const CHAR6: u64 = 4;
    pub const BLOB: u64 = 5;
}

/// One operand of an abbreviation definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbbrevOp {
    /// A constant value that is part of the definition and never encoded in records
    Literal(u64),
    /// A fixed-width unsigned integer of the given bit width
    Fixed(u32),
    /// A variable-bit-rate unsigned integer with the given chunk width
    Vbr(u32),
    /// A VBR6-counted array whose elements use the following operand's encoding
    Array,
    /// A single character from the 6-bit alphabet
    Char6,
    /// A VBR6-length raw byte payload, 32-bit aligned on both sides
    Blob,
}

/// An ordered list of operand descriptors, read from a `DEFINE_ABBREV` record.
///
/// When rewriting a container, every definition encountered while re-walking the
/// original stream is replayed verbatim; the writer never invents or reorders
/// abbreviations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abbrev {
    /// The operands, in definition order
    pub ops: Vec<AbbrevOp>,
}

impl Abbrev {
    /// `true` if any operand carries an attached blob.
    #[must_use]
    pub fn has_blob(&self) -> bool {
        self.ops.iter().any(|op| matches!(op, AbbrevOp::Blob))
    }
}

/// Decode a 6-bit character code to its ASCII byte.
///
/// The alphabet is `a`-`z` (0-25), `A`-`Z` (26-51), `0`-`9` (52-61), `.` (62)
/// and `_` (63).
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for values outside the 6-bit range.
pub fn decode_char6(value: u64) -> Result<u64> {
    match value {
        0..=25 => Ok(value + u64::from(b'a')),
        26..=51 => Ok(value - 26 + u64::from(b'A')),
        52..=61 => Ok(value - 52 + u64::from(b'0')),
        62 => Ok(u64::from(b'.')),
        63 => Ok(u64::from(b'_')),
        _ => Err(malformed_error!("Invalid char6 value - {}", value)),
    }
}

/// Encode an ASCII byte into its 6-bit character code.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the byte is outside the 6-bit alphabet.
pub fn encode_char6(value: u64) -> Result<u64> {
    match u8::try_from(value) {
        Ok(b @ b'a'..=b'z') => Ok(u64::from(b - b'a')),
        Ok(b @ b'A'..=b'Z') => Ok(u64::from(b - b'A') + 26),
        Ok(b @ b'0'..=b'9') => Ok(u64::from(b - b'0') + 52),
        Ok(b'.') => Ok(62),
        Ok(b'_') => Ok(63),
        _ => Err(malformed_error!("Value not encodable as char6 - {}", value)),
    }
}
