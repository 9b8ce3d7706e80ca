//! Sequential, position-tracking reader over a bitstream buffer.
//!
//! [`BitstreamCursor`] decodes fixed-width and variable-bit-rate integers, enters
//! and exits nested blocks, reads abbreviation definitions, and reads records
//! (with an optional attached blob) according to either a block-defined
//! abbreviation or the generic unabbreviated form.
//!
//! The cursor tracks the current bit position, the abbreviation-id width of the
//! enclosing block, and the abbreviations defined by the active block scope. Blob
//! payloads are returned as zero-copy slices of the underlying input.

use crate::{
    bitstream::{
        abbrev::{decode_char6, encoding},
        Abbrev, AbbrevOp, DEFINE_ABBREV, END_BLOCK, ENTER_SUBBLOCK, FIRST_APPLICATION_ABBREV,
        TOP_LEVEL_ABBREV_WIDTH, UNABBREV_RECORD,
    },
    Error::OutOfBounds,
    Result,
};

/// One entry of the bitstream, produced lazily by [`BitstreamCursor::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    /// A nested block begins; `id` identifies its kind.
    ///
    /// The caller must follow up with [`BitstreamCursor::enter_block`] or
    /// [`BitstreamCursor::skip_block`] before advancing again.
    SubBlock {
        /// The block id read from the stream
        id: u64,
    },
    /// The current block ended; the enclosing scope has been restored.
    EndBlock,
    /// An abbreviation definition follows.
    ///
    /// Only surfaced by [`BitstreamCursor::advance_no_autoprocess`]; the caller
    /// must consume it with [`BitstreamCursor::read_abbrev_definition`].
    DefineAbbrev,
    /// A record encoded with the given abbreviation id
    /// ([`crate::bitstream::UNABBREV_RECORD`] for the generic form).
    Record {
        /// The abbreviation id the record was encoded with
        abbrev_id: u32,
    },
}

/// Saved state of an enclosing block while a nested one is active.
struct BlockScope {
    abbrev_width: u32,
    abbrevs: Vec<Abbrev>,
}

/// A cursor-based reader for the nested block/record/abbreviation grammar.
///
/// All read operations are bounds-checked; a truncated integer, blob or block
/// surfaces as [`crate::Error::OutOfBounds`], while grammar violations surface as
/// [`crate::Error::Malformed`] with source context.
///
/// # Examples
///
/// ```rust,no_run
/// use swiftsourceinfo::bitstream::{BitstreamCursor, Entry};
///
/// let data = std::fs::read("Module.swiftsourceinfo")?;
/// let mut cursor = BitstreamCursor::new(&data);
/// while !cursor.at_end_of_stream() {
///     match cursor.advance()? {
///         Entry::SubBlock { id } => {
///             println!("block {}", id);
///             cursor.skip_block()?;
///         }
///         entry => println!("{:?}", entry),
///     }
/// }
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct BitstreamCursor<'a> {
    /// The bitstream being read
    data: &'a [u8],
    /// Current position within the data, in bits
    bit_pos: usize,
    /// Abbreviation-id width of the current block
    abbrev_width: u32,
    /// Abbreviations defined by the current block, in definition order
    abbrevs: Vec<Abbrev>,
    /// Enclosing block scopes, innermost last
    scopes: Vec<BlockScope>,
}

impl<'a> BitstreamCursor<'a> {
    /// Create a cursor positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        BitstreamCursor {
            data,
            bit_pos: 0,
            abbrev_width: TOP_LEVEL_ABBREV_WIDTH,
            abbrevs: Vec::new(),
            scopes: Vec::new(),
        }
    }

    /// `true` once every bit of the input has been consumed.
    #[must_use]
    pub fn at_end_of_stream(&self) -> bool {
        self.bit_pos >= self.data.len() * 8
    }

    /// Current position within the input, in bits.
    #[must_use]
    pub fn bit_pos(&self) -> usize {
        self.bit_pos
    }

    /// Abbreviation-id width of the block the cursor is currently inside.
    #[must_use]
    pub fn abbrev_width(&self) -> u32 {
        self.abbrev_width
    }

    /// Move the cursor to an absolute bit position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the position lies beyond the input.
    pub fn jump_to_bit(&mut self, bit: usize) -> Result<()> {
        if bit > self.data.len() * 8 {
            return Err(OutOfBounds);
        }

        self.bit_pos = bit;
        Ok(())
    }

    /// Read `nbits` (up to 64) as an unsigned little-endian packed integer.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `nbits` bits remain.
    pub fn read(&mut self, nbits: u32) -> Result<u64> {
        debug_assert!(nbits <= 64);
        if nbits == 0 {
            return Ok(0);
        }
        if self.bit_pos + nbits as usize > self.data.len() * 8 {
            return Err(OutOfBounds);
        }

        let mut result: u64 = 0;
        let mut filled: u32 = 0;
        while filled < nbits {
            let byte = u64::from(self.data[self.bit_pos / 8]);
            let bit_off = (self.bit_pos % 8) as u32;
            let take = (8 - bit_off).min(nbits - filled);
            let chunk = (byte >> bit_off) & ((1u64 << take) - 1);
            result |= chunk << filled;
            filled += take;
            self.bit_pos += take as usize;
        }

        Ok(result)
    }

    /// Read a variable-bit-rate integer with the given chunk width.
    ///
    /// Each chunk contributes `width - 1` data bits, least-significant first; a
    /// set high bit continues into the next chunk.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on a truncated value and
    /// [`crate::Error::Malformed`] for chunk widths outside `2..=32`.
    pub fn read_vbr(&mut self, width: u32) -> Result<u64> {
        if !(2..=32).contains(&width) {
            return Err(malformed_error!("Invalid VBR width - {}", width));
        }

        let hi_mask = 1u64 << (width - 1);
        let mut piece = self.read(width)?;
        if piece & hi_mask == 0 {
            return Ok(piece);
        }

        let mut result = piece & (hi_mask - 1);
        let mut shift = width - 1;
        loop {
            piece = self.read(width)?;
            result |= (piece & (hi_mask - 1)) << shift;
            if piece & hi_mask == 0 {
                return Ok(result);
            }
            shift += width - 1;
            if shift >= 64 {
                return Err(malformed_error!("VBR value wider than 64 bits"));
            }
        }
    }

    /// Skip ahead to the next 32-bit word boundary.
    fn align32(&mut self) -> Result<()> {
        let aligned = self.bit_pos.div_ceil(32) * 32;
        if aligned > self.data.len() * 8 {
            return Err(OutOfBounds);
        }

        self.bit_pos = aligned;
        Ok(())
    }

    /// Advance to the next entry, transparently registering abbreviation
    /// definitions in the current block scope.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on grammar violations and
    /// [`crate::Error::OutOfBounds`] on truncation.
    pub fn advance(&mut self) -> Result<Entry> {
        loop {
            match self.advance_no_autoprocess()? {
                Entry::DefineAbbrev => {
                    self.read_abbrev_definition()?;
                }
                entry => return Ok(entry),
            }
        }
    }

    /// Advance to the next entry, surfacing abbreviation definitions as
    /// [`Entry::DefineAbbrev`] instead of consuming them.
    ///
    /// Used by the rewrite pass, which must replay every definition verbatim.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on grammar violations and
    /// [`crate::Error::OutOfBounds`] on truncation.
    pub fn advance_no_autoprocess(&mut self) -> Result<Entry> {
        let abbrev_id = u32::try_from(self.read(self.abbrev_width)?)
            .map_err(|_| malformed_error!("Abbreviation id out of range"))?;

        match abbrev_id {
            END_BLOCK => {
                self.align32()?;
                let scope = self
                    .scopes
                    .pop()
                    .ok_or_else(|| malformed_error!("END_BLOCK outside of any block"))?;
                self.abbrev_width = scope.abbrev_width;
                self.abbrevs = scope.abbrevs;
                Ok(Entry::EndBlock)
            }
            ENTER_SUBBLOCK => {
                let id = self.read_vbr(8)?;
                Ok(Entry::SubBlock { id })
            }
            DEFINE_ABBREV => Ok(Entry::DefineAbbrev),
            _ => Ok(Entry::Record { abbrev_id }),
        }
    }

    /// Enter the block announced by the preceding [`Entry::SubBlock`], returning
    /// the block's abbreviation-id width.
    ///
    /// A fresh abbreviation scope becomes active; the enclosing scope is restored
    /// when the matching [`Entry::EndBlock`] is consumed.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a zero abbreviation width and
    /// [`crate::Error::OutOfBounds`] on truncation.
    pub fn enter_block(&mut self) -> Result<u32> {
        let new_width = u32::try_from(self.read_vbr(4)?).unwrap_or(0);
        if new_width == 0 {
            return Err(malformed_error!("Block declares abbreviation width 0"));
        }
        self.align32()?;
        let _block_len = self.read(32)?;

        self.scopes.push(BlockScope {
            abbrev_width: self.abbrev_width,
            abbrevs: std::mem::take(&mut self.abbrevs),
        });
        self.abbrev_width = new_width;

        Ok(new_width)
    }

    /// Skip over the block announced by the preceding [`Entry::SubBlock`] without
    /// entering it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the declared block length exceeds
    /// the remaining input.
    pub fn skip_block(&mut self) -> Result<()> {
        let _new_width = self.read_vbr(4)?;
        self.align32()?;
        let block_len = self.read(32)? as usize;

        let end = self.bit_pos + block_len * 32;
        if end > self.data.len() * 8 {
            return Err(OutOfBounds);
        }
        self.bit_pos = end;

        Ok(())
    }

    /// Consume a `DEFINE_ABBREV` record, register the abbreviation in the current
    /// block scope, and return a copy of the definition.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for unknown operand encodings and
    /// [`crate::Error::OutOfBounds`] on truncation.
    pub fn read_abbrev_definition(&mut self) -> Result<Abbrev> {
        let num_ops = self.read_vbr(5)?;
        let mut ops = Vec::with_capacity(num_ops as usize);

        for _ in 0..num_ops {
            let is_literal = self.read(1)? != 0;
            if is_literal {
                ops.push(AbbrevOp::Literal(self.read_vbr(8)?));
                continue;
            }

            let enc = self.read(3)?;
            let op = match enc {
                encoding::FIXED => {
                    let width = u32::try_from(self.read_vbr(5)?)
                        .map_err(|_| malformed_error!("Fixed width out of range"))?;
                    if width > 64 {
                        return Err(malformed_error!("Fixed width out of range - {}", width));
                    }
                    AbbrevOp::Fixed(width)
                }
                encoding::VBR => {
                    let width = u32::try_from(self.read_vbr(5)?).unwrap_or(0);
                    if !(2..=32).contains(&width) {
                        return Err(malformed_error!("VBR width out of range - {}", width));
                    }
                    AbbrevOp::Vbr(width)
                }
                encoding::ARRAY => AbbrevOp::Array,
                encoding::CHAR6 => AbbrevOp::Char6,
                encoding::BLOB => AbbrevOp::Blob,
                _ => return Err(malformed_error!("Unknown abbreviation encoding - {}", enc)),
            };
            ops.push(op);
        }

        let abbrev = Abbrev { ops };
        self.abbrevs.push(abbrev.clone());
        Ok(abbrev)
    }

    /// Read the record announced by the preceding [`Entry::Record`].
    ///
    /// Returns the record code, the scalar field values, and the attached blob if
    /// the abbreviation carries one. Unabbreviated records never carry a blob.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for unknown abbreviation ids or invalid
    /// operand sequences and [`crate::Error::OutOfBounds`] on truncation.
    pub fn read_record(&mut self, abbrev_id: u32) -> Result<(u64, Vec<u64>, Option<&'a [u8]>)> {
        if abbrev_id == UNABBREV_RECORD {
            let code = self.read_vbr(6)?;
            let num_fields = self.read_vbr(6)? as usize;
            let mut fields = Vec::with_capacity(num_fields.min(4096));
            for _ in 0..num_fields {
                fields.push(self.read_vbr(6)?);
            }
            return Ok((code, fields, None));
        }

        let abbrev = self.abbrev(abbrev_id)?.clone();
        let mut values = Vec::new();
        let mut blob = None;

        let mut i = 0;
        while i < abbrev.ops.len() {
            match abbrev.ops[i] {
                AbbrevOp::Literal(value) => values.push(value),
                AbbrevOp::Fixed(width) => values.push(self.read(width)?),
                AbbrevOp::Vbr(width) => values.push(self.read_vbr(width)?),
                AbbrevOp::Char6 => values.push(decode_char6(self.read(6)?)?),
                AbbrevOp::Array => {
                    let count = self.read_vbr(6)? as usize;
                    i += 1;
                    let element = abbrev.ops.get(i).copied().ok_or_else(|| {
                        malformed_error!("Array operand without element encoding")
                    })?;
                    for _ in 0..count {
                        let value = match element {
                            AbbrevOp::Fixed(width) => self.read(width)?,
                            AbbrevOp::Vbr(width) => self.read_vbr(width)?,
                            AbbrevOp::Char6 => decode_char6(self.read(6)?)?,
                            _ => {
                                return Err(malformed_error!(
                                    "Invalid array element encoding - {:?}",
                                    element
                                ))
                            }
                        };
                        values.push(value);
                    }
                }
                AbbrevOp::Blob => {
                    let len = self.read_vbr(6)? as usize;
                    self.align32()?;
                    let start = self.bit_pos / 8;
                    let end = start.checked_add(len).ok_or(OutOfBounds)?;
                    if end > self.data.len() {
                        return Err(OutOfBounds);
                    }
                    blob = Some(&self.data[start..end]);
                    self.bit_pos = end * 8;
                    self.align32()?;
                }
            }
            i += 1;
        }

        if values.is_empty() {
            return Err(malformed_error!("Abbreviated record without a code"));
        }
        let code = values.remove(0);

        Ok((code, values, blob))
    }

    /// Read and discard the record announced by the preceding [`Entry::Record`].
    ///
    /// # Errors
    /// Same conditions as [`BitstreamCursor::read_record`].
    pub fn skip_record(&mut self, abbrev_id: u32) -> Result<()> {
        self.read_record(abbrev_id)?;
        Ok(())
    }

    /// Look up a block-defined abbreviation by its id.
    fn abbrev(&self, abbrev_id: u32) -> Result<&Abbrev> {
        if abbrev_id < FIRST_APPLICATION_ABBREV {
            return Err(malformed_error!("Invalid abbreviation id - {}", abbrev_id));
        }
        self.abbrevs
            .get((abbrev_id - FIRST_APPLICATION_ABBREV) as usize)
            .ok_or_else(|| malformed_error!("Unknown abbreviation id - {}", abbrev_id))
    }
}
