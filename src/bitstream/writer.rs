//! Write-side mirror of the bitstream cursor.
//!
//! [`BitstreamWriter`] accumulates bits into 32-bit little-endian words, opens and
//! closes nested blocks (backpatching each block's length word on exit), emits
//! abbreviation definitions verbatim, and emits records either through a
//! previously emitted abbreviation or through the generic unabbreviated form.
//!
//! The writer never decides abbreviation ids itself; callers replay whatever the
//! cursor reported during the corresponding decode pass.

use crate::{
    bitstream::{
        abbrev::{encode_char6, encoding},
        Abbrev, AbbrevOp, DEFINE_ABBREV, END_BLOCK, ENTER_SUBBLOCK, FIRST_APPLICATION_ABBREV,
        UNABBREV_RECORD,
    },
    Result,
};

/// Saved state of an enclosing block while a nested one is being written.
struct BlockScope {
    /// Offset of the block's 32-bit length placeholder within the buffer
    length_pos: usize,
    abbrev_width: u32,
    abbrevs: Vec<Abbrev>,
}

/// Bit-packing emitter for the nested block/record/abbreviation grammar.
///
/// # Examples
///
/// ```rust
/// use swiftsourceinfo::bitstream::BitstreamWriter;
///
/// let mut writer = BitstreamWriter::new();
/// writer.emit_bytes(&[0xF0, 0x9F, 0x8F, 0x8E]);
/// writer.enter_subblock(192, 4);
/// writer.emit_record(2, &[1, 0]);
/// writer.exit_block()?;
///
/// let bytes = writer.into_bytes();
/// assert_eq!(bytes.len() % 4, 0);
/// # Ok::<(), swiftsourceinfo::Error>(())
/// ```
pub struct BitstreamWriter {
    /// Completed output, always a whole number of 32-bit words at block boundaries
    buffer: Vec<u8>,
    /// Bits not yet flushed into the buffer, least-significant first
    cur_value: u64,
    /// Number of valid bits in `cur_value`, always below 32
    cur_bits: u32,
    /// Abbreviation-id width of the current block
    abbrev_width: u32,
    /// Abbreviations emitted into the current block, in emission order
    abbrevs: Vec<Abbrev>,
    /// Enclosing block scopes, innermost last
    scopes: Vec<BlockScope>,
}

impl BitstreamWriter {
    /// Create an empty writer positioned at the outermost stream level.
    #[must_use]
    pub fn new() -> Self {
        BitstreamWriter {
            buffer: Vec::new(),
            cur_value: 0,
            cur_bits: 0,
            abbrev_width: crate::bitstream::TOP_LEVEL_ABBREV_WIDTH,
            abbrevs: Vec::new(),
            scopes: Vec::new(),
        }
    }

    /// Finish the stream and take the output buffer.
    ///
    /// Any pending bits are flushed into a final zero-padded word.
    #[must_use]
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.flush_to_word();
        self.buffer
    }

    /// Emit `nbits` (up to 64) of `value`, least-significant first.
    pub fn emit(&mut self, value: u64, nbits: u32) {
        debug_assert!(nbits <= 64);
        debug_assert!(nbits == 64 || value < (1u64 << nbits));
        if nbits > 32 {
            self.emit32(value & 0xFFFF_FFFF, 32);
            self.emit32(value >> 32, nbits - 32);
        } else {
            self.emit32(value, nbits);
        }
    }

    fn emit32(&mut self, value: u64, nbits: u32) {
        if nbits == 0 {
            return;
        }
        debug_assert!(nbits <= 32);
        self.cur_value |= (value & ((1u64 << nbits) - 1)) << self.cur_bits;
        self.cur_bits += nbits;
        if self.cur_bits >= 32 {
            let word = (self.cur_value & 0xFFFF_FFFF) as u32;
            self.buffer.extend_from_slice(&word.to_le_bytes());
            self.cur_value >>= 32;
            self.cur_bits -= 32;
        }
    }

    /// Emit a variable-bit-rate integer with the given chunk width.
    pub fn emit_vbr(&mut self, mut value: u64, width: u32) {
        debug_assert!((2..=32).contains(&width));
        let data_mask = (1u64 << (width - 1)) - 1;
        loop {
            let chunk = value & data_mask;
            value >>= width - 1;
            if value != 0 {
                self.emit(chunk | (data_mask + 1), width);
            } else {
                self.emit(chunk, width);
                return;
            }
        }
    }

    /// Append raw bytes at the current position, which must be 32-bit aligned.
    ///
    /// Used for the magic signature and for blob payloads.
    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        debug_assert!(self.cur_bits == 0);
        self.buffer.extend_from_slice(bytes);
    }

    /// Pad with zero bits up to the next 32-bit word boundary.
    pub fn align32(&mut self) {
        self.flush_to_word();
        while self.buffer.len() % 4 != 0 {
            self.buffer.push(0);
        }
    }

    fn flush_to_word(&mut self) {
        if self.cur_bits > 0 {
            let word = (self.cur_value & 0xFFFF_FFFF) as u32;
            self.buffer.extend_from_slice(&word.to_le_bytes());
            self.cur_value = 0;
            self.cur_bits = 0;
        }
    }

    /// Open a nested block with the given id and abbreviation-id width.
    ///
    /// A 32-bit length placeholder is reserved and backpatched by
    /// [`BitstreamWriter::exit_block`]. A fresh abbreviation scope becomes active.
    pub fn enter_subblock(&mut self, block_id: u64, abbrev_width: u32) {
        self.emit(u64::from(ENTER_SUBBLOCK), self.abbrev_width);
        self.emit_vbr(block_id, 8);
        self.emit_vbr(u64::from(abbrev_width), 4);
        self.align32();

        let length_pos = self.buffer.len();
        self.buffer.extend_from_slice(&[0, 0, 0, 0]);

        self.scopes.push(BlockScope {
            length_pos,
            abbrev_width: self.abbrev_width,
            abbrevs: std::mem::take(&mut self.abbrevs),
        });
        self.abbrev_width = abbrev_width;
    }

    /// Close the innermost open block, backpatching its length word and restoring
    /// the enclosing abbreviation scope.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if no block is open.
    pub fn exit_block(&mut self) -> Result<()> {
        let scope = self
            .scopes
            .pop()
            .ok_or_else(|| malformed_error!("exit_block without an open block"))?;

        self.emit(u64::from(END_BLOCK), self.abbrev_width);
        self.align32();

        let block_words = ((self.buffer.len() - scope.length_pos - 4) / 4) as u32;
        self.buffer[scope.length_pos..scope.length_pos + 4]
            .copy_from_slice(&block_words.to_le_bytes());

        self.abbrev_width = scope.abbrev_width;
        self.abbrevs = scope.abbrevs;
        Ok(())
    }

    /// Emit an abbreviation definition verbatim and register it in the current
    /// block scope; it receives the next sequential application id.
    pub fn emit_abbrev_definition(&mut self, abbrev: &Abbrev) {
        self.emit(u64::from(DEFINE_ABBREV), self.abbrev_width);
        self.emit_vbr(abbrev.ops.len() as u64, 5);

        for op in &abbrev.ops {
            match *op {
                AbbrevOp::Literal(value) => {
                    self.emit(1, 1);
                    self.emit_vbr(value, 8);
                }
                AbbrevOp::Fixed(width) => {
                    self.emit(0, 1);
                    self.emit(encoding::FIXED, 3);
                    self.emit_vbr(u64::from(width), 5);
                }
                AbbrevOp::Vbr(width) => {
                    self.emit(0, 1);
                    self.emit(encoding::VBR, 3);
                    self.emit_vbr(u64::from(width), 5);
                }
                AbbrevOp::Array => {
                    self.emit(0, 1);
                    self.emit(encoding::ARRAY, 3);
                }
                AbbrevOp::Char6 => {
                    self.emit(0, 1);
                    self.emit(encoding::CHAR6, 3);
                }
                AbbrevOp::Blob => {
                    self.emit(0, 1);
                    self.emit(encoding::BLOB, 3);
                }
            }
        }

        self.abbrevs.push(abbrev.clone());
    }

    /// Emit an unabbreviated record with the given code and fields.
    pub fn emit_record(&mut self, code: u64, fields: &[u64]) {
        self.emit(u64::from(UNABBREV_RECORD), self.abbrev_width);
        self.emit_vbr(code, 6);
        self.emit_vbr(fields.len() as u64, 6);
        for &field in fields {
            self.emit_vbr(field, 6);
        }
    }

    /// Emit a record through a previously emitted abbreviation.
    ///
    /// `values` carries the record code followed by the scalar fields, exactly as
    /// decoded; literal operands are checked against it but not re-encoded. `blob`
    /// must be present when and only when the abbreviation carries a blob operand.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the abbreviation id is unknown in the
    /// current block, if `values` does not match the operand layout, or if the
    /// blob presence does not match the definition.
    pub fn emit_record_with_blob(
        &mut self,
        abbrev_id: u32,
        values: &[u64],
        blob: Option<&[u8]>,
    ) -> Result<()> {
        let index = abbrev_id
            .checked_sub(FIRST_APPLICATION_ABBREV)
            .ok_or_else(|| malformed_error!("Invalid abbreviation id - {}", abbrev_id))?;
        let abbrev = self
            .abbrevs
            .get(index as usize)
            .ok_or_else(|| malformed_error!("Unknown abbreviation id - {}", abbrev_id))?
            .clone();

        self.emit(u64::from(abbrev_id), self.abbrev_width);

        let mut value_idx = 0;
        let mut emitted_blob = false;
        let mut i = 0;
        while i < abbrev.ops.len() {
            match abbrev.ops[i] {
                AbbrevOp::Literal(literal) => {
                    let value = *values
                        .get(value_idx)
                        .ok_or_else(|| malformed_error!("Record is missing operand values"))?;
                    if value != literal {
                        return Err(malformed_error!(
                            "Record value {} does not match literal operand {}",
                            value,
                            literal
                        ));
                    }
                    value_idx += 1;
                }
                AbbrevOp::Fixed(width) => {
                    let value = *values
                        .get(value_idx)
                        .ok_or_else(|| malformed_error!("Record is missing operand values"))?;
                    self.emit(value, width);
                    value_idx += 1;
                }
                AbbrevOp::Vbr(width) => {
                    let value = *values
                        .get(value_idx)
                        .ok_or_else(|| malformed_error!("Record is missing operand values"))?;
                    self.emit_vbr(value, width);
                    value_idx += 1;
                }
                AbbrevOp::Char6 => {
                    let value = *values
                        .get(value_idx)
                        .ok_or_else(|| malformed_error!("Record is missing operand values"))?;
                    self.emit(encode_char6(value)?, 6);
                    value_idx += 1;
                }
                AbbrevOp::Array => {
                    i += 1;
                    let element = abbrev.ops.get(i).copied().ok_or_else(|| {
                        malformed_error!("Array operand without element encoding")
                    })?;
                    let elements = &values[value_idx..];
                    self.emit_vbr(elements.len() as u64, 6);
                    for &value in elements {
                        match element {
                            AbbrevOp::Fixed(width) => self.emit(value, width),
                            AbbrevOp::Vbr(width) => self.emit_vbr(value, width),
                            AbbrevOp::Char6 => self.emit(encode_char6(value)?, 6),
                            _ => {
                                return Err(malformed_error!(
                                    "Invalid array element encoding - {:?}",
                                    element
                                ))
                            }
                        }
                    }
                    value_idx = values.len();
                }
                AbbrevOp::Blob => {
                    let bytes = blob
                        .ok_or_else(|| malformed_error!("Abbreviation expects a blob payload"))?;
                    self.emit_vbr(bytes.len() as u64, 6);
                    self.align32();
                    self.emit_bytes(bytes);
                    self.align32();
                    emitted_blob = true;
                }
            }
            i += 1;
        }

        if blob.is_some() && !emitted_blob {
            return Err(malformed_error!(
                "Blob payload supplied for an abbreviation without a blob operand"
            ));
        }

        Ok(())
    }
}

impl Default for BitstreamWriter {
    fn default() -> Self {
        Self::new()
    }
}
