//! The `.swiftsourceinfo` document model and format walker.
//!
//! [`SourceInfo::parse`] drives a [`crate::bitstream::BitstreamCursor`] over the
//! container, entering only the module source-info and decl-locs blocks and
//! skipping every other block wholesale, and routes record blobs by abbreviation
//! id into the five named regions. During decode the regions borrow from the
//! input buffer; [`SourceInfo::remap_file_paths`] materializes owned copies,
//! patches every file-reference field, and replaces the text data region with the
//! freshly built, deduplicated one.

use std::borrow::Cow;

use log::debug;

use crate::{
    bitstream::{BitstreamCursor, Entry},
    sourceinfo::{
        check_signature,
        records::{
            self, DeclLocIter, DeclLocRecord, DocRange, SourceFileIter, DECL_LOC_RECORD_SIZE,
        },
        remap::{path_bytes_at, FileIdRemapper, FilePathRemapper},
        UsrTable, BASIC_DECL_LOCS_ABBREV_ID, DECL_LOCS_BLOCK_ID, DECL_USRS_ABBREV_ID,
        DOC_RANGES_ABBREV_ID, MODULE_SOURCEINFO_BLOCK_ID, SOURCE_FILE_LIST_ABBREV_ID,
        TEXT_DATA_ABBREV_ID,
    },
    Result,
};

/// The decoded source-info document: the five extracted regions and the typed
/// views over them.
///
/// Constructed once per run by [`SourceInfo::parse`]. A decode-only run keeps
/// zero-copy views into the input buffer; [`SourceInfo::remap_file_paths`]
/// transitions the file-referencing regions to owned storage because the text
/// data region changes size and every offset into it must be rewritten.
///
/// # Examples
///
/// ```rust,no_run
/// use swiftsourceinfo::SourceInfo;
///
/// let data = std::fs::read("Module.swiftsourceinfo")?;
/// let info = SourceInfo::parse(&data)?;
/// for record in info.source_files()? {
///     println!("{}", info.file_path(record.file_id)?);
/// }
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct SourceInfo<'a> {
    /// Fixed-size [`crate::sourceinfo::SourceFileRecord`]s
    source_file_list: Cow<'a, [u8]>,
    /// Fixed-size [`DeclLocRecord`]s
    basic_decl_locs: Cow<'a, [u8]>,
    /// Counted groups of documentation ranges
    doc_ranges: Cow<'a, [u8]>,
    /// Concatenated NUL-terminated file path strings
    text_data: Cow<'a, [u8]>,
    /// Scalar fields of the decl-USRs record; the first is the table offset
    decl_usrs_fields: Vec<u64>,
    /// The decl-USRs blob; never rewritten
    decl_usrs: Cow<'a, [u8]>,
    /// Guards against a second remap pass over already-remapped offsets
    remapped: bool,
}

impl<'a> SourceInfo<'a> {
    /// Decode a `.swiftsourceinfo` container into its five regions.
    ///
    /// Blocks other than the module source-info and decl-locs blocks are skipped
    /// without being entered; records outside the decl-locs block are read and
    /// discarded.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] if the magic signature does not
    /// match, [`crate::Error::Malformed`] for grammar violations or an unknown
    /// abbreviation id inside the decl-locs block, and
    /// [`crate::Error::OutOfBounds`] on truncation.
    pub fn parse(data: &'a [u8]) -> Result<SourceInfo<'a>> {
        let mut cursor = BitstreamCursor::new(data);
        check_signature(&mut cursor)?;

        let mut source_file_list: &'a [u8] = &[];
        let mut basic_decl_locs: &'a [u8] = &[];
        let mut doc_ranges: &'a [u8] = &[];
        let mut text_data: &'a [u8] = &[];
        let mut decl_usrs_fields = Vec::new();
        let mut decl_usrs: &'a [u8] = &[];

        // Abbreviation ids are only meaningful relative to the enclosing block.
        let mut block_stack: Vec<u64> = Vec::new();

        while !cursor.at_end_of_stream() {
            match cursor.advance()? {
                Entry::SubBlock { id } => {
                    debug!("[SubBlock] id: {id}");
                    if id == MODULE_SOURCEINFO_BLOCK_ID || id == DECL_LOCS_BLOCK_ID {
                        cursor.enter_block()?;
                        block_stack.push(id);
                    } else {
                        cursor.skip_block()?;
                    }
                }
                Entry::EndBlock => {
                    debug!("[EndBlock]");
                    block_stack.pop();
                }
                Entry::Record { abbrev_id } => {
                    debug!("[Record] abbrev id: {abbrev_id}");
                    if block_stack.last() != Some(&DECL_LOCS_BLOCK_ID) {
                        cursor.skip_record(abbrev_id)?;
                        continue;
                    }

                    let (_code, fields, blob) = cursor.read_record(abbrev_id)?;
                    let blob = blob.unwrap_or(&[]);
                    match abbrev_id {
                        SOURCE_FILE_LIST_ABBREV_ID => source_file_list = blob,
                        BASIC_DECL_LOCS_ABBREV_ID => basic_decl_locs = blob,
                        DECL_USRS_ABBREV_ID => {
                            decl_usrs_fields = fields;
                            decl_usrs = blob;
                        }
                        TEXT_DATA_ABBREV_ID => text_data = blob,
                        DOC_RANGES_ABBREV_ID => doc_ranges = blob,
                        _ => {
                            return Err(malformed_error!(
                                "Unexpected abbreviation id {} in decl-locs block",
                                abbrev_id
                            ))
                        }
                    }
                }
                Entry::DefineAbbrev => unreachable!("advance() consumes definitions"),
            }
        }

        Ok(SourceInfo {
            source_file_list: Cow::Borrowed(source_file_list),
            basic_decl_locs: Cow::Borrowed(basic_decl_locs),
            doc_ranges: Cow::Borrowed(doc_ranges),
            text_data: Cow::Borrowed(text_data),
            decl_usrs_fields,
            decl_usrs: Cow::Borrowed(decl_usrs),
            remapped: false,
        })
    }

    /// Typed iterator over the source-file list region.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the region size is not a whole
    /// number of records.
    pub fn source_files(&self) -> Result<SourceFileIter<'_>> {
        SourceFileIter::new(&self.source_file_list)
    }

    /// Typed iterator over the basic decl-locs region.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the region size is not a whole
    /// number of records.
    pub fn decl_locs(&self) -> Result<DeclLocIter<'_>> {
        DeclLocIter::new(&self.basic_decl_locs)
    }

    /// The decl-locs record at `index`, as referenced by the USR table.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the index lies past the region.
    pub fn decl_loc(&self, index: u32) -> Result<DeclLocRecord> {
        let start = index as usize * DECL_LOC_RECORD_SIZE;
        let bytes = self
            .basic_decl_locs
            .get(start..start + DECL_LOC_RECORD_SIZE)
            .ok_or(crate::Error::OutOfBounds)?;
        DeclLocRecord::read(bytes)
    }

    /// The doc-ranges region parsed into its counted groups.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if a group count overruns the region.
    pub fn doc_range_groups(&self) -> Result<Vec<Vec<DocRange>>> {
        records::parse_doc_range_groups(&self.doc_ranges)
    }

    /// The persisted USR lookup table, if the module carries one.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] or [`crate::Error::OutOfBounds`] for a
    /// corrupt table header.
    pub fn usr_table(&self) -> Result<Option<UsrTable<'_>>> {
        UsrTable::parse(&self.decl_usrs_fields, &self.decl_usrs)
    }

    /// Resolve a file reference to its path string.
    ///
    /// Offset 0 and offsets at or past the region end denote the empty string,
    /// which display layers treat as "no path".
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the referenced bytes are not valid
    /// UTF-8.
    pub fn file_path(&self, file_id: u32) -> Result<&str> {
        std::str::from_utf8(path_bytes_at(&self.text_data, file_id))
            .map_err(|_| malformed_error!("File path at offset {} is not valid UTF-8", file_id))
    }

    /// Raw bytes of the source-file list region.
    #[must_use]
    pub fn source_file_list_data(&self) -> &[u8] {
        &self.source_file_list
    }

    /// Raw bytes of the basic decl-locs region.
    #[must_use]
    pub fn basic_decl_locs_data(&self) -> &[u8] {
        &self.basic_decl_locs
    }

    /// Raw bytes of the doc-ranges region.
    #[must_use]
    pub fn doc_ranges_data(&self) -> &[u8] {
        &self.doc_ranges
    }

    /// Raw bytes of the text data region.
    #[must_use]
    pub fn text_data(&self) -> &[u8] {
        &self.text_data
    }

    /// Raw bytes of the decl-USRs region.
    #[must_use]
    pub fn decl_usrs_data(&self) -> &[u8] {
        &self.decl_usrs
    }

    /// Rewrite every file reference in the document through `remapper`.
    ///
    /// The four file-referencing regions are duplicated into owned storage and
    /// patched field by field; the text data region is replaced with a freshly
    /// built one holding exactly one NUL-terminated entry per distinct old
    /// offset, in first-encounter order (source-file list first, then basic
    /// decl-locs, then doc ranges). Returns the old/new path pairs in that same
    /// order, one per distinct old offset.
    ///
    /// # Errors
    /// Returns [`crate::Error::Error`] when called a second time on the same
    /// instance (the offsets would be remapped twice) and
    /// [`crate::Error::Malformed`] for structurally invalid regions.
    pub fn remap_file_paths(&mut self, remapper: &FilePathRemapper) -> Result<Vec<(String, String)>> {
        if self.remapped {
            return Err(crate::Error::Error(
                "file paths of this document were already remapped".to_string(),
            ));
        }

        let mut ids = FileIdRemapper::new(remapper);
        let text_data = &self.text_data;

        records::patch_source_file_ids(self.source_file_list.to_mut(), |id| {
            ids.map_file_id(id, text_data)
        })?;
        records::patch_decl_loc_ids(self.basic_decl_locs.to_mut(), |id| {
            ids.map_file_id(id, text_data)
        })?;
        records::patch_doc_range_ids(self.doc_ranges.to_mut(), |id| {
            ids.map_file_id(id, text_data)
        })?;

        let (new_text_data, report) = ids.into_parts();
        self.text_data = Cow::Owned(new_text_data);
        self.remapped = true;

        Ok(report)
    }
}
