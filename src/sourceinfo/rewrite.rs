//! Rewrite driver: re-walk the original container, substituting the remapped
//! regions.
//!
//! The second pass decodes the original input again with an independent cursor
//! (no state is shared with the first pass) and echoes every entry into a
//! [`crate::bitstream::BitstreamWriter`]: block structure and abbreviation
//! definitions are replayed byte-for-byte, and every record keeps its original
//! fields and abbreviation id. Only the blobs of the five known abbreviation ids
//! inside the decl-locs block are swapped for the document model's regions - and
//! the decl-USRs blob stays untouched, because it references record indices
//! rather than file paths.

use log::debug;

use crate::{
    bitstream::{BitstreamCursor, BitstreamWriter, Entry, UNABBREV_RECORD},
    sourceinfo::{
        check_signature, SourceInfo, BASIC_DECL_LOCS_ABBREV_ID, DECL_LOCS_BLOCK_ID,
        DOC_RANGES_ABBREV_ID, SOURCEINFO_SIGNATURE, SOURCE_FILE_LIST_ABBREV_ID,
        TEXT_DATA_ABBREV_ID,
    },
    Result,
};

/// Re-encode `original` with the regions of `info` substituted, returning the
/// finished output buffer.
///
/// Every byte outside the five region blobs - block headers, abbreviation
/// definitions, unrelated blocks and records - is reproduced unchanged, so the
/// output remains interpretable by the original consumer.
///
/// # Errors
/// Returns [`crate::Error::NotSupported`] if `original` lacks the magic
/// signature, and [`crate::Error::Malformed`] or [`crate::Error::OutOfBounds`]
/// for structural errors in either the decode or the encode direction.
///
/// # Examples
///
/// ```rust,no_run
/// use swiftsourceinfo::{sourceinfo::rewrite_source_info, SourceInfo};
///
/// let data = std::fs::read("Module.swiftsourceinfo")?;
/// let info = SourceInfo::parse(&data)?;
/// let output = rewrite_source_info(&info, &data)?;
/// assert_eq!(output.first(), data.first());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn rewrite_source_info(info: &SourceInfo<'_>, original: &[u8]) -> Result<Vec<u8>> {
    let mut cursor = BitstreamCursor::new(original);
    check_signature(&mut cursor)?;

    let mut writer = BitstreamWriter::new();
    writer.emit_bytes(&SOURCEINFO_SIGNATURE);

    let mut block_stack: Vec<u64> = Vec::new();

    while !cursor.at_end_of_stream() {
        match cursor.advance_no_autoprocess()? {
            Entry::SubBlock { id } => {
                debug!("[SubBlock] id: {id}");
                let abbrev_width = cursor.enter_block()?;
                writer.enter_subblock(id, abbrev_width);
                block_stack.push(id);
            }
            Entry::EndBlock => {
                debug!("[EndBlock]");
                writer.exit_block()?;
                block_stack.pop();
            }
            Entry::DefineAbbrev => {
                let abbrev = cursor.read_abbrev_definition()?;
                debug!("[DefineAbbrev] operands: {}", abbrev.ops.len());
                writer.emit_abbrev_definition(&abbrev);
            }
            Entry::Record { abbrev_id } => {
                let (code, fields, blob) = cursor.read_record(abbrev_id)?;
                if abbrev_id == UNABBREV_RECORD {
                    debug!("[Record] unabbreviated, code: {code}");
                    writer.emit_record(code, &fields);
                    continue;
                }

                debug!("[Record] abbrev id: {abbrev_id}");
                let mut values = Vec::with_capacity(fields.len() + 1);
                values.push(code);
                values.extend_from_slice(&fields);

                let blob = if block_stack.last() == Some(&DECL_LOCS_BLOCK_ID) {
                    match abbrev_id {
                        SOURCE_FILE_LIST_ABBREV_ID => Some(info.source_file_list_data()),
                        BASIC_DECL_LOCS_ABBREV_ID => Some(info.basic_decl_locs_data()),
                        TEXT_DATA_ABBREV_ID => Some(info.text_data()),
                        DOC_RANGES_ABBREV_ID => Some(info.doc_ranges_data()),
                        // The decl-USRs table holds record indices, not paths.
                        _ => blob,
                    }
                } else {
                    blob
                };
                writer.emit_record_with_blob(abbrev_id, &values, blob)?;
            }
        }
    }

    Ok(writer.into_bytes())
}

#[cfg(test)]
mod tests {
    use regex::Regex;

    use super::*;
    use crate::sourceinfo::{
        document::tests::{build_container, default_regions},
        FilePathRemapper,
    };

    #[test]
    fn identity_rewrite_reproduces_the_container() {
        let regions = default_regions();
        let container = build_container(&regions);
        let info = SourceInfo::parse(&container).unwrap();

        let output = rewrite_source_info(&info, &container).unwrap();
        assert_eq!(output, container);
    }

    #[test]
    fn rewrite_swaps_only_the_region_blobs() {
        let regions = default_regions();
        let container = build_container(&regions);
        let mut info = SourceInfo::parse(&container).unwrap();

        let mut remapper = FilePathRemapper::new();
        remapper.add_remap(Regex::new("^/x/").unwrap(), "/longer-prefix/");
        info.remap_file_paths(&remapper).unwrap();

        let output = rewrite_source_info(&info, &container).unwrap();
        let reparsed = SourceInfo::parse(&output).unwrap();

        assert_eq!(
            reparsed.text_data(),
            b"/longer-prefix/A.swift\0/longer-prefix/B.swift\0"
        );
        // The USR table is carried over untouched.
        assert_eq!(reparsed.decl_usrs_data(), regions.decl_usrs);
        let table = reparsed.usr_table().unwrap().unwrap();
        assert_eq!(table.get("s:1xAV").unwrap(), Some(0));
    }

    #[test]
    fn rewrite_preserves_record_counts() {
        let regions = default_regions();
        let container = build_container(&regions);
        let mut info = SourceInfo::parse(&container).unwrap();

        let original_counts = (
            info.source_files().unwrap().count(),
            info.decl_locs().unwrap().count(),
            info.doc_range_groups()
                .unwrap()
                .iter()
                .map(Vec::len)
                .collect::<Vec<_>>(),
        );

        let mut remapper = FilePathRemapper::new();
        remapper.add_remap(Regex::new("swift$").unwrap(), "swiftmodule");
        info.remap_file_paths(&remapper).unwrap();

        let output = rewrite_source_info(&info, &container).unwrap();
        let reparsed = SourceInfo::parse(&output).unwrap();
        let new_counts = (
            reparsed.source_files().unwrap().count(),
            reparsed.decl_locs().unwrap().count(),
            reparsed
                .doc_range_groups()
                .unwrap()
                .iter()
                .map(Vec::len)
                .collect::<Vec<_>>(),
        );

        assert_eq!(original_counts, new_counts);
    }
}
