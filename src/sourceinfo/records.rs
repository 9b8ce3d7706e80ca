//! Typed views over the fixed-layout record regions.
//!
//! The source-file list and basic decl-locs regions are flat arrays of packed,
//! fixed-size records; the doc-ranges region is a reserved byte followed by
//! repeating counted groups of fixed-size range records. All integers are
//! little-endian. The layouts mirror Swift's serialization internals.

use crate::Result;

/// Packed size of one [`SourceFileRecord`].
pub(crate) const SOURCE_FILE_RECORD_SIZE: usize = 84;
/// Packed size of one [`DeclLocRecord`].
pub(crate) const DECL_LOC_RECORD_SIZE: usize = 92;
/// Packed size of one location inside a [`DeclLocRecord`].
const LOCATION_SIZE: usize = 28;
/// Packed size of one doc-range record.
pub(crate) const DOC_RANGE_RECORD_SIZE: usize = 32;

pub(crate) fn read_u32_at(data: &[u8], offset: usize) -> Result<u32> {
    let bytes = data
        .get(offset..offset + 4)
        .ok_or(crate::Error::OutOfBounds)?;
    Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
}

fn read_u64_at(data: &[u8], offset: usize) -> Result<u64> {
    let bytes = data
        .get(offset..offset + 8)
        .ok_or(crate::Error::OutOfBounds)?;
    Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
}

fn write_u32_at(data: &mut [u8], offset: usize, value: u32) -> Result<()> {
    let bytes = data
        .get_mut(offset..offset + 4)
        .ok_or(crate::Error::OutOfBounds)?;
    bytes.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

/// One entry of the source-file list: per-file fingerprints, timestamp and size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFileRecord {
    /// Byte offset of the file path within the text data region
    pub file_id: u32,
    /// Content fingerprint including type members
    pub fingerprint_with_types: [u8; 32],
    /// Content fingerprint excluding type members
    pub fingerprint_without_types: [u8; 32],
    /// Modification time, in nanoseconds since the Unix epoch
    pub timestamp_nanos: u64,
    /// File size in bytes
    pub file_size: u64,
}

impl SourceFileRecord {
    fn read(bytes: &[u8]) -> Result<SourceFileRecord> {
        Ok(SourceFileRecord {
            file_id: read_u32_at(bytes, 0)?,
            fingerprint_with_types: bytes[4..36].try_into().unwrap(),
            fingerprint_without_types: bytes[36..68].try_into().unwrap(),
            timestamp_nanos: read_u64_at(bytes, 68)?,
            file_size: read_u64_at(bytes, 76)?,
        })
    }
}

/// One of the three locations stored per declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationDirective {
    /// Byte offset of the location within its source file
    pub offset: u32,
    /// 1-based line number
    pub line: u32,
    /// 1-based column number
    pub column: u32,
    /// Byte offset of the location's file path within the text data region.
    ///
    /// Can differ from the record's own file id, e.g. for macro expansions.
    pub file_id: u32,
}

/// One entry of the basic declaration locations region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclLocRecord {
    /// Byte offset of the declaring file's path within the text data region
    pub file_id: u32,
    /// Number of documentation ranges attached to this declaration
    pub num_doc_ranges: u32,
    /// Start, end, and name locations of the declaration
    pub locs: [LocationDirective; 3],
}

impl DeclLocRecord {
    pub(crate) fn read(bytes: &[u8]) -> Result<DeclLocRecord> {
        let mut locs = [LocationDirective {
            offset: 0,
            line: 0,
            column: 0,
            file_id: 0,
        }; 3];
        for (i, loc) in locs.iter_mut().enumerate() {
            let base = 8 + i * LOCATION_SIZE;
            *loc = LocationDirective {
                offset: read_u32_at(bytes, base)?,
                line: read_u32_at(bytes, base + 4)?,
                column: read_u32_at(bytes, base + 8)?,
                // Three unused fields sit between the column and the file id.
                file_id: read_u32_at(bytes, base + 24)?,
            };
        }

        Ok(DeclLocRecord {
            file_id: read_u32_at(bytes, 0)?,
            num_doc_ranges: read_u32_at(bytes, 4)?,
            locs,
        })
    }
}

/// One documentation range; only the file reference is meaningful here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocRange {
    /// Byte offset of the range's file path within the text data region
    pub file_id: u32,
}

/// Iterator over the packed records of the source-file list region.
pub struct SourceFileIter<'a> {
    chunks: std::slice::ChunksExact<'a, u8>,
}

impl<'a> SourceFileIter<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Result<SourceFileIter<'a>> {
        if data.len() % SOURCE_FILE_RECORD_SIZE != 0 {
            return Err(malformed_error!(
                "Source file list size {} is not a multiple of the record size",
                data.len()
            ));
        }
        Ok(SourceFileIter {
            chunks: data.chunks_exact(SOURCE_FILE_RECORD_SIZE),
        })
    }
}

impl Iterator for SourceFileIter<'_> {
    type Item = SourceFileRecord;

    fn next(&mut self) -> Option<Self::Item> {
        // Size was validated on construction; reads cannot fail.
        self.chunks.next().map(|chunk| {
            SourceFileRecord::read(chunk).expect("record size was validated")
        })
    }
}

/// Iterator over the packed records of the basic decl-locs region.
pub struct DeclLocIter<'a> {
    chunks: std::slice::ChunksExact<'a, u8>,
}

impl<'a> DeclLocIter<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Result<DeclLocIter<'a>> {
        if data.len() % DECL_LOC_RECORD_SIZE != 0 {
            return Err(malformed_error!(
                "Decl locs size {} is not a multiple of the record size",
                data.len()
            ));
        }
        Ok(DeclLocIter {
            chunks: data.chunks_exact(DECL_LOC_RECORD_SIZE),
        })
    }
}

impl Iterator for DeclLocIter<'_> {
    type Item = DeclLocRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.chunks.next().map(|chunk| {
            DeclLocRecord::read(chunk).expect("record size was validated")
        })
    }
}

/// Parse the doc-ranges region into its counted groups.
///
/// The region begins with one reserved byte, then repeats a `u32` count followed
/// by that many fixed-size range records until the region ends.
pub(crate) fn parse_doc_range_groups(data: &[u8]) -> Result<Vec<Vec<DocRange>>> {
    let mut groups = Vec::new();
    if data.is_empty() {
        return Ok(groups);
    }

    let mut pos = 1; // reserved byte
    while pos < data.len() {
        let count = read_u32_at(data, pos)? as usize;
        pos += 4;

        let mut group = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            group.push(DocRange {
                file_id: read_u32_at(data, pos + 24)?,
            });
            pos += DOC_RANGE_RECORD_SIZE;
        }
        groups.push(group);
    }

    Ok(groups)
}

/// Rewrite every file id of the source-file list region in place.
pub(crate) fn patch_source_file_ids(
    data: &mut [u8],
    mut map: impl FnMut(u32) -> Result<u32>,
) -> Result<()> {
    if data.len() % SOURCE_FILE_RECORD_SIZE != 0 {
        return Err(malformed_error!(
            "Source file list size {} is not a multiple of the record size",
            data.len()
        ));
    }

    let mut pos = 0;
    while pos < data.len() {
        let mapped = map(read_u32_at(data, pos)?)?;
        write_u32_at(data, pos, mapped)?;
        pos += SOURCE_FILE_RECORD_SIZE;
    }
    Ok(())
}

/// Rewrite every file id of the basic decl-locs region in place, covering the
/// record's own file id and the one in each of its three locations.
pub(crate) fn patch_decl_loc_ids(
    data: &mut [u8],
    mut map: impl FnMut(u32) -> Result<u32>,
) -> Result<()> {
    if data.len() % DECL_LOC_RECORD_SIZE != 0 {
        return Err(malformed_error!(
            "Decl locs size {} is not a multiple of the record size",
            data.len()
        ));
    }

    let mut pos = 0;
    while pos < data.len() {
        let mapped = map(read_u32_at(data, pos)?)?;
        write_u32_at(data, pos, mapped)?;

        for i in 0..3 {
            let offset = pos + 8 + i * LOCATION_SIZE + 24;
            let mapped = map(read_u32_at(data, offset)?)?;
            write_u32_at(data, offset, mapped)?;
        }
        pos += DECL_LOC_RECORD_SIZE;
    }
    Ok(())
}

/// Rewrite every file id of the doc-ranges region in place.
pub(crate) fn patch_doc_range_ids(
    data: &mut [u8],
    mut map: impl FnMut(u32) -> Result<u32>,
) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }

    let mut pos = 1; // reserved byte
    while pos < data.len() {
        let count = read_u32_at(data, pos)? as usize;
        pos += 4;

        for _ in 0..count {
            let offset = pos + 24;
            let mapped = map(read_u32_at(data, offset)?)?;
            write_u32_at(data, offset, mapped)?;
            pos += DOC_RANGE_RECORD_SIZE;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_source_file(file_id: u32, timestamp: u64, size: u64) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(SOURCE_FILE_RECORD_SIZE);
        bytes.extend_from_slice(&file_id.to_le_bytes());
        bytes.extend_from_slice(&[0xAA; 32]);
        bytes.extend_from_slice(&[0xBB; 32]);
        bytes.extend_from_slice(&timestamp.to_le_bytes());
        bytes.extend_from_slice(&size.to_le_bytes());
        bytes
    }

    #[test]
    fn source_file_records_parse() {
        let mut region = sample_source_file(0, 1_600_000_000_000_000_000, 512);
        region.extend_from_slice(&sample_source_file(11, 7, 9));

        let records: Vec<_> = SourceFileIter::new(&region).unwrap().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].file_id, 0);
        assert_eq!(records[0].timestamp_nanos, 1_600_000_000_000_000_000);
        assert_eq!(records[0].file_size, 512);
        assert_eq!(records[1].file_id, 11);
        assert_eq!(records[1].fingerprint_with_types, [0xAA; 32]);
    }

    #[test]
    fn truncated_region_is_rejected() {
        let region = vec![0u8; SOURCE_FILE_RECORD_SIZE + 1];
        assert!(SourceFileIter::new(&region).is_err());
        let region = vec![0u8; DECL_LOC_RECORD_SIZE - 1];
        assert!(DeclLocIter::new(&region).is_err());
    }

    #[test]
    fn decl_loc_locations_carry_their_own_file_ids() {
        let mut region = vec![0u8; DECL_LOC_RECORD_SIZE];
        write_u32_at(&mut region, 0, 5).unwrap(); // record file id
        write_u32_at(&mut region, 4, 2).unwrap(); // doc range count
        write_u32_at(&mut region, 8, 120).unwrap(); // loc 0 offset
        write_u32_at(&mut region, 12, 3).unwrap(); // loc 0 line
        write_u32_at(&mut region, 16, 9).unwrap(); // loc 0 column
        write_u32_at(&mut region, 32, 17).unwrap(); // loc 0 file id
        write_u32_at(&mut region, 8 + 28 + 24, 42).unwrap(); // loc 1 file id

        let record = DeclLocIter::new(&region).unwrap().next().unwrap();
        assert_eq!(record.file_id, 5);
        assert_eq!(record.num_doc_ranges, 2);
        assert_eq!(record.locs[0].offset, 120);
        assert_eq!(record.locs[0].line, 3);
        assert_eq!(record.locs[0].column, 9);
        assert_eq!(record.locs[0].file_id, 17);
        assert_eq!(record.locs[1].file_id, 42);
        assert_eq!(record.locs[2].file_id, 0);
    }

    #[test]
    fn doc_range_groups_parse_and_patch() {
        let mut region = vec![0u8]; // reserved byte
        region.extend_from_slice(&2u32.to_le_bytes());
        let mut range = vec![0u8; DOC_RANGE_RECORD_SIZE];
        write_u32_at(&mut range, 24, 11).unwrap();
        region.extend_from_slice(&range);
        write_u32_at(&mut range, 24, 0).unwrap();
        region.extend_from_slice(&range);
        region.extend_from_slice(&1u32.to_le_bytes());
        write_u32_at(&mut range, 24, 11).unwrap();
        region.extend_from_slice(&range);

        let groups = parse_doc_range_groups(&region).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0][0].file_id, 11);
        assert_eq!(groups[0][1].file_id, 0);
        assert_eq!(groups[1][0].file_id, 11);

        patch_doc_range_ids(&mut region, |id| Ok(id + 100)).unwrap();
        let groups = parse_doc_range_groups(&region).unwrap();
        assert_eq!(groups[0][0].file_id, 111);
        assert_eq!(groups[0][1].file_id, 100);
        assert_eq!(groups[1][0].file_id, 111);
    }

    #[test]
    fn patch_source_file_ids_touches_only_file_ids() {
        let mut region = sample_source_file(3, 999, 1);
        patch_source_file_ids(&mut region, |id| Ok(id * 2)).unwrap();

        let record = SourceFileIter::new(&region).unwrap().next().unwrap();
        assert_eq!(record.file_id, 6);
        assert_eq!(record.timestamp_nanos, 999);
        assert_eq!(record.file_size, 1);
    }
}
