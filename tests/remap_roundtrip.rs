//! End-to-end remap round-trip tests.
//!
//! Builds synthetic `.swiftsourceinfo` containers through the public bitstream
//! writer, then drives the full pipeline: parse, remap, rewrite, and re-parse
//! the emitted bytes, verifying structural fidelity and the offset
//! deduplication guarantees.

use regex::Regex;
use swiftsourceinfo::{
    bitstream::{Abbrev, AbbrevOp, BitstreamWriter},
    prelude::*,
    sourceinfo::{
        BASIC_DECL_LOCS_ABBREV_ID, CONTROL_BLOCK_ID, DECL_LOCS_BLOCK_ID, DECL_USRS_ABBREV_ID,
        DOC_RANGES_ABBREV_ID, MODULE_SOURCEINFO_BLOCK_ID, SOURCEINFO_HASH_SEED,
        SOURCEINFO_SIGNATURE, SOURCE_FILE_LIST_ABBREV_ID, TEXT_DATA_ABBREV_ID,
    },
};

fn source_file_record(file_id: u32, timestamp: u64, size: u64) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&file_id.to_le_bytes());
    bytes.extend_from_slice(&[0x33; 32]);
    bytes.extend_from_slice(&[0x44; 32]);
    bytes.extend_from_slice(&timestamp.to_le_bytes());
    bytes.extend_from_slice(&size.to_le_bytes());
    bytes
}

fn decl_loc_record(file_id: u32, line: u32, column: u32, loc_file_ids: [u32; 3]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&file_id.to_le_bytes());
    bytes.extend_from_slice(&1u32.to_le_bytes());
    for loc_file_id in loc_file_ids {
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&line.to_le_bytes());
        bytes.extend_from_slice(&column.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 12]);
        bytes.extend_from_slice(&loc_file_id.to_le_bytes());
    }
    bytes
}

fn doc_ranges_region(groups: &[&[u32]]) -> Vec<u8> {
    let mut bytes = vec![0u8];
    for group in groups {
        bytes.extend_from_slice(&(group.len() as u32).to_le_bytes());
        for &file_id in *group {
            bytes.extend_from_slice(&[0u8; 24]);
            bytes.extend_from_slice(&file_id.to_le_bytes());
            bytes.extend_from_slice(&[0u8; 4]);
        }
    }
    bytes
}

fn djb_hash(bytes: &[u8]) -> u32 {
    bytes.iter().fold(SOURCEINFO_HASH_SEED, |hash, &byte| {
        hash.wrapping_mul(33).wrapping_add(u32::from(byte))
    })
}

/// Lay out an on-disk USR hash table with a single bucket.
fn usr_table(entries: &[(&str, u32)]) -> (u64, Vec<u8>) {
    let mut blob = vec![0u8; 4];
    let chain_offset = blob.len() as u32;
    blob.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for &(key, value) in entries {
        blob.extend_from_slice(&djb_hash(key.as_bytes()).to_le_bytes());
        blob.extend_from_slice(&(key.len() as u32).to_le_bytes());
        blob.extend_from_slice(key.as_bytes());
        blob.extend_from_slice(&value.to_le_bytes());
    }
    while blob.len() % 4 != 0 {
        blob.push(0);
    }

    let table_offset = blob.len() as u64;
    blob.extend_from_slice(&1u32.to_le_bytes()); // bucket count
    blob.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    blob.extend_from_slice(&chain_offset.to_le_bytes());

    (table_offset, blob)
}

struct Regions {
    source_file_list: Vec<u8>,
    basic_decl_locs: Vec<u8>,
    doc_ranges: Vec<u8>,
    text_data: Vec<u8>,
    usr_entries: Vec<(&'static str, u32)>,
}

impl Regions {
    fn two_files() -> Regions {
        let mut source_file_list = source_file_record(0, 1_700_000_000_000_000_000, 512);
        source_file_list.extend_from_slice(&source_file_record(11, 4, 64));
        Regions {
            source_file_list,
            basic_decl_locs: decl_loc_record(0, 12, 7, [0, 11, 0]),
            doc_ranges: doc_ranges_region(&[&[11]]),
            text_data: b"/x/A.swift\0/x/B.swift\0".to_vec(),
            usr_entries: vec![("s:1xAV", 0)],
        }
    }

    fn shared_offset() -> Regions {
        let mut source_file_list = source_file_record(0, 1, 1);
        source_file_list.extend_from_slice(&source_file_record(0, 2, 2));
        Regions {
            source_file_list,
            basic_decl_locs: decl_loc_record(0, 1, 1, [0, 0, 0]),
            doc_ranges: doc_ranges_region(&[&[0]]),
            text_data: b"/x/A.swift\0".to_vec(),
            usr_entries: vec![("s:1xAV", 0)],
        }
    }
}

fn build_container(regions: &Regions) -> Vec<u8> {
    let (table_offset, usr_blob) = usr_table(&regions.usr_entries);

    let mut writer = BitstreamWriter::new();
    writer.emit_bytes(&SOURCEINFO_SIGNATURE);

    // A control block the walker must skip without entering.
    writer.enter_subblock(CONTROL_BLOCK_ID, 3);
    writer.emit_record(4, &[0, 600]);
    writer.exit_block().unwrap();

    writer.enter_subblock(MODULE_SOURCEINFO_BLOCK_ID, 4);
    writer.emit_record(1, &[2]);

    writer.enter_subblock(DECL_LOCS_BLOCK_ID, 5);
    for code in 1..=5u64 {
        let ops = if code == 3 {
            vec![AbbrevOp::Literal(code), AbbrevOp::Fixed(32), AbbrevOp::Blob]
        } else {
            vec![AbbrevOp::Literal(code), AbbrevOp::Blob]
        };
        writer.emit_abbrev_definition(&Abbrev { ops });
    }

    writer
        .emit_record_with_blob(SOURCE_FILE_LIST_ABBREV_ID, &[1], Some(&regions.source_file_list))
        .unwrap();
    writer
        .emit_record_with_blob(BASIC_DECL_LOCS_ABBREV_ID, &[2], Some(&regions.basic_decl_locs))
        .unwrap();
    writer
        .emit_record_with_blob(DECL_USRS_ABBREV_ID, &[3, table_offset], Some(&usr_blob))
        .unwrap();
    writer
        .emit_record_with_blob(TEXT_DATA_ABBREV_ID, &[4], Some(&regions.text_data))
        .unwrap();
    writer
        .emit_record_with_blob(DOC_RANGES_ABBREV_ID, &[5], Some(&regions.doc_ranges))
        .unwrap();

    writer.exit_block().unwrap();
    writer.exit_block().unwrap();
    writer.into_bytes()
}

fn remapper(rules: &[(&str, &str)]) -> FilePathRemapper {
    let mut remapper = FilePathRemapper::new();
    for (pattern, replacement) in rules {
        remapper.add_remap(Regex::new(pattern).unwrap(), *replacement);
    }
    remapper
}

#[test]
fn identity_rules_preserve_referenced_path_content() {
    let container = build_container(&Regions::two_files());
    let mut info = SourceInfo::parse(&container).unwrap();

    // Record the paths every file reference resolves to before remapping.
    let original_paths: Vec<String> = info
        .source_files()
        .unwrap()
        .map(|record| info.file_path(record.file_id).unwrap().to_string())
        .collect();

    info.remap_file_paths(&remapper(&[("nothing-matches", "x")]))
        .unwrap();
    let output = rewrite_source_info(&info, &container).unwrap();
    let reparsed = SourceInfo::parse(&output).unwrap();

    let new_paths: Vec<String> = reparsed
        .source_files()
        .unwrap()
        .map(|record| reparsed.file_path(record.file_id).unwrap().to_string())
        .collect();
    assert_eq!(original_paths, new_paths);
}

#[test]
fn spec_scenario_two_files_same_length_replacement() {
    let container = build_container(&Regions::two_files());
    let mut info = SourceInfo::parse(&container).unwrap();

    let report = info.remap_file_paths(&remapper(&[("^/x/", "/y/")])).unwrap();

    assert_eq!(info.text_data(), b"/y/A.swift\0/y/B.swift\0");
    let files: Vec<_> = info.source_files().unwrap().collect();
    assert_eq!(files[0].file_id, 0);
    assert_eq!(files[1].file_id, 11);
    assert_eq!(
        report,
        vec![
            ("/x/A.swift".to_string(), "/y/A.swift".to_string()),
            ("/x/B.swift".to_string(), "/y/B.swift".to_string()),
        ]
    );
}

#[test]
fn shared_offset_yields_one_entry_and_one_report_line() {
    let container = build_container(&Regions::shared_offset());
    let mut info = SourceInfo::parse(&container).unwrap();

    let report = info.remap_file_paths(&remapper(&[("^/x/", "/y/")])).unwrap();

    assert_eq!(report.len(), 1);
    assert_eq!(info.text_data(), b"/y/A.swift\0");
    let files: Vec<_> = info.source_files().unwrap().collect();
    assert_eq!(files[0].file_id, files[1].file_id);
}

#[test]
fn structural_fidelity_across_growing_replacement() {
    let container = build_container(&Regions::two_files());
    let mut info = SourceInfo::parse(&container).unwrap();

    let file_count = info.source_files().unwrap().count();
    let loc_count = info.decl_locs().unwrap().count();
    let doc_counts: Vec<usize> = info
        .doc_range_groups()
        .unwrap()
        .iter()
        .map(Vec::len)
        .collect();
    let loc_doc_counts: Vec<u32> = info
        .decl_locs()
        .unwrap()
        .map(|record| record.num_doc_ranges)
        .collect();

    info.remap_file_paths(&remapper(&[("^/x/", "/much/longer/build/root/")]))
        .unwrap();
    let output = rewrite_source_info(&info, &container).unwrap();
    let reparsed = SourceInfo::parse(&output).unwrap();

    assert_eq!(reparsed.source_files().unwrap().count(), file_count);
    assert_eq!(reparsed.decl_locs().unwrap().count(), loc_count);
    assert_eq!(
        reparsed
            .doc_range_groups()
            .unwrap()
            .iter()
            .map(Vec::len)
            .collect::<Vec<_>>(),
        doc_counts
    );
    assert_eq!(
        reparsed
            .decl_locs()
            .unwrap()
            .map(|record| record.num_doc_ranges)
            .collect::<Vec<_>>(),
        loc_doc_counts
    );
    assert_eq!(
        reparsed.file_path(reparsed.source_files().unwrap().next().unwrap().file_id).unwrap(),
        "/much/longer/build/root/A.swift"
    );
}

#[test]
fn usr_lookup_survives_a_remap_round_trip() {
    let container = build_container(&Regions::two_files());
    let mut info = SourceInfo::parse(&container).unwrap();

    info.remap_file_paths(&remapper(&[("^/x/", "/y/")])).unwrap();
    let output = rewrite_source_info(&info, &container).unwrap();

    let reparsed = SourceInfo::parse(&output).unwrap();
    let table = reparsed.usr_table().unwrap().unwrap();
    let index = table.get("s:1xAV").unwrap().unwrap();
    let record = reparsed.decl_loc(index).unwrap();
    assert_eq!(record.locs[0].line, 12);
    assert_eq!(reparsed.file_path(record.file_id).unwrap(), "/y/A.swift");
}

#[test]
fn magic_mismatch_is_rejected() {
    let mut container = build_container(&Regions::two_files());
    container[3] ^= 0xFF;
    assert!(matches!(
        SourceInfo::parse(&container),
        Err(Error::NotSupported)
    ));
}

#[test]
fn rewritten_file_loads_from_disk() {
    let container = build_container(&Regions::two_files());
    let mut info = SourceInfo::parse(&container).unwrap();
    info.remap_file_paths(&remapper(&[("^/x/", "/y/")])).unwrap();
    let output = rewrite_source_info(&info, &container).unwrap();

    let tmp = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(tmp.path(), &output).unwrap();

    let buffer = FileBuffer::from_file(tmp.path()).unwrap();
    let reparsed = SourceInfo::parse(buffer.data()).unwrap();
    assert_eq!(reparsed.text_data(), b"/y/A.swift\0/y/B.swift\0");
}
