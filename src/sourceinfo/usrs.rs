//! Read-only access to the persisted declaration-USR hash table.
//!
//! The decl-USRs blob embeds an on-disk chained hash table mapping a
//! declaration's unique string identifier (USR) to the index of its record in
//! the basic decl-locs region. The table uses external chaining and a djb
//! content hash with the fixed seed [`crate::sourceinfo::SOURCEINFO_HASH_SEED`].
//!
//! Blob layout: the first four bytes are reserved; the items region follows at
//! offset 4 (per bucket a `u16` item count, then per item a `u32` hash, a `u32`
//! key length, the key bytes, and the `u32` value). The table header lives at
//! the offset carried in the record's first scalar field: bucket count (a power
//! of two), entry count, then one `u32` offset per bucket, `0` marking an empty
//! bucket.
//!
//! The table is never rewritten; its keys and values reference neither file
//! paths nor text-data offsets.

use crate::{
    sourceinfo::{records::read_u32_at, SOURCEINFO_HASH_SEED},
    Result,
};

/// The djb string hash used to bucket USR keys.
pub(crate) fn djb_hash(bytes: &[u8], seed: u32) -> u32 {
    bytes
        .iter()
        .fold(seed, |hash, &byte| hash_step(hash, byte))
}

fn hash_step(hash: u32, byte: u8) -> u32 {
    hash.wrapping_shl(5)
        .wrapping_add(hash)
        .wrapping_add(u32::from(byte))
}

/// Read-only lookup view of the persisted USR table.
///
/// # Examples
///
/// ```rust,no_run
/// # fn demo(info: &swiftsourceinfo::SourceInfo) -> swiftsourceinfo::Result<()> {
/// if let Some(table) = info.usr_table()? {
///     for entry in table.iter() {
///         let (usr, record_index) = entry?;
///         println!("{} -> record {}", usr, record_index);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct UsrTable<'a> {
    /// The full decl-USRs blob; all stored offsets are relative to its start
    data: &'a [u8],
    num_buckets: u32,
    num_entries: u32,
    /// Offset of the bucket-offset array within `data`
    buckets_pos: usize,
}

impl<'a> UsrTable<'a> {
    /// Construct the view from the decl-USRs record's scalar fields and blob.
    ///
    /// Returns `None` when the record carried no fields or no blob, i.e. the
    /// module has no USR table.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a corrupt header and
    /// [`crate::Error::OutOfBounds`] for a truncated one.
    pub fn parse(fields: &[u64], data: &'a [u8]) -> Result<Option<UsrTable<'a>>> {
        let Some(&table_offset) = fields.first() else {
            return Ok(None);
        };
        if data.is_empty() {
            return Ok(None);
        }

        let table_offset = usize::try_from(table_offset)
            .map_err(|_| malformed_error!("USR table offset out of range"))?;
        let num_buckets = read_u32_at(data, table_offset)?;
        let num_entries = read_u32_at(data, table_offset + 4)?;
        if num_buckets == 0 || !num_buckets.is_power_of_two() {
            return Err(malformed_error!(
                "USR table bucket count {} is not a power of two",
                num_buckets
            ));
        }

        let buckets_pos = table_offset + 8;
        let buckets_end = buckets_pos + num_buckets as usize * 4;
        if buckets_end > data.len() {
            return Err(crate::Error::OutOfBounds);
        }

        Ok(Some(UsrTable {
            data,
            num_buckets,
            num_entries,
            buckets_pos,
        }))
    }

    /// Number of entries stored in the table.
    #[must_use]
    pub fn len(&self) -> u32 {
        self.num_entries
    }

    /// `true` if the table stores no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_entries == 0
    }

    /// Look up the basic decl-locs record index of a declaration USR.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on a truncated bucket chain.
    pub fn get(&self, key: &str) -> Result<Option<u32>> {
        let key_hash = djb_hash(key.as_bytes(), SOURCEINFO_HASH_SEED);
        let bucket = key_hash & (self.num_buckets - 1);
        let chain_pos = read_u32_at(self.data, self.buckets_pos + bucket as usize * 4)? as usize;
        if chain_pos == 0 {
            return Ok(None);
        }

        let num_items = u16::from_le_bytes(
            self.data
                .get(chain_pos..chain_pos + 2)
                .ok_or(crate::Error::OutOfBounds)?
                .try_into()
                .unwrap(),
        );

        let mut pos = chain_pos + 2;
        for _ in 0..num_items {
            let item_hash = read_u32_at(self.data, pos)?;
            let key_len = read_u32_at(self.data, pos + 4)? as usize;
            let key_pos = pos + 8;
            let value_pos = key_pos + key_len;
            if value_pos + 4 > self.data.len() {
                return Err(crate::Error::OutOfBounds);
            }

            if item_hash == key_hash && &self.data[key_pos..value_pos] == key.as_bytes() {
                return Ok(Some(read_u32_at(self.data, value_pos)?));
            }
            pos = value_pos + 4;
        }

        Ok(None)
    }

    /// Iterate over all `(USR, record index)` pairs in on-disk order.
    #[must_use]
    pub fn iter(&self) -> UsrTableIter<'a> {
        UsrTableIter {
            data: self.data,
            // Items start right after the reserved leading word.
            pos: 4,
            entries_left: self.num_entries,
            items_left_in_bucket: 0,
        }
    }
}

/// Iterator over the entries of a [`UsrTable`].
pub struct UsrTableIter<'a> {
    data: &'a [u8],
    pos: usize,
    entries_left: u32,
    items_left_in_bucket: u16,
}

impl<'a> Iterator for UsrTableIter<'a> {
    type Item = Result<(&'a str, u32)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.entries_left == 0 {
            return None;
        }
        self.entries_left -= 1;
        Some(self.read_entry())
    }
}

impl<'a> UsrTableIter<'a> {
    fn read_entry(&mut self) -> Result<(&'a str, u32)> {
        if self.items_left_in_bucket == 0 {
            // Each bucket chain opens with its item count.
            let bytes = self
                .data
                .get(self.pos..self.pos + 2)
                .ok_or(crate::Error::OutOfBounds)?;
            self.items_left_in_bucket = u16::from_le_bytes(bytes.try_into().unwrap());
            self.pos += 2;
            if self.items_left_in_bucket == 0 {
                return Err(malformed_error!("USR table bucket with zero items"));
            }
        }
        self.items_left_in_bucket -= 1;

        let key_len = read_u32_at(self.data, self.pos + 4)? as usize;
        let key_pos = self.pos + 8;
        let value_pos = key_pos + key_len;
        let key_bytes = self
            .data
            .get(key_pos..value_pos)
            .ok_or(crate::Error::OutOfBounds)?;
        let key = std::str::from_utf8(key_bytes)
            .map_err(|_| malformed_error!("USR key is not valid UTF-8"))?;
        let value = read_u32_at(self.data, value_pos)?;
        self.pos = value_pos + 4;

        Ok((key, value))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Serialize a USR table blob the way the Swift compiler lays it out,
    /// returning the record fields and the blob.
    pub(crate) fn build_usr_table(entries: &[(&str, u32)]) -> (Vec<u64>, Vec<u8>) {
        let num_buckets: u32 = 4;
        let mut buckets: Vec<Vec<(&str, u32)>> = vec![Vec::new(); num_buckets as usize];
        for &(key, value) in entries {
            let bucket = djb_hash(key.as_bytes(), SOURCEINFO_HASH_SEED) & (num_buckets - 1);
            buckets[bucket as usize].push((key, value));
        }

        let mut blob = vec![0u8; 4]; // reserved word, keeps chain offsets nonzero
        let mut chain_offsets = vec![0u32; num_buckets as usize];
        for (bucket, items) in buckets.iter().enumerate() {
            if items.is_empty() {
                continue;
            }
            chain_offsets[bucket] = blob.len() as u32;
            blob.extend_from_slice(&(items.len() as u16).to_le_bytes());
            for &(key, value) in items {
                let hash = djb_hash(key.as_bytes(), SOURCEINFO_HASH_SEED);
                blob.extend_from_slice(&hash.to_le_bytes());
                blob.extend_from_slice(&(key.len() as u32).to_le_bytes());
                blob.extend_from_slice(key.as_bytes());
                blob.extend_from_slice(&value.to_le_bytes());
            }
        }

        while blob.len() % 4 != 0 {
            blob.push(0);
        }
        let table_offset = blob.len() as u64;
        blob.extend_from_slice(&num_buckets.to_le_bytes());
        blob.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        for offset in chain_offsets {
            blob.extend_from_slice(&offset.to_le_bytes());
        }

        (vec![table_offset], blob)
    }

    #[test]
    fn djb_hash_matches_reference_values() {
        // h = seed; h = h * 33 + byte for every byte.
        assert_eq!(djb_hash(b"", 5387), 5387);
        assert_eq!(djb_hash(b"a", 5387), 5387 * 33 + u32::from(b'a'));
        assert_eq!(
            djb_hash(b"ab", 5387),
            (5387 * 33 + u32::from(b'a')) * 33 + u32::from(b'b')
        );
    }

    #[test]
    fn lookup_finds_every_inserted_key() {
        let entries = [
            ("s:4test1AV", 0u32),
            ("s:4test1BV", 1),
            ("s:4test1CV3funcyyF", 2),
            ("s:4test4longAAV5fieldSivp", 3),
        ];
        let (fields, blob) = build_usr_table(&entries);
        let table = UsrTable::parse(&fields, &blob).unwrap().unwrap();

        assert_eq!(table.len(), 4);
        for (key, value) in entries {
            assert_eq!(table.get(key).unwrap(), Some(value), "key {key}");
        }
        assert_eq!(table.get("s:4test7missingV").unwrap(), None);
    }

    #[test]
    fn iteration_yields_every_entry_once() {
        let entries = [("s:1aAV", 7u32), ("s:1bBV", 9), ("s:1cCV", 11)];
        let (fields, blob) = build_usr_table(&entries);
        let table = UsrTable::parse(&fields, &blob).unwrap().unwrap();

        let mut seen: Vec<(String, u32)> = table
            .iter()
            .map(|entry| entry.map(|(key, value)| (key.to_string(), value)))
            .collect::<Result<_>>()
            .unwrap();
        seen.sort();

        let mut expected: Vec<(String, u32)> = entries
            .iter()
            .map(|&(key, value)| (key.to_string(), value))
            .collect();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn missing_fields_or_blob_mean_no_table() {
        assert!(UsrTable::parse(&[], b"data").unwrap().is_none());
        assert!(UsrTable::parse(&[8], b"").unwrap().is_none());
    }
}
