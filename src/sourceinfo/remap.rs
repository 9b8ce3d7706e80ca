//! The file-path remapping engine.
//!
//! Two intentionally decoupled algorithms:
//!
//! - [`FilePathRemapper`] - pure string substitution through an ordered list of
//!   regex/replacement rules.
//! - [`FileIdRemapper`] - offset deduplication: maps old text-data offsets to
//!   stable new offsets while building the replacement text data region,
//!   substituting each referenced path exactly once.

use std::collections::HashMap;

use regex::Regex;

use crate::Result;

/// Extract the NUL-terminated path at `offset` within the text data region.
///
/// Offsets at or past the end of the region denote the empty string; a missing
/// terminator ends the path at the region boundary.
pub(crate) fn path_bytes_at(text_data: &[u8], offset: u32) -> &[u8] {
    let tail = text_data.get(offset as usize..).unwrap_or(&[]);
    match tail.iter().position(|&b| b == 0) {
        Some(end) => &tail[..end],
        None => tail,
    }
}

/// Ordered regex/replacement substitution over file path strings.
///
/// Rules are evaluated as a pipeline: each rule's output is the next rule's
/// input, so later rules can refine the result of earlier ones.
///
/// # Examples
///
/// ```rust
/// use swiftsourceinfo::sourceinfo::FilePathRemapper;
/// use regex::Regex;
///
/// let mut remapper = FilePathRemapper::new();
/// remapper.add_remap(Regex::new("^/build/").unwrap(), "/src/");
/// remapper.add_remap(Regex::new("/src/tmp/").unwrap(), "/src/gen/");
/// assert_eq!(remapper.remap("/build/tmp/A.swift"), "/src/gen/A.swift");
/// ```
pub struct FilePathRemapper {
    remaps: Vec<(Regex, String)>,
}

impl FilePathRemapper {
    /// Create a remapper with no rules; [`FilePathRemapper::remap`] is then the
    /// identity function.
    #[must_use]
    pub fn new() -> Self {
        FilePathRemapper { remaps: Vec::new() }
    }

    /// Append a rule. Rules apply in insertion order.
    pub fn add_remap(&mut self, pattern: Regex, replacement: impl Into<String>) {
        self.remaps.push((pattern, replacement.into()));
    }

    /// `true` if no rules have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaps.is_empty()
    }

    /// Run `input` through every rule in order and return the final result.
    #[must_use]
    pub fn remap(&self, input: &str) -> String {
        let mut result = input.to_string();
        for (pattern, replacement) in &self.remaps {
            result = pattern
                .replace_all(&result, replacement.as_str())
                .into_owned();
        }
        result
    }
}

impl Default for FilePathRemapper {
    fn default() -> Self {
        Self::new()
    }
}

/// Deduplicating mapper from old text-data offsets to offsets in a freshly built
/// text data region.
///
/// The first time an old offset is seen, its path is looked up in the current
/// text data, run through the path remapper, and appended (NUL-terminated) to the
/// replacement buffer; the buffer's prior length becomes the new offset and the
/// old/new pair is recorded for reporting. Every later lookup of the same old
/// offset returns the memoized new offset without recomputation or a second
/// report entry. Two distinct old offsets stay distinct even when their paths
/// remap to identical strings.
pub struct FileIdRemapper<'p> {
    path_remapper: &'p FilePathRemapper,
    index_map: HashMap<u32, u32>,
    buffer: Vec<u8>,
    report: Vec<(String, String)>,
}

impl<'p> FileIdRemapper<'p> {
    /// Create an empty mapper substituting paths through `path_remapper`.
    #[must_use]
    pub fn new(path_remapper: &'p FilePathRemapper) -> Self {
        FileIdRemapper {
            path_remapper,
            index_map: HashMap::new(),
            buffer: Vec::new(),
            report: Vec::new(),
        }
    }

    /// Map an old text-data offset to its offset in the replacement region.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the referenced path is not valid
    /// UTF-8 or if the replacement region would outgrow the 32-bit offset space.
    pub fn map_file_id(&mut self, file_id: u32, text_data: &[u8]) -> Result<u32> {
        if let Some(&new_id) = self.index_map.get(&file_id) {
            return Ok(new_id);
        }

        let old_path = std::str::from_utf8(path_bytes_at(text_data, file_id))
            .map_err(|_| malformed_error!("File path at offset {} is not valid UTF-8", file_id))?;
        let new_path = self.path_remapper.remap(old_path);

        let new_id = u32::try_from(self.buffer.len())
            .map_err(|_| malformed_error!("Text data region exceeds 32-bit offsets"))?;
        self.buffer.extend_from_slice(new_path.as_bytes());
        self.buffer.push(0);

        self.index_map.insert(file_id, new_id);
        self.report.push((old_path.to_string(), new_path));

        Ok(new_id)
    }

    /// Finish mapping, returning the replacement text data region and the
    /// old/new report pairs in first-encounter order.
    #[must_use]
    pub fn into_parts(self) -> (Vec<u8>, Vec<(String, String)>) {
        (self.buffer, self.report)
    }
}
