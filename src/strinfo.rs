//! A compact string map used by schema descriptors to encode choices,
//! enumerated values and aliases inside a single value blob.
//!
//! The map is an array of little-endian `u32` words. Each record is an
//! integer word immediately followed by a framed string: a marker byte
//! (`0xff` for a direct entry, `0xfe` for an alias), the UTF-8 content, a
//! nul terminator, zero padding up to a 4-byte boundary (minimum 8 bytes
//! total) and a final `0xff` byte. An alias record stores the word offset
//! of its target's integer instead of an enum value.
//!
//! Because a framed string occupies at least two words, `0xff`/`0xfe`
//! never occur inside UTF-8 and two integers never sit adjacent, a scan
//! cannot mistake an integer for string content or vice versa.
//!
//! A string map for 'foo' (value 1), 'bar' (value 2) and 'baz' (alias for
//! 'bar') looks like this:
//!
//! ```text
//! 01 00 00 00   ff 'f 'o 'o   00 00 00 ff   02 00 00 00
//! ff 'b 'a 'r   00 00 00 ff   03 00 00 00   fe 'b 'a 'z
//! 00 00 00 ff
//! ```

/// Strings are limited to 65 bytes, ie. 17 words after framing.
const MAX_WORDS: usize = 17;

/// Frames `string` as a sequence of little-endian words, or `None` if it
/// exceeds [`MAX_WORDS`].
fn string_to_words(string: &str, alias: bool) -> Option<Vec<u32>> {
    let size = string.len();
    let n_words = usize::max(2, (size + 6) >> 2);

    if n_words > MAX_WORDS {
        return None;
    }

    let mut bytes = vec![0; n_words * 4];
    bytes[0] = if alias { 0xfe } else { 0xff };
    bytes[1..1 + size].copy_from_slice(string.as_bytes());
    bytes[n_words * 4 - 1] = 0xff;

    let mut words = vec![0; n_words];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }

    Some(words)
}

/// Read-only view of an encoded string map.
///
/// Lookups on malformed data never panic; they return `None` or skip the
/// unreadable record.
#[derive(Clone, Copy, Debug)]
pub struct StringInfo<'a> {
    data: &'a [u8],
}

impl<'a> StringInfo<'a> {
    /// Wraps an encoded string map. Trailing bytes beyond the last whole
    /// word are ignored.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Number of whole words in the map.
    fn len(&self) -> usize {
        self.data.len() / 4
    }

    /// Word at `index`, which must be less than [`Self::len`].
    fn word(&self, index: usize) -> u32 {
        let offset = index * 4;
        u32::from_le_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ])
    }

    /// Scans for `needle` in the words starting at `base`, returning the
    /// matching index relative to `base`.
    fn scan(&self, base: usize, needle: &[u32]) -> Option<usize> {
        let length = self.len().saturating_sub(base);
        let n_words = needle.len();

        if length < n_words {
            return None;
        }

        let mut i = 0;
        while i <= length - n_words {
            let mut j = 0;
            while j < n_words && self.word(base + i + j) == needle[j] {
                j += 1;
            }

            if j == n_words {
                return Some(i);
            }

            i += usize::max(j, 1);
        }

        None
    }

    /// Scans for the framed form of `string` and returns the index of the
    /// integer word that precedes it.
    fn find_string(&self, string: &str, alias: bool) -> Option<usize> {
        if self.len() == 0 {
            return None;
        }

        let needle = string_to_words(string, alias)?;

        // The scan starts one word in, so an index into the shifted region
        // is also the absolute index of the preceding integer.
        self.scan(1, &needle)
    }

    /// Scans for an integer word holding `value`. The word must be framed
    /// by `0xff` bytes (or the start of the buffer) so that string content
    /// cannot match.
    fn find_integer(&self, value: u32) -> Option<usize> {
        for i in 0..self.len() {
            if self.word(i) == value
                && (i == 0 || self.data[i * 4 - 1] == 0xff)
                && self.data.get(i * 4 + 4) == Some(&0xff)
            {
                return Some(i);
            }
        }

        None
    }

    /// Nul-terminated UTF-8 string starting at byte `offset`.
    fn string_at(&self, offset: usize) -> Option<&'a str> {
        let bytes = self.data.get(offset..)?;
        let end = bytes.iter().position(|b| *b == 0)?;
        std::str::from_utf8(&bytes[..end]).ok()
    }

    /// Whether `string` is a direct entry of the map. Aliases don't count.
    pub fn is_string_valid(&self, string: &str) -> bool {
        self.find_string(string, false).is_some()
    }

    /// The integer value stored for the direct entry `string`.
    pub fn enum_from_string(&self, string: &str) -> Option<u32> {
        let index = self.find_string(string, false)?;
        Some(self.word(index))
    }

    /// The direct entry stored with integer `value`.
    pub fn string_from_enum(&self, value: u32) -> Option<&'a str> {
        let index = self.find_integer(value)?;
        self.string_at((index + 1) * 4 + 1)
    }

    /// Resolves the alias `alias` to its target direct entry.
    pub fn string_from_alias(&self, alias: &str) -> Option<&'a str> {
        let index = self.find_string(alias, true)?;
        let target = self.word(index) as usize;
        self.string_at((target + 1) * 4 + 1)
    }

    /// All direct entries in encoding order. Aliases and unreadable
    /// records are skipped.
    pub fn enumerate(&self) -> Vec<&'a str> {
        let mut strings = Vec::new();
        let end = self.len() * 4;

        // Skip the leading integer of the first record.
        let mut pos = 4;
        while pos < end {
            if self.data[pos] == 0xff {
                if let Some(string) = self.string_at(pos + 1) {
                    strings.push(string);
                }
            }

            // Step past the closing 0xff of this record and the integer of
            // the next one.
            match self.data[pos..end].iter().position(|b| *b == 0xff) {
                Some(offset) => pos += offset + 5,
                None => break,
            }
        }

        strings
    }
}

/// Builds an encoded string map by appending records.
///
/// ```
/// # use gvdb::strinfo::{StringInfo, StringInfoBuilder};
/// let mut builder = StringInfoBuilder::new();
/// builder.append_item("up", 1);
/// builder.append_item("down", 2);
/// assert!(builder.append_alias("dn", "down"));
///
/// let data = builder.build();
/// let info = StringInfo::new(&data);
/// assert_eq!(info.enum_from_string("up"), Some(1));
/// assert_eq!(info.string_from_alias("dn"), Some("down"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct StringInfoBuilder {
    data: Vec<u8>,
}

impl StringInfoBuilder {
    /// Create a new empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a direct entry mapping `string` to `value`. Returns false
    /// without appending anything if `string` exceeds 65 bytes.
    pub fn append_item(&mut self, string: &str, value: u32) -> bool {
        let words = match string_to_words(string, false) {
            Some(words) => words,
            None => return false,
        };

        self.data.extend_from_slice(&value.to_le_bytes());
        for word in words {
            self.data.extend_from_slice(&word.to_le_bytes());
        }

        true
    }

    /// Appends an alias record pointing at the direct entry `target`.
    /// Returns false if `target` has not been appended or `alias` exceeds
    /// 65 bytes.
    pub fn append_alias(&mut self, alias: &str, target: &str) -> bool {
        let index = match StringInfo::new(&self.data).find_string(target, false) {
            Some(index) => index,
            None => return false,
        };

        let words = match string_to_words(alias, true) {
            Some(words) => words,
            None => return false,
        };

        self.data.extend_from_slice(&(index as u32).to_le_bytes());
        for word in words {
            self.data.extend_from_slice(&word.to_le_bytes());
        }

        true
    }

    /// Whether `string` has been appended as a direct entry.
    pub fn contains(&self, string: &str) -> bool {
        StringInfo::new(&self.data).is_string_valid(string)
    }

    /// Whether any direct entry maps to `value`.
    pub fn contains_value(&self, value: u32) -> bool {
        StringInfo::new(&self.data).find_integer(value).is_some()
    }

    /// The encoded map, ready to be embedded in a value blob.
    pub fn build(self) -> Vec<u8> {
        self.data
    }
}
