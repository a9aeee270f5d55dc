use crate::read::hash_item::{HashItem, ItemType};
use crate::read::File;
use crate::util::djb_hash;
use std::cmp::min;
use std::fmt::{Debug, Formatter};
use std::mem::size_of;
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// The header of a GVDB hash table.
///
/// ```text
/// +-------+-----------------------+
/// | Bytes | Field                 |
/// +-------+-----------------------+
/// |     4 | number of bloom words |
/// +-------+-----------------------+
/// |     4 | number of buckets     |
/// +-------+-----------------------+
/// ```
///
/// The top 5 bits of the bloom words field carry the bloom shift, the low
/// 27 bits the word count.
#[repr(C)]
#[derive(Copy, Clone, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub(crate) struct HashHeader {
    n_bloom_words: U32,
    n_buckets: U32,
}

impl HashHeader {
    pub fn new(bloom_shift: u32, n_bloom_words: u32, n_buckets: u32) -> Self {
        assert!(n_bloom_words < (1 << 27));

        Self {
            n_bloom_words: U32::new(bloom_shift << 27 | n_bloom_words),
            n_buckets: U32::new(n_buckets),
        }
    }

    pub fn n_bloom_words(&self) -> u32 {
        self.n_bloom_words.get() & ((1 << 27) - 1)
    }

    pub fn bloom_shift(&self) -> u32 {
        self.n_bloom_words.get() >> 27
    }

    pub fn n_buckets(&self) -> u32 {
        self.n_buckets.get()
    }
}

impl Debug for HashHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashHeader")
            .field("n_bloom_words", &self.n_bloom_words())
            .field("bloom_shift", &self.bloom_shift())
            .field("n_buckets", &self.n_buckets())
            .finish()
    }
}

/// A hash table inside a GVDB file.
///
/// ```text
/// +--------+---------------------------+
/// |  Bytes | Field                     |
/// +--------+---------------------------+
/// |      4 | number of bloom words (b) |
/// +--------+---------------------------+
/// |      4 | number of buckets (n)     |
/// +--------+---------------------------+
/// |  b * 4 | bloom words               |
/// +--------+---------------------------+
/// |  n * 4 | buckets                   |
/// +--------+---------------------------+
/// | x * 24 | hash items                |
/// +--------+---------------------------+
/// ```
///
/// A table never reports errors after it has been set up. Every lookup is
/// bounds-checked against the backing file, and anything that does not
/// check out behaves exactly like an absent key.
#[derive(Clone)]
pub struct Table<'a, 'file> {
    pub(crate) file: &'a File<'file>,
    pub(crate) header: HashHeader,
    bloom_words: &'a [U32],
    buckets: &'a [U32],
    items: &'a [HashItem],
}

impl<'a, 'file> Table<'a, 'file> {
    /// Interpret a chunk of bytes as a hash table region. A region that does
    /// not parse yields an empty table. Key fragments and values live
    /// elsewhere in the file, hence the backing `file` reference.
    pub(crate) fn setup(data: &'a [u8], file: &'a File<'file>) -> Self {
        Self::parse(data, file).unwrap_or(Self {
            file,
            header: HashHeader::new(0, 0, 0),
            bloom_words: &[],
            buckets: &[],
            items: &[],
        })
    }

    fn parse(data: &'a [u8], file: &'a File<'file>) -> Option<Self> {
        let (header, rest) = HashHeader::read_from_prefix(data).ok()?;
        let (bloom_words, rest) =
            <[U32]>::ref_from_prefix_with_elems(rest, header.n_bloom_words() as usize).ok()?;
        let (buckets, rest) =
            <[U32]>::ref_from_prefix_with_elems(rest, header.n_buckets() as usize).ok()?;

        // Trailing bytes that do not make up a whole item are ignored
        let n_items = rest.len() / size_of::<HashItem>();
        let (items, _) = <[HashItem]>::ref_from_prefix_with_elems(rest, n_items).ok()?;

        Some(Self {
            file,
            header,
            bloom_words,
            buckets,
            items,
        })
    }

    /// Check whether the hash value passes the bloom filter
    fn bloom_filter(&self, hash_value: u32) -> bool {
        if self.bloom_words.is_empty() {
            return true;
        }

        let word = (hash_value / 32) % self.bloom_words.len() as u32;
        let mut mask = 1u32 << (hash_value & 31);
        mask |= 1 << ((hash_value >> self.header.bloom_shift()) & 31);

        let bloom_word = self.bloom_words[word as usize].get();
        bloom_word & mask == mask
    }

    /// Return the string that corresponds to the key fragment of `item`.
    fn key_for_item(&self, item: &HashItem) -> Option<&'a str> {
        let data = self.file.dereference(&item.key_ptr(), 1)?;
        std::str::from_utf8(data).ok()
    }

    /// Recurse through parents and check whether `item` has the full path
    /// name `key`.
    fn check_key(&self, item: &HashItem, key: &str) -> bool {
        let Some(fragment) = self.key_for_item(item) else {
            return false;
        };

        if !key.ends_with(fragment) {
            return false;
        }

        let parent = item.parent();
        if key.len() == fragment.len() && parent == u32::MAX {
            return true;
        }

        // An empty fragment cannot make progress towards the root and would
        // recurse forever on a parent loop
        if parent < self.items.len() as u32 && !fragment.is_empty() {
            let parent_item = &self.items[parent as usize];
            let remaining = key.len() - fragment.len();
            return self.check_key(parent_item, &key[..remaining]);
        }

        false
    }

    /// Find the item for `key` with the given type tag.
    ///
    /// Candidate items whose hash and key match but whose type differs are
    /// skipped, an item of a different type at the same key does not shadow
    /// the one asked for.
    fn lookup(&self, key: &str, typ: ItemType) -> Option<&'a HashItem> {
        if self.buckets.is_empty() || self.items.is_empty() {
            return None;
        }

        let hash_value = djb_hash(key);
        if !self.bloom_filter(hash_value) {
            return None;
        }

        let bucket = (hash_value % self.buckets.len() as u32) as usize;
        let mut itemno = min(self.buckets[bucket].get() as usize, self.items.len());

        let lastno = if bucket + 1 < self.buckets.len() {
            min(self.buckets[bucket + 1].get() as usize, self.items.len())
        } else {
            self.items.len()
        };

        while itemno < lastno {
            let item = &self.items[itemno];
            if hash_value == item.hash_value()
                && item.typ() == Some(typ)
                && self.check_key(item, key)
            {
                return Some(item);
            }

            itemno += 1;
        }

        None
    }

    /// Lists the full key names contained in the hash table, in item order.
    ///
    /// Items whose parent chain is broken, cyclic, or whose key fragment
    /// does not resolve are omitted.
    pub fn names(&self) -> Vec<String> {
        let count = self.items.len();
        let mut names: Vec<Option<String>> = vec![None; count];

        let mut filled = 0;
        while filled < count {
            let mut inserted = 0;
            for index in 0..count {
                if names[index].is_some() {
                    continue;
                }

                let item = &self.items[index];
                let Some(fragment) = self.key_for_item(item) else {
                    continue;
                };

                let parent = item.parent();
                if parent == u32::MAX {
                    names[index] = Some(fragment.to_string());
                    inserted += 1;
                } else if (parent as usize) < count && parent as usize != index {
                    // Depends on the parent being named first
                    let Some(parent_name) = &names[parent as usize] else {
                        continue;
                    };

                    let name = format!("{parent_name}{fragment}");
                    names[index] = Some(name);
                    inserted += 1;
                }
            }

            if inserted == 0 {
                // The remaining items are unreachable from any root, leave
                // them out instead of looping
                break;
            }

            filled += inserted;
        }

        names.into_iter().flatten().collect()
    }

    /// The value bytes for `key`, if it holds a serialized variant.
    fn value_bytes(&self, key: &str) -> Option<&'a [u8]> {
        let item = self.lookup(key, ItemType::Value)?;
        self.file.dereference(item.value_ptr(), 8)
    }

    /// Whether `key` exists in the table and holds a value.
    pub fn has_value(&self, key: &str) -> bool {
        self.value_bytes(key).is_some()
    }

    fn deserialize_value(
        &self,
        bytes: &[u8],
        endian: zvariant::Endian,
    ) -> Option<zvariant::OwnedValue> {
        let context = zvariant::serialized::Context::new_gvariant(endian, 0);
        let data = zvariant::serialized::Data::new(bytes, context);
        Some(data.deserialize::<zvariant::OwnedValue>().ok()?.0)
    }

    /// Returns the value for `key` as a [`zvariant::OwnedValue`].
    ///
    /// The value is decoded in the endianness of the file, so it reads the
    /// same on every host. Unless you need to inspect the value at runtime
    /// it is easier to use [`Table::get`].
    pub fn get_value(&self, key: &str) -> Option<zvariant::OwnedValue> {
        self.deserialize_value(self.value_bytes(key)?, self.file.endianness())
    }

    /// Returns the value for `key` decoded in host byte order, without
    /// compensating for a byteswapped file.
    ///
    /// Multi-byte numbers read from a foreign-endian file come out swapped.
    /// Use this when a caller performs its own byteswapping pass.
    pub fn get_raw_value(&self, key: &str) -> Option<zvariant::OwnedValue> {
        self.deserialize_value(self.value_bytes(key)?, zvariant::Endian::native())
    }

    /// Returns the value for `key`, converted to `T`.
    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: TryFrom<zvariant::OwnedValue>,
    {
        T::try_from(self.get_value(key)?).ok()
    }

    /// Returns the nested table at `key`, if one is found.
    ///
    /// A nested table region that fails to parse comes back empty, like the
    /// root table does.
    pub fn get_table(&self, key: &str) -> Option<Table<'a, 'file>> {
        let item = self.lookup(key, ItemType::HashTable)?;
        let data = self.file.dereference(item.value_ptr(), 4)?;
        Some(Table::setup(data, self.file))
    }

    /// Lists the direct children recorded under `key`, or `None` if `key`
    /// holds no child list.
    ///
    /// Children are returned by their simple (fragment) name. An entry whose
    /// index or key fragment does not resolve becomes an empty string so
    /// positions stay stable.
    pub fn list(&self, key: &str) -> Option<Vec<String>> {
        let item = self.lookup(key, ItemType::List)?;
        let data = self.file.dereference(item.value_ptr(), 4)?;

        let n_children = data.len() / size_of::<U32>();
        let (indices, _) = <[U32]>::ref_from_prefix_with_elems(data, n_children).ok()?;

        Some(
            indices
                .iter()
                .map(|index| {
                    self.items
                        .get(index.get() as usize)
                        .and_then(|child| self.key_for_item(child))
                        .unwrap_or("")
                        .to_string()
                })
                .collect(),
        )
    }
}

impl Debug for Table<'_, '_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("header", &self.header)
            .field(
                "map",
                &self
                    .names()
                    .iter()
                    .map(|name| {
                        let value = self
                            .get_value(name)
                            .map(|value| Box::new(value) as Box<dyn Debug>)
                            .or_else(|| {
                                self.get_table(name).map(|table| Box::new(table) as Box<dyn Debug>)
                            })
                            .or_else(|| {
                                self.list(name).map(|list| Box::new(list) as Box<dyn Debug>)
                            });
                        (name.clone(), value)
                    })
                    .collect::<std::collections::HashMap<_, _>>(),
            )
            .finish()
    }
}
