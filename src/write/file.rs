use crate::read::{HashHeader, HashItem, Header, ItemType, Pointer};
use crate::util::align_offset;
use crate::write::error::{Error, Result};
use crate::write::item::Content;
use crate::write::table::TableBuilder;
use std::collections::VecDeque;
use std::io::Write;
use std::mem::size_of;
use std::path::Path;
use std::rc::Rc;
use zerocopy::IntoBytes;

#[derive(Debug)]
struct Chunk {
    // The pointer that addresses the chunk in the finished file
    pointer: Pointer,

    // A boxed slice guarantees the size does not change after allocation
    data: Box<[u8]>,
}

/// Serializes a [`TableBuilder`] tree into GVDB file data.
///
/// # Example
/// ```
/// use std::rc::Rc;
/// use std::cell::RefCell;
/// use gvdb::write::{FileWriter, TableBuilder};
///
/// let root = Rc::new(RefCell::new(TableBuilder::new()));
/// root.borrow_mut().insert_string("string", "test string");
/// let data = FileWriter::new().write_to_vec(&root.borrow()).unwrap();
/// ```
pub struct FileWriter {
    offset: usize,
    chunks: VecDeque<Chunk>,
    endianness: zvariant::Endian,

    // Addresses of the tables currently being serialized, to catch a table
    // that contains itself
    tables_in_progress: Vec<usize>,
}

impl FileWriter {
    /// Create a new instance configured for writing little endian data
    /// (preferred endianness).
    /// ```
    /// let file_writer = gvdb::write::FileWriter::new();
    /// ```
    pub fn new() -> Self {
        Self::with_endianness(zvariant::Endian::Little)
    }

    /// Create a new instance configured for writing big endian data
    /// (not recommended for most use cases).
    ///
    /// Readers on little endian hosts transparently swap the variant
    /// payloads back.
    pub fn for_big_endian() -> Self {
        Self::with_endianness(zvariant::Endian::Big)
    }

    fn with_endianness(endianness: zvariant::Endian) -> Self {
        let mut this = Self {
            offset: 0,
            chunks: Default::default(),
            endianness,
            tables_in_progress: Vec::new(),
        };

        // Reserve space for the header, its contents are only known after
        // the root table has been added
        this.allocate_empty_chunk(size_of::<Header>(), 1);
        this
    }

    fn allocate_chunk_with_data(&mut self, data: Box<[u8]>, alignment: usize) -> (usize, Pointer) {
        self.offset = align_offset(self.offset, alignment);

        let offset_start = self.offset;
        let offset_end = offset_start + data.len();
        let pointer = Pointer::new(offset_start, offset_end);

        self.offset = offset_end;

        self.chunks.push_back(Chunk { pointer, data });
        (self.chunks.len() - 1, pointer)
    }

    fn allocate_empty_chunk(&mut self, size: usize, alignment: usize) -> (usize, Pointer) {
        self.allocate_chunk_with_data(vec![0; size].into_boxed_slice(), alignment)
    }

    fn add_value(&mut self, value: &zvariant::Value) -> Result<Pointer> {
        let context = zvariant::serialized::Context::new_gvariant(self.endianness, 0);
        let data = zvariant::to_bytes(context, value)?;

        Ok(self.allocate_chunk_with_data(Box::from(&*data), 8).1)
    }

    fn add_string(&mut self, string: &str) -> Pointer {
        let data = string.to_string().into_boxed_str().into_boxed_bytes();
        self.allocate_chunk_with_data(data, 1).1
    }

    fn add_child_list(&mut self, children: &[Rc<crate::write::Item>]) -> Pointer {
        let mut data = Vec::with_capacity(children.len() * size_of::<u32>());
        for child in children {
            data.extend_from_slice(&child.assigned_index().to_le_bytes());
        }

        self.allocate_chunk_with_data(data.into_boxed_slice(), 4).1
    }

    /// Serialize `table` at the current offset and return the pointer to
    /// the hash table region.
    fn add_hash_table(&mut self, table: &TableBuilder) -> Result<Pointer> {
        let table_addr = table as *const TableBuilder as usize;
        if self.tables_in_progress.contains(&table_addr) {
            return Err(Error::Consistency(
                "Hash table contains itself".to_string(),
            ));
        }
        self.tables_in_progress.push(table_addr);

        // One bucket per item. Iteration is in key order so the same tree
        // always produces the same file.
        let n_buckets = table.len();
        let mut buckets: Vec<Vec<_>> = vec![Vec::new(); n_buckets];
        for item in table.items() {
            let bucket = (item.hash_value() % n_buckets as u32) as usize;
            buckets[bucket].push(item.clone());
        }

        let mut index = 0;
        for bucket in &buckets {
            for item in bucket {
                item.set_assigned_index(index);
                index += 1;
            }
        }

        let header = HashHeader::new(0, 0, n_buckets as u32);
        let buckets_offset = size_of::<HashHeader>();
        let items_offset = buckets_offset + n_buckets * size_of::<u32>();
        let size = items_offset + table.len() * size_of::<HashItem>();

        let (chunk_index, pointer) = self.allocate_empty_chunk(size, 4);
        self.chunks[chunk_index].data[..size_of::<HashHeader>()]
            .copy_from_slice(header.as_bytes());

        let mut n_item = 0usize;
        for (bucket_index, bucket) in buckets.iter().enumerate() {
            let bucket_start = buckets_offset + bucket_index * size_of::<u32>();
            self.chunks[chunk_index].data[bucket_start..bucket_start + size_of::<u32>()]
                .copy_from_slice(&(n_item as u32).to_le_bytes());

            for item in bucket {
                let (parent_index, fragment) = match item.parent() {
                    Some(parent) => (
                        parent.assigned_index(),
                        item.key().strip_prefix(parent.key()).unwrap_or(""),
                    ),
                    None => (u32::MAX, item.key()),
                };

                if fragment.is_empty() {
                    return Err(Error::Consistency(format!(
                        "Item '{}' has an empty key fragment",
                        item.key()
                    )));
                }

                // The key size is stored as a u16
                if fragment.len() > u16::MAX as usize {
                    return Err(Error::Consistency(format!(
                        "Key fragment of item '{}' exceeds {} bytes",
                        item.key(),
                        u16::MAX
                    )));
                }

                let key_ptr = self.add_string(fragment);

                let (typ, value_ptr) = match &*item.content() {
                    Content::Value(value) => (ItemType::Value, self.add_value(value)?),
                    Content::Table(child_table) => (
                        ItemType::HashTable,
                        self.add_hash_table(&child_table.borrow())?,
                    ),
                    Content::None => {
                        let children = item.children();
                        if children.is_empty() {
                            return Err(Error::Consistency(format!(
                                "Item '{}' has no value, hash table, or children",
                                item.key()
                            )));
                        }

                        (ItemType::List, self.add_child_list(&children))
                    }
                };

                let hash_item = HashItem::new(
                    item.hash_value(),
                    parent_index,
                    key_ptr,
                    typ,
                    value_ptr,
                );

                let item_start = items_offset + n_item * size_of::<HashItem>();
                self.chunks[chunk_index].data[item_start..item_start + size_of::<HashItem>()]
                    .copy_from_slice(hash_item.as_bytes());

                n_item += 1;
            }
        }

        self.tables_in_progress.pop();
        Ok(pointer)
    }

    fn file_size(&self) -> usize {
        self.chunks[self.chunks.len() - 1].pointer.end() as usize
    }

    fn serialize(mut self, root: Pointer, writer: &mut dyn Write) -> Result<usize> {
        let byteswap = self.endianness == zvariant::Endian::Big;
        let header = Header::new(byteswap, 0, root);
        self.chunks[0].data[..size_of::<Header>()].copy_from_slice(header.as_bytes());

        let mut size = 0;
        for chunk in self.chunks {
            // Pad up to the chunk's recorded offset
            if size < chunk.pointer.start() as usize {
                let padding = chunk.pointer.start() as usize - size;
                size += padding;
                writer.write_all(&vec![0; padding])?;
            }

            size += chunk.data.len();
            writer.write_all(&chunk.data)?;
        }

        Ok(size)
    }

    /// Serialize `table` and write the file data into the provided
    /// [`std::io::Write`]. Returns the number of bytes written.
    pub fn write(mut self, table: &TableBuilder, writer: &mut dyn Write) -> Result<usize> {
        let root = self.add_hash_table(table)?;
        self.serialize(root, writer)
    }

    /// Serialize `table` into a [`Vec<u8>`] with the GVDB file data.
    pub fn write_to_vec(mut self, table: &TableBuilder) -> Result<Vec<u8>> {
        let root = self.add_hash_table(table)?;
        let mut vec = Vec::with_capacity(self.file_size());
        self.serialize(root, &mut vec)?;
        Ok(vec)
    }

    /// Serialize `table` and atomically replace the file at `path` with the
    /// result.
    ///
    /// The data is written to a temporary file in the same directory and
    /// renamed over `path`, a failure part-way leaves the old file in
    /// place.
    pub fn write_to_path(self, table: &TableBuilder, path: &Path) -> Result<()> {
        let data = self.write_to_vec(table)?;
        let io_err = |err| Error::Io(err, Some(path.to_path_buf()));

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        file.write_all(&data).map_err(io_err)?;
        file.persist(path).map_err(|err| io_err(err.error))?;

        Ok(())
    }

    /// Serialize `table` and atomically replace the file at `path`, doing
    /// the file I/O on the tokio runtime.
    ///
    /// If `cancel` fires before the replace completes the future resolves
    /// with [`Error::Cancelled`], the temporary file is removed and the old
    /// file stays in place.
    #[cfg(feature = "async")]
    pub async fn write_to_path_async(
        self,
        table: &TableBuilder<'_>,
        path: &Path,
        cancel: Option<&Cancel>,
    ) -> Result<()> {
        if cancel.is_some_and(Cancel::is_cancelled) {
            return Err(Error::Cancelled);
        }

        let data = self.write_to_vec(table)?;
        let io_err = |err| Error::Io(err, Some(path.to_path_buf()));

        let file_name = path.file_name().and_then(|name| name.to_str()).ok_or_else(|| {
            Error::Io(
                std::io::Error::from(std::io::ErrorKind::InvalidInput),
                Some(path.to_path_buf()),
            )
        })?;
        let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

        let replace = async {
            tokio::fs::write(&tmp_path, &data).await?;
            tokio::fs::rename(&tmp_path, path).await
        };

        match cancel {
            None => replace.await.map_err(io_err),
            Some(cancel) => {
                tokio::select! {
                    res = replace => res.map_err(io_err),
                    _ = cancel.cancelled() => {
                        let _ = tokio::fs::remove_file(&tmp_path).await;
                        Err(Error::Cancelled)
                    }
                }
            }
        }
    }
}

impl Default for FileWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// A cancellation token for [`FileWriter::write_to_path_async`].
///
/// Shared by reference, one token can guard several writes. Once cancelled
/// it stays cancelled.
#[cfg(feature = "async")]
#[derive(Debug, Default)]
pub struct Cancel {
    flag: std::sync::atomic::AtomicBool,
    notify: tokio::sync::Notify,
}

#[cfg(feature = "async")]
impl Cancel {
    /// Create a new token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake all pending waiters.
    pub fn cancel(&self) {
        self.flag.store(true, std::sync::atomic::Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Whether [`Cancel::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Completes once the token is cancelled.
    pub async fn cancelled(&self) {
        // Register before checking the flag so a concurrent cancel() is
        // never missed
        let notified = self.notify.notified();

        if self.is_cancelled() {
            return;
        }

        notified.await;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::read::File;
    use crate::test::*;
    use matches::assert_matches;
    #[allow(unused_imports)]
    use pretty_assertions::{assert_eq, assert_ne};
    use std::borrow::Cow;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::io::Cursor;

    #[test]
    fn derives() {
        let chunk = Chunk {
            pointer: Pointer::NULL,
            data: Box::new([]),
        };
        assert!(format!("{chunk:?}").contains("Chunk"));
    }

    #[test]
    fn basic_put_get() {
        let mut table = TableBuilder::new();
        table
            .insert("greeting")
            .set_value(zvariant::Value::new("Hello, earthlings".to_string()));

        let data = FileWriter::new().write_to_vec(&table).unwrap();
        let file = File::from_bytes(Cow::Owned(data), false).unwrap();

        let greeting: String = file.hash_table().get("greeting").unwrap();
        assert_eq!(greeting, "Hello, earthlings");
    }

    #[test]
    fn nested_tables() {
        let root = Rc::new(RefCell::new(TableBuilder::new()));
        let inner = TableBuilder::new_child(&root, "a/");
        inner.borrow_mut().insert("x").set_value(7u32.into());
        root.borrow_mut().insert_string("b", "q");

        let data = FileWriter::new().write_to_vec(&root.borrow()).unwrap();
        let file = File::from_bytes(Cow::Owned(data), false).unwrap();
        let table = file.hash_table();

        let x: u32 = table.get_table("a/").unwrap().get("x").unwrap();
        assert_eq!(x, 7);
        let b: String = table.get("b").unwrap();
        assert_eq!(b, "q");

        // "a/" is a table, not a value
        assert!(!table.has_value("a/"));
        assert!(table.has_value("b"));
    }

    #[test]
    fn child_lists() {
        let mut table = TableBuilder::new();
        let parent = table.insert("p/");
        for (name, value) in [("p/one", 1u32), ("p/two", 2), ("p/three", 3)] {
            let item = table.insert(name);
            item.set_value(value.into());
            crate::write::Item::set_parent(&item, &parent);
        }

        let data = FileWriter::new().write_to_vec(&table).unwrap();
        let file = File::from_bytes(Cow::Owned(data), false).unwrap();
        let table = file.hash_table();

        let children: HashSet<String> = table.list("p/").unwrap().into_iter().collect();
        let expected: HashSet<String> =
            ["one", "two", "three"].iter().map(|s| s.to_string()).collect();
        assert_eq!(children, expected);

        let two: u32 = table.get("p/two").unwrap();
        assert_eq!(two, 2);

        // A plain value holds no child list
        assert_matches!(table.list("p/two"), None);
    }

    #[test]
    fn byteswap_round_trip() {
        let mut table = TableBuilder::new();
        table.insert("int").set_value(0x01020304u32.into());

        let data = FileWriter::for_big_endian().write_to_vec(&table).unwrap();

        // "GVariant" byteswapped at 32 bit boundaries
        assert_eq!("raVGtnai", std::str::from_utf8(&data[0..8]).unwrap());

        let file = File::from_bytes(Cow::Owned(data), false).unwrap();
        #[cfg(target_endian = "little")]
        assert!(file.is_byteswapped());

        let int: u32 = file.hash_table().get("int").unwrap();
        assert_eq!(int, 0x01020304);
    }

    #[test]
    fn empty_table() {
        let table = TableBuilder::new();
        let data = FileWriter::new().write_to_vec(&table).unwrap();

        let file = File::from_bytes(Cow::Owned(data), false).unwrap();
        assert!(file.hash_table().names().is_empty());
    }

    #[test]
    fn reproducible_build() {
        let mut last_data: Option<Vec<u8>> = None;

        for _ in 0..100 {
            let mut table = TableBuilder::new();
            for num in 0..200 {
                let str = format!("{num}");
                table.insert_string(&str, &str);
            }

            let data = FileWriter::new().write_to_vec(&table).unwrap();
            if let Some(last_data) = last_data {
                assert_bytes_eq(&last_data, &data, "Reproducible builds");
            }

            last_data = Some(data);
        }
    }

    #[test]
    fn chunk_layout() {
        let root = Rc::new(RefCell::new(TableBuilder::new()));
        root.borrow_mut().insert("value").set_value(1u8.into());
        let inner = TableBuilder::new_child(&root, "inner/");
        inner.borrow_mut().insert_string("str", "x");

        let mut writer = FileWriter::new();
        writer.add_hash_table(&root.borrow()).unwrap();

        let mut last_end = 0;
        for chunk in &writer.chunks {
            // Pointers are monotonic and non-overlapping
            assert!(chunk.pointer.start() >= last_end);
            last_end = chunk.pointer.end();
        }

        let data = FileWriter::new().write_to_vec(&root.borrow()).unwrap();
        let file = File::from_bytes(Cow::Owned(data), false).unwrap();
        let value: u8 = file.hash_table().get("value").unwrap();
        assert_eq!(value, 1);
    }

    #[test]
    fn empty_key_fragment() {
        let mut table = TableBuilder::new();
        table.insert("").set_value(1u32.into());

        let err = FileWriter::new().write_to_vec(&table).unwrap_err();
        assert_matches!(err, Error::Consistency(_));
    }

    #[test]
    fn oversized_key_fragment() {
        // A key longer than u16::MAX would overflow the stored key size
        let key = "x".repeat(u16::MAX as usize + 2);
        let mut table = TableBuilder::new();
        table.insert(&key).set_value(1u32.into());

        let err = FileWriter::new().write_to_vec(&table).unwrap_err();
        assert_matches!(err, Error::Consistency(_));

        // The maximum still round trips
        let key = "x".repeat(u16::MAX as usize);
        let mut table = TableBuilder::new();
        table.insert(&key).set_value(1u32.into());

        let data = FileWriter::new().write_to_vec(&table).unwrap();
        let file = File::from_bytes(Cow::Owned(data), false).unwrap();
        assert_eq!(file.hash_table().get::<u32>(&key), Some(1));
    }

    #[test]
    fn self_referential_table() {
        let root = Rc::new(RefCell::new(TableBuilder::new()));
        root.borrow_mut().insert("loop").set_hash_table(root.clone());

        let err = FileWriter::new().write_to_vec(&root.borrow()).unwrap_err();
        assert_matches!(err, Error::Consistency(_));

        let child = Rc::new(RefCell::new(TableBuilder::new()));
        child.borrow_mut().insert("loop").set_hash_table(child.clone());
        let root = Rc::new(RefCell::new(TableBuilder::new()));
        root.borrow_mut().insert("child").set_hash_table(child);

        let err = FileWriter::new().write_to_vec(&root.borrow()).unwrap_err();
        assert_matches!(err, Error::Consistency(_));
    }

    #[test]
    fn item_without_content() {
        let mut table = TableBuilder::new();
        table.insert("dangling");

        let err = FileWriter::new().write_to_vec(&table).unwrap_err();
        assert_matches!(err, Error::Consistency(_));
        assert!(format!("{err}").contains("dangling"));
    }

    #[test]
    fn io_error() {
        let mut table = TableBuilder::new();
        table.insert_string("test", "test");

        // This buffer is intentionally too small
        let buffer = [0u8; 10];
        let mut cursor = Cursor::new(buffer);
        let err = FileWriter::new().write(&table, &mut cursor).unwrap_err();
        assert_matches!(err, Error::Io(_, _));
        assert!(format!("{err}").contains("I/O error"));
    }

    #[test]
    fn write_to_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.gvdb");

        let mut table = TableBuilder::new();
        table.insert_string("key", "value");
        FileWriter::new().write_to_path(&table, &path).unwrap();

        // Replacing an existing file works too
        let mut table = TableBuilder::new();
        table.insert_string("key", "other");
        FileWriter::new().write_to_path(&table, &path).unwrap();

        let file = File::from_file(&path, false).unwrap();
        let value: String = file.hash_table().get("key").unwrap();
        assert_eq!(value, "other");
    }

    #[derive(Debug)]
    enum Entry {
        Int(u32),
        Str(String),
        Bytes(Vec<u8>),
        Table(Vec<(String, Entry)>),
    }

    fn random_entries(rng: &mut rand::rngs::ThreadRng, depth: u32) -> Vec<(String, Entry)> {
        use rand::distr::{Alphanumeric, SampleString};
        use rand::Rng;

        let mut entries: Vec<(String, Entry)> = Vec::new();
        for _ in 0..rng.random_range(0..12) {
            let key_len = rng.random_range(1..16);
            let key = Alphanumeric.sample_string(rng, key_len);
            if entries.iter().any(|(existing, _)| *existing == key) {
                continue;
            }

            let entry = match rng.random_range(0..4) {
                0 => Entry::Int(rng.random()),
                1 => {
                    let len = rng.random_range(0..32);
                    Entry::Str(Alphanumeric.sample_string(rng, len))
                }
                2 => Entry::Bytes((0..rng.random_range(0..64)).map(|_| rng.random()).collect()),
                _ if depth < 4 => Entry::Table(random_entries(rng, depth + 1)),
                _ => Entry::Int(rng.random()),
            };
            entries.push((key, entry));
        }

        entries
    }

    fn build_entries(builder: &Rc<RefCell<TableBuilder<'static>>>, entries: &[(String, Entry)]) {
        for (key, entry) in entries {
            match entry {
                Entry::Int(value) => {
                    builder.borrow_mut().insert(key).set_value((*value).into());
                }
                Entry::Str(value) => {
                    builder.borrow_mut().insert_string(key, value);
                }
                Entry::Bytes(value) => {
                    builder
                        .borrow_mut()
                        .insert(key)
                        .set_value(zvariant::Value::new(value.clone()));
                }
                Entry::Table(children) => {
                    let child = TableBuilder::new_child(builder, key);
                    build_entries(&child, children);
                }
            }
        }
    }

    fn verify_entries(table: &crate::read::Table, entries: &[(String, Entry)]) {
        let mut names = table.names();
        names.sort();
        let mut expected: Vec<String> = entries.iter().map(|(key, _)| key.clone()).collect();
        expected.sort();
        assert_eq!(names, expected);

        for (key, entry) in entries {
            match entry {
                Entry::Int(value) => assert_eq!(table.get::<u32>(key), Some(*value)),
                Entry::Str(value) => {
                    assert_eq!(table.get::<String>(key).as_deref(), Some(value.as_str()))
                }
                Entry::Bytes(value) => assert_eq!(&table.get::<Vec<u8>>(key).unwrap(), value),
                Entry::Table(children) => {
                    verify_entries(&table.get_table(key).unwrap(), children)
                }
            }
        }
    }

    #[test]
    fn random_round_trip() {
        use rand::Rng;

        let mut rng = rand::rng();

        for _ in 0..20 {
            let entries = random_entries(&mut rng, 0);
            let root = Rc::new(RefCell::new(TableBuilder::new()));
            build_entries(&root, &entries);

            let writer = if rng.random_bool(0.5) {
                FileWriter::new()
            } else {
                FileWriter::for_big_endian()
            };

            let data = writer.write_to_vec(&root.borrow()).unwrap();
            let file = File::from_bytes(Cow::Owned(data), false).unwrap();
            verify_entries(&file.hash_table(), &entries);
        }
    }
}

#[cfg(all(feature = "async", test))]
mod test_async {
    use super::*;
    use crate::read::File;
    use matches::assert_matches;

    #[tokio::test]
    async fn write_to_path_async() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.gvdb");

        let mut table = TableBuilder::new();
        table.insert_string("key", "value");
        FileWriter::new()
            .write_to_path_async(&table, &path, None)
            .await
            .unwrap();

        let file = File::from_file(&path, false).unwrap();
        let value: String = file.hash_table().get("key").unwrap();
        assert_eq!(value, "value");
    }

    #[tokio::test]
    async fn cancelled_before_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.gvdb");

        let mut table = TableBuilder::new();
        table.insert_string("key", "value");

        let cancel = Cancel::new();
        cancel.cancel();
        assert!(cancel.is_cancelled());

        let err = FileWriter::new()
            .write_to_path_async(&table, &path, Some(&cancel))
            .await
            .unwrap_err();
        assert_matches!(err, Error::Cancelled);

        // No file and no leftover temp file
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn cancel_wakes_waiters() {
        let cancel = std::sync::Arc::new(Cancel::new());

        let waiter = {
            let cancel = cancel.clone();
            tokio::spawn(async move { cancel.cancelled().await })
        };

        cancel.cancel();
        waiter.await.unwrap();

        // Late waiters resolve immediately
        cancel.cancelled().await;
    }
}
