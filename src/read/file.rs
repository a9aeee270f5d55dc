use crate::read::error::{Error, Result};
use crate::read::header::Header;
use crate::read::pointer::Pointer;
use crate::read::Table;
use std::borrow::Cow;
use std::io::Read;
use std::path::Path;

#[derive(Debug)]
pub(crate) enum Data<'a> {
    Cow(Cow<'a, [u8]>),
    #[cfg(feature = "mmap")]
    Mmap(memmap2::Mmap),
}

impl AsRef<[u8]> for Data<'_> {
    fn as_ref(&self) -> &[u8] {
        match self {
            Data::Cow(cow) => cow.as_ref(),
            #[cfg(feature = "mmap")]
            Data::Mmap(mmap) => mmap.as_ref(),
        }
    }
}

/// An open GVDB file.
///
/// The file holds the backing bytes; [`Table`] views into it are obtained
/// with [`File::hash_table`]. Opening validates only the header. Everything
/// past the header is checked lazily: corrupt regions make lookups return
/// `None` but never fail hard.
///
/// ```
/// use std::borrow::Cow;
/// use std::rc::Rc;
/// use std::cell::RefCell;
/// use gvdb::read::File;
/// use gvdb::write::{FileWriter, TableBuilder};
///
/// let root = Rc::new(RefCell::new(TableBuilder::new()));
/// root.borrow_mut().insert_string("greeting", "hello");
/// let data = FileWriter::new().write_to_vec(&root.borrow()).unwrap();
///
/// let file = File::from_bytes(Cow::Owned(data), false).unwrap();
/// let table = file.hash_table();
/// let greeting: String = table.get("greeting").unwrap();
/// assert_eq!(greeting, "hello");
/// ```
pub struct File<'a> {
    pub(crate) data: Data<'a>,
    endianness: zvariant::Endian,
    trusted: bool,
    root: Pointer,
}

impl<'a> File<'a> {
    fn new(data: Data<'a>, trusted: bool) -> Result<Self> {
        let header = Header::try_from_bytes(data.as_ref())?;

        let endianness = if header.is_byteswap()? {
            zvariant::Endian::Big
        } else {
            zvariant::Endian::Little
        };

        Ok(Self {
            endianness,
            trusted,
            root: *header.root(),
            data,
        })
    }

    /// Interpret a slice of bytes as a GVDB file.
    ///
    /// `trusted` asserts that the data was produced by a trusted writer.
    /// Pointer bounds and alignment checks are performed either way; the
    /// flag is recorded and propagated to nested tables for the benefit of
    /// callers that hand values to their own validation layers.
    pub fn from_bytes(bytes: Cow<'a, [u8]>, trusted: bool) -> Result<Self> {
        Self::new(Data::Cow(bytes), trusted)
    }

    /// Open a file and interpret the data as GVDB.
    ///
    /// The whole file is read into memory.
    pub fn from_file(filename: &Path, trusted: bool) -> Result<Self> {
        let mut file =
            std::fs::File::open(filename).map_err(Error::from_io_with_filename(filename))?;
        let mut data = Vec::with_capacity(
            file.metadata()
                .map_err(Error::from_io_with_filename(filename))?
                .len() as usize,
        );
        file.read_to_end(&mut data)
            .map_err(Error::from_io_with_filename(filename))?;
        Self::from_bytes(Cow::Owned(data), trusted)
    }

    /// Open a file and `mmap` it into memory.
    ///
    /// # Safety
    ///
    /// This is marked unsafe as the file could be modified on-disk while the
    /// mmap is active, which is undefined behavior. You must employ your own
    /// locking and reload the file when a writer has replaced it (see
    /// [`File::is_valid`]).
    #[cfg(feature = "mmap")]
    pub unsafe fn from_file_mmap(filename: &Path, trusted: bool) -> Result<Self> {
        let file = std::fs::File::open(filename).map_err(Error::from_io_with_filename(filename))?;
        let mmap = memmap2::Mmap::map(&file).map_err(Error::from_io_with_filename(filename))?;

        Self::new(Data::Mmap(mmap), trusted)
    }

    /// Returns the root hash table of the file.
    ///
    /// A corrupt root region yields an empty table rather than an error.
    pub fn hash_table(&self) -> Table<'_, 'a> {
        let data = self.dereference(&self.root, 4).unwrap_or(&[]);
        Table::setup(data, self)
    }

    /// Whether this file is still the current version.
    ///
    /// The replace-file protocol zeroes the first byte of a superseded file.
    /// A reader observing `false` here should reopen the file; existing
    /// lookups keep working against the old content.
    pub fn is_valid(&self) -> bool {
        self.data.as_ref().first().copied().unwrap_or(0) != 0
    }

    /// Whether the file was opened with the trusted flag.
    pub fn is_trusted(&self) -> bool {
        self.trusted
    }

    /// Whether the file endianness differs from the host endianness.
    ///
    /// Variant payloads of such a file are byteswapped on access, lookups
    /// work the same either way.
    pub fn is_byteswapped(&self) -> bool {
        self.endianness != zvariant::Endian::native()
    }

    /// The checked dereference primitive every reader access goes through.
    ///
    /// Yields a sub-slice only if the pointer is in range, ordered, and its
    /// start is aligned to `alignment`.
    pub(crate) fn dereference(&self, pointer: &Pointer, alignment: u32) -> Option<&[u8]> {
        let start = pointer.start() as usize;
        let end = pointer.end() as usize;

        if start > end || start & (alignment as usize - 1) != 0 {
            None
        } else {
            self.data.as_ref().get(start..end)
        }
    }

    /// The endianness variant values are stored in, encoded by the
    /// signature bytes.
    pub(crate) fn endianness(&self) -> zvariant::Endian {
        self.endianness
    }
}

impl std::fmt::Debug for File<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("endianness", &self.endianness)
            .field("trusted", &self.trusted)
            .field("root", &self.root)
            .field("hash_table", &self.hash_table())
            .finish()
    }
}
