use crate::read::error::{Error, Result};
use crate::read::pointer::Pointer;
use std::mem::size_of;
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

// The signature is the string "GVariant" interpreted as two little-endian
// u32. A byteswapped file stores both words with their bytes reversed.
// "GVar"
const SIGNATURE0: u32 = 1918981703;
// "iant"
const SIGNATURE1: u32 = 1953390953;

/// A GVDB file header.
///
/// ```text
/// +-------+--------------+
/// | Bytes | Field        |
/// +-------+--------------+
/// |     8 | signature    |
/// +-------+--------------+
/// |     4 | version      |
/// +-------+--------------+
/// |     4 | options      |
/// +-------+--------------+
/// |     8 | root pointer |
/// +-------+--------------+
/// ```
///
/// The signature reads as the ASCII string `GVariant` for little endian and
/// `raVGtnai` for big endian files. Version must be 0. Options is reserved,
/// written as 0 and ignored on read. The root pointer addresses the
/// top-level hash table region.
#[repr(C)]
#[derive(Copy, Clone, PartialEq, Eq, Debug, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct Header {
    signature: [U32; 2],
    version: U32,
    options: U32,
    root: Pointer,
}

impl Header {
    /// Read the header, determine the endianness and validate the signature
    /// and version.
    pub fn try_from_bytes(data: &[u8]) -> Result<Self> {
        let (header, _) = Header::read_from_prefix(data).map_err(|_| {
            Error::InvalidHeader(format!(
                "Expected at least {} bytes, got {}",
                size_of::<Header>(),
                data.len()
            ))
        })?;

        // Validates the signature as a side effect
        header.is_byteswap()?;

        if header.version() != 0 {
            return Err(Error::InvalidHeader(format!(
                "Unknown GVDB file format version: {}",
                header.version()
            )));
        }

        Ok(header)
    }

    /// Create a new GVDB header in target endianness
    pub fn new(byteswap: bool, version: u32, root: Pointer) -> Self {
        let signature = if !byteswap {
            [U32::new(SIGNATURE0), U32::new(SIGNATURE1)]
        } else {
            [
                U32::new(SIGNATURE0.swap_bytes()),
                U32::new(SIGNATURE1.swap_bytes()),
            ]
        };

        Self {
            signature,
            version: U32::new(version),
            options: U32::ZERO,
            root,
        }
    }

    /// Returns:
    ///
    /// - `Ok(false)` if the file is in target endianness (eg. LE on an LE machine)
    /// - `Ok(true)` if the file is *not* in target endianness (eg. BE on an LE machine)
    /// - [`Error::InvalidHeader`] if the signature is invalid
    pub fn is_byteswap(&self) -> Result<bool> {
        let signature = [self.signature[0].get(), self.signature[1].get()];

        if signature == [SIGNATURE0, SIGNATURE1] {
            Ok(false)
        } else if signature == [SIGNATURE0.swap_bytes(), SIGNATURE1.swap_bytes()] {
            Ok(true)
        } else {
            Err(Error::InvalidHeader(format!(
                "Invalid signature: {:?}. Is this a GVariant database file?",
                signature
            )))
        }
    }

    /// The version of the GVDB file. We only recognize version 0 of the format.
    pub fn version(&self) -> u32 {
        self.version.get()
    }

    /// The pointer to the root hash table.
    pub fn root(&self) -> &Pointer {
        &self.root
    }
}
