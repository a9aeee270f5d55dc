use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// An inclusive-exclusive byte range into the file the pointer is stored in.
///
/// Pointers are stored little-endian and are only meaningful after a bounds
/// and alignment check against the backing data, see
/// [`File::dereference`](crate::read::File).
#[repr(C)]
#[derive(Copy, Clone, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct Pointer {
    start: U32,
    end: U32,
}

impl Pointer {
    pub const NULL: Self = Self {
        start: U32::ZERO,
        end: U32::ZERO,
    };

    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: U32::new(start as u32),
            end: U32::new(end as u32),
        }
    }

    pub fn start(&self) -> u32 {
        self.start.get()
    }

    pub fn end(&self) -> u32 {
        self.end.get()
    }

    pub fn size(&self) -> usize {
        self.end().saturating_sub(self.start()) as usize
    }
}

impl std::fmt::Debug for Pointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pointer")
            .field("start", &self.start())
            .field("end", &self.end())
            .finish()
    }
}
