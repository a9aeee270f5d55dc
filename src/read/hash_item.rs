use crate::read::pointer::Pointer;
use std::fmt::{Display, Formatter};
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// The interpretation of a hash item's 8-byte value field.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ItemType {
    /// `'v'`: the value pointer addresses an 8-aligned serialized variant
    Value,
    /// `'H'`: the value pointer addresses a nested hash table region
    HashTable,
    /// `'L'`: the value pointer addresses a 4-aligned array of child item indices
    List,
}

impl ItemType {
    /// Map a type byte to its interpretation. Unknown bytes yield `None` and
    /// the item is invisible to lookups.
    pub(crate) fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'v' => Some(ItemType::Value),
            b'H' => Some(ItemType::HashTable),
            b'L' => Some(ItemType::List),
            _ => None,
        }
    }
}

impl From<ItemType> for u8 {
    fn from(typ: ItemType) -> Self {
        match typ {
            ItemType::Value => b'v',
            ItemType::HashTable => b'H',
            ItemType::List => b'L',
        }
    }
}

impl Display for ItemType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ItemType::Value => "value",
            ItemType::HashTable => "hash table",
            ItemType::List => "child list",
        };

        write!(f, "{}", text)
    }
}

/// One fixed-size (24 byte) entry of an on-disk hash table.
///
/// ```text
/// +-------+---------------------------+
/// | Bytes | Field                     |
/// +-------+---------------------------+
/// |     4 | hash value                |
/// |     4 | parent item index         |
/// |     4 | key fragment start        |
/// |     2 | key fragment size         |
/// |     1 | type byte                 |
/// |     1 | unused                    |
/// |     8 | value pointer             |
/// +-------+---------------------------+
/// ```
///
/// A parent index of `0xffffffff` marks a root item whose key fragment is
/// its full name.
#[repr(C)]
#[derive(Copy, Clone, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct HashItem {
    hash_value: U32,
    parent: U32,

    key_start: U32,
    key_size: U16,

    typ: u8,
    unused: u8,

    value: Pointer,
}

impl HashItem {
    pub fn new(hash_value: u32, parent: u32, key_ptr: Pointer, typ: ItemType, value: Pointer) -> Self {
        Self {
            hash_value: U32::new(hash_value),
            parent: U32::new(parent),
            key_start: U32::new(key_ptr.start()),
            key_size: U16::new(key_ptr.size() as u16),
            typ: typ.into(),
            unused: 0,
            value,
        }
    }

    pub fn hash_value(&self) -> u32 {
        self.hash_value.get()
    }

    pub fn parent(&self) -> u32 {
        self.parent.get()
    }

    pub fn key_ptr(&self) -> Pointer {
        let start = self.key_start.get() as usize;
        Pointer::new(start, start + self.key_size.get() as usize)
    }

    pub fn typ(&self) -> Option<ItemType> {
        ItemType::from_byte(self.typ)
    }

    pub fn value_ptr(&self) -> &Pointer {
        &self.value
    }
}

impl std::fmt::Debug for HashItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashItem")
            .field("hash_value", &self.hash_value())
            .field("parent", &self.parent())
            .field("key_ptr", &self.key_ptr())
            .field("typ", &self.typ())
            .field("value", &self.value_ptr())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::{HashItem, ItemType};
    use crate::read::Pointer;
    use matches::assert_matches;

    #[test]
    fn derives() {
        for typ in [ItemType::Value, ItemType::HashTable, ItemType::List] {
            println!("{}, {:?}", typ, typ);
        }

        let item = HashItem::new(0, 0, Pointer::NULL, ItemType::Value, Pointer::NULL);
        let item2 = item;
        println!("{:?}", item2);
    }

    #[test]
    fn type_from_byte() {
        assert_matches!(ItemType::from_byte(b'v'), Some(ItemType::Value));
        assert_matches!(ItemType::from_byte(b'H'), Some(ItemType::HashTable));
        assert_matches!(ItemType::from_byte(b'L'), Some(ItemType::List));
        assert_matches!(ItemType::from_byte(b'x'), None);
        assert_matches!(ItemType::from_byte(0), None);
    }

    #[test]
    fn accessors() {
        let item = HashItem::new(42, u32::MAX, Pointer::new(4, 8), ItemType::Value, Pointer::NULL);

        assert_eq!(item.hash_value(), 42);
        assert_eq!(item.parent(), u32::MAX);
        assert_eq!(item.key_ptr(), Pointer::new(4, 8));
        assert_matches!(item.typ(), Some(ItemType::Value));
        assert_eq!(item.value_ptr(), &Pointer::NULL);
    }

    #[test]
    fn size() {
        assert_eq!(std::mem::size_of::<HashItem>(), 24);
    }
}
