mod error;
mod file;
mod hash_item;
mod header;
mod pointer;
mod table;

pub use error::{Error, Result};
pub use file::File;
pub use table::Table;

pub(crate) use hash_item::{HashItem, ItemType};
pub(crate) use header::Header;
pub(crate) use pointer::Pointer;
pub(crate) use table::HashHeader;
