mod error;
mod file;
mod item;
mod table;

pub use error::{Error, Result};
#[cfg(feature = "async")]
pub use file::Cancel;
pub use file::FileWriter;
pub use item::Item;
pub use table::TableBuilder;
