//! # Read and write GVDB files
//!
//! This crate reads and writes GVDB (GLib GVariant database) files: flat,
//! memory-mappable key/value stores that map strings to GVariant values and
//! to nested hash tables.
//!
//! ## Examples
//!
//! Look up values with [`File`](crate::read::File)
//!
//! ```
//! use gvdb::read::File;
//! use gvdb::write::{FileWriter, TableBuilder};
//! use std::borrow::Cow;
//!
//! let mut table = TableBuilder::new();
//! table.insert("the answer").set_value(42u32.into());
//! let data = FileWriter::new().write_to_vec(&table).unwrap();
//!
//! let file = File::from_bytes(Cow::Owned(data), false).unwrap();
//! let table = file.hash_table();
//! let answer: u32 = table.get("the answer").unwrap();
//! assert_eq!(answer, 42);
//! ```
//!
//! Create nested tables with [`TableBuilder`](crate::write::TableBuilder)
//!
//! ```
//! use gvdb::write::{FileWriter, TableBuilder};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let root = Rc::new(RefCell::new(TableBuilder::new()));
//! root.borrow_mut().insert_string("string", "test string");
//!
//! let sub_table = TableBuilder::new_child(&root, "table");
//! sub_table.borrow_mut().insert("int").set_value(42u32.into());
//!
//! let data = FileWriter::new().write_to_vec(&root.borrow()).unwrap();
//! ```
//!
//! ## Features
//!
//! ### `mmap` (default)
//!
//! Use the memmap2 crate to read memory-mapped GVDB files.
//!
//! ### `async` (default)
//!
//! Cancellable, atomic file replacement on a tokio runtime with
//! [`FileWriter::write_to_path_async`](crate::write::FileWriter::write_to_path_async).

#![warn(missing_docs)]

/// Read GVDB files from a file or from a byte slice
///
/// See the documentation of [`File`](crate::read::File) to get started
pub mod read;

/// Create GVDB files
///
/// See the documentation of [`FileWriter`](crate::write::FileWriter) to get
/// started
pub mod write;

/// The compact string map used by schema descriptors for choices, enums and
/// aliases
///
/// See [`StringInfo`](crate::strinfo::StringInfo) and
/// [`StringInfoBuilder`](crate::strinfo::StringInfoBuilder)
pub mod strinfo;


mod util;
