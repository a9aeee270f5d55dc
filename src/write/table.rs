use crate::write::item::Item;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// An in-memory hash table under construction.
///
/// Keys map to shared [`Item`]s so the caller can keep mutating an item
/// after inserting it. Iteration is in key order, which makes the produced
/// files reproducible.
///
/// ```
/// use std::rc::Rc;
/// use std::cell::RefCell;
/// use gvdb::write::{FileWriter, TableBuilder};
///
/// let root = Rc::new(RefCell::new(TableBuilder::new()));
/// root.borrow_mut().insert_string("string", "test string");
///
/// let child = TableBuilder::new_child(&root, "table");
/// child.borrow_mut().insert("int").set_value(42u32.into());
///
/// let data = FileWriter::new().write_to_vec(&root.borrow()).unwrap();
/// ```
#[derive(Debug, Default)]
pub struct TableBuilder<'a> {
    items: BTreeMap<String, Rc<Item<'a>>>,
}

impl<'a> TableBuilder<'a> {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new table nested below `parent` at `name_in_parent`.
    ///
    /// The table is shared: the returned handle and the item inserted into
    /// `parent` both own it.
    ///
    /// # Panics
    ///
    /// Panics if `parent` already contains `name_in_parent`.
    pub fn new_child(
        parent: &Rc<RefCell<TableBuilder<'a>>>,
        name_in_parent: &str,
    ) -> Rc<RefCell<TableBuilder<'a>>> {
        let table = Rc::new(RefCell::new(TableBuilder::new()));
        let item = parent.borrow_mut().insert(name_in_parent);
        item.set_hash_table(table.clone());
        table
    }

    /// Append a new empty item for `key` and return it for the caller to
    /// fill in.
    ///
    /// # Panics
    ///
    /// Panics if `key` is already present, re-inserting a key is a
    /// programmer error.
    pub fn insert(&mut self, key: &str) -> Rc<Item<'a>> {
        let item = Rc::new(Item::new(key));

        if self.items.insert(key.to_string(), item.clone()).is_some() {
            panic!("Duplicate key '{key}'");
        }

        item
    }

    /// Convenience wrapper that inserts `key` with a string value.
    pub fn insert_string(&mut self, key: &str, value: &str) -> Rc<Item<'a>> {
        let item = self.insert(key);
        item.set_value(zvariant::Value::new(value.to_string()));
        item
    }

    /// The number of items contained in the table
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the table contains no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The items in key order.
    pub(crate) fn items(&self) -> impl Iterator<Item = &Rc<Item<'a>>> {
        self.items.values()
    }
}
