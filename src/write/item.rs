use crate::read::ItemType;
use crate::util::djb_hash;
use crate::write::table::TableBuilder;
use std::cell::{Cell, Ref, RefCell};
use std::rc::{Rc, Weak};

/// The payload an item carries into serialization.
#[derive(Debug, Default)]
pub(crate) enum Content<'a> {
    /// Nothing set yet. Valid at write time only for items that carry a
    /// child list instead.
    #[default]
    None,

    /// A serialized variant value
    Value(zvariant::Value<'a>),

    /// A nested hash table, shared with whoever else built it
    Table(Rc<RefCell<TableBuilder<'a>>>),
}

impl Content<'_> {
    fn describe(&self) -> Option<&'static str> {
        match self {
            Content::None => None,
            Content::Value(_) => Some("a value"),
            Content::Table(_) => Some("a hash table"),
        }
    }
}

/// One entry of a [`TableBuilder`].
///
/// Items are created with [`TableBuilder::insert`] and mutated in place
/// through shared references, each item receives its payload exactly once.
/// Misuse is a programmer error and panics, see the individual methods.
#[derive(Debug)]
pub struct Item<'a> {
    // The full key string, also the hash input
    key: String,
    hash_value: u32,

    content: RefCell<Content<'a>>,

    // Non-owning back-reference, the table owns all of its items
    parent: RefCell<Weak<Item<'a>>>,
    children: RefCell<Vec<Rc<Item<'a>>>>,

    // The dense item index, filled in during serialization
    assigned_index: Cell<u32>,
}

impl<'a> Item<'a> {
    pub(crate) fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            hash_value: djb_hash(key),
            content: Default::default(),
            parent: RefCell::new(Weak::new()),
            children: Default::default(),
            assigned_index: Cell::new(u32::MAX),
        }
    }

    /// The full key of this item.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn hash_value(&self) -> u32 {
        self.hash_value
    }

    pub(crate) fn content(&self) -> Ref<'_, Content<'a>> {
        self.content.borrow()
    }

    pub(crate) fn parent(&self) -> Option<Rc<Item<'a>>> {
        self.parent.borrow().upgrade()
    }

    pub(crate) fn children(&self) -> Ref<'_, Vec<Rc<Item<'a>>>> {
        self.children.borrow()
    }

    pub(crate) fn assigned_index(&self) -> u32 {
        self.assigned_index.get()
    }

    pub(crate) fn set_assigned_index(&self, index: u32) {
        self.assigned_index.set(index);
    }

    fn set_content(&self, content: Content<'a>) {
        if let Some(existing) = self.content.borrow().describe() {
            panic!("Item '{}' already holds {existing}", self.key);
        }

        if !self.children.borrow().is_empty() {
            panic!("Item '{}' already has children", self.key);
        }

        *self.content.borrow_mut() = content;
    }

    /// Store a variant value in this item.
    ///
    /// # Panics
    ///
    /// Panics if the item already carries a value, a table, or children.
    pub fn set_value(&self, value: zvariant::Value<'a>) {
        self.set_content(Content::Value(value));
    }

    /// Store a nested hash table in this item.
    ///
    /// The table must not be reachable from itself, serialization fails
    /// with a consistency error otherwise.
    ///
    /// # Panics
    ///
    /// Panics if the item already carries a value, a table, or children.
    pub fn set_hash_table(&self, table: Rc<RefCell<TableBuilder<'a>>>) {
        self.set_content(Content::Table(table));
    }

    /// Link `item` below `parent`, turning `parent` into a child-list item.
    ///
    /// On disk the item then stores only its key fragment relative to
    /// `parent` and appears in `parent`'s child list. Both items must live
    /// in the same table.
    ///
    /// # Panics
    ///
    /// Panics if `item`'s key does not start with `parent`'s key, if
    /// `parent` already carries a value or table, if `item` already has a
    /// parent, or if the link would close a cycle.
    pub fn set_parent(item: &Rc<Item<'a>>, parent: &Rc<Item<'a>>) {
        if !item.key.starts_with(&parent.key) {
            panic!(
                "Key '{}' is not a prefix of child key '{}'",
                parent.key, item.key
            );
        }

        if let Some(existing) = parent.content.borrow().describe() {
            panic!("Item '{}' already holds {existing}", parent.key);
        }

        if item.parent.borrow().upgrade().is_some() {
            panic!("Item '{}' already has a parent", item.key);
        }

        // Walk up from the new parent, linking below a descendant of
        // ourselves would orphan the whole subtree
        let mut ancestor = Some(parent.clone());
        while let Some(current) = ancestor {
            if Rc::ptr_eq(&current, item) {
                panic!("Setting '{}' as parent of '{}' creates a loop", parent.key, item.key);
            }

            ancestor = current.parent();
        }

        let mut children = parent.children.borrow_mut();
        let pos = children
            .binary_search_by(|child| child.key.as_str().cmp(&item.key))
            .unwrap_or_else(|pos| pos);
        children.insert(pos, item.clone());

        *item.parent.borrow_mut() = Rc::downgrade(parent);
    }

    /// The type tag this item will receive on disk.
    pub(crate) fn typ(&self) -> Option<ItemType> {
        match &*self.content.borrow() {
            Content::Value(_) => Some(ItemType::Value),
            Content::Table(_) => Some(ItemType::HashTable),
            Content::None if !self.children.borrow().is_empty() => Some(ItemType::List),
            Content::None => None,
        }
    }
}
