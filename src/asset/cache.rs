use std::collections::HashMap;

use super::Handle;

/// Append-only store. Items may be registered under a name so repeated
/// requests for the same name resolve to the same handle.
pub struct AssetCache<T> {
    items: Vec<T>,
    names: HashMap<String, Handle<T>>,
}

impl<T> AssetCache<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            names: HashMap::new(),
        }
    }

    pub fn insert(&mut self, item: T) -> Handle<T> {
        let index = self.items.len();
        self.items.push(item);
        Handle::new(index)
    }

    /// Inserts `item` and points `name` at it. A previous item registered
    /// under the same name stays alive but is no longer found by name.
    pub fn insert_named(&mut self, name: impl Into<String>, item: T) -> Handle<T> {
        let handle = self.insert(item);
        self.names.insert(name.into(), handle);
        handle
    }

    pub fn find(&self, name: &str) -> Option<Handle<T>> {
        self.names.get(name).copied()
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.items.get(handle.index())
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.items.get_mut(handle.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| (Handle::new(i), item))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for AssetCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
