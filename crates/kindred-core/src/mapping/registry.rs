//! Parent keys discovered ahead of a write.

use crate::object::ObjectId;
use kindred_proto::Key;
use std::collections::HashMap;

/// Parent keys registered for objects that have not been written yet.
///
/// An owner registers its key for each child it cascades to, so the child
/// can join the owner's entity group when it is written. A registry lives for
/// one unit of work and is cleared at its end.
#[derive(Debug, Default)]
pub struct KeyRegistry {
    parent_keys: HashMap<ObjectId, Key>,
}

impl KeyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the parent key for an object.
    pub fn register_parent_key(&mut self, object: ObjectId, parent: Key) {
        self.parent_keys.insert(object, parent);
    }

    /// Parent key registered for an object.
    pub fn parent_key(&self, object: ObjectId) -> Option<&Key> {
        self.parent_keys.get(&object)
    }

    /// Remove and return the parent key registered for an object.
    pub fn take_parent_key(&mut self, object: ObjectId) -> Option<Key> {
        self.parent_keys.remove(&object)
    }

    /// Forget every registration.
    pub fn clear(&mut self) {
        self.parent_keys.clear();
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.parent_keys.len()
    }

    /// Check whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.parent_keys.is_empty()
    }
}
