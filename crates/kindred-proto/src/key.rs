//! Datastore keys.
//!
//! A key is a path from the root of an entity group down to one record. Every
//! element of the path names a kind and an identifier; the key's parent is the
//! same path without its last element. Records that share a root element belong
//! to the same entity group.

use crate::error::Error;
use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};
use std::cmp::Ordering;
use std::fmt;

/// Identifier component of a single path element.
///
/// Variant order is significant: incomplete ids sort first, then numeric ids,
/// then names.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Archive,
    Serialize,
    Deserialize,
    SerdeSerialize,
    SerdeDeserialize,
)]
pub enum KeyId {
    /// No id has been allocated yet.
    Incomplete,
    /// Numeric id, usually allocated by the backend on first write.
    Id(i64),
    /// Application-assigned string name.
    Name(String),
}

impl KeyId {
    /// Check whether this id has been assigned.
    pub fn is_complete(&self) -> bool {
        !matches!(self, KeyId::Incomplete)
    }
}

/// One `(kind, id)` step of a key path.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Archive,
    Serialize,
    Deserialize,
    SerdeSerialize,
    SerdeDeserialize,
)]
pub struct PathElement {
    /// Kind of the record at this step.
    pub kind: String,
    /// Identifier of the record at this step.
    pub id: KeyId,
}

impl PathElement {
    /// Create a new path element.
    pub fn new(kind: impl Into<String>, id: KeyId) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            KeyId::Incomplete => write!(f, "{}(no-id-yet)", self.kind),
            KeyId::Id(id) => write!(f, "{}({})", self.kind, id),
            KeyId::Name(name) => write!(f, "{}({:?})", self.kind, name),
        }
    }
}

/// A record key: the ancestor path plus the element identifying the record itself.
///
/// Keys compare by path, so all records in one entity group sort together and a
/// parent sorts directly before its children.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
pub struct Key {
    /// Ancestors from the root down to the direct parent. Always complete.
    ancestors: Vec<PathElement>,
    /// The element naming this record.
    leaf: PathElement,
}

impl Key {
    /// Create a root key with the given identifier.
    pub fn new(kind: impl Into<String>, id: KeyId) -> Self {
        Self {
            ancestors: Vec::new(),
            leaf: PathElement::new(kind, id),
        }
    }

    /// Create a root key without an id. The backend assigns one on first write.
    pub fn incomplete(kind: impl Into<String>) -> Self {
        Self::new(kind, KeyId::Incomplete)
    }

    /// Create a root key with a numeric id.
    pub fn from_id(kind: impl Into<String>, id: i64) -> Self {
        Self::new(kind, KeyId::Id(id))
    }

    /// Create a root key with a string name.
    pub fn from_name(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(kind, KeyId::Name(name.into()))
    }

    /// Create a key for a child of this key.
    ///
    /// Fails when this key is itself incomplete, since an incomplete key cannot
    /// be part of another key's path.
    pub fn child(&self, kind: impl Into<String>, id: KeyId) -> Result<Key, Error> {
        if !self.is_complete() {
            return Err(Error::IncompleteParent(self.to_string()));
        }
        let mut ancestors = self.ancestors.clone();
        ancestors.push(self.leaf.clone());
        Ok(Key {
            ancestors,
            leaf: PathElement::new(kind, id),
        })
    }

    /// Re-root this key's own element under `parent`, dropping any existing parent.
    pub fn with_parent(&self, parent: &Key) -> Result<Key, Error> {
        parent.child(self.leaf.kind.clone(), self.leaf.id.clone())
    }

    /// Return a copy of this key with its own element assigned a numeric id.
    pub fn with_id(&self, id: i64) -> Key {
        Key {
            ancestors: self.ancestors.clone(),
            leaf: PathElement::new(self.leaf.kind.clone(), KeyId::Id(id)),
        }
    }

    /// Kind of the keyed record.
    pub fn kind(&self) -> &str {
        &self.leaf.kind
    }

    /// Identifier of the keyed record.
    pub fn key_id(&self) -> &KeyId {
        &self.leaf.id
    }

    /// Numeric id, if the key carries one.
    pub fn id(&self) -> Option<i64> {
        match self.leaf.id {
            KeyId::Id(id) => Some(id),
            _ => None,
        }
    }

    /// String name, if the key carries one.
    pub fn name(&self) -> Option<&str> {
        match &self.leaf.id {
            KeyId::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Check whether the key has an id or name.
    pub fn is_complete(&self) -> bool {
        self.leaf.id.is_complete()
    }

    /// Parent key, or `None` for a root key.
    pub fn parent(&self) -> Option<Key> {
        self.ancestors
            .split_last()
            .map(|(leaf, rest)| Key {
                ancestors: rest.to_vec(),
                leaf: leaf.clone(),
            })
    }

    /// Check whether this key has a parent.
    pub fn has_parent(&self) -> bool {
        !self.ancestors.is_empty()
    }

    /// Root of this key's entity group.
    pub fn root(&self) -> Key {
        match self.ancestors.first() {
            Some(first) => Key {
                ancestors: Vec::new(),
                leaf: first.clone(),
            },
            None => self.clone(),
        }
    }

    /// Check whether `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &Key) -> bool {
        other.ancestors.len() > self.ancestors.len()
            && self
                .path()
                .zip(other.path())
                .all(|(mine, theirs)| mine == theirs)
    }

    /// Number of elements in the path.
    pub fn depth(&self) -> usize {
        self.ancestors.len() + 1
    }

    /// Iterate over the path from the root to this record.
    pub fn path(&self) -> impl Iterator<Item = &PathElement> {
        self.ancestors.iter().chain(std::iter::once(&self.leaf))
    }

    /// Encode the key as a websafe string that [`Key::from_encoded`] reverses.
    pub fn to_encoded(&self) -> Result<String, Error> {
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(hex::encode(bytes.as_slice()))
    }

    /// Decode a string produced by [`Key::to_encoded`].
    pub fn from_encoded(encoded: &str) -> Result<Key, Error> {
        let raw = hex::decode(encoded).map_err(|e| Error::InvalidKey(e.to_string()))?;
        let mut aligned = AlignedVec::<16>::new();
        aligned.extend_from_slice(&raw);
        let key = rkyv::from_bytes::<Key, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::InvalidKey(e.to_string()))?;
        if key.ancestors.iter().any(|element| !element.id.is_complete()) {
            return Err(Error::InvalidKey(format!(
                "ancestor path of {key} contains an incomplete element"
            )));
        }
        Ok(key)
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path().cmp(other.path())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for element in &self.ancestors {
            write!(f, "{element}/")?;
        }
        write!(f, "{}", self.leaf)
    }
}
