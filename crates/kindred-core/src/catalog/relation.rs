//! Relation kinds between entities.

use serde::{Deserialize, Serialize};

/// The relation carried by a field, resolved once from field metadata.
///
/// Owned relations place the related records below the owner's key: a child
/// record's parent key is its owner's key, so owner and children share an
/// entity group.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Relation {
    /// A plain value field.
    #[default]
    None,
    /// The owner side of a one-to-one relation. The child is stored as a
    /// direct descendant of the owner.
    OneToOne {
        /// Related entity name.
        target: String,
        /// Field on the child pointing back at the owner, if bidirectional.
        mapped_by: Option<String>,
    },
    /// The owner side of a one-to-many relation.
    OneToMany {
        /// Element entity name.
        target: String,
        /// Field on the child pointing back at the owner, if bidirectional.
        mapped_by: Option<String>,
        /// Whether the collection is a list whose element positions are stored.
        ordered: bool,
    },
    /// The child side of a bidirectional relation: a reference to the owner,
    /// which is also the record's parent.
    ManyToOne {
        /// Owner entity name.
        target: String,
    },
}

impl Relation {
    /// Check whether this field carries no relation.
    pub fn is_none(&self) -> bool {
        matches!(self, Relation::None)
    }

    /// Related entity name.
    pub fn target(&self) -> Option<&str> {
        match self {
            Relation::None => None,
            Relation::OneToOne { target, .. }
            | Relation::OneToMany { target, .. }
            | Relation::ManyToOne { target } => Some(target),
        }
    }

    /// Check whether the relation is navigable from both sides.
    pub fn is_bidirectional(&self) -> bool {
        match self {
            Relation::OneToOne { mapped_by, .. } | Relation::OneToMany { mapped_by, .. } => {
                mapped_by.is_some()
            }
            Relation::ManyToOne { .. } => true,
            Relation::None => false,
        }
    }

    /// Check whether this field owns the related records.
    pub fn is_owner_side(&self) -> bool {
        matches!(
            self,
            Relation::OneToOne { .. } | Relation::OneToMany { .. }
        )
    }

    /// Check whether the collection stores element positions.
    pub fn is_ordered(&self) -> bool {
        matches!(self, Relation::OneToMany { ordered: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_sides() {
        let owner = Relation::OneToMany {
            target: "Chapter".into(),
            mapped_by: Some("book".into()),
            ordered: true,
        };
        assert!(owner.is_owner_side());
        assert!(owner.is_bidirectional());
        assert!(owner.is_ordered());
        assert_eq!(owner.target(), Some("Chapter"));

        let back = Relation::ManyToOne {
            target: "Book".into(),
        };
        assert!(!back.is_owner_side());
        assert!(back.is_bidirectional());

        assert!(Relation::default().is_none());
        assert_eq!(Relation::None.target(), None);
    }

    #[test]
    fn test_unidirectional() {
        let rel = Relation::OneToOne {
            target: "Cover".into(),
            mapped_by: None,
        };
        assert!(!rel.is_bidirectional());
        assert!(!rel.is_ordered());
    }
}
