//! Structured anchor relation of a tree node.
//!
//! Every node is created relative to one existing node (or as the tree root),
//! and that anchor is persisted with the node. Decoding rebuilds the full edge
//! set from these anchors.

use crate::model::member::MemberId;
use serde::{Deserialize, Serialize};

/// Anchor relation persisted with each node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelationTag {
    /// Tree root (the owner's own node).
    Root,
    /// Spouse of the referenced node.
    SpouseOf { member_id: MemberId },
    /// Father of the referenced child.
    FatherOf { child_id: MemberId },
    /// Mother of the referenced child.
    MotherOf { child_id: MemberId },
    /// Child of the referenced parent at the given sibling position.
    ChildOf {
        parent_id: MemberId,
        sibling_index: u32,
    },
    /// No usable anchor: the referenced node was removed or the tag was unreadable.
    Detached,
}

/// Storage discriminant of a [`RelationTag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Root,
    Spouse,
    Father,
    Mother,
    Child,
    Detached,
}

impl RelationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Root => "self",
            Self::Spouse => "spouse",
            Self::Father => "father",
            Self::Mother => "mother",
            Self::Child => "child",
            Self::Detached => "detached",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "self" => Some(Self::Root),
            "spouse" => Some(Self::Spouse),
            "father" => Some(Self::Father),
            "mother" => Some(Self::Mother),
            "child" => Some(Self::Child),
            "detached" => Some(Self::Detached),
            _ => None,
        }
    }
}

impl RelationTag {
    pub fn kind(&self) -> RelationKind {
        match self {
            Self::Root => RelationKind::Root,
            Self::SpouseOf { .. } => RelationKind::Spouse,
            Self::FatherOf { .. } => RelationKind::Father,
            Self::MotherOf { .. } => RelationKind::Mother,
            Self::ChildOf { .. } => RelationKind::Child,
            Self::Detached => RelationKind::Detached,
        }
    }

    /// Node this tag points at, if any.
    pub fn referenced_id(&self) -> Option<MemberId> {
        match *self {
            Self::SpouseOf { member_id } => Some(member_id),
            Self::FatherOf { child_id } | Self::MotherOf { child_id } => Some(child_id),
            Self::ChildOf { parent_id, .. } => Some(parent_id),
            Self::Root | Self::Detached => None,
        }
    }

    pub fn sibling_index(&self) -> Option<u32> {
        match *self {
            Self::ChildOf { sibling_index, .. } => Some(sibling_index),
            _ => None,
        }
    }

    /// Rebuilds a tag from its storage columns.
    ///
    /// Returns `None` when the columns required by `kind` are missing.
    pub fn from_parts(
        kind: RelationKind,
        referenced_id: Option<MemberId>,
        sibling_index: Option<u32>,
    ) -> Option<Self> {
        match kind {
            RelationKind::Root => Some(Self::Root),
            RelationKind::Detached => Some(Self::Detached),
            RelationKind::Spouse => referenced_id.map(|member_id| Self::SpouseOf { member_id }),
            RelationKind::Father => referenced_id.map(|child_id| Self::FatherOf { child_id }),
            RelationKind::Mother => referenced_id.map(|child_id| Self::MotherOf { child_id }),
            RelationKind::Child => Some(Self::ChildOf {
                parent_id: referenced_id?,
                sibling_index: sibling_index.unwrap_or(0),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RelationKind, RelationTag};
    use uuid::Uuid;

    #[test]
    fn from_parts_requires_reference_for_edge_kinds() {
        assert_eq!(
            RelationTag::from_parts(RelationKind::Root, None, None),
            Some(RelationTag::Root)
        );
        assert_eq!(RelationTag::from_parts(RelationKind::Spouse, None, None), None);
        assert_eq!(RelationTag::from_parts(RelationKind::Child, None, Some(1)), None);
    }

    #[test]
    fn parts_round_trip_for_child_tag() {
        let parent_id = Uuid::new_v4();
        let tag = RelationTag::ChildOf {
            parent_id,
            sibling_index: 3,
        };
        let rebuilt =
            RelationTag::from_parts(tag.kind(), tag.referenced_id(), tag.sibling_index());
        assert_eq!(rebuilt, Some(tag));
    }

    #[test]
    fn kind_strings_are_stable() {
        for kind in [
            RelationKind::Root,
            RelationKind::Spouse,
            RelationKind::Father,
            RelationKind::Mother,
            RelationKind::Child,
            RelationKind::Detached,
        ] {
            assert_eq!(RelationKind::parse(kind.as_str()), Some(kind));
        }
    }
}
