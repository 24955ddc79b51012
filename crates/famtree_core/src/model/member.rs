//! Family member domain model.
//!
//! # Responsibility
//! - Define the canonical node record of one family tree.
//! - Provide the draft/patch shapes used by tree mutations.
//!
//! # Invariants
//! - `id` is stable and never reused for another member.
//! - `spouse_id` is symmetric across the graph that owns the member.
//! - `parent_ids` holds at most two entries and mirrors `children_ids`.
//! - `position` is presentational only and never drives relationship resolution.

use crate::model::relation::RelationTag;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of one tree node.
pub type MemberId = Uuid;

/// Identifier of a real account (tree owner, invitation participant).
pub type UserId = Uuid;

/// Binary gender used by layout and merge pairing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Returns the opposite gender; spouses are always of opposite gender.
    pub fn opposite(self) -> Self {
        match self {
            Self::Male => Self::Female,
            Self::Female => Self::Male,
        }
    }

    /// Stable storage string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }

    /// Parses the storage string. Unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            _ => None,
        }
    }
}

/// Canvas coordinates of a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns this position shifted by the given deltas.
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// One node of a family tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyMember {
    pub id: MemberId,
    /// Account that owns the tree containing this node.
    pub owner_id: UserId,
    pub name: String,
    pub gender: Gender,
    pub avatar_url: Option<String>,
    /// `true` until a real account claims the node.
    pub is_placeholder: bool,
    /// Real account that claimed the node via an accepted invitation.
    pub linked_user_id: Option<UserId>,
    pub position: Option<Position>,
    pub spouse_id: Option<MemberId>,
    pub parent_ids: Vec<MemberId>,
    /// Ordered by sibling index.
    pub children_ids: Vec<MemberId>,
    /// Anchor relation this node was created with; persisted alongside it.
    pub relation: RelationTag,
}

impl FamilyMember {
    /// Creates an unconnected placeholder node from draft fields.
    pub fn from_draft(owner_id: UserId, draft: MemberDraft, relation: RelationTag) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name: draft.name,
            gender: draft.gender,
            avatar_url: draft.avatar_url,
            is_placeholder: true,
            linked_user_id: None,
            position: None,
            spouse_id: None,
            parent_ids: Vec::new(),
            children_ids: Vec::new(),
            relation,
        }
    }

    /// Returns whether this node has been claimed by a real account.
    pub fn is_linked(&self) -> bool {
        self.linked_user_id.is_some()
    }
}

/// Caller-provided fields for a node about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDraft {
    pub name: String,
    pub gender: Gender,
    pub avatar_url: Option<String>,
}

impl MemberDraft {
    pub fn new(name: impl Into<String>, gender: Gender) -> Self {
        Self {
            name: name.into(),
            gender,
            avatar_url: None,
        }
    }

    pub fn with_avatar(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = Some(avatar_url.into());
        self
    }
}

/// Partial update of user-editable member fields.
///
/// `None` leaves the current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberPatch {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

impl MemberPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.avatar_url.is_none()
    }
}
