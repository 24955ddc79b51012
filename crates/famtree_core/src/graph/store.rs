//! In-memory family graph.
//!
//! # Responsibility
//! - Own the id-keyed member map of one tree.
//! - Apply structural mutations while keeping edge invariants intact.
//! - Place newly created nodes through [`crate::graph::layout`].
//!
//! # Invariants
//! - Spouse edges are symmetric.
//! - `children_ids` and `parent_ids` are mutual duals; a node has at most two parents.
//! - Removal never cascades to relatives; orphaned branches stay addressable.
//! - Unknown anchor ids turn mutations into no-ops (`None` / `false`).

use crate::graph::layout;
use crate::model::member::{
    FamilyMember, Gender, MemberDraft, MemberId, MemberPatch, Position, UserId,
};
use crate::model::relation::RelationTag;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Maximum number of parents a node can have.
pub const MAX_PARENTS: usize = 2;

/// Broken structural invariant found by [`FamilyGraph::check_invariants`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// `member_id` points at a spouse that does not exist.
    MissingSpouse {
        member_id: MemberId,
        spouse_id: MemberId,
    },
    /// `member_id` points at a spouse that points elsewhere.
    AsymmetricSpouse {
        member_id: MemberId,
        spouse_id: MemberId,
    },
    /// `parent_id` lists a child that does not exist or does not list it back.
    ChildNotLinked {
        parent_id: MemberId,
        child_id: MemberId,
    },
    /// `child_id` lists a parent that does not exist or does not list it back.
    ParentNotLinked {
        child_id: MemberId,
        parent_id: MemberId,
    },
    /// More than [`MAX_PARENTS`] parents.
    TooManyParents { member_id: MemberId, count: usize },
}

impl Display for InvariantViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSpouse {
                member_id,
                spouse_id,
            } => write!(f, "member {member_id} references missing spouse {spouse_id}"),
            Self::AsymmetricSpouse {
                member_id,
                spouse_id,
            } => write!(
                f,
                "spouse edge {member_id} -> {spouse_id} is not mirrored"
            ),
            Self::ChildNotLinked {
                parent_id,
                child_id,
            } => write!(
                f,
                "child {child_id} of {parent_id} is missing or does not list the parent"
            ),
            Self::ParentNotLinked {
                child_id,
                parent_id,
            } => write!(
                f,
                "parent {parent_id} of {child_id} is missing or does not list the child"
            ),
            Self::TooManyParents { member_id, count } => {
                write!(f, "member {member_id} has {count} parents")
            }
        }
    }
}

impl Error for InvariantViolation {}

/// Result of [`FamilyGraph::remove_member`].
#[derive(Debug, Clone, PartialEq)]
pub struct Removal {
    /// Removed node as it was before edge cleanup.
    pub removed: FamilyMember,
    /// Surviving nodes whose anchor referenced the removed node, with their new anchor.
    pub reanchored: Vec<(MemberId, RelationTag)>,
}

/// Id-keyed graph of one owner's family tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyGraph {
    owner_id: UserId,
    members: BTreeMap<MemberId, FamilyMember>,
}

impl FamilyGraph {
    pub fn new(owner_id: UserId) -> Self {
        Self {
            owner_id,
            members: BTreeMap::new(),
        }
    }

    pub fn owner_id(&self) -> UserId {
        self.owner_id
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, id: MemberId) -> Option<&FamilyMember> {
        self.members.get(&id)
    }

    pub fn contains(&self, id: MemberId) -> bool {
        self.members.contains_key(&id)
    }

    /// Iterates members in id order.
    pub fn members(&self) -> impl Iterator<Item = &FamilyMember> {
        self.members.values()
    }

    /// Returns the tree root, if one was created.
    pub fn root(&self) -> Option<&FamilyMember> {
        self.members
            .values()
            .find(|member| member.relation == RelationTag::Root)
    }

    /// Returns the children of `id` in sibling order.
    pub fn children_of(&self, id: MemberId) -> Vec<&FamilyMember> {
        self.members
            .get(&id)
            .map(|member| {
                member
                    .children_ids
                    .iter()
                    .filter_map(|child_id| self.members.get(child_id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn get_mut(&mut self, id: MemberId) -> Option<&mut FamilyMember> {
        self.members.get_mut(&id)
    }

    /// Inserts a node without touching any edge. Used by the decoder.
    pub(crate) fn insert_unwired(&mut self, member: FamilyMember) {
        self.members.insert(member.id, member);
    }

    /// Creates the root couple at the baseline coordinates.
    ///
    /// The spouse's gender is forced to the opposite of the root's.
    pub fn add_initial_couple(
        &mut self,
        root: MemberDraft,
        spouse: MemberDraft,
    ) -> (MemberId, MemberId) {
        let (root_position, spouse_position) = layout::initial_couple(root.gender);
        let spouse_gender = root.gender.opposite();

        let mut root_member = FamilyMember::from_draft(self.owner_id, root, RelationTag::Root);
        root_member.position = Some(root_position);

        let mut spouse_member = FamilyMember::from_draft(
            self.owner_id,
            MemberDraft {
                gender: spouse_gender,
                ..spouse
            },
            RelationTag::SpouseOf {
                member_id: root_member.id,
            },
        );
        spouse_member.position = Some(spouse_position);

        root_member.spouse_id = Some(spouse_member.id);
        spouse_member.spouse_id = Some(root_member.id);

        let ids = (root_member.id, spouse_member.id);
        self.members.insert(root_member.id, root_member);
        self.members.insert(spouse_member.id, spouse_member);
        ids
    }

    /// Creates a father and a mother for `child_id`.
    ///
    /// Returns `None` without mutating when the child is unknown or already
    /// has a parent.
    pub fn add_parents(
        &mut self,
        child_id: MemberId,
        father: MemberDraft,
        mother: MemberDraft,
    ) -> Option<(MemberId, MemberId)> {
        let child = self.members.get(&child_id)?;
        if !child.parent_ids.is_empty() {
            return None;
        }
        let (father_position, mother_position) =
            layout::parents_of(child.position.unwrap_or(layout::BASELINE));

        let mut father_member = FamilyMember::from_draft(
            self.owner_id,
            MemberDraft {
                gender: Gender::Male,
                ..father
            },
            RelationTag::FatherOf { child_id },
        );
        father_member.position = Some(father_position);
        let mut mother_member = FamilyMember::from_draft(
            self.owner_id,
            MemberDraft {
                gender: Gender::Female,
                ..mother
            },
            RelationTag::MotherOf { child_id },
        );
        mother_member.position = Some(mother_position);

        father_member.spouse_id = Some(mother_member.id);
        mother_member.spouse_id = Some(father_member.id);
        father_member.children_ids.push(child_id);
        mother_member.children_ids.push(child_id);

        let ids = (father_member.id, mother_member.id);
        if let Some(child) = self.members.get_mut(&child_id) {
            child.parent_ids = vec![ids.0, ids.1];
        }
        self.members.insert(father_member.id, father_member);
        self.members.insert(mother_member.id, mother_member);
        Some(ids)
    }

    /// Creates a spouse for `member_id`.
    ///
    /// The spouse's gender is forced to the opposite of the member's, and
    /// children of the member that have a single parent adopt the spouse as
    /// their second parent. Returns `None` when the member is unknown or
    /// already married.
    pub fn add_spouse(&mut self, member_id: MemberId, spouse: MemberDraft) -> Option<MemberId> {
        let member = self.members.get(&member_id)?;
        if member.spouse_id.is_some() {
            return None;
        }
        let position = layout::spouse_of(
            member.position.unwrap_or(layout::BASELINE),
            member.gender,
        );
        let adoptable: Vec<MemberId> = member
            .children_ids
            .iter()
            .copied()
            .filter(|child_id| {
                self.members
                    .get(child_id)
                    .is_some_and(|child| child.parent_ids.len() < MAX_PARENTS)
            })
            .collect();

        let mut spouse_member = FamilyMember::from_draft(
            self.owner_id,
            MemberDraft {
                gender: member.gender.opposite(),
                ..spouse
            },
            RelationTag::SpouseOf { member_id },
        );
        spouse_member.position = Some(position);
        spouse_member.spouse_id = Some(member_id);
        spouse_member.children_ids = adoptable.clone();
        let spouse_id = spouse_member.id;

        for child_id in adoptable {
            if let Some(child) = self.members.get_mut(&child_id) {
                child.parent_ids.push(spouse_id);
            }
        }
        if let Some(member) = self.members.get_mut(&member_id) {
            member.spouse_id = Some(spouse_id);
        }
        self.members.insert(spouse_id, spouse_member);
        Some(spouse_id)
    }

    /// Creates a child of `parent_id` (and of the parent's spouse, if any).
    pub fn add_child(&mut self, parent_id: MemberId, child: MemberDraft) -> Option<MemberId> {
        let parent = self.members.get(&parent_id)?;
        let sibling_index = u32::try_from(parent.children_ids.len()).unwrap_or(u32::MAX);
        let co_parent = parent
            .spouse_id
            .and_then(|spouse_id| self.members.get(&spouse_id));
        let position = layout::child_of(
            parent.position.unwrap_or(layout::BASELINE),
            co_parent.map(|spouse| spouse.position.unwrap_or(layout::BASELINE)),
            sibling_index,
        );

        let mut parent_ids = vec![parent_id];
        parent_ids.extend(co_parent.map(|spouse| spouse.id));

        let mut child_member = FamilyMember::from_draft(
            self.owner_id,
            child,
            RelationTag::ChildOf {
                parent_id,
                sibling_index,
            },
        );
        child_member.position = Some(position);
        child_member.parent_ids = parent_ids.clone();
        let child_id = child_member.id;

        for id in parent_ids {
            if let Some(parent) = self.members.get_mut(&id) {
                parent.children_ids.push(child_id);
            }
        }
        self.members.insert(child_id, child_member);
        Some(child_id)
    }

    /// Applies user-editable field changes. Returns `false` for unknown ids.
    pub fn update_member(&mut self, id: MemberId, patch: &MemberPatch) -> bool {
        let Some(member) = self.members.get_mut(&id) else {
            return false;
        };
        if let Some(name) = &patch.name {
            member.name = name.clone();
        }
        if let Some(avatar_url) = &patch.avatar_url {
            member.avatar_url = Some(avatar_url.clone());
        }
        true
    }

    /// Moves a node on the canvas. Returns `false` for unknown ids.
    pub fn update_position(&mut self, id: MemberId, position: Position) -> bool {
        match self.members.get_mut(&id) {
            Some(member) => {
                member.position = Some(position);
                true
            }
            None => false,
        }
    }

    /// Marks a node as claimed by `user_id`. Returns `false` for unknown ids.
    pub fn link_account(&mut self, id: MemberId, user_id: UserId) -> bool {
        match self.members.get_mut(&id) {
            Some(member) => {
                member.linked_user_id = Some(user_id);
                member.is_placeholder = false;
                true
            }
            None => false,
        }
    }

    /// Removes one node and every edge touching it.
    ///
    /// Relatives are kept. Survivors whose anchor referenced the removed node
    /// are re-anchored so that decoding their persisted rows reproduces the
    /// resulting graph.
    pub fn remove_member(&mut self, id: MemberId) -> Option<Removal> {
        let removed = self.members.remove(&id)?;

        if let Some(spouse_id) = removed.spouse_id {
            if let Some(spouse) = self.members.get_mut(&spouse_id) {
                if spouse.spouse_id == Some(id) {
                    spouse.spouse_id = None;
                }
            }
        }
        for parent_id in &removed.parent_ids {
            if let Some(parent) = self.members.get_mut(parent_id) {
                parent.children_ids.retain(|child_id| *child_id != id);
            }
        }
        for child_id in &removed.children_ids {
            if let Some(child) = self.members.get_mut(child_id) {
                child.parent_ids.retain(|parent_id| *parent_id != id);
            }
        }

        let referencing: Vec<MemberId> = self
            .members
            .values()
            .filter(|member| member.relation.referenced_id() == Some(id))
            .map(|member| member.id)
            .collect();
        let mut reanchored = Vec::with_capacity(referencing.len());
        for member_id in referencing {
            let Some(member) = self.members.get_mut(&member_id) else {
                continue;
            };
            let next = match member.relation {
                RelationTag::ChildOf { sibling_index, .. } => member
                    .parent_ids
                    .first()
                    .map(|parent_id| RelationTag::ChildOf {
                        parent_id: *parent_id,
                        sibling_index,
                    })
                    .unwrap_or(RelationTag::Detached),
                RelationTag::FatherOf { .. } | RelationTag::MotherOf { .. } => member
                    .spouse_id
                    .map(|spouse_id| RelationTag::SpouseOf {
                        member_id: spouse_id,
                    })
                    .unwrap_or(RelationTag::Detached),
                _ => RelationTag::Detached,
            };
            member.relation = next;
            reanchored.push((member_id, next));
        }

        Some(Removal {
            removed,
            reanchored,
        })
    }

    /// Verifies spouse symmetry and parent/child duality.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for member in self.members.values() {
            if let Some(spouse_id) = member.spouse_id {
                let spouse = self.members.get(&spouse_id).ok_or(
                    InvariantViolation::MissingSpouse {
                        member_id: member.id,
                        spouse_id,
                    },
                )?;
                if spouse.spouse_id != Some(member.id) {
                    return Err(InvariantViolation::AsymmetricSpouse {
                        member_id: member.id,
                        spouse_id,
                    });
                }
            }

            if member.parent_ids.len() > MAX_PARENTS {
                return Err(InvariantViolation::TooManyParents {
                    member_id: member.id,
                    count: member.parent_ids.len(),
                });
            }

            for child_id in &member.children_ids {
                let linked = self
                    .members
                    .get(child_id)
                    .is_some_and(|child| child.parent_ids.contains(&member.id));
                if !linked {
                    return Err(InvariantViolation::ChildNotLinked {
                        parent_id: member.id,
                        child_id: *child_id,
                    });
                }
            }
            for parent_id in &member.parent_ids {
                let linked = self
                    .members
                    .get(parent_id)
                    .is_some_and(|parent| parent.children_ids.contains(&member.id));
                if !linked {
                    return Err(InvariantViolation::ParentNotLinked {
                        child_id: member.id,
                        parent_id: *parent_id,
                    });
                }
            }
        }
        Ok(())
    }
}
