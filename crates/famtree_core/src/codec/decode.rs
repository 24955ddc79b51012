//! Row-to-graph decoding.
//!
//! # Responsibility
//! - Build an id-keyed member map from persisted rows (pass 1).
//! - Resolve each member's anchor relation into spouse/parent/child edges (pass 2).
//!
//! # Invariants
//! - Pass 2 runs over the complete map, so row order never matters.
//! - Every edge that cannot be wired is reported as a [`DecodeIssue`].
//! - The decoded graph always satisfies spouse symmetry and parent/child duality.

use crate::codec::legacy::{self, LegacyMemberRow, UnparseableRelation};
use crate::graph::store::{FamilyGraph, MAX_PARENTS};
use crate::model::member::{FamilyMember, Gender, MemberId, UserId};
use crate::model::relation::RelationTag;
use crate::repo::member_repo::MemberRow;
use std::fmt::{Display, Formatter};

/// Per-row problem found while decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeIssue {
    /// Legacy relation text could not be parsed; the member was kept detached.
    UnparseableRelation {
        member_id: MemberId,
        error: UnparseableRelation,
    },
    /// Legacy row id (or owner id) is not a valid identifier; the row was skipped.
    InvalidRowId { raw: String },
    /// Two rows share one id; the later row won.
    DuplicateRow { member_id: MemberId },
    /// Anchor relation points at a member that is not in the tree.
    MissingReference {
        member_id: MemberId,
        referenced_id: MemberId,
    },
    /// Spouse edge rejected because one side is already married to someone else.
    SpouseConflict {
        member_id: MemberId,
        spouse_id: MemberId,
    },
    /// Parent edge rejected because the child already has two parents.
    ParentLimit {
        child_id: MemberId,
        parent_id: MemberId,
    },
}

impl Display for DecodeIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnparseableRelation { member_id, error } => {
                write!(f, "member {member_id}: {error}")
            }
            Self::InvalidRowId { raw } => write!(f, "invalid row id `{raw}`"),
            Self::DuplicateRow { member_id } => write!(f, "duplicate row for member {member_id}"),
            Self::MissingReference {
                member_id,
                referenced_id,
            } => write!(
                f,
                "member {member_id} references missing member {referenced_id}"
            ),
            Self::SpouseConflict {
                member_id,
                spouse_id,
            } => write!(
                f,
                "spouse edge {member_id} <-> {spouse_id} conflicts with an existing spouse"
            ),
            Self::ParentLimit {
                child_id,
                parent_id,
            } => write!(
                f,
                "child {child_id} already has two parents; {parent_id} not linked"
            ),
        }
    }
}

/// Decoded graph plus every issue met on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTree {
    pub graph: FamilyGraph,
    pub issues: Vec<DecodeIssue>,
}

/// Decodes structured rows into a graph.
pub fn decode_rows(owner_id: UserId, rows: &[MemberRow]) -> DecodedTree {
    let mut graph = FamilyGraph::new(owner_id);
    let mut issues = Vec::new();

    for row in rows {
        if graph.contains(row.id) {
            issues.push(DecodeIssue::DuplicateRow { member_id: row.id });
        }
        graph.insert_unwired(member_from_row(row));
    }

    wire_edges(&mut graph, &mut issues);
    DecodedTree { graph, issues }
}

/// Decodes legacy string rows into a graph.
pub fn decode_legacy_rows(owner_id: UserId, rows: &[LegacyMemberRow]) -> DecodedTree {
    let (converted, mut issues) = legacy::rows_from_legacy(rows);
    let mut decoded = decode_rows(owner_id, &converted);
    issues.append(&mut decoded.issues);
    decoded.issues = issues;
    decoded
}

fn member_from_row(row: &MemberRow) -> FamilyMember {
    FamilyMember {
        id: row.id,
        owner_id: row.owner_id,
        name: row.member_name.clone(),
        gender: row.gender.unwrap_or(match row.relation {
            RelationTag::MotherOf { .. } => Gender::Female,
            _ => Gender::Male,
        }),
        avatar_url: row.avatar_url.clone(),
        is_placeholder: row.is_placeholder,
        linked_user_id: row.linked_user_id,
        position: row.position,
        spouse_id: None,
        parent_ids: Vec::new(),
        children_ids: Vec::new(),
        relation: row.relation,
    }
}

fn wire_edges(graph: &mut FamilyGraph, issues: &mut Vec<DecodeIssue>) {
    let anchors: Vec<(MemberId, RelationTag)> = graph
        .members()
        .map(|member| (member.id, member.relation))
        .collect();

    for (member_id, tag) in &anchors {
        if let RelationTag::SpouseOf { member_id: spouse_id } = *tag {
            if !graph.contains(spouse_id) {
                issues.push(DecodeIssue::MissingReference {
                    member_id: *member_id,
                    referenced_id: spouse_id,
                });
                continue;
            }
            if !link_spouses(graph, *member_id, spouse_id) {
                issues.push(DecodeIssue::SpouseConflict {
                    member_id: *member_id,
                    spouse_id,
                });
            }
        }
    }

    // Fathers first so a child lists its parents as `[father, mother]`.
    let parent_anchors = anchors
        .iter()
        .filter(|(_, tag)| matches!(tag, RelationTag::FatherOf { .. }))
        .chain(
            anchors
                .iter()
                .filter(|(_, tag)| matches!(tag, RelationTag::MotherOf { .. })),
        );
    for (member_id, tag) in parent_anchors {
        if let RelationTag::FatherOf { child_id } | RelationTag::MotherOf { child_id } = *tag {
            if !graph.contains(child_id) {
                issues.push(DecodeIssue::MissingReference {
                    member_id: *member_id,
                    referenced_id: child_id,
                });
                continue;
            }
            link_parent(graph, *member_id, child_id, issues);
        }
    }

    // Father/mother anchors carry no spouse reference; co-parents are married.
    let co_parents: Vec<(MemberId, MemberId)> = graph
        .members()
        .filter_map(|member| match member.parent_ids.as_slice() {
            [first, second] => Some((*first, *second)),
            _ => None,
        })
        .collect();
    for (first, second) in co_parents {
        let unpaired = |id| graph.get(id).is_some_and(|m| m.spouse_id.is_none());
        if unpaired(first) && unpaired(second) {
            link_spouses(graph, first, second);
        }
    }

    // A spouse added after one parent was removed adopts the single-parent child.
    let adoptions: Vec<(MemberId, MemberId)> = anchors
        .iter()
        .filter_map(|(member_id, tag)| match *tag {
            RelationTag::FatherOf { child_id } | RelationTag::MotherOf { child_id } => {
                let spouse_id = graph.get(*member_id)?.spouse_id?;
                Some((spouse_id, child_id))
            }
            _ => None,
        })
        .collect();
    for (spouse_id, child_id) in adoptions {
        let single_parent = graph
            .get(child_id)
            .is_some_and(|child| child.parent_ids.len() < MAX_PARENTS);
        if single_parent {
            link_parent(graph, spouse_id, child_id, issues);
        }
    }

    let mut child_edges: Vec<(u32, MemberId, MemberId)> = Vec::new();
    for (member_id, tag) in &anchors {
        if let RelationTag::ChildOf {
            parent_id,
            sibling_index,
        } = *tag
        {
            let Some(parent) = graph.get(parent_id) else {
                issues.push(DecodeIssue::MissingReference {
                    member_id: *member_id,
                    referenced_id: parent_id,
                });
                continue;
            };
            child_edges.push((sibling_index, parent_id, *member_id));
            if let Some(co_parent) = parent.spouse_id {
                child_edges.push((sibling_index, co_parent, *member_id));
            }
        }
    }
    child_edges.sort_by_key(|(sibling_index, _, _)| *sibling_index);
    for (_, parent_id, child_id) in child_edges {
        link_parent(graph, parent_id, child_id, issues);
    }
}

fn link_spouses(graph: &mut FamilyGraph, a: MemberId, b: MemberId) -> bool {
    if a == b {
        return false;
    }
    let (Some(current_a), Some(current_b)) = (
        graph.get(a).map(|member| member.spouse_id),
        graph.get(b).map(|member| member.spouse_id),
    ) else {
        return false;
    };
    let compatible =
        current_a.map_or(true, |spouse| spouse == b) && current_b.map_or(true, |spouse| spouse == a);
    if !compatible {
        return false;
    }
    if let Some(member) = graph.get_mut(a) {
        member.spouse_id = Some(b);
    }
    if let Some(member) = graph.get_mut(b) {
        member.spouse_id = Some(a);
    }
    true
}

fn link_parent(
    graph: &mut FamilyGraph,
    parent_id: MemberId,
    child_id: MemberId,
    issues: &mut Vec<DecodeIssue>,
) {
    let Some(child) = graph.get(child_id) else {
        return;
    };
    if parent_id == child_id || child.parent_ids.contains(&parent_id) {
        return;
    }
    if child.parent_ids.len() >= MAX_PARENTS {
        issues.push(DecodeIssue::ParentLimit {
            child_id,
            parent_id,
        });
        return;
    }
    if let Some(child) = graph.get_mut(child_id) {
        child.parent_ids.push(parent_id);
    }
    if let Some(parent) = graph.get_mut(parent_id) {
        if !parent.children_ids.contains(&child_id) {
            parent.children_ids.push(child_id);
        }
    }
}
