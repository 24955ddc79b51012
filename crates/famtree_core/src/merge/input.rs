//! Merge inputs produced by external classifiers.

use crate::graph::store::FamilyGraph;
use crate::model::member::{Gender, MemberId};

/// Generation-level overlap class of one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRelationship {
    Parent,
    Grandparent,
    Sibling,
}

impl MergeRelationship {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::Grandparent => "grandparent",
            Self::Sibling => "sibling",
        }
    }
}

/// Pair of members believed to be the same person.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeCandidate {
    pub source_id: MemberId,
    pub target_id: MemberId,
    pub source_name: String,
    pub target_name: String,
    pub relationship: MergeRelationship,
}

impl MergeCandidate {
    pub fn instruction(&self) -> MergeInstruction {
        MergeInstruction {
            source_id: self.source_id,
            target_id: self.target_id,
        }
    }
}

/// Proposed match between a source child and a target child.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuggestedPair {
    pub source_child: MemberId,
    pub target_child: MemberId,
    /// Higher is more similar.
    pub similarity: f64,
}

/// Child entry shown during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildCandidate {
    pub id: MemberId,
    pub name: String,
    pub gender: Gender,
}

/// Children of the closest unresolved generation on both sides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChildMergeData {
    pub source_children: Vec<ChildCandidate>,
    pub target_children: Vec<ChildCandidate>,
    pub suggested_pairs: Vec<SuggestedPair>,
}

impl ChildMergeData {
    /// Collects the children of `source_parent` and `target_parent` in their
    /// sibling order. Unknown parents contribute no children.
    pub fn from_graphs(
        source: &FamilyGraph,
        source_parent: MemberId,
        target: &FamilyGraph,
        target_parent: MemberId,
        suggested_pairs: Vec<SuggestedPair>,
    ) -> Self {
        Self {
            source_children: child_candidates(source, source_parent),
            target_children: child_candidates(target, target_parent),
            suggested_pairs,
        }
    }

    pub fn has_children(&self) -> bool {
        !self.source_children.is_empty() || !self.target_children.is_empty()
    }
}

fn child_candidates(graph: &FamilyGraph, parent_id: MemberId) -> Vec<ChildCandidate> {
    graph
        .children_of(parent_id)
        .into_iter()
        .map(|child| ChildCandidate {
            id: child.id,
            name: child.name.clone(),
            gender: child.gender,
        })
        .collect()
}

/// One directed merge: `source_id` is unioned into `target_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeInstruction {
    pub source_id: MemberId,
    pub target_id: MemberId,
}
