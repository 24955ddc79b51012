//! Merge commands, snapshots and sequential application.
//!
//! # Invariants
//! - Instructions are applied one at a time, in input order.
//! - The first failure stops the run; the report separates the committed
//!   prefix, the failed instruction and the unattempted suffix.
//! - Every applied merge carries before/after snapshots. There is no undo.

use crate::graph::store::FamilyGraph;
use crate::merge::input::MergeInstruction;
use crate::model::member::{FamilyMember, MemberId};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from applying one merge instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeApplyError {
    SourceMissing(MemberId),
    TargetMissing(MemberId),
    /// The applier refused or could not persist the merge.
    Rejected(String),
}

impl Display for MergeApplyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceMissing(id) => write!(f, "merge source not found: {id}"),
            Self::TargetMissing(id) => write!(f, "merge target not found: {id}"),
            Self::Rejected(message) => write!(f, "merge rejected: {message}"),
        }
    }
}

impl Error for MergeApplyError {}

/// Audit entry for one applied merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeRecord {
    pub instruction: MergeInstruction,
    pub source_before: FamilyMember,
    pub target_before: FamilyMember,
    pub target_after: FamilyMember,
}

/// Executes merge instructions against some tree representation.
pub trait MergeApplier {
    fn apply_merge(&mut self, instruction: &MergeInstruction)
        -> Result<MergeRecord, MergeApplyError>;
}

/// Applies merges by unioning source identities into target graph members.
///
/// The union keeps the target's name and relationships; it fills the linked
/// account and avatar from the source when the target has none, and the
/// result is a placeholder only if both records were. Genders are not
/// compared; child pairing enforces them before instructions are planned.
pub struct GraphMergeApplier<'a> {
    source: &'a FamilyGraph,
    target: &'a mut FamilyGraph,
}

impl<'a> GraphMergeApplier<'a> {
    pub fn new(source: &'a FamilyGraph, target: &'a mut FamilyGraph) -> Self {
        Self { source, target }
    }
}

impl MergeApplier for GraphMergeApplier<'_> {
    fn apply_merge(
        &mut self,
        instruction: &MergeInstruction,
    ) -> Result<MergeRecord, MergeApplyError> {
        let source = self
            .source
            .get(instruction.source_id)
            .ok_or(MergeApplyError::SourceMissing(instruction.source_id))?;
        let target = self
            .target
            .get_mut(instruction.target_id)
            .ok_or(MergeApplyError::TargetMissing(instruction.target_id))?;
        let source_before = source.clone();
        let target_before = target.clone();
        if target.linked_user_id.is_none() {
            target.linked_user_id = source.linked_user_id;
        }
        if target.avatar_url.is_none() {
            target.avatar_url = source.avatar_url.clone();
        }
        if target.name.trim().is_empty() {
            target.name = source.name.clone();
        }
        target.is_placeholder = target.is_placeholder && source.is_placeholder;

        Ok(MergeRecord {
            instruction: *instruction,
            source_before,
            target_before,
            target_after: target.clone(),
        })
    }
}

/// Failed instruction and its error.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeFailure {
    pub instruction: MergeInstruction,
    pub error: MergeApplyError,
}

/// Outcome of one sequential run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    /// Committed prefix, in order.
    pub applied: Vec<MergeRecord>,
    pub failure: Option<MergeFailure>,
    /// Suffix after the failure, never attempted.
    pub not_attempted: Vec<MergeInstruction>,
}

impl MergeReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Applies `instructions` in order, stopping at the first failure.
pub fn apply_sequentially<A: MergeApplier + ?Sized>(
    applier: &mut A,
    instructions: &[MergeInstruction],
) -> MergeReport {
    let mut report = MergeReport::default();
    for (index, instruction) in instructions.iter().enumerate() {
        match applier.apply_merge(instruction) {
            Ok(record) => {
                info!(
                    "event=merge_apply module=merge status=ok source_id={} target_id={}",
                    instruction.source_id, instruction.target_id
                );
                report.applied.push(record);
            }
            Err(err) => {
                error!(
                    "event=merge_apply module=merge status=error source_id={} target_id={} error={err}",
                    instruction.source_id, instruction.target_id
                );
                report.failure = Some(MergeFailure {
                    instruction: *instruction,
                    error: err,
                });
                report.not_attempted = instructions[index + 1..].to_vec();
                break;
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::{apply_sequentially, GraphMergeApplier, MergeApplier, MergeApplyError};
    use crate::graph::store::FamilyGraph;
    use crate::merge::input::MergeInstruction;
    use crate::model::member::{Gender, MemberDraft};
    use uuid::Uuid;

    #[test]
    fn union_fills_target_identity_and_records_snapshots() {
        let mut source = FamilyGraph::new(Uuid::new_v4());
        let mut target = FamilyGraph::new(Uuid::new_v4());
        let (source_root, _) = source.add_initial_couple(
            MemberDraft::new("Ana", Gender::Female).with_avatar("https://img/ana.png"),
            MemberDraft::new("Ben", Gender::Male),
        );
        let (target_root, _) = target.add_initial_couple(
            MemberDraft::new("Ana M.", Gender::Female),
            MemberDraft::new("Ben", Gender::Male),
        );
        let account = Uuid::new_v4();
        assert!(source.link_account(source_root, account));

        let instruction = MergeInstruction {
            source_id: source_root,
            target_id: target_root,
        };
        let record = GraphMergeApplier::new(&source, &mut target)
            .apply_merge(&instruction)
            .expect("merge applies");

        let merged = target.get(target_root).expect("target kept");
        assert_eq!(merged.name, "Ana M.");
        assert_eq!(merged.linked_user_id, Some(account));
        assert_eq!(merged.avatar_url.as_deref(), Some("https://img/ana.png"));
        assert!(!merged.is_placeholder);
        assert!(record.target_before.is_placeholder);
        assert_eq!(&record.target_after, merged);
    }

    #[test]
    fn union_applies_regardless_of_gender() {
        let mut source = FamilyGraph::new(Uuid::new_v4());
        let mut target = FamilyGraph::new(Uuid::new_v4());
        let (source_root, _) = source.add_initial_couple(
            MemberDraft::new("A", Gender::Male),
            MemberDraft::new("B", Gender::Female),
        );
        let (target_root, _) = target.add_initial_couple(
            MemberDraft::new("X", Gender::Female),
            MemberDraft::new("Y", Gender::Male),
        );

        let record = GraphMergeApplier::new(&source, &mut target)
            .apply_merge(&MergeInstruction {
                source_id: source_root,
                target_id: target_root,
            })
            .expect("unconditional union");
        assert_eq!(record.target_after.gender, Gender::Female);
        assert_eq!(record.target_after.name, "X");
    }

    #[test]
    fn run_stops_at_first_failure() {
        let mut source = FamilyGraph::new(Uuid::new_v4());
        let mut target = FamilyGraph::new(Uuid::new_v4());
        let (a, b) = source.add_initial_couple(
            MemberDraft::new("A", Gender::Male),
            MemberDraft::new("B", Gender::Female),
        );
        let (x, y) = target.add_initial_couple(
            MemberDraft::new("X", Gender::Male),
            MemberDraft::new("Y", Gender::Female),
        );
        let missing = Uuid::new_v4();
        let instructions = [
            MergeInstruction {
                source_id: a,
                target_id: x,
            },
            MergeInstruction {
                source_id: missing,
                target_id: y,
            },
            MergeInstruction {
                source_id: b,
                target_id: y,
            },
        ];

        let mut applier = GraphMergeApplier::new(&source, &mut target);
        let report = apply_sequentially(&mut applier, &instructions);
        assert_eq!(report.applied.len(), 1);
        assert_eq!(
            report.failure.as_ref().map(|failure| failure.error.clone()),
            Some(MergeApplyError::SourceMissing(missing))
        );
        assert_eq!(report.not_attempted, vec![instructions[2]]);
        assert!(!report.is_complete());
    }
}
