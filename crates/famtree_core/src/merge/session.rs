//! Two-phase merge state machine.
//!
//! # Responsibility
//! - Run the silent auto-merge of ancestor candidates.
//! - Host the interactive child reconciliation and commit its plan.
//!
//! # Invariants
//! - Phases only move forward: `merging -> children -> complete` or
//!   `merging -> complete`.
//! - `children` is entered only when either side has at least one child.
//! - A failed run still advances the phase; the failure is kept in the
//!   phase report instead of a separate error state.

use crate::merge::apply::{apply_sequentially, MergeApplier, MergeReport};
use crate::merge::children::ChildReconciliation;
use crate::merge::input::{ChildMergeData, MergeCandidate, MergeInstruction};
use crate::model::member::MemberId;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

/// Pause between the end of auto-merge and showing the children dialog.
pub const CHILDREN_PHASE_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePhase {
    Merging,
    Children,
    Complete,
}

impl MergePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Merging => "merging",
            Self::Children => "children",
            Self::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeSessionError {
    WrongPhase {
        expected: MergePhase,
        actual: MergePhase,
    },
}

impl Display for MergeSessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongPhase { expected, actual } => write!(
                f,
                "merge session is in phase {} but {} was required",
                actual.as_str(),
                expected.as_str()
            ),
        }
    }
}

impl Error for MergeSessionError {}

/// One merge between a source tree and a target tree.
#[derive(Debug, Clone)]
pub struct MergeSession {
    phase: MergePhase,
    candidates: Vec<MergeCandidate>,
    child_data: Option<ChildMergeData>,
    reconciliation: Option<ChildReconciliation>,
    children_entered_at: Option<Instant>,
    auto_merge_report: Option<MergeReport>,
    children_report: Option<MergeReport>,
    separate_ids: Vec<MemberId>,
}

impl MergeSession {
    pub fn new(candidates: Vec<MergeCandidate>, child_data: Option<ChildMergeData>) -> Self {
        Self {
            phase: MergePhase::Merging,
            candidates,
            child_data,
            reconciliation: None,
            children_entered_at: None,
            auto_merge_report: None,
            children_report: None,
            separate_ids: Vec::new(),
        }
    }

    pub fn phase(&self) -> MergePhase {
        self.phase
    }

    pub fn candidates(&self) -> &[MergeCandidate] {
        &self.candidates
    }

    /// Applies every candidate in input order, then leaves `merging`.
    pub fn run_auto_merge<A: MergeApplier + ?Sized>(
        &mut self,
        applier: &mut A,
    ) -> Result<&MergeReport, MergeSessionError> {
        self.run_auto_merge_at(applier, Instant::now())
    }

    /// Same as [`Self::run_auto_merge`] with an explicit clock reading.
    pub fn run_auto_merge_at<A: MergeApplier + ?Sized>(
        &mut self,
        applier: &mut A,
        now: Instant,
    ) -> Result<&MergeReport, MergeSessionError> {
        self.expect_phase(MergePhase::Merging)?;

        let instructions: Vec<MergeInstruction> = self
            .candidates
            .iter()
            .map(MergeCandidate::instruction)
            .collect();
        let report = apply_sequentially(applier, &instructions);

        let next = match self.child_data.as_ref().filter(|data| data.has_children()) {
            Some(data) => {
                self.reconciliation = Some(ChildReconciliation::new(data));
                self.children_entered_at = Some(now);
                MergePhase::Children
            }
            None => MergePhase::Complete,
        };
        self.transition(next, &report);
        Ok(self.auto_merge_report.insert(report))
    }

    /// Whether the children dialog may be shown at `now`.
    pub fn children_dialog_ready(&self, now: Instant) -> bool {
        self.phase == MergePhase::Children
            && self
                .children_entered_at
                .is_some_and(|entered| now.saturating_duration_since(entered) >= CHILDREN_PHASE_DELAY)
    }

    pub fn reconciliation(&self) -> Option<&ChildReconciliation> {
        self.reconciliation.as_ref()
    }

    /// Mutable reconciliation state; available only in `children`.
    pub fn reconciliation_mut(&mut self) -> Option<&mut ChildReconciliation> {
        if self.phase != MergePhase::Children {
            return None;
        }
        self.reconciliation.as_mut()
    }

    /// Applies the reconciliation plan and completes the session.
    pub fn commit_children<A: MergeApplier + ?Sized>(
        &mut self,
        applier: &mut A,
    ) -> Result<&MergeReport, MergeSessionError> {
        self.expect_phase(MergePhase::Children)?;

        let plan = self
            .reconciliation
            .as_ref()
            .map(ChildReconciliation::plan)
            .unwrap_or_default();
        let report = apply_sequentially(applier, &plan.merges);
        self.separate_ids = plan.separate_ids;

        self.transition(MergePhase::Complete, &report);
        Ok(self.children_report.insert(report))
    }

    pub fn auto_merge_report(&self) -> Option<&MergeReport> {
        self.auto_merge_report.as_ref()
    }

    pub fn children_report(&self) -> Option<&MergeReport> {
        self.children_report.as_ref()
    }

    /// Children kept apart by the last commit. Reported only.
    pub fn separate_ids(&self) -> &[MemberId] {
        &self.separate_ids
    }

    fn expect_phase(&self, expected: MergePhase) -> Result<(), MergeSessionError> {
        if self.phase != expected {
            return Err(MergeSessionError::WrongPhase {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    fn transition(&mut self, next: MergePhase, report: &MergeReport) {
        info!(
            "event=merge_phase module=merge status={} from={} to={} applied={} not_attempted={}",
            if report.is_complete() { "ok" } else { "error" },
            self.phase.as_str(),
            next.as_str(),
            report.applied.len(),
            report.not_attempted.len()
        );
        self.phase = next;
    }
}

#[cfg(test)]
mod tests {
    use super::{MergePhase, MergeSession, MergeSessionError, CHILDREN_PHASE_DELAY};
    use crate::merge::apply::{MergeApplier, MergeApplyError, MergeRecord};
    use crate::merge::input::{ChildCandidate, ChildMergeData, MergeInstruction};
    use crate::model::member::Gender;
    use std::time::Instant;
    use uuid::Uuid;

    struct RefusingApplier;

    impl MergeApplier for RefusingApplier {
        fn apply_merge(
            &mut self,
            _instruction: &MergeInstruction,
        ) -> Result<MergeRecord, MergeApplyError> {
            Err(MergeApplyError::Rejected("offline".to_string()))
        }
    }

    #[test]
    fn no_children_goes_straight_to_complete() {
        let mut session = MergeSession::new(Vec::new(), Some(ChildMergeData::default()));
        session
            .run_auto_merge(&mut RefusingApplier)
            .expect("phase is merging");
        assert_eq!(session.phase(), MergePhase::Complete);
        assert!(session.reconciliation().is_none());
    }

    #[test]
    fn children_phase_waits_for_delay_and_rejects_rerun() {
        let data = ChildMergeData {
            source_children: vec![ChildCandidate {
                id: Uuid::new_v4(),
                name: "A".to_string(),
                gender: Gender::Male,
            }],
            target_children: Vec::new(),
            suggested_pairs: Vec::new(),
        };
        let mut session = MergeSession::new(Vec::new(), Some(data));
        let start = Instant::now();
        session
            .run_auto_merge_at(&mut RefusingApplier, start)
            .expect("phase is merging");

        assert_eq!(session.phase(), MergePhase::Children);
        assert!(!session.children_dialog_ready(start));
        assert!(session.children_dialog_ready(start + CHILDREN_PHASE_DELAY));
        assert_eq!(
            session.run_auto_merge(&mut RefusingApplier).err(),
            Some(MergeSessionError::WrongPhase {
                expected: MergePhase::Merging,
                actual: MergePhase::Children,
            })
        );
    }

    #[test]
    fn commit_requires_children_phase() {
        let mut session = MergeSession::new(Vec::new(), None);
        assert!(matches!(
            session.commit_children(&mut RefusingApplier),
            Err(MergeSessionError::WrongPhase {
                expected: MergePhase::Children,
                actual: MergePhase::Merging,
            })
        ));
        assert!(session.reconciliation_mut().is_none());
    }
}
