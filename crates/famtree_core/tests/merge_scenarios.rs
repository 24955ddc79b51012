use famtree_core::merge::apply::apply_sequentially;
use famtree_core::merge::session::CHILDREN_PHASE_DELAY;
use famtree_core::{
    ChildCandidate, ChildMergeData, ChildReconciliation, FamilyGraph, Gender, GraphMergeApplier,
    MemberDraft, MemberId, MergeApplyError, MergeCandidate, MergeInstruction, MergePhase,
    MergeRelationship, MergeSession, Side, SuggestedPair,
};
use std::time::{Duration, Instant};
use uuid::Uuid;

struct Children {
    a: MemberId,
    b: MemberId,
    x: MemberId,
    y: MemberId,
    data: ChildMergeData,
}

fn child(id: MemberId, name: &str, gender: Gender) -> ChildCandidate {
    ChildCandidate {
        id,
        name: name.to_string(),
        gender,
    }
}

fn two_by_two() -> Children {
    let (a, b, x, y) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let data = ChildMergeData {
        source_children: vec![child(a, "A", Gender::Male), child(b, "B", Gender::Female)],
        target_children: vec![child(x, "X", Gender::Male), child(y, "Y", Gender::Female)],
        suggested_pairs: vec![
            SuggestedPair {
                source_child: a,
                target_child: x,
                similarity: 0.9,
            },
            SuggestedPair {
                source_child: b,
                target_child: y,
                similarity: 0.8,
            },
        ],
    };
    Children { a, b, x, y, data }
}

#[test]
fn default_accept_merges_every_suggested_pair() {
    let children = two_by_two();
    let plan = ChildReconciliation::new(&children.data).plan();

    assert_eq!(
        plan.merges,
        vec![
            MergeInstruction {
                source_id: children.a,
                target_id: children.x
            },
            MergeInstruction {
                source_id: children.b,
                target_id: children.y
            },
        ]
    );
    assert!(plan.separate_ids.is_empty());
}

#[test]
fn manual_opt_out_moves_both_sides_to_separate() {
    let children = two_by_two();
    let mut reconciliation = ChildReconciliation::new(&children.data);

    assert!(reconciliation.toggle(Side::Source, children.a));
    let plan = reconciliation.plan();

    assert_eq!(
        plan.merges,
        vec![MergeInstruction {
            source_id: children.b,
            target_id: children.y
        }]
    );
    assert!(plan.separate_ids.contains(&children.a));
    assert!(plan.separate_ids.contains(&children.x));
    assert_eq!(plan.separate_ids.len(), 2);
}

#[test]
fn drag_onto_other_gender_slot_changes_nothing() {
    let children = two_by_two();
    let mut reconciliation = ChildReconciliation::new(&children.data);
    let before = reconciliation.clone();

    assert!(!reconciliation.move_child(Side::Source, 0, 1));
    assert!(!reconciliation.move_child(Side::Target, 1, 0));
    assert_eq!(reconciliation, before);
}

#[test]
fn out_of_range_drag_changes_nothing() {
    let children = two_by_two();
    let mut reconciliation = ChildReconciliation::new(&children.data);
    let before = reconciliation.clone();

    assert!(!reconciliation.move_child(Side::Source, 0, 5));
    assert_eq!(reconciliation, before);
}

#[test]
fn every_child_is_either_merged_or_separate() {
    let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let (x, y) = (Uuid::new_v4(), Uuid::new_v4());
    let data = ChildMergeData {
        source_children: vec![
            child(a, "A", Gender::Male),
            child(b, "B", Gender::Female),
            child(c, "C", Gender::Male),
        ],
        target_children: vec![child(x, "X", Gender::Female), child(y, "Y", Gender::Male)],
        suggested_pairs: vec![
            SuggestedPair {
                source_child: b,
                target_child: x,
                similarity: 0.7,
            },
            // Gender mismatch, ignored.
            SuggestedPair {
                source_child: a,
                target_child: x,
                similarity: 0.95,
            },
        ],
    };

    let plan = ChildReconciliation::new(&data).plan();
    assert_eq!(
        plan.merges,
        vec![MergeInstruction {
            source_id: b,
            target_id: x
        }]
    );

    let mut seen: Vec<MemberId> = plan
        .merges
        .iter()
        .flat_map(|merge| [merge.source_id, merge.target_id])
        .chain(plan.separate_ids.iter().copied())
        .collect();
    seen.sort();
    let mut all = vec![a, b, c, x, y];
    all.sort();
    assert_eq!(seen, all);
}

#[test]
fn merges_never_pair_children_of_different_gender() {
    let children = two_by_two();
    let mut reconciliation = ChildReconciliation::new(&children.data);
    reconciliation.toggle(Side::Source, children.a);
    reconciliation.toggle(Side::Target, children.y);
    reconciliation.toggle(Side::Source, children.a);
    reconciliation.toggle(Side::Target, children.y);

    let genders = |id: MemberId| {
        children
            .data
            .source_children
            .iter()
            .chain(&children.data.target_children)
            .find(|candidate| candidate.id == id)
            .map(|candidate| candidate.gender)
    };
    for merge in reconciliation.plan().merges {
        assert_eq!(genders(merge.source_id), genders(merge.target_id));
    }
}

struct Trees {
    source: FamilyGraph,
    target: FamilyGraph,
    candidates: Vec<MergeCandidate>,
    child_data: ChildMergeData,
    target_parent: MemberId,
    target_son: MemberId,
    target_daughter: MemberId,
    account: Uuid,
}

fn overlapping_trees() -> Trees {
    let account = Uuid::new_v4();
    let mut source = FamilyGraph::new(Uuid::new_v4());
    let (source_parent, _) = source.add_initial_couple(
        MemberDraft::new("Dad", Gender::Male).with_avatar("https://img/dad.png"),
        MemberDraft::new("Mum", Gender::Female),
    );
    source.link_account(source_parent, account);
    let source_son = source
        .add_child(source_parent, MemberDraft::new("Son", Gender::Male))
        .unwrap();
    let source_daughter = source
        .add_child(source_parent, MemberDraft::new("Daughter", Gender::Female))
        .unwrap();

    let mut target = FamilyGraph::new(Uuid::new_v4());
    let (target_parent, _) = target.add_initial_couple(
        MemberDraft::new("Father", Gender::Male),
        MemberDraft::new("Mother", Gender::Female),
    );
    let target_son = target
        .add_child(target_parent, MemberDraft::new("Sonny", Gender::Male))
        .unwrap();
    let target_daughter = target
        .add_child(target_parent, MemberDraft::new("Dottie", Gender::Female))
        .unwrap();

    let candidates = vec![MergeCandidate {
        source_id: source_parent,
        target_id: target_parent,
        source_name: "Dad".to_string(),
        target_name: "Father".to_string(),
        relationship: MergeRelationship::Parent,
    }];
    let child_data = ChildMergeData::from_graphs(
        &source,
        source_parent,
        &target,
        target_parent,
        vec![
            SuggestedPair {
                source_child: source_son,
                target_child: target_son,
                similarity: 0.6,
            },
            SuggestedPair {
                source_child: source_daughter,
                target_child: target_daughter,
                similarity: 0.6,
            },
        ],
    );

    Trees {
        source,
        target,
        candidates,
        child_data,
        target_parent,
        target_son,
        target_daughter,
        account,
    }
}

#[test]
fn full_session_unions_ancestors_then_children() {
    let mut trees = overlapping_trees();
    let start = Instant::now();
    let mut session = MergeSession::new(trees.candidates.clone(), Some(trees.child_data.clone()));

    {
        let mut applier = GraphMergeApplier::new(&trees.source, &mut trees.target);
        let report = session.run_auto_merge_at(&mut applier, start).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.applied.len(), 1);
        assert_eq!(session.phase(), MergePhase::Children);
        assert!(!session.children_dialog_ready(start + Duration::from_millis(100)));
        assert!(session.children_dialog_ready(start + CHILDREN_PHASE_DELAY));

        assert_eq!(session.reconciliation().unwrap().source().len(), 2);
        let report = session.commit_children(&mut applier).unwrap();
        assert_eq!(report.applied.len(), 2);
    }

    assert_eq!(session.phase(), MergePhase::Complete);
    assert!(session.separate_ids().is_empty());
    assert!(session.reconciliation_mut().is_none());

    let parent = trees.target.get(trees.target_parent).unwrap();
    assert_eq!(parent.name, "Father");
    assert_eq!(parent.linked_user_id, Some(trees.account));
    assert_eq!(parent.avatar_url.as_deref(), Some("https://img/dad.png"));
    assert!(!parent.is_placeholder);
    assert!(trees.target.contains(trees.target_son));
    assert!(trees.target.contains(trees.target_daughter));
    assert!(trees.target.check_invariants().is_ok());
}

#[test]
fn session_without_children_completes_after_auto_merge() {
    let mut trees = overlapping_trees();
    let mut session = MergeSession::new(trees.candidates.clone(), Some(ChildMergeData::default()));
    let mut applier = GraphMergeApplier::new(&trees.source, &mut trees.target);

    session.run_auto_merge(&mut applier).unwrap();

    assert_eq!(session.phase(), MergePhase::Complete);
    assert!(session.commit_children(&mut applier).is_err());
    assert!(session.run_auto_merge(&mut applier).is_err());
}

#[test]
fn failed_merge_keeps_prefix_and_skips_suffix() {
    let mut trees = overlapping_trees();
    let good = trees.candidates[0].instruction();
    let missing = MergeInstruction {
        source_id: Uuid::new_v4(),
        target_id: trees.target_son,
    };
    let never = MergeInstruction {
        source_id: good.source_id,
        target_id: trees.target_daughter,
    };

    let before_daughter = trees.target.get(trees.target_daughter).unwrap().clone();
    let report = {
        let mut applier = GraphMergeApplier::new(&trees.source, &mut trees.target);
        apply_sequentially(&mut applier, &[good, missing, never])
    };

    assert_eq!(report.applied.len(), 1);
    assert_eq!(report.applied[0].instruction, good);
    let failure = report.failure.unwrap();
    assert_eq!(failure.instruction, missing);
    assert!(matches!(failure.error, MergeApplyError::SourceMissing(_)));
    assert_eq!(report.not_attempted, vec![never]);
    assert_eq!(
        trees.target.get(trees.target_daughter).unwrap(),
        &before_daughter
    );
}

#[test]
fn auto_merge_failure_still_advances_the_session() {
    let mut trees = overlapping_trees();
    let mut candidates = trees.candidates.clone();
    candidates.insert(
        0,
        MergeCandidate {
            source_id: Uuid::new_v4(),
            target_id: trees.target_parent,
            source_name: "Ghost".to_string(),
            target_name: "Father".to_string(),
            relationship: MergeRelationship::Grandparent,
        },
    );
    let mut session = MergeSession::new(candidates, Some(trees.child_data.clone()));
    let mut applier = GraphMergeApplier::new(&trees.source, &mut trees.target);

    let report = session.run_auto_merge(&mut applier).unwrap();
    assert!(!report.is_complete());
    assert!(report.applied.is_empty());
    assert_eq!(report.not_attempted.len(), 1);
    assert_eq!(session.phase(), MergePhase::Children);
    assert!(session.auto_merge_report().is_some());
}

#[test]
fn auto_merge_applies_every_candidate_unconditionally() {
    let mut source = FamilyGraph::new(Uuid::new_v4());
    let mut target = FamilyGraph::new(Uuid::new_v4());
    let (a, b) = source.add_initial_couple(
        MemberDraft::new("A", Gender::Male),
        MemberDraft::new("B", Gender::Female),
    );
    let (x, y) = target.add_initial_couple(
        MemberDraft::new("X", Gender::Female),
        MemberDraft::new("Y", Gender::Male),
    );
    let candidate = |source_id, target_id| MergeCandidate {
        source_id,
        target_id,
        source_name: String::new(),
        target_name: String::new(),
        relationship: MergeRelationship::Grandparent,
    };
    let mut session = MergeSession::new(vec![candidate(a, x), candidate(b, y)], None);

    let report = {
        let mut applier = GraphMergeApplier::new(&source, &mut target);
        session.run_auto_merge(&mut applier).unwrap().clone()
    };

    assert!(report.is_complete());
    assert_eq!(report.applied.len(), 2);
    assert!(report.not_attempted.is_empty());
    assert_eq!(session.phase(), MergePhase::Complete);
    assert_eq!(target.get(x).unwrap().gender, Gender::Female);
    assert!(target.check_invariants().is_ok());
}
