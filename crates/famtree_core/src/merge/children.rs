//! Interactive child reconciliation list model.
//!
//! # Responsibility
//! - Hold the two ordered child lists and their pairing state.
//! - Apply toggle and reorder actions, and produce the commit plan.
//!
//! # Invariants
//! - Pairing is symmetric: if `a.paired_with_id == Some(b)` then
//!   `b.paired_with_id == Some(a)`, and both sit at the same index with the
//!   same gender and `should_merge == true`.
//! - A reorder stays inside one list and never drops a child onto a slot
//!   occupied by a child of the other gender.
//! - Rejected actions leave both lists unchanged.

use crate::merge::input::{ChildCandidate, ChildMergeData, MergeInstruction, SuggestedPair};
use crate::model::member::MemberId;
use log::debug;
use std::collections::BTreeSet;

/// Which list an action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Self::Source => Self::Target,
            Self::Target => Self::Source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildMergeItem {
    pub child: ChildCandidate,
    pub paired_with_id: Option<MemberId>,
    pub should_merge: bool,
}

impl ChildMergeItem {
    fn unpaired(child: ChildCandidate) -> Self {
        Self {
            child,
            paired_with_id: None,
            should_merge: false,
        }
    }
}

/// Output of a commit: merges to apply in order, plus children kept apart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildMergePlan {
    pub merges: Vec<MergeInstruction>,
    /// Reported only; no structural action is taken on these ids.
    pub separate_ids: Vec<MemberId>,
}

/// Pairing state of one reconciliation dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildReconciliation {
    source: Vec<ChildMergeItem>,
    target: Vec<ChildMergeItem>,
}

impl ChildReconciliation {
    /// Builds both lists from `data`, accepting suggestions by default.
    ///
    /// Suggestions are taken by descending similarity; a suggestion naming an
    /// unknown or already paired child, or two children of different gender,
    /// is ignored. Accepted pairs move to the front of both lists in source
    /// order so that pairs share an index; the remaining children follow in
    /// their original order, unpaired.
    pub fn new(data: &ChildMergeData) -> Self {
        let mut suggestions: Vec<&SuggestedPair> = data.suggested_pairs.iter().collect();
        suggestions.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

        let mut pairs: Vec<(usize, usize)> = Vec::new();
        let mut used_source = BTreeSet::new();
        let mut used_target = BTreeSet::new();
        for suggestion in suggestions {
            let Some(source_index) = position_of(&data.source_children, suggestion.source_child)
            else {
                continue;
            };
            let Some(target_index) = position_of(&data.target_children, suggestion.target_child)
            else {
                continue;
            };
            if used_source.contains(&source_index) || used_target.contains(&target_index) {
                continue;
            }
            if data.source_children[source_index].gender != data.target_children[target_index].gender
            {
                debug!(
                    "event=merge_suggestion module=merge status=skipped source_id={} target_id={} reason=gender_mismatch",
                    suggestion.source_child, suggestion.target_child
                );
                continue;
            }
            used_source.insert(source_index);
            used_target.insert(target_index);
            pairs.push((source_index, target_index));
        }
        pairs.sort_by_key(|(source_index, _)| *source_index);

        let mut source = Vec::with_capacity(data.source_children.len());
        let mut target = Vec::with_capacity(data.target_children.len());
        for (source_index, target_index) in &pairs {
            let source_child = data.source_children[*source_index].clone();
            let target_child = data.target_children[*target_index].clone();
            source.push(ChildMergeItem {
                paired_with_id: Some(target_child.id),
                should_merge: true,
                child: source_child.clone(),
            });
            target.push(ChildMergeItem {
                paired_with_id: Some(source_child.id),
                should_merge: true,
                child: target_child,
            });
        }
        source.extend(
            data.source_children
                .iter()
                .enumerate()
                .filter(|(index, _)| !used_source.contains(index))
                .map(|(_, child)| ChildMergeItem::unpaired(child.clone())),
        );
        target.extend(
            data.target_children
                .iter()
                .enumerate()
                .filter(|(index, _)| !used_target.contains(index))
                .map(|(_, child)| ChildMergeItem::unpaired(child.clone())),
        );

        Self { source, target }
    }

    pub fn source(&self) -> &[ChildMergeItem] {
        &self.source
    }

    pub fn target(&self) -> &[ChildMergeItem] {
        &self.target
    }

    pub fn items(&self, side: Side) -> &[ChildMergeItem] {
        match side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        }
    }

    /// Flips the merge flag of child `id` on `side`.
    ///
    /// Turning it off also unpairs and unflags its counterpart. Turning it on
    /// pairs the child with the entry at the same index on the other side when
    /// that entry is unpaired and of the same gender; otherwise the child is
    /// left flagged but unpaired. Returns `false` when `id` is not on `side`.
    pub fn toggle(&mut self, side: Side, id: MemberId) -> bool {
        let Some(index) = self.index_of(side, id) else {
            return false;
        };

        if self.items(side)[index].should_merge {
            let counterpart = self.items(side)[index].paired_with_id;
            let item = &mut self.items_mut(side)[index];
            item.should_merge = false;
            item.paired_with_id = None;
            if let Some(counterpart_id) = counterpart {
                if let Some(other_index) = self.index_of(side.other(), counterpart_id) {
                    let other = &mut self.items_mut(side.other())[other_index];
                    other.should_merge = false;
                    other.paired_with_id = None;
                }
            }
            return true;
        }

        let gender = self.items(side)[index].child.gender;
        let counterpart = self
            .items(side.other())
            .get(index)
            .filter(|other| other.paired_with_id.is_none() && other.child.gender == gender)
            .map(|other| other.child.id);

        let item = &mut self.items_mut(side)[index];
        item.should_merge = true;
        item.paired_with_id = counterpart;
        if counterpart.is_some() {
            let other = &mut self.items_mut(side.other())[index];
            other.should_merge = true;
            other.paired_with_id = Some(id);
        }
        true
    }

    /// Moves the child at `from` to `to` within one list.
    ///
    /// Rejected (returns `false`, state unchanged) when either index is out
    /// of range or the child at `to` has a different gender. After a move,
    /// pairs are re-derived by index: entries sharing an index are paired
    /// when both want to merge and have the same gender.
    pub fn move_child(&mut self, side: Side, from: usize, to: usize) -> bool {
        let items = self.items(side);
        if from >= items.len() || to >= items.len() {
            return false;
        }
        if items[from].child.gender != items[to].child.gender {
            debug!(
                "event=merge_reorder module=merge status=skipped from={from} to={to} reason=gender_mismatch"
            );
            return false;
        }
        if from == to {
            return true;
        }

        let items = self.items_mut(side);
        let moved = items.remove(from);
        items.insert(to, moved);
        self.realign_pairs();
        true
    }

    /// Produces merges for index-aligned pairs and reports the rest.
    pub fn plan(&self) -> ChildMergePlan {
        let mut plan = ChildMergePlan::default();
        let len = self.source.len().max(self.target.len());
        for index in 0..len {
            let source = self.source.get(index);
            let target = self.target.get(index);
            match (source, target) {
                (Some(source), Some(target))
                    if source.should_merge
                        && target.should_merge
                        && source.child.gender == target.child.gender =>
                {
                    plan.merges.push(MergeInstruction {
                        source_id: source.child.id,
                        target_id: target.child.id,
                    });
                }
                _ => {
                    plan.separate_ids
                        .extend(source.into_iter().chain(target).map(|item| item.child.id));
                }
            }
        }
        plan
    }

    fn realign_pairs(&mut self) {
        let len = self.source.len().max(self.target.len());
        for index in 0..len {
            let counterpart_ids = match (self.source.get(index), self.target.get(index)) {
                (Some(source), Some(target))
                    if source.should_merge
                        && target.should_merge
                        && source.child.gender == target.child.gender =>
                {
                    Some((source.child.id, target.child.id))
                }
                _ => None,
            };
            if let Some(source) = self.source.get_mut(index) {
                source.paired_with_id = counterpart_ids.map(|(_, target_id)| target_id);
            }
            if let Some(target) = self.target.get_mut(index) {
                target.paired_with_id = counterpart_ids.map(|(source_id, _)| source_id);
            }
        }
    }

    fn index_of(&self, side: Side, id: MemberId) -> Option<usize> {
        self.items(side).iter().position(|item| item.child.id == id)
    }

    fn items_mut(&mut self, side: Side) -> &mut Vec<ChildMergeItem> {
        match side {
            Side::Source => &mut self.source,
            Side::Target => &mut self.target,
        }
    }
}

fn position_of(children: &[ChildCandidate], id: MemberId) -> Option<usize> {
    children.iter().position(|child| child.id == id)
}

#[cfg(test)]
mod tests {
    use super::{ChildReconciliation, Side};
    use crate::merge::input::{ChildCandidate, ChildMergeData, MergeInstruction, SuggestedPair};
    use crate::model::member::Gender;
    use uuid::Uuid;

    fn child(name: &str, gender: Gender) -> ChildCandidate {
        ChildCandidate {
            id: Uuid::new_v4(),
            name: name.to_string(),
            gender,
        }
    }

    fn pair(source: &ChildCandidate, target: &ChildCandidate, similarity: f64) -> SuggestedPair {
        SuggestedPair {
            source_child: source.id,
            target_child: target.id,
            similarity,
        }
    }

    #[test]
    fn suggestions_are_aligned_to_shared_indexes() {
        let a = child("A", Gender::Male);
        let b = child("B", Gender::Female);
        let x = child("X", Gender::Female);
        let y = child("Y", Gender::Male);
        let data = ChildMergeData {
            source_children: vec![a.clone(), b.clone()],
            target_children: vec![x.clone(), y.clone()],
            suggested_pairs: vec![pair(&a, &y, 0.9), pair(&b, &x, 0.8)],
        };

        let reconciliation = ChildReconciliation::new(&data);
        let target_ids: Vec<_> = reconciliation
            .target()
            .iter()
            .map(|item| item.child.id)
            .collect();
        assert_eq!(target_ids, vec![y.id, x.id]);
        assert_eq!(
            reconciliation.plan().merges,
            vec![
                MergeInstruction {
                    source_id: a.id,
                    target_id: y.id
                },
                MergeInstruction {
                    source_id: b.id,
                    target_id: x.id
                },
            ]
        );
    }

    #[test]
    fn higher_similarity_wins_a_contested_child() {
        let a = child("A", Gender::Male);
        let c = child("C", Gender::Male);
        let x = child("X", Gender::Male);
        let data = ChildMergeData {
            source_children: vec![a.clone(), c.clone()],
            target_children: vec![x.clone()],
            suggested_pairs: vec![pair(&a, &x, 0.4), pair(&c, &x, 0.7)],
        };

        let reconciliation = ChildReconciliation::new(&data);
        assert_eq!(reconciliation.source()[0].child.id, c.id);
        assert_eq!(reconciliation.source()[0].paired_with_id, Some(x.id));
        assert!(!reconciliation.source()[1].should_merge);

        let plan = reconciliation.plan();
        assert_eq!(plan.merges.len(), 1);
        assert_eq!(plan.separate_ids, vec![a.id]);
    }

    #[test]
    fn unsuggested_children_start_unmerged() {
        let a = child("A", Gender::Male);
        let x = child("X", Gender::Male);
        let data = ChildMergeData {
            source_children: vec![a.clone()],
            target_children: vec![x.clone()],
            suggested_pairs: Vec::new(),
        };

        let reconciliation = ChildReconciliation::new(&data);
        assert!(!reconciliation.source()[0].should_merge);
        assert!(reconciliation.plan().merges.is_empty());
        assert_eq!(reconciliation.plan().separate_ids, vec![a.id, x.id]);
    }

    #[test]
    fn toggling_on_pairs_with_same_index_counterpart() {
        let a = child("A", Gender::Male);
        let x = child("X", Gender::Male);
        let data = ChildMergeData {
            source_children: vec![a.clone()],
            target_children: vec![x.clone()],
            suggested_pairs: Vec::new(),
        };
        let mut reconciliation = ChildReconciliation::new(&data);

        assert!(reconciliation.toggle(Side::Source, a.id));
        assert_eq!(reconciliation.source()[0].paired_with_id, Some(x.id));
        assert_eq!(reconciliation.target()[0].paired_with_id, Some(a.id));
        assert!(reconciliation.target()[0].should_merge);

        assert!(reconciliation.toggle(Side::Target, x.id));
        assert!(!reconciliation.source()[0].should_merge);
        assert_eq!(reconciliation.source()[0].paired_with_id, None);
        assert!(!reconciliation.toggle(Side::Target, a.id));
    }

    #[test]
    fn toggling_on_against_other_gender_leaves_child_unpaired() {
        let a = child("A", Gender::Male);
        let x = child("X", Gender::Female);
        let data = ChildMergeData {
            source_children: vec![a.clone()],
            target_children: vec![x.clone()],
            suggested_pairs: Vec::new(),
        };
        let mut reconciliation = ChildReconciliation::new(&data);

        assert!(reconciliation.toggle(Side::Source, a.id));
        assert!(reconciliation.source()[0].should_merge);
        assert_eq!(reconciliation.source()[0].paired_with_id, None);
        assert!(!reconciliation.target()[0].should_merge);
        assert!(reconciliation.plan().merges.is_empty());
    }

    #[test]
    fn same_gender_move_re_pairs_by_index() {
        let a = child("A", Gender::Male);
        let c = child("C", Gender::Male);
        let x = child("X", Gender::Male);
        let z = child("Z", Gender::Male);
        let data = ChildMergeData {
            source_children: vec![a.clone(), c.clone()],
            target_children: vec![x.clone(), z.clone()],
            suggested_pairs: vec![pair(&a, &x, 0.9), pair(&c, &z, 0.8)],
        };
        let mut reconciliation = ChildReconciliation::new(&data);

        assert!(reconciliation.move_child(Side::Target, 1, 0));
        assert_eq!(reconciliation.source()[0].paired_with_id, Some(z.id));
        assert_eq!(reconciliation.target()[1].paired_with_id, Some(c.id));
        assert_eq!(
            reconciliation.plan().merges,
            vec![
                MergeInstruction {
                    source_id: a.id,
                    target_id: z.id
                },
                MergeInstruction {
                    source_id: c.id,
                    target_id: x.id
                },
            ]
        );
    }

    #[test]
    fn out_of_range_move_is_rejected() {
        let a = child("A", Gender::Male);
        let data = ChildMergeData {
            source_children: vec![a],
            target_children: Vec::new(),
            suggested_pairs: Vec::new(),
        };
        let mut reconciliation = ChildReconciliation::new(&data);
        let before = reconciliation.clone();

        assert!(!reconciliation.move_child(Side::Source, 0, 3));
        assert!(!reconciliation.move_child(Side::Target, 0, 0));
        assert_eq!(reconciliation, before);
    }
}
