//! Incremental placement of newly created nodes.
//!
//! Only new nodes are placed; existing coordinates are never recomputed.
//! Screen y grows downwards, so ancestors sit at smaller y.

use crate::model::member::{Gender, Position};

/// Baseline coordinates of the first node of a tree.
pub const BASELINE: Position = Position { x: 400.0, y: 300.0 };
/// Vertical distance between generations.
pub const GENERATION_GAP: f64 = 200.0;
/// Horizontal offset of each parent from the child's x.
pub const PARENT_SPREAD: f64 = 90.0;
/// Horizontal gap between spouses.
pub const SPOUSE_GAP: f64 = 180.0;
/// Horizontal step between consecutive siblings.
pub const SIBLING_SPACING: f64 = 180.0;

/// Positions of the root couple: `(root, root's spouse)`.
pub fn initial_couple(root_gender: Gender) -> (Position, Position) {
    (BASELINE, spouse_of(BASELINE, root_gender))
}

/// Positions of a new father and mother one generation above `child`.
pub fn parents_of(child: Position) -> (Position, Position) {
    (
        child.offset(-PARENT_SPREAD, -GENERATION_GAP),
        child.offset(PARENT_SPREAD, -GENERATION_GAP),
    )
}

/// Position of a new spouse next to `member`.
///
/// Husbands are drawn on the left, so a male member's spouse goes right and a
/// female member's spouse goes left.
pub fn spouse_of(member: Position, member_gender: Gender) -> Position {
    match member_gender {
        Gender::Male => member.offset(SPOUSE_GAP, 0.0),
        Gender::Female => member.offset(-SPOUSE_GAP, 0.0),
    }
}

/// Position of a new child below `parent` (and `co_parent` when paired).
pub fn child_of(parent: Position, co_parent: Option<Position>, sibling_index: u32) -> Position {
    let base_x = match co_parent {
        Some(other) => (parent.x + other.x) / 2.0,
        None => parent.x,
    };
    Position::new(
        base_x + f64::from(sibling_index) * SIBLING_SPACING,
        parent.y + GENERATION_GAP,
    )
}
