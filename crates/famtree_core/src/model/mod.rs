//! Family tree domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by graph, merge and invitation logic.
//!
//! # Invariants
//! - Every node is identified by a stable `MemberId`.
//! - Relationship edges are derived from ids only; positions are advisory.

pub mod invitation;
pub mod member;
pub mod relation;
