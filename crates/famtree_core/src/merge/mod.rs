//! Cross-tree merge resolver.
//!
//! # Responsibility
//! - Consume externally classified merge candidates and child suggestions.
//! - Drive auto-merge of ancestors, then interactive child reconciliation.
//!
//! # Invariants
//! - Merges are applied sequentially and awaited in input order.
//! - "Separate" children are reported, never acted upon.

pub mod apply;
pub mod children;
pub mod input;
pub mod session;
