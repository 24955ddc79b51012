//! In-memory family graph and node placement.
//!
//! # Responsibility
//! - Hold one tree as an id-keyed member map with spouse/parent/child edges.
//! - Derive coordinates for newly created nodes.
//!
//! # Invariants
//! - Spouse symmetry and parent/child duality hold after every mutation.
//! - Coordinates never influence edges.

pub mod layout;
pub mod store;
