//! Conversion between persisted rows and the in-memory graph.
//!
//! # Responsibility
//! - Decode rows into a graph in two passes (nodes, then edges).
//! - Encode graph members back into rows.
//! - Read and write the legacy single-string relation format.
//!
//! # Invariants
//! - Decoding never fails as a whole; problems are reported per row.

pub mod decode;
pub mod encode;
pub mod legacy;
