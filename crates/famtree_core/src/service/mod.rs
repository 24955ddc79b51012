//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate graph mutations and repository calls into use-case APIs.
//! - Keep CLI/UI layers decoupled from storage details.

pub mod invitation_service;
pub mod tree_service;
