//! Core domain logic for famtree.
//! Family tree graph, persistence, invitations and the cross-tree merge resolver.

pub mod codec;
pub mod db;
pub mod graph;
pub mod logging;
pub mod merge;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;

pub use codec::decode::{decode_legacy_rows, decode_rows, DecodeIssue, DecodedTree};
pub use codec::encode::{encode_graph, encode_member};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use graph::store::{FamilyGraph, InvariantViolation, Removal};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use merge::apply::{GraphMergeApplier, MergeApplier, MergeApplyError, MergeRecord, MergeReport};
pub use merge::children::{ChildMergeItem, ChildMergePlan, ChildReconciliation, Side};
pub use merge::input::{
    ChildCandidate, ChildMergeData, MergeCandidate, MergeInstruction, MergeRelationship,
    SuggestedPair,
};
pub use merge::session::{MergePhase, MergeSession, MergeSessionError};
pub use model::invitation::{FamilyInvitation, InvitationId, InvitationStatus, NewInvitation};
pub use model::member::{FamilyMember, Gender, MemberDraft, MemberId, MemberPatch, Position, UserId};
pub use model::relation::{RelationKind, RelationTag};
pub use repo::invitation_repo::{InvitationRepository, SqliteInvitationRepository};
pub use repo::member_repo::{MemberRepository, MemberRow, MemberUpdate, SqliteMemberRepository};
pub use repo::{RepoError, RepoResult};
pub use service::invitation_service::{InvitationError, InvitationService};
pub use service::tree_service::{ReloadOutcome, TreeService, TreeServiceConfig, TreeServiceError};
pub use sync::change_feed::{ChangeEvent, ChangeFeed, ChangeKind, NotifyingMemberRepository, Subscription};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
