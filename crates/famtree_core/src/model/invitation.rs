//! Invitation domain model.
//!
//! # Invariants
//! - Status moves only `pending -> accepted` or `pending -> rejected`.
//! - Invitations are never deleted; history is retained.

use crate::model::member::{MemberId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type InvitationId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl InvitationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Returns whether `next` is a legal transition from `self`.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Accepted) | (Self::Pending, Self::Rejected)
        )
    }
}

/// Offer of a placeholder node to a real account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyInvitation {
    pub id: InvitationId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    /// Placeholder being offered.
    pub member_id: MemberId,
    /// Free-form relation label shown to the receiver (e.g. `father`).
    pub relation_type: String,
    pub status: InvitationStatus,
    /// Epoch ms.
    pub created_at: i64,
    /// Epoch ms.
    pub updated_at: i64,
}

/// Fields supplied when creating an invitation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvitation {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub member_id: MemberId,
    pub relation_type: String,
}

#[cfg(test)]
mod tests {
    use super::InvitationStatus;

    #[test]
    fn only_pending_invitations_can_move() {
        use InvitationStatus::{Accepted, Pending, Rejected};
        assert!(Pending.can_transition_to(Accepted));
        assert!(Pending.can_transition_to(Rejected));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Accepted.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Accepted));
        assert!(!Accepted.can_transition_to(Pending));
    }
}
