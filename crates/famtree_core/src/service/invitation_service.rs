//! Invitation and account-linking use-case service.
//!
//! # Responsibility
//! - Offer placeholder members to real accounts.
//! - Apply `pending -> accepted` (link) and `pending -> rejected` transitions.
//!
//! # Invariants
//! - Only the tree owner may invite; only the receiver may accept or reject.
//! - A second pending invitation for the same member and receiver is refused.
//!   The check and the insert are not atomic; invitation creation is assumed
//!   to be human-paced.
//! - Linking is one-way; no API turns a linked member back into a placeholder.
//! - The member is linked before the invitation is marked accepted, so a
//!   failed accept leaves the invitation pending and retryable.

use crate::model::invitation::{FamilyInvitation, InvitationId, InvitationStatus, NewInvitation};
use crate::model::member::{MemberId, UserId};
use crate::repo::invitation_repo::InvitationRepository;
use crate::repo::member_repo::{MemberRepository, MemberUpdate};
use crate::repo::RepoError;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from invitation workflow operations.
#[derive(Debug)]
pub enum InvitationError {
    /// Relation label is blank after trim.
    InvalidRelationType,
    /// Sender and receiver are the same account.
    SelfInvitation(UserId),
    /// Offered member does not exist.
    MemberNotFound(MemberId),
    /// Sender does not own the tree containing the member.
    NotTreeOwner { member_id: MemberId, user_id: UserId },
    /// Member is already linked to an account.
    MemberAlreadyLinked(MemberId),
    /// A pending invitation for the same member and receiver exists.
    DuplicatePending(InvitationId),
    /// Invitation does not exist.
    InvitationNotFound(InvitationId),
    /// Acting user is not the invitation receiver.
    NotReceiver {
        invitation_id: InvitationId,
        user_id: UserId,
    },
    /// Status change is not allowed from the current status.
    InvalidTransition {
        from: InvitationStatus,
        to: InvitationStatus,
    },
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for InvitationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRelationType => write!(f, "relation type must not be blank"),
            Self::SelfInvitation(id) => write!(f, "user {id} cannot invite themselves"),
            Self::MemberNotFound(id) => write!(f, "family member not found: {id}"),
            Self::NotTreeOwner { member_id, user_id } => {
                write!(f, "user {user_id} does not own the tree of member {member_id}")
            }
            Self::MemberAlreadyLinked(id) => write!(f, "family member already linked: {id}"),
            Self::DuplicatePending(id) => write!(f, "pending invitation already exists: {id}"),
            Self::InvitationNotFound(id) => write!(f, "invitation not found: {id}"),
            Self::NotReceiver {
                invitation_id,
                user_id,
            } => write!(
                f,
                "user {user_id} is not the receiver of invitation {invitation_id}"
            ),
            Self::InvalidTransition { from, to } => write!(
                f,
                "invitation cannot move from {} to {}",
                from.as_str(),
                to.as_str()
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for InvitationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for InvitationError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::MemberNotFound(id) => Self::MemberNotFound(id),
            RepoError::InvitationNotFound(id) => Self::InvitationNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Invitation workflow facade over invitation and member stores.
pub struct InvitationService<I: InvitationRepository, M: MemberRepository> {
    invitations: I,
    members: M,
}

impl<I: InvitationRepository, M: MemberRepository> InvitationService<I, M> {
    pub fn new(invitations: I, members: M) -> Self {
        Self {
            invitations,
            members,
        }
    }

    /// Offers `member_id` to `receiver_id` on behalf of the tree owner.
    pub fn send(&self, request: NewInvitation) -> Result<FamilyInvitation, InvitationError> {
        let relation_type = request.relation_type.trim().to_string();
        if relation_type.is_empty() {
            return Err(InvitationError::InvalidRelationType);
        }
        if request.sender_id == request.receiver_id {
            return Err(InvitationError::SelfInvitation(request.sender_id));
        }

        let member = self
            .members
            .get_member(request.member_id)?
            .ok_or(InvitationError::MemberNotFound(request.member_id))?;
        if member.owner_id != request.sender_id {
            return Err(InvitationError::NotTreeOwner {
                member_id: member.id,
                user_id: request.sender_id,
            });
        }
        if !member.is_placeholder || member.linked_user_id.is_some() {
            return Err(InvitationError::MemberAlreadyLinked(member.id));
        }

        if let Some(existing) = self
            .invitations
            .find_pending(request.member_id, request.receiver_id)?
        {
            warn!(
                "event=invitation_send module=service status=skipped invitation_id={} member_id={}",
                existing.id, request.member_id
            );
            return Err(InvitationError::DuplicatePending(existing.id));
        }

        let invitation = self.invitations.create(&NewInvitation {
            relation_type,
            ..request
        })?;
        info!(
            "event=invitation_send module=service status=ok invitation_id={} member_id={} sender_id={} receiver_id={}",
            invitation.id, invitation.member_id, invitation.sender_id, invitation.receiver_id
        );
        Ok(invitation)
    }

    /// Accepts an invitation and links its member to the receiver.
    pub fn accept(
        &self,
        invitation_id: InvitationId,
        acting_user: UserId,
    ) -> Result<FamilyInvitation, InvitationError> {
        let invitation =
            self.pending_for_receiver(invitation_id, acting_user, InvitationStatus::Accepted)?;

        let member = self
            .members
            .get_member(invitation.member_id)?
            .ok_or(InvitationError::MemberNotFound(invitation.member_id))?;
        // A retry after a failed status write finds the member already linked
        // to this receiver; only the status is left to write.
        let linked_to_receiver = member.linked_user_id == Some(invitation.receiver_id);
        if !linked_to_receiver && (!member.is_placeholder || member.linked_user_id.is_some()) {
            return Err(InvitationError::MemberAlreadyLinked(member.id));
        }

        if !linked_to_receiver {
            if let Err(err) = self
                .members
                .update(invitation.member_id, &MemberUpdate::link(invitation.receiver_id))
            {
                error!(
                    "event=invitation_accept module=service status=error step=link invitation_id={invitation_id} member_id={} error={err}",
                    invitation.member_id
                );
                return Err(err.into());
            }
        }
        if let Err(err) = self
            .invitations
            .update_status(invitation_id, InvitationStatus::Accepted)
        {
            error!(
                "event=invitation_accept module=service status=error step=status invitation_id={invitation_id} error={err}"
            );
            return Err(err.into());
        }

        info!(
            "event=invitation_accept module=service status=ok invitation_id={invitation_id} member_id={} receiver_id={}",
            invitation.member_id, invitation.receiver_id
        );
        self.reread(invitation_id)
    }

    /// Rejects an invitation. The member is left unchanged.
    pub fn reject(
        &self,
        invitation_id: InvitationId,
        acting_user: UserId,
    ) -> Result<FamilyInvitation, InvitationError> {
        self.pending_for_receiver(invitation_id, acting_user, InvitationStatus::Rejected)?;
        self.invitations
            .update_status(invitation_id, InvitationStatus::Rejected)?;
        info!(
            "event=invitation_reject module=service status=ok invitation_id={invitation_id}"
        );
        self.reread(invitation_id)
    }

    /// Lists invitations sent or received by `user_id`.
    pub fn list(&self, user_id: UserId) -> Result<Vec<FamilyInvitation>, InvitationError> {
        Ok(self.invitations.list_by_participant(user_id)?)
    }

    /// Lists pending invitations addressed to `user_id`.
    pub fn list_pending_for(
        &self,
        user_id: UserId,
    ) -> Result<Vec<FamilyInvitation>, InvitationError> {
        Ok(self
            .invitations
            .list_by_participant(user_id)?
            .into_iter()
            .filter(|invitation| {
                invitation.receiver_id == user_id
                    && invitation.status == InvitationStatus::Pending
            })
            .collect())
    }

    fn pending_for_receiver(
        &self,
        invitation_id: InvitationId,
        acting_user: UserId,
        next: InvitationStatus,
    ) -> Result<FamilyInvitation, InvitationError> {
        let invitation = self
            .invitations
            .get(invitation_id)?
            .ok_or(InvitationError::InvitationNotFound(invitation_id))?;
        if invitation.receiver_id != acting_user {
            return Err(InvitationError::NotReceiver {
                invitation_id,
                user_id: acting_user,
            });
        }
        if !invitation.status.can_transition_to(next) {
            return Err(InvitationError::InvalidTransition {
                from: invitation.status,
                to: next,
            });
        }
        Ok(invitation)
    }

    fn reread(&self, invitation_id: InvitationId) -> Result<FamilyInvitation, InvitationError> {
        self.invitations
            .get(invitation_id)?
            .ok_or(InvitationError::InvitationNotFound(invitation_id))
    }
}
