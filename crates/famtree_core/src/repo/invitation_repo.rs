//! Invitation repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Rows are never deleted; status changes keep history.
//! - Transition legality is enforced by the service, not here.

use crate::model::invitation::{FamilyInvitation, InvitationId, InvitationStatus, NewInvitation};
use crate::model::member::{MemberId, UserId};
use crate::repo::{ensure_connection_ready, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const INVITATION_SELECT_SQL: &str = "SELECT
    id,
    sender_id,
    receiver_id,
    member_id,
    relation_type,
    status,
    created_at,
    updated_at
FROM family_invitations";

const INVITATION_COLUMNS: &[&str] = &[
    "id",
    "sender_id",
    "receiver_id",
    "member_id",
    "relation_type",
    "status",
    "created_at",
    "updated_at",
];

/// Row store for invitations.
pub trait InvitationRepository {
    /// Creates a pending invitation and returns the stored row.
    fn create(&self, invitation: &NewInvitation) -> RepoResult<FamilyInvitation>;
    /// Loads one invitation by id.
    fn get(&self, id: InvitationId) -> RepoResult<Option<FamilyInvitation>>;
    /// Lists invitations sent or received by `user_id`, newest first.
    fn list_by_participant(&self, user_id: UserId) -> RepoResult<Vec<FamilyInvitation>>;
    /// Finds a pending invitation for the same member and receiver.
    fn find_pending(
        &self,
        member_id: MemberId,
        receiver_id: UserId,
    ) -> RepoResult<Option<FamilyInvitation>>;
    /// Overwrites status and bumps `updated_at`.
    fn update_status(&self, id: InvitationId, status: InvitationStatus) -> RepoResult<()>;
}

impl<R: InvitationRepository + ?Sized> InvitationRepository for &R {
    fn create(&self, invitation: &NewInvitation) -> RepoResult<FamilyInvitation> {
        (**self).create(invitation)
    }

    fn get(&self, id: InvitationId) -> RepoResult<Option<FamilyInvitation>> {
        (**self).get(id)
    }

    fn list_by_participant(&self, user_id: UserId) -> RepoResult<Vec<FamilyInvitation>> {
        (**self).list_by_participant(user_id)
    }

    fn find_pending(
        &self,
        member_id: MemberId,
        receiver_id: UserId,
    ) -> RepoResult<Option<FamilyInvitation>> {
        (**self).find_pending(member_id, receiver_id)
    }

    fn update_status(&self, id: InvitationId, status: InvitationStatus) -> RepoResult<()> {
        (**self).update_status(id, status)
    }
}

/// SQLite-backed invitation store.
pub struct SqliteInvitationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteInvitationRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "family_invitations", INVITATION_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl InvitationRepository for SqliteInvitationRepository<'_> {
    fn create(&self, invitation: &NewInvitation) -> RepoResult<FamilyInvitation> {
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO family_invitations (
                id,
                sender_id,
                receiver_id,
                member_id,
                relation_type,
                status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                id.to_string(),
                invitation.sender_id.to_string(),
                invitation.receiver_id.to_string(),
                invitation.member_id.to_string(),
                invitation.relation_type.as_str(),
                InvitationStatus::Pending.as_str(),
            ],
        )?;
        self.get(id)?.ok_or(RepoError::InvitationNotFound(id))
    }

    fn get(&self, id: InvitationId) -> RepoResult<Option<FamilyInvitation>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{INVITATION_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_invitation_row(row)?));
        }
        Ok(None)
    }

    fn list_by_participant(&self, user_id: UserId) -> RepoResult<Vec<FamilyInvitation>> {
        let mut stmt = self.conn.prepare(&format!(
            "{INVITATION_SELECT_SQL}
             WHERE sender_id = ?1 OR receiver_id = ?1
             ORDER BY created_at DESC, id ASC;"
        ))?;
        let mut rows = stmt.query([user_id.to_string()])?;
        let mut invitations = Vec::new();
        while let Some(row) = rows.next()? {
            invitations.push(parse_invitation_row(row)?);
        }
        Ok(invitations)
    }

    fn find_pending(
        &self,
        member_id: MemberId,
        receiver_id: UserId,
    ) -> RepoResult<Option<FamilyInvitation>> {
        let mut stmt = self.conn.prepare(&format!(
            "{INVITATION_SELECT_SQL}
             WHERE member_id = ?1
               AND receiver_id = ?2
               AND status = 'pending'
             LIMIT 1;"
        ))?;
        let mut rows = stmt.query([member_id.to_string(), receiver_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_invitation_row(row)?));
        }
        Ok(None)
    }

    fn update_status(&self, id: InvitationId, status: InvitationStatus) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE family_invitations
             SET
                status = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), status.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::InvitationNotFound(id));
        }
        Ok(())
    }
}

fn parse_invitation_row(row: &Row<'_>) -> RepoResult<FamilyInvitation> {
    let id: String = row.get("id")?;
    let sender_id: String = row.get("sender_id")?;
    let receiver_id: String = row.get("receiver_id")?;
    let member_id: String = row.get("member_id")?;
    let status: String = row.get("status")?;

    Ok(FamilyInvitation {
        id: parse_uuid(&id, "family_invitations.id")?,
        sender_id: parse_uuid(&sender_id, "family_invitations.sender_id")?,
        receiver_id: parse_uuid(&receiver_id, "family_invitations.receiver_id")?,
        member_id: parse_uuid(&member_id, "family_invitations.member_id")?,
        relation_type: row.get("relation_type")?,
        status: InvitationStatus::parse(&status).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid status `{status}` in family_invitations.status"
            ))
        })?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
