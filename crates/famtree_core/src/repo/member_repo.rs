//! Member row store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist one row per tree node in `family_members`.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - The anchor relation is stored as structured columns
//!   (`relation_kind`, `relation_ref_id`, `sibling_index`), never as text
//!   with embedded coordinates.
//! - Position writes touch only `position_x`/`position_y`.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::model::member::{Gender, MemberId, Position, UserId};
use crate::model::relation::{RelationKind, RelationTag};
use crate::repo::{ensure_connection_ready, parse_bool, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const MEMBER_SELECT_SQL: &str = "SELECT
    id,
    owner_id,
    member_name,
    relation_kind,
    relation_ref_id,
    sibling_index,
    position_x,
    position_y,
    avatar_url,
    gender,
    linked_user_id,
    is_placeholder,
    created_at,
    updated_at
FROM family_members";

const MEMBER_COLUMNS: &[&str] = &[
    "id",
    "owner_id",
    "member_name",
    "relation_kind",
    "relation_ref_id",
    "sibling_index",
    "position_x",
    "position_y",
    "avatar_url",
    "gender",
    "linked_user_id",
    "is_placeholder",
    "created_at",
    "updated_at",
];

/// Persisted shape of one tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberRow {
    pub id: MemberId,
    pub owner_id: UserId,
    pub member_name: String,
    pub relation: RelationTag,
    pub position: Option<Position>,
    pub avatar_url: Option<String>,
    pub gender: Option<Gender>,
    pub linked_user_id: Option<UserId>,
    pub is_placeholder: bool,
    /// Epoch ms, assigned by the store.
    pub created_at: i64,
    /// Epoch ms, assigned by the store.
    pub updated_at: i64,
}

/// Partial row update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemberUpdate {
    pub member_name: Option<String>,
    pub avatar_url: Option<String>,
    pub relation: Option<RelationTag>,
    pub linked_user_id: Option<UserId>,
    pub is_placeholder: Option<bool>,
}

impl MemberUpdate {
    pub fn relation(relation: RelationTag) -> Self {
        Self {
            relation: Some(relation),
            ..Self::default()
        }
    }

    pub fn link(user_id: UserId) -> Self {
        Self {
            linked_user_id: Some(user_id),
            is_placeholder: Some(false),
            ..Self::default()
        }
    }
}

/// Row store for tree nodes.
pub trait MemberRepository {
    /// Lists every row owned by `owner_id`.
    fn select_by_owner(&self, owner_id: UserId) -> RepoResult<Vec<MemberRow>>;
    /// Loads one row by id.
    fn get_member(&self, id: MemberId) -> RepoResult<Option<MemberRow>>;
    /// Inserts one row. Row timestamps are ignored; the store assigns them.
    fn insert(&self, row: &MemberRow) -> RepoResult<()>;
    /// Applies a partial update.
    fn update(&self, id: MemberId, update: &MemberUpdate) -> RepoResult<()>;
    /// Rewrites only the position of one row.
    fn update_position(&self, id: MemberId, position: Position) -> RepoResult<()>;
    /// Deletes one row.
    fn delete(&self, id: MemberId) -> RepoResult<()>;
}

impl<R: MemberRepository + ?Sized> MemberRepository for &R {
    fn select_by_owner(&self, owner_id: UserId) -> RepoResult<Vec<MemberRow>> {
        (**self).select_by_owner(owner_id)
    }

    fn get_member(&self, id: MemberId) -> RepoResult<Option<MemberRow>> {
        (**self).get_member(id)
    }

    fn insert(&self, row: &MemberRow) -> RepoResult<()> {
        (**self).insert(row)
    }

    fn update(&self, id: MemberId, update: &MemberUpdate) -> RepoResult<()> {
        (**self).update(id, update)
    }

    fn update_position(&self, id: MemberId, position: Position) -> RepoResult<()> {
        (**self).update_position(id, position)
    }

    fn delete(&self, id: MemberId) -> RepoResult<()> {
        (**self).delete(id)
    }
}

/// SQLite-backed member row store.
pub struct SqliteMemberRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMemberRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "family_members", MEMBER_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl MemberRepository for SqliteMemberRepository<'_> {
    fn select_by_owner(&self, owner_id: UserId) -> RepoResult<Vec<MemberRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MEMBER_SELECT_SQL}
             WHERE owner_id = ?1
             ORDER BY created_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([owner_id.to_string()])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(parse_member_row(row)?);
        }
        Ok(members)
    }

    fn get_member(&self, id: MemberId) -> RepoResult<Option<MemberRow>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MEMBER_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_member_row(row)?));
        }
        Ok(None)
    }

    fn insert(&self, row: &MemberRow) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO family_members (
                id,
                owner_id,
                member_name,
                relation_kind,
                relation_ref_id,
                sibling_index,
                position_x,
                position_y,
                avatar_url,
                gender,
                linked_user_id,
                is_placeholder
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            params![
                row.id.to_string(),
                row.owner_id.to_string(),
                row.member_name.as_str(),
                row.relation.kind().as_str(),
                row.relation.referenced_id().map(|id| id.to_string()),
                row.relation.sibling_index(),
                row.position.map(|position| position.x),
                row.position.map(|position| position.y),
                row.avatar_url.as_deref(),
                row.gender.map(Gender::as_str),
                row.linked_user_id.map(|id| id.to_string()),
                row.is_placeholder,
            ],
        )?;
        Ok(())
    }

    fn update(&self, id: MemberId, update: &MemberUpdate) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE family_members
             SET
                member_name = COALESCE(?2, member_name),
                avatar_url = COALESCE(?3, avatar_url),
                relation_kind = COALESCE(?4, relation_kind),
                relation_ref_id = CASE WHEN ?4 IS NULL THEN relation_ref_id ELSE ?5 END,
                sibling_index = CASE WHEN ?4 IS NULL THEN sibling_index ELSE ?6 END,
                linked_user_id = COALESCE(?7, linked_user_id),
                is_placeholder = COALESCE(?8, is_placeholder),
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                id.to_string(),
                update.member_name.as_deref(),
                update.avatar_url.as_deref(),
                update.relation.map(|relation| relation.kind().as_str()),
                update
                    .relation
                    .and_then(|relation| relation.referenced_id())
                    .map(|id| id.to_string()),
                update.relation.and_then(|relation| relation.sibling_index()),
                update.linked_user_id.map(|id| id.to_string()),
                update.is_placeholder,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::MemberNotFound(id));
        }
        Ok(())
    }

    fn update_position(&self, id: MemberId, position: Position) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE family_members
             SET
                position_x = ?2,
                position_y = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), position.x, position.y],
        )?;
        if changed == 0 {
            return Err(RepoError::MemberNotFound(id));
        }
        Ok(())
    }

    fn delete(&self, id: MemberId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM family_members WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::MemberNotFound(id));
        }
        Ok(())
    }
}

fn parse_member_row(row: &Row<'_>) -> RepoResult<MemberRow> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "family_members.id")?;
    let owner_text: String = row.get("owner_id")?;
    let owner_id = parse_uuid(&owner_text, "family_members.owner_id")?;

    let kind_text: String = row.get("relation_kind")?;
    let kind = RelationKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid relation kind `{kind_text}` in family_members.relation_kind"
        ))
    })?;
    let referenced_id = row
        .get::<_, Option<String>>("relation_ref_id")?
        .map(|value| parse_uuid(&value, "family_members.relation_ref_id"))
        .transpose()?;
    let sibling_index = row
        .get::<_, Option<i64>>("sibling_index")?
        .map(|value| {
            u32::try_from(value).map_err(|_| {
                RepoError::InvalidData(format!(
                    "invalid sibling index `{value}` in family_members.sibling_index"
                ))
            })
        })
        .transpose()?;
    let relation = RelationTag::from_parts(kind, referenced_id, sibling_index).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "relation kind `{kind_text}` of member {id} has no relation_ref_id"
        ))
    })?;

    let position = match (
        row.get::<_, Option<f64>>("position_x")?,
        row.get::<_, Option<f64>>("position_y")?,
    ) {
        (Some(x), Some(y)) => Some(Position::new(x, y)),
        (None, None) => None,
        _ => {
            return Err(RepoError::InvalidData(format!(
                "member {id} has a partial position"
            )));
        }
    };

    let gender = match row.get::<_, Option<String>>("gender")? {
        Some(value) => Some(Gender::parse(&value).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid gender `{value}` in family_members.gender"))
        })?),
        None => None,
    };

    let linked_user_id = row
        .get::<_, Option<String>>("linked_user_id")?
        .map(|value| parse_uuid(&value, "family_members.linked_user_id"))
        .transpose()?;

    Ok(MemberRow {
        id,
        owner_id,
        member_name: row.get("member_name")?,
        relation,
        position,
        avatar_url: row.get("avatar_url")?,
        gender,
        linked_user_id,
        is_placeholder: parse_bool(row.get("is_placeholder")?, "family_members.is_placeholder")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
