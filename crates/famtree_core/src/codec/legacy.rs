//! Legacy string relation codec.
//!
//! Older stores keep the anchor relation and the canvas position in one text
//! column, e.g. `child_of_<parentId>_<siblingIndex>|x:410|y:100`. This module
//! converts between that text and the structured [`RelationTag`]/[`Position`]
//! pair. Tag parsing splits on `_`, so ids containing `_` are ambiguous in
//! this format; structured storage does not have that limitation.

use crate::codec::decode::DecodeIssue;
use crate::model::member::{FamilyMember, Gender, MemberId, Position, UserId};
use crate::model::relation::RelationTag;
use crate::repo::member_repo::MemberRow;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static POSITION_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\|x:(-?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?)\|y:(-?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?)$")
        .expect("valid position suffix regex")
});

const TAG_SELF: &str = "self";
const TAG_DETACHED: &str = "detached";
const PREFIX_SPOUSE: &str = "spouse_of_";
const PREFIX_FATHER: &str = "father_of_";
const PREFIX_MOTHER: &str = "mother_of_";
const PREFIX_CHILD: &str = "child_of_";

/// Relation text that could not be turned into a [`RelationTag`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnparseableRelation {
    pub raw: String,
    pub reason: &'static str,
}

impl Display for UnparseableRelation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unparseable relation `{}`: {}", self.raw, self.reason)
    }
}

impl Error for UnparseableRelation {}

/// Parsed form of one legacy relation column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegacyRelation {
    pub tag: RelationTag,
    pub position: Option<Position>,
}

/// Row shape of the legacy hosted store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyMemberRow {
    pub id: String,
    pub owner_id: String,
    pub member_name: String,
    pub relation_type: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub linked_user_id: Option<String>,
    pub is_placeholder: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Splits a legacy relation column into tag and optional position.
///
/// The position suffix is matched and stripped before the tag is parsed.
pub fn parse_relation_type(raw: &str) -> Result<LegacyRelation, UnparseableRelation> {
    let (base, position) = split_position(raw);
    let fail = |reason| UnparseableRelation {
        raw: raw.to_string(),
        reason,
    };

    let tag = if base == TAG_SELF {
        RelationTag::Root
    } else if base == TAG_DETACHED {
        RelationTag::Detached
    } else if let Some(rest) = base.strip_prefix(PREFIX_SPOUSE) {
        RelationTag::SpouseOf {
            member_id: parse_id(rest).ok_or_else(|| fail("invalid spouse id"))?,
        }
    } else if let Some(rest) = base.strip_prefix(PREFIX_FATHER) {
        RelationTag::FatherOf {
            child_id: parse_id(rest).ok_or_else(|| fail("invalid child id"))?,
        }
    } else if let Some(rest) = base.strip_prefix(PREFIX_MOTHER) {
        RelationTag::MotherOf {
            child_id: parse_id(rest).ok_or_else(|| fail("invalid child id"))?,
        }
    } else if let Some(rest) = base.strip_prefix(PREFIX_CHILD) {
        let (parent_text, sibling_index) = match rest.rsplit_once('_') {
            Some((parent_text, index_text)) => (
                parent_text,
                index_text
                    .parse::<u32>()
                    .map_err(|_| fail("invalid sibling index"))?,
            ),
            None => (rest, 0),
        };
        RelationTag::ChildOf {
            parent_id: parse_id(parent_text).ok_or_else(|| fail("invalid parent id"))?,
            sibling_index,
        }
    } else {
        return Err(fail("unknown relation prefix"));
    };

    Ok(LegacyRelation { tag, position })
}

/// Formats a tag and optional position as one legacy relation column.
pub fn format_relation_type(tag: &RelationTag, position: Option<Position>) -> String {
    let mut value = match tag {
        RelationTag::Root => TAG_SELF.to_string(),
        RelationTag::Detached => TAG_DETACHED.to_string(),
        RelationTag::SpouseOf { member_id } => format!("{PREFIX_SPOUSE}{member_id}"),
        RelationTag::FatherOf { child_id } => format!("{PREFIX_FATHER}{child_id}"),
        RelationTag::MotherOf { child_id } => format!("{PREFIX_MOTHER}{child_id}"),
        RelationTag::ChildOf {
            parent_id,
            sibling_index,
        } => format!("{PREFIX_CHILD}{parent_id}_{sibling_index}"),
    };
    if let Some(position) = position {
        value.push_str(&position_suffix(position));
    }
    value
}

/// Replaces only the position suffix of an existing relation column.
///
/// The tag part is carried over byte-for-byte, even when it is unparseable.
pub fn replace_position(existing: &str, position: Position) -> String {
    let (base, _) = split_position(existing);
    format!("{base}{}", position_suffix(position))
}

/// Converts legacy rows into structured rows.
///
/// Rows with an invalid id are skipped; rows with an unreadable relation are
/// kept as [`RelationTag::Detached`]. Both cases are reported.
pub fn rows_from_legacy(rows: &[LegacyMemberRow]) -> (Vec<MemberRow>, Vec<DecodeIssue>) {
    let mut converted = Vec::with_capacity(rows.len());
    let mut issues = Vec::new();

    for row in rows {
        let (Some(id), Some(owner_id)) = (parse_id(&row.id), parse_id(&row.owner_id)) else {
            issues.push(DecodeIssue::InvalidRowId {
                raw: row.id.clone(),
            });
            continue;
        };

        let (relation, position) = match parse_relation_type(&row.relation_type) {
            Ok(parsed) => (parsed.tag, parsed.position),
            Err(err) => {
                let (_, position) = split_position(&row.relation_type);
                issues.push(DecodeIssue::UnparseableRelation {
                    member_id: id,
                    error: err,
                });
                (RelationTag::Detached, position)
            }
        };

        converted.push(MemberRow {
            id,
            owner_id,
            member_name: row.member_name.clone(),
            relation,
            position,
            avatar_url: row.avatar_url.clone(),
            gender: row.gender.as_deref().and_then(Gender::parse),
            linked_user_id: row.linked_user_id.as_deref().and_then(parse_id),
            is_placeholder: row.is_placeholder,
            created_at: 0,
            updated_at: 0,
        });
    }

    (converted, issues)
}

/// Converts one member into the legacy row shape.
pub fn legacy_row_from_member(member: &FamilyMember) -> LegacyMemberRow {
    LegacyMemberRow {
        id: member.id.to_string(),
        owner_id: member.owner_id.to_string(),
        member_name: member.name.clone(),
        relation_type: format_relation_type(&member.relation, member.position),
        avatar_url: member.avatar_url.clone(),
        gender: Some(member.gender.as_str().to_string()),
        linked_user_id: member.linked_user_id.map(|id: UserId| id.to_string()),
        is_placeholder: member.is_placeholder,
        created_at: None,
        updated_at: None,
    }
}

fn split_position(raw: &str) -> (&str, Option<Position>) {
    let Some(captures) = POSITION_SUFFIX_RE.captures(raw) else {
        return (raw, None);
    };
    let (Some(whole), Some(x), Some(y)) = (captures.get(0), captures.get(1), captures.get(2))
    else {
        return (raw, None);
    };
    match (x.as_str().parse::<f64>(), y.as_str().parse::<f64>()) {
        (Ok(x), Ok(y)) => (&raw[..whole.start()], Some(Position::new(x, y))),
        _ => (raw, None),
    }
}

fn position_suffix(position: Position) -> String {
    format!("|x:{}|y:{}", position.x, position.y)
}

fn parse_id(value: &str) -> Option<MemberId> {
    Uuid::parse_str(value).ok()
}
