//! Graph-to-row encoding.

use crate::graph::store::FamilyGraph;
use crate::model::member::FamilyMember;
use crate::repo::member_repo::MemberRow;

/// Encodes one member as a structured row.
///
/// Timestamps are left at zero; the store assigns them on write.
pub fn encode_member(member: &FamilyMember) -> MemberRow {
    MemberRow {
        id: member.id,
        owner_id: member.owner_id,
        member_name: member.name.clone(),
        relation: member.relation,
        position: member.position,
        avatar_url: member.avatar_url.clone(),
        gender: Some(member.gender),
        linked_user_id: member.linked_user_id,
        is_placeholder: member.is_placeholder,
        created_at: 0,
        updated_at: 0,
    }
}

/// Encodes every member of a graph, in id order.
pub fn encode_graph(graph: &FamilyGraph) -> Vec<MemberRow> {
    graph.members().map(encode_member).collect()
}
