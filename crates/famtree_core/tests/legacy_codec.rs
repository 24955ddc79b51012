use famtree_core::codec::legacy::{
    legacy_row_from_member, parse_relation_type, replace_position, LegacyMemberRow,
};
use famtree_core::{
    decode_legacy_rows, DecodeIssue, FamilyGraph, Gender, MemberDraft, Position, RelationTag,
};
use uuid::Uuid;

const OWNER: &str = "7d1c1f4e-8f0b-4a5e-9a39-0f3c2b6d1a10";
const ME: &str = "0b5c3a52-1111-4d2e-8a55-3c1f6b7e9a01";
const WIFE: &str = "0b5c3a52-2222-4d2e-8a55-3c1f6b7e9a02";
const FATHER: &str = "0b5c3a52-3333-4d2e-8a55-3c1f6b7e9a03";
const MOTHER: &str = "0b5c3a52-4444-4d2e-8a55-3c1f6b7e9a04";
const SON: &str = "0b5c3a52-5555-4d2e-8a55-3c1f6b7e9a05";
const DAUGHTER: &str = "0b5c3a52-6666-4d2e-8a55-3c1f6b7e9a06";

fn fixture_rows() -> Vec<LegacyMemberRow> {
    // Children and parents are listed before the members they reference.
    let json = format!(
        r#"[
  {{"id": "{DAUGHTER}", "owner_id": "{OWNER}", "member_name": "Daughter",
    "relation_type": "child_of_{ME}_1|x:670|y:500", "gender": "female", "is_placeholder": true}},
  {{"id": "{SON}", "owner_id": "{OWNER}", "member_name": "Son",
    "relation_type": "child_of_{ME}_0|x:490|y:500", "gender": "male", "is_placeholder": true}},
  {{"id": "{MOTHER}", "owner_id": "{OWNER}", "member_name": "Mother",
    "relation_type": "mother_of_{ME}|x:490|y:100", "is_placeholder": true}},
  {{"id": "{FATHER}", "owner_id": "{OWNER}", "member_name": "Father",
    "relation_type": "father_of_{ME}|x:310|y:100", "is_placeholder": true}},
  {{"id": "{WIFE}", "owner_id": "{OWNER}", "member_name": "Wife",
    "relation_type": "spouse_of_{ME}|x:580.5|y:300", "gender": "female", "is_placeholder": true,
    "avatar_url": "https://img/wife.png"}},
  {{"id": "{ME}", "owner_id": "{OWNER}", "member_name": "Me",
    "relation_type": "self|x:400|y:300", "gender": "male", "is_placeholder": false,
    "linked_user_id": "{OWNER}", "created_at": "2024-03-01T10:00:00Z"}}
]"#
    );
    serde_json::from_str(&json).expect("fixture parses")
}

fn id(value: &str) -> Uuid {
    Uuid::parse_str(value).unwrap()
}

#[test]
fn out_of_order_legacy_rows_are_fully_wired() {
    let decoded = decode_legacy_rows(id(OWNER), &fixture_rows());
    assert!(decoded.issues.is_empty(), "{:?}", decoded.issues);
    let graph = decoded.graph;

    let me = graph.get(id(ME)).unwrap();
    assert_eq!(me.spouse_id, Some(id(WIFE)));
    assert_eq!(me.parent_ids, vec![id(FATHER), id(MOTHER)]);
    assert_eq!(me.children_ids, vec![id(SON), id(DAUGHTER)]);
    assert_eq!(me.linked_user_id, Some(id(OWNER)));
    assert!(!me.is_placeholder);

    let daughter = graph.get(id(DAUGHTER)).unwrap();
    assert_eq!(daughter.parent_ids, vec![id(ME), id(WIFE)]);

    let father = graph.get(id(FATHER)).unwrap();
    assert_eq!(father.spouse_id, Some(id(MOTHER)));
    assert_eq!(father.gender, Gender::Male);
    assert_eq!(graph.get(id(MOTHER)).unwrap().gender, Gender::Female);

    assert_eq!(
        graph.get(id(WIFE)).unwrap().position,
        Some(Position::new(580.5, 300.0))
    );
    assert_eq!(graph.root().map(|root| root.id), Some(id(ME)));
    assert!(graph.check_invariants().is_ok());
}

#[test]
fn row_order_does_not_change_the_decoded_graph() {
    let rows = fixture_rows();
    let mut reversed = rows.clone();
    reversed.reverse();

    let forward = decode_legacy_rows(id(OWNER), &rows);
    let backward = decode_legacy_rows(id(OWNER), &reversed);
    assert_eq!(forward.graph, backward.graph);
}

#[test]
fn unparseable_relation_is_reported_and_member_kept() {
    let mut rows = fixture_rows();
    rows[0].relation_type = "cousin_of_someone|x:1|y:2".to_string();
    rows.push(LegacyMemberRow {
        id: "not-an-id".to_string(),
        ..rows[1].clone()
    });

    let decoded = decode_legacy_rows(id(OWNER), &rows);

    assert!(decoded.issues.iter().any(|issue| matches!(
        issue,
        DecodeIssue::UnparseableRelation { member_id, .. } if *member_id == id(DAUGHTER)
    )));
    assert!(decoded
        .issues
        .contains(&DecodeIssue::InvalidRowId {
            raw: "not-an-id".to_string()
        }));
    let daughter = decoded.graph.get(id(DAUGHTER)).unwrap();
    assert_eq!(daughter.relation, RelationTag::Detached);
    assert_eq!(daughter.position, Some(Position::new(1.0, 2.0)));
    assert!(daughter.parent_ids.is_empty());
    assert_eq!(decoded.graph.len(), 6);
}

#[test]
fn exported_rows_decode_to_the_same_graph() {
    let mut graph = FamilyGraph::new(Uuid::new_v4());
    let (me, wife) = graph.add_initial_couple(
        MemberDraft::new("Me", Gender::Male),
        MemberDraft::new("Wife", Gender::Female),
    );
    graph
        .add_parents(
            wife,
            MemberDraft::new("Father", Gender::Male),
            MemberDraft::new("Mother", Gender::Female),
        )
        .unwrap();
    graph
        .add_child(me, MemberDraft::new("Child", Gender::Female))
        .unwrap();
    graph.update_position(me, Position::new(-12.25, 7.125));

    let rows: Vec<LegacyMemberRow> = graph.members().map(legacy_row_from_member).collect();
    let json = serde_json::to_string(&rows).unwrap();
    let parsed: Vec<LegacyMemberRow> = serde_json::from_str(&json).unwrap();
    let decoded = decode_legacy_rows(graph.owner_id(), &parsed);

    assert!(decoded.issues.is_empty(), "{:?}", decoded.issues);
    assert_eq!(decoded.graph, graph);
}

#[test]
fn position_rewrite_keeps_tag_and_parses_within_tolerance() {
    let parent = Uuid::new_v4();
    let original = format!("child_of_{parent}_2|x:10|y:20");

    let rewritten = replace_position(&original, Position::new(123.456, -0.5));
    let parsed = parse_relation_type(&rewritten).unwrap();

    assert_eq!(
        parsed.tag,
        RelationTag::ChildOf {
            parent_id: parent,
            sibling_index: 2
        }
    );
    let position = parsed.position.unwrap();
    assert!((position.x - 123.456).abs() < 1e-9);
    assert!((position.y + 0.5).abs() < 1e-9);
}
