use famtree_core::db::migrations::latest_version;
use famtree_core::db::{open_db, open_db_in_memory, DbError};
use famtree_core::{RepoError, SqliteInvitationRepository, SqliteMemberRepository};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "family_members");
    assert_table_exists(&conn, "family_invitations");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("famtree.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "family_members");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn repositories_refuse_unmigrated_connections() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteMemberRepository::try_new(&conn) {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        }) => {
            assert_eq!(expected_version, latest_version());
            assert_eq!(actual_version, 0);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("unmigrated connection must be refused"),
    }
    assert!(SqliteInvitationRepository::try_new(&conn).is_err());
}

#[test]
fn repositories_refuse_missing_columns() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!(
        "CREATE TABLE family_members (id TEXT PRIMARY KEY NOT NULL);
         PRAGMA user_version = {};",
        latest_version()
    ))
    .unwrap();

    match SqliteMemberRepository::try_new(&conn) {
        Err(RepoError::MissingRequiredColumn { table, column }) => {
            assert_eq!(table, "family_members");
            assert_eq!(column, "owner_id");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("incomplete table must be refused"),
    }
    assert!(matches!(
        SqliteInvitationRepository::try_new(&conn),
        Err(RepoError::MissingRequiredTable("family_invitations"))
    ));
}

#[test]
fn schema_rejects_half_set_positions() {
    let conn = open_db_in_memory().unwrap();
    let result = conn.execute(
        "INSERT INTO family_members (id, owner_id, member_name, relation_kind, position_x)
         VALUES ('a', 'b', 'c', 'self', 1.0);",
        [],
    );
    assert!(result.is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
