use roomgeo_core::db::migrations::latest_version;
use roomgeo_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "projects");
    assert_table_exists(&conn, "rooms");
    assert_table_exists(&conn, "models3d");
    assert_table_exists(&conn, "geometry_revisions");
    assert_table_exists(&conn, "geometry_versions");
    assert_table_exists(&conn, "geometry_version_revisions");
    assert_table_exists(&conn, "room_versions");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roomgeo.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "geometry_versions");
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
fn version_names_are_unique_per_room() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO projects (uuid, name, creator_uuid) VALUES ('p1', 'plan', 'u1');
         INSERT INTO rooms (uuid, project_uuid, name) VALUES ('r1', 'p1', 'hall');
         INSERT INTO rooms (uuid, project_uuid, name) VALUES ('r2', 'p1', 'kitchen');
         INSERT INTO geometry_versions (uuid, room_uuid, name) VALUES ('v1', 'r1', 'wall-a');
         INSERT INTO geometry_versions (uuid, room_uuid, name) VALUES ('v2', 'r2', 'wall-a');",
    )
    .unwrap();

    let err = conn
        .execute(
            "INSERT INTO geometry_versions (uuid, room_uuid, name) VALUES ('v3', 'r1', 'wall-a');",
            [],
        )
        .unwrap_err();
    assert!(DbError::from(err).is_unique_violation());
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
