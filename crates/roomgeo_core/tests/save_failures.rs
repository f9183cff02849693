use roomgeo_core::db::open_db_in_memory;
use roomgeo_core::{
    GeometryVersionService, ModelArtifactStore, ModelId, Room, RoomStore, SaveRevisionRequest,
    SaveStep, StoreConfig, StoreError, StoreResult, TransactionContext, TransactionMode,
    VersionResolver,
};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

/// Model store whose write is never acknowledged.
struct RejectingModelStore;

impl ModelArtifactStore for RejectingModelStore {
    fn save_model_artifact(
        &self,
        _ctx: &TransactionContext<'_>,
        _payload: &serde_json::Value,
    ) -> StoreResult<ModelId> {
        Err(StoreError::NotAcknowledged("models3d"))
    }
}

#[test]
fn transactional_link_failure_rolls_back_model_revision_and_version() {
    let conn = open_db_in_memory().unwrap();
    let (room, author) = seed_room(&conn);
    fail_inserts_into(&conn, "room_versions");
    let service = GeometryVersionService::new(&conn, TransactionMode::Transactional);

    let err = service
        .save_revision_with_model_link(&wall(room.uuid, author), &json!({ "mesh": "a.glb" }))
        .unwrap_err();

    assert_eq!(err.step, SaveStep::LinkRoom);
    assert!(!err.compensated);
    assert_eq!(count_rows(&conn, "models3d"), 0);
    assert_eq!(count_rows(&conn, "geometry_revisions"), 0);
    assert_eq!(count_rows(&conn, "geometry_versions"), 0);
    assert_eq!(count_rows(&conn, "geometry_version_revisions"), 0);
    assert_eq!(count_rows(&conn, "room_versions"), 0);
}

#[test]
fn transactional_model_failure_leaves_existing_version_untouched() {
    let conn = open_db_in_memory().unwrap();
    let (room, author) = seed_room(&conn);
    let service = GeometryVersionService::new(&conn, TransactionMode::Transactional);
    let first = service.save_revision(&wall(room.uuid, author)).unwrap();

    let failing = GeometryVersionService::new(&conn, TransactionMode::Transactional)
        .with_model_store(RejectingModelStore);
    let err = failing
        .save_revision_with_model_link(&wall(room.uuid, author), &json!({}))
        .unwrap_err();

    assert_eq!(err.step, SaveStep::PersistModel);
    assert!(matches!(err.source, StoreError::NotAcknowledged("models3d")));
    let version = service
        .get_version(version_id(&conn, room.uuid))
        .unwrap();
    assert_eq!(version.revisions, vec![first]);
    assert_eq!(count_rows(&conn, "geometry_revisions"), 1);
}

#[test]
fn best_effort_link_failure_keeps_earlier_writes() {
    let conn = open_db_in_memory().unwrap();
    let (room, author) = seed_room(&conn);
    fail_inserts_into(&conn, "room_versions");
    let service = GeometryVersionService::new(&conn, TransactionMode::BestEffort);

    let err = service.save_revision(&wall(room.uuid, author)).unwrap_err();

    assert_eq!(err.step, SaveStep::LinkRoom);
    assert!(!err.compensated);
    assert!(matches!(err.source, StoreError::Persistence(_)));

    let version = service
        .get_version(version_id(&conn, room.uuid))
        .unwrap();
    assert_eq!(version.revisions.len(), 1);
    service.load_revision(version.revisions[0]).unwrap();
    assert_eq!(count_rows(&conn, "room_versions"), 0);
}

#[test]
fn best_effort_attach_failure_leaves_no_empty_version() {
    let conn = open_db_in_memory().unwrap();
    let (room, author) = seed_room(&conn);
    fail_inserts_into(&conn, "geometry_version_revisions");
    let service = GeometryVersionService::new(&conn, TransactionMode::BestEffort);

    let err = service.save_revision(&wall(room.uuid, author)).unwrap_err();

    assert_eq!(err.step, SaveStep::AttachRevision);
    assert_eq!(count_rows(&conn, "geometry_revisions"), 1);
    assert_eq!(count_rows(&conn, "geometry_versions"), 0);
    assert_eq!(count_rows(&conn, "room_versions"), 0);
}

#[test]
fn best_effort_compensation_undoes_chain_on_link_failure() {
    let conn = open_db_in_memory().unwrap();
    let (room, author) = seed_room(&conn);
    fail_inserts_into(&conn, "room_versions");
    let config = StoreConfig {
        compensate_best_effort: true,
        ..StoreConfig::default()
    };
    let service = GeometryVersionService::from_config(&conn, &config);
    assert_eq!(service.mode(), TransactionMode::BestEffort);

    let err = service
        .save_revision_with_model_link(&wall(room.uuid, author), &json!({ "mesh": "b.glb" }))
        .unwrap_err();

    assert_eq!(err.step, SaveStep::LinkRoom);
    assert!(err.compensated);
    assert_eq!(count_rows(&conn, "models3d"), 0);
    assert_eq!(count_rows(&conn, "geometry_revisions"), 0);
    assert_eq!(count_rows(&conn, "geometry_versions"), 0);
    assert_eq!(count_rows(&conn, "geometry_version_revisions"), 0);
}

#[test]
fn best_effort_compensation_keeps_existing_version_head() {
    let conn = open_db_in_memory().unwrap();
    let (room, author) = seed_room(&conn);
    let service = GeometryVersionService::new(&conn, TransactionMode::BestEffort)
        .with_best_effort_compensation(true);
    let first = service.save_revision(&wall(room.uuid, author)).unwrap();

    let failing = GeometryVersionService::new(&conn, TransactionMode::BestEffort)
        .with_best_effort_compensation(true)
        .with_model_store(RejectingModelStore);
    let err = failing
        .save_revision_with_model_link(&wall(room.uuid, author), &json!({}))
        .unwrap_err();
    assert_eq!(err.step, SaveStep::PersistModel);

    let version = version_id(&conn, room.uuid);
    assert_eq!(service.load_latest_revision(version).unwrap().uuid, first);
    assert_eq!(service.list_room_versions(room.uuid).unwrap().len(), 1);
}

#[test]
fn extending_save_skips_room_link() {
    let conn = open_db_in_memory().unwrap();
    let (room, author) = seed_room(&conn);
    let service = GeometryVersionService::new(&conn, TransactionMode::Transactional);
    let first = service.save_revision(&wall(room.uuid, author)).unwrap();

    fail_inserts_into(&conn, "room_versions");
    let second = service.save_revision(&wall(room.uuid, author)).unwrap();

    let version = service
        .get_version(version_id(&conn, room.uuid))
        .unwrap();
    assert_eq!(version.revisions, vec![second, first]);
}

fn seed_room(conn: &Connection) -> (Room, Uuid) {
    let ctx = TransactionContext::none(conn);
    let author = Uuid::new_v4();
    let project = RoomStore.create_project(&ctx, "office", author).unwrap();
    let room = RoomStore.create_room(&ctx, project.uuid, "lobby").unwrap();
    (room, author)
}

fn wall(room: Uuid, author: Uuid) -> SaveRevisionRequest {
    SaveRevisionRequest::new("wall-a", room, author, json!({ "kind": "wall" }))
}

fn fail_inserts_into(conn: &Connection, table: &str) {
    conn.execute_batch(&format!(
        "CREATE TRIGGER fail_{table}_insert
         BEFORE INSERT ON {table}
         BEGIN
             SELECT RAISE(ABORT, 'injected failure');
         END;"
    ))
    .unwrap();
}

fn version_id(conn: &Connection, room: Uuid) -> Uuid {
    VersionResolver
        .find_version_id(conn, room, "wall-a")
        .unwrap()
        .unwrap()
}

fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}
