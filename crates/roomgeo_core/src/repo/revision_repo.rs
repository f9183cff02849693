//! Geometry revision persistence.
//!
//! # Responsibility
//! - Append immutable revision documents.
//! - Load revisions and revision lists for a version.
//!
//! # Invariants
//! - `create_revision` always inserts a fresh document; nothing is
//!   overwritten or updated.
//! - List reads follow the version's link order, newest-first.

use super::error::{EntityRef, StoreError, StoreResult};
use super::room_repo::RoomStore;
use super::{now_epoch_ms, parse_json, parse_uuid};
use crate::model::geometry::{GeometryRevision, RevisionSummary};
use crate::model::{ModelId, RevisionId, RoomId, UserId, VersionId};
use crate::txn::TransactionContext;
use log::debug;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const REVISION_SELECT_SQL: &str = "SELECT
    r.uuid AS uuid,
    r.room_uuid AS room_uuid,
    r.author_uuid AS author_uuid,
    r.data AS data,
    r.model_uuid AS model_uuid,
    r.comment AS comment,
    r.created_at AS created_at
FROM geometry_revisions r";

/// Input for one new revision.
#[derive(Debug, Clone, Copy)]
pub struct NewRevision<'a> {
    pub room: RoomId,
    pub author: UserId,
    pub payload: &'a serde_json::Value,
    pub model: Option<ModelId>,
    pub comment: Option<&'a str>,
}

/// SQLite-backed revision store.
#[derive(Debug, Clone, Copy, Default)]
pub struct RevisionStore {
    rooms: RoomStore,
}

impl RevisionStore {
    /// Persists a new revision and returns its id.
    ///
    /// # Errors
    /// - `NotFound` when the room or the referenced model does not exist.
    /// - `NotAcknowledged` when the insert reports no row written.
    pub fn create_revision(
        &self,
        ctx: &TransactionContext<'_>,
        revision: &NewRevision<'_>,
    ) -> StoreResult<RevisionId> {
        self.rooms.ensure_room_exists(ctx, revision.room)?;
        if let Some(model) = revision.model {
            let exists: i64 = ctx.query_row(
                "SELECT EXISTS(SELECT 1 FROM models3d WHERE uuid = ?1);",
                [model.to_string()],
                |row| row.get(0),
            )?;
            if exists != 1 {
                return Err(StoreError::NotFound(EntityRef::Model(model)));
            }
        }

        let uuid = Uuid::new_v4();
        let data = serde_json::to_string(revision.payload)
            .map_err(|err| StoreError::InvalidData(format!("unserializable payload: {err}")))?;
        let written = ctx.execute(
            "INSERT INTO geometry_revisions (
                uuid,
                room_uuid,
                author_uuid,
                data,
                model_uuid,
                comment,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                uuid.to_string(),
                revision.room.to_string(),
                revision.author.to_string(),
                data,
                revision.model.map(|value| value.to_string()),
                revision.comment,
                now_epoch_ms(),
            ],
        )?;
        if written != 1 {
            return Err(StoreError::NotAcknowledged("geometry_revisions"));
        }

        debug!(
            "event=revision_create module=repo status=ok revision_id={uuid} room_id={} mode={}",
            revision.room,
            ctx.mode_label()
        );
        Ok(uuid)
    }

    pub fn get_revision(
        &self,
        conn: &Connection,
        id: RevisionId,
    ) -> StoreResult<Option<GeometryRevision>> {
        let mut stmt = conn.prepare(&format!("{REVISION_SELECT_SQL} WHERE r.uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_revision_row(row)?));
        }
        Ok(None)
    }

    /// Head revision of a version, if the version has any.
    pub fn latest_for_version(
        &self,
        conn: &Connection,
        version: VersionId,
    ) -> StoreResult<Option<GeometryRevision>> {
        let mut stmt = conn.prepare(&format!(
            "{REVISION_SELECT_SQL}
             INNER JOIN geometry_version_revisions vr ON vr.revision_uuid = r.uuid
             WHERE vr.version_uuid = ?1
             ORDER BY vr.position DESC
             LIMIT 1;"
        ))?;
        let mut rows = stmt.query([version.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_revision_row(row)?));
        }
        Ok(None)
    }

    /// All revisions of a version including payloads, newest-first.
    pub fn list_for_version(
        &self,
        conn: &Connection,
        version: VersionId,
    ) -> StoreResult<Vec<GeometryRevision>> {
        let mut stmt = conn.prepare(&format!(
            "{REVISION_SELECT_SQL}
             INNER JOIN geometry_version_revisions vr ON vr.revision_uuid = r.uuid
             WHERE vr.version_uuid = ?1
             ORDER BY vr.position DESC;"
        ))?;
        let mut rows = stmt.query([version.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_revision_row(row)?);
        }
        Ok(items)
    }

    /// Revision metadata of a version without payloads, newest-first.
    pub fn list_summaries_for_version(
        &self,
        conn: &Connection,
        version: VersionId,
    ) -> StoreResult<Vec<RevisionSummary>> {
        let mut stmt = conn.prepare(
            "SELECT r.uuid, r.author_uuid, r.created_at, r.comment, r.model_uuid
             FROM geometry_revisions r
             INNER JOIN geometry_version_revisions vr ON vr.revision_uuid = r.uuid
             WHERE vr.version_uuid = ?1
             ORDER BY vr.position DESC;",
        )?;
        let mut rows = stmt.query([version.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let uuid: String = row.get(0)?;
            let author: String = row.get(1)?;
            let model = row
                .get::<_, Option<String>>(4)?
                .map(|value| parse_uuid(&value, "geometry_revisions.model_uuid"))
                .transpose()?;
            items.push(RevisionSummary {
                uuid: parse_uuid(&uuid, "geometry_revisions.uuid")?,
                author: parse_uuid(&author, "geometry_revisions.author_uuid")?,
                created_at: row.get(2)?,
                comment: row.get(3)?,
                model,
            });
        }
        Ok(items)
    }

    /// Loads a revision or fails with `NotFound`.
    pub fn require_revision(
        &self,
        conn: &Connection,
        id: RevisionId,
    ) -> StoreResult<GeometryRevision> {
        self.get_revision(conn, id)?
            .ok_or(StoreError::NotFound(EntityRef::Revision(id)))
    }
}

fn parse_revision_row(row: &Row<'_>) -> StoreResult<GeometryRevision> {
    let uuid: String = row.get("uuid")?;
    let room: String = row.get("room_uuid")?;
    let author: String = row.get("author_uuid")?;
    let data: String = row.get("data")?;
    let model = row
        .get::<_, Option<String>>("model_uuid")?
        .map(|value| parse_uuid(&value, "geometry_revisions.model_uuid"))
        .transpose()?;

    Ok(GeometryRevision {
        uuid: parse_uuid(&uuid, "geometry_revisions.uuid")?,
        room: parse_uuid(&room, "geometry_revisions.room_uuid")?,
        author: parse_uuid(&author, "geometry_revisions.author_uuid")?,
        payload: parse_json(&data, "geometry_revisions.data")?,
        model,
        comment: row.get("comment")?,
        created_at: row.get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::{NewRevision, RevisionStore};
    use crate::db::open_db_in_memory;
    use crate::repo::room_repo::RoomStore;
    use crate::txn::TransactionContext;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn create_revision_rejects_unknown_room() {
        let conn = open_db_in_memory().unwrap();
        let ctx = TransactionContext::none(&conn);
        let payload = json!({"points": []});

        let err = RevisionStore::default()
            .create_revision(
                &ctx,
                &NewRevision {
                    room: Uuid::new_v4(),
                    author: Uuid::new_v4(),
                    payload: &payload,
                    model: None,
                    comment: None,
                },
            )
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn created_revision_round_trips_payload_and_comment() {
        let conn = open_db_in_memory().unwrap();
        let ctx = TransactionContext::none(&conn);
        let project = RoomStore
            .create_project(&ctx, "House", Uuid::new_v4())
            .unwrap();
        let room = RoomStore.create_room(&ctx, project.uuid, "Kitchen").unwrap();
        let author = Uuid::new_v4();
        let payload = json!({"walls": [{"x": 1.5, "y": 2.0}]});
        let store = RevisionStore::default();

        let id = store
            .create_revision(
                &ctx,
                &NewRevision {
                    room: room.uuid,
                    author,
                    payload: &payload,
                    model: None,
                    comment: Some("first draft"),
                },
            )
            .unwrap();

        let loaded = store.require_revision(&conn, id).unwrap();
        assert_eq!(loaded.room, room.uuid);
        assert_eq!(loaded.author, author);
        assert_eq!(loaded.payload, payload);
        assert_eq!(loaded.comment.as_deref(), Some("first draft"));
        assert!(loaded.created_at > 0);
    }
}
