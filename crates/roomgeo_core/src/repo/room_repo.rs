//! Project and room persistence.
//!
//! # Responsibility
//! - Create and load projects and rooms.
//! - Read a room's version list in link order.

use super::error::{EntityRef, StoreError, StoreResult};
use super::{now_epoch_ms, parse_uuid};
use crate::model::geometry::VersionSummary;
use crate::model::room::{normalize_name, Project, Room};
use crate::model::{ProjectId, RoomId, UserId, VersionId};
use crate::txn::TransactionContext;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

/// SQLite-backed room store.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoomStore;

impl RoomStore {
    pub fn create_project(
        &self,
        ctx: &TransactionContext<'_>,
        name: &str,
        creator: UserId,
    ) -> StoreResult<Project> {
        let name = normalize_name(name)?;
        let project = Project {
            uuid: Uuid::new_v4(),
            name,
            creator,
            created_at: now_epoch_ms(),
        };
        ctx.execute(
            "INSERT INTO projects (uuid, name, creator_uuid, created_at)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                project.uuid.to_string(),
                project.name.as_str(),
                project.creator.to_string(),
                project.created_at,
            ],
        )?;
        Ok(project)
    }

    /// Creates a room under an existing project.
    pub fn create_room(
        &self,
        ctx: &TransactionContext<'_>,
        project: ProjectId,
        name: &str,
    ) -> StoreResult<Room> {
        let name = normalize_name(name)?;
        if self.get_project(ctx, project)?.is_none() {
            return Err(StoreError::NotFound(EntityRef::Project(project)));
        }
        let room = Room {
            uuid: Uuid::new_v4(),
            project,
            name,
            created_at: now_epoch_ms(),
        };
        ctx.execute(
            "INSERT INTO rooms (uuid, project_uuid, name, created_at)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                room.uuid.to_string(),
                room.project.to_string(),
                room.name.as_str(),
                room.created_at,
            ],
        )?;
        Ok(room)
    }

    pub fn get_project(&self, conn: &Connection, id: ProjectId) -> StoreResult<Option<Project>> {
        let row = conn
            .query_row(
                "SELECT uuid, name, creator_uuid, created_at
                 FROM projects
                 WHERE uuid = ?1;",
                [id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((uuid, name, creator, created_at)) => Ok(Some(Project {
                uuid: parse_uuid(&uuid, "projects.uuid")?,
                name,
                creator: parse_uuid(&creator, "projects.creator_uuid")?,
                created_at,
            })),
        }
    }

    pub fn get_room(&self, conn: &Connection, id: RoomId) -> StoreResult<Option<Room>> {
        let mut stmt = conn.prepare(
            "SELECT uuid, project_uuid, name, created_at
             FROM rooms
             WHERE uuid = ?1;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_room_row(row)?));
        }
        Ok(None)
    }

    pub fn room_exists(&self, conn: &Connection, id: RoomId) -> StoreResult<bool> {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM rooms WHERE uuid = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    /// Returns `NotFound` unless the room exists.
    pub fn ensure_room_exists(&self, conn: &Connection, id: RoomId) -> StoreResult<()> {
        if self.room_exists(conn, id)? {
            Ok(())
        } else {
            Err(StoreError::NotFound(EntityRef::Room(id)))
        }
    }

    /// Version ids linked to the room, in link order.
    pub fn list_room_version_ids(
        &self,
        conn: &Connection,
        room: RoomId,
    ) -> StoreResult<Vec<VersionId>> {
        let mut stmt = conn.prepare(
            "SELECT version_uuid
             FROM room_versions
             WHERE room_uuid = ?1
             ORDER BY position ASC;",
        )?;
        let mut rows = stmt.query([room.to_string()])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "room_versions.version_uuid")?);
        }
        Ok(ids)
    }

    /// Id and name of every version linked to the room, in link order.
    pub fn list_room_versions(
        &self,
        conn: &Connection,
        room: RoomId,
    ) -> StoreResult<Vec<VersionSummary>> {
        let mut stmt = conn.prepare(
            "SELECT v.uuid, v.name
             FROM room_versions rv
             INNER JOIN geometry_versions v ON v.uuid = rv.version_uuid
             WHERE rv.room_uuid = ?1
             ORDER BY rv.position ASC;",
        )?;
        let mut rows = stmt.query([room.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let uuid: String = row.get(0)?;
            items.push(VersionSummary {
                uuid: parse_uuid(&uuid, "geometry_versions.uuid")?,
                name: row.get(1)?,
            });
        }
        Ok(items)
    }

    /// Creator of the project that owns `room`.
    pub fn project_creator_for_room(
        &self,
        conn: &Connection,
        room: RoomId,
    ) -> StoreResult<Option<UserId>> {
        let creator: Option<String> = conn
            .query_row(
                "SELECT p.creator_uuid
                 FROM rooms r
                 INNER JOIN projects p ON p.uuid = r.project_uuid
                 WHERE r.uuid = ?1;",
                [room.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        creator
            .map(|value| parse_uuid(&value, "projects.creator_uuid"))
            .transpose()
    }
}

fn parse_room_row(row: &Row<'_>) -> StoreResult<Room> {
    let uuid: String = row.get("uuid")?;
    let project: String = row.get("project_uuid")?;
    Ok(Room {
        uuid: parse_uuid(&uuid, "rooms.uuid")?,
        project: parse_uuid(&project, "rooms.project_uuid")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::RoomStore;
    use crate::db::open_db_in_memory;
    use crate::repo::error::StoreError;
    use crate::txn::TransactionContext;
    use uuid::Uuid;

    #[test]
    fn create_room_requires_existing_project() {
        let conn = open_db_in_memory().unwrap();
        let ctx = TransactionContext::none(&conn);
        let missing = Uuid::new_v4();

        let err = RoomStore.create_room(&ctx, missing, "Kitchen").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn create_room_rejects_blank_name() {
        let conn = open_db_in_memory().unwrap();
        let ctx = TransactionContext::none(&conn);
        let project = RoomStore
            .create_project(&ctx, "House", Uuid::new_v4())
            .unwrap();

        let err = RoomStore.create_room(&ctx, project.uuid, "   ").unwrap_err();
        assert!(matches!(err, StoreError::InvalidName(_)));
    }

    #[test]
    fn created_room_is_loadable_with_empty_version_list() {
        let conn = open_db_in_memory().unwrap();
        let ctx = TransactionContext::none(&conn);
        let creator = Uuid::new_v4();
        let project = RoomStore.create_project(&ctx, "House", creator).unwrap();
        let room = RoomStore.create_room(&ctx, project.uuid, " Kitchen ").unwrap();

        let loaded = RoomStore.get_room(&conn, room.uuid).unwrap().unwrap();
        assert_eq!(loaded, room);
        assert_eq!(loaded.name, "Kitchen");
        assert!(RoomStore
            .list_room_version_ids(&conn, room.uuid)
            .unwrap()
            .is_empty());
        assert_eq!(
            RoomStore.project_creator_for_room(&conn, room.uuid).unwrap(),
            Some(creator)
        );
    }
}
