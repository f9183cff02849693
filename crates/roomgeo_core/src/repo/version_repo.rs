//! Geometry version resolution and persistence.
//!
//! # Responsibility
//! - Attach a new revision to the (room, name) version, creating the
//!   version on first save.
//! - Load versions with their newest-first revision list.
//!
//! # Invariants
//! - At most one version per (room, name); enforced by a UNIQUE index.
//! - A head push is one statement, so concurrent pushes onto the same
//!   version never interleave.
//! - A lost creation race is resolved by retrying the head push once.

use super::error::{EntityRef, StoreError, StoreResult};
use super::parse_uuid;
use crate::model::geometry::GeometryVersion;
use crate::model::{RevisionId, RoomId, VersionId};
use crate::txn::TransactionContext;
use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

/// How `attach_revision` resolved the target version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionResolution {
    /// The version already existed; the revision became its new head.
    Extended(VersionId),
    /// No version existed; one was created seeded with the revision.
    Created(VersionId),
    /// Creation lost a race against a concurrent first save; the revision
    /// was pushed onto the winner's version instead.
    JoinedRace(VersionId),
}

impl VersionResolution {
    pub fn version_id(self) -> VersionId {
        match self {
            Self::Extended(id) | Self::Created(id) | Self::JoinedRace(id) => id,
        }
    }

    /// Whether the owning room may not yet list this version.
    pub fn needs_room_link(self) -> bool {
        matches!(self, Self::Created(_) | Self::JoinedRace(_))
    }
}

/// Find-or-create resolver for named versions.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionResolver;

impl VersionResolver {
    /// Pushes `revision` to the front of the (room, name) version's list,
    /// creating the version if it does not exist.
    ///
    /// # Errors
    /// - `DuplicateVersionRace` when creation hits the UNIQUE index but the
    ///   retried push still finds no version.
    /// - `Persistence` with a unique violation when `revision` is already
    ///   attached to some version.
    /// - `Persistence` for any other storage failure.
    pub fn attach_revision(
        &self,
        ctx: &TransactionContext<'_>,
        room: RoomId,
        name: &str,
        revision: RevisionId,
    ) -> StoreResult<VersionResolution> {
        if let Some(version) = push_head(ctx, room, name, revision)? {
            debug!(
                "event=version_extend module=repo status=ok version_id={version} revision_id={revision}"
            );
            return Ok(VersionResolution::Extended(version));
        }

        match create_version(ctx, room, name, revision)? {
            Some(version) => {
                info!(
                    "event=version_create module=repo status=ok version_id={version} room_id={room} mode={}",
                    ctx.mode_label()
                );
                Ok(VersionResolution::Created(version))
            }
            None => {
                warn!("event=version_race_lost module=repo status=retry room_id={room}");
                match push_head(ctx, room, name, revision)? {
                    Some(version) => Ok(VersionResolution::JoinedRace(version)),
                    None => Err(StoreError::DuplicateVersionRace {
                        room,
                        name: name.to_string(),
                    }),
                }
            }
        }
    }

    /// Looks up the version id for (room, name) without writing.
    pub fn find_version_id(
        &self,
        conn: &Connection,
        room: RoomId,
        name: &str,
    ) -> StoreResult<Option<VersionId>> {
        let value: Option<String> = conn
            .query_row(
                "SELECT uuid
                 FROM geometry_versions
                 WHERE room_uuid = ?1
                   AND name = ?2;",
                params![room.to_string(), name],
                |row| row.get(0),
            )
            .optional()?;
        value
            .map(|value| parse_uuid(&value, "geometry_versions.uuid"))
            .transpose()
    }

    /// Loads a version with its revision list, newest-first.
    pub fn get_version(
        &self,
        conn: &Connection,
        id: VersionId,
    ) -> StoreResult<Option<GeometryVersion>> {
        let header: Option<(String, String)> = conn
            .query_row(
                "SELECT room_uuid, name
                 FROM geometry_versions
                 WHERE uuid = ?1;",
                [id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((room, name)) = header else {
            return Ok(None);
        };

        Ok(Some(GeometryVersion {
            uuid: id,
            room: parse_uuid(&room, "geometry_versions.room_uuid")?,
            name,
            revisions: self.revision_ids(conn, id)?,
        }))
    }

    /// Loads a version or fails with `NotFound`.
    pub fn require_version(&self, conn: &Connection, id: VersionId) -> StoreResult<GeometryVersion> {
        self.get_version(conn, id)?
            .ok_or(StoreError::NotFound(EntityRef::Version(id)))
    }

    /// Returns `NotFound` unless the version exists.
    pub fn ensure_version_exists(&self, conn: &Connection, id: VersionId) -> StoreResult<()> {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM geometry_versions WHERE uuid = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        if exists == 1 {
            Ok(())
        } else {
            Err(StoreError::NotFound(EntityRef::Version(id)))
        }
    }

    fn revision_ids(&self, conn: &Connection, id: VersionId) -> StoreResult<Vec<RevisionId>> {
        let mut stmt = conn.prepare(
            "SELECT revision_uuid
             FROM geometry_version_revisions
             WHERE version_uuid = ?1
             ORDER BY position DESC;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "geometry_version_revisions.revision_uuid")?);
        }
        Ok(ids)
    }
}

/// Atomic find-and-update: appends `revision` as the new head of the
/// (room, name) version. Returns `None` when no such version exists.
fn push_head(
    conn: &Connection,
    room: RoomId,
    name: &str,
    revision: RevisionId,
) -> StoreResult<Option<VersionId>> {
    let value: Option<String> = conn
        .query_row(
            "INSERT INTO geometry_version_revisions (version_uuid, revision_uuid, position)
             SELECT
                v.uuid,
                ?3,
                COALESCE(
                    (SELECT MAX(position)
                     FROM geometry_version_revisions
                     WHERE version_uuid = v.uuid),
                    -1
                ) + 1
             FROM geometry_versions v
             WHERE v.room_uuid = ?1
               AND v.name = ?2
             RETURNING version_uuid;",
            params![room.to_string(), name, revision.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    value
        .map(|value| parse_uuid(&value, "geometry_version_revisions.version_uuid"))
        .transpose()
}

/// Inserts the version seeded with `revision`. Returns `None` when the
/// (room, name) key was taken by a concurrent writer.
///
/// The header becomes visible before the seed lands, so a concurrent
/// `push_head` may claim the first slot; the seed takes the next free one.
fn create_version(
    conn: &Connection,
    room: RoomId,
    name: &str,
    revision: RevisionId,
) -> StoreResult<Option<VersionId>> {
    let uuid = Uuid::new_v4();
    if let Err(err) = conn.execute(
        "INSERT INTO geometry_versions (uuid, room_uuid, name)
         VALUES (?1, ?2, ?3);",
        params![uuid.to_string(), room.to_string(), name],
    ) {
        let err = StoreError::from(err);
        if err.is_unique_violation() {
            return Ok(None);
        }
        return Err(err);
    }

    let seeded = conn.execute(
        "INSERT INTO geometry_version_revisions (version_uuid, revision_uuid, position)
         SELECT ?1, ?2, COALESCE(MAX(position), -1) + 1
         FROM geometry_version_revisions
         WHERE version_uuid = ?1;",
        params![uuid.to_string(), revision.to_string()],
    );
    match seeded {
        Ok(1) => Ok(Some(uuid)),
        Ok(_) => {
            discard_empty_version(conn, uuid);
            Err(StoreError::NotAcknowledged("geometry_version_revisions"))
        }
        Err(err) => {
            discard_empty_version(conn, uuid);
            Err(err.into())
        }
    }
}

/// Removes a header whose seed failed, unless a concurrent push already
/// attached a revision to it.
fn discard_empty_version(conn: &Connection, version: VersionId) {
    let removed = conn.execute(
        "DELETE FROM geometry_versions
         WHERE uuid = ?1
           AND NOT EXISTS (
             SELECT 1 FROM geometry_version_revisions WHERE version_uuid = ?1
           );",
        [version.to_string()],
    );
    match removed {
        Ok(0) => warn!(
            "event=version_seed_failed module=repo status=kept version_id={version}"
        ),
        Ok(_) => debug!(
            "event=version_seed_failed module=repo status=discarded version_id={version}"
        ),
        Err(err) => warn!(
            "event=version_seed_failed module=repo status=error version_id={version} error={err}"
        ),
    }
}
