//! Room version-list repair.
//!
//! Ensures a newly created version is listed by its room. The list is
//! treated as a set: linking uses add-if-absent, so repeated or concurrent
//! repairs for the same id write at most one entry.

use super::error::StoreResult;
use super::room_repo::RoomStore;
use crate::model::{RoomId, VersionId};
use crate::txn::TransactionContext;
use log::debug;
use rusqlite::params;

/// Result of one repair call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomLinkOutcome {
    /// The version id was appended to the room's list.
    Linked,
    /// The room already listed the version; nothing was written.
    AlreadyLinked,
}

/// Idempotent room link repair.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoomLinkRepair {
    rooms: RoomStore,
}

impl RoomLinkRepair {
    /// Appends `version` to the room's version list unless already present.
    ///
    /// # Errors
    /// - `NotFound` when the room does not exist.
    pub fn ensure_version_linked(
        &self,
        ctx: &TransactionContext<'_>,
        room: RoomId,
        version: VersionId,
    ) -> StoreResult<RoomLinkOutcome> {
        self.rooms.ensure_room_exists(ctx, room)?;

        let written = ctx.execute(
            "INSERT OR IGNORE INTO room_versions (room_uuid, version_uuid, position)
             SELECT ?1, ?2, COALESCE(MAX(position), -1) + 1
             FROM room_versions
             WHERE room_uuid = ?1;",
            params![room.to_string(), version.to_string()],
        )?;

        let outcome = if written == 0 {
            RoomLinkOutcome::AlreadyLinked
        } else {
            RoomLinkOutcome::Linked
        };
        debug!(
            "event=room_link module=repo status=ok room_id={room} version_id={version} linked={}",
            outcome == RoomLinkOutcome::Linked
        );
        Ok(outcome)
    }
}
