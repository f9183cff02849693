//! Ordered chain of dependent writes with optional compensation.
//!
//! # Responsibility
//! - Run the steps of one save in order under one `TransactionContext`.
//! - Report the first failing step as `SaveFailed`.
//! - Replay compensating actions in reverse order when the context is not
//!   atomic and compensation is enabled.
//!
//! # Invariants
//! - Under `InTransaction`, compensations never run; abort discards all.
//! - Compensations only remove documents written by this chain, and skip
//!   documents another writer has started referencing in the meantime.

use crate::model::{ModelId, RevisionId, RoomId, VersionId};
use crate::repo::error::StoreError;
use crate::txn::TransactionContext;
use log::{info, warn};
use rusqlite::{params, Connection};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SaveResult<T> = Result<T, SaveFailed>;

/// Steps of a geometry save, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStep {
    Validate,
    Begin,
    PersistModel,
    CreateRevision,
    AttachRevision,
    LinkRoom,
    Commit,
}

impl SaveStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Begin => "begin",
            Self::PersistModel => "persist_model",
            Self::CreateRevision => "create_revision",
            Self::AttachRevision => "attach_revision",
            Self::LinkRoom => "link_room",
            Self::Commit => "commit",
        }
    }
}

impl Display for SaveStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite save error carrying the first failing step.
#[derive(Debug)]
pub struct SaveFailed {
    pub step: SaveStep,
    pub source: StoreError,
    /// Earlier best-effort writes of the chain were undone.
    pub compensated: bool,
}

impl SaveFailed {
    pub fn new(step: SaveStep, source: impl Into<StoreError>) -> Self {
        Self {
            step,
            source: source.into(),
            compensated: false,
        }
    }

    /// Returns whether the failing step hit an unresolved reference.
    pub fn is_not_found(&self) -> bool {
        self.source.is_not_found()
    }
}

impl Display for SaveFailed {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "save failed at step `{}`: {}", self.step, self.source)
    }
}

impl Error for SaveFailed {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Undo action for one applied step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compensation {
    DeleteModel(ModelId),
    DeleteRevision(RevisionId),
    /// Removes a head push onto a pre-existing version.
    DetachRevision {
        version: VersionId,
        revision: RevisionId,
    },
    /// Removes a version this chain created, if nobody else extended it.
    DeleteCreatedVersion {
        version: VersionId,
        revision: RevisionId,
    },
    UnlinkRoomVersion {
        room: RoomId,
        version: VersionId,
    },
}

impl Compensation {
    /// Applies the undo action as an independent write.
    pub fn apply(&self, conn: &Connection) -> rusqlite::Result<()> {
        match *self {
            Self::DeleteModel(model) => {
                conn.execute(
                    "DELETE FROM models3d
                     WHERE uuid = ?1
                       AND NOT EXISTS (
                         SELECT 1 FROM geometry_revisions WHERE model_uuid = ?1
                       );",
                    [model.to_string()],
                )?;
            }
            Self::DeleteRevision(revision) => {
                conn.execute(
                    "DELETE FROM geometry_revisions
                     WHERE uuid = ?1
                       AND NOT EXISTS (
                         SELECT 1 FROM geometry_version_revisions WHERE revision_uuid = ?1
                       );",
                    [revision.to_string()],
                )?;
            }
            Self::DetachRevision { version, revision } => {
                detach_revision(conn, version, revision)?;
            }
            Self::DeleteCreatedVersion { version, revision } => {
                detach_revision(conn, version, revision)?;
                conn.execute(
                    "DELETE FROM geometry_versions
                     WHERE uuid = ?1
                       AND NOT EXISTS (
                         SELECT 1 FROM geometry_version_revisions WHERE version_uuid = ?1
                       )
                       AND NOT EXISTS (
                         SELECT 1 FROM room_versions WHERE version_uuid = ?1
                       );",
                    [version.to_string()],
                )?;
            }
            Self::UnlinkRoomVersion { room, version } => {
                conn.execute(
                    "DELETE FROM room_versions
                     WHERE room_uuid = ?1
                       AND version_uuid = ?2;",
                    params![room.to_string(), version.to_string()],
                )?;
            }
        }
        Ok(())
    }
}

fn detach_revision(
    conn: &Connection,
    version: VersionId,
    revision: RevisionId,
) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM geometry_version_revisions
         WHERE version_uuid = ?1
           AND revision_uuid = ?2;",
        params![version.to_string(), revision.to_string()],
    )?;
    Ok(())
}

/// Executes dependent writes in order and records how to undo them.
pub struct WriteChain<'ctx, 'conn> {
    ctx: &'ctx TransactionContext<'conn>,
    compensate: bool,
    applied: Vec<(SaveStep, Compensation)>,
}

impl<'ctx, 'conn> WriteChain<'ctx, 'conn> {
    /// Creates an empty chain bound to `ctx`.
    ///
    /// `compensate` only matters for `NoTransaction` contexts.
    pub fn new(ctx: &'ctx TransactionContext<'conn>, compensate: bool) -> Self {
        Self {
            ctx,
            compensate,
            applied: Vec::new(),
        }
    }

    /// Steps applied so far, in execution order.
    pub fn applied_steps(&self) -> Vec<SaveStep> {
        self.applied.iter().map(|(step, _)| *step).collect()
    }

    /// Runs one step.
    ///
    /// `undo` maps the step's result to its compensating action, or `None`
    /// when the step wrote nothing that needs undoing.
    ///
    /// # Errors
    /// - Returns `SaveFailed` for `step` when `forward` fails, after
    ///   unwinding earlier steps where applicable.
    pub fn run<T>(
        &mut self,
        step: SaveStep,
        forward: impl FnOnce(&TransactionContext<'conn>) -> Result<T, StoreError>,
        undo: impl FnOnce(&T) -> Option<Compensation>,
    ) -> SaveResult<T> {
        match forward(self.ctx) {
            Ok(value) => {
                if let Some(compensation) = undo(&value) {
                    self.applied.push((step, compensation));
                }
                Ok(value)
            }
            Err(source) => {
                let compensated = self.unwind(step);
                Err(SaveFailed {
                    step,
                    source,
                    compensated,
                })
            }
        }
    }

    /// Replays compensations newest-first. Returns whether all succeeded.
    fn unwind(&mut self, failed_step: SaveStep) -> bool {
        if self.ctx.is_atomic() || !self.compensate {
            self.applied.clear();
            return false;
        }

        let mut clean = true;
        while let Some((step, compensation)) = self.applied.pop() {
            match compensation.apply(self.ctx) {
                Ok(()) => info!(
                    "event=chain_compensate module=txn status=ok failed_step={} undone_step={}",
                    failed_step, step
                ),
                Err(err) => {
                    clean = false;
                    warn!(
                        "event=chain_compensate module=txn status=error failed_step={} undone_step={} error={}",
                        failed_step, step, err
                    );
                }
            }
        }
        clean
    }
}

#[cfg(test)]
mod tests {
    use super::{Compensation, SaveStep, WriteChain};
    use crate::db::open_db_in_memory;
    use crate::repo::error::{EntityRef, StoreError};
    use crate::repo::model_repo::{ModelArtifactStore, SqliteModelStore};
    use crate::txn::{TransactionContext, TransactionCoordinator, TransactionMode};
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn failing_step_reports_its_name_and_stops_chain() {
        let conn = open_db_in_memory().unwrap();
        let coordinator = TransactionCoordinator::new(&conn, TransactionMode::BestEffort);
        let ctx = coordinator.begin().unwrap();
        let mut chain = WriteChain::new(&ctx, false);

        chain
            .run(SaveStep::CreateRevision, |_| Ok(1), |_| None)
            .unwrap();
        let room = Uuid::new_v4();
        let err = chain
            .run(
                SaveStep::LinkRoom,
                |_| Err::<(), _>(StoreError::NotFound(EntityRef::Room(room))),
                |_| None,
            )
            .unwrap_err();

        assert_eq!(err.step, SaveStep::LinkRoom);
        assert!(err.is_not_found());
        assert!(!err.compensated);
        assert!(err.to_string().contains("link_room"));
    }

    #[test]
    fn atomic_context_never_reports_compensation() {
        let conn = open_db_in_memory().unwrap();
        let coordinator = TransactionCoordinator::new(&conn, TransactionMode::Transactional);
        let ctx = coordinator.begin().unwrap();
        let mut chain = WriteChain::new(&ctx, true);

        let err = chain
            .run(
                SaveStep::AttachRevision,
                |_| Err::<(), _>(StoreError::NotAcknowledged("geometry_versions")),
                |_| None,
            )
            .unwrap_err();

        assert!(!err.compensated);
        coordinator.abort(ctx).unwrap();
    }

    #[test]
    fn best_effort_chain_undoes_applied_writes_when_enabled() {
        let conn = open_db_in_memory().unwrap();
        let ctx = TransactionContext::none(&conn);
        let models = SqliteModelStore;
        let mut chain = WriteChain::new(&ctx, true);

        let model = chain
            .run(
                SaveStep::PersistModel,
                |ctx| models.save_model_artifact(ctx, &json!({"mesh": "a.glb"})),
                |model| Some(Compensation::DeleteModel(*model)),
            )
            .unwrap();
        assert_eq!(chain.applied_steps(), vec![SaveStep::PersistModel]);

        let err = chain
            .run(
                SaveStep::CreateRevision,
                |_| Err::<(), _>(StoreError::NotAcknowledged("geometry_revisions")),
                |_| None,
            )
            .unwrap_err();

        assert!(err.compensated);
        assert!(chain.applied_steps().is_empty());
        assert!(!models.model_exists(&conn, model).unwrap());
    }
}
