//! Geometry version use-case service.
//!
//! # Responsibility
//! - Single entry point for saving geometry revisions and reading them back.
//! - Own the transaction context of a save unless the caller supplies one.
//!
//! # Invariants
//! - Save steps run strictly in order: persist model (optional), create
//!   revision, attach to version, link version to room (first save only).
//! - A save either returns the revision id or `SaveFailed`; partial success
//!   is never reported as success.
//! - In transactional mode a failed save leaves no visible writes. In
//!   best-effort mode earlier writes stay unless compensation is enabled.

use crate::access::AccessPolicy;
use crate::config::StoreConfig;
use crate::model::geometry::{GeometryRevision, GeometryVersion, RevisionSummary, VersionSummary};
use crate::model::room::normalize_name;
use crate::model::{ModelId, RevisionId, RoomId, UserId, VersionId};
use crate::repo::error::{EntityRef, StoreError, StoreResult};
use crate::repo::model_repo::{ModelArtifactStore, SqliteModelStore};
use crate::repo::revision_repo::{NewRevision, RevisionStore};
use crate::repo::room_link::{RoomLinkOutcome, RoomLinkRepair};
use crate::repo::room_repo::RoomStore;
use crate::repo::version_repo::{VersionResolution, VersionResolver};
use crate::txn::{
    Compensation, SaveFailed, SaveResult, SaveStep, TransactionContext, TransactionCoordinator,
    TransactionMode, WriteChain,
};
use log::{error, info, warn};
use rusqlite::Connection;
use std::time::Instant;

/// Request model for one geometry save.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRevisionRequest {
    /// Version name; unique per room.
    pub name: String,
    pub room: RoomId,
    pub author: UserId,
    /// Geometry document, stored as-is.
    pub payload: serde_json::Value,
    /// Existing source model the geometry refers to.
    pub model: Option<ModelId>,
    pub comment: Option<String>,
}

impl SaveRevisionRequest {
    pub fn new(
        name: impl Into<String>,
        room: RoomId,
        author: UserId,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            room,
            author,
            payload,
            model: None,
            comment: None,
        }
    }

    pub fn with_model(mut self, model: ModelId) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Orchestrates revision, version and room writes for geometry saves.
pub struct GeometryVersionService<'conn, M = SqliteModelStore> {
    coordinator: TransactionCoordinator<'conn>,
    compensate_best_effort: bool,
    models: M,
    rooms: RoomStore,
    revisions: RevisionStore,
    versions: VersionResolver,
    links: RoomLinkRepair,
}

impl<'conn> GeometryVersionService<'conn, SqliteModelStore> {
    /// Creates a service over a migrated connection.
    pub fn new(conn: &'conn Connection, mode: TransactionMode) -> Self {
        Self {
            coordinator: TransactionCoordinator::new(conn, mode),
            compensate_best_effort: false,
            models: SqliteModelStore,
            rooms: RoomStore,
            revisions: RevisionStore::default(),
            versions: VersionResolver,
            links: RoomLinkRepair::default(),
        }
    }

    /// Creates a service using the transaction settings of `config`.
    pub fn from_config(conn: &'conn Connection, config: &StoreConfig) -> Self {
        Self::new(conn, config.transaction_mode())
            .with_best_effort_compensation(config.compensate_best_effort)
    }
}

impl<'conn, M: ModelArtifactStore> GeometryVersionService<'conn, M> {
    /// Replaces the model artifact persistence used by bundled saves.
    pub fn with_model_store<N: ModelArtifactStore>(
        self,
        models: N,
    ) -> GeometryVersionService<'conn, N> {
        GeometryVersionService {
            coordinator: self.coordinator,
            compensate_best_effort: self.compensate_best_effort,
            models,
            rooms: self.rooms,
            revisions: self.revisions,
            versions: self.versions,
            links: self.links,
        }
    }

    /// Enables undo of earlier writes when a best-effort save fails.
    pub fn with_best_effort_compensation(mut self, enabled: bool) -> Self {
        self.compensate_best_effort = enabled;
        self
    }

    pub fn coordinator(&self) -> &TransactionCoordinator<'conn> {
        &self.coordinator
    }

    pub fn mode(&self) -> TransactionMode {
        self.coordinator.mode()
    }

    /// Saves one revision under a context owned by this call.
    ///
    /// # Errors
    /// - `SaveFailed` carrying the first failing step; the owned context is
    ///   aborted before returning.
    pub fn save_revision(&self, request: &SaveRevisionRequest) -> SaveResult<RevisionId> {
        let name = validated_name(request)?;
        self.run_owned("save_revision", |ctx| {
            self.save_chain(ctx, &name, request, None)
        })
    }

    /// Saves one revision under a caller-owned context.
    ///
    /// The caller commits or aborts `ctx`; this call never finishes it.
    pub fn save_revision_in(
        &self,
        ctx: &TransactionContext<'_>,
        request: &SaveRevisionRequest,
    ) -> SaveResult<RevisionId> {
        let name = validated_name(request)?;
        self.save_chain(ctx, &name, request, None)
    }

    /// Persists a new model artifact and saves a revision referencing it,
    /// all under one owned context.
    ///
    /// `request.model` is replaced by the newly persisted artifact id.
    pub fn save_revision_with_model_link(
        &self,
        request: &SaveRevisionRequest,
        model_payload: &serde_json::Value,
    ) -> SaveResult<RevisionId> {
        let name = validated_name(request)?;
        self.run_owned("save_revision_with_model_link", |ctx| {
            self.save_chain(ctx, &name, request, Some(model_payload))
        })
    }

    /// Caller-owned-context variant of `save_revision_with_model_link`.
    pub fn save_revision_with_model_link_in(
        &self,
        ctx: &TransactionContext<'_>,
        request: &SaveRevisionRequest,
        model_payload: &serde_json::Value,
    ) -> SaveResult<RevisionId> {
        let name = validated_name(request)?;
        self.save_chain(ctx, &name, request, Some(model_payload))
    }

    /// Head revision of a version.
    pub fn load_latest_revision(&self, version: VersionId) -> StoreResult<GeometryRevision> {
        let conn = self.coordinator.connection();
        self.versions.ensure_version_exists(conn, version)?;
        self.revisions
            .latest_for_version(conn, version)?
            .ok_or(StoreError::NotFound(EntityRef::Version(version)))
    }

    /// Revision metadata of a version, newest-first.
    pub fn load_revision_list(&self, version: VersionId) -> StoreResult<Vec<RevisionSummary>> {
        let conn = self.coordinator.connection();
        self.versions.ensure_version_exists(conn, version)?;
        self.revisions.list_summaries_for_version(conn, version)
    }

    /// Full revisions of a version including payloads, newest-first.
    pub fn load_all_revisions(&self, version: VersionId) -> StoreResult<Vec<GeometryRevision>> {
        let conn = self.coordinator.connection();
        self.versions.ensure_version_exists(conn, version)?;
        self.revisions.list_for_version(conn, version)
    }

    pub fn load_revision(&self, revision: RevisionId) -> StoreResult<GeometryRevision> {
        self.revisions
            .require_revision(self.coordinator.connection(), revision)
    }

    pub fn get_version(&self, version: VersionId) -> StoreResult<GeometryVersion> {
        self.versions
            .require_version(self.coordinator.connection(), version)
    }

    /// Versions listed by a room, in link order.
    pub fn list_room_versions(&self, room: RoomId) -> StoreResult<Vec<VersionSummary>> {
        let conn = self.coordinator.connection();
        self.rooms.ensure_room_exists(conn, room)?;
        self.rooms.list_room_versions(conn, room)
    }

    /// Allows admins and the creator of the room's project.
    ///
    /// # Errors
    /// - `NotFound` when the room does not exist.
    /// - `NotAuthorized` otherwise.
    pub fn authorize_room(
        &self,
        policy: &impl AccessPolicy,
        user: UserId,
        room: RoomId,
    ) -> StoreResult<()> {
        let owner = self
            .rooms
            .project_creator_for_room(self.coordinator.connection(), room)?
            .ok_or(StoreError::NotFound(EntityRef::Room(room)))?;
        if policy.allows(user, owner) {
            return Ok(());
        }
        warn!("event=authorize_room module=service status=denied user_id={user} room_id={room}");
        Err(StoreError::NotAuthorized { user, room })
    }

    fn run_owned(
        &self,
        operation: &'static str,
        body: impl FnOnce(&TransactionContext<'conn>) -> SaveResult<RevisionId>,
    ) -> SaveResult<RevisionId> {
        let started_at = Instant::now();
        let ctx = match self.coordinator.begin() {
            Ok(ctx) => ctx,
            Err(err) => {
                error!(
                    "event={operation} module=service status=error step=begin duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(SaveFailed::new(SaveStep::Begin, err));
            }
        };
        let mode = ctx.mode_label();

        match body(&ctx) {
            Ok(revision) => {
                if let Err(err) = self.coordinator.commit(ctx) {
                    error!(
                        "event={operation} module=service status=error mode={mode} step=commit duration_ms={} error={}",
                        started_at.elapsed().as_millis(),
                        err
                    );
                    return Err(SaveFailed::new(SaveStep::Commit, err));
                }
                info!(
                    "event={operation} module=service status=ok mode={mode} revision_id={revision} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(revision)
            }
            Err(err) => {
                if let Err(abort_err) = self.coordinator.abort(ctx) {
                    error!(
                        "event={operation} module=service status=error mode={mode} step=abort error={abort_err}"
                    );
                }
                error!(
                    "event={operation} module=service status=error mode={mode} step={} compensated={} duration_ms={} error={}",
                    err.step,
                    err.compensated,
                    started_at.elapsed().as_millis(),
                    err.source
                );
                Err(err)
            }
        }
    }

    fn save_chain(
        &self,
        ctx: &TransactionContext<'_>,
        name: &str,
        request: &SaveRevisionRequest,
        model_payload: Option<&serde_json::Value>,
    ) -> SaveResult<RevisionId> {
        let mut chain = WriteChain::new(ctx, self.compensate_best_effort);

        let model = match model_payload {
            Some(payload) => Some(chain.run(
                SaveStep::PersistModel,
                |ctx| self.models.save_model_artifact(ctx, payload),
                |model| Some(Compensation::DeleteModel(*model)),
            )?),
            None => request.model,
        };

        let revision = chain.run(
            SaveStep::CreateRevision,
            |ctx| {
                self.revisions.create_revision(
                    ctx,
                    &NewRevision {
                        room: request.room,
                        author: request.author,
                        payload: &request.payload,
                        model,
                        comment: request.comment.as_deref(),
                    },
                )
            },
            |revision| Some(Compensation::DeleteRevision(*revision)),
        )?;

        let resolution = chain.run(
            SaveStep::AttachRevision,
            |ctx| {
                self.versions
                    .attach_revision(ctx, request.room, name, revision)
            },
            |resolution| {
                Some(match *resolution {
                    VersionResolution::Created(version) => {
                        Compensation::DeleteCreatedVersion { version, revision }
                    }
                    VersionResolution::Extended(version)
                    | VersionResolution::JoinedRace(version) => {
                        Compensation::DetachRevision { version, revision }
                    }
                })
            },
        )?;

        if resolution.needs_room_link() {
            let version = resolution.version_id();
            chain.run(
                SaveStep::LinkRoom,
                |ctx| self.links.ensure_version_linked(ctx, request.room, version),
                |outcome| match outcome {
                    RoomLinkOutcome::Linked => Some(Compensation::UnlinkRoomVersion {
                        room: request.room,
                        version,
                    }),
                    RoomLinkOutcome::AlreadyLinked => None,
                },
            )?;
        }

        Ok(revision)
    }
}

fn validated_name(request: &SaveRevisionRequest) -> SaveResult<String> {
    normalize_name(&request.name).map_err(|err| SaveFailed::new(SaveStep::Validate, err))
}
