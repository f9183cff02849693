//! Revisioned geometry version store for rooms.
//! This crate is the single source of truth for version/revision invariants.

pub mod access;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod txn;

pub use access::{AccessPolicy, RoleAccessPolicy};
pub use config::{load_config, parse_config, ConfigError, StoreConfig};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::geometry::{
    GeometryRevision, GeometryVersion, Model3d, RevisionSummary, VersionSummary,
};
pub use model::room::{Project, Room};
pub use model::{ModelId, ProjectId, RevisionId, RoomId, UserId, VersionId};
pub use repo::error::{EntityRef, StoreError, StoreResult};
pub use repo::model_repo::{ModelArtifactStore, SqliteModelStore};
pub use repo::revision_repo::{NewRevision, RevisionStore};
pub use repo::room_link::{RoomLinkOutcome, RoomLinkRepair};
pub use repo::room_repo::RoomStore;
pub use repo::version_repo::{VersionResolution, VersionResolver};
pub use service::geometry_service::{GeometryVersionService, SaveRevisionRequest};
pub use txn::{
    SaveFailed, SaveResult, SaveStep, TransactionContext, TransactionCoordinator,
    TransactionMode, TxError,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
