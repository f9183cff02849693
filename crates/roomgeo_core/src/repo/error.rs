//! Shared error type for version store repositories.

use crate::db::DbError;
use crate::model::room::NameValidationError;
use crate::model::{ModelId, ProjectId, RevisionId, RoomId, UserId, VersionId};
use crate::txn::TxError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Referenced document kind for `StoreError::NotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef {
    Project(ProjectId),
    Room(RoomId),
    Version(VersionId),
    Revision(RevisionId),
    Model(ModelId),
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Project(id) => write!(f, "project {id}"),
            Self::Room(id) => write!(f, "room {id}"),
            Self::Version(id) => write!(f, "geometry version {id}"),
            Self::Revision(id) => write!(f, "geometry revision {id}"),
            Self::Model(id) => write!(f, "model {id}"),
        }
    }
}

/// Errors from version store reads and writes.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying store read/write failed.
    Persistence(DbError),
    /// Transaction session could not be started or finished.
    Transaction(TxError),
    /// A write statement reported no affected document.
    NotAcknowledged(&'static str),
    /// Referenced document id does not resolve.
    NotFound(EntityRef),
    /// A concurrent first save created the (room, name) version, and the
    /// retried attach still could not see it.
    DuplicateVersionRace { room: RoomId, name: String },
    /// Caller is neither admin nor owner of the room's project.
    NotAuthorized { user: UserId, room: RoomId },
    InvalidName(NameValidationError),
    /// Persisted data cannot be converted to a valid document.
    InvalidData(String),
}

impl StoreError {
    /// Returns whether the error means "referenced id does not resolve".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns whether the error is a duplicate-key violation from storage.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Persistence(err) if err.is_unique_violation())
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Persistence(err) => write!(f, "{err}"),
            Self::Transaction(err) => write!(f, "{err}"),
            Self::NotAcknowledged(collection) => {
                write!(f, "write to `{collection}` was not acknowledged")
            }
            Self::NotFound(entity) => write!(f, "{entity} not found"),
            Self::DuplicateVersionRace { room, name } => write!(
                f,
                "concurrent creation of geometry version `{name}` in room {room} could not be resolved"
            ),
            Self::NotAuthorized { user, room } => {
                write!(f, "user {user} is not authorized for room {room}")
            }
            Self::InvalidName(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persistence(err) => Some(err),
            Self::Transaction(err) => Some(err),
            Self::InvalidName(err) => Some(err),
            Self::NotAcknowledged(_)
            | Self::NotFound(_)
            | Self::DuplicateVersionRace { .. }
            | Self::NotAuthorized { .. }
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Persistence(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Persistence(DbError::Sqlite(value))
    }
}

impl From<TxError> for StoreError {
    fn from(value: TxError) -> Self {
        Self::Transaction(value)
    }
}

impl From<NameValidationError> for StoreError {
    fn from(value: NameValidationError) -> Self {
        Self::InvalidName(value)
    }
}
