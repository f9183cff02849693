//! Document model for projects, rooms and revisioned geometry.
//!
//! # Responsibility
//! - Define canonical data structures used by the version store.
//! - Keep identifier types explicit in signatures.
//!
//! # Invariants
//! - Every document is identified by a stable `Uuid`.
//! - Revisions are immutable once written; versions only grow.

pub mod geometry;
pub mod room;

use uuid::Uuid;

/// Project document identifier.
pub type ProjectId = Uuid;
/// Room document identifier.
pub type RoomId = Uuid;
/// Geometry version document identifier.
pub type VersionId = Uuid;
/// Geometry revision document identifier.
pub type RevisionId = Uuid;
/// 3-D model artifact identifier.
pub type ModelId = Uuid;
/// Authenticated user identifier. Users are owned by the auth layer.
pub type UserId = Uuid;
