//! Geometry version and revision documents.
//!
//! # Responsibility
//! - Define the version (named line of edits) and revision (immutable
//!   snapshot) shapes shared by repository and service layers.
//!
//! # Invariants
//! - `GeometryVersion::revisions` is newest-first; index 0 is the head.
//! - A revision id appears in exactly one version's revision list.
//! - Payloads are opaque to this crate and never compared.

use super::{ModelId, RevisionId, RoomId, UserId, VersionId};
use serde::{Deserialize, Serialize};

/// Named line of edits for one geometry object within one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryVersion {
    pub uuid: VersionId,
    pub room: RoomId,
    /// Unique per room.
    pub name: String,
    /// Newest-first revision references.
    pub revisions: Vec<RevisionId>,
}

impl GeometryVersion {
    /// Returns the most recently appended revision, if any.
    pub fn head(&self) -> Option<RevisionId> {
        self.revisions.first().copied()
    }
}

/// Immutable snapshot of one geometry edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryRevision {
    pub uuid: RevisionId,
    pub room: RoomId,
    pub author: UserId,
    /// Geometry document as submitted by the editor.
    pub payload: serde_json::Value,
    /// Source 3-D model the geometry was derived from.
    pub model: Option<ModelId>,
    pub comment: Option<String>,
    /// Epoch ms.
    pub created_at: i64,
}

/// Revision list entry without the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionSummary {
    pub uuid: RevisionId,
    pub author: UserId,
    pub created_at: i64,
    pub comment: Option<String>,
    pub model: Option<ModelId>,
}

/// Room version list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSummary {
    pub uuid: VersionId,
    pub name: String,
}

/// 3-D model artifact bundled with a geometry edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model3d {
    pub uuid: ModelId,
    pub payload: serde_json::Value,
    /// Epoch ms.
    pub created_at: i64,
}
