//! Project and room documents.
//!
//! Rooms own the version list of their geometry objects; the list itself is
//! stored in `room_versions` and exposed through `RoomStore`.

use super::{ProjectId, RoomId, UserId};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Project that groups rooms. Only the creator is relevant to this core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub uuid: ProjectId,
    pub name: String,
    /// Owner used for non-admin access checks.
    pub creator: UserId,
    /// Epoch ms.
    pub created_at: i64,
}

/// Room belonging to exactly one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub uuid: RoomId,
    pub project: ProjectId,
    pub name: String,
    /// Epoch ms.
    pub created_at: i64,
}

/// Validation errors for project/room names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameValidationError {
    BlankName,
}

impl Display for NameValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "name must not be blank"),
        }
    }
}

impl Error for NameValidationError {}

/// Normalizes a user-facing document name.
///
/// Leading/trailing whitespace is trimmed; blank names are rejected.
pub fn normalize_name(value: &str) -> Result<String, NameValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(NameValidationError::BlankName);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::{normalize_name, NameValidationError};

    #[test]
    fn normalize_name_trims_whitespace() {
        assert_eq!(normalize_name("  wall-a \n").unwrap(), "wall-a");
    }

    #[test]
    fn normalize_name_rejects_blank() {
        assert_eq!(normalize_name(" \t"), Err(NameValidationError::BlankName));
    }
}
