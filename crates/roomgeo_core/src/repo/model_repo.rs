//! 3-D model artifact persistence.
//!
//! Model artifacts are produced outside this crate; the version store only
//! needs to persist one under the same context as a bundled geometry save.

use super::error::{StoreError, StoreResult};
use super::{now_epoch_ms, parse_json};
use crate::model::geometry::Model3d;
use crate::model::ModelId;
use crate::txn::TransactionContext;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

/// Persistence seam for model artifacts bundled with a save.
pub trait ModelArtifactStore {
    /// Persists `payload` as a new model artifact under `ctx`.
    fn save_model_artifact(
        &self,
        ctx: &TransactionContext<'_>,
        payload: &serde_json::Value,
    ) -> StoreResult<ModelId>;
}

/// SQLite-backed model artifact store writing `models3d`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteModelStore;

impl SqliteModelStore {
    pub fn load_model_artifact(&self, conn: &Connection, id: ModelId) -> StoreResult<Option<Model3d>> {
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT data, created_at FROM models3d WHERE uuid = ?1;",
                [id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(data, created_at)| {
            Ok(Model3d {
                uuid: id,
                payload: parse_json(&data, "models3d.data")?,
                created_at,
            })
        })
        .transpose()
    }

    pub fn model_exists(&self, conn: &Connection, id: ModelId) -> StoreResult<bool> {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM models3d WHERE uuid = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

impl ModelArtifactStore for SqliteModelStore {
    fn save_model_artifact(
        &self,
        ctx: &TransactionContext<'_>,
        payload: &serde_json::Value,
    ) -> StoreResult<ModelId> {
        let uuid = Uuid::new_v4();
        let data = serde_json::to_string(payload)
            .map_err(|err| StoreError::InvalidData(format!("unserializable model: {err}")))?;
        let written = ctx.execute(
            "INSERT INTO models3d (uuid, data, created_at) VALUES (?1, ?2, ?3);",
            params![uuid.to_string(), data, now_epoch_ms()],
        )?;
        if written != 1 {
            return Err(StoreError::NotAcknowledged("models3d"));
        }
        Ok(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::{ModelArtifactStore, SqliteModelStore};
    use crate::db::open_db_in_memory;
    use crate::txn::TransactionContext;
    use serde_json::json;

    #[test]
    fn saved_model_is_loadable() {
        let conn = open_db_in_memory().unwrap();
        let ctx = TransactionContext::none(&conn);
        let payload = json!({"mesh": "base64..."});

        let id = SqliteModelStore.save_model_artifact(&ctx, &payload).unwrap();
        let loaded = SqliteModelStore
            .load_model_artifact(&conn, id)
            .unwrap()
            .unwrap();

        assert_eq!(loaded.payload, payload);
        assert!(SqliteModelStore.model_exists(&conn, id).unwrap());
    }
}
