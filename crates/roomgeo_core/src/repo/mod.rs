//! Repository layer over the document tables.
//!
//! # Responsibility
//! - Keep SQL details inside the persistence boundary.
//! - Expose one component per aggregate concern: rooms, revisions,
//!   version resolution, room link repair, model artifacts.
//!
//! # Invariants
//! - Every write takes an explicit `TransactionContext`.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod error;
pub mod model_repo;
pub mod revision_repo;
pub mod room_link;
pub mod room_repo;
pub mod version_repo;

use error::{StoreError, StoreResult};
use log::warn;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> StoreResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| StoreError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_json(value: &str, column: &'static str) -> StoreResult<serde_json::Value> {
    serde_json::from_str(value)
        .map_err(|err| StoreError::InvalidData(format!("invalid json in {column}: {err}")))
}

/// Wall-clock time in epoch ms. A clock outside the `i64` ms range since
/// the Unix epoch is logged and stored as 0.
pub(crate) fn now_epoch_ms() -> i64 {
    let now = SystemTime::now();
    epoch_ms(now).unwrap_or_else(|| {
        warn!("event=clock_out_of_range module=repo status=fallback stored_ms=0 now={now:?}");
        0
    })
}

fn epoch_ms(time: SystemTime) -> Option<i64> {
    let elapsed = time.duration_since(UNIX_EPOCH).ok()?;
    i64::try_from(elapsed.as_millis()).ok()
}

#[cfg(test)]
mod tests {
    use super::{epoch_ms, now_epoch_ms};
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn epoch_ms_counts_from_unix_epoch() {
        assert_eq!(epoch_ms(UNIX_EPOCH), Some(0));
        assert_eq!(epoch_ms(UNIX_EPOCH + Duration::from_millis(1_500)), Some(1_500));
        assert!(now_epoch_ms() > 0);
    }

    #[test]
    fn epoch_ms_rejects_times_before_epoch() {
        assert_eq!(epoch_ms(UNIX_EPOCH - Duration::from_secs(1)), None);
    }
}
