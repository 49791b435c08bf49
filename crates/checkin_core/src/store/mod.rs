//! Attendance storage contracts and implementations.
//!
//! # Responsibility
//! - Define the injected store the ledger writes through.
//! - Provide an in-memory store and a shared SQLite store.
//! - Serialize the ledger as a JSON snapshot and union snapshots on load.
//!
//! # Invariants
//! - `record_if_absent` is atomic: for one `(event, member)` pair exactly one
//!   caller ever observes `true`, under any interleaving.
//! - Per-event member order is arrival order.
//! - Merging a snapshot only adds pairs; it never removes or reorders.

mod memory;
mod snapshot;
mod sqlite;

pub use memory::InMemoryAttendanceStore;
pub use snapshot::{
    load_snapshot, load_snapshot_if_exists, save_snapshot, save_snapshot_merged, LedgerSnapshot,
};
pub use sqlite::SqliteAttendanceStore;

use crate::db::DbError;
use crate::model::event::EventId;
use crate::model::member::MemberId;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage-layer failure.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Snapshot(serde_json::Error),
    /// Remote backing store temporarily unreachable.
    Unavailable(String),
}

impl StoreError {
    /// Returns whether a bounded retry may succeed.
    ///
    /// Lock contention and unavailability are transient; everything else is
    /// permanent and surfaces immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Db(err) => err.is_busy(),
            Self::Unavailable(_) => true,
            Self::Io { .. } | Self::Snapshot(_) => false,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Io { path, source } => {
                write!(f, "snapshot io failed at `{}`: {source}", path.display())
            }
            Self::Snapshot(err) => write!(f, "invalid ledger snapshot: {err}"),
            Self::Unavailable(message) => write!(f, "attendance store unavailable: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Snapshot(err) => Some(err),
            Self::Unavailable(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Snapshot(value)
    }
}

/// Backing store for the attendance ledger.
///
/// Implementations are injected into the ledger; nothing in core reaches a
/// store through global state.
pub trait AttendanceStore {
    /// Members checked into `event_id`, in arrival order.
    fn get(&self, event_id: EventId) -> StoreResult<Vec<MemberId>>;

    /// Atomically inserts the pair when absent.
    ///
    /// Returns `true` when this call inserted the pair, `false` when it was
    /// already present.
    fn record_if_absent(&self, event_id: EventId, member_id: &str) -> StoreResult<bool>;

    /// Full copy of the current ledger.
    fn snapshot(&self) -> StoreResult<LedgerSnapshot>;

    /// Unions `snapshot` into the store. Returns the number of new pairs.
    fn merge_snapshot(&self, snapshot: &LedgerSnapshot) -> StoreResult<usize>;

    fn contains(&self, event_id: EventId, member_id: &str) -> StoreResult<bool> {
        Ok(self
            .get(event_id)?
            .iter()
            .any(|member| member == member_id))
    }

    fn count(&self, event_id: EventId) -> StoreResult<usize> {
        Ok(self.get(event_id)?.len())
    }
}

impl<T: AttendanceStore + ?Sized> AttendanceStore for &T {
    fn get(&self, event_id: EventId) -> StoreResult<Vec<MemberId>> {
        (**self).get(event_id)
    }

    fn record_if_absent(&self, event_id: EventId, member_id: &str) -> StoreResult<bool> {
        (**self).record_if_absent(event_id, member_id)
    }

    fn snapshot(&self) -> StoreResult<LedgerSnapshot> {
        (**self).snapshot()
    }

    fn merge_snapshot(&self, snapshot: &LedgerSnapshot) -> StoreResult<usize> {
        (**self).merge_snapshot(snapshot)
    }

    fn contains(&self, event_id: EventId, member_id: &str) -> StoreResult<bool> {
        (**self).contains(event_id, member_id)
    }

    fn count(&self, event_id: EventId) -> StoreResult<usize> {
        (**self).count(event_id)
    }
}

impl<T: AttendanceStore + ?Sized> AttendanceStore for Arc<T> {
    fn get(&self, event_id: EventId) -> StoreResult<Vec<MemberId>> {
        (**self).get(event_id)
    }

    fn record_if_absent(&self, event_id: EventId, member_id: &str) -> StoreResult<bool> {
        (**self).record_if_absent(event_id, member_id)
    }

    fn snapshot(&self) -> StoreResult<LedgerSnapshot> {
        (**self).snapshot()
    }

    fn merge_snapshot(&self, snapshot: &LedgerSnapshot) -> StoreResult<usize> {
        (**self).merge_snapshot(snapshot)
    }

    fn contains(&self, event_id: EventId, member_id: &str) -> StoreResult<bool> {
        (**self).contains(event_id, member_id)
    }

    fn count(&self, event_id: EventId) -> StoreResult<usize> {
        (**self).count(event_id)
    }
}
