//! SQLite-backed attendance store.
//!
//! Concurrent scanner instances each hold their own connection to the same
//! database file. Uniqueness of `(event_id, member_id)` is enforced by the
//! schema, so "granted" is decided by whether the insert changed a row.

use super::{AttendanceStore, LedgerSnapshot, StoreResult};
use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::event::EventId;
use crate::model::member::MemberId;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};

const INSERT_IF_ABSENT_SQL: &str = "INSERT INTO attendance (event_id, member_id)
     VALUES (?1, ?2)
     ON CONFLICT (event_id, member_id) DO NOTHING;";

/// Attendance store over a migrated SQLite connection.
pub struct SqliteAttendanceStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAttendanceStore<'conn> {
    /// Wraps a connection returned by [`crate::db::open_db`].
    ///
    /// # Errors
    /// - `UnsupportedSchemaVersion` when the connection's schema does not match
    ///   this binary (for example a raw, unmigrated connection).
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
        if version != latest_version() {
            return Err(DbError::UnsupportedSchemaVersion {
                db_version: version,
                latest_supported: latest_version(),
            }
            .into());
        }
        Ok(Self { conn })
    }
}

impl AttendanceStore for SqliteAttendanceStore<'_> {
    fn get(&self, event_id: EventId) -> StoreResult<Vec<MemberId>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT member_id FROM attendance
             WHERE event_id = ?1
             ORDER BY seq ASC;",
        )?;
        let members = stmt
            .query_map([event_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(members)
    }

    fn record_if_absent(&self, event_id: EventId, member_id: &str) -> StoreResult<bool> {
        let changed = self
            .conn
            .execute(INSERT_IF_ABSENT_SQL, params![event_id, member_id])?;
        Ok(changed == 1)
    }

    fn snapshot(&self) -> StoreResult<LedgerSnapshot> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT event_id, member_id FROM attendance
             ORDER BY event_id ASC, seq ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut snapshot = LedgerSnapshot::new();
        while let Some(row) = rows.next()? {
            let event_id: EventId = row.get(0)?;
            let member_id: String = row.get(1)?;
            snapshot.insert(event_id, member_id);
        }
        Ok(snapshot)
    }

    fn merge_snapshot(&self, snapshot: &LedgerSnapshot) -> StoreResult<usize> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut added = 0;
        {
            let mut stmt = tx.prepare_cached(INSERT_IF_ABSENT_SQL)?;
            for (event_id, members) in snapshot.iter() {
                for member_id in members {
                    added += stmt.execute(params![event_id, member_id])?;
                }
            }
        }
        tx.commit()?;
        Ok(added)
    }

    fn contains(&self, event_id: EventId, member_id: &str) -> StoreResult<bool> {
        let present = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM attendance WHERE event_id = ?1 AND member_id = ?2
             );",
            params![event_id, member_id],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(present == 1)
    }

    fn count(&self, event_id: EventId) -> StoreResult<usize> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM attendance WHERE event_id = ?1;",
            [event_id],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
