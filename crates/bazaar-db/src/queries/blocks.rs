use anyhow::Result;
use rusqlite::params;

use crate::Database;

impl Database {
    /// Idempotent: blocking an already-blocked user is a no-op.
    pub fn block_user(&self, blocker_id: i64, blocked_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO blocks (blocker_id, blocked_id) VALUES (?1, ?2)",
                params![blocker_id, blocked_id],
            )?;
            Ok(())
        })
    }

    pub fn unblock_user(&self, blocker_id: i64, blocked_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM blocks WHERE blocker_id = ?1 AND blocked_id = ?2",
                params![blocker_id, blocked_id],
            )?;
            Ok(affected > 0)
        })
    }

    pub fn is_blocked(&self, blocker_id: i64, blocked_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: i64 = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM blocks WHERE blocker_id = ?1 AND blocked_id = ?2)",
                params![blocker_id, blocked_id],
                |row| row.get(0),
            )?;
            Ok(exists != 0)
        })
    }
}
