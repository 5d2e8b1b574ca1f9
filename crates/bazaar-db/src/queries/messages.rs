use anyhow::Result;
use rusqlite::params;

use crate::Database;
use crate::models::MessageRow;
use crate::queries::OptionalExt;

const MESSAGE_SELECT: &str =
    "SELECT id, sender_id, receiver_id, content, created_at FROM messages";

impl Database {
    pub fn create_message(&self, sender_id: i64, receiver_id: i64, content: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (sender_id, receiver_id, content) VALUES (?1, ?2, ?3)",
                params![sender_id, receiver_id, content],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Receiver-scoped fetch: a message is only visible to its receiver.
    pub fn get_message(&self, message_id: i64, receiver_id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("{MESSAGE_SELECT} WHERE id = ?1 AND receiver_id = ?2"))?;
            stmt.query_row(params![message_id, receiver_id], message_from_row)
                .optional()
        })
    }

    /// All messages received by the user, newest first.
    pub fn messages_for_receiver(&self, receiver_id: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{MESSAGE_SELECT} WHERE receiver_id = ?1 ORDER BY created_at DESC, id DESC"
            ))?;
            let rows = stmt
                .query_map([receiver_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns false when the receiver holds no such message.
    pub fn delete_message(&self, message_id: i64, receiver_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM messages WHERE id = ?1 AND receiver_id = ?2",
                params![message_id, receiver_id],
            )?;
            Ok(affected > 0)
        })
    }
}

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::queries::fixtures;

    #[test]
    fn message_is_scoped_to_its_receiver() {
        let db = fixtures::db();
        let sender = fixtures::user(&db, "sender");
        let receiver = fixtures::user(&db, "receiver");

        let id = db.create_message(sender, receiver, "hello").unwrap();

        let seen = db.get_message(id, receiver).unwrap().unwrap();
        assert_eq!(seen.content, "hello");
        assert_eq!(seen.sender_id, sender);

        // The sender cannot fetch it back through the receiver-scoped path
        assert!(db.get_message(id, sender).unwrap().is_none());
    }

    #[test]
    fn inbox_lists_only_received_messages() {
        let db = fixtures::db();
        let a = fixtures::user(&db, "a");
        let b = fixtures::user(&db, "b");

        db.create_message(a, b, "one").unwrap();
        db.create_message(a, b, "two").unwrap();
        db.create_message(b, a, "reply").unwrap();

        let inbox = db.messages_for_receiver(b).unwrap();
        assert_eq!(inbox.len(), 2);
        assert!(inbox.iter().all(|m| m.receiver_id == b));
        // Newest first
        assert_eq!(inbox[0].content, "two");
    }

    #[test]
    fn delete_requires_receiver() {
        let db = fixtures::db();
        let sender = fixtures::user(&db, "sender");
        let receiver = fixtures::user(&db, "receiver");
        let id = db.create_message(sender, receiver, "bye").unwrap();

        assert!(!db.delete_message(id, sender).unwrap());
        assert!(db.delete_message(id, receiver).unwrap());
        assert!(db.get_message(id, receiver).unwrap().is_none());
    }
}
