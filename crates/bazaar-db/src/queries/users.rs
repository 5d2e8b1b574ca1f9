use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};

use bazaar_types::api::UserPatch;

use crate::Database;
use crate::models::{NewUser, UserRow};
use crate::queries::OptionalExt;

const USER_SELECT: &str =
    "SELECT id, username, password, location, email, image, created_at FROM users";

impl Database {
    pub fn create_user(&self, data: &NewUser<'_>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, password, location, email, image)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    data.username,
                    data.password_hash,
                    data.location,
                    data.email,
                    data.image
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_id(&self, user_id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{USER_SELECT} WHERE id = ?1"))?;
            stmt.query_row([user_id], user_from_row).optional()
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{USER_SELECT} WHERE username = ?1"))?;
            stmt.query_row([username], user_from_row).optional()
        })
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{USER_SELECT} ORDER BY id ASC"))?;
            let rows = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Partial account update. The patch type cannot express `id`; the
    /// password, when present, is already hashed by the caller. An empty
    /// patch performs no store writes.
    pub fn partial_update_user(&self, user_id: i64, patch: &UserPatch) -> Result<()> {
        let mut sets: Vec<&'static str> = Vec::new();
        let mut bind: Vec<Value> = Vec::new();

        if let Some(username) = &patch.username {
            sets.push("username = ?");
            bind.push(Value::Text(username.clone()));
        }
        if let Some(password) = &patch.password {
            sets.push("password = ?");
            bind.push(Value::Text(password.clone()));
        }
        if let Some(location) = &patch.location {
            sets.push("location = ?");
            bind.push(Value::Text(location.clone()));
        }
        if let Some(email) = &patch.email {
            sets.push("email = ?");
            bind.push(Value::Text(email.clone()));
        }
        if let Some(image) = &patch.image {
            sets.push("image = ?");
            bind.push(Value::Text(image.clone()));
        }

        if sets.is_empty() {
            return Ok(());
        }

        let sql = format!("UPDATE users SET {} WHERE id = ?", sets.join(", "));
        bind.push(Value::Integer(user_id));

        self.with_conn(|conn| {
            conn.execute(&sql, params_from_iter(bind.iter()))?;
            Ok(())
        })
    }

    /// Returns false when no user had that id.
    pub fn delete_user(&self, user_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM users WHERE id = ?1", [user_id])?;
            Ok(affected > 0)
        })
    }
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        location: row.get(3)?,
        email: row.get(4)?,
        image: row.get(5)?,
        created_at: row.get(6)?,
    })
}
