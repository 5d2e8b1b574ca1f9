pub mod auth;
pub mod error;
pub mod extract;
pub mod listings;
pub mod messages;
pub mod pagination;
pub mod users;

use chrono::{DateTime, Utc};
use tracing::warn;

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Parse as naive UTC and convert; a corrupt value is logged and replaced
/// with the epoch rather than failing the whole response.
pub(crate) fn parse_created_at(raw: &str, what: &str, id: i64) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on {} {}: {}", raw, what, id, e);
            DateTime::default()
        })
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use bazaar_db::Database;
    use bazaar_db::models::NewUser;
    use bazaar_types::api::Claims;

    use crate::auth::{AppState, AppStateInner};

    pub fn state() -> AppState {
        Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            jwt_secret: "test-secret".into(),
            media_url: "/media/".into(),
        })
    }

    pub fn user(state: &AppState, name: &str) -> i64 {
        state
            .db
            .create_user(&NewUser {
                username: name,
                password_hash: "$argon2id$fake",
                location: None,
                email: None,
                image: None,
            })
            .unwrap()
    }

    pub fn claims(user_id: i64, name: &str) -> Claims {
        Claims {
            sub: user_id,
            username: name.to_string(),
            exp: usize::MAX,
        }
    }
}
