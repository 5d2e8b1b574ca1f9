//! Database row types mapping directly to SQLite rows. Distinct from
//! the bazaar-types API models to keep the DB layer independent;
//! timestamps stay as the raw TEXT SQLite produced.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub location: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
    pub created_at: String,
}

/// One listing with its tag relation already folded back into a list.
pub struct ListingRow {
    pub id: i64,
    pub title: String,
    pub condition: String,
    pub description: String,
    pub price: f64,
    pub image: String,
    pub likes: i64,
    pub dislikes: i64,
    pub author_id: i64,
    pub created_at: String,
    pub tags: Vec<String>,
}

pub struct MessageRow {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub created_at: String,
}

/// Insert payload for a new user. The password is already hashed by the
/// caller.
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub location: Option<&'a str>,
    pub email: Option<&'a str>,
    pub image: Option<&'a str>,
}

/// Insert payload for a new listing. Likes and dislikes start at zero and
/// `created_at` is assigned by the store.
pub struct NewListing<'a> {
    pub title: &'a str,
    pub condition: &'a str,
    pub description: &'a str,
    pub price: f64,
    pub image: &'a str,
    pub tags: &'a [String],
}
