use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};

use bazaar_types::api::ListingPatch;

use crate::Database;
use crate::filter::{ListingFilter, SortSpec};
use crate::models::{ListingRow, NewListing};
use crate::queries::OptionalExt;

/// Base projection: one row per listing with the tag relation flattened
/// into a comma-joined string. The GROUP BY keeps the LEFT JOIN from
/// duplicating listings that carry several tags.
const LISTING_SELECT: &str = "\
SELECT l.id, l.title, l.condition, l.description, l.price, l.image, \
l.likes, l.dislikes, l.author_id, l.created_at, GROUP_CONCAT(t.name) AS tags \
FROM listings l \
LEFT JOIN listing_tags lt ON l.id = lt.listing_id \
LEFT JOIN tags t ON lt.tag_id = t.id";

impl Database {
    /// Filtered, searched, ordered listing retrieval. Filters and ordering
    /// arrive pre-validated as typed values; only their bound parameters
    /// reach SQLite.
    pub fn list_listings(
        &self,
        filters: &[ListingFilter],
        search: Option<&str>,
        sort: Option<SortSpec>,
    ) -> Result<Vec<ListingRow>> {
        let mut sql = format!("{LISTING_SELECT} WHERE 1=1");
        let mut bind: Vec<Value> = Vec::new();

        for filter in filters {
            sql.push_str(" AND ");
            sql.push_str(filter.clause());
            bind.push(filter.value());
        }

        if let Some(term) = search {
            sql.push_str(" AND (l.title LIKE ? OR l.description LIKE ? OR t.name LIKE ?)");
            let pattern = format!("%{term}%");
            bind.push(Value::Text(pattern.clone()));
            bind.push(Value::Text(pattern.clone()));
            bind.push(Value::Text(pattern));
        }

        sql.push_str(" GROUP BY l.id");

        match sort {
            Some(spec) => sql.push_str(&spec.sql()),
            None => sql.push_str(" ORDER BY l.id ASC"),
        }

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(bind.iter()), listing_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_listing_by_id(&self, listing_id: i64) -> Result<Option<ListingRow>> {
        let sql = format!("{LISTING_SELECT} WHERE l.id = ?1 GROUP BY l.id");

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_row([listing_id], listing_from_row).optional()
        })
    }

    /// Inserts the listing and resolves its tags in one transaction, so a
    /// failure partway never leaves an orphaned listing or dangling join
    /// rows. Returns the new listing id.
    pub fn create_listing(&self, data: &NewListing<'_>, author_id: i64) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            // Likes and dislikes default to 0, created_at to now
            tx.execute(
                "INSERT INTO listings (title, condition, description, price, image, author_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    data.title,
                    data.condition,
                    data.description,
                    data.price,
                    data.image,
                    author_id
                ],
            )?;
            let listing_id = tx.last_insert_rowid();

            attach_tags(&tx, listing_id, data.tags)?;

            tx.commit()?;
            Ok(listing_id)
        })
    }

    /// Applies a partial update. Column names come from the fixed set of
    /// mutable listing fields — the patch type cannot express `id`,
    /// `likes`, `dislikes`, `author_id` or `created_at`. An empty patch
    /// performs no store writes and succeeds. A `tags` entry replaces the
    /// join rows wholesale, in the same transaction as the column update.
    pub fn partial_update_listing(&self, listing_id: i64, patch: &ListingPatch) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let mut sets: Vec<&'static str> = Vec::new();
            let mut bind: Vec<Value> = Vec::new();

            if let Some(title) = &patch.title {
                sets.push("title = ?");
                bind.push(Value::Text(title.clone()));
            }
            if let Some(condition) = patch.condition {
                sets.push("condition = ?");
                bind.push(Value::Text(condition.as_str().to_string()));
            }
            if let Some(description) = &patch.description {
                sets.push("description = ?");
                bind.push(Value::Text(description.clone()));
            }
            if let Some(price) = patch.price {
                sets.push("price = ?");
                bind.push(Value::Real(price));
            }
            if let Some(image) = &patch.image {
                sets.push("image = ?");
                bind.push(Value::Text(image.clone()));
            }

            if !sets.is_empty() {
                let sql = format!("UPDATE listings SET {} WHERE id = ?", sets.join(", "));
                bind.push(Value::Integer(listing_id));
                tx.execute(&sql, params_from_iter(bind.iter()))?;
            }

            if let Some(tags) = &patch.tags {
                // Full replace, not a diff: drop every join row, reinsert.
                tx.execute(
                    "DELETE FROM listing_tags WHERE listing_id = ?1",
                    [listing_id],
                )?;
                attach_tags(&tx, listing_id, tags)?;
            }

            tx.commit()?;
            Ok(())
        })
    }

    /// Returns false when no listing had that id.
    pub fn delete_listing(&self, listing_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM listings WHERE id = ?1", [listing_id])?;
            Ok(affected > 0)
        })
    }

    /// Atomic counter bump; no read step, so concurrent likes cannot lose
    /// updates. Returns false when no listing had that id.
    pub fn like_listing(&self, listing_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE listings SET likes = likes + 1 WHERE id = ?1",
                [listing_id],
            )?;
            Ok(affected > 0)
        })
    }

    pub fn dislike_listing(&self, listing_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE listings SET dislikes = dislikes + 1 WHERE id = ?1",
                [listing_id],
            )?;
            Ok(affected > 0)
        })
    }

    // -- Favorites --

    /// Idempotent: favoriting an already-favorited listing is a no-op.
    pub fn add_favorite(&self, user_id: i64, listing_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO favorites (user_id, listing_id) VALUES (?1, ?2)",
                params![user_id, listing_id],
            )?;
            Ok(())
        })
    }

    pub fn remove_favorite(&self, user_id: i64, listing_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM favorites WHERE user_id = ?1 AND listing_id = ?2",
                params![user_id, listing_id],
            )?;
            Ok(affected > 0)
        })
    }

    pub fn favorite_listings(&self, user_id: i64) -> Result<Vec<ListingRow>> {
        let sql = "\
SELECT l.id, l.title, l.condition, l.description, l.price, l.image, \
l.likes, l.dislikes, l.author_id, l.created_at, GROUP_CONCAT(t.name) AS tags \
FROM favorites f \
INNER JOIN listings l ON f.listing_id = l.id \
LEFT JOIN listing_tags lt ON l.id = lt.listing_id \
LEFT JOIN tags t ON lt.tag_id = t.id \
WHERE f.user_id = ?1 \
GROUP BY l.id \
ORDER BY l.id ASC";

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map([user_id], listing_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

/// Insert-if-absent per tag, then link it. Duplicate tag names are never
/// an error; a listing referencing the same tag twice collapses to one
/// join row.
fn attach_tags(conn: &Connection, listing_id: i64, tags: &[String]) -> Result<()> {
    for tag in tags {
        conn.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", [tag])?;
        let tag_id: i64 = conn.query_row("SELECT id FROM tags WHERE name = ?1", [tag], |row| {
            row.get(0)
        })?;
        conn.execute(
            "INSERT OR IGNORE INTO listing_tags (listing_id, tag_id) VALUES (?1, ?2)",
            params![listing_id, tag_id],
        )?;
    }
    Ok(())
}

fn listing_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ListingRow> {
    let tags: Option<String> = row.get(10)?;
    Ok(ListingRow {
        id: row.get(0)?,
        title: row.get(1)?,
        condition: row.get(2)?,
        description: row.get(3)?,
        price: row.get(4)?,
        image: row.get(5)?,
        likes: row.get(6)?,
        dislikes: row.get(7)?,
        author_id: row.get(8)?,
        created_at: row.get(9)?,
        tags: tags
            .map(|joined| joined.split(',').map(str::to_string).collect())
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;

    fn sorted(mut tags: Vec<String>) -> Vec<String> {
        tags.sort();
        tags
    }

    #[test]
    fn create_then_fetch_round_trips() {
        let db = fixtures::db();
        let author = fixtures::user(&db, "seller");

        let id = db
            .create_listing(
                &NewListing {
                    title: "Chair",
                    condition: "Fair",
                    description: "a chair",
                    price: 50.0,
                    image: "chair.jpg",
                    tags: &["furniture".to_string()],
                },
                author,
            )
            .unwrap();

        let listing = db.get_listing_by_id(id).unwrap().unwrap();
        assert_eq!(listing.title, "Chair");
        assert_eq!(listing.condition, "Fair");
        assert_eq!(listing.price, 50.0);
        assert_eq!(listing.author_id, author);
        assert_eq!(listing.likes, 0);
        assert_eq!(listing.dislikes, 0);
        assert_eq!(listing.tags, vec!["furniture".to_string()]);

        // Partial price update leaves everything else untouched
        db.partial_update_listing(
            id,
            &ListingPatch {
                price: Some(40.0),
                ..Default::default()
            },
        )
        .unwrap();

        let updated = db.get_listing_by_id(id).unwrap().unwrap();
        assert_eq!(updated.price, 40.0);
        assert_eq!(updated.tags, vec!["furniture".to_string()]);
        assert_eq!(updated.likes, 0);
        assert_eq!(updated.title, "Chair");
    }

    #[test]
    fn missing_listing_is_none() {
        let db = fixtures::db();
        assert!(db.get_listing_by_id(42).unwrap().is_none());
    }

    #[test]
    fn listing_without_tags_has_empty_vec() {
        let db = fixtures::db();
        let author = fixtures::user(&db, "seller");
        let id = fixtures::listing(&db, author, "Bare", 5.0, &[]);

        let listing = db.get_listing_by_id(id).unwrap().unwrap();
        assert!(listing.tags.is_empty());
    }

    #[test]
    fn shared_tag_is_not_duplicated() {
        let db = fixtures::db();
        let author = fixtures::user(&db, "seller");
        fixtures::listing(&db, author, "First", 1.0, &["x", "y"]);
        let second = fixtures::listing(&db, author, "Second", 2.0, &["x"]);

        let tag_count: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM tags WHERE name = 'x'",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(tag_count, 1);

        let listing = db.get_listing_by_id(second).unwrap().unwrap();
        assert_eq!(listing.tags, vec!["x".to_string()]);
    }

    #[test]
    fn tag_replace_leaves_no_stale_tags() {
        let db = fixtures::db();
        let author = fixtures::user(&db, "seller");
        let id = fixtures::listing(&db, author, "Tagged", 1.0, &["old", "stale"]);

        db.partial_update_listing(
            id,
            &ListingPatch {
                tags: Some(vec!["a".to_string(), "b".to_string()]),
                ..Default::default()
            },
        )
        .unwrap();

        let listing = db.get_listing_by_id(id).unwrap().unwrap();
        assert_eq!(sorted(listing.tags), vec!["a".to_string(), "b".to_string()]);

        // The old tag names survive in the shared vocabulary
        let vocab: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(vocab, 4);
    }

    #[test]
    fn empty_patch_is_a_no_op() {
        let db = fixtures::db();
        let author = fixtures::user(&db, "seller");
        let id = fixtures::listing(&db, author, "Static", 9.0, &["t"]);

        db.partial_update_listing(id, &ListingPatch::default())
            .unwrap();

        let listing = db.get_listing_by_id(id).unwrap().unwrap();
        assert_eq!(listing.title, "Static");
        assert_eq!(listing.price, 9.0);
        assert_eq!(listing.tags, vec!["t".to_string()]);
    }

    #[test]
    fn price_bounds_filter_inclusively() {
        let db = fixtures::db();
        let author = fixtures::user(&db, "seller");
        fixtures::listing(&db, author, "Cheap", 50.0, &[]);
        fixtures::listing(&db, author, "Mid", 100.0, &[]);
        fixtures::listing(&db, author, "Dear", 150.0, &[]);

        let at_least = db
            .list_listings(&[ListingFilter::MinPrice(100.0)], None, None)
            .unwrap();
        assert!(at_least.iter().all(|l| l.price >= 100.0));
        assert_eq!(at_least.len(), 2);

        let at_most = db
            .list_listings(&[ListingFilter::MaxPrice(100.0)], None, None)
            .unwrap();
        assert!(at_most.iter().all(|l| l.price <= 100.0));
        assert_eq!(at_most.len(), 2);
    }

    #[test]
    fn author_filter_is_exact() {
        let db = fixtures::db();
        let alice = fixtures::user(&db, "alice");
        let bob = fixtures::user(&db, "bob");
        fixtures::listing(&db, alice, "Hers", 1.0, &[]);
        fixtures::listing(&db, bob, "His", 2.0, &[]);

        let rows = db
            .list_listings(&[ListingFilter::AuthorId(alice)], None, None)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Hers");
    }

    #[test]
    fn descending_price_sort_is_non_increasing() {
        let db = fixtures::db();
        let author = fixtures::user(&db, "seller");
        fixtures::listing(&db, author, "A", 10.0, &[]);
        fixtures::listing(&db, author, "B", 30.0, &[]);
        fixtures::listing(&db, author, "C", 20.0, &[]);
        fixtures::listing(&db, author, "D", 30.0, &[]);

        let rows = db
            .list_listings(&[], None, Some("-price".parse().unwrap()))
            .unwrap();
        let prices: Vec<f64> = rows.iter().map(|l| l.price).collect();
        assert!(prices.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(rows.len(), 4);
    }

    #[test]
    fn search_matches_title_description_and_tags() {
        let db = fixtures::db();
        let author = fixtures::user(&db, "seller");
        fixtures::listing(&db, author, "Old book", 1.0, &[]);
        let by_desc = db
            .create_listing(
                &NewListing {
                    title: "Box",
                    condition: "Fair",
                    description: "full of books",
                    price: 2.0,
                    image: "box.jpg",
                    tags: &[],
                },
                author,
            )
            .unwrap();
        fixtures::listing(&db, author, "Shelf", 3.0, &["bookcase"]);
        fixtures::listing(&db, author, "Lamp", 4.0, &[]);

        let rows = db.list_listings(&[], Some("BOOK"), None).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().any(|l| l.id == by_desc));
        assert!(rows.iter().all(|l| l.title != "Lamp"));
    }

    #[test]
    fn search_with_no_match_is_empty_not_an_error() {
        let db = fixtures::db();
        let author = fixtures::user(&db, "seller");
        fixtures::listing(&db, author, "Lamp", 4.0, &[]);

        let rows = db.list_listings(&[], Some("zeppelin"), None).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn like_increments_by_exactly_one() {
        let db = fixtures::db();
        let author = fixtures::user(&db, "seller");
        let id = fixtures::listing(&db, author, "Liked", 1.0, &[]);

        assert!(db.like_listing(id).unwrap());
        assert!(db.like_listing(id).unwrap());
        assert!(db.dislike_listing(id).unwrap());

        let listing = db.get_listing_by_id(id).unwrap().unwrap();
        assert_eq!(listing.likes, 2);
        assert_eq!(listing.dislikes, 1);
    }

    #[test]
    fn like_of_missing_or_deleted_listing_reports_not_found() {
        let db = fixtures::db();
        let author = fixtures::user(&db, "seller");
        assert!(!db.like_listing(404).unwrap());

        let id = fixtures::listing(&db, author, "Gone", 1.0, &[]);
        assert!(db.delete_listing(id).unwrap());
        assert!(!db.like_listing(id).unwrap());
    }

    #[test]
    fn delete_removes_listing_and_join_rows() {
        let db = fixtures::db();
        let author = fixtures::user(&db, "seller");
        let id = fixtures::listing(&db, author, "Doomed", 1.0, &["t1", "t2"]);

        assert!(db.delete_listing(id).unwrap());
        assert!(db.get_listing_by_id(id).unwrap().is_none());

        let joins: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM listing_tags WHERE listing_id = ?1",
                    [id],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(joins, 0);
        assert!(!db.delete_listing(id).unwrap());
    }

    #[test]
    fn favoriting_is_idempotent() {
        let db = fixtures::db();
        let seller = fixtures::user(&db, "seller");
        let fan = fixtures::user(&db, "fan");
        let id = fixtures::listing(&db, seller, "Wanted", 1.0, &["rare"]);

        db.add_favorite(fan, id).unwrap();
        db.add_favorite(fan, id).unwrap();

        let favorites = db.favorite_listings(fan).unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].id, id);
        assert_eq!(favorites[0].tags, vec!["rare".to_string()]);

        assert!(db.remove_favorite(fan, id).unwrap());
        assert!(!db.remove_favorite(fan, id).unwrap());
        assert!(db.favorite_listings(fan).unwrap().is_empty());
    }
}
