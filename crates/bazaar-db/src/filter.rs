//! Typed builders for the listing query surface. Client-supplied strings
//! are parsed into these enums before any SQL is assembled; each variant
//! owns a fixed SQL fragment, so no client string ever becomes a column
//! or table identifier. Values are always bound parameters.

use std::str::FromStr;

use bazaar_types::models::Condition;
use rusqlite::types::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Unknown filter key: {0}")]
    UnknownFilterKey(String),
    #[error("Invalid value for {key}: {value}")]
    InvalidFilterValue { key: String, value: String },
    #[error("Unknown ordering field: {0}")]
    UnknownSortField(String),
}

/// One permitted listing filter.
#[derive(Debug, Clone, PartialEq)]
pub enum ListingFilter {
    MinPrice(f64),
    MaxPrice(f64),
    MinLikes(i64),
    MaxDislikes(i64),
    Condition(Condition),
    AuthorId(i64),
}

impl ListingFilter {
    pub fn from_key_value(key: &str, value: &str) -> Result<Self, QueryError> {
        match key {
            "min_price" => Ok(Self::MinPrice(num(key, value)?)),
            "max_price" => Ok(Self::MaxPrice(num(key, value)?)),
            "min_likes" => Ok(Self::MinLikes(num(key, value)?)),
            "max_dislikes" => Ok(Self::MaxDislikes(num(key, value)?)),
            "condition" => Condition::parse(value).map(Self::Condition).ok_or_else(|| {
                QueryError::InvalidFilterValue {
                    key: key.to_string(),
                    value: value.to_string(),
                }
            }),
            "author_id" => Ok(Self::AuthorId(num(key, value)?)),
            _ => Err(QueryError::UnknownFilterKey(key.to_string())),
        }
    }

    pub(crate) fn clause(&self) -> &'static str {
        match self {
            Self::MinPrice(_) => "l.price >= ?",
            Self::MaxPrice(_) => "l.price <= ?",
            Self::MinLikes(_) => "l.likes >= ?",
            Self::MaxDislikes(_) => "l.dislikes <= ?",
            Self::Condition(_) => "l.condition = ?",
            Self::AuthorId(_) => "l.author_id = ?",
        }
    }

    pub(crate) fn value(&self) -> Value {
        match self {
            Self::MinPrice(v) | Self::MaxPrice(v) => Value::Real(*v),
            Self::MinLikes(v) | Self::MaxDislikes(v) | Self::AuthorId(v) => Value::Integer(*v),
            Self::Condition(c) => Value::Text(c.as_str().to_string()),
        }
    }
}

fn num<T: FromStr>(key: &str, value: &str) -> Result<T, QueryError> {
    value.parse().map_err(|_| QueryError::InvalidFilterValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Allow-list of sortable listing columns. Column names cannot be bind
/// parameters in SQL, so this enum is the injection defense for the one
/// dynamic identifier in the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Title,
    Condition,
    Description,
    Price,
    Likes,
    Dislikes,
    CreatedAt,
}

impl SortKey {
    fn column(self) -> &'static str {
        match self {
            SortKey::Title => "l.title",
            SortKey::Condition => "l.condition",
            SortKey::Description => "l.description",
            SortKey::Price => "l.price",
            SortKey::Likes => "l.likes",
            SortKey::Dislikes => "l.dislikes",
            SortKey::CreatedAt => "l.created_at",
        }
    }
}

/// Ordering directive parsed from the `ordering` query value; a leading
/// `-` selects descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub key: SortKey,
    pub descending: bool,
}

impl FromStr for SortSpec {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (descending, name) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let key = match name.to_ascii_lowercase().as_str() {
            "title" => SortKey::Title,
            "condition" => SortKey::Condition,
            "description" => SortKey::Description,
            "price" => SortKey::Price,
            "likes" => SortKey::Likes,
            "dislikes" => SortKey::Dislikes,
            "created_at" => SortKey::CreatedAt,
            _ => return Err(QueryError::UnknownSortField(s.to_string())),
        };

        Ok(SortSpec { key, descending })
    }
}

impl SortSpec {
    /// The trailing `l.id` keeps ordering deterministic when the sort key
    /// ties, which page-number pagination depends on.
    pub(crate) fn sql(&self) -> String {
        format!(
            " ORDER BY {} {}, l.id ASC",
            self.key.column(),
            if self.descending { "DESC" } else { "ASC" }
        )
    }
}
