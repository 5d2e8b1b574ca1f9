use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Item condition vocabulary. Stored in SQLite as the display string, so
/// the wire form and the column value are identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    #[serde(rename = "Factory New")]
    FactoryNew,
    #[serde(rename = "Minimal Wear")]
    MinimalWear,
    Fair,
    #[serde(rename = "Well Worn")]
    WellWorn,
    Refurbished,
}

impl Condition {
    pub fn as_str(self) -> &'static str {
        match self {
            Condition::FactoryNew => "Factory New",
            Condition::MinimalWear => "Minimal Wear",
            Condition::Fair => "Fair",
            Condition::WellWorn => "Well Worn",
            Condition::Refurbished => "Refurbished",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Factory New" => Some(Condition::FactoryNew),
            "Minimal Wear" => Some(Condition::MinimalWear),
            "Fair" => Some(Condition::Fair),
            "Well Worn" => Some(Condition::WellWorn),
            "Refurbished" => Some(Condition::Refurbished),
            _ => None,
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public view of a user account. The password hash never leaves the
/// database layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub location: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A marketplace item posting owned by exactly one user. `likes` and
/// `dislikes` are server-controlled counters; `tags` is a shared label
/// vocabulary attached through a many-to-many relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: i64,
    pub title: String,
    pub condition: Condition,
    pub description: String,
    pub price: f64,
    pub image: String,
    pub likes: i64,
    pub dislikes: i64,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub author_id: i64,
}

/// A direct message. Created by the sender, deletable only by the
/// receiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
