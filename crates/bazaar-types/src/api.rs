use serde::{Deserialize, Serialize};

use crate::models::Condition;

// -- JWT Claims --

/// JWT claims shared between token issuance (auth handlers) and the
/// bearer-token extractor. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: i64,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: i64,
    pub username: String,
    pub token: String,
}

// -- Listings --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateListingRequest {
    pub title: String,
    pub condition: Condition,
    pub description: String,
    pub price: f64,
    pub image: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial-update payload for a listing. Only mutable columns are
/// representable here: `id`, `likes`, `dislikes`, `author_id` and
/// `created_at` have no field, so a client key naming them is stripped
/// during deserialization rather than applied.
#[derive(Debug, Default, Deserialize)]
pub struct ListingPatch {
    pub title: Option<String>,
    pub condition: Option<Condition>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub image: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl ListingPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.condition.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.image.is_none()
            && self.tags.is_none()
    }
}

/// Partial-update payload for a user account. `id` is not representable.
#[derive(Debug, Default, Deserialize)]
pub struct UserPatch {
    pub username: Option<String>,
    pub password: Option<String>,
    pub location: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.password.is_none()
            && self.location.is_none()
            && self.email.is_none()
            && self.image.is_none()
    }
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub receiver_id: i64,
    pub content: String,
}

// -- Pagination --

/// One page of results plus navigation links.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}
