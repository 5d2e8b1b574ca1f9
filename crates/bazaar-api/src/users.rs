use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use bazaar_db::models::UserRow;
use bazaar_types::api::UserPatch;
use bazaar_types::models::User;

use crate::auth::{AppState, hash_password, validate_password, validate_username};
use crate::error::ApiError;
use crate::extract::Auth;
use crate::listings::parse_patch_body;
use crate::parse_created_at;

/// GET /api/users — public; the password hash never leaves the DB layer.
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = state.db.list_users()?;
    let users: Vec<User> = rows
        .into_iter()
        .map(|row| to_user(row, &state.media_url))
        .collect();
    Ok(Json(users))
}

/// GET /api/users/{id} — public.
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .get_user_by_id(user_id)?
        .ok_or(ApiError::NotFound("User with that id not found."))?;
    Ok(Json(to_user(row, &state.media_url)))
}

/// PATCH /api/users/{id} — account owner only. A username change
/// re-checks uniqueness; a password change is re-hashed before it ever
/// reaches the store.
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Auth(claims): Auth,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    if state.db.get_user_by_id(user_id)?.is_none() {
        return Err(ApiError::NotFound("User with that id not found."));
    }
    if claims.sub != user_id {
        return Err(ApiError::Forbidden);
    }

    let mut patch = parse_patch_body::<UserPatch>(body)?;

    if let Some(username) = &patch.username {
        validate_username(username)?;
        // Keeping your own username is not a collision
        if let Some(other) = state.db.get_user_by_username(username)?
            && other.id != user_id
        {
            return Err(ApiError::Conflict("Username is already taken.".into()));
        }
    }
    if let Some(email) = &patch.email
        && !email.contains('@')
    {
        return Err(ApiError::Validation("email is not valid.".into()));
    }
    if let Some(password) = &patch.password {
        validate_password(password)?;
        patch.password = Some(hash_password(password)?);
    }

    // The uniqueness check above can race a concurrent rename; the UNIQUE
    // constraint is the authority.
    if let Err(e) = state.db.partial_update_user(user_id, &patch) {
        if bazaar_db::is_unique_violation(&e) {
            return Err(ApiError::Conflict("Username is already taken.".into()));
        }
        return Err(e.into());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/users/{id} — account owner only.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Auth(claims): Auth,
) -> Result<impl IntoResponse, ApiError> {
    if state.db.get_user_by_id(user_id)?.is_none() {
        return Err(ApiError::NotFound("User with that id not found."));
    }
    if claims.sub != user_id {
        return Err(ApiError::Forbidden);
    }

    state.db.delete_user(user_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/users/{id}/block — gates future messages from the blocked
/// user; idempotent.
pub async fn block_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Auth(claims): Auth,
) -> Result<impl IntoResponse, ApiError> {
    if user_id == claims.sub {
        return Err(ApiError::Validation("You cannot block yourself.".into()));
    }
    if state.db.get_user_by_id(user_id)?.is_none() {
        return Err(ApiError::NotFound("User with that id not found."));
    }

    state.db.block_user(claims.sub, user_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/users/{id}/unblock
pub async fn unblock_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Auth(claims): Auth,
) -> Result<impl IntoResponse, ApiError> {
    if state.db.get_user_by_id(user_id)?.is_none() {
        return Err(ApiError::NotFound("User with that id not found."));
    }

    state.db.unblock_user(claims.sub, user_id)?;
    Ok(StatusCode::NO_CONTENT)
}

fn to_user(row: UserRow, media_url: &str) -> User {
    User {
        id: row.id,
        username: row.username,
        location: row.location,
        email: row.email,
        image: row.image.map(|image| format!("{media_url}{image}")),
        created_at: parse_created_at(&row.created_at, "user", row.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_patch_cannot_express_id() {
        let patch: UserPatch = parse_patch_body(serde_json::json!({
            "id": 99,
            "location": "Lisbon",
        }))
        .unwrap();
        assert_eq!(patch.location.as_deref(), Some("Lisbon"));
        assert!(patch.username.is_none());
    }

    #[test]
    fn avatar_reference_is_rewritten() {
        let row = UserRow {
            id: 3,
            username: "alice".into(),
            password: "hash".into(),
            location: None,
            email: None,
            image: Some("alice.png".into()),
            created_at: "2024-05-01 12:00:00".into(),
        };
        let user = to_user(row, "/media/");
        assert_eq!(user.image.as_deref(), Some("/media/alice.png"));
    }
}
