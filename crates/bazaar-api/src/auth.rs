use std::sync::Arc;

use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};

use bazaar_db::Database;
use bazaar_types::api::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    /// Prefix prepended to stored image references on the way out,
    /// e.g. "/media/".
    pub media_url: String,
}

/// POST /api/users — registration. Returns a bearer token so a fresh
/// account is immediately usable.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_username(&req.username)?;
    validate_password(&req.password)?;
    if let Some(email) = &req.email
        && !email.contains('@')
    {
        return Err(ApiError::Validation("email is not valid.".into()));
    }

    if state.db.get_user_by_username(&req.username)?.is_some() {
        return Err(ApiError::Conflict("Username already exists.".into()));
    }

    let password_hash = hash_password(&req.password)?;

    // The existence check above can race a concurrent registration; the
    // UNIQUE constraint is the authority.
    let user_id = match state.db.create_user(&bazaar_db::models::NewUser {
        username: &req.username,
        password_hash: &password_hash,
        location: req.location.as_deref(),
        email: req.email.as_deref(),
        image: req.image.as_deref(),
    }) {
        Ok(id) => id,
        Err(e) if bazaar_db::is_unique_violation(&e) => {
            return Err(ApiError::Conflict("Username already exists.".into()));
        }
        Err(e) => return Err(e.into()),
    };

    let token = create_token(&state.jwt_secret, user_id, &req.username)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { user_id, token }),
    ))
}

/// POST /api/token — login.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .get_user_by_username(&req.username)?
        .ok_or(ApiError::Unauthorized)?;

    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| ApiError::Internal(anyhow!("stored hash unreadable: {e}")))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let token = create_token(&state.jwt_secret, user.id, &user.username)?;

    Ok(Json(LoginResponse {
        user_id: user.id,
        username: user.username,
        token,
    }))
}

/// Bounds count characters, not bytes, so multibyte usernames are not
/// penalized.
pub(crate) fn validate_username(username: &str) -> Result<(), ApiError> {
    let chars = username.chars().count();
    if !(3..=50).contains(&chars) {
        return Err(ApiError::Validation(
            "username must be 3-50 characters.".into(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < 8 {
        return Err(ApiError::Validation(
            "password must be at least 8 characters.".into(),
        ));
    }
    Ok(())
}

pub(crate) fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(anyhow!("password hash failed: {e}")))
}

fn create_token(secret: &str, user_id: i64, username: &str) -> anyhow::Result<String> {
    let claims = bazaar_types::api::Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
