use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use jsonwebtoken::{DecodingKey, Validation, decode};

use bazaar_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiError;

/// Authenticated caller identity, extracted and validated from the
/// `Authorization: Bearer` header. Handlers that take `Auth` reject
/// unauthenticated requests with 401 before their body runs; handlers
/// without it stay public.
pub struct Auth(pub Claims);

impl FromRequestParts<AppState> for Auth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized)?;

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| ApiError::Unauthorized)?;

        Ok(Auth(token_data.claims))
    }
}
