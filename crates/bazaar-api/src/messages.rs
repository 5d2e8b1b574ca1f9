use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use bazaar_db::models::MessageRow;
use bazaar_types::api::SendMessageRequest;
use bazaar_types::models::Message;

use crate::auth::AppState;
use crate::error::{ApiError, join_blocking};
use crate::extract::Auth;
use crate::parse_created_at;

const MAX_CONTENT_LEN: usize = 200;

/// POST /api/messages — send to another user. Rejected when the receiver
/// has blocked the sender.
pub async fn send_message(
    State(state): State<AppState>,
    Auth(claims): Auth,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.content.is_empty() || req.content.chars().count() > MAX_CONTENT_LEN {
        return Err(ApiError::Validation(format!(
            "content must be 1-{MAX_CONTENT_LEN} characters."
        )));
    }
    if req.receiver_id == claims.sub {
        return Err(ApiError::Validation(
            "You cannot send a message to yourself.".into(),
        ));
    }
    if state.db.get_user_by_id(req.receiver_id)?.is_none() {
        return Err(ApiError::NotFound("Receiving user not found."));
    }
    if state.db.is_blocked(req.receiver_id, claims.sub)? {
        return Err(ApiError::Forbidden);
    }

    let message_id = state
        .db
        .create_message(claims.sub, req.receiver_id, &req.content)?;

    // Read back so the response carries the store-assigned timestamp
    let row = state
        .db
        .get_message(message_id, req.receiver_id)?
        .ok_or_else(|| anyhow::anyhow!("message {message_id} vanished after insert"))?;

    Ok((StatusCode::CREATED, Json(to_message(row))))
}

/// GET /api/messages — the caller's inbox, newest first.
pub async fn list_messages(
    State(state): State<AppState>,
    Auth(claims): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let receiver_id = claims.sub;
    let rows = join_blocking(
        tokio::task::spawn_blocking(move || db.db.messages_for_receiver(receiver_id)).await,
    )?;

    let messages: Vec<Message> = rows.into_iter().map(to_message).collect();
    Ok(Json(messages))
}

/// GET /api/messages/{id} — receiver only; anyone else sees 404.
pub async fn get_message(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Auth(claims): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .get_message(message_id, claims.sub)?
        .ok_or(ApiError::NotFound("Message not found."))?;
    Ok(Json(to_message(row)))
}

/// DELETE /api/messages/{id} — only the receiver may delete.
pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Auth(claims): Auth,
) -> Result<impl IntoResponse, ApiError> {
    if !state.db.delete_message(message_id, claims.sub)? {
        return Err(ApiError::NotFound("Message not found."));
    }
    Ok(StatusCode::NO_CONTENT)
}

fn to_message(row: MessageRow) -> Message {
    Message {
        id: row.id,
        sender_id: row.sender_id,
        receiver_id: row.receiver_id,
        content: row.content,
        created_at: parse_created_at(&row.created_at, "message", row.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;

    use crate::test_support::{claims, state, user};

    async fn send(
        state: &AppState,
        sender: i64,
        receiver_id: i64,
        content: &str,
    ) -> Result<impl IntoResponse, ApiError> {
        send_message(
            State(state.clone()),
            Auth(claims(sender, "sender")),
            Json(SendMessageRequest {
                receiver_id,
                content: content.to_string(),
            }),
        )
        .await
    }

    #[tokio::test]
    async fn send_is_rejected_when_receiver_blocked_sender() {
        let state = state();
        let alice = user(&state, "alice");
        let bob = user(&state, "bob");
        state.db.block_user(bob, alice).unwrap();

        let result = send(&state, alice, bob, "hello").await;
        assert!(matches!(result, Err(ApiError::Forbidden)));

        // The block is one-directional: bob can still write to alice
        assert!(send(&state, bob, alice, "hello").await.is_ok());

        // And lifting it lets the message through
        state.db.unblock_user(bob, alice).unwrap();
        assert!(send(&state, alice, bob, "hello again").await.is_ok());
    }

    #[tokio::test]
    async fn self_send_is_a_client_error() {
        let state = state();
        let alice = user(&state, "alice");

        let result = send(&state, alice, alice, "dear diary").await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn unknown_receiver_is_not_found() {
        let state = state();
        let alice = user(&state, "alice");

        let result = send(&state, alice, 404, "anyone there?").await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn oversized_content_is_rejected() {
        let state = state();
        let alice = user(&state, "alice");
        let bob = user(&state, "bob");

        let oversized = "x".repeat(MAX_CONTENT_LEN + 1);
        let result = send(&state, alice, bob, &oversized).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
        assert!(send(&state, alice, bob, &"x".repeat(MAX_CONTENT_LEN)).await.is_ok());
    }

    #[tokio::test]
    async fn creation_response_reports_the_stored_timestamp() {
        let state = state();
        let alice = user(&state, "alice");
        let bob = user(&state, "bob");

        let response = send(&state, alice, bob, "hi").await.unwrap().into_response();
        assert_eq!(response.status(), StatusCode::CREATED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let sent: Message = serde_json::from_slice(&bytes).unwrap();

        let stored = state.db.get_message(sent.id, bob).unwrap().unwrap();
        assert_eq!(
            sent.created_at,
            parse_created_at(&stored.created_at, "message", sent.id)
        );
    }
}
