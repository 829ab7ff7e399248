// ABOUTME: Message CRUD API handlers backed by the persisted collection.
// ABOUTME: Each successful mutation is broadcast to change-stream subscribers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use parlor_core::{ChangeEvent, Message, MessageId, NewMessage};
use serde::Deserialize;

use crate::app_state::SharedState;
use crate::error::ApiError;

/// Request body for creating a message. `sentTime` defaults to now.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageRequest {
    pub sender: String,
    pub text: String,
    #[serde(default)]
    pub sent_time: Option<DateTime<Utc>>,
}

/// Request body for editing a message's text.
#[derive(Debug, Deserialize)]
pub struct UpdateMessageRequest {
    pub text: String,
}

// Empty text is omitted from the wire, so an edit to "" would reach clients
// as an event with no text at all.
fn require_text(text: &str) -> Result<(), ApiError> {
    if text.is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".to_string()));
    }
    Ok(())
}

/// GET /api/messages - every stored message.
pub async fn list_messages(
    State(state): State<SharedState>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let messages = state.with_store(|store| store.read_all()).await?;
    Ok(Json(messages))
}

/// GET /api/messages/{id}
pub async fn get_message(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<Message>, ApiError> {
    let id = MessageId::new(id);
    let message = state.with_store(move |store| store.read_one(id)).await?;
    Ok(Json(message))
}

/// POST /api/messages - create a message and return it with its id.
pub async fn create_message(
    State(state): State<SharedState>,
    Json(req): Json<CreateMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    if req.sender.trim().is_empty() {
        return Err(ApiError::BadRequest("sender must not be empty".to_string()));
    }
    require_text(&req.text)?;

    let new = NewMessage::sent_at(
        req.sender,
        req.sent_time.unwrap_or_else(Utc::now),
        req.text,
    );
    let message = state.with_store(move |store| store.create(new)).await?;

    state.publish(ChangeEvent::Created(message.clone()));
    Ok((StatusCode::CREATED, Json(message)))
}

/// PUT /api/messages/{id} - replace the text. Unknown ids succeed without
/// changing anything. Empty text is rejected.
pub async fn update_message(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateMessageRequest>,
) -> Result<StatusCode, ApiError> {
    require_text(&req.text)?;
    let edit = Message::edit(MessageId::new(id), req.text);
    let event = ChangeEvent::Updated(edit.clone());
    state.with_store(move |store| store.update(&edit)).await?;

    state.publish(event);
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/messages/{id} - unknown ids succeed without changing anything.
pub async fn delete_message(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let id = MessageId::new(id);
    state.with_store(move |store| store.delete(id)).await?;

    state.publish(ChangeEvent::deleted(id));
    Ok(StatusCode::NO_CONTENT)
}
