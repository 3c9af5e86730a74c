//! Client-to-server chat messages.

use axum::extract::State;
use axum::routing::post;
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::gateway::MessageOutcome;
use crate::AppState;

/// Longest message accepted, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(post_message))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PostMessageForm {
    pub message: Option<String>,
    /// Listener id the sender opened its stream with.
    pub uuid: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PostMessageResponse {
    pub outcome: MessageOutcome,
}

// ---------------------------------------------------------------------------
// POST /
// ---------------------------------------------------------------------------

/// `POST /` — Send a chat line or command as a connected listener.
#[utoipa::path(
    post,
    path = "/",
    tag = "Chat",
    request_body(content = PostMessageForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Message accepted", body = PostMessageResponse),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 403, description = "Sender is not connected", body = ApiErrorBody),
    ),
)]
pub async fn post_message(
    State(state): State<AppState>,
    Form(form): Form<PostMessageForm>,
) -> Result<Json<PostMessageResponse>, ApiError> {
    let (listener_id, message) = validate(&form)?;
    let outcome = state.dispatcher.on_client_message(listener_id, message)?;
    Ok(Json(PostMessageResponse { outcome }))
}

fn validate(form: &PostMessageForm) -> Result<(&str, &str), ApiError> {
    let mut errors = Vec::new();

    let listener_id = form.uuid.as_deref().map(str::trim).unwrap_or_default();
    if listener_id.is_empty() {
        errors.push(FieldError {
            field: "uuid".to_string(),
            message: "Listener id is required".to_string(),
        });
    }

    let message = form.message.as_deref().unwrap_or_default();
    if message.trim().is_empty() {
        errors.push(FieldError {
            field: "message".to_string(),
            message: "Message content is required".to_string(),
        });
    } else if message.chars().count() > MAX_MESSAGE_CHARS {
        errors.push(FieldError {
            field: "message".to_string(),
            message: format!("Message must be at most {MAX_MESSAGE_CHARS} characters"),
        });
    }

    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }
    Ok((listener_id, message))
}
