//! Listener id issuance for clients that have nothing stored yet.

use axum::routing::get;
use axum::{Json, Router};
use chat_common::{ListenerId, PrefixedId};
use serde::Serialize;
use utoipa::ToSchema;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/session", get(new_session))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    /// Pass this as the `uuid` half of `/listen/{uuid}&{name}` and as the
    /// `uuid` form field when posting.
    pub listener_id: String,
}

/// `GET /session` — Issue a fresh listener id.
#[utoipa::path(
    get,
    path = "/session",
    tag = "Chat",
    responses(
        (status = 200, description = "New listener id", body = SessionResponse),
    ),
)]
pub async fn new_session() -> Json<SessionResponse> {
    Json(SessionResponse {
        listener_id: ListenerId::generate(),
    })
}
