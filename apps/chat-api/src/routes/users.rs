use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/users", get(list_users))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListUsersResponse {
    pub users: Vec<String>,
}

/// `GET /users` — Display names of everyone connected, sorted.
#[utoipa::path(
    get,
    path = "/users",
    tag = "Chat",
    responses(
        (status = 200, description = "Connected users", body = ListUsersResponse),
    ),
)]
pub async fn list_users(State(state): State<AppState>) -> Json<ListUsersResponse> {
    Json(ListUsersResponse {
        users: state.dispatcher.announcer().user_list(),
    })
}
