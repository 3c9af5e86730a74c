pub mod health;
pub mod messages;
pub mod session;
pub mod users;

use axum::Router;
use utoipa::OpenApi;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(session::router())
        .merge(users::router())
        .merge(messages::router())
        .merge(crate::gateway::server::router())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health,
        // Chat
        session::new_session,
        users::list_users,
        messages::post_message,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            // Route request/response types
            health::HealthResponse,
            session::SessionResponse,
            users::ListUsersResponse,
            messages::PostMessageForm,
            messages::PostMessageResponse,
            crate::gateway::MessageOutcome,
        )
    ),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Chat", description = "Chat room: listener ids, users and messages. The event stream at /listen/{uuid}&{name} is not described here."),
    )
)]
pub struct ApiDoc;
