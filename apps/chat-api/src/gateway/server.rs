//! SSE stream route and per-connection delivery loop.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chat_common::id::is_valid_listener_id;
use futures_util::stream::{self, Stream};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::error::{ApiError, FieldError};
use crate::AppState;

use super::dispatch::{Connection, Dispatcher};
use super::events::FramedMessage;
use super::listener::Outbox;

/// SSE comment sent when the outbox has been idle for a while. Writing it is
/// what lets the server notice a client that went away.
const KEEP_ALIVE_RECORD: &str = ": keep-alive\n\n";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/listen", get(listen_without_identity))
        .route("/listen/{uuid_and_user}", get(listen))
}

async fn listen_without_identity() -> ApiError {
    ApiError::bad_request("uuid missing")
}

/// `GET /listen/{uuid}&{name}`. A name of `null` asks for a guest name.
async fn listen(
    State(state): State<AppState>,
    Path(uuid_and_user): Path<String>,
) -> Result<Response, ApiError> {
    let (listener_id, supplied_name) = parse_identity(&uuid_and_user)?;

    let connection = state
        .dispatcher
        .on_client_connect(listener_id, Some(supplied_name))?;

    tracing::info!(
        listener_id = %connection.listener_id,
        display_name = %connection.display_name,
        session = connection.session,
        "stream opened"
    );

    let keep_alive = Duration::from_secs(state.config.keepalive_secs.max(1));
    let body = Body::from_stream(listener_stream(state.dispatcher.clone(), connection, keep_alive));

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}

/// Split `uuid&name` into its parts.
fn parse_identity(raw: &str) -> Result<(&str, &str), ApiError> {
    let (listener_id, name) = raw
        .split_once('&')
        .ok_or_else(|| ApiError::bad_request("incorrect format"))?;

    if !is_valid_listener_id(listener_id) {
        return Err(ApiError::validation(vec![FieldError {
            field: "uuid".to_string(),
            message: "Listener id must be 1-64 letters, digits, '-' or '_'".to_string(),
        }]));
    }
    Ok((listener_id, name))
}

/// Owns one registration for the lifetime of the response body.
struct StreamState {
    dispatcher: Arc<Dispatcher>,
    listener_id: String,
    session: u64,
    outbox: Outbox,
    keep_alive: Interval,
}

impl Drop for StreamState {
    fn drop(&mut self) {
        // No-op when the listener was evicted or replaced by a reconnect.
        if self
            .dispatcher
            .on_client_disconnect(&self.listener_id, Some(self.session))
        {
            tracing::info!(
                listener_id = %self.listener_id,
                session = self.session,
                "stream closed"
            );
        }
    }
}

enum Next {
    Message(Option<Arc<FramedMessage>>),
    KeepAlive,
}

/// Drain the outbox into SSE records. Ends when the outbox closes (evicted or
/// replaced); dropping the stream (client gone) deregisters the listener.
fn listener_stream(
    dispatcher: Arc<Dispatcher>,
    connection: Connection,
    keep_alive: Duration,
) -> impl Stream<Item = Result<String, Infallible>> + Send + 'static {
    let mut interval = time::interval_at(Instant::now() + keep_alive, keep_alive);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let state = StreamState {
        dispatcher,
        listener_id: connection.listener_id,
        session: connection.session,
        outbox: connection.outbox,
        keep_alive: interval,
    };

    stream::unfold(state, |mut state| async move {
        let next = tokio::select! {
            biased;
            message = state.outbox.recv() => Next::Message(message),
            _ = state.keep_alive.tick() => Next::KeepAlive,
        };

        match next {
            Next::Message(Some(message)) => {
                state.keep_alive.reset();
                Some((Ok(message.encode()), state))
            }
            Next::Message(None) => {
                tracing::debug!(
                    listener_id = %state.listener_id,
                    session = state.session,
                    "outbox closed, ending stream"
                );
                None
            }
            Next::KeepAlive => Some((Ok(KEEP_ALIVE_RECORD.to_string()), state)),
        }
    })
}
