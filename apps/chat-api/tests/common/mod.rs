#![allow(dead_code)]

use std::net::SocketAddr;

use axum::Router;

use chat_api::config::Config;
use chat_api::gateway::listener::Outbox;
use chat_api::AppState;

/// Blocked word used by the filter tests.
pub const BLOCKED_WORD: &str = "darn";

/// Configuration for tests: small keep-alive so closed sockets are noticed
/// quickly, and a deterministic word filter.
pub fn test_config() -> Config {
    Config {
        port: 0,
        outbox_capacity: 5,
        history_limit: 100,
        blocked_words: vec![BLOCKED_WORD.to_string()],
        timestamps: false,
        keepalive_secs: 1,
    }
}

pub fn test_state() -> AppState {
    AppState::new(test_config())
}

/// Build the full router with fresh state.
pub fn test_app() -> (Router, AppState) {
    let state = test_state();
    let app = chat_api::routes::router().with_state(state.clone());
    (app, state)
}

/// Start an actual TCP server for streaming tests. The server runs in the
/// background for the rest of the test.
pub async fn start_server() -> (SocketAddr, AppState) {
    let (app, state) = test_app();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

/// Pop every queued record off `outbox`, encoded.
pub fn drain(outbox: &mut Outbox) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(msg) = outbox.try_recv() {
        out.push(msg.encode());
    }
    out
}
