//! WebSocket upgrade endpoints.

use std::future::ready;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tracing::{debug, warn};

use coeus_core::ClassSessionId;

use super::LiveState;
use crate::connection::{serve_connection, Frame};
use crate::registry::Scope;

const UPGRADE_FAILED: &str = "Failed to upgrade to WebSocket";
const BAD_SESSION_ID: &str = "Failed to extract class session ID";

impl From<Message> for Frame {
    fn from(msg: Message) -> Self {
        match msg {
            Message::Text(text) => Frame::Text(text),
            Message::Binary(data) => Frame::Binary(data),
            Message::Ping(data) => Frame::Ping(data),
            Message::Pong(data) => Frame::Pong(data),
            Message::Close(_) => Frame::Close,
        }
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(data) => Message::Binary(data),
            Frame::Ping(data) => Message::Ping(data),
            Frame::Pong(data) => Message::Pong(data),
            Frame::Close => Message::Close(None),
        }
    }
}

fn error_response(message: &'static str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}

/// `GET /ws`
pub(super) async fn global_ws(
    State(state): State<LiveState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    upgrade_into(state, Scope::Global, upgrade)
}

/// `GET /ws/:class_session_id`
pub(super) async fn session_ws(
    State(state): State<LiveState>,
    Path(raw_id): Path<String>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let class_session: ClassSessionId = match raw_id.parse() {
        Ok(id) => id,
        Err(e) => {
            debug!(value = %raw_id, error = %e, "Rejecting upgrade with bad class session id");
            return error_response(BAD_SESSION_ID);
        }
    };

    upgrade_into(state, Scope::Session(class_session), upgrade)
}

fn upgrade_into(
    state: LiveState,
    scope: Scope,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            warn!(scope = %scope, error = %rejection, "WebSocket upgrade rejected");
            return error_response(UPGRADE_FAILED);
        }
    };

    upgrade
        .on_failed_upgrade(move |e| {
            warn!(scope = %scope, error = %e, "WebSocket handshake failed");
        })
        .on_upgrade(move |socket| run_socket(state, scope, socket))
}

async fn run_socket(state: LiveState, scope: Scope, socket: WebSocket) {
    let (sink, stream) = socket.split();
    let sink = sink.with(|frame: Frame| ready(Ok::<_, axum::Error>(Message::from(frame))));
    let stream = stream.map(|item| item.map(Frame::from));

    if let Err(e) = serve_connection(state.registry, scope, sink, stream, state.settings).await {
        warn!(scope = %scope, error = %e, "Live connection rejected");
    }
}
