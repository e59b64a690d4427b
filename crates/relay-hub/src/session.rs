//! WebSocket session handlers (Section 4.7, C7).
//!
//! Two upgrade endpoints share one connection lifecycle: authenticate from
//! the `Cookie` header, register the socket, merge its two inbound frame
//! sources (direct registry delivery and, for `/chat/:hex`, topic
//! broadcast) into the outbound stream, and clean up on close. `/chat/:hex`
//! additionally requires the principal to be a participant of the named
//! conversation.

use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};

use relay_types::{now_ms, Frame, Hex, OutboundFrame, Principal};

use crate::HubState;

pub fn router(state: Arc<HubState>) -> Router {
    Router::new()
        .route("/events", get(events_handler))
        .route("/chat/:hex", get(chat_handler))
        .with_state(state)
}

fn cookie_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(axum::http::header::COOKIE).and_then(|v| v.to_str().ok())
}

fn authenticate(state: &HubState, headers: &HeaderMap) -> Result<Principal, StatusCode> {
    state.tokens.authenticate(cookie_header(headers)).map_err(|_| StatusCode::UNAUTHORIZED)
}

async fn events_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<Arc<HubState>>,
) -> Result<Response, StatusCode> {
    let principal = authenticate(&state, &headers)?;
    Ok(ws.on_upgrade(move |socket| run_global_session(socket, state, principal)))
}

async fn chat_handler(
    ws: WebSocketUpgrade,
    Path(conversation): Path<Hex>,
    headers: HeaderMap,
    State(state): State<Arc<HubState>>,
) -> Result<Response, StatusCode> {
    let principal = authenticate(&state, &headers)?;

    let conv = {
        let conn = state.db.lock().await;
        relay_db::queries::conversations::find_by_hex(&conn, &conversation)
    };
    let conv = match conv {
        Ok(c) => c,
        Err(relay_db::DbError::NotFound(_)) => return Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!(error = %e, "failed to load conversation for chat session");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };
    if !conv.is_participant(&principal.hex) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(ws.on_upgrade(move |socket| run_chat_session(socket, state, principal, conversation)))
}

/// Runs the `/events` session: registry delivery only, no topic.
async fn run_global_session(socket: WebSocket, state: Arc<HubState>, principal: Principal) {
    let (handle, mut outbound) = state.registry.new_connection();
    state.registry.add(&principal.hex, handle.clone());

    let (mut sink, mut stream) = socket.split();

    let write_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if send_frame(&mut sink, frame).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
        // The `/events` socket is receive-only in this version; any inbound
        // frame besides ping/close/text-noise is simply ignored.
    }

    write_task.abort();
    state.registry.remove(&principal.hex, handle.socket_id);
}

/// Runs a `/chat/:hex` session: registry delivery merged with the
/// conversation's topic broadcast, plus a read loop that dispatches inbound
/// frames through [`crate::Dispatcher`].
async fn run_chat_session(socket: WebSocket, state: Arc<HubState>, principal: Principal, conversation: Hex) {
    let (handle, mut registry_rx) = state.registry.new_connection();
    state.registry.add(&principal.hex, handle.clone());
    let mut topic_rx = state.channels.subscribe(&conversation);

    state.channels.publish(&conversation, OutboundFrame::system("A user joined", now_ms()));

    let (mut sink, mut stream) = socket.split();

    let write_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                frame = registry_rx.recv() => {
                    match frame {
                        Some(frame) => if send_frame(&mut sink, frame).await.is_err() { break },
                        None => break,
                    }
                }
                frame = topic_rx.recv() => {
                    match frame {
                        Ok(frame) => if send_frame(&mut sink, frame).await.is_err() { break },
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Close(_) => break,
            Message::Text(text) => {
                let Ok(frame) = serde_json::from_str::<Frame>(&text) else {
                    handle.send(OutboundFrame::error(
                        serde_json::json!({ "error": "malformed frame" }),
                    ));
                    continue;
                };
                if let Some(reply) = state.dispatcher.dispatch(&principal, &conversation, frame).await {
                    handle.send(reply);
                }
            }
            _ => {}
        }
    }

    write_task.abort();
    state.registry.remove(&principal.hex, handle.socket_id);
    state.channels.evict_if_idle(&conversation);
}

async fn send_frame(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    frame: OutboundFrame,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(&frame).unwrap_or_else(|_| "{}".to_string());
    sink.send(Message::Text(text)).await
}
