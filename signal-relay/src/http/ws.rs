//! WebSocket channel endpoint.
//!
//! `GET /ws?userId=X` upgrades to a downstream-only channel: the relay pushes
//! signaling envelopes as text frames and ignores anything the client sends
//! apart from close.

use crate::lifecycle::{ConnectionLifecycle, Disconnect};
use crate::server::SignalRelay;
use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Query,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use signal_types::Identity;
use std::sync::Arc;

/// Query parameters of `/ws`.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

/// `GET /ws?userId=X`
pub async fn ws_handler(
    Extension(relay): Extension<Arc<SignalRelay>>,
    Query(params): Query<WsParams>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Ok(upgrade) = upgrade else {
        return super::error_response(StatusCode::UPGRADE_REQUIRED, "Expected websocket");
    };
    let Some(identity) = params.user_id.and_then(|id| Identity::new(id).ok()) else {
        return super::error_response(StatusCode::BAD_REQUEST, "Missing userId");
    };
    if let Err(e) = relay.admit_connection(&identity) {
        return e.into_response();
    }

    let lifecycle = ConnectionLifecycle::new(relay, identity);
    upgrade.on_upgrade(move |socket| pump(socket, lifecycle))
}

/// Forward the connection's channel onto the socket until either side ends.
async fn pump(socket: WebSocket, mut lifecycle: ConnectionLifecycle) {
    let Some(mut outbound) = lifecycle.open() else {
        return;
    };
    let (mut sink, mut stream) = socket.split();

    let how = loop {
        tokio::select! {
            envelope = outbound.recv() => match envelope {
                Some(envelope) => {
                    let text = match envelope.to_json() {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!("Dropping unencodable envelope for {}: {}", lifecycle.identity(), e);
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        break Disconnect::Error(e.to_string());
                    }
                }
                // superseded by a newer connection for the same identity
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break Disconnect::Closed;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break Disconnect::Closed,
                Some(Ok(_)) => {}
                Some(Err(e)) => break Disconnect::Error(e.to_string()),
            },
        }
    };

    lifecycle.finish(how).await;
}
