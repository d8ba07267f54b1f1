//! Relay service
//!
//! A session-scoped bridge between one client WebSocket and one upstream
//! transcription-service WebSocket. Binary audio forwards client→upstream
//! verbatim; JSON text events forward upstream→client verbatim. The relay
//! itself synthesizes the initial `status{ready:true}` event (the client's
//! signal to start sending frames), answers ping/pong locally, and tears
//! both legs down together when either side closes or errors.
//!
//! Sessions are fully independent: each spawned handler owns its two legs
//! and shares nothing with other sessions beyond the process-wide
//! [`RelayState`].

mod upstream;

pub use upstream::{Upstream, UpstreamSocket};

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::Config;
use crate::protocol::RelayEvent;
use crate::{Error, Result};

/// Shared state for relay sessions
pub struct RelayState {
    /// Upstream connection factory (holds the service credential)
    pub upstream: Upstream,
}

/// Build the relay router
pub fn router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/v1/listen", get(ws_upgrade))
        .route("/health", get(health))
        .with_state(state)
}

/// Run the relay server until interrupted
///
/// # Errors
///
/// Returns error if the listen address cannot be bound
pub async fn serve(config: &Config) -> Result<()> {
    let state = Arc::new(RelayState {
        upstream: Upstream::new(&config.upstream),
    });

    let app = router(state).layer(TraceLayer::new_for_http()).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Transport(format!("cannot bind {addr}: {e}")))?;

    tracing::info!(addr, "relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Transport(e.to_string()))
}

/// Wait for ctrl-c
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

/// Health probe
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Handle WebSocket upgrade request
async fn ws_upgrade(State(state): State<Arc<RelayState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_session(socket, state))
}

/// Run one relay session: one client leg, one upstream leg
#[allow(clippy::too_many_lines)]
async fn handle_session(socket: WebSocket, state: Arc<RelayState>) {
    let session_id = Uuid::new_v4();
    tracing::info!(%session_id, "client connected");

    let (mut client_tx, mut client_rx) = socket.split();

    // Single writer for the client leg; both forwarding tasks and local
    // ping handling send through this channel.
    let (out_tx, mut out_rx) = mpsc::channel::<String>(64);
    let writer = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if client_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Open the upstream leg while draining the client socket: audio that
    // arrives before upstream readiness is dropped, not queued.
    let connect = state.upstream.connect();
    tokio::pin!(connect);
    let mut dropped_frames: u64 = 0;

    let upstream_socket = loop {
        tokio::select! {
            result = &mut connect => break result,
            incoming = client_rx.next() => {
                match incoming {
                    Some(Ok(Message::Binary(_))) => dropped_frames += 1,
                    Some(Ok(Message::Text(text))) => {
                        handle_control_text(&text, &out_tx, session_id).await;
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                        tracing::info!(%session_id, "client left before upstream ready");
                        writer.abort();
                        return;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    };

    if dropped_frames > 0 {
        tracing::debug!(%session_id, dropped_frames, "dropped pre-ready audio");
    }

    let upstream_socket = match upstream_socket {
        Ok(socket) => socket,
        Err(e) => {
            tracing::error!(%session_id, error = %e, "upstream connect failed");
            let event = RelayEvent::Error {
                message: e.to_string(),
            };
            if let Ok(text) = serde_json::to_string(&event) {
                let _ = out_tx.send(text).await;
            }
            drop(out_tx);
            let _ = writer.await;
            return;
        }
    };

    // Readiness is synthesized here: the upstream protocol has no explicit
    // ready event, and the client gates frame sending on this message.
    let ready = RelayEvent::ready("transcription session open");
    if let Ok(text) = serde_json::to_string(&ready) {
        if out_tx.send(text).await.is_err() {
            tracing::warn!(%session_id, "client gone before ready");
            return;
        }
    }
    tracing::info!(%session_id, "upstream ready, streaming");

    let (mut up_tx, mut up_rx) = upstream_socket.split();

    // Client -> upstream: binary audio forwards verbatim; text is a local
    // control channel and never reaches upstream.
    let out_for_client = out_tx.clone();
    let mut client_leg = tokio::spawn(async move {
        while let Some(Ok(message)) = client_rx.next().await {
            match message {
                Message::Binary(data) => {
                    if up_tx.send(UpstreamMessage::Binary(data)).await.is_err() {
                        tracing::warn!(%session_id, "upstream send failed");
                        break;
                    }
                }
                Message::Text(text) => {
                    handle_control_text(&text, &out_for_client, session_id).await;
                }
                Message::Close(_) => {
                    tracing::info!(%session_id, "client closed");
                    break;
                }
                _ => {}
            }
        }
        let _ = up_tx.close().await;
    });

    // Upstream -> client: JSON text forwards verbatim; anything unparseable
    // is logged and dropped rather than crashing the session.
    let mut upstream_leg = tokio::spawn(async move {
        while let Some(incoming) = up_rx.next().await {
            match incoming {
                Ok(UpstreamMessage::Text(text)) => {
                    if serde_json::from_str::<serde_json::Value>(&text).is_err() {
                        tracing::warn!(%session_id, "malformed upstream event dropped");
                        continue;
                    }
                    if out_tx.send(text.to_string()).await.is_err() {
                        break;
                    }
                }
                Ok(UpstreamMessage::Close(_)) => {
                    tracing::info!(%session_id, "upstream closed");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(%session_id, error = %e, "upstream receive error");
                    break;
                }
            }
        }
    });

    // Either leg ending ends the session; the loser is aborted and both
    // sockets close on drop. This is the single teardown path.
    tokio::select! {
        _ = &mut client_leg => upstream_leg.abort(),
        _ = &mut upstream_leg => client_leg.abort(),
    }
    writer.abort();

    tracing::info!(%session_id, "session closed");
}

/// Handle a text message on the client leg (ping/pong control channel)
async fn handle_control_text(text: &str, out: &mpsc::Sender<String>, session_id: Uuid) {
    match serde_json::from_str::<RelayEvent>(text) {
        Ok(RelayEvent::Ping) => {
            if let Ok(pong) = serde_json::to_string(&RelayEvent::Pong) {
                let _ = out.send(pong).await;
            }
        }
        Ok(RelayEvent::Pong) => {}
        Ok(other) => {
            tracing::debug!(%session_id, event = ?other, "unexpected client event ignored");
        }
        Err(_) => {
            tracing::debug!(%session_id, "unparseable client text ignored");
        }
    }
}
