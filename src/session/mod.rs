//! Capture session
//!
//! Owns the microphone, the framer (inside [`AudioCapture`]), and the
//! client socket to the relay. Lifecycle is an explicit state machine:
//!
//! ```text
//! Idle → Connecting → Streaming → Idle
//!          │                       ▲
//!          └── setup failure ──────┘
//! ```
//!
//! Frames produced while `Connecting` are dropped, never sent: audio must
//! not reach the transport before the relay's synthesized
//! `status{ready:true}` event, because the upstream session is not yet
//! accepting it. Teardown releases the transport, the audio stream, and
//! the microphone together, exactly once, on every exit path.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::audio::{AudioCapture, AudioFrame};
use crate::protocol::RelayEvent;
use crate::{Error, Result};

/// Frames buffered between the audio callback and the socket pump
const FRAME_CHANNEL_CAPACITY: usize = 32;

/// Events buffered between the socket pump and the consumer
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Lifecycle state of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No resources held
    Idle,
    /// Microphone and transport open, awaiting upstream readiness
    Connecting,
    /// Forwarding frames, receiving transcript events
    Streaming,
}

/// A live microphone-to-relay session
///
/// Holds the cpal stream, so the session itself is not `Send`; keep it on
/// the task that created it (the socket pump is spawned and is `Send`).
pub struct CaptureSession {
    capture: Option<AudioCapture>,
    pump: Option<tokio::task::JoinHandle<()>>,
    shutdown: Option<oneshot::Sender<()>>,
    state: Arc<watch::Sender<SessionState>>,
}

impl CaptureSession {
    /// Acquire the microphone and connect to the relay
    ///
    /// Returns the session (in `Connecting`; it transitions to
    /// `Streaming` when the relay reports upstream readiness) together
    /// with the stream of transcript events for the consumer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Microphone`] when no usable input device exists
    /// (nothing is held), or [`Error::Transport`] when the relay
    /// connection fails (the microphone is released before returning)
    #[allow(clippy::future_not_send)] // holds the cpal stream across awaits
    pub async fn start(relay_url: &str) -> Result<(Self, ReceiverStream<RelayEvent>)> {
        let mut capture = AudioCapture::new()?;

        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        capture.start(frame_tx)?;

        let socket = match tokio_tungstenite::connect_async(relay_url).await {
            Ok((socket, _response)) => socket,
            Err(e) => {
                capture.stop();
                return Err(Error::Transport(format!("relay connect failed: {e}")));
            }
        };
        tracing::info!(relay_url, "connected to relay");

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let state = Arc::new(watch::Sender::new(SessionState::Connecting));

        let pump_state = Arc::clone(&state);
        let pump = tokio::spawn(async move {
            run_pump(socket, frame_rx, event_tx, pump_state, shutdown_rx).await;
        });

        let session = Self {
            capture: Some(capture),
            pump: Some(pump),
            shutdown: Some(shutdown_tx),
            state,
        };
        Ok((session, ReceiverStream::new(event_rx)))
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Release the transport, the audio stream, and the microphone
    ///
    /// Idempotent: calling twice, or after an error path already tore the
    /// session down, releases nothing a second time.
    #[allow(clippy::future_not_send)]
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(pump) = self.pump.take() {
            let _ = pump.await;
        }
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
        self.state.send_replace(SessionState::Idle);
        tracing::info!("capture session stopped");
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
    }
}

/// Socket pump: frames out, events in, readiness gating in the middle
///
/// Generic over the socket's IO type so tests can drive it over an
/// in-memory duplex instead of TCP.
async fn run_pump<S>(
    socket: WebSocketStream<S>,
    mut frames: mpsc::Receiver<AudioFrame>,
    events: mpsc::Sender<RelayEvent>,
    state: Arc<watch::Sender<SessionState>>,
    mut shutdown: oneshot::Receiver<()>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut socket_tx, mut socket_rx) = socket.split();
    let mut ready = false;
    let mut dropped: u64 = 0;

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Some(frame) if ready => {
                    let bytes = frame.into_le_bytes();
                    if socket_tx.send(Message::Binary(bytes.into())).await.is_err() {
                        tracing::warn!("transport send failed");
                        break;
                    }
                }
                Some(_) => {
                    // Not ready yet: dropped, not queued. Audio sent before
                    // upstream readiness would be lost anyway.
                    dropped += 1;
                }
                None => {
                    tracing::debug!("capture side closed, ending session");
                    break;
                }
            },
            incoming = socket_rx.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<RelayEvent>(&text) {
                        Ok(event) => {
                            if handle_event(&event, &mut ready, &state, dropped) {
                                let _ = socket_tx
                                    .send(Message::Text(pong_text().into()))
                                    .await;
                                continue;
                            }
                            if events.send(event).await.is_err() {
                                tracing::debug!("event consumer gone, ending session");
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "malformed relay event dropped");
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("relay closed the connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "transport receive error");
                    break;
                }
            },
            _ = &mut shutdown => {
                let _ = socket_tx.close().await;
                break;
            }
        }
    }

    state.send_replace(SessionState::Idle);
}

/// Apply an event's side effects; returns true when it was a ping that
/// needs a pong reply instead of forwarding
fn handle_event(
    event: &RelayEvent,
    ready: &mut bool,
    state: &watch::Sender<SessionState>,
    dropped: u64,
) -> bool {
    match event {
        RelayEvent::Status { ready: true, .. } if !*ready => {
            *ready = true;
            state.send_replace(SessionState::Streaming);
            tracing::info!(dropped_frames = dropped, "upstream ready, streaming");
            false
        }
        RelayEvent::Ping => true,
        _ => false,
    }
}

/// Serialized pong reply
fn pong_text() -> String {
    serde_json::to_string(&RelayEvent::Pong).unwrap_or_else(|_| r#"{"type":"pong"}"#.to_string())
}
