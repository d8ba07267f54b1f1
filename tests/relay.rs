//! Relay session integration tests
//!
//! Runs the real relay router against an in-process fake upstream, with a
//! real WebSocket client on the other side. No credentials or external
//! services involved.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

use podium_gateway::config::UpstreamSettings;
use podium_gateway::protocol::RelayEvent;
use podium_gateway::relay::{RelayState, Upstream, router};

mod common;

/// What the fake upstream observed on its socket
#[derive(Debug)]
enum UpstreamSeen {
    Binary(Vec<u8>),
    Text(String),
}

/// Spawn a one-connection fake transcription service
///
/// Returns its URL, a sender for events it should emit, and a receiver of
/// everything it saw. The receiver closes when the connection ends.
async fn spawn_fake_upstream() -> (String, mpsc::Sender<String>, mpsc::Receiver<UpstreamSeen>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (emit_tx, mut emit_rx) = mpsc::channel::<String>(16);
    let (seen_tx, seen_rx) = mpsc::channel::<UpstreamSeen>(64);

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();

        loop {
            tokio::select! {
                outgoing = emit_rx.recv() => match outgoing {
                    Some(text) => {
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                incoming = socket.next() => match incoming {
                    Some(Ok(Message::Binary(bytes))) => {
                        let _ = seen_tx.send(UpstreamSeen::Binary(bytes.to_vec())).await;
                    }
                    Some(Ok(Message::Text(text))) => {
                        let _ = seen_tx.send(UpstreamSeen::Text(text.to_string())).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                },
            }
        }
    });

    (format!("ws://{addr}"), emit_tx, seen_rx)
}

/// Spawn the relay pointed at the given upstream; returns its listen URL
async fn spawn_relay(upstream_url: &str) -> String {
    let settings = UpstreamSettings {
        url: upstream_url.to_string(),
        api_key: None,
        keyterms: Vec::new(),
    };
    let state = Arc::new(RelayState {
        upstream: Upstream::new(&settings),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    format!("ws://{addr}/v1/listen")
}

/// Receive the next text message, with a test-failure timeout
async fn next_text<S>(socket: &mut S) -> String
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for message")
            .expect("socket closed")
            .expect("socket error");
        match message {
            Message::Text(text) => return text.to_string(),
            _ => continue,
        }
    }
}

#[tokio::test]
async fn ready_status_is_synthesized_first() {
    let (upstream_url, _emit, _seen) = spawn_fake_upstream().await;
    let relay_url = spawn_relay(&upstream_url).await;

    let (mut client, _) = tokio_tungstenite::connect_async(&relay_url).await.unwrap();

    let first = next_text(&mut client).await;
    let event: RelayEvent = serde_json::from_str(&first).unwrap();
    assert!(matches!(event, RelayEvent::Status { ready: true, .. }));
}

#[tokio::test]
async fn audio_frames_forward_to_upstream_verbatim() {
    let (upstream_url, _emit, mut seen) = spawn_fake_upstream().await;
    let relay_url = spawn_relay(&upstream_url).await;

    let (mut client, _) = tokio_tungstenite::connect_async(&relay_url).await.unwrap();
    let _ready = next_text(&mut client).await;

    let frame: Vec<u8> = (0..1600u32).map(|i| u8::try_from(i % 251).unwrap()).collect();
    client
        .send(Message::Binary(frame.clone().into()))
        .await
        .unwrap();

    let observed = timeout(Duration::from_secs(5), seen.recv())
        .await
        .unwrap()
        .unwrap();
    match observed {
        UpstreamSeen::Binary(bytes) => assert_eq!(bytes, frame),
        UpstreamSeen::Text(text) => panic!("expected binary, got text {text}"),
    }
}

#[tokio::test]
async fn transcript_events_forward_verbatim() {
    let (upstream_url, emit, _seen) = spawn_fake_upstream().await;
    let relay_url = spawn_relay(&upstream_url).await;

    let (mut client, _) = tokio_tungstenite::connect_async(&relay_url).await.unwrap();
    let _ready = next_text(&mut client).await;

    // Extra fields and odd spacing prove the relay does not reinterpret
    let raw = r#"{"type":"Turn", "transcript":"hello world","end_of_turn":false,"turn_order":7}"#;
    emit.send(raw.to_string()).await.unwrap();

    let forwarded = next_text(&mut client).await;
    assert_eq!(forwarded, raw);
}

#[tokio::test]
async fn malformed_upstream_events_are_dropped() {
    let (upstream_url, emit, _seen) = spawn_fake_upstream().await;
    let relay_url = spawn_relay(&upstream_url).await;

    let (mut client, _) = tokio_tungstenite::connect_async(&relay_url).await.unwrap();
    let _ready = next_text(&mut client).await;

    emit.send("definitely not json".to_string()).await.unwrap();
    let valid = r#"{"type":"Turn","transcript":"survived","end_of_turn":true}"#;
    emit.send(valid.to_string()).await.unwrap();

    // Only the valid event arrives; the session did not die
    let forwarded = next_text(&mut client).await;
    assert_eq!(forwarded, valid);
}

#[tokio::test]
async fn upstream_error_events_do_not_close_the_session() {
    let (upstream_url, emit, _seen) = spawn_fake_upstream().await;
    let relay_url = spawn_relay(&upstream_url).await;

    let (mut client, _) = tokio_tungstenite::connect_async(&relay_url).await.unwrap();
    let _ready = next_text(&mut client).await;

    emit.send(r#"{"type":"Error","message":"advisory"}"#.to_string())
        .await
        .unwrap();
    let first = next_text(&mut client).await;
    assert!(matches!(
        serde_json::from_str::<RelayEvent>(&first).unwrap(),
        RelayEvent::Error { .. }
    ));

    // Session is still alive afterwards
    emit.send(r#"{"type":"Turn","transcript":"still here","end_of_turn":true}"#.to_string())
        .await
        .unwrap();
    let second = next_text(&mut client).await;
    assert!(second.contains("still here"));
}

#[tokio::test]
async fn ping_is_answered_locally_not_forwarded() {
    let (upstream_url, _emit, mut seen) = spawn_fake_upstream().await;
    let relay_url = spawn_relay(&upstream_url).await;

    let (mut client, _) = tokio_tungstenite::connect_async(&relay_url).await.unwrap();
    let _ready = next_text(&mut client).await;

    client
        .send(Message::Text(r#"{"type":"ping"}"#.into()))
        .await
        .unwrap();

    let reply = next_text(&mut client).await;
    assert_eq!(
        serde_json::from_str::<RelayEvent>(&reply).unwrap(),
        RelayEvent::Pong
    );

    // The ping never reached the upstream leg
    assert!(matches!(
        seen.try_recv(),
        Err(mpsc::error::TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn client_disconnect_tears_down_the_upstream_leg() {
    let (upstream_url, _emit, mut seen) = spawn_fake_upstream().await;
    let relay_url = spawn_relay(&upstream_url).await;

    let (mut client, _) = tokio_tungstenite::connect_async(&relay_url).await.unwrap();
    let _ready = next_text(&mut client).await;

    client.close(None).await.unwrap();

    // The fake upstream's loop ends, dropping its sender
    let closed = timeout(Duration::from_secs(5), async {
        loop {
            if seen.recv().await.is_none() {
                break;
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "upstream leg was not closed");
}

#[tokio::test]
async fn upstream_connect_failure_reports_an_error_event() {
    // Nothing is listening here
    let relay_url = spawn_relay("ws://127.0.0.1:9").await;

    let (mut client, _) = tokio_tungstenite::connect_async(&relay_url).await.unwrap();

    let first = next_text(&mut client).await;
    assert!(matches!(
        serde_json::from_str::<RelayEvent>(&first).unwrap(),
        RelayEvent::Error { .. }
    ));
}

#[tokio::test]
async fn health_endpoint_answers() {
    let settings = UpstreamSettings {
        url: "ws://127.0.0.1:9".to_string(),
        api_key: None,
        keyterms: Vec::new(),
    };
    let state = Arc::new(RelayState {
        upstream: Upstream::new(&settings),
    });

    let response = router(state)
        .oneshot(
            axum::http::Request::get("/health")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
}
