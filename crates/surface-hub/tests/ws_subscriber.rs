//! End-to-end tests for the WebSocket subscriber endpoint.
//!
//! A real listener is bound on an ephemeral loopback port and driven with
//! `tokio_tungstenite::connect_async`, the same way a dashboard would connect.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use satellite_core::KeyVisualState;
use serde_json::Value;
use surface_hub::infrastructure::serve;
use surface_hub::{OwnerId, SurfaceHub, SurfaceInfo};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const STEP: Duration = Duration::from_secs(5);

async fn start_hub() -> (SurfaceHub, SocketAddr, Arc<AtomicBool>) {
    let hub = SurfaceHub::new(64);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let running = Arc::new(AtomicBool::new(true));
    tokio::spawn(serve(listener, hub.clone(), Arc::clone(&running)));
    (hub, addr, running)
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    ws
}

/// Reads frames until one with the given `type` arrives.
async fn next_of_type(ws: &mut Client, kind: &str) -> Value {
    loop {
        let frame = timeout(STEP, ws.next())
            .await
            .expect("timed out waiting for hub event")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = frame {
            let value: Value = serde_json::from_str(&text).unwrap();
            if value["type"] == kind {
                return value;
            }
        }
    }
}

fn satellite_info() -> SurfaceInfo {
    SurfaceInfo {
        name: "dev1".to_string(),
        product: "Satellite Virtual Surface".to_string(),
        host: "127.0.0.1:16622".to_string(),
        columns: 8,
        rows: 4,
    }
}

#[tokio::test]
async fn test_new_subscriber_receives_current_snapshot() {
    // Arrange
    let (hub, addr, running) = start_hub().await;
    hub.register(OwnerId::new(), "dev1", satellite_info()).unwrap();

    // Act
    let mut ws = connect(addr).await;
    let snapshot = next_of_type(&mut ws, "snapshot").await;

    // Assert
    assert_eq!(snapshot["surfaces"][0]["surfaceId"], "dev1");
    assert_eq!(snapshot["surfaces"][0]["columns"], 8);
    running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_draw_from_bridge_side_reaches_subscriber_as_delta() {
    // Arrange
    let (hub, addr, running) = start_hub().await;
    hub.register(OwnerId::new(), "dev1", satellite_info()).unwrap();
    let mut ws = connect(addr).await;
    next_of_type(&mut ws, "snapshot").await;

    // Act
    hub.draw(
        "dev1",
        2,
        1,
        &KeyVisualState {
            text: Some("Hello".to_string()),
            ..KeyVisualState::default()
        },
    )
    .unwrap();
    let draw = next_of_type(&mut ws, "draw").await;

    // Assert
    assert_eq!(draw["surfaceId"], "dev1");
    assert_eq!((draw["x"].as_u64(), draw["y"].as_u64()), (Some(2), Some(1)));
    assert_eq!(draw["state"]["text"], "Hello");
    running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_client_registered_surface_is_removed_when_client_disconnects() {
    // Arrange
    let (hub, addr, running) = start_hub().await;
    let mut observer = connect(addr).await;
    next_of_type(&mut observer, "snapshot").await;
    let mut producer = connect(addr).await;

    // Act: producer registers a surface, observer sees it
    producer
        .send(Message::Text(
            r#"{"type":"register","surfaceId":"web-1","name":"Tablet","columns":4,"rows":2}"#
                .to_string(),
        ))
        .await
        .unwrap();
    let with_surface = next_of_type(&mut observer, "snapshot").await;
    assert_eq!(with_surface["surfaces"][0]["name"], "Tablet");

    // Act: producer goes away
    producer.close(None).await.unwrap();
    let after = next_of_type(&mut observer, "snapshot").await;

    // Assert
    assert_eq!(after["surfaces"].as_array().map(Vec::len), Some(0));
    assert!(hub.snapshot().is_empty());
    running.store(false, Ordering::Relaxed);
}

#[tokio::test]
async fn test_key_submission_is_fanned_out_but_not_cached() {
    // Arrange
    let (hub, addr, running) = start_hub().await;
    hub.register(OwnerId::new(), "dev1", satellite_info()).unwrap();
    let mut observer = connect(addr).await;
    next_of_type(&mut observer, "snapshot").await;
    let mut producer = connect(addr).await;
    next_of_type(&mut producer, "snapshot").await;

    // Act
    producer
        .send(Message::Text(
            r#"{"type":"key","surfaceId":"dev1","x":40,"y":1,"pressed":true}"#.to_string(),
        ))
        .await
        .unwrap();
    let key = next_of_type(&mut observer, "key").await;

    // Assert
    assert_eq!(key["x"], 7);
    assert_eq!(key["pressed"], true);
    assert!(hub.snapshot()[0].keys.is_empty());
    running.store(false, Ordering::Relaxed);
}
