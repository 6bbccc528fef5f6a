//! Drives a real driver task against a fake satellite host on loopback.

use std::sync::Arc;
use std::time::Duration;

use satellite_bridge::domain::{BridgeConfig, BridgeStatus};
use satellite_bridge::infrastructure::presentation;
use satellite_bridge::infrastructure::{spawn_bridge, BridgeHandle, DriverSettings, HubSurfaces};
use satellite_core::DeviceDescriptor;
use surface_hub::SurfaceHub;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};

const STEP: Duration = Duration::from_secs(5);

struct Peer {
    lines: tokio::io::Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Peer {
    async fn accept(listener: &TcpListener) -> Self {
        let (stream, _) = timeout(STEP, listener.accept())
            .await
            .expect("bridge never connected")
            .unwrap();
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
    }

    async fn expect_line(&mut self) -> String {
        timeout(STEP, self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .unwrap()
            .expect("bridge closed the socket")
    }
}

async fn wait_for_status(handle: &BridgeHandle, pred: impl Fn(&BridgeStatus) -> bool) -> BridgeStatus {
    timeout(STEP, async {
        loop {
            let status = handle.status().await.unwrap();
            if pred(&status) {
                return status;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("status never reached the expected state")
}

async fn start(listener: &TcpListener) -> (BridgeHandle, SurfaceHub) {
    let hub = SurfaceHub::new(64);
    let (presenter, _events) = presentation::channel();
    let config = BridgeConfig {
        companion_host: "127.0.0.1".to_string(),
        companion_port: listener.local_addr().unwrap().port(),
        devices: vec![DeviceDescriptor {
            id: "dev1".to_string(),
            ..DeviceDescriptor::default()
        }],
    };
    let (handle, _task) = spawn_bridge(
        config,
        DriverSettings {
            keepalive: None,
            connect_timeout: Duration::from_secs(2),
        },
        Arc::new(HubSurfaces::new(hub.clone())),
        Arc::new(presenter),
    );
    (handle, hub)
}

#[tokio::test]
async fn test_handshake_registers_device_and_mirrors_surface() {
    // Arrange
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (handle, hub) = start(&listener).await;
    let mut peer = Peer::accept(&listener).await;

    // Act: announce, read the registration, acknowledge it
    peer.send("BEGIN ApiVersion=\"1.0.0\"\n").await;
    let add = peer.expect_line().await;
    peer.send("ADD-DEVICE DEVICEID=\"dev1\" OK=1\n").await;
    let status = wait_for_status(&handle, |s| s.registered_count == 1).await;

    // Assert
    assert_eq!(
        add,
        "ADD-DEVICE DEVICEID=\"dev1\" PRODUCT_NAME=\"Satellite Virtual Surface\" \
         KEYS_TOTAL=32 KEYS_PER_ROW=8 BITMAPS=72 COLORS=1 TEXT=1 TEXT_STYLE=0"
    );
    assert!(status.connected);
    assert_eq!(status.peer_version.as_deref(), Some("1.0.0"));
    let surfaces = hub.snapshot();
    assert_eq!(surfaces.len(), 1);
    assert_eq!(surfaces[0].surface_id.as_str(), "dev1");

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_ping_key_state_and_key_press_round_trip() {
    // Arrange
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (handle, hub) = start(&listener).await;
    let mut peer = Peer::accept(&listener).await;
    peer.send("BEGIN\n").await;
    peer.expect_line().await;
    peer.send("ADD-DEVICE DEVICEID=dev1 OK=1\n").await;
    wait_for_status(&handle, |s| s.registered_count == 1).await;

    // Act / Assert: liveness echo
    peer.send("PING 42\n").await;
    assert_eq!(peer.expect_line().await, "PONG 42");

    // Act / Assert: key update lands in the surface cache
    peer.send("KEY-STATE DEVICEID=\"dev1\" KEY=1/2 TEXT=SGVsbG8=\nPING sync\n")
        .await;
    assert_eq!(peer.expect_line().await, "PONG sync");
    let keys = &hub.snapshot()[0].keys;
    assert_eq!((keys[0].x, keys[0].y), (2, 1));
    assert_eq!(keys[0].state.text.as_deref(), Some("Hello"));

    // Act / Assert: local press goes out as a flat index
    handle.key_press("dev1", 3, 2, true).await.unwrap();
    assert_eq!(
        peer.expect_line().await,
        "KEY-PRESS DEVICEID=\"dev1\" KEY=19 PRESSED=1"
    );

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_peer_close_triggers_reconnect_and_fresh_registration() {
    // Arrange
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (handle, hub) = start(&listener).await;
    let mut peer = Peer::accept(&listener).await;
    peer.send("BEGIN\n").await;
    peer.expect_line().await;
    peer.send("ADD-DEVICE DEVICEID=dev1 OK=1\n").await;
    wait_for_status(&handle, |s| s.registered_count == 1).await;

    // Act: peer goes away
    drop(peer);
    let status = wait_for_status(&handle, |s| !s.connected).await;
    assert_eq!(status.registered_count, 0);
    assert!(hub.snapshot().is_empty());

    // Assert: the bridge comes back on its own and registers again
    let mut peer = Peer::accept(&listener).await;
    peer.send("BEGIN\n").await;
    assert!(peer.expect_line().await.starts_with("ADD-DEVICE DEVICEID=\"dev1\""));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_reload_to_zero_devices_unregisters_and_stays_idle() {
    // Arrange
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (handle, _hub) = start(&listener).await;
    let mut peer = Peer::accept(&listener).await;
    peer.send("BEGIN\n").await;
    peer.expect_line().await;
    peer.send("ADD-DEVICE DEVICEID=dev1 OK=1\n").await;
    wait_for_status(&handle, |s| s.registered_count == 1).await;

    // Act
    handle
        .reload(BridgeConfig {
            companion_host: "127.0.0.1".to_string(),
            companion_port: port,
            devices: vec![],
        })
        .await
        .unwrap();

    // Assert
    assert_eq!(peer.expect_line().await, "REMOVE-DEVICE DEVICEID=\"dev1\"");
    let status = wait_for_status(&handle, |s| !s.connected && !s.connecting).await;
    assert_eq!(status.device_count, 0);
    assert!(
        timeout(Duration::from_millis(1500), listener.accept()).await.is_err(),
        "bridge must not reconnect without devices"
    );

    handle.shutdown().await.unwrap();
}
