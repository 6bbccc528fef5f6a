//! WebSocket server: accept loop and per-subscriber sessions.
//!
//! Each accepted TCP connection is upgraded to a WebSocket and handed to its
//! own Tokio task, which:
//!
//! 1. Subscribes to the hub and immediately sends the current snapshot.
//! 2. Forwards every broadcast [`HubEvent`] as a JSON text frame.  A
//!    subscriber that falls behind the broadcast buffer gets a fresh snapshot
//!    instead of the events it missed.
//! 3. Applies `register` / `draw` / `key` submissions from the client.
//!    Malformed JSON and rejected operations are dropped with a debug log.
//! 4. On disconnect, removes every surface this connection registered.
//!
//! The accept loop polls a shared `running` flag every 200 ms so the binary
//! can stop it from a signal handler.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};

use crate::application::SurfaceHub;
use crate::domain::{ClientMsg, HubConfig, HubEvent, OwnerId, SurfaceError};

const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.bind_addr` and serves subscribers until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_server(
    config: HubConfig,
    hub: SurfaceHub,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind surface hub listener on {}", config.bind_addr))?;
    info!("surface hub listening on {}", config.bind_addr);
    serve(listener, hub, running).await;
    Ok(())
}

/// Runs the accept loop on an already-bound listener.
pub async fn serve(listener: TcpListener, hub: SurfaceHub, running: Arc<AtomicBool>) {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping surface hub accept loop");
            break;
        }

        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("new subscriber connection from {peer_addr}");
                let hub = hub.clone();
                tokio::spawn(async move {
                    handle_subscriber(stream, peer_addr, hub).await;
                });
            }
            Ok(Err(e)) => error!("accept error: {e}"),
            Err(_) => {}
        }
    }
}

// ── Per-session handler ───────────────────────────────────────────────────────

async fn handle_subscriber(stream: TcpStream, peer_addr: SocketAddr, hub: SurfaceHub) {
    let owner = OwnerId::new();
    match run_session(stream, peer_addr, &hub, owner).await {
        Ok(()) => info!("subscriber {peer_addr} closed"),
        Err(e) => warn!("subscriber {peer_addr} closed with error: {e:#}"),
    }
    hub.remove_owned(owner);
}

async fn run_session(
    stream: TcpStream,
    peer_addr: SocketAddr,
    hub: &SurfaceHub,
    owner: OwnerId,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;
    info!("subscriber connected: {peer_addr} (owner {owner})");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let (mut events, snapshot) = hub.subscribe_with_snapshot();
    ws_tx
        .send(WsMessage::Text(encode_event(&snapshot)?))
        .await
        .context("failed to send initial snapshot")?;

    loop {
        tokio::select! {
            incoming = ws_rx.next() => {
                let msg = match incoming {
                    Some(Ok(msg)) => msg,
                    Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) | None => break,
                    Some(Err(e)) => return Err(e).context("WebSocket read failed"),
                };
                match msg {
                    WsMessage::Text(text) => apply_client_text(hub, owner, &text),
                    WsMessage::Close(_) => break,
                    WsMessage::Binary(_) => debug!("{peer_addr}: binary frame ignored"),
                    WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {}
                }
            }
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(RecvError::Lagged(missed)) => {
                        debug!("{peer_addr}: lagged by {missed} event(s); resyncing");
                        hub.snapshot_event()
                    }
                    Err(RecvError::Closed) => break,
                };
                if ws_tx.send(WsMessage::Text(encode_event(&event)?)).await.is_err() {
                    debug!("{peer_addr}: send failed (subscriber gone)");
                    break;
                }
            }
        }
    }

    Ok(())
}

fn encode_event(event: &HubEvent) -> anyhow::Result<String> {
    serde_json::to_string(event).context("failed to serialize hub event")
}

/// Parses and applies one client submission.  Never fails.
pub fn apply_client_text(hub: &SurfaceHub, owner: OwnerId, text: &str) {
    let msg: ClientMsg = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            debug!("dropping malformed subscriber message: {e}");
            return;
        }
    };
    if let Err(e) = apply_client_msg(hub, owner, msg) {
        debug!("dropping subscriber message: {e}");
    }
}

fn apply_client_msg(hub: &SurfaceHub, owner: OwnerId, msg: ClientMsg) -> Result<(), SurfaceError> {
    match msg {
        ClientMsg::Register(req) => hub.register(owner, &req.surface_id, req.info()),
        ClientMsg::Draw {
            surface_id,
            x,
            y,
            state,
        } => hub.draw(&surface_id, x, y, &state).map(drop),
        ClientMsg::Key {
            surface_id,
            x,
            y,
            pressed,
        } => hub.key(&surface_id, x, y, pressed).map(drop),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
