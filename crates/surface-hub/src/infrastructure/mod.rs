//! Infrastructure layer for surface-hub: the WebSocket subscriber endpoint.

pub mod ws_server;

pub use ws_server::{run_server, serve};
