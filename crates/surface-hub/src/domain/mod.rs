//! Domain layer for surface-hub.
//!
//! Pure types with no sockets, tasks, or clocks:
//!
//! - [`surface`] – validated [`SurfaceId`], the [`Surface`] record with its
//!   sparse key cache, and the serializable [`SurfaceSnapshot`].
//! - [`messages`] – the JSON subscriber protocol in both directions.
//! - [`config`] – [`HubConfig`] for the WebSocket endpoint.

pub mod config;
pub mod messages;
pub mod surface;

pub use config::HubConfig;
pub use messages::{ClientMsg, HubEvent};
pub use surface::{
    KeySnapshot, OwnerId, RegisterRequest, Surface, SurfaceError, SurfaceId, SurfaceInfo,
    SurfaceSnapshot,
};
