//! Application layer for surface-hub.
//!
//! [`registry`] owns all surface mutations and the broadcast fan-out.  It is
//! synchronous: callers in async code take the [`SurfaceHub`] lock, run one
//! operation to completion, and release it without awaiting.

pub mod registry;

pub use registry::{now_ms, SurfaceHub, SurfaceRegistry};
