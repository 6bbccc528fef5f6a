//! [`SurfaceSink`] backed by the in-process surface hub.
//!
//! All satellite devices are registered under one [`OwnerId`], so removing a
//! device never touches a surface some other source registered under the
//! same id.

use satellite_core::{DeviceDescriptor, KeyPos, KeyVisualState};
use surface_hub::{OwnerId, SurfaceHub, SurfaceInfo};
use tracing::{debug, warn};

use crate::application::SurfaceSink;

pub struct HubSurfaces {
    hub: SurfaceHub,
    owner: OwnerId,
}

impl HubSurfaces {
    pub fn new(hub: SurfaceHub) -> Self {
        Self {
            hub,
            owner: OwnerId::new(),
        }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }
}

impl SurfaceSink for HubSurfaces {
    fn register(&self, device: &DeviceDescriptor, product: &str, host: &str) {
        let info = SurfaceInfo {
            name: device.id.clone(),
            product: product.to_string(),
            host: host.to_string(),
            columns: device.columns,
            rows: device.rows,
        };
        if let Err(e) = self.hub.register(self.owner, &device.id, info) {
            warn!("device {:?} not mirrored to surface hub: {e}", device.id);
        }
    }

    fn remove(&self, device_id: &str) {
        let owner = self.owner;
        self.hub.with(|registry| {
            if registry.get(device_id).map(|s| s.owner) == Some(owner) {
                registry.remove(device_id);
            }
        });
    }

    fn draw(&self, device_id: &str, pos: KeyPos, state: &KeyVisualState) {
        if let Err(e) = self
            .hub
            .draw(device_id, i64::from(pos.x), i64::from(pos.y), state)
        {
            debug!("draw on {device_id:?} dropped: {e}");
        }
    }

    fn clear(&self, device_id: &str) {
        if let Err(e) = self.hub.clear_keys(device_id) {
            debug!("clear on {device_id:?} dropped: {e}");
        }
    }

    fn key(&self, device_id: &str, pos: KeyPos, pressed: bool) {
        if let Err(e) = self
            .hub
            .key(device_id, i64::from(pos.x), i64::from(pos.y), pressed)
        {
            debug!("key on {device_id:?} dropped: {e}");
        }
    }
}
