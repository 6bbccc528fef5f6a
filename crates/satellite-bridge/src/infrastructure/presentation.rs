//! Presentation fan-out over a tokio channel.
//!
//! Rendering is the shell's business; the bridge only publishes what a
//! per-device view would need to draw.

use satellite_core::{DeviceDescriptor, KeyPos, KeyVisualState};
use tokio::sync::mpsc;
use tracing::debug;

use crate::application::PresentationSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentationEvent {
    Open(DeviceDescriptor),
    Close {
        device_id: String,
    },
    Draw {
        device_id: String,
        pos: KeyPos,
        state: KeyVisualState,
    },
    Clear {
        device_id: String,
    },
}

impl PresentationEvent {
    pub fn device_id(&self) -> &str {
        match self {
            PresentationEvent::Open(device) => &device.id,
            PresentationEvent::Close { device_id }
            | PresentationEvent::Draw { device_id, .. }
            | PresentationEvent::Clear { device_id } => device_id,
        }
    }
}

/// [`PresentationSink`] that forwards every call as a [`PresentationEvent`].
#[derive(Debug, Clone)]
pub struct ChannelPresenter {
    tx: mpsc::UnboundedSender<PresentationEvent>,
}

/// Creates a presenter and the receiver the shell drains.
pub fn channel() -> (ChannelPresenter, mpsc::UnboundedReceiver<PresentationEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelPresenter { tx }, rx)
}

impl ChannelPresenter {
    fn emit(&self, event: PresentationEvent) {
        if self.tx.send(event).is_err() {
            debug!("presentation consumer gone; event dropped");
        }
    }
}

impl PresentationSink for ChannelPresenter {
    fn open(&self, device: &DeviceDescriptor) {
        self.emit(PresentationEvent::Open(device.clone()));
    }

    fn close(&self, device_id: &str) {
        self.emit(PresentationEvent::Close {
            device_id: device_id.to_string(),
        });
    }

    fn draw(&self, device_id: &str, pos: KeyPos, state: &KeyVisualState) {
        self.emit(PresentationEvent::Draw {
            device_id: device_id.to_string(),
            pos,
            state: state.clone(),
        });
    }

    fn clear(&self, device_id: &str) {
        self.emit(PresentationEvent::Clear {
            device_id: device_id.to_string(),
        });
    }
}
