//! SurfaceRegistry: the in-memory surface table and its fan-out.
//!
//! Every mutating operation validates the surface id first, applies the
//! change, and then publishes exactly one [`HubEvent`]:
//!
//! | Operation        | Broadcast                 |
//! |------------------|---------------------------|
//! | `register`       | full snapshot             |
//! | `draw`           | `draw` delta (submitted fields) |
//! | `key`            | `key` (not cached)        |
//! | `clear_keys`     | full snapshot             |
//! | `remove[_owned]` | full snapshot             |
//!
//! Publishing never fails from the caller's point of view: a broadcast with
//! zero subscribers is simply dropped.
//!
//! [`SurfaceHub`] wraps the registry in `Arc<Mutex<..>>` so the satellite
//! driver task and every WebSocket session can share it.  Each call holds the
//! lock for the whole operation, so mutations and their broadcasts are
//! observed in one global order.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use satellite_core::{KeyPos, KeyVisualState};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::domain::{
    HubEvent, OwnerId, Surface, SurfaceError, SurfaceId, SurfaceInfo, SurfaceSnapshot,
};

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// The surface table plus its broadcast sender.
pub struct SurfaceRegistry {
    surfaces: BTreeMap<SurfaceId, Surface>,
    events: broadcast::Sender<HubEvent>,
    clock: fn() -> u64,
}

impl SurfaceRegistry {
    /// Creates an empty registry whose broadcast buffer holds `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, now_ms)
    }

    /// Like [`SurfaceRegistry::new`] with an injected clock.
    pub fn with_clock(capacity: usize, clock: fn() -> u64) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            surfaces: BTreeMap::new(),
            events,
            clock,
        }
    }

    /// New receiver for every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.events.subscribe()
    }

    /// Creates or replaces a surface with an empty key cache.
    pub fn register(
        &mut self,
        owner: OwnerId,
        surface_id: &str,
        info: SurfaceInfo,
    ) -> Result<(), SurfaceError> {
        let id = SurfaceId::parse(surface_id)?;
        let now = (self.clock)();
        let surface = Surface::new(id.clone(), owner, info, now);
        info!(
            "surface {id} registered ({}×{}, product {:?}, host {:?})",
            surface.info.columns, surface.info.rows, surface.info.product, surface.info.host
        );
        self.surfaces.insert(id, surface);
        self.publish_snapshot();
        Ok(())
    }

    /// Merges `patch` into the key at the clamped `(x, y)`.
    ///
    /// Returns the position that was written.
    pub fn draw(
        &mut self,
        surface_id: &str,
        x: i64,
        y: i64,
        patch: &KeyVisualState,
    ) -> Result<KeyPos, SurfaceError> {
        let now = (self.clock)();
        let surface = self.lookup_mut(surface_id)?;
        let pos = surface.clamp(x, y);
        surface.last_seen = now;
        surface.merge_key(pos, patch);
        let event = HubEvent::Draw {
            surface_id: surface.id.clone(),
            x: pos.x,
            y: pos.y,
            state: patch.clone(),
        };
        self.publish(event);
        Ok(pos)
    }

    /// Signals a press or release at the clamped `(x, y)`.
    pub fn key(
        &mut self,
        surface_id: &str,
        x: i64,
        y: i64,
        pressed: bool,
    ) -> Result<KeyPos, SurfaceError> {
        let now = (self.clock)();
        let surface = self.lookup_mut(surface_id)?;
        let pos = surface.clamp(x, y);
        surface.last_seen = now;
        let event = HubEvent::Key {
            surface_id: surface.id.clone(),
            x: pos.x,
            y: pos.y,
            pressed,
        };
        self.publish(event);
        Ok(pos)
    }

    /// Empties a surface's key cache.
    pub fn clear_keys(&mut self, surface_id: &str) -> Result<(), SurfaceError> {
        let now = (self.clock)();
        let surface = self.lookup_mut(surface_id)?;
        surface.keys.clear();
        surface.last_seen = now;
        self.publish_snapshot();
        Ok(())
    }

    /// Deletes one surface.  Returns `false` if it did not exist.
    pub fn remove(&mut self, surface_id: &str) -> bool {
        let Ok(id) = SurfaceId::parse(surface_id) else {
            return false;
        };
        if self.surfaces.remove(&id).is_some() {
            info!("surface {id} removed");
            self.publish_snapshot();
            true
        } else {
            false
        }
    }

    /// Deletes every surface registered by `owner` and publishes one snapshot
    /// if anything changed.  Returns the number removed.
    pub fn remove_owned(&mut self, owner: OwnerId) -> usize {
        let before = self.surfaces.len();
        self.surfaces.retain(|_, s| s.owner != owner);
        let removed = before - self.surfaces.len();
        if removed > 0 {
            info!("removed {removed} surface(s) owned by {owner}");
            self.publish_snapshot();
        }
        removed
    }

    pub fn get(&self, surface_id: &str) -> Option<&Surface> {
        let id = SurfaceId::parse(surface_id).ok()?;
        self.surfaces.get(&id)
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// Current state of every surface, ordered by id.
    pub fn snapshot(&self) -> Vec<SurfaceSnapshot> {
        self.surfaces.values().map(Surface::snapshot).collect()
    }

    pub fn snapshot_event(&self) -> HubEvent {
        HubEvent::Snapshot {
            surfaces: self.snapshot(),
        }
    }

    fn lookup_mut(&mut self, surface_id: &str) -> Result<&mut Surface, SurfaceError> {
        let id = SurfaceId::parse(surface_id)?;
        self.surfaces
            .get_mut(&id)
            .ok_or_else(|| SurfaceError::UnknownSurface(surface_id.to_string()))
    }

    fn publish_snapshot(&self) {
        self.publish(self.snapshot_event());
    }

    fn publish(&self, event: HubEvent) {
        let kind = event.kind();
        // `send` only fails when nobody is subscribed.
        if let Ok(n) = self.events.send(event) {
            debug!("{kind} event fanned out to {n} subscriber(s)");
        }
    }
}

// ── Shared handle ─────────────────────────────────────────────────────────────

/// Cloneable, thread-safe handle to one [`SurfaceRegistry`].
#[derive(Clone)]
pub struct SurfaceHub {
    inner: Arc<Mutex<SurfaceRegistry>>,
}

impl SurfaceHub {
    pub fn new(capacity: usize) -> Self {
        Self::from_registry(SurfaceRegistry::new(capacity))
    }

    pub fn from_registry(registry: SurfaceRegistry) -> Self {
        Self {
            inner: Arc::new(Mutex::new(registry)),
        }
    }

    /// Runs `f` with exclusive access to the registry.
    pub fn with<R>(&self, f: impl FnOnce(&mut SurfaceRegistry) -> R) -> R {
        f(&mut *self.lock())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.lock().subscribe()
    }

    /// Subscribes and captures the current snapshot under the same lock, so
    /// the receiver sees every change made after the snapshot.
    pub fn subscribe_with_snapshot(&self) -> (broadcast::Receiver<HubEvent>, HubEvent) {
        let registry = self.lock();
        (registry.subscribe(), registry.snapshot_event())
    }

    pub fn register(
        &self,
        owner: OwnerId,
        surface_id: &str,
        info: SurfaceInfo,
    ) -> Result<(), SurfaceError> {
        self.lock().register(owner, surface_id, info)
    }

    pub fn draw(
        &self,
        surface_id: &str,
        x: i64,
        y: i64,
        patch: &KeyVisualState,
    ) -> Result<KeyPos, SurfaceError> {
        self.lock().draw(surface_id, x, y, patch)
    }

    pub fn key(&self, surface_id: &str, x: i64, y: i64, pressed: bool) -> Result<KeyPos, SurfaceError> {
        self.lock().key(surface_id, x, y, pressed)
    }

    pub fn clear_keys(&self, surface_id: &str) -> Result<(), SurfaceError> {
        self.lock().clear_keys(surface_id)
    }

    pub fn remove(&self, surface_id: &str) -> bool {
        self.lock().remove(surface_id)
    }

    pub fn remove_owned(&self, owner: OwnerId) -> usize {
        self.lock().remove_owned(owner)
    }

    pub fn snapshot(&self) -> Vec<SurfaceSnapshot> {
        self.lock().snapshot()
    }

    pub fn snapshot_event(&self) -> HubEvent {
        self.lock().snapshot_event()
    }

    // A panic while holding the lock cannot leave the table half-updated in a
    // way later callers care about, so a poisoned lock is reused.
    fn lock(&self) -> MutexGuard<'_, SurfaceRegistry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
