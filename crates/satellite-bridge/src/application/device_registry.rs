//! DeviceRegistry: configured descriptors plus per-device handshake status.
//!
//! # Handshake lifecycle
//!
//! ```text
//! Unregistered ──ADD-DEVICE sent──► Pending ──ack OK──► Registered
//!       ▲                              │
//!       └──────── ack failed ──────────┘
//!
//! any disconnect: Pending, Registered ──► Unregistered
//! ```
//!
//! A device id is in at most one of the pending and registered sets.  Both
//! sets are emptied on every disconnect because the peer forgets
//! registrations together with the connection.

use std::collections::BTreeSet;

use satellite_core::DeviceDescriptor;

/// Registration status of one device against the current connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    Unregistered,
    Pending,
    Registered,
}

/// Result of applying an `ADD-DEVICE` acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Registered,
    Rejected,
    /// The id is not a configured device, or no registration is pending
    /// for it.
    Ignored,
}

/// A descriptor that left the registry during a reload, with the status it
/// had at that moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departed {
    pub descriptor: DeviceDescriptor,
    pub status: HandshakeStatus,
}

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<DeviceDescriptor>,
    pending: BTreeSet<String>,
    registered: BTreeSet<String>,
}

impl DeviceRegistry {
    pub fn new(devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            devices,
            ..Self::default()
        }
    }

    /// Replaces the descriptor set wholesale.
    ///
    /// Returns every previous descriptor that is absent from `devices` or
    /// whose descriptor changed.  A changed device restarts as
    /// `Unregistered`; unchanged devices keep their status.
    pub fn replace(&mut self, devices: Vec<DeviceDescriptor>) -> Vec<Departed> {
        let previous = std::mem::replace(&mut self.devices, devices);
        let mut departed = Vec::new();

        for old in previous {
            if self.devices.contains(&old) {
                continue;
            }
            let status = self.status(&old.id);
            self.pending.remove(&old.id);
            self.registered.remove(&old.id);
            departed.push(Departed {
                descriptor: old,
                status,
            });
        }
        departed
    }

    pub fn descriptors(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    pub fn get(&self, id: &str) -> Option<&DeviceDescriptor> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn status(&self, id: &str) -> HandshakeStatus {
        if self.registered.contains(id) {
            HandshakeStatus::Registered
        } else if self.pending.contains(id) {
            HandshakeStatus::Pending
        } else {
            HandshakeStatus::Unregistered
        }
    }

    /// Moves `id` to `Pending` if it is configured and currently
    /// `Unregistered`.  Returns `true` when an `ADD-DEVICE` should be sent.
    pub fn begin_registration(&mut self, id: &str) -> bool {
        if self.get(id).is_none() || self.status(id) != HandshakeStatus::Unregistered {
            return false;
        }
        self.pending.insert(id.to_string());
        true
    }

    /// Ids of configured devices that are neither pending nor registered, in
    /// configuration order.
    pub fn unregistered_ids(&self) -> Vec<String> {
        self.devices
            .iter()
            .filter(|d| self.status(&d.id) == HandshakeStatus::Unregistered)
            .map(|d| d.id.clone())
            .collect()
    }

    /// Applies an acknowledgment for `id`.
    pub fn acknowledge(&mut self, id: &str, success: bool) -> AckOutcome {
        if !self.pending.remove(id) {
            return AckOutcome::Ignored;
        }
        if success {
            self.registered.insert(id.to_string());
            AckOutcome::Registered
        } else {
            AckOutcome::Rejected
        }
    }

    pub fn registered_ids(&self) -> Vec<String> {
        self.registered.iter().cloned().collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }

    /// Forgets every pending and registered entry.
    pub fn clear_handshake(&mut self) {
        self.pending.clear();
        self.registered.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str) -> DeviceDescriptor {
        DeviceDescriptor {
            id: id.to_string(),
            ..DeviceDescriptor::default()
        }
    }

    #[test]
    fn test_new_devices_start_unregistered() {
        let reg = DeviceRegistry::new(vec![device("a"), device("b")]);
        assert_eq!(reg.status("a"), HandshakeStatus::Unregistered);
        assert_eq!(reg.unregistered_ids(), vec!["a", "b"]);
    }

    #[test]
    fn test_begin_registration_is_idempotent() {
        // Arrange
        let mut reg = DeviceRegistry::new(vec![device("dev1")]);

        // Act
        let first = reg.begin_registration("dev1");
        let second = reg.begin_registration("dev1");

        // Assert
        assert!(first);
        assert!(!second);
        assert_eq!(reg.pending_count(), 1);
    }

    #[test]
    fn test_begin_registration_unknown_device_is_refused() {
        let mut reg = DeviceRegistry::new(vec![device("dev1")]);
        assert!(!reg.begin_registration("ghost"));
        assert_eq!(reg.pending_count(), 0);
    }

    #[test]
    fn test_successful_ack_moves_pending_to_registered() {
        // Arrange
        let mut reg = DeviceRegistry::new(vec![device("dev1")]);
        reg.begin_registration("dev1");

        // Act
        let outcome = reg.acknowledge("dev1", true);

        // Assert
        assert_eq!(outcome, AckOutcome::Registered);
        assert_eq!(reg.status("dev1"), HandshakeStatus::Registered);
        assert_eq!(reg.pending_count(), 0);
        assert_eq!(reg.registered_count(), 1);
    }

    #[test]
    fn test_failed_ack_returns_device_to_unregistered() {
        let mut reg = DeviceRegistry::new(vec![device("dev1")]);
        reg.begin_registration("dev1");
        assert_eq!(reg.acknowledge("dev1", false), AckOutcome::Rejected);
        assert_eq!(reg.status("dev1"), HandshakeStatus::Unregistered);
    }

    #[test]
    fn test_ack_for_unknown_device_is_ignored() {
        let mut reg = DeviceRegistry::new(vec![device("dev1")]);
        reg.begin_registration("dev1");
        assert_eq!(reg.acknowledge("other", true), AckOutcome::Ignored);
        assert_eq!(reg.acknowledge("", true), AckOutcome::Ignored);
        assert_eq!(reg.status("dev1"), HandshakeStatus::Pending);
    }

    #[test]
    fn test_ack_without_pending_registration_is_ignored() {
        // Arrange
        let mut reg = DeviceRegistry::new(vec![device("dev1")]);

        // Act
        let outcome = reg.acknowledge("dev1", true);

        // Assert
        assert_eq!(outcome, AckOutcome::Ignored);
        assert_eq!(reg.status("dev1"), HandshakeStatus::Unregistered);
        assert!(reg.begin_registration("dev1"));
    }

    #[test]
    fn test_repeated_ack_after_registration_is_ignored() {
        let mut reg = DeviceRegistry::new(vec![device("dev1")]);
        reg.begin_registration("dev1");
        reg.acknowledge("dev1", true);

        assert_eq!(reg.acknowledge("dev1", false), AckOutcome::Ignored);
        assert_eq!(reg.status("dev1"), HandshakeStatus::Registered);
    }

    #[test]
    fn test_clear_handshake_empties_both_sets() {
        let mut reg = DeviceRegistry::new(vec![device("a"), device("b")]);
        reg.begin_registration("a");
        reg.begin_registration("b");
        reg.acknowledge("a", true);

        reg.clear_handshake();

        assert_eq!(reg.pending_count(), 0);
        assert_eq!(reg.registered_count(), 0);
        assert_eq!(reg.unregistered_ids(), vec!["a", "b"]);
    }

    #[test]
    fn test_replace_reports_removed_and_changed_devices() {
        // Arrange
        let mut reg = DeviceRegistry::new(vec![device("keep"), device("drop"), device("change")]);
        for id in ["keep", "drop", "change"] {
            reg.begin_registration(id);
            reg.acknowledge(id, true);
        }
        let mut changed = device("change");
        changed.columns = 5;

        // Act
        let departed = reg.replace(vec![device("keep"), changed, device("new")]);

        // Assert
        let ids: Vec<&str> = departed.iter().map(|d| d.descriptor.id.as_str()).collect();
        assert_eq!(ids, vec!["drop", "change"]);
        assert!(departed.iter().all(|d| d.status == HandshakeStatus::Registered));
        assert_eq!(reg.status("keep"), HandshakeStatus::Registered);
        assert_eq!(reg.status("change"), HandshakeStatus::Unregistered);
        assert_eq!(reg.status("new"), HandshakeStatus::Unregistered);
        assert_eq!(reg.get("change").map(|d| d.columns), Some(5));
    }

    #[test]
    fn test_replace_with_nothing_empties_registry() {
        let mut reg = DeviceRegistry::new(vec![device("a")]);
        let departed = reg.replace(vec![]);
        assert_eq!(departed.len(), 1);
        assert!(reg.is_empty());
    }
}
