//! Device assignment record.
//!
//! A record is created unassigned (`address == 0`) when a device enters a
//! branch and is mutated only by the pool and the policy engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::interval::AddressInterval;

/// Lock state of a device as decided outside the addressing core
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LockState {
    /// Freely relocatable by every bulk operation
    #[default]
    Auto,
    /// Address was set by a person; protected while `preserve_manual` is set
    Manual,
    /// Installed in the field; never relocated
    Locked,
}

/// Address assignment state for one device on a branch
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DeviceAssignment {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Base address, 0 when unassigned
    #[serde(default)]
    pub address: u16,
    /// Contiguous addresses consumed at `address`; 0 means not preset
    #[serde(default)]
    pub address_slots: u8,
    #[serde(default)]
    pub lock_state: LockState,
    /// A human explicitly typed this address
    #[serde(default)]
    pub is_manual_address: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_by: Option<String>,
    /// Alarm current in amps, computed by the caller
    #[serde(default)]
    pub current: f64,
    /// Address matching the device's physical position on the loop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_address: Option<u16>,
}

impl DeviceAssignment {
    /// Create an unassigned Auto device
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        DeviceAssignment {
            id: id.into(),
            name: name.into(),
            address: 0,
            address_slots: 0,
            lock_state: LockState::Auto,
            is_manual_address: false,
            assigned_at: None,
            assigned_by: None,
            current: 0.0,
            preferred_address: None,
        }
    }

    pub fn with_slots(mut self, slots: u8) -> Self {
        self.address_slots = slots;
        self
    }

    pub fn with_address(mut self, address: u16) -> Self {
        self.address = address;
        self
    }

    pub fn with_lock_state(mut self, lock_state: LockState) -> Self {
        self.lock_state = lock_state;
        self
    }

    pub fn with_manual_address(mut self, address: u16) -> Self {
        self.address = address;
        self.is_manual_address = true;
        self
    }

    pub fn with_current(mut self, current: f64) -> Self {
        self.current = current;
        self
    }

    pub fn is_assigned(&self) -> bool {
        self.address > 0
    }

    pub fn is_locked(&self) -> bool {
        self.lock_state == LockState::Locked
    }

    /// Manual here means either the flag or the Manual lock state
    pub fn is_manual(&self) -> bool {
        self.is_manual_address || self.lock_state == LockState::Manual
    }

    /// Display name, falling back to the id
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Occupied block for a resolved slot count, `None` when unassigned
    pub fn block(&self, slots: u8) -> Option<AddressInterval> {
        if !self.is_assigned() {
            return None;
        }
        let slots = u16::from(slots.max(1));
        Some(AddressInterval::new(self.address, self.address.saturating_add(slots - 1)))
    }

    /// Record a new address and stamp the assignment metadata
    pub fn set_address(&mut self, address: u16, owner: &str) {
        self.address = address;
        self.assigned_at = Some(Utc::now());
        self.assigned_by = Some(owner.to_string());
    }

    /// Return to the unassigned state; metadata is cleared, not restored
    pub fn clear_address(&mut self) {
        self.address = 0;
        self.is_manual_address = false;
        self.assigned_at = None;
        self.assigned_by = None;
    }
}
