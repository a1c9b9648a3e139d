//! Device capability lookup.
//!
//! The addressing core only needs to know whether a device is an isolator,
//! a repeater, or a combined strobe and speaker, to derive how many
//! addresses it consumes when no slot count is preset.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Capability snapshot for one device
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceCapabilities {
    #[serde(default)]
    pub is_isolator: bool,
    #[serde(default)]
    pub is_repeater: bool,
    #[serde(default)]
    pub has_strobe: bool,
    #[serde(default)]
    pub has_speaker: bool,
}

impl DeviceCapabilities {
    /// Number of addresses a device with these capabilities consumes
    pub fn address_slots(&self) -> u8 {
        if self.is_isolator || self.is_repeater || (self.has_strobe && self.has_speaker) {
            2
        } else {
            1
        }
    }
}

/// Read-only capability query, side-effect free
pub trait CapabilityProvider {
    /// Capabilities for the given device id, `None` when unknown
    fn capabilities(&self, device_id: &str) -> Option<DeviceCapabilities>;
}

/// Map-backed provider, typically filled from a branch file
#[derive(Debug, Default, Clone)]
pub struct StaticCapabilities {
    entries: HashMap<String, DeviceCapabilities>,
}

impl StaticCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, device_id: impl Into<String>, capabilities: DeviceCapabilities) {
        self.entries.insert(device_id.into(), capabilities);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CapabilityProvider for StaticCapabilities {
    fn capabilities(&self, device_id: &str) -> Option<DeviceCapabilities> {
        self.entries.get(device_id).copied()
    }
}
