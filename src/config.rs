//! Branch file configuration.
//!
//! A branch file describes one circuit, the addressing options to apply,
//! and the devices wired on it:
//!
//! ```yaml
//! circuit:
//!   name: "Loop 1"
//!   kind: Idnet
//!   max_addresses: 159
//! options:
//!   start_address: 1
//!   preserve_manual: true
//! devices:
//!   - id: "smoke-1"
//!     name: "Smoke 1"
//!     address: 1
//!   - id: "iso-1"
//!     capabilities:
//!       is_isolator: true
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::address::{AddressingOptions, Branch};
use crate::device::{DeviceAssignment, DeviceCapabilities, StaticCapabilities};
use crate::validation::{Circuit, CircuitContext};

/// Largest address range a branch file may declare
pub const MAX_BRANCH_ADDRESSES: u16 = 999;

/// One device entry: the assignment record plus optional capabilities
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DeviceConfig {
    #[serde(flatten)]
    pub device: DeviceAssignment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<DeviceCapabilities>,
}

/// Complete description of a branch
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BranchConfig {
    pub circuit: Circuit,
    #[serde(default)]
    pub options: AddressingOptions,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid circuit configuration: {0}")]
    InvalidCircuit(String),
    #[error("Invalid addressing options: {0}")]
    InvalidOptions(String),
    #[error("Invalid device configuration: {0}")]
    InvalidDevice(String),
}

impl BranchConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let max = self.circuit.max_addresses;
        if max == 0 || max > MAX_BRANCH_ADDRESSES {
            return Err(ConfigError::InvalidCircuit(format!(
                "max_addresses {} out of range (must be 1-{})",
                max, MAX_BRANCH_ADDRESSES
            )));
        }

        let safe = self.circuit.safe_capacity();
        if !(safe > 0.0 && safe <= 1.0) {
            return Err(ConfigError::InvalidCircuit(format!(
                "safe_capacity {} must be a fraction in (0, 1]",
                safe
            )));
        }

        let start = self.options.start_address;
        if start == 0 || start > max {
            return Err(ConfigError::InvalidOptions(format!(
                "start_address {} out of range (must be 1-{})",
                start, max
            )));
        }

        let mut seen = HashSet::new();
        for entry in &self.devices {
            let id = &entry.device.id;
            if id.trim().is_empty() {
                return Err(ConfigError::InvalidDevice("device id cannot be empty".to_string()));
            }
            if !seen.insert(id.as_str()) {
                return Err(ConfigError::InvalidDevice(format!("duplicate device id '{}'", id)));
            }
            if entry.device.current < 0.0 {
                return Err(ConfigError::InvalidDevice(format!(
                    "device '{}' has negative current {}",
                    id, entry.device.current
                )));
            }
        }

        Ok(())
    }

    /// Capability lookup built from the device entries
    pub fn capability_provider(&self) -> StaticCapabilities {
        let mut provider = StaticCapabilities::new();
        for entry in &self.devices {
            if let Some(caps) = entry.capabilities {
                provider.insert(entry.device.id.clone(), caps);
            }
        }
        provider
    }

    /// Branch with a fresh pool for this circuit
    pub fn build_branch(&self, provider: &StaticCapabilities) -> Branch {
        let devices = self.devices.iter().map(|entry| entry.device.clone()).collect();
        Branch::new(self.circuit.name.clone(), self.circuit.max_addresses, devices, provider)
    }
}
