//! Circuit context consumed by validation.
//!
//! Validation only reads circuit-level figures; the device load itself is
//! computed elsewhere and arrives as each record's `current`.

use serde::{Deserialize, Serialize};

use crate::address::Branch;

/// Hard limit on circuit current in amps
pub const MAX_CIRCUIT_CURRENT: f64 = 3.0;
/// Soft limit on circuit current (90% of the hard limit)
pub const CURRENT_WARNING_THRESHOLD: f64 = 2.7;
/// Utilization at or above which a circuit is critically loaded
pub const HARD_UTILIZATION_LIMIT: f64 = 0.95;

/// Signaling-line circuit type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum CircuitKind {
    /// Notification circuit, budgeted by current
    Idnac,
    /// Detection circuit, budgeted by device count
    #[default]
    Idnet,
}

impl CircuitKind {
    /// Fraction of capacity usable before spare capacity is eaten into
    pub fn default_safe_capacity(&self) -> f64 {
        match self {
            CircuitKind::Idnac => 0.80,
            CircuitKind::Idnet => 0.85,
        }
    }
}

/// Read-only circuit figures used by validation
pub trait CircuitContext {
    fn name(&self) -> &str;
    fn max_addresses(&self) -> u16;
    /// Total current of the assigned devices, in amps
    fn total_current(&self) -> f64;
    /// Safe utilization threshold as a fraction
    fn safe_capacity(&self) -> f64;
    /// Count-based utilization as a fraction
    fn utilization(&self) -> f64;

    /// Current-based utilization as a fraction of the hard limit
    fn current_utilization(&self) -> f64 {
        self.total_current() / MAX_CIRCUIT_CURRENT
    }
}

/// A signaling-line circuit and its live loading figures
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Circuit {
    pub name: String,
    #[serde(default)]
    pub kind: CircuitKind,
    pub max_addresses: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_capacity: Option<f64>,
    #[serde(skip)]
    pub device_count: usize,
    #[serde(skip)]
    pub load_current: f64,
}

impl Circuit {
    pub fn new(name: impl Into<String>, kind: CircuitKind, max_addresses: u16) -> Self {
        Circuit {
            name: name.into(),
            kind,
            max_addresses,
            safe_capacity: None,
            device_count: 0,
            load_current: 0.0,
        }
    }

    /// Recompute device count and current from the assigned devices
    pub fn refresh(&mut self, branch: &Branch) {
        let assigned = branch.devices().iter().filter(|d| d.is_assigned());
        let (count, current) = assigned.fold((0usize, 0.0f64), |(n, amps), d| (n + 1, amps + d.current));
        self.device_count = count;
        self.load_current = current;
    }
}

impl CircuitContext for Circuit {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_addresses(&self) -> u16 {
        self.max_addresses
    }

    fn total_current(&self) -> f64 {
        self.load_current
    }

    fn safe_capacity(&self) -> f64 {
        self.safe_capacity.unwrap_or_else(|| self.kind.default_safe_capacity())
    }

    fn utilization(&self) -> f64 {
        if self.max_addresses == 0 {
            return 0.0;
        }
        self.device_count as f64 / f64::from(self.max_addresses)
    }
}
