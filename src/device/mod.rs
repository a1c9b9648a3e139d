//! Device assignment records and capability lookup.
//!
//! This module holds the per-device state the addressing core mutates
//! (address, slot count, lock state, manual flag and assignment metadata)
//! and the narrow capability query used to derive default slot counts.

pub mod types;
pub mod capabilities;

// Re-export commonly used types
pub use types::{DeviceAssignment, LockState};
pub use capabilities::{CapabilityProvider, DeviceCapabilities, StaticCapabilities};
