//! Errors raised by the addressing core.
//!
//! Capacity exhaustion is not an error: it shows up as an unassigned
//! device, `false` or an empty list. These variants cover faults that
//! abort the remainder of a call.

use super::interval::AddressInterval;

/// Errors that can occur while applying an addressing policy
#[derive(Debug, thiserror::Error)]
pub enum AddressingError {
    #[error("Device not found in branch: {0}")]
    UnknownDevice(String),

    #[error("Pool refused block {block} for device {device_id}")]
    BlockRefused { device_id: String, block: AddressInterval },

    #[error("{operation} failed: {source}")]
    Operation {
        operation: &'static str,
        #[source]
        source: Box<AddressingError>,
    },
}

impl AddressingError {
    /// Wrap a fault with the name of the bulk operation it aborted
    pub fn during(self, operation: &'static str) -> Self {
        match self {
            already @ AddressingError::Operation { .. } => already,
            other => AddressingError::Operation { operation, source: Box::new(other) },
        }
    }

    /// Name of the operation this fault aborted, if wrapped
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            AddressingError::Operation { operation, .. } => Some(*operation),
            _ => None,
        }
    }
}
