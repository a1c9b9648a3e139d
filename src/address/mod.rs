//! Address allocation and management module.
//!
//! This module handles address ownership for devices on one branch: the
//! interval arithmetic behind first-fit placement, the per-branch address
//! pool, the allocation policies, and conflict detection and resolution.

pub mod interval;
pub mod pool;
pub mod branch;
pub mod allocator;
pub mod conflicts;
pub mod error;

// Re-export commonly used types
pub use interval::{AddressInterval, find_first_fit, merge_intervals};
pub use pool::{AddressPool, PoolStats};
pub use branch::Branch;
pub use allocator::{AddressingEngine, AddressingOptions, AllocationSummary, resolve_address_slots};
pub use conflicts::{AddressConflict, AddressingReport, AddressingStats};
pub use error::AddressingError;
