//! # slcaddr - Address allocation for signaling-line circuit branches
//!
//! This library manages unique address allocation for devices wired onto a
//! single addressable signaling-line circuit (a "branch"). It tracks which
//! addresses are free, assigns them according to policy, detects and
//! resolves conflicts, and validates candidate assignments.
//!
//! ## Key Features
//!
//! - **Exclusive ownership**: every address is owned by at most one device
//! - **Multi-slot devices**: isolators, repeaters and combined strobe/speaker
//!   devices consume two contiguous addresses
//! - **Allocation policies**: auto-assign, resequence (gap compaction),
//!   gap-fill, and first-available for a single device
//! - **Lock states**: Locked devices are never moved; manually typed
//!   addresses are kept while `preserve_manual` is set
//! - **Validation**: range, duplicate, lock, capacity and current checks with
//!   severity grading and suggested alternatives
//!
//! ## Architecture
//!
//! - `device`: device assignment records and capability lookup
//! - `address`: interval allocation, the per-branch pool, allocation
//!   policies and conflict handling
//! - `validation`: address and circuit validation
//! - `config` / `config_loader`: YAML branch files
//! - `orchestrator`: runs one operation over a branch file
//!
//! ## Example Usage
//!
//! ```rust
//! use slcaddr::address::{AddressingEngine, AddressingOptions, Branch};
//! use slcaddr::device::{DeviceAssignment, StaticCapabilities};
//!
//! let devices = vec![
//!     DeviceAssignment::new("smoke-1", "Smoke 1").with_address(1),
//!     DeviceAssignment::new("smoke-2", "Smoke 2"),
//! ];
//! let mut branch = Branch::new("Loop 1", 159, devices, &StaticCapabilities::new());
//! let engine = AddressingEngine::new(StaticCapabilities::new());
//!
//! engine.gap_fill(&mut branch, &AddressingOptions::default())?;
//! assert_eq!(branch.device("smoke-2").unwrap().address, 2);
//! assert!(engine.validate_addressing(&branch).is_valid);
//! # Ok::<(), slcaddr::address::AddressingError>(())
//! ```
//!
//! ## Concurrency
//!
//! Everything is synchronous and single threaded. A branch and its pool are
//! plain mutable state; callers must not run operations on the same branch
//! from several threads at once.
//!
//! ## Error Handling
//!
//! Running out of addresses is not an error: it shows up as an unassigned
//! device, `false` or an empty list. Faults inside a bulk operation surface
//! as `AddressingError::Operation` naming the operation; earlier placements
//! in that call are not rolled back. The binary and loader use `color_eyre`.

pub mod device;
pub mod address;
pub mod validation;
pub mod config;
pub mod config_loader;
pub mod orchestrator;
