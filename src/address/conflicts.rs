//! Conflict detection and resolution.
//!
//! A conflict is any address claimed by more than one device block. Only
//! conflicts among plain Auto devices are resolved automatically; anything
//! involving a Locked device is left for a person to sort out.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::allocator::{AddressingEngine, AddressingOptions};
use super::branch::Branch;
use super::error::AddressingError;
use crate::device::{CapabilityProvider, LockState};

/// One address claimed by several devices
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct AddressConflict {
    pub address: u16,
    pub device_ids: Vec<String>,
    /// Every claimant is in the Auto state
    pub can_auto_resolve: bool,
}

/// Occupancy figures for a branch
#[derive(Debug, Serialize, Clone, PartialEq, Eq, Default)]
pub struct AddressingStats {
    /// Lowest occupied address, 0 when nothing is assigned
    pub min_address: u16,
    /// Highest occupied address, 0 when nothing is assigned
    pub max_address: u16,
    pub locked_count: usize,
    pub auto_count: usize,
    pub manual_count: usize,
    pub assigned_count: usize,
    pub total_count: usize,
}

/// Result of validating the addressing of a whole branch
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct AddressingReport {
    pub is_valid: bool,
    pub conflicts: Vec<AddressConflict>,
    pub stats: AddressingStats,
}

impl AddressingReport {
    /// Distinct ids of devices involved in any conflict
    pub fn conflicting_devices(&self) -> BTreeSet<&str> {
        self.conflicts
            .iter()
            .flat_map(|c| c.device_ids.iter().map(String::as_str))
            .collect()
    }
}

impl<P: CapabilityProvider> AddressingEngine<P> {
    /// Expand every assigned device into its block and report addresses
    /// claimed more than once, plus occupancy stats.
    pub fn validate_addressing(&self, branch: &Branch) -> AddressingReport {
        let mut claims: BTreeMap<u16, Vec<usize>> = BTreeMap::new();
        let mut stats = AddressingStats { total_count: branch.devices.len(), ..Default::default() };

        for (i, device) in branch.devices.iter().enumerate() {
            let Some(block) = device.block(self.get_address_slots(device)) else {
                continue;
            };
            stats.assigned_count += 1;
            match device.lock_state {
                LockState::Locked => stats.locked_count += 1,
                LockState::Manual => stats.manual_count += 1,
                LockState::Auto if device.is_manual_address => stats.manual_count += 1,
                LockState::Auto => stats.auto_count += 1,
            }
            for address in block.iter() {
                claims.entry(address).or_default().push(i);
            }
        }

        stats.min_address = claims.keys().next().copied().unwrap_or(0);
        stats.max_address = claims.keys().next_back().copied().unwrap_or(0);

        let conflicts: Vec<AddressConflict> = claims
            .into_iter()
            .filter(|(_, claimants)| claimants.len() > 1)
            .map(|(address, claimants)| AddressConflict {
                address,
                can_auto_resolve: claimants
                    .iter()
                    .all(|&i| branch.devices[i].lock_state == LockState::Auto),
                device_ids: claimants.iter().map(|&i| branch.devices[i].id.clone()).collect(),
            })
            .collect();

        AddressingReport { is_valid: conflicts.is_empty(), conflicts, stats }
    }

    /// Clear the Auto devices in auto-resolvable conflicts and gap-fill them
    /// back in. Returns whether the branch is conflict free afterwards.
    ///
    /// Locked devices, and manual devices while `preserve_manual` is set,
    /// are never cleared, so conflicts involving them stay unresolved.
    pub fn resolve_conflicts(&self, branch: &mut Branch, options: &AddressingOptions) -> Result<bool, AddressingError> {
        let report = self.validate_addressing(branch);
        if report.is_valid {
            return Ok(true);
        }

        let mut to_clear: BTreeSet<&str> = BTreeSet::new();
        for conflict in &report.conflicts {
            if !conflict.can_auto_resolve {
                log::warn!(
                    "Conflict at address {} on branch {} involves a locked device: {}",
                    conflict.address, branch.name(), conflict.device_ids.join(", ")
                );
                continue;
            }
            for id in &conflict.device_ids {
                if let Some(device) = branch.device(id) {
                    if !(options.preserve_manual && device.is_manual()) {
                        to_clear.insert(id.as_str());
                    }
                }
            }
        }

        if to_clear.is_empty() {
            log::warn!("No conflicts on branch {} can be resolved automatically", branch.name());
            return Ok(false);
        }

        let indices: Vec<usize> = to_clear
            .iter()
            .map(|id| branch.index_of(id))
            .collect::<Result<_, _>>()
            .map_err(|e| e.during("resolve_conflicts"))?;
        log::info!("Clearing {} conflicting device(s) on branch {}", indices.len(), branch.name());
        for i in indices {
            branch.clear(i);
        }
        // Records that lost a collision at load time may own their block now
        branch.reconcile_pool();

        self.gap_fill(branch, options)?;

        let after = self.validate_addressing(branch);
        if !after.is_valid {
            log::warn!("{} conflict(s) remain on branch {}", after.conflicts.len(), branch.name());
        }
        Ok(after.is_valid)
    }
}
