//! Address allocation policies.
//!
//! This file contains the bulk and single-device allocation policies for a
//! branch: sequential auto-assignment, gap compaction (resequence),
//! gap-fill, and first-available for one device. All of them place devices
//! with lowest-address first fit over the merged occupied intervals.
//!
//! Bulk operations are not transactional. A fault part way through a call
//! aborts the rest of it and leaves earlier placements in place.

use serde::{Deserialize, Serialize};

use super::branch::Branch;
use super::error::AddressingError;
use super::interval::{extend_occupied, find_first_fit, merge_intervals, AddressInterval};
use crate::device::{CapabilityProvider, DeviceAssignment, LockState};

/// Default `assigned_by` stamp for placements made by the engine
pub const DEFAULT_OWNER: &str = "slcaddr";

/// Per-call addressing configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AddressingOptions {
    pub start_address: u16,
    /// Don't move manually typed addresses
    pub preserve_manual: bool,
    /// Never move Locked devices
    pub respect_locks: bool,
    /// Run a gap-fill pass for unassigned devices after resequencing
    pub gap_fill: bool,
}

impl Default for AddressingOptions {
    fn default() -> Self {
        Self {
            start_address: 1,
            preserve_manual: true,
            respect_locks: true,
            gap_fill: true,
        }
    }
}

impl AddressingOptions {
    /// Device keeps its current address for this call
    pub fn is_pinned(&self, device: &DeviceAssignment) -> bool {
        device.is_locked() || (self.preserve_manual && device.is_manual())
    }
}

/// Outcome counts for one bulk operation
#[derive(Debug, Serialize, Clone, PartialEq, Eq, Default)]
pub struct AllocationSummary {
    pub operation: String,
    /// Devices placed at a (possibly unchanged) address
    pub assigned: usize,
    /// Devices left where they were because they are pinned
    pub skipped: usize,
    /// Devices left unassigned because no block fit
    pub unplaced: usize,
}

impl AllocationSummary {
    fn new(operation: &str) -> Self {
        Self { operation: operation.to_string(), ..Default::default() }
    }
}

/// Slot count for a device: the preset value if set, otherwise derived
/// from its capabilities
pub fn resolve_address_slots<P: CapabilityProvider + ?Sized>(device: &DeviceAssignment, provider: &P) -> u8 {
    if device.address_slots > 0 {
        return device.address_slots;
    }
    provider
        .capabilities(&device.id)
        .map(|caps| caps.address_slots())
        .unwrap_or(1)
}

/// Allocation policy engine for branches
#[derive(Debug, Clone)]
pub struct AddressingEngine<P: CapabilityProvider> {
    provider: P,
    owner: String,
}

impl<P: CapabilityProvider> AddressingEngine<P> {
    pub fn new(provider: P) -> Self {
        AddressingEngine { provider, owner: DEFAULT_OWNER.to_string() }
    }

    /// Name stamped into `assigned_by` for every placement
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn get_address_slots(&self, device: &DeviceAssignment) -> u8 {
        resolve_address_slots(device, &self.provider)
    }

    /// Occupied blocks of the devices at `indices`
    pub(crate) fn blocks_of<'a>(
        &self,
        branch: &Branch,
        indices: impl IntoIterator<Item = &'a usize>,
    ) -> Vec<AddressInterval> {
        let intervals = indices
            .into_iter()
            .filter_map(|&i| {
                let device = &branch.devices[i];
                device.block(self.get_address_slots(device))
            })
            .collect();
        merge_intervals(intervals)
    }

    /// First fit for `slots` at or after `from`, `None` past the maximum
    fn fit(&self, branch: &Branch, from: u16, slots: u8, occupied: &[AddressInterval]) -> Option<u16> {
        let candidate = find_first_fit(from, slots, occupied);
        let end = candidate + u32::from(slots.max(1)) - 1;
        if end > u32::from(branch.max_address()) {
            return None;
        }
        u16::try_from(candidate).ok()
    }

    /// Assign every relocatable device sequentially from `start_address`.
    ///
    /// Devices are taken in current-address order (unassigned first).
    /// Locked and preserved manual devices are never touched and their
    /// blocks are kept out of the search.
    pub fn auto_assign(&self, branch: &mut Branch, options: &AddressingOptions) -> Result<AllocationSummary, AddressingError> {
        self.run_auto_assign(branch, options).map_err(|e| e.during("auto_assign"))
    }

    fn run_auto_assign(&self, branch: &mut Branch, options: &AddressingOptions) -> Result<AllocationSummary, AddressingError> {
        let mut summary = AllocationSummary::new("auto_assign");

        let mut order: Vec<usize> = (0..branch.devices.len()).collect();
        order.sort_by_key(|&i| branch.devices[i].address);

        let (pinned, eligible): (Vec<usize>, Vec<usize>) =
            order.into_iter().partition(|&i| options.is_pinned(&branch.devices[i]));
        summary.skipped = pinned.len();

        let mut occupied = self.blocks_of(branch, &pinned);
        for &i in &eligible {
            branch.detach(i);
        }
        // A pinned record that lost a collision to a moved device takes its block
        branch.reconcile_devices(&pinned);

        let mut cursor = options.start_address.max(1);
        for i in eligible {
            let slots = self.get_address_slots(&branch.devices[i]);
            match self.fit(branch, cursor, slots, &occupied) {
                Some(address) => {
                    branch.place(i, address, slots, &self.owner)?;
                    let block = AddressInterval::block(address, slots);
                    extend_occupied(&mut occupied, block);
                    cursor = block.end.saturating_add(1);
                    summary.assigned += 1;
                }
                None => {
                    log::warn!(
                        "No {} free address(es) at or after {} for device {} on branch {}",
                        slots, cursor, branch.devices[i].id, branch.name()
                    );
                    branch.clear(i);
                    summary.unplaced += 1;
                }
            }
        }

        log::info!(
            "Auto-assigned {} device(s) on branch {} ({} pinned, {} unplaced)",
            summary.assigned, branch.name(), summary.skipped, summary.unplaced
        );
        Ok(summary)
    }

    /// Compact gaps among assigned Auto devices.
    ///
    /// Only Locked devices and preserved manual devices keep their place;
    /// every other assigned device is packed from `start_address` in
    /// address order and loses its manual flag. Unassigned devices are
    /// then placed by a gap-fill pass when `options.gap_fill` is set.
    pub fn resequence(&self, branch: &mut Branch, options: &AddressingOptions) -> Result<AllocationSummary, AddressingError> {
        self.run_resequence(branch, options).map_err(|e| e.during("resequence"))
    }

    fn run_resequence(&self, branch: &mut Branch, options: &AddressingOptions) -> Result<AllocationSummary, AddressingError> {
        let mut summary = AllocationSummary::new("resequence");

        let mut pinned = Vec::new();
        let mut movable = Vec::new();
        for (i, device) in branch.devices.iter().enumerate() {
            if !device.is_assigned() {
                continue;
            }
            if device.is_locked() || (options.preserve_manual && device.is_manual()) {
                pinned.push(i);
            } else {
                movable.push(i);
            }
        }
        movable.sort_by_key(|&i| branch.devices[i].address);
        summary.skipped = pinned.len();

        let mut occupied = self.blocks_of(branch, &pinned);
        for &i in &movable {
            branch.detach(i);
        }
        branch.reconcile_devices(&pinned);

        let mut cursor = options.start_address.max(1);
        for i in movable {
            let slots = self.get_address_slots(&branch.devices[i]);
            match self.fit(branch, cursor, slots, &occupied) {
                Some(address) => {
                    branch.place(i, address, slots, &self.owner)?;
                    branch.devices[i].is_manual_address = false;
                    let block = AddressInterval::block(address, slots);
                    extend_occupied(&mut occupied, block);
                    cursor = block.end.saturating_add(1);
                    summary.assigned += 1;
                }
                None => {
                    log::warn!(
                        "Resequence could not place device {} on branch {}",
                        branch.devices[i].id, branch.name()
                    );
                    branch.clear(i);
                    summary.unplaced += 1;
                }
            }
        }

        if options.gap_fill {
            let filled = self.run_gap_fill(branch, options)?;
            summary.assigned += filled.assigned;
            summary.unplaced += filled.unplaced;
        }

        log::info!(
            "Resequenced branch {}: {} placed, {} pinned, {} unplaced",
            branch.name(), summary.assigned, summary.skipped, summary.unplaced
        );
        Ok(summary)
    }

    /// Place unassigned Auto devices into the lowest free gaps.
    ///
    /// Devices are taken in branch order. Everything already assigned is
    /// treated as occupied, so nothing placed is ever disturbed.
    pub fn gap_fill(&self, branch: &mut Branch, options: &AddressingOptions) -> Result<AllocationSummary, AddressingError> {
        self.run_gap_fill(branch, options).map_err(|e| e.during("gap_fill"))
    }

    fn run_gap_fill(&self, branch: &mut Branch, options: &AddressingOptions) -> Result<AllocationSummary, AddressingError> {
        let mut summary = AllocationSummary::new("gap_fill");

        let (assigned, targets): (Vec<usize>, Vec<usize>) =
            (0..branch.devices.len()).partition(|&i| branch.devices[i].is_assigned());
        let targets: Vec<usize> = targets
            .into_iter()
            .filter(|&i| branch.devices[i].lock_state == LockState::Auto)
            .collect();
        summary.skipped = assigned.len();

        let mut occupied = self.blocks_of(branch, &assigned);
        let start = options.start_address.max(1);
        for i in targets {
            let slots = self.get_address_slots(&branch.devices[i]);
            match self.fit(branch, start, slots, &occupied) {
                Some(address) => {
                    branch.place(i, address, slots, &self.owner)?;
                    extend_occupied(&mut occupied, AddressInterval::block(address, slots));
                    summary.assigned += 1;
                }
                None => {
                    log::warn!("No gap for device {} on branch {}", branch.devices[i].id, branch.name());
                    summary.unplaced += 1;
                }
            }
        }

        log::info!("Gap-filled {} device(s) on branch {}", summary.assigned, branch.name());
        Ok(summary)
    }

    /// Move one device to the lowest block that avoids every other device.
    ///
    /// Returns false when the device is Locked and locks are respected, or
    /// when no block fits.
    pub fn first_available_for_device(
        &self,
        device_id: &str,
        branch: &mut Branch,
        options: &AddressingOptions,
    ) -> Result<bool, AddressingError> {
        let index = branch.index_of(device_id)?;
        let device = &branch.devices[index];
        if options.respect_locks && device.is_locked() {
            log::debug!("Device {} is locked, not moving it", device_id);
            return Ok(false);
        }

        let others: Vec<usize> = (0..branch.devices.len()).filter(|&i| i != index).collect();
        let occupied = self.blocks_of(branch, &others);
        let slots = self.get_address_slots(device);

        let Some(address) = self.fit(branch, options.start_address.max(1), slots, &occupied) else {
            log::warn!("No free block of {} for device {} on branch {}", slots, device_id, branch.name());
            return Ok(false);
        };
        branch
            .place(index, address, slots, &self.owner)
            .map_err(|e| e.during("first_available_for_device"))?;
        branch.reconcile_pool();
        Ok(true)
    }
}
