//! Address pool.
//!
//! This file keeps the ownership ledger for one branch: every address in
//! `1..=max_address` is owned by at most one device. A device owns one
//! contiguous block (its base address plus any extra slots) at a time.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use super::interval::AddressInterval;
use crate::device::DeviceAssignment;

/// Outward search radius for [`AddressPool::nearby`]
pub const NEARBY_SEARCH_RADIUS: u16 = 50;

/// Ownership counts for a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub max_address: u16,
    pub free: usize,
    pub owned: usize,
    pub devices: usize,
}

/// Exclusive-ownership ledger for the addresses of one branch
#[derive(Debug, Clone)]
pub struct AddressPool {
    max_address: u16,
    /// Fast ordered lookup for free addresses
    free: BTreeSet<u16>,
    /// Address -> owning device id
    owners: BTreeMap<u16, String>,
    /// Device id -> owned block
    blocks: HashMap<String, AddressInterval>,
}

impl AddressPool {
    pub fn new(max_address: u16) -> Self {
        AddressPool {
            max_address,
            free: (1..=max_address).collect(),
            owners: BTreeMap::new(),
            blocks: HashMap::new(),
        }
    }

    pub fn max_address(&self) -> u16 {
        self.max_address
    }

    pub fn in_range(&self, address: u16) -> bool {
        address >= 1 && address <= self.max_address
    }

    /// True iff the address is in range and unowned
    pub fn is_available(&self, address: u16) -> bool {
        self.free.contains(&address)
    }

    pub fn is_assigned(&self, address: u16) -> bool {
        self.owners.contains_key(&address)
    }

    /// Get the device id that owns a given address
    pub fn owner_of(&self, address: u16) -> Option<&str> {
        self.owners.get(&address).map(String::as_str)
    }

    /// Block currently owned by a device
    pub fn block_of(&self, device_id: &str) -> Option<AddressInterval> {
        self.blocks.get(device_id).copied()
    }

    /// Lowest free address at or after `from`, 0 if none
    pub fn next_available(&self, from: u16) -> u16 {
        self.free.range(from.max(1)..).next().copied().unwrap_or(0)
    }

    /// Up to `count` free addresses at or after `from`, ascending
    pub fn available_range(&self, count: usize, from: u16) -> Vec<u16> {
        self.free.range(from.max(1)..).take(count).copied().collect()
    }

    /// Free addresses closest to `target`, nearest first.
    ///
    /// Searches at most [`NEARBY_SEARCH_RADIUS`] addresses in each
    /// direction. Ties resolve to the lower address.
    pub fn nearby(&self, target: u16, count: usize) -> Vec<u16> {
        let mut found = Vec::with_capacity(count);
        if count == 0 {
            return found;
        }
        if self.is_available(target) {
            found.push(target);
        }
        for offset in 1..=NEARBY_SEARCH_RADIUS {
            if found.len() >= count {
                break;
            }
            if let Some(below) = target.checked_sub(offset) {
                if self.is_available(below) {
                    found.push(below);
                }
            }
            if found.len() >= count {
                break;
            }
            if let Some(above) = target.checked_add(offset) {
                if self.is_available(above) {
                    found.push(above);
                }
            }
        }
        found
    }

    /// Every address of `block` is in range and either free or already
    /// owned by `device_id`
    pub fn is_block_available(&self, block: AddressInterval, device_id: &str) -> bool {
        if !self.in_range(block.start) || !self.in_range(block.end) {
            return false;
        }
        block.iter().all(|address| match self.owners.get(&address) {
            None => true,
            Some(owner) => owner == device_id,
        })
    }

    /// Assign the block of `slots` addresses at `address` to `device`.
    ///
    /// Returns false without mutation when any address of the block is out
    /// of range or owned by another device. On success the device's
    /// previous block is returned to the pool first and the device record
    /// is stamped with the new address and `owner`.
    pub fn assign(&mut self, address: u16, slots: u8, device: &mut DeviceAssignment, owner: &str) -> bool {
        if address == 0 || !self.in_range(address) {
            return false;
        }
        let block = AddressInterval::block(address, slots);
        if !self.is_block_available(block, &device.id) {
            return false;
        }

        self.release_device(&device.id);
        self.claim(block, &device.id);
        device.set_address(address, owner);
        true
    }

    /// Record ownership of a block without touching any device record.
    ///
    /// Used when rebuilding a pool from existing records. Returns false if
    /// the block is out of range or collides with another owner.
    pub fn register(&mut self, block: AddressInterval, device_id: &str) -> bool {
        if !self.is_block_available(block, device_id) {
            return false;
        }
        self.release_device(device_id);
        self.claim(block, device_id);
        true
    }

    fn claim(&mut self, block: AddressInterval, device_id: &str) {
        for address in block.iter() {
            self.free.remove(&address);
            self.owners.insert(address, device_id.to_string());
        }
        self.blocks.insert(device_id.to_string(), block);
    }

    /// Return the block containing `address` to the pool.
    ///
    /// Idempotent: an unowned address is a no-op returning `None`.
    /// Otherwise returns the id of the released device so the caller can
    /// clear that record.
    pub fn release(&mut self, address: u16) -> Option<String> {
        let device_id = self.owners.get(&address)?.clone();
        self.release_device(&device_id);
        Some(device_id)
    }

    /// Return whatever block a device owns, if any
    pub fn release_device(&mut self, device_id: &str) -> Option<AddressInterval> {
        let block = self.blocks.remove(device_id)?;
        for address in block.iter() {
            self.owners.remove(&address);
            if self.in_range(address) {
                self.free.insert(address);
            }
        }
        Some(block)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            max_address: self.max_address,
            free: self.free.len(),
            owned: self.owners.len(),
            devices: self.blocks.len(),
        }
    }
}
