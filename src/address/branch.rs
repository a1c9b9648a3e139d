//! Branch state.
//!
//! A branch is the set of devices wired on one signaling-line circuit
//! together with the address pool for that circuit. Every record change
//! that touches an address goes through here so the record and the pool
//! stay consistent.

use std::collections::HashMap;

use super::error::AddressingError;
use super::interval::AddressInterval;
use super::pool::AddressPool;
use crate::device::{CapabilityProvider, DeviceAssignment};

/// Devices sharing one address space, with their pool
#[derive(Debug, Clone)]
pub struct Branch {
    name: String,
    pub(crate) devices: Vec<DeviceAssignment>,
    pub(crate) pool: AddressPool,
    /// Resolved slot count per device id
    slots: HashMap<String, u8>,
}

impl Branch {
    /// Build a branch and register every assigned device in a fresh pool.
    ///
    /// Slot counts are resolved once through `provider`. Records whose
    /// block collides with an earlier record, or runs out of range, keep
    /// their address but are not pool-owned.
    pub fn new<P: CapabilityProvider + ?Sized>(
        name: impl Into<String>,
        max_address: u16,
        devices: Vec<DeviceAssignment>,
        provider: &P,
    ) -> Self {
        let slots = devices
            .iter()
            .map(|d| (d.id.clone(), super::allocator::resolve_address_slots(d, provider)))
            .collect();
        let mut branch = Branch {
            name: name.into(),
            devices,
            pool: AddressPool::new(max_address),
            slots,
        };
        branch.reconcile_pool();
        branch
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_address(&self) -> u16 {
        self.pool.max_address()
    }

    pub fn devices(&self) -> &[DeviceAssignment] {
        &self.devices
    }

    pub fn pool(&self) -> &AddressPool {
        &self.pool
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn device(&self, device_id: &str) -> Option<&DeviceAssignment> {
        self.devices.iter().find(|d| d.id == device_id)
    }

    /// Slot count the branch uses for a device's pool block
    pub fn slots_of(&self, device_id: &str) -> u8 {
        match self.slots.get(device_id) {
            Some(&slots) => slots,
            None => self.device(device_id).map_or(1, |d| d.address_slots.max(1)),
        }
    }

    /// Occupied block of a device record, by the branch's slot count
    pub fn block_of(&self, device: &DeviceAssignment) -> Option<AddressInterval> {
        device.block(self.slots_of(&device.id))
    }

    pub(crate) fn index_of(&self, device_id: &str) -> Result<usize, AddressingError> {
        self.devices
            .iter()
            .position(|d| d.id == device_id)
            .ok_or_else(|| AddressingError::UnknownDevice(device_id.to_string()))
    }

    /// Add a device record; an assigned record is registered in the pool
    pub fn add_device<P: CapabilityProvider + ?Sized>(&mut self, device: DeviceAssignment, provider: &P) {
        let slots = super::allocator::resolve_address_slots(&device, provider);
        self.slots.insert(device.id.clone(), slots);
        self.devices.push(device);
        self.reconcile_devices(&[self.devices.len() - 1]);
    }

    /// Assign `address` to a device, returning its previous block first.
    ///
    /// The block size is the slot count resolved for the device. Returns
    /// false without mutation if the block is unavailable.
    pub fn assign(&mut self, address: u16, device_id: &str, owner: &str) -> Result<bool, AddressingError> {
        let index = self.index_of(device_id)?;
        let slots = self.slots_of(device_id);
        if !self.pool.assign(address, slots, &mut self.devices[index], owner) {
            return Ok(false);
        }
        self.reconcile_pool();
        Ok(true)
    }

    /// Return the block containing `address` and clear its owner's record.
    ///
    /// Idempotent; returns the released device id. A record that lost a
    /// collision on the freed block takes it over.
    pub fn return_address(&mut self, address: u16) -> Option<String> {
        let device_id = self.pool.release(address)?;
        if let Some(device) = self.devices.iter_mut().find(|d| d.id == device_id) {
            device.clear_address();
        }
        self.reconcile_pool();
        Some(device_id)
    }

    /// Place the device at `index`, treating a refusal as a ledger fault
    pub(crate) fn place(&mut self, index: usize, address: u16, slots: u8, owner: &str) -> Result<(), AddressingError> {
        let device = &mut self.devices[index];
        if self.pool.assign(address, slots, device, owner) {
            log::debug!("Placed {} at {} on branch {}", device.id, AddressInterval::block(address, slots), self.name);
            self.slots.insert(device.id.clone(), slots);
            Ok(())
        } else {
            Err(AddressingError::BlockRefused {
                device_id: device.id.clone(),
                block: AddressInterval::block(address, slots),
            })
        }
    }

    /// Drop pool ownership for a device about to be moved; the record is kept
    pub(crate) fn detach(&mut self, index: usize) {
        self.pool.release_device(&self.devices[index].id);
    }

    /// Return a device to the unassigned state
    pub(crate) fn clear(&mut self, index: usize) {
        self.detach(index);
        self.devices[index].clear_address();
    }

    /// Register every assigned record the pool does not know about yet
    pub(crate) fn reconcile_pool(&mut self) {
        let all: Vec<usize> = (0..self.devices.len()).collect();
        self.reconcile_devices(&all);
    }

    /// Register the assigned records at `indices` that the pool does not
    /// hold yet. Records that still collide stay unregistered and are
    /// logged.
    pub(crate) fn reconcile_devices(&mut self, indices: &[usize]) {
        for &i in indices {
            let device = &self.devices[i];
            let Some(block) = device.block(self.slots_of(&device.id)) else {
                continue;
            };
            if self.pool.block_of(&device.id) == Some(block) {
                continue;
            }
            if !self.pool.register(block, &device.id) {
                let holder = block
                    .iter()
                    .find_map(|a| self.pool.owner_of(a).filter(|owner| *owner != device.id))
                    .unwrap_or("out of range");
                log::warn!(
                    "Device {} claims {} on branch {} but it is held by {}",
                    device.id, block, self.name, holder
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCapabilities, LockState, StaticCapabilities};

    fn branch(devices: Vec<DeviceAssignment>) -> Branch {
        Branch::new("loop-1", 159, devices, &StaticCapabilities::new())
    }

    #[test]
    fn test_new_registers_assigned_devices() {
        let b = branch(vec![
            DeviceAssignment::new("d1", "").with_address(1),
            DeviceAssignment::new("d2", "").with_address(2).with_slots(2),
            DeviceAssignment::new("d3", ""),
        ]);
        assert_eq!(b.pool().owner_of(1), Some("d1"));
        assert_eq!(b.pool().owner_of(3), Some("d2"));
        assert_eq!(b.pool().stats().devices, 2);
    }

    #[test]
    fn test_new_keeps_colliding_records() {
        let b = branch(vec![
            DeviceAssignment::new("d1", "").with_address(10).with_lock_state(LockState::Locked),
            DeviceAssignment::new("d2", "").with_address(10),
        ]);
        assert_eq!(b.pool().owner_of(10), Some("d1"));
        assert_eq!(b.device("d2").unwrap().address, 10);
        assert!(b.pool().block_of("d2").is_none());
    }

    #[test]
    fn test_assign_and_return_address() {
        let mut b = branch(vec![DeviceAssignment::new("d1", ""), DeviceAssignment::new("d2", "")]);
        assert!(b.assign(5, "d1", "test").unwrap());
        assert!(!b.assign(5, "d2", "test").unwrap());

        assert_eq!(b.return_address(5), Some("d1".to_string()));
        assert_eq!(b.device("d1").unwrap().address, 0);
        assert!(b.device("d1").unwrap().assigned_at.is_none());
        assert_eq!(b.return_address(5), None);

        assert!(b.assign(5, "d2", "test").unwrap());
        assert!(matches!(b.assign(5, "nope", "test"), Err(AddressingError::UnknownDevice(_))));
    }

    #[test]
    fn test_return_address_hands_block_to_collision_loser() {
        let mut b = branch(vec![
            DeviceAssignment::new("d2", "").with_address(10),
            DeviceAssignment::new("d1", "").with_address(10).with_lock_state(LockState::Locked),
        ]);
        assert_eq!(b.pool().owner_of(10), Some("d2"));

        assert_eq!(b.return_address(10), Some("d2".to_string()));
        assert_eq!(b.pool().owner_of(10), Some("d1"));
        assert!(!b.assign(10, "d2", "test").unwrap());
    }

    #[test]
    fn test_assign_uses_capability_slots() {
        let mut caps = StaticCapabilities::new();
        caps.insert("iso", DeviceCapabilities { is_isolator: true, ..Default::default() });
        let mut b = Branch::new("loop-1", 159, vec![DeviceAssignment::new("plain", "")], &caps);
        b.add_device(DeviceAssignment::new("iso", ""), &caps);

        assert_eq!(b.slots_of("iso"), 2);
        assert_eq!(b.slots_of("plain"), 1);
        assert!(b.assign(40, "iso", "test").unwrap());
        assert_eq!(b.pool().owner_of(41), Some("iso"));
        assert_eq!(b.block_of(b.device("iso").unwrap()), Some(AddressInterval::new(40, 41)));
        assert!(!b.assign(41, "plain", "test").unwrap());
    }

    #[test]
    fn test_add_device_registers_block() {
        let mut b = branch(Vec::new());
        b.add_device(DeviceAssignment::new("d1", "").with_address(7), &StaticCapabilities::new());
        assert_eq!(b.len(), 1);
        assert_eq!(b.pool().owner_of(7), Some("d1"));
    }
}
