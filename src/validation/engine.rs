//! Address and circuit validation.
//!
//! These checks read branch and circuit state and never mutate it. Each
//! produces a [`ValidationResult`] whose severity only ever escalates as
//! checks run.

use std::collections::BTreeMap;

use super::circuit::{CircuitContext, CURRENT_WARNING_THRESHOLD, HARD_UTILIZATION_LIMIT, MAX_CIRCUIT_CURRENT};
use super::types::{Severity, ValidationResult};
use crate::address::{resolve_address_slots, AddressInterval, Branch};
use crate::device::{CapabilityProvider, DeviceAssignment};

/// Alternatives offered when an address is taken
pub const NEARBY_SUGGESTIONS: usize = 5;

fn percent(fraction: f64) -> f64 {
    (fraction * 100.0).round()
}

/// Escalate on utilization: Critical at the hard limit, Warning past the
/// circuit's safe threshold
fn check_utilization<C: CircuitContext + ?Sized>(result: &mut ValidationResult, circuit: &C, utilization: f64) {
    if utilization >= HARD_UTILIZATION_LIMIT {
        result.fail(
            Severity::Critical,
            format!(
                "Circuit {} at {}% capacity, above the {}% limit",
                circuit.name(), percent(utilization), percent(HARD_UTILIZATION_LIMIT)
            ),
        );
    } else if utilization > circuit.safe_capacity() {
        result.warn(
            Severity::Warning,
            format!(
                "Circuit {} at {}% capacity, above the {}% safe threshold",
                circuit.name(), percent(utilization), percent(circuit.safe_capacity())
            ),
        );
    }
}

fn check_current(result: &mut ValidationResult, total_current: f64) {
    if total_current > MAX_CIRCUIT_CURRENT {
        result.fail(
            Severity::Error,
            format!("Total current {:.2} A exceeds the {:.1} A limit", total_current, MAX_CIRCUIT_CURRENT),
        );
    } else if total_current > CURRENT_WARNING_THRESHOLD {
        result.warn(
            Severity::Warning,
            format!(
                "Total current {:.2} A is above {:.1} A (90% of the limit)",
                total_current, CURRENT_WARNING_THRESHOLD
            ),
        );
    }
}

/// Validate giving `address` to `device` on `branch`.
///
/// The device's block size is resolved through `provider`, the same way
/// the allocation policies size it. Checks, in order:
/// - Range against the circuit maximum (short-circuits on failure)
/// - Another device already owning any address of the block
/// - That owner being Locked
/// - Circuit utilization including this device
/// - Circuit current including this device
/// - A free preferred physical position, offered as a hint
pub fn validate_address_assignment<C, P>(
    address: u16,
    device: &DeviceAssignment,
    branch: &Branch,
    circuit: &C,
    provider: &P,
) -> ValidationResult
where
    C: CircuitContext + ?Sized,
    P: CapabilityProvider + ?Sized,
{
    let mut result = ValidationResult::valid(format!("Address {} is available for {}", address, device.label()));
    let max = circuit.max_addresses();
    let block = AddressInterval::block(address.max(1), resolve_address_slots(device, provider));

    if address < 1 || block.end > max {
        result.fail(
            Severity::Error,
            format!("Address {} is out of range for circuit {} (1-{})", address, circuit.name(), max),
        );
        return result;
    }

    let pool = branch.pool();
    let foreign = block
        .iter()
        .find_map(|a| pool.owner_of(a).filter(|owner| *owner != device.id).map(|owner| (a, owner)));
    if let Some((taken, owner_id)) = foreign {
        let owner = branch.device(owner_id);
        let owner_label = owner.map(DeviceAssignment::label).unwrap_or(owner_id);
        result.fail(Severity::Error, format!("Address {} is already used by {}", taken, owner_label));
        result.suggest(pool.nearby(address, NEARBY_SUGGESTIONS));

        if owner.is_some_and(DeviceAssignment::is_locked) {
            result.fail(
                Severity::Error,
                format!("Address {} is locked by field-installed device {}", taken, owner_label),
            );
        }
    }

    // Count the device once: it is already in the circuit figures if assigned
    let (extra_count, extra_current) = if device.is_assigned() { (0.0, 0.0) } else { (1.0, device.current) };
    let count_utilization = if max == 0 {
        0.0
    } else {
        circuit.utilization() + extra_count / f64::from(max)
    };
    let total_current = circuit.total_current() + extra_current;
    let current_utilization = total_current / MAX_CIRCUIT_CURRENT;
    check_utilization(&mut result, circuit, count_utilization.max(current_utilization));
    check_current(&mut result, total_current);

    if let Some(preferred) = device.preferred_address {
        if preferred != address && pool.is_available(preferred) {
            result.warn(
                Severity::Info,
                format!("Address {} matches the physical position of {} and is free", preferred, device.label()),
            );
            result.suggest([preferred]);
        }
    }

    result
}

/// Validate a whole circuit: duplicate addresses, utilization and current.
///
/// Device blocks are sized through `provider`.
pub fn validate_circuit<C, P>(circuit: &C, branch: &Branch, provider: &P) -> ValidationResult
where
    C: CircuitContext + ?Sized,
    P: CapabilityProvider + ?Sized,
{
    let mut result = ValidationResult::valid(format!("Circuit {} has no addressing problems", circuit.name()));

    let mut claims: BTreeMap<u16, Vec<&DeviceAssignment>> = BTreeMap::new();
    for device in branch.devices() {
        if let Some(block) = device.block(resolve_address_slots(device, provider)) {
            for address in block.iter() {
                claims.entry(address).or_default().push(device);
            }
        }
    }
    for (address, devices) in claims.iter().filter(|(_, d)| d.len() > 1) {
        let names: Vec<&str> = devices.iter().map(|d| d.label()).collect();
        result.fail(Severity::Error, format!("Duplicate address {}: {}", address, names.join(", ")));
    }

    let utilization = circuit.utilization().max(circuit.current_utilization());
    check_utilization(&mut result, circuit, utilization);
    check_current(&mut result, circuit.total_current());

    if !result.is_valid {
        log::warn!("Circuit {} failed validation: {}", circuit.name(), result.message);
    }
    result
}
