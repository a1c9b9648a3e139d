//! Operation orchestrator.
//!
//! This module coordinates one run over a branch file: building the branch
//! and its pool, applying the requested addressing operation, and
//! validating the result.

use serde::Serialize;
use std::fmt;

use crate::address::{AddressingEngine, AddressingReport, AllocationSummary};
use crate::config::BranchConfig;
use crate::device::DeviceAssignment;
use crate::validation::{validate_circuit, ValidationResult};
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;

/// Addressing operation to run over a branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    /// Only validate the current addressing
    Validate,
    /// Sequentially assign every relocatable device
    AutoAssign,
    /// Compact gaps among Auto devices
    Resequence,
    /// Place unassigned devices into free gaps
    GapFill,
    /// Clear and re-place devices in auto-resolvable conflicts
    ResolveConflicts,
    /// Move one device to the lowest free block
    FirstAvailable,
}

/// Everything a run produced, ready for display or JSON output
#[derive(Debug, Serialize)]
pub struct BranchReport {
    pub branch: String,
    pub operation: Operation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<AllocationSummary>,
    /// Outcome of resolve-conflicts or first-available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub succeeded: Option<bool>,
    pub addressing: AddressingReport,
    pub circuit: ValidationResult,
    pub devices: Vec<DeviceAssignment>,
}

impl fmt::Display for BranchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Branch {} ({:?})", self.branch, self.operation)?;
        if let Some(summary) = &self.summary {
            writeln!(
                f,
                "  {}: {} assigned, {} skipped, {} unplaced",
                summary.operation, summary.assigned, summary.skipped, summary.unplaced
            )?;
        }
        if let Some(succeeded) = self.succeeded {
            writeln!(f, "  Succeeded: {}", succeeded)?;
        }
        let stats = &self.addressing.stats;
        writeln!(
            f,
            "  Devices: {} total, {} assigned ({} locked, {} manual, {} auto), range {}-{}",
            stats.total_count, stats.assigned_count, stats.locked_count,
            stats.manual_count, stats.auto_count, stats.min_address, stats.max_address
        )?;
        for conflict in &self.addressing.conflicts {
            writeln!(
                f,
                "  Conflict at {}: {}{}",
                conflict.address,
                conflict.device_ids.join(", "),
                if conflict.can_auto_resolve { "" } else { " (manual resolution required)" }
            )?;
        }
        writeln!(f, "  {}", self.circuit)?;
        for device in &self.devices {
            let address = if device.is_assigned() { device.address.to_string() } else { "-".to_string() };
            writeln!(f, "    {:>4}  {:<24} {:?}", address, device.label(), device.lock_state)?;
        }
        Ok(())
    }
}

/// Run one operation over the branch described by `config`
pub fn run_operation(config: &BranchConfig, operation: Operation, device_id: Option<&str>) -> Result<BranchReport> {
    let provider = config.capability_provider();
    let mut branch = config.build_branch(&provider);
    let engine = AddressingEngine::new(provider);
    let options = &config.options;

    let mut summary = None;
    let mut succeeded = None;
    match operation {
        Operation::Validate => {}
        Operation::AutoAssign => summary = Some(engine.auto_assign(&mut branch, options)?),
        Operation::Resequence => summary = Some(engine.resequence(&mut branch, options)?),
        Operation::GapFill => summary = Some(engine.gap_fill(&mut branch, options)?),
        Operation::ResolveConflicts => succeeded = Some(engine.resolve_conflicts(&mut branch, options)?),
        Operation::FirstAvailable => {
            let id = device_id.ok_or_else(|| eyre!("first-available requires a device id"))?;
            let moved = engine
                .first_available_for_device(id, &mut branch, options)
                .wrap_err_with(|| format!("Failed to place device '{}'", id))?;
            succeeded = Some(moved);
        }
    }

    let addressing = engine.validate_addressing(&branch);
    let mut circuit = config.circuit.clone();
    circuit.refresh(&branch);
    let circuit_result = validate_circuit(&circuit, &branch, engine.provider());

    log::info!(
        "{:?} on branch {} finished: {} conflict(s), circuit {}",
        operation, branch.name(), addressing.conflicts.len(), circuit_result.severity
    );

    Ok(BranchReport {
        branch: branch.name().to_string(),
        operation,
        summary,
        succeeded,
        addressing,
        circuit: circuit_result,
        devices: branch.devices().to_vec(),
    })
}
