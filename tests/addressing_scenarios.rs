#[cfg(test)]
mod addressing_scenarios {
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    use slcaddr::address::{AddressPool, AddressingEngine, AddressingOptions, Branch};
    use slcaddr::config_loader::load_config;
    use slcaddr::device::{DeviceAssignment, DeviceCapabilities, LockState, StaticCapabilities};
    use slcaddr::orchestrator::{run_operation, Operation};
    use slcaddr::validation::{validate_address_assignment, Circuit, CircuitKind, Severity};

    fn engine() -> AddressingEngine<StaticCapabilities> {
        AddressingEngine::new(StaticCapabilities::new())
    }

    fn branch_of(devices: Vec<DeviceAssignment>) -> Branch {
        Branch::new("Loop 1", 159, devices, &StaticCapabilities::new())
    }

    /// Every address is owned by at most one device, the pool agrees with
    /// each pool-owned record, and no free address is covered by a record
    fn assert_pool_consistent(branch: &Branch) {
        let pool = branch.pool();
        for address in 1..=pool.max_address() {
            if let Some(owner) = pool.owner_of(address) {
                let device = branch.device(owner).expect("pool owner must be a branch device");
                let block = pool.block_of(owner).unwrap();
                assert_eq!(device.address, block.start, "record and pool disagree for {}", owner);
                assert!(block.contains(address));
            }
            if pool.is_available(address) {
                let covering = branch
                    .devices()
                    .iter()
                    .find(|d| branch.block_of(d).is_some_and(|b| b.contains(address)));
                assert!(covering.is_none(), "address {} is free but held by {:?}", address, covering.map(|d| &d.id));
            }
        }
    }

    /// d2 registers address 10 first, so the Locked d1 loses it at load
    fn contested_branch() -> Branch {
        branch_of(vec![
            DeviceAssignment::new("d2", "").with_address(10),
            DeviceAssignment::new("d1", "").with_address(10).with_lock_state(LockState::Locked),
            DeviceAssignment::new("d3", "").with_address(20),
            DeviceAssignment::new("d4", ""),
        ])
    }

    fn assert_locked_owner_restored(branch: &mut Branch) {
        assert_eq!(branch.device("d1").unwrap().address, 10);
        assert_eq!(branch.pool().owner_of(10), Some("d1"));
        assert_pool_consistent(branch);
        assert!(!branch.assign(10, "d4", "test").unwrap());
    }

    #[test]
    fn test_auto_assign_returns_block_to_locked_loser() {
        let mut branch = contested_branch();
        assert_eq!(branch.pool().owner_of(10), Some("d2"));

        engine().auto_assign(&mut branch, &AddressingOptions::default()).unwrap();
        assert_ne!(branch.device("d2").unwrap().address, 10);
        assert_locked_owner_restored(&mut branch);
    }

    #[test]
    fn test_resequence_returns_block_to_locked_loser() {
        let mut branch = contested_branch();
        engine().resequence(&mut branch, &AddressingOptions::default()).unwrap();

        assert_eq!(branch.device("d2").unwrap().address, 1);
        assert_eq!(branch.device("d3").unwrap().address, 2);
        assert_locked_owner_restored(&mut branch);
    }

    #[test]
    fn test_first_available_returns_block_to_locked_loser() {
        let mut branch = contested_branch();
        let moved = engine()
            .first_available_for_device("d2", &mut branch, &AddressingOptions::default())
            .unwrap();

        assert!(moved);
        assert_eq!(branch.device("d2").unwrap().address, 1);
        assert_locked_owner_restored(&mut branch);
    }

    #[test]
    fn test_gap_fill_keeps_pool_consistent_with_open_conflict() {
        let mut branch = contested_branch();
        engine().gap_fill(&mut branch, &AddressingOptions::default()).unwrap();

        // The locked conflict is not gap-fill's to settle
        assert_eq!(branch.device("d4").unwrap().address, 1);
        assert_eq!(branch.pool().owner_of(10), Some("d2"));
        assert_pool_consistent(&branch);
    }

    #[test]
    fn test_resolve_hands_block_to_preserved_manual() {
        let mut branch = branch_of(vec![
            DeviceAssignment::new("auto", "").with_address(8),
            DeviceAssignment::new("man", "").with_manual_address(8),
        ]);
        assert_eq!(branch.pool().owner_of(8), Some("auto"));

        assert!(engine().resolve_conflicts(&mut branch, &AddressingOptions::default()).unwrap());
        assert_eq!(branch.pool().owner_of(8), Some("man"));
        assert_eq!(branch.device("auto").unwrap().address, 1);
        assert_pool_consistent(&branch);
    }

    #[test]
    fn test_isolator_assign_claims_derived_block() {
        let mut provider = StaticCapabilities::new();
        provider.insert("iso", DeviceCapabilities { is_isolator: true, ..Default::default() });
        let mut branch = Branch::new(
            "Loop 1",
            159,
            vec![DeviceAssignment::new("iso", ""), DeviceAssignment::new("b", "")],
            &provider,
        );

        assert!(branch.assign(30, "iso", "test").unwrap());
        assert_eq!(branch.pool().owner_of(31), Some("iso"));
        assert!(!branch.assign(31, "b", "test").unwrap());
        assert_pool_consistent(&branch);
    }

    #[test]
    fn test_scenario_assign_release_reassign() {
        let mut pool = AddressPool::new(159);
        let mut d1 = DeviceAssignment::new("d1", "");
        let mut d2 = DeviceAssignment::new("d2", "");

        assert!(pool.assign(5, 1, &mut d1, "test"));
        assert!(!pool.assign(5, 1, &mut d2, "test"));
        assert_eq!(pool.owner_of(5), Some("d1"));

        pool.release(5);
        assert!(pool.assign(5, 1, &mut d2, "test"));
        assert_eq!(pool.owner_of(5), Some("d2"));
    }

    #[test]
    fn test_release_restores_availability() {
        let mut branch = branch_of(vec![DeviceAssignment::new("d1", "")]);
        let before = branch.pool().is_available(17);

        assert!(branch.assign(17, "d1", "test").unwrap());
        assert!(!branch.pool().is_available(17));
        branch.return_address(17);

        assert_eq!(branch.pool().is_available(17), before);
        let d1 = branch.device("d1").unwrap();
        assert_eq!(d1.address, 0);
        assert!(d1.assigned_at.is_none());
    }

    #[test]
    fn test_scenario_auto_assign_after_fixed_devices() {
        // d1 and d2 were typed in by hand and are kept where they are
        let mut branch = branch_of(vec![
            DeviceAssignment::new("d1", "").with_slots(1).with_manual_address(1),
            DeviceAssignment::new("d2", "").with_slots(2).with_manual_address(2),
            DeviceAssignment::new("d3", "").with_slots(1),
        ]);
        let options = AddressingOptions { start_address: 1, ..Default::default() };
        engine().auto_assign(&mut branch, &options).unwrap();

        assert_eq!(branch.device("d3").unwrap().address, 4);
        assert_pool_consistent(&branch);
    }

    #[test]
    fn test_scenario_locked_conflict_left_alone() {
        let mut branch = branch_of(vec![
            DeviceAssignment::new("d1", "").with_address(10).with_lock_state(LockState::Locked),
            DeviceAssignment::new("d2", "").with_address(10),
        ]);
        let before: Vec<DeviceAssignment> = branch.devices().to_vec();
        let engine = engine();

        let report = engine.validate_addressing(&branch);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].address, 10);
        assert!(!report.conflicts[0].can_auto_resolve);

        assert!(!engine.resolve_conflicts(&mut branch, &AddressingOptions::default()).unwrap());
        assert_eq!(branch.devices(), before.as_slice());
    }

    #[test]
    fn test_scenario_isolator_takes_two_slots() {
        let mut provider = StaticCapabilities::new();
        provider.insert("iso", DeviceCapabilities { is_isolator: true, ..Default::default() });
        let engine = AddressingEngine::new(provider);

        assert_eq!(engine.get_address_slots(&DeviceAssignment::new("iso", "")), 2);
    }

    #[test]
    fn test_auto_assign_never_moves_locked() {
        let devices: Vec<DeviceAssignment> = (0..30u16)
            .map(|i| {
                let device = DeviceAssignment::new(format!("d{}", i), "");
                match i % 5 {
                    0 => device.with_address(i * 3 + 1).with_lock_state(LockState::Locked),
                    1 => device.with_address(i * 2 + 1),
                    2 => device.with_slots(2),
                    _ => device,
                }
            })
            .collect();
        let locked: HashMap<String, u16> = devices
            .iter()
            .filter(|d| d.is_locked())
            .map(|d| (d.id.clone(), d.address))
            .collect();

        let mut branch = branch_of(devices);
        let engine = engine();
        let options = AddressingOptions { preserve_manual: false, ..Default::default() };
        engine.auto_assign(&mut branch, &options).unwrap();

        for (id, address) in &locked {
            assert_eq!(branch.device(id).unwrap().address, *address);
        }
        assert!(engine.validate_addressing(&branch).is_valid);
        assert_pool_consistent(&branch);
    }

    #[test]
    fn test_resolve_never_touches_preserved_manual() {
        let mut branch = branch_of(vec![
            DeviceAssignment::new("man", "").with_manual_address(8),
            DeviceAssignment::new("auto1", "").with_address(8),
            DeviceAssignment::new("lock", "").with_address(9).with_lock_state(LockState::Locked),
            DeviceAssignment::new("auto2", "").with_address(9),
        ]);
        let engine = engine();
        let resolved = engine.resolve_conflicts(&mut branch, &AddressingOptions::default()).unwrap();

        // The locked conflict at 9 cannot be resolved automatically
        assert!(!resolved);
        assert_eq!(branch.device("man").unwrap().address, 8);
        assert!(branch.device("man").unwrap().is_manual_address);
        assert_eq!(branch.device("lock").unwrap().address, 9);
        assert_eq!(branch.device("auto1").unwrap().address, 1);
        assert_eq!(branch.device("auto2").unwrap().address, 9);
    }

    #[test]
    fn test_conflict_iff_blocks_overlap() {
        let branch = branch_of(vec![
            DeviceAssignment::new("a", "").with_address(1).with_slots(2),
            DeviceAssignment::new("b", "").with_address(3).with_slots(2),
            DeviceAssignment::new("c", "").with_address(4),
            DeviceAssignment::new("d", "").with_address(6),
        ]);
        let report = engine().validate_addressing(&branch);

        let addresses: Vec<u16> = report.conflicts.iter().map(|c| c.address).collect();
        assert_eq!(addresses, vec![4]);
        assert_eq!(report.conflicts[0].device_ids, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_nearby_suggestions_are_available_and_sorted() {
        let devices: Vec<DeviceAssignment> = [20u16, 21, 19, 23, 16]
            .iter()
            .map(|&a| DeviceAssignment::new(format!("d{}", a), "").with_address(a))
            .collect();
        let branch = branch_of(devices);
        let pool = branch.pool();

        let found = pool.nearby(20, 6);
        assert!(found.len() <= 6);
        assert!(found.iter().all(|a| pool.is_available(*a)));
        let distances: Vec<u16> = found.iter().map(|a| a.abs_diff(20)).collect();
        let mut sorted = distances.clone();
        sorted.sort();
        assert_eq!(distances, sorted);
    }

    #[test]
    fn test_validation_against_branch() {
        let branch = branch_of(vec![
            DeviceAssignment::new("a", "Smoke A").with_address(3).with_lock_state(LockState::Locked),
        ]);
        let mut circuit = Circuit::new("Loop 1", CircuitKind::Idnet, 159);
        circuit.refresh(&branch);

        let result = validate_address_assignment(3, &DeviceAssignment::new("b", ""), &branch, &circuit, &StaticCapabilities::new());
        assert!(!result.is_valid);
        assert_eq!(result.severity, Severity::Error);
        assert!(!result.suggestions.is_empty());
        assert!(result.to_string().starts_with("[ERROR]"));
    }

    #[test]
    fn test_branch_file_end_to_end() {
        let yaml = r#"
circuit:
  name: "Loop 7"
  kind: Idnac
  max_addresses: 30
options:
  start_address: 1
  preserve_manual: false
devices:
  - id: "strobe-1"
    address: 9
    is_manual_address: true
  - id: "combo-1"
    capabilities:
      has_strobe: true
      has_speaker: true
  - id: "horn-1"
    address: 2
    lock_state: Locked
  - id: "strobe-2"
    address: 15
"#;
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();
        let config = load_config(temp_file.path()).unwrap();

        let report = run_operation(&config, Operation::Resequence, None).unwrap();
        let address = |id: &str| report.devices.iter().find(|d| d.id == id).unwrap().address;

        assert_eq!(address("horn-1"), 2);
        assert_eq!(address("strobe-1"), 1);
        assert_eq!(address("strobe-2"), 3);
        // Unassigned combo device is placed by the gap-fill pass
        assert_eq!(address("combo-1"), 4);
        assert!(report.addressing.is_valid);
        assert!(report.circuit.is_valid);
    }
}
