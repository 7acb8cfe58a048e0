// tests/pipeline_tests.rs
use tomasulo_rust::errors::SimulatorError;
use tomasulo_rust::pipeline::config::SimulatorConfig;
use tomasulo_rust::pipeline::instructions::Reg;
use tomasulo_rust::pipeline::simulator::Simulator;

/// Helper function to build a simulator with the default configuration and
/// load the given program.
fn load_program(lines: &[&str]) -> Simulator {
    let mut simulator = Simulator::new(SimulatorConfig::new());
    simulator.load(lines);
    simulator
}

/// Helper function to step until `finished`, with a safety cap.
fn run_to_completion(simulator: &mut Simulator) {
    simulator.run(1000);
    assert!(
        simulator.finished,
        "program did not finish within 1000 cycles"
    );
}

fn int_reg(simulator: &Simulator, name: &str) -> i64 {
    simulator.register_file.read_named(name).unwrap() as i64
}

#[test]
fn test_addi_chain() {
    let mut simulator = load_program(&["ADDI R1, R0, 5", "ADDI R2, R1, 7", "HLT"]);
    run_to_completion(&mut simulator);

    assert_eq!(int_reg(&simulator, "R1"), 5);
    assert_eq!(int_reg(&simulator, "R2"), 12);
    // HLT stops dispatch without being issued, so it is not committed.
    assert_eq!(simulator.committed, 2);
}

#[test]
fn test_raw_dependency_resolved_over_cdb() {
    let mut simulator = load_program(&[
        "ADD R3, R0, R0",
        "ADDI R1, R0, 4",
        "ADDI R2, R1, 6",
        "HLT",
    ]);

    // After the first cycle the dependent ADDI must be parked on the
    // producer's ROB tag.
    simulator.step();
    let state = simulator.state();
    let dependent = state
        .stations
        .iter()
        .find(|station| station.instr.as_deref() == Some("ADDI R2, R1, 6"))
        .expect("dependent ADDI was not issued in the first cycle");
    assert_eq!(dependent.qj, Some(1), "dependent ADDI should wait on ROB 1");

    // The broadcast clears the tag once the producer writes back.
    simulator.step();
    simulator.step();
    let state = simulator.state();
    let dependent = state
        .stations
        .iter()
        .find(|station| station.instr.as_deref() == Some("ADDI R2, R1, 6"))
        .expect("dependent ADDI station was freed too early");
    assert_eq!(dependent.qj, None);
    assert_eq!(dependent.vj, Some(4.0));

    run_to_completion(&mut simulator);
    assert_eq!(int_reg(&simulator, "R1"), 4);
    assert_eq!(int_reg(&simulator, "R2"), 10);
    assert_eq!(simulator.committed, 3);
}

#[test]
fn test_memory_round_trip() {
    let mut simulator = load_program(&[
        "ADDI R1, R0, 7",
        "SD R1, 0(R0)",
        "LD R2, 0(R0)",
        "HLT",
    ]);
    run_to_completion(&mut simulator);

    assert_eq!(int_reg(&simulator, "R2"), 7);
    assert_eq!(simulator.memory.read(0), 7.0);
    assert_eq!(simulator.committed, 3);
}

#[test]
fn test_not_taken_branch_agrees_with_cold_predictor() {
    let mut simulator = load_program(&[
        "ADDI R1, R0, 1",
        "LOOP: SUBI R1, R1, 1",
        "BNEZ R1, LOOP",
        "HLT",
    ]);
    run_to_completion(&mut simulator);

    // The subtract runs once, the branch resolves not-taken, and the cold
    // weakly-not-taken predictor agrees with it.
    assert_eq!(int_reg(&simulator, "R1"), 0);
    assert_eq!(simulator.committed, 3);
    assert_eq!(simulator.metrics().branch_accuracy, 1.0);
}

#[test]
fn test_mispredict_flush_discards_speculative_addi() {
    let mut simulator = load_program(&[
        "ADDI R1, R0, 0",
        "BNEZ R1, SKIP",
        "ADDI R2, R0, 9",
        "SKIP: HLT",
    ]);

    // Force a taken prediction for the branch before the pipeline runs.
    let branch = simulator.instructions[1].clone();
    simulator.branch_predictor.train(&branch, true);
    simulator.branch_predictor.train(&branch, true);
    assert!(simulator.branch_predictor.predict(&branch));

    // Step up to the resolution of the branch.
    while simulator.branch_predictor.total == 0 {
        assert!(simulator.cycle < 100, "branch never resolved");
        simulator.step();
    }

    // The speculatively issued ADDI behind the branch has not committed.
    assert_eq!(int_reg(&simulator, "R2"), 0);
    assert_eq!(simulator.metrics().branch_accuracy, 0.0);

    // The next commit flushes the pipeline.
    simulator.step();
    assert!(
        simulator.cycle_log.iter().any(|line| line.contains("FLUSH")),
        "flush did not show up in the cycle log"
    );
    assert_eq!(int_reg(&simulator, "R2"), 0);

    // The branch was not taken, so the correct path re-executes the
    // fall-through ADDI after the flush.
    run_to_completion(&mut simulator);
    assert_eq!(int_reg(&simulator, "R2"), 9);
    assert_eq!(simulator.metrics().branch_accuracy, 0.0);
}

#[test]
fn test_flush_leaves_no_ghost_state() {
    let mut simulator = load_program(&["START: ADDI R1, R0, 0", "BNEZ R1, START"]);

    let branch = simulator.instructions[1].clone();
    simulator.branch_predictor.train(&branch, true);
    simulator.branch_predictor.train(&branch, true);

    // The mispredicted branch is the last instruction; after the flush the
    // resume point is past the program, so the run finishes immediately.
    run_to_completion(&mut simulator);

    for tag in simulator
        .register_file
        .int_tags
        .iter()
        .chain(simulator.register_file.fp_tags.iter())
    {
        assert!(tag.is_none(), "producer tag survived the flush");
    }
    assert!(simulator.rob.is_empty());
    assert!(simulator.waiting_wb.is_empty());
    assert!(simulator.stations.iter().all(|station| !station.busy));
    assert!(simulator.units.iter().all(|unit| !unit.busy));
    // Only the ADDI committed; the flushed branch does not count.
    assert_eq!(simulator.committed, 1);
    assert_eq!(simulator.metrics().branch_accuracy, 0.0);
}

#[test]
fn test_division_by_zero_yields_zero() {
    let mut simulator = load_program(&[
        "ADDI R1, R0, 10",
        "ADDI R2, R0, 0",
        "DIV R3, R1, R2",
        "HLT",
    ]);
    run_to_completion(&mut simulator);

    assert_eq!(int_reg(&simulator, "R1"), 10);
    assert_eq!(int_reg(&simulator, "R3"), 0);
}

#[test]
fn test_write_suppressed_when_register_renamed_again() {
    // Both ADDIs target R1; the first commit must not clobber the second
    // value once the younger producer has taken over the tag.
    let mut simulator = load_program(&["ADDI R1, R0, 3", "ADDI R1, R0, 8", "HLT"]);
    run_to_completion(&mut simulator);

    assert_eq!(int_reg(&simulator, "R1"), 8);
    assert_eq!(simulator.committed, 2);
}

#[test]
fn test_structural_stall_on_station_exhaustion() {
    // Five ADD-class instructions against three stations: the first cycle
    // can only place three of them.
    let mut simulator = load_program(&[
        "ADDI R1, R0, 1",
        "ADDI R2, R0, 2",
        "ADDI R3, R0, 3",
        "ADDI R4, R0, 4",
        "ADDI R5, R0, 5",
        "HLT",
    ]);
    simulator.step();
    assert_eq!(simulator.stalls, 1);

    run_to_completion(&mut simulator);
    assert_eq!(simulator.committed, 5);
    assert_eq!(int_reg(&simulator, "R5"), 5);
    let metrics = simulator.metrics();
    assert!(metrics.stalls >= 1);
    assert!(metrics.ipc > 0.0);
}

#[test]
fn test_stall_on_full_rob() {
    let mut simulator = Simulator::new(SimulatorConfig::new().with_rob_size(2));
    simulator.load(&[
        "ADDI R1, R0, 1",
        "ADDI R2, R0, 2",
        "ADDI R3, R0, 3",
        "ADDI R4, R0, 4",
        "HLT",
    ]);
    simulator.step();
    assert_eq!(simulator.rob.len(), 2);
    assert_eq!(simulator.stalls, 1);

    run_to_completion(&mut simulator);
    assert_eq!(simulator.committed, 4);
    assert_eq!(int_reg(&simulator, "R4"), 4);
}

#[test]
fn test_unparsable_lines_are_dropped_at_load() {
    let simulator = load_program(&[
        "FROB R1, R2",
        "",
        "# just a comment",
        "ADDI R99, R0, 1",
        "ADDI R1, R0, 2",
        "HLT",
    ]);
    // Only the well-formed ADDI and the HLT survive decoding.
    assert_eq!(simulator.instructions.len(), 2);
}

#[test]
fn test_label_on_its_own_line_binds_to_next_instruction() {
    let simulator = load_program(&["ADDI R1, R0, 1", "LOOP:", "SUBI R1, R1, 1", "HLT"]);
    assert_eq!(simulator.labels.get("LOOP"), Some(&1));
    assert_eq!(simulator.instructions.len(), 3);
}

#[test]
fn test_lw_sw_aliases() {
    let mut simulator = load_program(&[
        "ADDI R1, R0, 4",
        "SW R1, 8(R0)",
        "LW R2, 8(R0)",
        "HLT",
    ]);
    run_to_completion(&mut simulator);
    assert_eq!(int_reg(&simulator, "R2"), 4);
    assert_eq!(simulator.memory.read(8), 4.0);
}

#[test]
fn test_invalid_register_surfaces_at_api_level() {
    assert!(matches!(
        Reg::parse("R32"),
        Err(SimulatorError::InvalidRegister(_))
    ));
    assert!(matches!(
        Reg::parse("X3"),
        Err(SimulatorError::InvalidRegister(_))
    ));

    let simulator = load_program(&["HLT"]);
    assert!(simulator.register_file.read_named("R31").is_ok());
    assert!(matches!(
        simulator.register_file.read_named("Q7"),
        Err(SimulatorError::InvalidRegister(_))
    ));
}

#[test]
fn test_reset_and_replay_is_deterministic() {
    let program = [
        "ADDI R1, R0, 7",
        "SD R1, 16(R0)",
        "LD R2, 16(R0)",
        "MUL R3, R2, R1",
        "LOOP: SUBI R1, R1, 7",
        "BNEZ R1, LOOP",
        "HLT",
    ];
    let mut simulator = load_program(&program);
    run_to_completion(&mut simulator);

    let first_regs = simulator.register_file.clone();
    let first_memory = simulator.memory.clone();
    let first_committed = simulator.committed;
    let first_cycles = simulator.cycle;

    simulator.reset();
    assert_eq!(simulator.cycle, 0);
    assert!(!simulator.finished);

    run_to_completion(&mut simulator);
    assert_eq!(simulator.register_file, first_regs);
    assert_eq!(simulator.memory, first_memory);
    assert_eq!(simulator.committed, first_committed);
    assert_eq!(simulator.cycle, first_cycles);
}

#[test]
fn test_step_is_a_noop_after_finish() {
    let mut simulator = load_program(&["ADDI R1, R0, 1", "HLT"]);
    run_to_completion(&mut simulator);
    let cycles = simulator.cycle;
    simulator.step();
    simulator.step();
    assert_eq!(simulator.cycle, cycles);
    assert_eq!(int_reg(&simulator, "R1"), 1);
}
