//! Boosting Scenarios
//!
//! Per-target boosted attacks end to end: hint files, apply/revert around
//! every run, crack accounting across targets and the attempts-per-target
//! protocol.

#![allow(clippy::pedantic, clippy::nursery)]
#![allow(clippy::unwrap_used)]

use std::io::Write;

use omen::{
    run_boosted_attack, Alphabet, AttackSimulator, Discipline, HintSet, Model, RunOptions,
};

// =============================================================================
// HELPERS
// =============================================================================

/// Σ = {a, b}, n = 2, L = 11: "a"-paths are expensive, "b"-paths cheap.
fn model() -> Model {
    let alphabet = Alphabet::new(b"ab").unwrap();
    Model::new(
        2,
        alphabet,
        11,
        vec![5, 0],
        vec![5, 5, 5, 0],
        vec![0, 0],
        vec![0; omen::MAX_PW_LENGTH],
    )
    .unwrap()
}

fn write_file(dir: &std::path::Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

// =============================================================================
// PER-TARGET ATTACK
// =============================================================================

#[test]
fn boosted_attack_restores_the_model_after_every_target() {
    let dir = tempfile::tempdir().unwrap();
    let targets = write_file(dir.path(), "targets.txt", "aaa\nbbb\n");
    let hints = write_file(dir.path(), "hints.txt", "aaa\nbbb\n");

    let mut m = model();
    let pristine = m.clone();
    let hint_set = HintSet::read(&hints, 1).unwrap();
    let mut simulator = AttackSimulator::for_boosting();

    let options = RunOptions {
        discipline: Discipline::Fixed(3),
        max_attempts: 1000,
        ..RunOptions::default()
    };
    let results = run_boosted_attack(
        &mut m,
        &targets,
        &[5],
        &hint_set,
        true,
        options,
        &mut simulator,
        None,
        None,
    )
    .unwrap();

    assert_eq!(m, pristine);
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.cracked));
    assert_eq!(simulator.cracked_count(), 2);
}

#[test]
fn boosting_pulls_the_hinted_target_forward() {
    let dir = tempfile::tempdir().unwrap();
    let targets = write_file(dir.path(), "targets.txt", "aaa\n");
    let hints = write_file(dir.path(), "hints.txt", "aaa\n");
    let hint_set = HintSet::read(&hints, 1).unwrap();

    let options = RunOptions {
        discipline: Discipline::Fixed(3),
        max_attempts: 1000,
        ..RunOptions::default()
    };

    // Unboosted baseline: "aaa" sits behind the whole "b" side of the space.
    let mut m = model();
    let mut baseline_sim = AttackSimulator::new();
    baseline_sim.add_target(b"aaa");
    let baseline = omen::Enumerator::new(&m, options)
        .unwrap()
        .with_simulator(&mut baseline_sim)
        .run()
        .unwrap();
    assert!(baseline_sim.fully_cracked());

    // With an exact hint and α = 5 every gram of "aaa" drops to level 0.
    let mut simulator = AttackSimulator::for_boosting();
    let results = run_boosted_attack(
        &mut m,
        &targets,
        &[5],
        &hint_set,
        true,
        options,
        &mut simulator,
        None,
        None,
    )
    .unwrap();

    assert!(results[0].cracked);
    assert!(
        results[0].attempts < baseline.attempts,
        "boosted: {} baseline: {}",
        results[0].attempts,
        baseline.attempts
    );
}

#[test]
fn per_target_attempts_restart_and_respect_the_budget() {
    let dir = tempfile::tempdir().unwrap();
    // The second target is outside the alphabet, so it can never crack.
    let targets = write_file(dir.path(), "targets.txt", "bbb\nzzz\n");
    let hints = write_file(dir.path(), "hints.txt", "bb\nbb\n");
    let hint_set = HintSet::read(&hints, 1).unwrap();

    let mut m = model();
    let mut simulator = AttackSimulator::for_boosting();
    let options = RunOptions {
        discipline: Discipline::Fixed(3),
        max_attempts: 6,
        ..RunOptions::default()
    };
    let results = run_boosted_attack(
        &mut m,
        &targets,
        &[3],
        &hint_set,
        false,
        options,
        &mut simulator,
        None,
        None,
    )
    .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results[0].cracked);
    assert!(!results[1].cracked);
    // The budget is per target, not shared.
    assert_eq!(results[1].attempts, 6);
    assert_eq!(simulator.cracked_count(), 1);
    assert_eq!(simulator.testing_set_size(), 2);
}

#[test]
fn missing_hint_rows_are_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let targets = write_file(dir.path(), "targets.txt", "bbb\nbbb\n");
    let hints = write_file(dir.path(), "hints.txt", "bb\n");
    let hint_set = HintSet::read(&hints, 1).unwrap();

    let mut m = model();
    let pristine = m.clone();
    let mut simulator = AttackSimulator::for_boosting();
    let err = run_boosted_attack(
        &mut m,
        &targets,
        &[1],
        &hint_set,
        false,
        RunOptions {
            discipline: Discipline::Fixed(3),
            max_attempts: 10,
            ..RunOptions::default()
        },
        &mut simulator,
        None,
        None,
    )
    .unwrap_err();

    assert!(matches!(err, omen::OmenError::Config(_)));
    // The first target ran and the model still came back pristine.
    assert_eq!(m, pristine);
}

// =============================================================================
// CUMULATIVE BOOSTING
// =============================================================================

#[test]
fn apply_all_biases_the_model_for_a_single_run() {
    let dir = tempfile::tempdir().unwrap();
    let hints = write_file(dir.path(), "hints.txt", "aa\naa\n");
    let hint_set = HintSet::read(&hints, 1).unwrap();

    let mut m = model();
    omen::boost_apply_all(&mut m, &[3], &hint_set, false);

    // Two rows, α = 3 each: IP "a" went from 5 to 0 (clamped), CP "aa"
    // from 5 to 0; EP untouched.
    assert_eq!(m.ip(), &[0, 0]);
    assert_eq!(m.cp(), &[0, 5, 5, 0]);
    assert_eq!(m.ep(), &[0, 0]);
}
