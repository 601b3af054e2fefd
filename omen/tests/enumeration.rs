//! Enumeration Scenarios
//!
//! End-to-end checks of the driver: emission order, uniqueness, the attempt
//! budget, full-crack termination and the length schedulers, all on small
//! hand-built models.

#![allow(clippy::pedantic, clippy::nursery)]
#![allow(clippy::unwrap_used)]

use omen::{
    Alphabet, AttackSimulator, Discipline, Enumerator, Model, Outcome, RunOptions, SinkPolicy,
};

// =============================================================================
// HELPERS
// =============================================================================

/// Σ = {a, b}, n = 2, L = 3: IP a=2 b=0; CP aa=0 ab=1 ba=1 bb=0; EP all 0.
fn toy_model() -> Model {
    let alphabet = Alphabet::new(b"ab").unwrap();
    Model::new(
        2,
        alphabet,
        3,
        vec![2, 0],
        vec![0, 1, 1, 0],
        vec![0, 0],
        vec![0; omen::MAX_PW_LENGTH],
    )
    .unwrap()
}

/// Uniform model over {a, b}: every level 0 except the LN table.
fn flat_model(max_level: u8, ln: Vec<u8>) -> Model {
    let alphabet = Alphabet::new(b"ab").unwrap();
    Model::new(2, alphabet, max_level, vec![0, 0], vec![0; 4], vec![0, 0], ln).unwrap()
}

fn collect(model: &Model, options: RunOptions) -> (Vec<String>, Outcome) {
    let mut buffer = Vec::new();
    let report = Enumerator::new(model, options)
        .unwrap()
        .with_sink(&mut buffer, SinkPolicy::All)
        .run()
        .unwrap();
    let lines = String::from_utf8(buffer)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    (lines, report.outcome)
}

// =============================================================================
// EMISSION ORDER & UNIQUENESS
// =============================================================================

#[test]
fn first_candidate_follows_the_level_zero_path() {
    let model = toy_model();
    let options = RunOptions {
        discipline: Discipline::Fixed(3),
        ..RunOptions::default()
    };
    let (candidates, _) = collect(&model, options);
    // IP "b" is level 0, CP "bb" is level 0, EP "b" matches slot 0.
    assert_eq!(candidates[0], "bbb");
}

#[test]
fn fixed_length_emits_every_candidate_exactly_once() {
    let model = toy_model();
    let options = RunOptions {
        discipline: Discipline::Fixed(3),
        ..RunOptions::default()
    };
    let (candidates, outcome) = collect(&model, options);
    assert_eq!(outcome, Outcome::Exhausted);

    // All 8 strings over {a, b}^3 come out, none twice.
    let mut sorted = candidates.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), candidates.len());
    assert_eq!(candidates.len(), 8);
    assert!(candidates.iter().all(|c| c.len() == 3));
}

#[test]
fn emission_is_deterministic() {
    let model = toy_model();
    let options = RunOptions {
        discipline: Discipline::Fixed(4),
        ..RunOptions::default()
    };
    let (first, _) = collect(&model, options);
    let (second, _) = collect(&model, options);
    assert_eq!(first, second);
}

#[test]
fn ignore_ep_accepts_unconditionally() {
    // EP levels that never match any chain slot would reject everything;
    // ignoring EP must still emit all strings (with one slot fewer).
    let alphabet = Alphabet::new(b"ab").unwrap();
    let model = Model::new(
        2,
        alphabet,
        3,
        vec![0, 0],
        vec![0; 4],
        vec![2, 2],
        vec![0; omen::MAX_PW_LENGTH],
    )
    .unwrap();

    let with_ep = RunOptions {
        discipline: Discipline::Fixed(3),
        ..RunOptions::default()
    };
    let without_ep = RunOptions {
        ignore_ep: true,
        ..with_ep
    };
    // With EP: candidates only surface once the chain's EP slot reaches 2.
    let (kept, _) = collect(&model, with_ep);
    assert_eq!(kept.len(), 8);
    let (ignored, _) = collect(&model, without_ep);
    assert_eq!(ignored.len(), 8);
    // Ignoring EP emits them earlier: target level 0 already yields all 8.
    let budget_one_level = RunOptions {
        max_attempts: 8,
        ..without_ep
    };
    let (first_batch, _) = collect(&model, budget_one_level);
    assert_eq!(first_batch.len(), 8);
}

// =============================================================================
// BUDGET
// =============================================================================

#[test]
fn budget_stops_enumeration_exactly() {
    let model = toy_model();
    let options = RunOptions {
        discipline: Discipline::Fixed(3),
        max_attempts: 5,
        ..RunOptions::default()
    };
    let mut buffer = Vec::new();
    let report = Enumerator::new(&model, options)
        .unwrap()
        .with_sink(&mut buffer, SinkPolicy::All)
        .run()
        .unwrap();
    assert_eq!(report.outcome, Outcome::Done);
    assert_eq!(report.attempts, 5);
    assert_eq!(String::from_utf8(buffer).unwrap().lines().count(), 5);
}

#[test]
fn attempts_equal_created_length_totals() {
    let model = flat_model(3, vec![0; omen::MAX_PW_LENGTH]);
    let options = RunOptions {
        max_attempts: 100,
        ..RunOptions::default()
    };
    let report = Enumerator::new(&model, options).unwrap().run().unwrap();
    assert_eq!(report.attempts, 100);
    assert_eq!(report.created_lengths.iter().sum::<u64>(), report.attempts);
}

#[test]
fn rejects_out_of_range_budget_and_length() {
    let model = toy_model();
    let options = RunOptions {
        max_attempts: 0,
        ..RunOptions::default()
    };
    assert!(Enumerator::new(&model, options).is_err());

    let options = RunOptions {
        discipline: Discipline::Fixed(omen::MAX_PW_LENGTH),
        ..RunOptions::default()
    };
    assert!(Enumerator::new(&model, options).is_err());
}

// =============================================================================
// SIMULATED ATTACK
// =============================================================================

#[test]
fn full_crack_terminates_the_run() {
    let model = toy_model();
    let mut simulator = AttackSimulator::new();
    simulator.add_target(b"bbb");

    let options = RunOptions {
        discipline: Discipline::Fixed(3),
        ..RunOptions::default()
    };
    let report = Enumerator::new(&model, options)
        .unwrap()
        .with_simulator(&mut simulator)
        .run()
        .unwrap();

    assert_eq!(report.outcome, Outcome::Done);
    // "bbb" is the very first candidate.
    assert_eq!(report.attempts, 1);
    assert_eq!(simulator.cracked_count(), 1);
    assert_eq!(simulator.testing_set_size(), 1);
    assert!(simulator.fully_cracked());
}

#[test]
fn graph_files_get_final_sample_on_full_crack() {
    let dir = tempfile::tempdir().unwrap();
    let model = toy_model();
    let mut simulator = AttackSimulator::new();
    simulator.add_target(b"bbb");
    simulator.attach_graphs(dir.path(), 1000).unwrap();

    let options = RunOptions {
        discipline: Discipline::Fixed(3),
        ..RunOptions::default()
    };
    Enumerator::new(&model, options)
        .unwrap()
        .with_simulator(&mut simulator)
        .run()
        .unwrap();

    let graph = std::fs::read_to_string(dir.path().join("graphCracked.txt")).unwrap();
    assert_eq!(graph, "1 1.000000\n");
}

// =============================================================================
// LENGTH SCHEDULING
// =============================================================================

#[test]
fn global_scheduler_iterates_lengths_by_level() {
    let mut ln = vec![10u8; omen::MAX_PW_LENGTH];
    ln[3] = 0;
    ln[4] = 1;
    let model = flat_model(11, ln);

    let options = RunOptions {
        max_attempts: 24,
        ..RunOptions::default()
    };
    let (candidates, _) = collect(&model, options);
    // All 8 level-0 strings of length 3 precede the 16 of length 4.
    assert_eq!(candidates.len(), 24);
    assert!(candidates[..8].iter().all(|c| c.len() == 3));
    assert!(candidates[8..].iter().all(|c| c.len() == 4));
}

#[test]
fn length_override_orders_by_ascending_length() {
    let model = flat_model(11, vec![7; omen::MAX_PW_LENGTH]);
    let options = RunOptions {
        length_override: Some(5),
        max_attempts: 6,
        ..RunOptions::default()
    };
    let (candidates, _) = collect(&model, options);
    // All lengths share effective level 5; ties resolve ascending, so the
    // two one-character candidates come first.
    assert_eq!(candidates[0], "a");
    assert_eq!(candidates[1], "b");
    assert!(candidates[2..].iter().all(|c| c.len() == 2));
}

#[test]
fn adaptive_scheduler_covers_lengths_without_duplicates() {
    let model = toy_model();
    let options = RunOptions {
        discipline: Discipline::Adaptive,
        max_attempts: 30,
        ..RunOptions::default()
    };
    let (candidates, outcome) = collect(&model, options);
    assert_eq!(outcome, Outcome::Done);
    assert_eq!(candidates.len(), 30);

    // Every length of at least n is scheduled once before rates decide;
    // nothing is emitted twice.
    let mut sorted = candidates.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), candidates.len());
    assert!(candidates.iter().all(|c| c.len() >= 2));
    let lengths: std::collections::HashSet<usize> =
        candidates.iter().map(String::len).collect();
    assert!(lengths.len() > 1);
}

#[test]
fn fixed_and_global_agree_on_a_length() {
    // LN gates everything but length 3 behind level 10, so the first eight
    // global candidates are exactly the length-3 space.
    let alphabet = Alphabet::new(b"ab").unwrap();
    let mut ln = vec![10u8; omen::MAX_PW_LENGTH];
    ln[3] = 0;
    let model = Model::new(
        2,
        alphabet,
        11,
        vec![2, 0],
        vec![0, 1, 1, 0],
        vec![0, 0],
        ln,
    )
    .unwrap();

    let fixed = RunOptions {
        discipline: Discipline::Fixed(3),
        ..RunOptions::default()
    };
    let (mut from_fixed, _) = collect(&model, fixed);

    let global = RunOptions {
        max_attempts: 8,
        ..RunOptions::default()
    };
    let (mut from_global, _) = collect(&model, global);
    assert!(from_global.iter().all(|c| c.len() == 3));

    from_fixed.sort();
    from_global.sort();
    assert_eq!(from_fixed, from_global);
}

// =============================================================================
// CANCELLATION
// =============================================================================

#[test]
fn cancellation_interrupts_between_emissions() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    let model = toy_model();
    let cancel = Arc::new(AtomicBool::new(false));
    cancel.store(true, Ordering::Relaxed);

    let options = RunOptions {
        discipline: Discipline::Fixed(3),
        ..RunOptions::default()
    };
    let err = Enumerator::new(&model, options)
        .unwrap()
        .with_cancel(cancel)
        .run()
        .unwrap_err();
    assert!(matches!(err, omen::OmenError::Interrupted));
}
