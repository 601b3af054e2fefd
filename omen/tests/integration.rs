//! Train → Persist → Load → Enumerate
//!
//! The full pipeline on a tiny corpus, through real files.

#![allow(clippy::pedantic, clippy::nursery)]
#![allow(clippy::unwrap_used)]

use std::io::BufReader;

use omen::{
    train, write_model, AdditiveSmoothing, Alphabet, AttackSimulator, Discipline, Enumerator,
    Model, RunOptions, SinkPolicy, TrainOptions, TrainOutput, WarningSink,
};

const CORPUS: &str = "password\npassword\npassword\npass\npass1\nword\nsword\npasswords\n";

fn trained_model(dir: &std::path::Path) -> Model {
    let options = TrainOptions {
        order: 3,
        ..TrainOptions::default()
    };
    let alphabet = Alphabet::new(b"abdoprsw1").unwrap();
    let mut sink = WarningSink::new(false);
    let counts = train(BufReader::new(CORPUS.as_bytes()), alphabet, &options, &mut sink).unwrap();
    assert_eq!(sink.emitted(), 0);

    let out = TrainOutput::in_directory(dir, "corpus.txt");
    write_model(&counts, &AdditiveSmoothing::default(), &options, &out).unwrap();
    Model::load(&out.config_path).unwrap()
}

// =============================================================================
// PIPELINE
// =============================================================================

#[test]
fn trained_model_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let model = trained_model(dir.path());

    assert_eq!(model.order(), 3);
    assert_eq!(model.alphabet().len(), 9);
    assert_eq!(model.ip().len(), 81);
    assert_eq!(model.cp().len(), 729);
    assert_eq!(model.ep().len(), 81);
    assert_eq!(model.ln().len(), omen::MAX_PW_LENGTH);
}

#[test]
fn enumeration_finds_the_dominant_corpus_password() {
    let dir = tempfile::tempdir().unwrap();
    let model = trained_model(dir.path());

    let mut simulator = AttackSimulator::new();
    simulator.add_target(b"password");

    let options = RunOptions {
        discipline: Discipline::Fixed(8),
        max_attempts: 2_000_000,
        ..RunOptions::default()
    };
    let report = Enumerator::new(&model, options)
        .unwrap()
        .with_simulator(&mut simulator)
        .run()
        .unwrap();

    assert!(
        simulator.fully_cracked(),
        "\"password\" not found within {} attempts",
        report.attempts
    );
}

#[test]
fn emitted_candidates_stay_inside_the_model_space() {
    let dir = tempfile::tempdir().unwrap();
    let model = trained_model(dir.path());

    let options = RunOptions {
        max_attempts: 500,
        ..RunOptions::default()
    };
    let mut buffer = Vec::new();
    let report = Enumerator::new(&model, options)
        .unwrap()
        .with_sink(&mut buffer, SinkPolicy::All)
        .run()
        .unwrap();

    let text = String::from_utf8(buffer).unwrap();
    let candidates: Vec<&str> = text.lines().collect();
    assert_eq!(candidates.len() as u64, report.attempts);
    assert_eq!(report.attempts, 500);
    for candidate in candidates {
        assert!(candidate.len() >= model.order() - 1);
        assert!(candidate.len() < omen::MAX_PW_LENGTH);
        assert!(candidate
            .bytes()
            .all(|c| model.alphabet().position_of(c).is_some()));
    }
}
