//! # OMEN
//!
//! Ordered Markov ENumerator: trains an n-gram Markov model on a password
//! corpus and enumerates candidate passwords in descending order of
//! estimated probability, without ever materialising the candidate space.
//!
//! Probabilities are discretised into small integer *levels* (lower = more
//! probable). Enumeration walks *level chains* — per-transition level
//! sequences of a fixed sum — and expands each chain into every candidate
//! string realising it through level-sorted n-gram indices.
//!
//! # Usage
//! ```no_run
//! use omen::{Discipline, Enumerator, Model, RunOptions};
//!
//! let model = Model::load(std::path::Path::new("results/omen.cfg"))?;
//! let options = RunOptions {
//!     discipline: Discipline::Fixed(8),
//!     ..RunOptions::default()
//! };
//! let mut stdout = std::io::stdout().lock();
//! let report = Enumerator::new(&model, options)?
//!     .with_sink(&mut stdout, omen::SinkPolicy::All)
//!     .run()?;
//! eprintln!("emitted {} candidates", report.attempts);
//! # Ok::<(), omen::OmenError>(())
//! ```

// =============================================================================
// MODULES
// =============================================================================

pub mod alphabet;
pub mod boost;
pub mod chain;
pub mod enumerator;
pub mod error;
pub mod evaluate;
pub mod index;
pub mod model;
pub mod scheduler;
pub mod simulate;
pub mod smoothing;
pub mod train;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Exclusive upper bound on password length; LN has one level per length
/// below it.
pub const MAX_PW_LENGTH: usize = 20;

/// Default exclusive level cap L.
pub const DEFAULT_MAX_LEVEL: u8 = 11;

/// Smallest accepted level cap.
pub const MIN_MAX_LEVEL: u8 = 2;

/// Largest accepted level cap.
pub const MAX_MAX_LEVEL: u8 = 101;

/// Smallest supported n-gram order.
pub const MIN_NGRAM: usize = 2;

/// Largest supported n-gram order.
pub const MAX_NGRAM: usize = 5;

/// Default attempt budget of an enumeration run.
pub const DEFAULT_MAX_ATTEMPTS: u64 = 1_000_000_000;

/// Hard cap on the attempt budget.
pub const MAX_MAX_ATTEMPTS: u64 = i64::MAX as u64;

/// Progress and graph samples are taken every `max_attempts / 100` attempts.
pub const OUTPUT_CYCLE_FACTOR: u64 = 100;

/// Default 72-character alphabet used when training without an explicit one.
pub const DEFAULT_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()";

// =============================================================================
// EXPORTS
// =============================================================================

pub use alphabet::Alphabet;
pub use boost::{apply as boost_apply, apply_all as boost_apply_all, read_alphas, BoostSnapshot, HintSet};
pub use chain::LevelChain;
pub use enumerator::{
    run_boosted_attack, Enumerator, IndexStats, Outcome, RunOptions, RunReport, SinkPolicy,
    TargetResult,
};
pub use error::{OmenError, Result, Warning, WarningSink};
pub use evaluate::{evaluate, Evaluation};
pub use index::{SortedCp, SortedIp};
pub use model::{Model, ModelConfig};
pub use scheduler::{Discipline, SortedLengths};
pub use simulate::AttackSimulator;
pub use smoothing::{AdditiveSmoothing, ArrayKind};
pub use train::{train, write_model, Counts, TrainOptions, TrainOutput};
