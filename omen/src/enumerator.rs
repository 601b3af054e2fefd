//! Candidate expansion and the enumeration driver.
//!
//! The driver owns the attempt budget and composes the pieces: the length
//! scheduler produces `(length, target level)` tickets, the chain generator
//! walks every level chain for a ticket, and the expander realises each
//! chain into candidate strings through the sorted indices. Every emitted
//! candidate bumps the attempt counter exactly once and is forwarded to the
//! sink and, when attached, the attack simulator.
//!
//! For a fixed model the emission order is deterministic: it follows the
//! sorted-index storage order, which is ascending code order within a level
//! bucket (see [`crate::index`]).

use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::alphabet::Alphabet;
use crate::boost::{self, BoostSnapshot, HintSet};
use crate::chain::LevelChain;
use crate::error::{OmenError, Result};
use crate::index::{SortedCp, SortedIp};
use crate::model::Model;
use crate::scheduler::{AdaptiveState, Discipline, SortedLengths};
use crate::simulate::AttackSimulator;
use crate::{DEFAULT_MAX_ATTEMPTS, MAX_MAX_ATTEMPTS, MAX_PW_LENGTH, OUTPUT_CYCLE_FACTOR};

// =============================================================================
// OPTIONS & RESULTS
// =============================================================================

/// Knobs of one enumeration run.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Length-scheduling discipline.
    pub discipline: Discipline,
    /// Skip the end-probability check on candidate acceptance.
    pub ignore_ep: bool,
    /// Ignore the attempt budget and keep emitting until exhaustion.
    pub endless: bool,
    /// Attempt budget; enumeration stops once reached.
    pub max_attempts: u64,
    /// Length-level factor: each length's effective level grows by
    /// `⌊len · factor⌋`.
    pub length_factor: f32,
    /// Flat override replacing the LN levels of every length.
    pub length_override: Option<u32>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            discipline: Discipline::Global,
            ignore_ep: false,
            endless: false,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            length_factor: 0.0,
            length_override: None,
        }
    }
}

/// What the candidate sink receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkPolicy {
    /// Every emitted candidate, one per line.
    All,
    /// Only cracked candidates, as `password, attempts` lines.
    CrackedWithAttempts,
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Attempt budget exhausted or testing set fully cracked.
    Done,
    /// Every length ran out of level chains first.
    Exhausted,
}

/// Per-level index populations and the length table, for run logs.
#[derive(Debug, Clone)]
pub struct IndexStats {
    /// CP bucket population per level.
    pub cp_per_level: Vec<u64>,
    /// IP bucket population per level.
    pub ip_per_level: Vec<u64>,
    /// EP preimage size per level.
    pub ep_per_level: Vec<u64>,
    /// `(length, effective level)` in scheduling order.
    pub length_levels: Vec<(usize, u32)>,
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Why the run ended.
    pub outcome: Outcome,
    /// Total candidates emitted.
    pub attempts: u64,
    /// Candidates emitted per length (index `len − 1`).
    pub created_lengths: [u64; MAX_PW_LENGTH],
    /// Index statistics gathered at build time.
    pub index_stats: IndexStats,
}

// =============================================================================
// ENUMERATOR
// =============================================================================

/// One enumeration run over a loaded model.
///
/// The model tables are borrowed immutably for the whole run; boosting
/// mutates the model *between* runs and builds a fresh `Enumerator` per
/// target.
pub struct Enumerator<'a> {
    model: &'a Model,
    options: RunOptions,
    sink: Option<&'a mut dyn Write>,
    sink_policy: SinkPolicy,
    simulator: Option<&'a mut AttackSimulator>,
    cancel: Option<Arc<AtomicBool>>,
    progress: Option<Box<dyn FnMut(u64, f64) + 'a>>,
}

impl<'a> Enumerator<'a> {
    /// Create a run over `model`.
    ///
    /// # Errors
    /// Fails when `max_attempts` is out of range or a fixed length lies
    /// outside `[n−1, MAX_PW_LENGTH)`.
    pub fn new(model: &'a Model, options: RunOptions) -> Result<Self> {
        if options.max_attempts < 1 || options.max_attempts > MAX_MAX_ATTEMPTS {
            return Err(OmenError::Range {
                name: "maxAttempts",
                min: 1,
                max: MAX_MAX_ATTEMPTS,
                got: options.max_attempts,
            });
        }
        if let Discipline::Fixed(length) = options.discipline {
            if length < model.order() - 1 || length >= MAX_PW_LENGTH {
                return Err(OmenError::Range {
                    name: "fixedLength",
                    min: (model.order() - 1) as u64,
                    max: (MAX_PW_LENGTH - 1) as u64,
                    got: length as u64,
                });
            }
        }
        Ok(Self {
            model,
            options,
            sink: None,
            sink_policy: SinkPolicy::All,
            simulator: None,
            cancel: None,
            progress: None,
        })
    }

    /// Send candidates to `sink` under the given policy.
    #[must_use]
    pub fn with_sink(mut self, sink: &'a mut dyn Write, policy: SinkPolicy) -> Self {
        self.sink = Some(sink);
        self.sink_policy = policy;
        self
    }

    /// Check every candidate against `simulator`.
    #[must_use]
    pub fn with_simulator(mut self, simulator: &'a mut AttackSimulator) -> Self {
        self.simulator = Some(simulator);
        self
    }

    /// Honour `cancel` between candidate emissions.
    #[must_use]
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Invoke `progress(attempts, cracked ratio)` every
    /// `max_attempts / 100` emissions.
    #[must_use]
    pub fn with_progress(mut self, progress: impl FnMut(u64, f64) + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Run to completion.
    ///
    /// On every exit path — including budget stop, exhaustion, cancellation
    /// and I/O errors — buffered sink output is flushed and the final graph
    /// sample written.
    ///
    /// # Errors
    /// Propagates sink I/O failures and [`OmenError::Interrupted`] when the
    /// cancellation token fires.
    pub fn run(&mut self) -> Result<RunReport> {
        let model = self.model;
        let max_level = model.max_level();
        let sorted_ip = SortedIp::build(model.ip(), max_level);
        let sorted_cp = SortedCp::build(
            model.cp(),
            model.alphabet().len(),
            model.prefix_count(),
            max_level,
        );
        let lengths = SortedLengths::build(
            model.ln(),
            model.order(),
            self.options.length_factor,
            self.options.length_override,
        );
        let index_stats = collect_stats(model, &sorted_ip, &sorted_cp, &lengths);

        let mut state = RunState {
            order: model.order(),
            max_level,
            ignore_ep: self.options.ignore_ep,
            endless: self.options.endless,
            max_attempts: self.options.max_attempts,
            progress_step: (self.options.max_attempts / OUTPUT_CYCLE_FACTOR).max(1),
            alphabet: model.alphabet(),
            ep: model.ep(),
            sorted_ip,
            sorted_cp,
            lengths,
            pw: [0; MAX_PW_LENGTH],
            attempts: 0,
            created_lengths: [0; MAX_PW_LENGTH],
            last_length: 0,
            sink: self.sink.as_deref_mut(),
            sink_policy: self.sink_policy,
            simulator: self.simulator.as_deref_mut(),
            cancel: self.cancel.as_deref(),
            progress: self.progress.as_deref_mut(),
        };

        let run_result = state.dispatch(self.options.discipline);

        // Finalisation happens on every exit path.
        if let Some(sim) = state.simulator.as_deref_mut() {
            sim.finish(state.attempts, state.last_length);
        }
        let flush_result = match state.sink.as_deref_mut() {
            Some(sink) => sink.flush(),
            None => Ok(()),
        };

        let outcome = run_result?;
        flush_result.map_err(|e| OmenError::io("<candidate sink>", e))?;

        Ok(RunReport {
            outcome,
            attempts: state.attempts,
            created_lengths: state.created_lengths,
            index_stats,
        })
    }
}

fn collect_stats(
    model: &Model,
    sorted_ip: &SortedIp,
    sorted_cp: &SortedCp,
    lengths: &SortedLengths,
) -> IndexStats {
    let max_level = usize::from(model.max_level());
    let mut ep_per_level = vec![0u64; max_level];
    for &level in model.ep() {
        ep_per_level[usize::from(level.min(model.max_level() - 1))] += 1;
    }
    IndexStats {
        cp_per_level: (0..max_level).map(|l| sorted_cp.level_population(l)).collect(),
        ip_per_level: (0..max_level).map(|l| sorted_ip.count(l) as u64).collect(),
        ep_per_level,
        length_levels: lengths.entries().to_vec(),
    }
}

// =============================================================================
// RUN STATE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Mutable state of one run. `'r` is the borrow of the [`Enumerator`], `'a`
/// the lifetime its sink/progress trait objects were registered with.
struct RunState<'r, 'a> {
    order: usize,
    max_level: u8,
    ignore_ep: bool,
    endless: bool,
    max_attempts: u64,
    progress_step: u64,
    alphabet: &'r Alphabet,
    ep: &'r [u8],
    sorted_ip: SortedIp,
    sorted_cp: SortedCp,
    lengths: SortedLengths,
    pw: [u8; MAX_PW_LENGTH],
    attempts: u64,
    created_lengths: [u64; MAX_PW_LENGTH],
    last_length: usize,
    sink: Option<&'r mut (dyn Write + 'a)>,
    sink_policy: SinkPolicy,
    simulator: Option<&'r mut AttackSimulator>,
    cancel: Option<&'r AtomicBool>,
    progress: Option<&'r mut (dyn FnMut(u64, f64) + 'a)>,
}

impl RunState<'_, '_> {
    fn dispatch(&mut self, discipline: Discipline) -> Result<Outcome> {
        match discipline {
            Discipline::Global => self.run_global(),
            Discipline::Fixed(length) => self.run_fixed(length),
            Discipline::Adaptive => self.run_adaptive(),
        }
    }

    /// Chain length for a password length: one slot for IP, one per CP
    /// transition, and one for EP unless that check is disabled.
    fn chain_len(&self, length: usize) -> usize {
        if self.ignore_ep {
            length + 2 - self.order
        } else {
            length + 3 - self.order
        }
    }

    // =========================================================================
    // DISCIPLINES
    // =========================================================================

    fn run_global(&mut self) -> Result<Outcome> {
        let cap = u32::from(self.max_level - 1);
        let overall_max = cap * MAX_PW_LENGTH as u32 + self.lengths.max_effective_level();

        let mut overall = 0u32;
        loop {
            // Lengths already saturated at this overall level, cheapest first.
            for i in 0..self.lengths.saturated_prefix(overall) {
                let (length, effective) = self.lengths.entries()[i];
                if self.run_ticket(length, overall - effective)? == Flow::Stop {
                    return Ok(Outcome::Done);
                }
            }
            overall += 1;
            if overall > overall_max {
                tracing::warn!("all possible level chains have been created");
                return Ok(Outcome::Exhausted);
            }
        }
    }

    fn run_fixed(&mut self, length: usize) -> Result<Outcome> {
        let target_max = u32::from(self.max_level - 1) * self.chain_len(length) as u32;
        for target in 0..=target_max {
            if self.run_ticket(length, target)? == Flow::Stop {
                return Ok(Outcome::Done);
            }
        }
        tracing::warn!(length, "all possible level chains have been created");
        Ok(Outcome::Exhausted)
    }

    fn run_adaptive(&mut self) -> Result<Outcome> {
        let mut adaptive = AdaptiveState::new(self.order);
        while let Some(length) = adaptive.pick() {
            let target = adaptive.level(length);
            let old_attempts = self.attempts;
            let old_cracked = self.simulator.as_deref().map_or(0, AttackSimulator::cracked_count);

            if self.run_ticket(length, target as u32)? == Flow::Stop {
                return Ok(Outcome::Done);
            }

            let cracked_delta =
                self.simulator.as_deref().map_or(0, AttackSimulator::cracked_count) - old_cracked;
            let final_target = u64::from(self.max_level - 1) * self.chain_len(length) as u64;
            adaptive.settle(length, cracked_delta, self.attempts - old_attempts, final_target);
        }
        tracing::warn!("all possible level chains have been created");
        Ok(Outcome::Exhausted)
    }

    // =========================================================================
    // EXPANSION
    // =========================================================================

    /// Expand every chain of one `(length, target)` ticket.
    fn run_ticket(&mut self, length: usize, target: u32) -> Result<Flow> {
        let mut chain = LevelChain::new(self.chain_len(length), target, self.max_level);
        while chain.advance() {
            if self.expand(chain.slots(), length)? == Flow::Stop {
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    /// Seed the candidate with every initial (n−1)-gram at the chain's first
    /// level, then grow it transition by transition.
    fn expand(&mut self, chain: &[u32], length: usize) -> Result<Flow> {
        let ip_level = chain[0] as usize;
        let k = self.order - 1;
        let alphabet = self.alphabet;

        for i in 0..self.sorted_ip.count(ip_level) {
            let code = self.sorted_ip.codes(ip_level)[i] as usize;
            alphabet.decode_positions(code, &mut self.pw[..k]);
            if self.expand_rec(chain, k, length)? == Flow::Stop {
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    fn expand_rec(&mut self, chain: &[u32], cur: usize, length: usize) -> Result<Flow> {
        let k = self.order - 1;
        let prefix = self.alphabet.code_of_positions(&self.pw[cur - k..cur]);

        if cur == length {
            if !self.ignore_ep {
                // The chain's last slot is reserved for the terminal gram.
                let slot = chain[cur - (self.order - 2)];
                if u32::from(self.ep[prefix]) != slot {
                    return Ok(Flow::Continue);
                }
            }
            return self.emit(length);
        }

        let level = chain[cur - (self.order - 2)] as usize;
        let continuations = self.sorted_cp.count(level, prefix);
        for i in 0..continuations {
            self.pw[cur] = self.sorted_cp.at(level, prefix, i);
            if self.expand_rec(chain, cur + 1, length)? == Flow::Stop {
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    // =========================================================================
    // EMISSION
    // =========================================================================

    fn emit(&mut self, length: usize) -> Result<Flow> {
        if let Some(cancel) = self.cancel {
            if cancel.load(Ordering::Relaxed) {
                return Err(OmenError::Interrupted);
            }
        }

        self.attempts += 1;
        self.created_lengths[length - 1] += 1;
        self.last_length = length;
        let attempts = self.attempts;

        let mut candidate = [0u8; MAX_PW_LENGTH];
        for (slot, &position) in candidate[..length].iter_mut().zip(&self.pw[..length]) {
            *slot = self.alphabet.as_bytes()[usize::from(position)];
        }
        let candidate = &candidate[..length];

        let hit = match self.simulator.as_deref_mut() {
            Some(sim) => sim.check_candidate(candidate, length, attempts),
            None => false,
        };

        if let Some(sink) = self.sink.as_deref_mut() {
            let write_result = match self.sink_policy {
                SinkPolicy::All => sink
                    .write_all(candidate)
                    .and_then(|()| sink.write_all(b"\n")),
                SinkPolicy::CrackedWithAttempts if hit => sink
                    .write_all(candidate)
                    .and_then(|()| writeln!(sink, ", {attempts}")),
                SinkPolicy::CrackedWithAttempts => Ok(()),
            };
            write_result.map_err(|e| OmenError::io("<candidate sink>", e))?;
        }

        if attempts % self.progress_step == 0 {
            let ratio = self.simulator.as_deref().map_or(0.0, AttackSimulator::ratio);
            if let Some(progress) = self.progress.as_deref_mut() {
                progress(attempts, ratio);
            }
        }

        if let Some(sim) = self.simulator.as_deref() {
            // Boosting attacks one target per run; any hit ends the run.
            if sim.fully_cracked() || (sim.boosting() && hit) {
                return Ok(Flow::Stop);
            }
        }
        if !self.endless && attempts >= self.max_attempts {
            return Ok(Flow::Stop);
        }
        Ok(Flow::Continue)
    }
}

// =============================================================================
// BOOSTED ATTACK DRIVER
// =============================================================================

/// Per-target outcome of a boosted simulated attack.
#[derive(Debug, Clone)]
pub struct TargetResult {
    /// The target password, as read from the testing set.
    pub target: Vec<u8>,
    /// Attempts spent on this target (the counter restarts per target).
    pub attempts: u64,
    /// Whether the target was cracked within the budget.
    pub cracked: bool,
}

/// Run one boosted enumeration per target of a testing-set file.
///
/// For each target line, the matching hint row is applied to the model, the
/// sorted indices are rebuilt (each run builds fresh ones), the chosen
/// discipline runs until crack or budget, and the model is restored from the
/// pre-boost snapshot — also when a run fails, so the caller always gets its
/// model back unbiased.
///
/// # Errors
/// Fails on I/O errors, a target without a hint row, and everything
/// [`Enumerator::run`] can fail with.
#[allow(clippy::too_many_arguments)]
pub fn run_boosted_attack(
    model: &mut Model,
    targets_path: &Path,
    alphas: &[u32],
    hints: &HintSet,
    boost_ep: bool,
    options: RunOptions,
    simulator: &mut AttackSimulator,
    mut cracked_sink: Option<&mut dyn Write>,
    cancel: Option<&Arc<AtomicBool>>,
) -> Result<Vec<TargetResult>> {
    use std::io::BufRead;

    let file = std::fs::File::open(targets_path).map_err(|e| OmenError::io(targets_path, e))?;
    let snapshot = BoostSnapshot::capture(model);
    let mut results = Vec::new();

    for (i, line) in std::io::BufReader::new(file).split(b'\n').enumerate() {
        let mut target = line.map_err(|e| OmenError::io(targets_path, e))?;
        if target.last() == Some(&b'\r') {
            target.pop();
        }

        let hint_row = hints.row(i).ok_or_else(|| {
            OmenError::Config(format!("no hint line for target number {}", i + 1))
        })?;

        simulator.add_target(&target);
        let cracked_before = simulator.cracked_count();
        boost::apply(model, alphas, hint_row, boost_ep);

        let run_result = (|| {
            let mut enumerator = Enumerator::new(model, options)?;
            if let Some(sink) = cracked_sink.as_deref_mut() {
                enumerator = enumerator.with_sink(sink, SinkPolicy::CrackedWithAttempts);
            }
            if let Some(cancel) = cancel {
                enumerator = enumerator.with_cancel(Arc::clone(cancel));
            }
            enumerator.with_simulator(&mut *simulator).run()
        })();

        // The snapshot is restored before any error propagates.
        snapshot.restore(model);
        let report = run_result?;

        results.push(TargetResult {
            target,
            attempts: report.attempts,
            cracked: simulator.cracked_count() > cracked_before,
        });
    }

    Ok(results)
}
