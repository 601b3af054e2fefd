//! Enumerate Command
//!
//! Loads a trained model and drives the enumeration: plain candidate
//! generation, simulated attacks against a testing set, and per-target
//! boosted attacks. Owns the result folder, the progress bar and the run
//! log.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use omen::{
    read_alphas, run_boosted_attack, AttackSimulator, Discipline, Enumerator, HintSet, Model,
    Outcome, RunOptions, RunReport, SinkPolicy, TargetResult,
};

/// Candidate / cracked-password sink inside the results folder.
const CREATED_FILE: &str = "createdPWs.txt";
/// Run log inside the results folder.
const LOG_FILE: &str = "log.txt";

// =============================================================================
// ARGUMENTS
// =============================================================================

/// Arguments of `omen enumerate`.
#[derive(Args)]
pub struct EnumerateArgs {
    /// Model config file
    #[arg(short, long, default_value = "results/omen.cfg", value_name = "FILE")]
    config: PathBuf,

    /// Simulate an attack against this testing set (one password per line)
    #[arg(short = 's', long, value_name = "FILE")]
    sim_att: Option<PathBuf>,

    /// Alpha file for boosting: one line of per-hint level decrements
    #[arg(long, requires = "hints", value_name = "FILE")]
    alpha: Option<PathBuf>,

    /// Hint file for boosting: one line of hints per target
    #[arg(long, requires = "alpha", value_name = "FILE")]
    hints: Option<PathBuf>,

    /// Also lower end-probability levels when boosting
    #[arg(long)]
    boost_ep: bool,

    /// Write candidates to stdout and print nothing else
    #[arg(short, long)]
    pipe: bool,

    /// Keep enumerating past the attempt budget
    #[arg(short, long)]
    endless: bool,

    /// Skip the end-probability check on candidate acceptance
    #[arg(short = 'E', long)]
    ignore_ep: bool,

    /// Only create candidates of this length
    #[arg(short = 'f', long, value_name = "LEN", conflicts_with = "adaptive")]
    fixed_length: Option<usize>,

    /// Schedule lengths adaptively by recent crack rate
    #[arg(short = 'a', long)]
    adaptive: bool,

    /// Length-level factor: penalise each length by ⌊len · factor⌋ levels
    #[arg(long, default_value_t = 0.0, value_name = "FACTOR")]
    length_factor: f32,

    /// Flat level override for every length
    #[arg(long, value_name = "LEVEL")]
    length_override: Option<u32>,

    /// Attempt budget
    #[arg(short = 'm', long, default_value_t = omen::DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u64,

    /// Print settings, progress and a report
    #[arg(short, long)]
    verbose: bool,

    /// Write cracked passwords with their attempt counts
    #[arg(short = 'F', long)]
    verbose_file: bool,

    /// Print warnings
    #[arg(short = 'w', long)]
    pub(crate) print_warnings: bool,

    /// Results directory
    #[arg(long, default_value = "results", value_name = "DIR")]
    results: PathBuf,
}

impl EnumerateArgs {
    fn options(&self) -> RunOptions {
        let discipline = match self.fixed_length {
            Some(length) => Discipline::Fixed(length),
            None if self.adaptive => Discipline::Adaptive,
            None => Discipline::Global,
        };
        RunOptions {
            discipline,
            ignore_ep: self.ignore_ep,
            endless: self.endless,
            max_attempts: self.max_attempts,
            length_factor: self.length_factor,
            length_override: self.length_override,
        }
    }

    fn boost_inputs(&self) -> Result<Option<(Vec<u32>, HintSet)>> {
        let (Some(alpha), Some(hints)) = (&self.alpha, &self.hints) else {
            return Ok(None);
        };
        let alphas = read_alphas(alpha)
            .with_context(|| format!("Failed to read alpha file: {}", alpha.display()))?;
        let hints = HintSet::read(hints, alphas.len())
            .with_context(|| format!("Failed to read hint file: {}", hints.display()))?;
        Ok(Some((alphas, hints)))
    }
}

// =============================================================================
// ENUMERATE
// =============================================================================

/// Dispatch the selected enumeration mode.
pub fn run(args: &EnumerateArgs) -> Result<()> {
    if !(0.0..=10.0).contains(&args.length_factor) {
        bail!(
            "the length-level factor must lie in [0.000, 10.000] (it is {:.3})",
            args.length_factor
        );
    }

    let mut model = Model::load(&args.config)
        .with_context(|| format!("Failed to load model: {}", args.config.display()))?;

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .context("Failed to install SIGINT handler")?;

    if args.pipe {
        return run_pipe(args, &mut model, &cancel);
    }

    std::fs::create_dir_all(&args.results)
        .with_context(|| format!("Failed to create results folder: {}", args.results.display()))?;
    let output_cycle = (args.max_attempts / omen::OUTPUT_CYCLE_FACTOR).max(1);

    if args.alpha.is_some() {
        if args.sim_att.is_none() {
            bail!("boosting requires a testing set (--sim-att) or pipe mode (--pipe)");
        }
        run_boosted(args, &mut model, &cancel, output_cycle)
    } else {
        run_standard(args, &model, &cancel, output_cycle)
    }
}

/// Pipe mode: candidates to stdout, nothing else. With boosting inputs, all
/// hint rows are applied cumulatively before the single run.
fn run_pipe(args: &EnumerateArgs, model: &mut Model, cancel: &Arc<AtomicBool>) -> Result<()> {
    if let Some((alphas, hints)) = args.boost_inputs()? {
        omen::boost_apply_all(model, &alphas, &hints, args.boost_ep);
    }

    let stdout = std::io::stdout();
    let mut sink = BufWriter::new(stdout.lock());
    Enumerator::new(model, args.options())?
        .with_sink(&mut sink, SinkPolicy::All)
        .with_cancel(Arc::clone(cancel))
        .run()?;
    Ok(())
}

/// Plain creation or simulated attack.
fn run_standard(
    args: &EnumerateArgs,
    model: &Model,
    cancel: &Arc<AtomicBool>,
    output_cycle: u64,
) -> Result<()> {
    let mut simulator = match &args.sim_att {
        Some(path) => {
            let mut sim = AttackSimulator::new();
            sim.load_testing_set(path)
                .with_context(|| format!("Failed to read testing set: {}", path.display()))?;
            sim.attach_graphs(&args.results, output_cycle)?;
            Some(sim)
        }
        None => None,
    };
    let has_simulator = simulator.is_some();

    // Without a simulator every candidate goes to the file; with one, only
    // cracked passwords do, and only when asked for.
    let sink_policy = if has_simulator {
        SinkPolicy::CrackedWithAttempts
    } else {
        SinkPolicy::All
    };
    let mut sink_file = if !has_simulator || args.verbose_file {
        let path = args.results.join(CREATED_FILE);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create result file: {}", path.display()))?;
        Some(BufWriter::new(file))
    } else {
        None
    };

    if args.verbose {
        let mut stdout = std::io::stdout().lock();
        let _ = write_settings(&mut stdout, args, model);
    }
    let bar = (args.verbose && !args.endless).then(|| progress_bar(has_simulator));

    let mut enumerator = Enumerator::new(model, args.options())?.with_cancel(Arc::clone(cancel));
    if let Some(sink) = sink_file.as_mut() {
        enumerator = enumerator.with_sink(sink, sink_policy);
    }
    if let Some(sim) = simulator.as_mut() {
        enumerator = enumerator.with_simulator(sim);
    }
    if let Some(bar) = &bar {
        let bar = bar.clone();
        let max_attempts = args.max_attempts;
        enumerator = enumerator.with_progress(move |attempts, ratio| {
            let percent = (u128::from(attempts) * 100 / u128::from(max_attempts)).min(100) as u64;
            bar.set_position(percent);
            if has_simulator {
                bar.set_message(format!("({:.1} % cracked)", ratio * 100.0));
            }
        });
    }

    let run_result = enumerator.run();
    drop(enumerator);
    if let Some(bar) = &bar {
        bar.finish_and_clear();
    }

    match run_result {
        Ok(report) => {
            if args.verbose {
                print_report(&report, simulator.as_ref());
            }
            write_log(args, model, Some(&report), simulator.as_ref())?;
            Ok(())
        }
        Err(err) => {
            // Best-effort partial log; graph files were already flushed.
            let _ = write_log(args, model, None, simulator.as_ref());
            Err(err.into())
        }
    }
}

/// Per-target boosted simulated attack.
fn run_boosted(
    args: &EnumerateArgs,
    model: &mut Model,
    cancel: &Arc<AtomicBool>,
    output_cycle: u64,
) -> Result<()> {
    let Some((alphas, hints)) = args.boost_inputs()? else {
        bail!("boosting requires both --alpha and --hints");
    };
    let Some(targets_path) = &args.sim_att else {
        bail!("boosting requires a testing set (--sim-att)");
    };

    let mut simulator = AttackSimulator::for_boosting();
    simulator.attach_graphs(&args.results, output_cycle)?;

    let mut cracked_file = if args.verbose_file {
        let path = args.results.join(CREATED_FILE);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create result file: {}", path.display()))?;
        Some(BufWriter::new(file))
    } else {
        None
    };

    if args.verbose {
        let mut stdout = std::io::stdout().lock();
        let _ = write_settings(&mut stdout, args, model);
    }

    let results = run_boosted_attack(
        model,
        targets_path,
        &alphas,
        &hints,
        args.boost_ep,
        args.options(),
        &mut simulator,
        cracked_file
            .as_mut()
            .map(|file| file as &mut dyn Write),
        Some(cancel),
    )?;

    for result in &results {
        println!(
            "{}, {}",
            String::from_utf8_lossy(&result.target),
            result.attempts
        );
    }
    if args.verbose {
        let cracked = results.iter().filter(|r| r.cracked).count();
        println!("\ncracked {cracked} of {} targets", results.len());
    }
    write_boost_log(args, model, &results)?;
    Ok(())
}

// =============================================================================
// PROGRESS & REPORTING
// =============================================================================

fn progress_bar(with_cracked: bool) -> ProgressBar {
    let bar = ProgressBar::new(100);
    let template = if with_cracked {
        "<{bar:20}> {pos:>3} % created {msg}"
    } else {
        "<{bar:20}> {pos:>3} % created"
    };
    if let Ok(style) = ProgressStyle::default_bar().template(template) {
        bar.set_style(style.progress_chars("=--"));
    }
    bar
}

fn write_settings(w: &mut impl Write, args: &EnumerateArgs, model: &Model) -> std::io::Result<()> {
    writeln!(w, "\nStarting enumeration with the following settings:")?;
    match args.options().discipline {
        Discipline::Fixed(length) => writeln!(w, " - fixedLength ({length})")?,
        Discipline::Adaptive => writeln!(w, " - adaptive length scheduling")?,
        Discipline::Global => {
            match args.length_override {
                Some(level) => writeln!(w, " - lengthLevelOverride ({level})")?,
                None => writeln!(w, " - lengthProbs")?,
            }
            writeln!(w, " - lengthLevelFactor ({:.3})", args.length_factor)?;
        }
    }
    if args.ignore_ep {
        writeln!(w, " - ignoreEPMode")?;
    }
    if args.endless {
        writeln!(w, " - endlessMode")?;
    } else {
        writeln!(w, " - maxAttempts: {}", args.max_attempts)?;
    }
    match &args.sim_att {
        Some(path) => writeln!(w, " - simulatedAttack (target: {})", path.display())?,
        None => writeln!(w, " - normalMode")?,
    }
    if args.alpha.is_some() {
        writeln!(w, " - boosting (boostEP: {})", args.boost_ep)?;
    }
    writeln!(w, " - sizeOf_N: {}", model.order())?;
    writeln!(w, " - maxLevel: {}", model.max_level())?;
    writeln!(
        w,
        " - alphabet: '{}'",
        String::from_utf8_lossy(model.alphabet().as_bytes())
    )?;
    writeln!(w, " - sizeOf_alphabet: {}", model.alphabet().len())?;
    writeln!(w)
}

fn print_report(report: &RunReport, simulator: Option<&AttackSimulator>) {
    println!("\nResults:");
    match report.outcome {
        Outcome::Done => println!("created: {} (done)", report.attempts),
        Outcome::Exhausted => println!("created: {} (all chains exhausted)", report.attempts),
    }
    if let Some(sim) = simulator {
        println!(
            "cracked: {} of {} ({:.1} %)",
            sim.cracked_count(),
            sim.testing_set_size(),
            sim.ratio() * 100.0
        );
    }
}

// =============================================================================
// RUN LOG
// =============================================================================

fn write_log(
    args: &EnumerateArgs,
    model: &Model,
    report: Option<&RunReport>,
    simulator: Option<&AttackSimulator>,
) -> Result<()> {
    let path = args.results.join(LOG_FILE);
    let file =
        File::create(&path).with_context(|| format!("Failed to create log: {}", path.display()))?;
    let mut w = BufWriter::new(file);

    writeln!(w, "=== log file for omen enumerate ===")?;
    match report {
        Some(_) => writeln!(w, "-> run through successful\n")?,
        None => writeln!(w, "-> run through failed\n")?,
    }

    writeln!(w, "== Settings ==")?;
    write_settings(&mut w, args, model)?;

    if let Some(report) = report {
        writeln!(w, "== Sorted arrays ==")?;
        writeln!(w, "lastGram (level - count):")?;
        for (level, count) in report.index_stats.cp_per_level.iter().enumerate() {
            writeln!(w, "{level:2} - {count:9}")?;
        }
        writeln!(w, "\ninitial prob (level - count):")?;
        for (level, count) in report.index_stats.ip_per_level.iter().enumerate() {
            writeln!(w, "{level:2} - {count:9}")?;
        }
        writeln!(w, "\nend prob (level - count):")?;
        for (level, count) in report.index_stats.ep_per_level.iter().enumerate() {
            writeln!(w, "{level:2} - {count:9}")?;
        }
        writeln!(w, "\nlength (length - level):")?;
        for &(length, level) in &report.index_stats.length_levels {
            writeln!(w, "{length:2} - {level:3}")?;
        }

        writeln!(w, "\n== Results ==")?;
        if args.endless {
            writeln!(w, "created: {}", report.attempts)?;
        } else {
            writeln!(w, "created: {} of {}", report.attempts, args.max_attempts)?;
        }
        writeln!(w, "\nlengths of the created passwords (length - created):")?;
        for (i, &count) in report.created_lengths.iter().enumerate() {
            if count > 0 {
                writeln!(w, "{:2} - {count:9}", i + 1)?;
            }
        }
        if let Some(sim) = simulator {
            writeln!(
                w,
                "\ncracked: {} of {} ({:.1} %)",
                sim.cracked_count(),
                sim.testing_set_size(),
                sim.ratio() * 100.0
            )?;
        }
    }

    w.flush()?;
    Ok(())
}

fn write_boost_log(args: &EnumerateArgs, model: &Model, results: &[TargetResult]) -> Result<()> {
    let path = args.results.join(LOG_FILE);
    let file =
        File::create(&path).with_context(|| format!("Failed to create log: {}", path.display()))?;
    let mut w = BufWriter::new(file);

    writeln!(w, "=== log file for omen enumerate (boosting) ===\n")?;
    writeln!(w, "== Settings ==")?;
    write_settings(&mut w, args, model)?;

    writeln!(w, "== Targets (password, attempts, cracked) ==")?;
    for result in results {
        writeln!(
            w,
            "{}, {}, {}",
            String::from_utf8_lossy(&result.target),
            result.attempts,
            result.cracked
        )?;
    }
    let cracked = results.iter().filter(|r| r.cracked).count();
    writeln!(w, "\ncracked {cracked} of {} targets", results.len())?;
    w.flush()?;
    Ok(())
}
