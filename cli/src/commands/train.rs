//! Train Command
//!
//! Counts the n-grams of a password corpus, smooths them into levels and
//! writes the five-file model.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use omen::{train, write_model, AdditiveSmoothing, Alphabet, TrainOptions, TrainOutput, WarningSink};

// =============================================================================
// ARGUMENTS
// =============================================================================

/// Arguments of `omen train`.
#[derive(Args)]
pub struct TrainArgs {
    /// Password corpus, one password per line
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Alphabet characters, in order
    #[arg(short, long, conflicts_with = "alphabet_file")]
    alphabet: Option<String>,

    /// Read the alphabet from the first line of a file
    #[arg(long, value_name = "FILE")]
    alphabet_file: Option<PathBuf>,

    /// n-gram order
    #[arg(short, long, default_value_t = 3)]
    ngram: usize,

    /// Exclusive level cap
    #[arg(long, default_value_t = omen::DEFAULT_MAX_LEVEL)]
    max_level: u8,

    /// Smoothing config file
    #[arg(long, value_name = "FILE")]
    smoothing: Option<PathBuf>,

    /// Directory the model files are written to
    #[arg(short, long, default_value = "results")]
    output: PathBuf,

    /// Interpret corpus lines as "<count> <password>"
    #[arg(long)]
    with_count: bool,

    /// Write .count mirrors and annotate table lines with their gram
    #[arg(short = 'F', long)]
    verbose_file: bool,

    /// Print warnings as they occur
    #[arg(short = 'w', long)]
    pub(crate) print_warnings: bool,
}

// =============================================================================
// TRAIN
// =============================================================================

/// Run the training pass.
pub fn run(args: &TrainArgs) -> Result<()> {
    let alphabet = resolve_alphabet(args)?;
    let smoothing = match &args.smoothing {
        Some(path) => AdditiveSmoothing::from_file(path)
            .with_context(|| format!("Failed to read smoothing config: {}", path.display()))?,
        None => AdditiveSmoothing::default(),
    };

    let corpus = File::open(&args.input)
        .with_context(|| format!("Failed to open corpus: {}", args.input.display()))?;
    let options = TrainOptions {
        order: args.ngram,
        max_level: args.max_level,
        counted: args.with_count,
        verbose_files: args.verbose_file,
    };

    let mut sink = WarningSink::new(args.print_warnings);
    let counts = train(BufReader::new(corpus), alphabet, &options, &mut sink)?;

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create output directory: {}", args.output.display()))?;
    let mut out = TrainOutput::in_directory(&args.output, &args.input.display().to_string());
    out.smoothing_name = args
        .smoothing
        .as_ref()
        .map(|p| p.display().to_string());
    write_model(&counts, &smoothing, &options, &out)?;

    if let Some(summary) = sink.summary() {
        eprintln!("WARNING: {summary}");
    }
    println!("Model written to {}", out.config_path.display());
    Ok(())
}

fn resolve_alphabet(args: &TrainArgs) -> Result<Alphabet> {
    if let Some(alphabet) = &args.alphabet {
        return Ok(Alphabet::new(alphabet.as_bytes())?);
    }
    if let Some(path) = &args.alphabet_file {
        let file = File::open(path)
            .with_context(|| format!("Failed to open alphabet file: {}", path.display()))?;
        let mut line = String::new();
        BufReader::new(file)
            .read_line(&mut line)
            .with_context(|| format!("Failed to read alphabet file: {}", path.display()))?;
        return Ok(Alphabet::new(line.trim_end_matches(['\r', '\n']).as_bytes())?);
    }
    Ok(Alphabet::new(omen::DEFAULT_ALPHABET)?)
}
