//! Alphabet Command
//!
//! Counts character frequencies in a corpus and emits the most frequent
//! characters as a one-line alphabet file for training.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use omen::Alphabet;

// =============================================================================
// ARGUMENTS
// =============================================================================

/// Arguments of `omen alphabet`.
#[derive(Args)]
pub struct AlphabetArgs {
    /// Password corpus to count characters in
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Number of characters to keep
    #[arg(short, long, default_value_t = 72)]
    size: usize,

    /// Write the alphabet here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Also write the full frequency table to this file
    #[arg(long, value_name = "FILE")]
    frequency: Option<PathBuf>,
}

// =============================================================================
// ALPHABET
// =============================================================================

/// Build and emit the alphabet.
pub fn run(args: &AlphabetArgs) -> Result<()> {
    let corpus = File::open(&args.input)
        .with_context(|| format!("Failed to open corpus: {}", args.input.display()))?;
    let (alphabet, table) = Alphabet::from_frequencies(BufReader::new(corpus), args.size)?;

    match &args.output {
        Some(path) => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to create: {}", path.display()))?;
            file.write_all(alphabet.as_bytes())?;
            file.write_all(b"\n")?;
        }
        None => println!("{}", String::from_utf8_lossy(alphabet.as_bytes())),
    }

    if let Some(path) = &args.frequency {
        let mut file = File::create(path)
            .with_context(|| format!("Failed to create: {}", path.display()))?;
        for (c, count) in &table {
            writeln!(file, "{} {count}", char::from(*c))?;
        }
    }
    Ok(())
}
