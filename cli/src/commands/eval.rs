//! Eval Command
//!
//! Scores one password against a trained model and prints the per-step
//! level breakdown.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use omen::{evaluate, Model};

// =============================================================================
// ARGUMENTS
// =============================================================================

/// Arguments of `omen eval`.
#[derive(Args)]
pub struct EvalArgs {
    /// Model config file
    #[arg(short, long, default_value = "results/omen.cfg", value_name = "FILE")]
    config: PathBuf,

    /// Password to evaluate
    #[arg(value_name = "PASSWORD")]
    password: String,
}

// =============================================================================
// EVAL
// =============================================================================

/// Score the password and print the breakdown.
pub fn run(args: &EvalArgs) -> Result<()> {
    let model = Model::load(&args.config)
        .with_context(|| format!("Failed to load model: {}", args.config.display()))?;
    let evaluation = evaluate(&model, args.password.as_bytes())?;

    print!("{}", evaluation.initial);
    for step in &evaluation.steps {
        print!(" + {step}");
    }
    println!(" = {} (overall level)", evaluation.overall);
    Ok(())
}
