//! OMEN CLI
//!
//! Trains n-gram password models and enumerates candidates in descending
//! probability order.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

// =============================================================================
// CLI DEFINITION
// =============================================================================

#[derive(Parser)]
#[command(name = "omen")]
#[command(about = "Ordered Markov password enumerator", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model from a password corpus
    Train(commands::train::TrainArgs),
    /// Enumerate candidate passwords in descending probability order
    Enumerate(commands::enumerate::EnumerateArgs),
    /// Score one password against a trained model
    Eval(commands::eval::EvalArgs),
    /// Build an alphabet from corpus character frequencies
    Alphabet(commands::alphabet::AlphabetArgs),
}

impl Commands {
    /// Whether the subcommand asked for warnings on stderr.
    fn print_warnings(&self) -> bool {
        match self {
            Self::Train(args) => args.print_warnings,
            Self::Enumerate(args) => args.print_warnings,
            Self::Eval(_) | Self::Alphabet(_) => false,
        }
    }
}

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() {
    // Usage errors exit 1, --help/--version exit 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = i32::from(err.use_stderr());
            let _ = err.print();
            std::process::exit(code);
        }
    };

    // RUST_LOG overrides; otherwise print-warnings decides what surfaces.
    let default_level = if cli.command.print_warnings() {
        "warn"
    } else {
        "error"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => {}
        Err(err) => {
            if matches!(
                err.downcast_ref::<omen::OmenError>(),
                Some(omen::OmenError::Interrupted)
            ) {
                eprintln!("\nExiting ok...");
                std::process::exit(2);
            }
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Train(args) => commands::train::run(args),
        Commands::Enumerate(args) => commands::enumerate::run(args),
        Commands::Eval(args) => commands::eval::run(args),
        Commands::Alphabet(args) => commands::alphabet::run(args),
    }
}
