//! CLI commands, one module per subcommand.

pub mod alphabet;
pub mod enumerate;
pub mod eval;
pub mod train;
