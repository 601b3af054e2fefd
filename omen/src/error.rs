//! Error and warning types shared across the crate.
//!
//! Errors abort the operation that raised them; warnings are collected by a
//! [`WarningSink`] and never abort (training keeps going past bad corpus
//! lines and reports a summary at the end).

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, OmenError>;

// =============================================================================
// ERRORS
// =============================================================================

/// Fatal error raised by model loading, training or enumeration.
#[derive(Debug, Error)]
pub enum OmenError {
    /// Invalid or inconsistent configuration (flags, config header, hints).
    #[error("configuration error: {0}")]
    Config(String),

    /// A loaded model violates a shape or range invariant.
    #[error("model error: {0}")]
    Model(String),

    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error on `{path}`: {source}")]
    Io {
        /// File the operation was working on.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// A numeric parameter lies outside its allowed bounds.
    #[error("{name} must lie in [{min}, {max}], got {got}")]
    Range {
        /// Parameter name as exposed on the CLI.
        name: &'static str,
        /// Inclusive lower bound.
        min: u64,
        /// Inclusive upper bound.
        max: u64,
        /// The offending value.
        got: u64,
    },

    /// Enumeration was cancelled between candidate emissions.
    #[error("interrupted")]
    Interrupted,
}

impl OmenError {
    /// Wrap an [`io::Error`] together with the path that produced it.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

// =============================================================================
// WARNINGS
// =============================================================================

/// Non-fatal condition observed while scanning a training corpus or hint file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    /// A gram contained a character outside the alphabet; the gram (for CP)
    /// or the whole array update (for IP/EP) is skipped.
    UnknownChar {
        /// 1-based corpus line.
        line: u64,
        /// Which array the skipped update was for ("IP", "CP" or "EP").
        section: &'static str,
    },
    /// Line shorter than n−1 characters; nothing can be counted.
    ShortLine {
        /// 1-based corpus line.
        line: u64,
    },
    /// Line with n−1 characters: long enough for IP and EP but holds no full
    /// n-gram, so no conditional transition was counted.
    InitialOnly {
        /// 1-based corpus line.
        line: u64,
    },
    /// Line at or above the maximum password length; rejected outright.
    OverlongLine {
        /// 1-based corpus line.
        line: u64,
    },
    /// Counted-list entry whose count token is missing or non-positive.
    BadCount {
        /// 1-based corpus line.
        line: u64,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::UnknownChar { line, section } => {
                write!(f, "{section} in line {line} contains an unknown symbol and will be ignored")
            }
            Self::ShortLine { line } => {
                write!(f, "line {line} has not enough characters and will be ignored")
            }
            Self::InitialOnly { line } => write!(
                f,
                "line {line} has not enough characters; only the initial probability will be counted"
            ),
            Self::OverlongLine { line } => {
                write!(f, "line {line} has too many characters and will be ignored")
            }
            Self::BadCount { line } => write!(f, "can't evaluate the count in line {line}"),
        }
    }
}

/// Collects warnings, optionally forwarding them to the log as they occur.
#[derive(Debug, Default)]
pub struct WarningSink {
    forward: bool,
    emitted: u64,
}

impl WarningSink {
    /// Create a sink. When `forward` is set every warning is also written to
    /// the `tracing` log at warn level.
    #[must_use]
    pub fn new(forward: bool) -> Self {
        Self { forward, emitted: 0 }
    }

    /// Record one warning.
    pub fn record(&mut self, warning: Warning) {
        self.emitted += 1;
        if self.forward {
            tracing::warn!("{warning}");
        }
    }

    /// Number of warnings recorded so far.
    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// One-line summary for the end of a run, or `None` if nothing happened.
    #[must_use]
    pub fn summary(&self) -> Option<String> {
        if self.emitted == 0 {
            None
        } else if self.forward {
            Some(format!("{} warning(s) occurred", self.emitted))
        } else {
            Some(format!(
                "{} warning(s) occurred; enable print-warnings to see them",
                self.emitted
            ))
        }
    }
}
