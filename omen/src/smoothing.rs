//! Additive (add-δ) smoothing.
//!
//! Training counts are mapped to discrete levels via
//! `level = min(L−1, ⌊−ln(min(1, k·p + ε))⌋)` where `p` is an add-δ estimate
//! and `k` a per-kind scale factor. The non-conditional kinds (IP, EP, LN)
//! use `|Σ|²·δ` in their denominator rather than the array size; existing
//! level tables depend on that exact denominator, so it is kept as is.

use std::fs;
use std::path::Path;

use crate::error::{OmenError, Result};

/// ε added before the log for conditional (CP) estimates.
const EPSILON_CONDITIONAL: f64 = 1e-9;
/// ε added before the log for non-conditional (IP/EP/LN) estimates.
const EPSILON_NON_CONDITIONAL: f64 = 1e-10;

// =============================================================================
// ARRAY KINDS
// =============================================================================

/// The four level arrays of a model, used to select per-kind parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    /// Initial (n−1)-gram probabilities.
    Ip,
    /// Conditional n-gram probabilities.
    Cp,
    /// End (n−1)-gram probabilities.
    Ep,
    /// Password-length probabilities.
    Ln,
}

impl ArrayKind {
    /// All kinds, in table order.
    pub const ALL: [Self; 4] = [Self::Ip, Self::Cp, Self::Ep, Self::Ln];

    /// Short name as used in config files and table headers.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Ip => "IP",
            Self::Cp => "CP",
            Self::Ep => "EP",
            Self::Ln => "LN",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Ip => 0,
            Self::Cp => 1,
            Self::Ep => 2,
            Self::Ln => 3,
        }
    }
}

// =============================================================================
// ADDITIVE SMOOTHING
// =============================================================================

/// Additive smoothing with per-kind δ and per-kind scale factor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdditiveSmoothing {
    delta: [u64; 4],
    level_adjust: [u64; 4],
}

impl Default for AdditiveSmoothing {
    /// δ = 1 for IP/CP/EP and 0 for LN; k = 250 for IP/EP/LN and 2 for CP.
    fn default() -> Self {
        let mut delta = [1; 4];
        delta[ArrayKind::Ln.index()] = 0;
        let mut level_adjust = [250; 4];
        level_adjust[ArrayKind::Cp.index()] = 2;
        Self { delta, level_adjust }
    }
}

impl AdditiveSmoothing {
    /// δ for one array kind.
    #[must_use]
    pub fn delta(&self, kind: ArrayKind) -> u64 {
        self.delta[kind.index()]
    }

    /// Scale factor k for one array kind.
    #[must_use]
    pub fn level_adjust(&self, kind: ArrayKind) -> u64 {
        self.level_adjust[kind.index()]
    }

    /// Smooth a whole count array of the given kind into levels.
    ///
    /// `total` is the sum of all counts for the non-conditional kinds and is
    /// ignored for CP, whose denominators are per-prefix sums.
    #[must_use]
    pub fn smooth(
        &self,
        kind: ArrayKind,
        counts: &[u64],
        total: u64,
        alphabet_size: usize,
        max_level: u8,
    ) -> Vec<u8> {
        match kind {
            ArrayKind::Cp => (0..counts.len())
                .map(|i| self.level_conditional(counts, i, alphabet_size, max_level))
                .collect(),
            _ => counts
                .iter()
                .map(|&c| self.level_non_conditional(kind, c, total, alphabet_size, max_level))
                .collect(),
        }
    }

    /// Level of one non-conditional entry (IP, EP or LN).
    #[must_use]
    pub fn level_non_conditional(
        &self,
        kind: ArrayKind,
        count: u64,
        total: u64,
        alphabet_size: usize,
        max_level: u8,
    ) -> u8 {
        let delta = self.delta(kind);
        let mut denominator = total + (alphabet_size * alphabet_size) as u64 * delta;
        if denominator == 0 {
            denominator = 1;
        }
        let p = (count + delta) as f64 / denominator as f64;
        discretise(
            self.level_adjust(kind) as f64 * p + EPSILON_NON_CONDITIONAL,
            max_level,
        )
    }

    /// Level of one conditional (CP) entry at `position`; the denominator is
    /// the count sum over the |Σ| continuations of the same prefix.
    #[must_use]
    pub fn level_conditional(
        &self,
        counts: &[u64],
        position: usize,
        alphabet_size: usize,
        max_level: u8,
    ) -> u8 {
        let delta = self.delta(ArrayKind::Cp);
        let prefix_base = position - position % alphabet_size;
        let mut denominator: u64 = counts[prefix_base..prefix_base + alphabet_size].iter().sum();
        denominator += alphabet_size as u64 * delta;
        if denominator == 0 {
            denominator = 1;
        }
        let p = (counts[position] + delta) as f64 / denominator as f64;
        discretise(
            self.level_adjust(ArrayKind::Cp) as f64 * p + EPSILON_CONDITIONAL,
            max_level,
        )
    }

    // =========================================================================
    // CONFIG FILE
    // =========================================================================

    /// Read a smoothing config file.
    ///
    /// The first non-blank line names the family (only `additive` exists);
    /// subsequent `-<param>_<target> <value>` lines override δ
    /// (`delta`) or k (`levelAdjust`) for `all` or one of IP/CP/EP/LN.
    /// Later lines win, so `all` acts as a base that specific targets refine.
    ///
    /// # Errors
    /// Fails on I/O errors, an unknown family name, or a malformed
    /// parameter line.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| OmenError::io(path, e))?;
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());

        let family = lines.next().map(str::trim).unwrap_or_default();
        if family != "additive" {
            return Err(OmenError::Model(format!(
                "unknown smoothing family {family:?}, expected \"additive\""
            )));
        }

        let mut smoothing = Self::default();
        for line in lines {
            let line = line.trim();
            let Some(arg) = line.strip_prefix('-') else {
                continue;
            };
            let mut tokens = arg.split_whitespace();
            let (Some(name), Some(value)) = (tokens.next(), tokens.next()) else {
                return Err(OmenError::Config(format!("bad smoothing line {line:?}")));
            };
            let Some((param, target)) = name.split_once('_') else {
                return Err(OmenError::Config(format!("bad smoothing parameter {name:?}")));
            };
            // Negative values clamp to 0 rather than erroring.
            let value = value
                .parse::<i64>()
                .map_err(|_| OmenError::Config(format!("bad smoothing value {value:?}")))?
                .max(0) as u64;

            let slot: &mut [u64; 4] = match param {
                "delta" => &mut smoothing.delta,
                "levelAdjust" => &mut smoothing.level_adjust,
                _ => {
                    return Err(OmenError::Config(format!("bad smoothing parameter {name:?}")));
                }
            };
            match target {
                "all" => *slot = [value; 4],
                "IP" => slot[ArrayKind::Ip.index()] = value,
                "CP" => slot[ArrayKind::Cp.index()] = value,
                "EP" => slot[ArrayKind::Ep.index()] = value,
                "LN" => slot[ArrayKind::Ln.index()] = value,
                _ => {
                    return Err(OmenError::Config(format!("bad smoothing target {target:?}")));
                }
            }
        }
        Ok(smoothing)
    }

    /// One-line per-kind parameter summary for logs and table headers.
    #[must_use]
    pub fn describe(&self) -> String {
        let fmt = |values: &[u64; 4]| {
            ArrayKind::ALL
                .iter()
                .map(|&k| format!("{}: {};", k.name(), values[k.index()]))
                .collect::<Vec<_>>()
                .join(" ")
        };
        format!("additive (delta: {} levelAdjust: {})", fmt(&self.delta), fmt(&self.level_adjust))
    }
}

/// `min(L−1, ⌊−ln(min(1, v))⌋)` — the common tail of both estimators.
fn discretise(value: f64, max_level: u8) -> u8 {
    let clamped = value.min(1.0);
    let level = (-clamped.ln()).floor();
    if level >= f64::from(max_level - 1) {
        max_level - 1
    } else {
        level as u8
    }
}

// =============================================================================
// TESTS
// =============================================================================
