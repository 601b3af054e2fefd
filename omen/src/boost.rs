//! Boosting: per-target level decrements derived from hints.
//!
//! Before enumerating guesses for a target, every n-gram of that target's
//! hint strings is "nudged" toward level 0 by a per-position α. The model
//! tables are snapshotted before the first apply and restored after each
//! target, and the sorted indices are rebuilt in between, so targets never
//! see each other's bias.

use std::fs;
use std::path::Path;

use crate::error::{OmenError, Result};
use crate::model::Model;

// =============================================================================
// INPUT FILES
// =============================================================================

/// Read an alpha file: one line of whitespace-separated non-negative
/// integers, one per hint position.
///
/// # Errors
/// Fails on I/O errors, an empty file, or a malformed integer.
pub fn read_alphas(path: &Path) -> Result<Vec<u32>> {
    let text = fs::read_to_string(path).map_err(|e| OmenError::io(path, e))?;
    let line = text
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| OmenError::Config(format!("alpha file `{}` is empty", path.display())))?;

    line.split_whitespace()
        .map(|token| {
            token.parse::<u32>().map_err(|_| {
                OmenError::Config(format!("bad alpha value {token:?} in `{}`", path.display()))
            })
        })
        .collect()
}

/// Hint rows, one per target, each with one hint string per alpha position.
#[derive(Debug, Clone)]
pub struct HintSet {
    rows: Vec<Vec<String>>,
}

impl HintSet {
    /// Read a hints file: line i holds the whitespace-separated hints for
    /// the i-th target. Every line must have exactly `arity` tokens.
    ///
    /// # Errors
    /// Fails on I/O errors or an arity mismatch.
    pub fn read(path: &Path, arity: usize) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| OmenError::io(path, e))?;
        let mut rows = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let row: Vec<String> = line.split_whitespace().map(str::to_string).collect();
            if row.len() != arity {
                return Err(OmenError::Config(format!(
                    "hint line {} holds {} entries, expected {arity}",
                    i + 1,
                    row.len()
                )));
            }
            rows.push(row);
        }
        Ok(Self { rows })
    }

    /// Number of hint rows (targets covered).
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the file held no hint rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Hints for target `i`, or `None` past the end.
    #[must_use]
    pub fn row(&self, i: usize) -> Option<&[String]> {
        self.rows.get(i).map(Vec::as_slice)
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Pre-boost copy of the mutable level tables, sufficient to restore the
/// model bit-for-bit.
#[derive(Debug, Clone)]
pub struct BoostSnapshot {
    ip: Vec<u8>,
    cp: Vec<u8>,
    ep: Vec<u8>,
}

impl BoostSnapshot {
    /// Snapshot the IP/CP/EP tables of a model.
    #[must_use]
    pub fn capture(model: &Model) -> Self {
        Self {
            ip: model.ip().to_vec(),
            cp: model.cp().to_vec(),
            ep: model.ep().to_vec(),
        }
    }

    /// Restore the captured tables into `model`.
    pub fn restore(&self, model: &mut Model) {
        model.ip_mut().copy_from_slice(&self.ip);
        model.cp_mut().copy_from_slice(&self.cp);
        model.ep_mut().copy_from_slice(&self.ep);
    }
}

// =============================================================================
// APPLY
// =============================================================================

/// Apply one target's hints to the model: for each hint i, the initial
/// (n−1)-gram, every n-gram window and (optionally) the terminal (n−1)-gram
/// have their level lowered by `alphas[i]`, clamped at 0.
///
/// Hints shorter than n−1 characters or containing characters outside the
/// alphabet contribute nothing for the affected grams.
pub fn apply(model: &mut Model, alphas: &[u32], hints: &[String], boost_ep: bool) {
    let order = model.order();
    let alphabet = model.alphabet().clone();

    for (hint, &alpha) in hints.iter().zip(alphas) {
        let hint = hint.as_bytes();
        if hint.len() < order - 1 {
            tracing::warn!(hint = %String::from_utf8_lossy(hint), "hint shorter than n-1, skipped");
            continue;
        }

        if let Some(code) = alphabet.code_of(&hint[..order - 1]) {
            lower(&mut model.ip_mut()[code], alpha);
        }
        if boost_ep {
            if let Some(code) = alphabet.code_of(&hint[hint.len() - (order - 1)..]) {
                lower(&mut model.ep_mut()[code], alpha);
            }
        }
        if hint.len() >= order {
            for window in hint.windows(order) {
                if let Some(code) = alphabet.code_of(window) {
                    lower(&mut model.cp_mut()[code], alpha);
                }
            }
        }
    }
}

/// Apply every hint row cumulatively, with no snapshot or revert: the "boost
/// all hints" mode used when piping candidates for a whole hint file at once.
/// The model stays biased afterwards.
pub fn apply_all(model: &mut Model, alphas: &[u32], hints: &HintSet, boost_ep: bool) {
    for row in &hints.rows {
        apply(model, alphas, row, boost_ep);
    }
}

fn lower(level: &mut u8, alpha: u32) {
    let alpha = u8::try_from(alpha).unwrap_or(u8::MAX);
    *level = level.saturating_sub(alpha);
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::alphabet::Alphabet;
    use crate::MAX_PW_LENGTH;
    use std::io::Write;

    fn model() -> Model {
        let alphabet = Alphabet::new(b"ab").unwrap();
        Model::new(
            2,
            alphabet,
            11,
            vec![5, 5],
            vec![5, 5, 5, 5],
            vec![5, 5],
            vec![0; MAX_PW_LENGTH],
        )
        .unwrap()
    }

    #[test]
    fn apply_lowers_every_gram_of_the_hint() {
        let mut m = model();
        apply(&mut m, &[2], &["aba".to_string()], true);
        // IP "a" lowered.
        assert_eq!(m.ip(), &[3, 5]);
        // Windows "ab" and "ba" lowered.
        assert_eq!(m.cp(), &[5, 3, 3, 5]);
        // EP "a" lowered.
        assert_eq!(m.ep(), &[3, 5]);
    }

    #[test]
    fn apply_clamps_at_zero() {
        let mut m = model();
        apply(&mut m, &[100], &["aa".to_string()], false);
        assert_eq!(m.ip(), &[0, 5]);
        assert_eq!(m.cp(), &[0, 5, 5, 5]);
        assert_eq!(m.ep(), &[5, 5]);
    }

    #[test]
    fn snapshot_round_trips_bit_for_bit() {
        let mut m = model();
        let pristine = m.clone();
        let snap = BoostSnapshot::capture(&m);
        apply(&mut m, &[3, 1], &["ab".to_string(), "ba".to_string()], true);
        assert_ne!(m, pristine);
        snap.restore(&mut m);
        assert_eq!(m, pristine);
    }

    #[test]
    fn hint_files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let alpha_path = dir.path().join("alpha");
        std::fs::write(&alpha_path, "3 1 2\n").unwrap();
        let alphas = read_alphas(&alpha_path).unwrap();
        assert_eq!(alphas, vec![3, 1, 2]);

        let hints_path = dir.path().join("hints");
        let mut f = std::fs::File::create(&hints_path).unwrap();
        writeln!(f, "abc def ghi").unwrap();
        writeln!(f, "jkl mno pqr").unwrap();
        drop(f);
        let hints = HintSet::read(&hints_path, 3).unwrap();
        assert_eq!(hints.len(), 2);
        assert_eq!(hints.row(1).unwrap()[2], "pqr");
        assert!(hints.row(2).is_none());

        assert!(HintSet::read(&hints_path, 2).is_err());
    }

    #[test]
    fn unknown_characters_in_hints_are_skipped() {
        let mut m = model();
        let pristine = m.clone();
        apply(&mut m, &[4], &["zz".to_string()], true);
        assert_eq!(m, pristine);
    }
}
