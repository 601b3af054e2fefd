//! Model loading and validation.
//!
//! A trained model is five files on disk: a config whose `#`-prefixed header
//! names the alphabet, the n-gram order, the level cap and the four table
//! files, plus one `.level` file per table (IP, CP, EP, LN) holding one
//! integer level per line after their own headers. [`Model::load`] reads the
//! lot, cross-checks every shape and range invariant and hands back an
//! immutable in-memory model.

use std::fs;
use std::path::Path;

use crate::alphabet::Alphabet;
use crate::error::{OmenError, Result};
use crate::{MAX_MAX_LEVEL, MAX_NGRAM, MAX_PW_LENGTH, MIN_MAX_LEVEL, MIN_NGRAM};

/// Extension appended to the table basenames from the config header.
pub const LEVEL_EXT: &str = ".level";
/// Extension of the optional raw-count mirrors written next to the levels.
pub const COUNT_EXT: &str = ".count";

// =============================================================================
// CONFIG
// =============================================================================

/// Parsed `# -key value` header of a model config file.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Alphabet characters, in order.
    pub alphabet: Vec<u8>,
    /// Declared alphabet size, if the header carried one.
    pub alphabet_size: Option<usize>,
    /// n-gram order.
    pub order: usize,
    /// Exclusive level cap L.
    pub max_level: u8,
    /// Basename of the CP table (without `.level`).
    pub cp_file: String,
    /// Basename of the IP table.
    pub ip_file: String,
    /// Basename of the EP table.
    pub ep_file: String,
    /// Basename of the LN table.
    pub ln_file: String,
    /// Corpus the model was trained from, if recorded.
    pub input: Option<String>,
    /// Smoothing config used at training time, if recorded.
    pub smoothing: Option<String>,
}

impl ModelConfig {
    /// Read and validate a config file.
    ///
    /// Header lines look like `# -alphabet abc...`; anything that is not a
    /// recognised key is ignored, which keeps the free-text `###` banner
    /// lines of the trainer harmless.
    ///
    /// # Errors
    /// Fails on I/O errors, a missing `alphabet` or `ngram` key, and
    /// out-of-range `ngram` / `maxLevel` values.
    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| OmenError::io(path, e))?;

        let mut alphabet: Option<Vec<u8>> = None;
        let mut alphabet_size = None;
        let mut order = None;
        let mut max_level = u64::from(crate::DEFAULT_MAX_LEVEL);
        let mut cp_file = String::from("CP");
        let mut ip_file = String::from("IP");
        let mut ep_file = String::from("EP");
        let mut ln_file = String::from("LN");
        let mut input = None;
        let mut smoothing = None;

        for line in text.lines() {
            let Some(rest) = line.strip_prefix('#') else {
                continue;
            };
            let Some(arg) = rest.trim_start().strip_prefix('-') else {
                continue;
            };
            let mut tokens = arg.split_whitespace();
            let (Some(key), Some(value)) = (tokens.next(), tokens.next()) else {
                continue;
            };
            match key {
                "alphabet" => alphabet = Some(value.as_bytes().to_vec()),
                "alphabetsize" => {
                    alphabet_size = Some(parse_usize(value, "alphabetsize", path)?);
                }
                "ngram" => order = Some(parse_usize(value, "ngram", path)?),
                "maxLevel" => max_level = parse_usize(value, "maxLevel", path)? as u64,
                "cpout" => cp_file = value.to_string(),
                "ipout" => ip_file = value.to_string(),
                "epout" => ep_file = value.to_string(),
                "lenout" => ln_file = value.to_string(),
                "input" => input = Some(value.to_string()),
                "smoo" => smoothing = Some(value.to_string()),
                _ => {}
            }
        }

        let alphabet = alphabet
            .ok_or_else(|| OmenError::Config(format!("`{}`: no alphabet in header", path.display())))?;
        let order = order
            .ok_or_else(|| OmenError::Config(format!("`{}`: no ngram size in header", path.display())))?;
        if !(MIN_NGRAM..=MAX_NGRAM).contains(&order) {
            return Err(OmenError::Range {
                name: "ngram",
                min: MIN_NGRAM as u64,
                max: MAX_NGRAM as u64,
                got: order as u64,
            });
        }
        if !(u64::from(MIN_MAX_LEVEL)..=u64::from(MAX_MAX_LEVEL)).contains(&max_level) {
            return Err(OmenError::Range {
                name: "maxLevel",
                min: u64::from(MIN_MAX_LEVEL),
                max: u64::from(MAX_MAX_LEVEL),
                got: max_level,
            });
        }

        Ok(Self {
            alphabet,
            alphabet_size,
            order,
            max_level: max_level as u8,
            cp_file,
            ip_file,
            ep_file,
            ln_file,
            input,
            smoothing,
        })
    }
}

fn parse_usize(value: &str, key: &str, path: &Path) -> Result<usize> {
    value.parse().map_err(|_| {
        OmenError::Config(format!("`{}`: bad header value for {key}: {value:?}", path.display()))
    })
}

// =============================================================================
// MODEL
// =============================================================================

/// An in-memory model: ⟨n, Σ, L, IP, CP, EP, LN⟩.
///
/// Level arrays are flat, indexed by gram code; every entry lies in
/// `[0, max_level)` and lower means more probable. The tables are immutable
/// during enumeration; boosting snapshots them, mutates, and restores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    order: usize,
    alphabet: Alphabet,
    max_level: u8,
    ip: Vec<u8>,
    cp: Vec<u8>,
    ep: Vec<u8>,
    ln: Vec<u8>,
}

impl Model {
    /// Assemble a model from its parts, checking every shape and range
    /// invariant.
    ///
    /// # Errors
    /// Fails when `order` or `max_level` is out of range, an array has the
    /// wrong number of entries, or any level is at or above `max_level`.
    pub fn new(
        order: usize,
        alphabet: Alphabet,
        max_level: u8,
        ip: Vec<u8>,
        cp: Vec<u8>,
        ep: Vec<u8>,
        ln: Vec<u8>,
    ) -> Result<Self> {
        if !(MIN_NGRAM..=MAX_NGRAM).contains(&order) {
            return Err(OmenError::Range {
                name: "ngram",
                min: MIN_NGRAM as u64,
                max: MAX_NGRAM as u64,
                got: order as u64,
            });
        }
        if !(MIN_MAX_LEVEL..=MAX_MAX_LEVEL).contains(&max_level) {
            return Err(OmenError::Range {
                name: "maxLevel",
                min: u64::from(MIN_MAX_LEVEL),
                max: u64::from(MAX_MAX_LEVEL),
                got: u64::from(max_level),
            });
        }

        let prefix_count = alphabet.gram_space(order - 1);
        let expect = [
            ("IP", ip.len(), prefix_count),
            ("CP", cp.len(), prefix_count * alphabet.len()),
            ("EP", ep.len(), prefix_count),
            ("LN", ln.len(), MAX_PW_LENGTH),
        ];
        for (name, got, want) in expect {
            if got != want {
                return Err(OmenError::Model(format!(
                    "{name} array holds {got} entries, expected {want}"
                )));
            }
        }
        for (name, array) in [("IP", &ip), ("CP", &cp), ("EP", &ep), ("LN", &ln)] {
            if let Some(bad) = array.iter().find(|&&v| v >= max_level) {
                return Err(OmenError::Model(format!(
                    "{name} array holds level {bad}, cap is {max_level}"
                )));
            }
        }

        Ok(Self {
            order,
            alphabet,
            max_level,
            ip,
            cp,
            ep,
            ln,
        })
    }

    /// Load a model from its config file. Table paths from the header are
    /// resolved relative to the config file's directory.
    ///
    /// # Errors
    /// Propagates config parsing failures and every shape/range violation of
    /// [`Model::new`].
    pub fn load(config_path: &Path) -> Result<Self> {
        let config = ModelConfig::read(config_path)?;
        let alphabet = Alphabet::new(&config.alphabet)?;
        if let Some(declared) = config.alphabet_size {
            if declared != alphabet.len() {
                return Err(OmenError::Model(format!(
                    "config declares alphabetsize {declared} but the alphabet holds {} characters",
                    alphabet.len()
                )));
            }
        }

        let dir = config_path.parent().unwrap_or_else(|| Path::new("."));
        let prefix_count = alphabet.gram_space(config.order - 1);
        let ip = read_levels(&dir.join(format!("{}{LEVEL_EXT}", config.ip_file)), prefix_count, config.max_level)?;
        let cp = read_levels(
            &dir.join(format!("{}{LEVEL_EXT}", config.cp_file)),
            prefix_count * alphabet.len(),
            config.max_level,
        )?;
        let ep = read_levels(&dir.join(format!("{}{LEVEL_EXT}", config.ep_file)), prefix_count, config.max_level)?;
        let ln = read_levels(&dir.join(format!("{}{LEVEL_EXT}", config.ln_file)), MAX_PW_LENGTH, config.max_level)?;

        tracing::debug!(
            order = config.order,
            alphabet = alphabet.len(),
            max_level = config.max_level,
            "model loaded"
        );
        Self::new(config.order, alphabet, config.max_level, ip, cp, ep, ln)
    }

    /// n-gram order.
    #[must_use]
    pub fn order(&self) -> usize {
        self.order
    }

    /// The alphabet Σ.
    #[must_use]
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Exclusive level cap L.
    #[must_use]
    pub fn max_level(&self) -> u8 {
        self.max_level
    }

    /// Number of (n−1)-gram prefixes, |Σ|^(n−1).
    #[must_use]
    pub fn prefix_count(&self) -> usize {
        self.alphabet.gram_space(self.order - 1)
    }

    /// Initial-probability levels, one per (n−1)-gram code.
    #[must_use]
    pub fn ip(&self) -> &[u8] {
        &self.ip
    }

    /// Conditional levels, one per n-gram code.
    #[must_use]
    pub fn cp(&self) -> &[u8] {
        &self.cp
    }

    /// End-probability levels, one per (n−1)-gram code.
    #[must_use]
    pub fn ep(&self) -> &[u8] {
        &self.ep
    }

    /// Length levels, one per length in `[0, MAX_PW_LENGTH)`.
    #[must_use]
    pub fn ln(&self) -> &[u8] {
        &self.ln
    }

    pub(crate) fn ip_mut(&mut self) -> &mut [u8] {
        &mut self.ip
    }

    pub(crate) fn cp_mut(&mut self) -> &mut [u8] {
        &mut self.cp
    }

    pub(crate) fn ep_mut(&mut self) -> &mut [u8] {
        &mut self.ep
    }
}

// =============================================================================
// LEVEL FILES
// =============================================================================

/// Read one `.level` file: leading `#` lines are the header, then one level
/// per line (the first whitespace-separated token; verbose tables append the
/// gram after a tab). Exactly `expected` data lines are consumed.
fn read_levels(path: &Path, expected: usize, max_level: u8) -> Result<Vec<u8>> {
    let text = fs::read_to_string(path).map_err(|e| OmenError::io(path, e))?;
    let mut levels = Vec::with_capacity(expected);

    for line in text.lines().skip_while(|l| l.starts_with('#')) {
        if levels.len() == expected {
            break;
        }
        let token = line.split_whitespace().next().unwrap_or("");
        let value: i64 = token.parse().map_err(|_| {
            OmenError::Model(format!(
                "`{}`: bad level {token:?} in data line {}",
                path.display(),
                levels.len() + 1
            ))
        })?;
        if value < 0 || value >= i64::from(max_level) {
            return Err(OmenError::Model(format!(
                "`{}`: level {value} in data line {} is outside [0, {max_level})",
                path.display(),
                levels.len() + 1
            )));
        }
        levels.push(value as u8);
    }

    if levels.len() != expected {
        return Err(OmenError::Model(format!(
            "`{}` holds {} levels, expected {expected}",
            path.display(),
            levels.len()
        )));
    }
    Ok(levels)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn toy_model() -> Model {
        let alphabet = Alphabet::new(b"ab").unwrap();
        Model::new(
            2,
            alphabet,
            3,
            vec![2, 0],
            vec![0, 1, 1, 0],
            vec![0, 0],
            vec![0; MAX_PW_LENGTH],
        )
        .unwrap()
    }

    #[test]
    fn accepts_well_formed_model() {
        let m = toy_model();
        assert_eq!(m.prefix_count(), 2);
        assert_eq!(m.cp().len(), 4);
    }

    #[test]
    fn rejects_shape_mismatch() {
        let alphabet = Alphabet::new(b"ab").unwrap();
        let err = Model::new(2, alphabet, 3, vec![0], vec![0; 4], vec![0; 2], vec![0; MAX_PW_LENGTH]);
        assert!(matches!(err, Err(OmenError::Model(_))));
    }

    #[test]
    fn rejects_level_at_cap() {
        let alphabet = Alphabet::new(b"ab").unwrap();
        let err = Model::new(2, alphabet, 3, vec![3, 0], vec![0; 4], vec![0; 2], vec![0; MAX_PW_LENGTH]);
        assert!(matches!(err, Err(OmenError::Model(_))));
    }
}
