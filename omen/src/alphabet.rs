//! Alphabet and k-gram codec.
//!
//! An [`Alphabet`] is an ordered sequence of distinct single-byte characters.
//! A k-gram over the alphabet encodes to an integer by treating each
//! character's position as a base-|Σ| digit, most significant first; the
//! codec is total on Σ^k and injective, which is what lets the model store
//! its level tables as flat arrays indexed by gram code.

use std::collections::HashMap;
use std::io::BufRead;

use crate::error::{OmenError, Result};

/// Sentinel for "byte not in alphabet" in the reverse lookup table.
const NO_POSITION: u16 = u16::MAX;

// =============================================================================
// ALPHABET
// =============================================================================

/// Immutable ordered alphabet with O(1) forward and reverse lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    chars: Vec<u8>,
    positions: [u16; 256],
}

impl Alphabet {
    /// Build an alphabet from its characters, in order.
    ///
    /// # Errors
    /// Rejects empty input, duplicate characters, and whitespace or control
    /// bytes (the on-disk config format stores the alphabet as a single
    /// whitespace-delimited token).
    pub fn new(chars: &[u8]) -> Result<Self> {
        if chars.is_empty() {
            return Err(OmenError::Config("alphabet must not be empty".into()));
        }
        if chars.len() > 256 {
            return Err(OmenError::Config(format!(
                "alphabet holds {} characters, the maximum is 256",
                chars.len()
            )));
        }

        let mut positions = [NO_POSITION; 256];
        for (i, &c) in chars.iter().enumerate() {
            if c.is_ascii_whitespace() || c.is_ascii_control() {
                return Err(OmenError::Config(format!(
                    "alphabet byte 0x{c:02x} is whitespace or a control character"
                )));
            }
            if positions[usize::from(c)] != NO_POSITION {
                return Err(OmenError::Config(format!(
                    "duplicate character {:?} in alphabet",
                    char::from(c)
                )));
            }
            positions[usize::from(c)] = i as u16;
        }

        Ok(Self {
            chars: chars.to_vec(),
            positions,
        })
    }

    /// Number of characters |Σ|.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// True if the alphabet holds no characters. Never true for a
    /// successfully constructed value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// The characters in order.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.chars
    }

    /// Character at `position`, or `None` past the end.
    #[must_use]
    pub fn char_at(&self, position: usize) -> Option<u8> {
        self.chars.get(position).copied()
    }

    /// Position of `c`, or `None` if `c` is not in the alphabet.
    #[must_use]
    pub fn position_of(&self, c: u8) -> Option<usize> {
        let p = self.positions[usize::from(c)];
        (p != NO_POSITION).then_some(usize::from(p))
    }

    /// |Σ|^k, the size of the code space for k-grams.
    #[must_use]
    pub fn gram_space(&self, k: usize) -> usize {
        self.chars.len().pow(k as u32)
    }

    // =========================================================================
    // CODEC
    // =========================================================================

    /// Code of a gram given as characters, or `None` if any character is
    /// outside the alphabet.
    #[must_use]
    pub fn code_of(&self, gram: &[u8]) -> Option<usize> {
        let mut code = 0usize;
        for &c in gram {
            code = code * self.chars.len() + self.position_of(c)?;
        }
        Some(code)
    }

    /// Code of a gram given as alphabet positions.
    #[must_use]
    pub fn code_of_positions(&self, positions: &[u8]) -> usize {
        positions
            .iter()
            .fold(0usize, |code, &p| code * self.chars.len() + usize::from(p))
    }

    /// Decode `code` into `out.len()` alphabet positions, most significant
    /// digit first. `code` must lie in `[0, |Σ|^out.len())`.
    pub fn decode_positions(&self, mut code: usize, out: &mut [u8]) {
        debug_assert!(code < self.gram_space(out.len()));
        for slot in out.iter_mut().rev() {
            *slot = (code % self.chars.len()) as u8;
            code /= self.chars.len();
        }
    }

    /// Decode `code` into the characters of a k-gram.
    #[must_use]
    pub fn decode(&self, code: usize, k: usize) -> Vec<u8> {
        let mut positions = vec![0u8; k];
        self.decode_positions(code, &mut positions);
        positions
            .iter()
            .map(|&p| self.chars[usize::from(p)])
            .collect()
    }

    // =========================================================================
    // FREQUENCY BUILDER
    // =========================================================================

    /// Build an alphabet from the `size` most frequent eligible bytes of a
    /// corpus, most frequent first. Whitespace and control bytes are never
    /// eligible. Also returns the full (byte, count) frequency table of the
    /// eligible bytes, descending.
    ///
    /// # Errors
    /// Fails on I/O errors and when the corpus holds fewer than `size`
    /// distinct eligible bytes.
    pub fn from_frequencies(corpus: impl BufRead, size: usize) -> Result<(Self, Vec<(u8, u64)>)> {
        let mut counts: HashMap<u8, u64> = HashMap::new();
        for line in corpus.split(b'\n') {
            let line = line.map_err(|e| OmenError::io("<corpus>", e))?;
            for &c in &line {
                if !c.is_ascii_whitespace() && !c.is_ascii_control() {
                    *counts.entry(c).or_insert(0) += 1;
                }
            }
        }

        let mut table: Vec<(u8, u64)> = counts.into_iter().collect();
        // Descending by count, ties by ascending byte so output is stable.
        table.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        if table.len() < size {
            return Err(OmenError::Config(format!(
                "corpus holds only {} distinct characters, {} requested",
                table.len(),
                size
            )));
        }

        let chars: Vec<u8> = table.iter().take(size).map(|&(c, _)| c).collect();
        Ok((Self::new(&chars)?, table))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn abc() -> Alphabet {
        Alphabet::new(b"abc").unwrap()
    }

    #[test]
    fn rejects_duplicates_and_whitespace() {
        assert!(Alphabet::new(b"aba").is_err());
        assert!(Alphabet::new(b"a b").is_err());
        assert!(Alphabet::new(b"").is_err());
    }

    #[test]
    fn position_lookup_round_trips() {
        let a = abc();
        for (i, &c) in a.as_bytes().iter().enumerate() {
            assert_eq!(a.position_of(c), Some(i));
            assert_eq!(a.char_at(i), Some(c));
        }
        assert_eq!(a.position_of(b'z'), None);
    }

    #[test]
    fn codec_round_trips_full_space() {
        let a = abc();
        for k in 1..=3 {
            for code in 0..a.gram_space(k) {
                let gram = a.decode(code, k);
                assert_eq!(a.code_of(&gram), Some(code), "k={k} code={code}");
            }
        }
    }

    #[test]
    fn code_is_base_sigma_big_endian() {
        let a = abc();
        // "cab" -> 2*9 + 0*3 + 1 = 19
        assert_eq!(a.code_of(b"cab"), Some(19));
        assert_eq!(a.code_of_positions(&[2, 0, 1]), 19);
        assert_eq!(a.code_of(b"axc"), None);
    }

    #[test]
    fn frequency_builder_orders_by_count() {
        let corpus = b"aaab\nbbcc\nba\n" as &[u8];
        let (alphabet, table) = Alphabet::from_frequencies(corpus, 2).unwrap();
        assert_eq!(alphabet.as_bytes(), b"ab");
        assert_eq!(table[0], (b'a', 4));
        assert_eq!(table[1], (b'b', 4));
        assert_eq!(table[2], (b'c', 2));
    }
}
