//! Simulated attack against a testing set.
//!
//! The testing set is a multiset of target passwords; a target counts as
//! cracked the first time the enumerator emits it, repeat hits are ignored.
//! Every `output_cycle` attempts the simulator appends an
//! `(attempts, cracked ratio)` sample to a graph file and an
//! `(attempts, candidate length)` sample to a length-graph file, so crack
//! curves can be plotted afterwards.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

use crate::error::{OmenError, Result};
use crate::MAX_PW_LENGTH;

/// Name of the crack-ratio graph file inside the results folder.
pub const GRAPH_CRACKED_FILE: &str = "graphCracked.txt";
/// Name of the candidate-length graph file inside the results folder.
pub const GRAPH_LENGTH_FILE: &str = "graphLength.txt";

// =============================================================================
// GRAPH WRITER
// =============================================================================

#[derive(Debug)]
struct GraphWriter {
    cracked: BufWriter<File>,
    lengths: BufWriter<File>,
    output_cycle: u64,
}

impl GraphWriter {
    fn open(results_dir: &Path, output_cycle: u64) -> Result<Self> {
        let cracked_path = results_dir.join(GRAPH_CRACKED_FILE);
        let lengths_path = results_dir.join(GRAPH_LENGTH_FILE);
        Ok(Self {
            cracked: BufWriter::new(
                File::create(&cracked_path).map_err(|e| OmenError::io(cracked_path, e))?,
            ),
            lengths: BufWriter::new(
                File::create(&lengths_path).map_err(|e| OmenError::io(lengths_path, e))?,
            ),
            output_cycle: output_cycle.max(1),
        })
    }

    fn sample(&mut self, attempts: u64, ratio: f64, length: usize) {
        // Graph samples are best-effort; a full disk must not abort the run.
        let _ = writeln!(self.cracked, "{attempts} {ratio:.6}");
        let _ = writeln!(self.lengths, "{attempts} {length}");
    }

    fn flush(&mut self) {
        let _ = self.cracked.flush();
        let _ = self.lengths.flush();
    }
}

// =============================================================================
// ATTACK SIMULATOR
// =============================================================================

#[derive(Debug, Clone)]
struct TargetEntry {
    count: u64,
    cracked: bool,
}

/// O(1) membership oracle plus crack accounting for a testing set.
#[derive(Debug)]
pub struct AttackSimulator {
    targets: HashMap<Vec<u8>, TargetEntry>,
    total: u64,
    cracked: u64,
    cracked_lengths: [u64; MAX_PW_LENGTH],
    boost: bool,
    graphs: Option<GraphWriter>,
}

impl AttackSimulator {
    /// Empty simulator in standard (at-most-once per target) mode.
    #[must_use]
    pub fn new() -> Self {
        Self {
            targets: HashMap::new(),
            total: 0,
            cracked: 0,
            cracked_lengths: [0; MAX_PW_LENGTH],
            boost: false,
            graphs: None,
        }
    }

    /// Empty simulator in boosting mode: a cracked target is removed, so it
    /// can be cracked at most once over the simulator's lifetime even though
    /// boosting runs one enumeration per target.
    #[must_use]
    pub fn for_boosting() -> Self {
        Self {
            boost: true,
            ..Self::new()
        }
    }

    /// Load a testing set, one password per line; identical lines accumulate
    /// their counts. Lines are trimmed of CR and LF only.
    ///
    /// # Errors
    /// Fails on I/O errors.
    pub fn load_testing_set(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path).map_err(|e| OmenError::io(path, e))?;
        for line in std::io::BufReader::new(file).split(b'\n') {
            let mut line = line.map_err(|e| OmenError::io(path, e))?;
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            self.add_target(&line);
        }
        tracing::debug!(targets = self.total, "testing set loaded");
        Ok(())
    }

    /// Add one target occurrence to the multiset.
    pub fn add_target(&mut self, password: &[u8]) {
        self.total += 1;
        self.targets
            .entry(password.to_vec())
            .or_insert(TargetEntry {
                count: 0,
                cracked: false,
            })
            .count += 1;
    }

    /// Attach graph files under `results_dir`, sampling every
    /// `output_cycle` attempts.
    ///
    /// # Errors
    /// Fails when the graph files cannot be created.
    pub fn attach_graphs(&mut self, results_dir: &Path, output_cycle: u64) -> Result<()> {
        self.graphs = Some(GraphWriter::open(results_dir, output_cycle)?);
        Ok(())
    }

    /// Check one candidate against the testing set. `attempts` is the
    /// driver's counter value for this candidate; `length` its length.
    ///
    /// Returns `true` on a first-time hit.
    pub fn check_candidate(&mut self, candidate: &[u8], length: usize, attempts: u64) -> bool {
        let hit = if self.boost {
            match self.targets.remove(candidate) {
                Some(entry) => {
                    self.credit(entry.count, length);
                    true
                }
                None => false,
            }
        } else {
            match self.targets.get_mut(candidate) {
                Some(entry) if !entry.cracked => {
                    entry.cracked = true;
                    let count = entry.count;
                    self.credit(count, length);
                    true
                }
                _ => false,
            }
        };

        let should_sample = self
            .graphs
            .as_ref()
            .is_some_and(|graphs| attempts % graphs.output_cycle == 0);
        if should_sample {
            let ratio = self.ratio();
            if let Some(graphs) = self.graphs.as_mut() {
                graphs.sample(attempts, ratio, length);
            }
        }
        hit
    }

    fn credit(&mut self, count: u64, length: usize) {
        self.cracked += count;
        self.cracked_lengths[length - 1] += count;
    }

    /// Write a final graph sample and flush both files.
    pub fn finish(&mut self, attempts: u64, last_length: usize) {
        if self.graphs.is_some() {
            let ratio = self.ratio();
            if let Some(graphs) = self.graphs.as_mut() {
                graphs.sample(attempts, ratio, last_length);
                graphs.flush();
            }
        }
    }

    /// Total multiset size of the testing set.
    #[must_use]
    pub fn testing_set_size(&self) -> u64 {
        self.total
    }

    /// Sum of counts of cracked targets.
    #[must_use]
    pub fn cracked_count(&self) -> u64 {
        self.cracked
    }

    /// Cracked counts bucketed by password length (index `len − 1`).
    #[must_use]
    pub fn cracked_lengths(&self) -> &[u64; MAX_PW_LENGTH] {
        &self.cracked_lengths
    }

    /// Fraction of the testing set cracked so far.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.cracked as f64 / self.total as f64
        }
    }

    /// True once every target occurrence has been cracked.
    #[must_use]
    pub fn fully_cracked(&self) -> bool {
        self.total > 0 && self.cracked == self.total
    }

    /// True for a simulator built with [`Self::for_boosting`].
    #[must_use]
    pub fn boosting(&self) -> bool {
        self.boost
    }
}

impl Default for AttackSimulator {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn first_hit_counts_repeat_hits_do_not() {
        let mut sim = AttackSimulator::new();
        sim.add_target(b"abc");
        sim.add_target(b"abc");
        sim.add_target(b"xyz");
        assert_eq!(sim.testing_set_size(), 3);

        assert!(sim.check_candidate(b"abc", 3, 1));
        assert_eq!(sim.cracked_count(), 2);
        assert!(!sim.check_candidate(b"abc", 3, 2));
        assert_eq!(sim.cracked_count(), 2);
        assert!(!sim.check_candidate(b"nope", 4, 3));
        assert!(!sim.fully_cracked());

        assert!(sim.check_candidate(b"xyz", 3, 4));
        assert!(sim.fully_cracked());
        assert_eq!(sim.cracked_lengths()[2], 3);
    }

    #[test]
    fn boost_mode_removes_cracked_targets() {
        let mut sim = AttackSimulator::for_boosting();
        sim.add_target(b"abc");
        assert!(sim.check_candidate(b"abc", 3, 1));
        assert!(!sim.check_candidate(b"abc", 3, 2));
        assert_eq!(sim.cracked_count(), 1);
    }

    #[test]
    fn graph_files_receive_samples() {
        let dir = tempfile::tempdir().unwrap();
        let mut sim = AttackSimulator::new();
        sim.add_target(b"pw");
        sim.attach_graphs(dir.path(), 2).unwrap();

        sim.check_candidate(b"a", 1, 1);
        sim.check_candidate(b"pw", 2, 2); // sampled: 2 % 2 == 0
        sim.check_candidate(b"b", 1, 3);
        sim.finish(3, 1);

        let cracked = std::fs::read_to_string(dir.path().join(GRAPH_CRACKED_FILE)).unwrap();
        let lengths = std::fs::read_to_string(dir.path().join(GRAPH_LENGTH_FILE)).unwrap();
        assert_eq!(cracked, "2 1.000000\n3 1.000000\n");
        assert_eq!(lengths, "2 2\n3 1\n");
    }

    #[test]
    fn testing_set_loads_as_multiset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.txt");
        std::fs::write(&path, "abc\r\nabc\nxyz\n").unwrap();
        let mut sim = AttackSimulator::new();
        sim.load_testing_set(&path).unwrap();
        assert_eq!(sim.testing_set_size(), 3);
        assert!(sim.check_candidate(b"abc", 3, 1));
        assert_eq!(sim.cracked_count(), 2);
    }
}
