//! Training: password corpus → count arrays → level tables on disk.
//!
//! The scan accumulates IP/CP/EP/LN counts over the corpus, warning (never
//! aborting) on lines it must skip. Smoothing then turns the counts into
//! levels, and [`write_model`] persists the five-file model the loader in
//! [`crate::model`] reads back.

use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::alphabet::Alphabet;
use crate::error::{OmenError, Result, Warning, WarningSink};
use crate::model::{COUNT_EXT, LEVEL_EXT};
use crate::smoothing::{AdditiveSmoothing, ArrayKind};
use crate::{MAX_NGRAM, MAX_PW_LENGTH, MIN_NGRAM};

// =============================================================================
// OPTIONS
// =============================================================================

/// Knobs of one training run.
#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// n-gram order of the model to train.
    pub order: usize,
    /// Exclusive level cap L.
    pub max_level: u8,
    /// Corpus lines are `<count> <password>` instead of bare passwords.
    pub counted: bool,
    /// Also write `.count` mirrors and annotate table lines with their gram.
    pub verbose_files: bool,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            order: 3,
            max_level: crate::DEFAULT_MAX_LEVEL,
            counted: false,
            verbose_files: false,
        }
    }
}

/// Where [`write_model`] puts its five files and what the header records.
#[derive(Debug, Clone)]
pub struct TrainOutput {
    /// Path of the config file; table files land in its directory.
    pub config_path: PathBuf,
    /// Basename of the CP table (extension appended per file).
    pub cp_base: String,
    /// Basename of the IP table.
    pub ip_base: String,
    /// Basename of the EP table.
    pub ep_base: String,
    /// Basename of the LN table.
    pub ln_base: String,
    /// Corpus name recorded in the headers.
    pub input_name: String,
    /// Smoothing config name recorded in the header, if one was used.
    pub smoothing_name: Option<String>,
}

impl TrainOutput {
    /// Conventional layout: `<dir>/omen.cfg` plus `CP`/`IP`/`EP`/`LN` tables.
    #[must_use]
    pub fn in_directory(dir: &Path, input_name: &str) -> Self {
        Self {
            config_path: dir.join("omen.cfg"),
            cp_base: "CP".into(),
            ip_base: "IP".into(),
            ep_base: "EP".into(),
            ln_base: "LN".into(),
            input_name: input_name.into(),
            smoothing_name: None,
        }
    }
}

// =============================================================================
// COUNTS
// =============================================================================

/// Raw n-gram counts of a corpus, before smoothing.
#[derive(Debug, Clone)]
pub struct Counts {
    order: usize,
    alphabet: Alphabet,
    ip: Vec<u64>,
    cp: Vec<u64>,
    ep: Vec<u64>,
    ln: Vec<u64>,
    totals: [u64; 4],
}

impl Counts {
    /// Empty count arrays for an alphabet and order.
    ///
    /// # Errors
    /// Fails when `order` is out of range.
    pub fn new(order: usize, alphabet: Alphabet) -> Result<Self> {
        if !(MIN_NGRAM..=MAX_NGRAM).contains(&order) {
            return Err(OmenError::Range {
                name: "ngram",
                min: MIN_NGRAM as u64,
                max: MAX_NGRAM as u64,
                got: order as u64,
            });
        }
        let prefix_count = alphabet.gram_space(order - 1);
        Ok(Self {
            order,
            ip: vec![0; prefix_count],
            cp: vec![0; prefix_count * alphabet.len()],
            ep: vec![0; prefix_count],
            ln: vec![0; MAX_PW_LENGTH],
            totals: [0; 4],
            alphabet,
        })
    }

    /// Count one password with multiplicity `count`, warning about anything
    /// that keeps it (or parts of it) out of the model.
    pub fn observe(&mut self, password: &[u8], count: u64, line: u64, sink: &mut WarningSink) {
        let k = self.order - 1;
        if password.len() < k {
            sink.record(Warning::ShortLine { line });
            return;
        }
        if password.len() >= MAX_PW_LENGTH {
            sink.record(Warning::OverlongLine { line });
            return;
        }

        self.ln[password.len()] += count;
        self.totals[kind_index(ArrayKind::Ln)] += count;

        match self.alphabet.code_of(&password[..k]) {
            Some(code) => {
                self.ip[code] += count;
                self.totals[kind_index(ArrayKind::Ip)] += count;
            }
            None => sink.record(Warning::UnknownChar { line, section: "IP" }),
        }

        if password.len() >= self.order {
            let mut unknown = false;
            for window in password.windows(self.order) {
                match self.alphabet.code_of(window) {
                    Some(code) => {
                        self.cp[code] += count;
                        self.totals[kind_index(ArrayKind::Cp)] += count;
                    }
                    None => unknown = true,
                }
            }
            if unknown {
                sink.record(Warning::UnknownChar { line, section: "CP" });
            }
        } else {
            sink.record(Warning::InitialOnly { line });
        }

        match self.alphabet.code_of(&password[password.len() - k..]) {
            Some(code) => {
                self.ep[code] += count;
                self.totals[kind_index(ArrayKind::Ep)] += count;
            }
            None => sink.record(Warning::UnknownChar { line, section: "EP" }),
        }
    }

    /// The count array of one kind.
    #[must_use]
    pub fn array(&self, kind: ArrayKind) -> &[u64] {
        match kind {
            ArrayKind::Ip => &self.ip,
            ArrayKind::Cp => &self.cp,
            ArrayKind::Ep => &self.ep,
            ArrayKind::Ln => &self.ln,
        }
    }

    /// Sum of all counts recorded for one kind.
    #[must_use]
    pub fn total(&self, kind: ArrayKind) -> u64 {
        self.totals[kind_index(kind)]
    }

    /// The alphabet the counts were taken over.
    #[must_use]
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// The n-gram order.
    #[must_use]
    pub fn order(&self) -> usize {
        self.order
    }
}

const fn kind_index(kind: ArrayKind) -> usize {
    match kind {
        ArrayKind::Ip => 0,
        ArrayKind::Cp => 1,
        ArrayKind::Ep => 2,
        ArrayKind::Ln => 3,
    }
}

// =============================================================================
// CORPUS SCAN
// =============================================================================

/// Scan a corpus and return its counts.
///
/// Lines are trimmed of CR and LF. In counted mode each line is
/// `<count> <password>`; entries with a missing or non-positive count warn
/// and are skipped.
///
/// # Errors
/// Fails only on I/O errors; bad lines are warnings.
pub fn train(
    corpus: impl BufRead,
    alphabet: Alphabet,
    options: &TrainOptions,
    sink: &mut WarningSink,
) -> Result<Counts> {
    let mut counts = Counts::new(options.order, alphabet)?;
    let mut line_no: u64 = 0;

    for line in corpus.split(b'\n') {
        let mut line = line.map_err(|e| OmenError::io("<corpus>", e))?;
        line_no += 1;
        if line.last() == Some(&b'\r') {
            line.pop();
        }

        if options.counted {
            let mut fields = line
                .split(|&b| b == b' ' || b == b'\t')
                .filter(|f| !f.is_empty());
            let count = fields
                .next()
                .and_then(|f| std::str::from_utf8(f).ok())
                .and_then(|f| f.parse::<u64>().ok());
            match (count, fields.next()) {
                (Some(count), Some(password)) if count > 0 => {
                    counts.observe(password, count, line_no, sink);
                }
                _ => sink.record(Warning::BadCount { line: line_no }),
            }
        } else {
            counts.observe(&line, 1, line_no, sink);
        }
    }

    tracing::debug!(
        lines = line_no,
        warnings = sink.emitted(),
        "corpus scan finished"
    );
    Ok(counts)
}

// =============================================================================
// MODEL WRITING
// =============================================================================

/// Smooth the counts and write the five-file model.
///
/// Level files are bare level-per-line tables; with
/// [`TrainOptions::verbose_files`] they get headers, gram annotations and
/// `.count` mirrors.
///
/// # Errors
/// Fails on I/O errors.
pub fn write_model(
    counts: &Counts,
    smoothing: &AdditiveSmoothing,
    options: &TrainOptions,
    out: &TrainOutput,
) -> Result<()> {
    let dir = out.config_path.parent().unwrap_or_else(|| Path::new("."));
    write_config(counts, smoothing, options, out)?;

    for (kind, base) in [
        (ArrayKind::Cp, &out.cp_base),
        (ArrayKind::Ip, &out.ip_base),
        (ArrayKind::Ep, &out.ep_base),
        (ArrayKind::Ln, &out.ln_base),
    ] {
        let levels = smoothing.smooth(
            kind,
            counts.array(kind),
            counts.total(kind),
            counts.alphabet().len(),
            options.max_level,
        );
        write_table(
            counts,
            kind,
            &levels,
            smoothing,
            options,
            out,
            &dir.join(format!("{base}{LEVEL_EXT}")),
        )?;
        if options.verbose_files {
            write_count_mirror(
                counts,
                kind,
                smoothing,
                options,
                out,
                &dir.join(format!("{base}{COUNT_EXT}")),
            )?;
        }
    }
    Ok(())
}

/// The `### ...` banner plus the `# -key value` lines the loader recognises.
fn write_header(
    w: &mut impl Write,
    title: &str,
    counts: &Counts,
    smoothing: &AdditiveSmoothing,
    options: &TrainOptions,
    out: &TrainOutput,
) -> std::io::Result<()> {
    writeln!(
        w,
        "### {title} for input file <{}> on {}",
        out.input_name,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(w, "### with the following settings:")?;
    writeln!(w, "# -alphabet {}", String::from_utf8_lossy(counts.alphabet().as_bytes()))?;
    writeln!(w, "# -alphabetsize {}", counts.alphabet().len())?;
    writeln!(w, "# -ngram {}", counts.order())?;
    writeln!(w, "# -maxLevel {}", options.max_level)?;
    writeln!(w, "### smoothing: {}", smoothing.describe())
}

fn write_config(
    counts: &Counts,
    smoothing: &AdditiveSmoothing,
    options: &TrainOptions,
    out: &TrainOutput,
) -> Result<()> {
    let path = &out.config_path;
    let file = File::create(path).map_err(|e| OmenError::io(path, e))?;
    let mut w = BufWriter::new(file);

    let io_err = |e| OmenError::io(path, e);
    write_header(&mut w, "Config", counts, smoothing, options, out).map_err(io_err)?;
    writeln!(w, "# -cpout {}", out.cp_base).map_err(io_err)?;
    writeln!(w, "# -ipout {}", out.ip_base).map_err(io_err)?;
    writeln!(w, "# -epout {}", out.ep_base).map_err(io_err)?;
    writeln!(w, "# -lenout {}", out.ln_base).map_err(io_err)?;
    writeln!(w, "# -input {}", out.input_name).map_err(io_err)?;
    if let Some(smoothing_name) = &out.smoothing_name {
        writeln!(w, "# -smoo {smoothing_name}").map_err(io_err)?;
    }
    w.flush().map_err(io_err)
}

#[allow(clippy::too_many_arguments)]
fn write_table(
    counts: &Counts,
    kind: ArrayKind,
    levels: &[u8],
    smoothing: &AdditiveSmoothing,
    options: &TrainOptions,
    out: &TrainOutput,
    path: &Path,
) -> Result<()> {
    let file = File::create(path).map_err(|e| OmenError::io(path, e))?;
    let mut w = BufWriter::new(file);
    let io_err = |e| OmenError::io(path, e);

    if options.verbose_files {
        write_header(
            &mut w,
            &format!("{}-LEVELS", kind.name()),
            counts,
            smoothing,
            options,
            out,
        )
        .map_err(io_err)?;
        for (code, &level) in levels.iter().enumerate() {
            writeln!(w, "{level}\t{}", annotate(counts, kind, code)).map_err(io_err)?;
        }
    } else {
        for &level in levels {
            writeln!(w, "{level}").map_err(io_err)?;
        }
    }
    w.flush().map_err(io_err)
}

fn write_count_mirror(
    counts: &Counts,
    kind: ArrayKind,
    smoothing: &AdditiveSmoothing,
    options: &TrainOptions,
    out: &TrainOutput,
    path: &Path,
) -> Result<()> {
    let file = File::create(path).map_err(|e| OmenError::io(path, e))?;
    let mut w = BufWriter::new(file);
    let io_err = |e| OmenError::io(path, e);

    write_header(
        &mut w,
        &format!("{}-COUNTS", kind.name()),
        counts,
        smoothing,
        options,
        out,
    )
    .map_err(io_err)?;
    for (code, &count) in counts.array(kind).iter().enumerate() {
        writeln!(w, "{count}\t{}", annotate(counts, kind, code)).map_err(io_err)?;
    }
    w.flush().map_err(io_err)
}

/// Human-readable label of one table entry: the gram itself, or the length
/// for LN.
fn annotate(counts: &Counts, kind: ArrayKind, code: usize) -> String {
    match kind {
        ArrayKind::Ln => code.to_string(),
        ArrayKind::Cp => String::from_utf8_lossy(&counts.alphabet().decode(code, counts.order()))
            .into_owned(),
        ArrayKind::Ip | ArrayKind::Ep => {
            String::from_utf8_lossy(&counts.alphabet().decode(code, counts.order() - 1)).into_owned()
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
