//! Password evaluation against a loaded model.
//!
//! Scores one password the way the enumerator would: the IP level of its
//! first (n−1)-gram plus the CP level of every n-gram window. The overall
//! level is the negated sum, so a more probable password scores closer
//! to 0 from below.

use crate::error::{OmenError, Result};
use crate::model::Model;

/// Per-step level breakdown of one password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// IP level of the first (n−1)-gram.
    pub initial: u8,
    /// CP level of each n-gram window, in order.
    pub steps: Vec<u8>,
    /// Negated sum of all levels.
    pub overall: i64,
}

/// Evaluate `password` against `model`.
///
/// # Errors
/// Fails when the password is shorter than n−1 characters or contains a
/// character outside the model's alphabet.
pub fn evaluate(model: &Model, password: &[u8]) -> Result<Evaluation> {
    let order = model.order();
    if password.len() < order - 1 {
        return Err(OmenError::Config(format!(
            "the password to evaluate needs at least {} characters",
            order - 1
        )));
    }

    let alphabet = model.alphabet();
    let unknown = |gram: &[u8]| {
        OmenError::Config(format!(
            "password gram {:?} contains a character outside the alphabet",
            String::from_utf8_lossy(gram)
        ))
    };

    let initial_code = alphabet
        .code_of(&password[..order - 1])
        .ok_or_else(|| unknown(&password[..order - 1]))?;
    let initial = model.ip()[initial_code];
    let mut sum = i64::from(initial);

    let mut steps = Vec::new();
    if password.len() >= order {
        for window in password.windows(order) {
            let code = alphabet.code_of(window).ok_or_else(|| unknown(window))?;
            let level = model.cp()[code];
            steps.push(level);
            sum += i64::from(level);
        }
    }

    Ok(Evaluation {
        initial,
        steps,
        overall: -sum,
    })
}

// =============================================================================
// TESTS
// =============================================================================
