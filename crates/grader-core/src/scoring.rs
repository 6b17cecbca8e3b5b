//! Scoring policy
//!
//! Maps a similarity to one of three canonical outcomes:
//! - unavailable (sentinel or NaN) -> server error, score 0
//! - above the threshold -> correct, score 1
//! - anything else -> incorrect, score 0

use crate::compare::is_unavailable;
use serde::{Deserialize, Serialize};

/// Message shown for a passing render
pub const MSG_CORRECT: &str = "Good job!";
/// Message shown for a failing render
pub const MSG_INCORRECT: &str = "Something is incorrect, try again!";
/// Message shown when grading infrastructure failed
pub const MSG_SERVER_ERROR: &str =
    "Something is incorrect at the server side, connect to administrator";

/// Default pass threshold
pub const DEFAULT_THRESHOLD: f64 = 95.0;

/// Tri-state grading verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// Render matches the reference
    Correct,
    /// Render does not match
    Incorrect,
    /// Comparison could not be performed
    ServerError,
}

/// Final grading outcome, constructed once by the scorer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradingOutcome {
    verdict: Verdict,
}

impl GradingOutcome {
    /// Outcome for a verdict
    #[inline]
    #[must_use]
    pub const fn new(verdict: Verdict) -> Self {
        Self { verdict }
    }

    /// Passing outcome
    pub const CORRECT: Self = Self::new(Verdict::Correct);
    /// Failing outcome
    pub const INCORRECT: Self = Self::new(Verdict::Incorrect);
    /// Infrastructure failure outcome
    pub const SERVER_ERROR: Self = Self::new(Verdict::ServerError);

    /// Verdict
    #[inline]
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// Score: 1 for correct, 0 otherwise
    #[inline]
    #[must_use]
    pub fn score(&self) -> u8 {
        u8::from(self.verdict == Verdict::Correct)
    }

    /// Student-facing message
    #[inline]
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self.verdict {
            Verdict::Correct => MSG_CORRECT,
            Verdict::Incorrect => MSG_INCORRECT,
            Verdict::ServerError => MSG_SERVER_ERROR,
        }
    }
}

/// Threshold scorer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scorer {
    threshold: f64,
}

impl Scorer {
    /// Create a scorer with the given pass threshold
    #[inline]
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Pass threshold
    #[inline]
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Score a similarity. Pure and total over `f64`.
    #[must_use]
    pub fn score(&self, similarity: f64) -> GradingOutcome {
        if is_unavailable(similarity) || similarity.is_nan() {
            GradingOutcome::SERVER_ERROR
        } else if similarity > self.threshold {
            GradingOutcome::CORRECT
        } else {
            GradingOutcome::INCORRECT
        }
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::SIMILARITY_UNAVAILABLE;
    use proptest::prelude::*;

    #[test]
    fn scorer_concrete_values() {
        let scorer = Scorer::new(95.0);
        assert_eq!(scorer.score(96.0), GradingOutcome::CORRECT);
        assert_eq!(scorer.score(95.0), GradingOutcome::INCORRECT);
        assert_eq!(scorer.score(0.0), GradingOutcome::INCORRECT);
        assert_eq!(scorer.score(SIMILARITY_UNAVAILABLE), GradingOutcome::SERVER_ERROR);
    }

    #[test]
    fn scorer_nan_is_server_error() {
        assert_eq!(Scorer::default().score(f64::NAN), GradingOutcome::SERVER_ERROR);
    }

    #[test]
    fn outcome_score_and_message() {
        assert_eq!(GradingOutcome::CORRECT.score(), 1);
        assert_eq!(GradingOutcome::CORRECT.message(), "Good job!");
        assert_eq!(GradingOutcome::INCORRECT.score(), 0);
        assert_eq!(GradingOutcome::SERVER_ERROR.score(), 0);
        assert_eq!(
            GradingOutcome::SERVER_ERROR.message(),
            "Something is incorrect at the server side, connect to administrator"
        );
    }

    #[test]
    fn threshold_is_tunable() {
        assert_eq!(Scorer::new(94.0).score(94.5), GradingOutcome::CORRECT);
        assert_eq!(Scorer::new(96.0).score(95.5), GradingOutcome::INCORRECT);
    }

    proptest! {
        #[test]
        fn prop_threshold_law(threshold in 0.0f64..100.0, s in 0.0f64..=100.0) {
            let outcome = Scorer::new(threshold).score(s);
            if s > threshold {
                prop_assert_eq!(outcome, GradingOutcome::CORRECT);
            } else {
                prop_assert_eq!(outcome, GradingOutcome::INCORRECT);
            }
        }

        #[test]
        fn prop_server_error_only_when_unavailable(s in proptest::num::f64::ANY) {
            let outcome = Scorer::default().score(s);
            let unavailable = s.is_nan() || is_unavailable(s);
            prop_assert_eq!(outcome.verdict() == Verdict::ServerError, unavailable);
        }
    }
}
