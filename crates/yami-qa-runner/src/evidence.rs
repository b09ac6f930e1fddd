//! Verdicts and run-wide aggregation
//!
//! One [`Aggregator`] belongs to one run and is passed explicitly to every
//! stage that records results. Nothing here is process-global, so two runs in
//! the same process cannot corrupt each other's counts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Tool succeeded and, when comparing, the oracle agreed
    Pass,
    /// Tool failed or the oracle disagreed
    Fail,
    /// The oracle's input was missing, so nothing could be judged
    Inconclusive,
}

impl Outcome {
    /// Check if this is a passing outcome
    #[must_use]
    pub const fn is_pass(self) -> bool {
        matches!(self, Self::Pass)
    }

    /// Check if this is a failing outcome
    #[must_use]
    pub const fn is_fail(self) -> bool {
        matches!(self, Self::Fail)
    }
}

/// Judgment for one (item, submode) test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Outcome
    pub outcome: Outcome,
    /// Human-readable reason
    pub message: String,
}

impl Verdict {
    /// Passing verdict
    #[must_use]
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Pass,
            message: message.into(),
        }
    }

    /// Failing verdict
    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Fail,
            message: message.into(),
        }
    }

    /// Verdict for a case whose oracle input was missing
    #[must_use]
    pub fn inconclusive(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Inconclusive,
            message: message.into(),
        }
    }

    /// Pass or fail from a boolean
    #[must_use]
    pub fn from_bool(passed: bool, message: impl Into<String>) -> Self {
        if passed {
            Self::pass(message)
        } else {
            Self::fail(message)
        }
    }
}

/// One recorded line of a run report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry {
    /// Item descriptor, e.g. the base file name
    pub descriptor: String,
    /// Verdict message
    pub message: String,
    /// Wall-clock time of the case in milliseconds
    pub duration_ms: u64,
}

/// Run-wide counters and ordered result lists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aggregator {
    /// Test cases opened
    pub open: usize,
    /// Passing entries in recording order
    pub passed: Vec<ResultEntry>,
    /// Failing entries in recording order
    pub failed: Vec<ResultEntry>,
    /// Inconclusive entries in recording order
    pub inconclusive: Vec<ResultEntry>,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run was finished, if it was
    pub finished_at: Option<DateTime<Utc>>,
    /// Whether the run stopped before traversal completed
    pub interrupted: bool,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    /// Create an empty aggregator stamped with the current time
    #[must_use]
    pub fn new() -> Self {
        Self {
            open: 0,
            passed: Vec::new(),
            failed: Vec::new(),
            inconclusive: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            interrupted: false,
        }
    }

    /// Count a test case as opened
    pub fn open_case(&mut self) {
        self.open += 1;
    }

    /// Record a verdict under `descriptor`
    pub fn record(&mut self, descriptor: impl Into<String>, verdict: Verdict, duration_ms: u64) {
        let entry = ResultEntry {
            descriptor: descriptor.into(),
            message: verdict.message,
            duration_ms,
        };
        match verdict.outcome {
            Outcome::Pass => self.passed.push(entry),
            Outcome::Fail => self.failed.push(entry),
            Outcome::Inconclusive => self.inconclusive.push(entry),
        }
    }

    /// Stamp the end of the run
    pub fn finish(&mut self, interrupted: bool) {
        self.finished_at = Some(Utc::now());
        self.interrupted = interrupted;
    }

    /// Pass count
    #[must_use]
    pub fn pass_count(&self) -> usize {
        self.passed.len()
    }

    /// Fail count
    #[must_use]
    pub fn fail_count(&self) -> usize {
        self.failed.len()
    }

    /// Inconclusive count
    #[must_use]
    pub fn inconclusive_count(&self) -> usize {
        self.inconclusive.len()
    }

    /// Number of recorded verdicts
    #[must_use]
    pub fn judged(&self) -> usize {
        self.pass_count() + self.fail_count() + self.inconclusive_count()
    }

    /// Export to JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
