//! Machine-readable run summary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use yami_qa_runner::{ExecutionResult, ResultEntry};

use crate::error::Result;

/// JSON summary of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Preset that ran
    pub preset: String,
    /// Host the tools ran on
    pub host: String,
    /// Media root
    pub root: PathBuf,
    /// Output directory
    pub output_dir: PathBuf,
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    pub finished_at: Option<DateTime<Utc>>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Whether the run stopped early
    pub interrupted: bool,
    /// Cases opened
    pub open: usize,
    /// Passing cases
    pub pass: usize,
    /// Failing cases
    pub fail: usize,
    /// Cases the oracle could not judge
    pub inconclusive: usize,
    /// Passing entries
    pub passed: Vec<ResultEntry>,
    /// Failing entries
    pub failed: Vec<ResultEntry>,
    /// Inconclusive entries
    pub unverified: Vec<ResultEntry>,
}

impl RunSummary {
    /// Build a summary stamped with the current host name
    #[must_use]
    pub fn from_result(result: &ExecutionResult) -> Self {
        let agg = &result.aggregator;
        Self {
            preset: result.preset.clone(),
            host: host_name(),
            root: result.root.clone(),
            output_dir: result.output_dir.clone(),
            started_at: agg.started_at,
            finished_at: agg.finished_at,
            duration_ms: result.duration_ms,
            interrupted: agg.interrupted,
            open: agg.open,
            pass: agg.pass_count(),
            fail: agg.fail_count(),
            inconclusive: agg.inconclusive_count(),
            passed: agg.passed.clone(),
            failed: agg.failed.clone(),
            unverified: agg.inconclusive.clone(),
        }
    }

    /// Export to JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the JSON to `path`
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

fn host_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
