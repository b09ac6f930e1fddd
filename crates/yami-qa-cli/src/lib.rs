//! Yami QA CLI Library
//!
//! Library functions for the `yami-qa` harness binary.

#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_const_for_fn)]
// Allow common patterns in test code
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use thiserror::Error;

use yami_qa_report::{JunitReport, RunSummary, write_log};
use yami_qa_runner::{
    ExecutionConfig, ExecutionResult, Executor, HarnessConfig, PRESETS, RealToolRunner,
    ToolRunner, parse_geometry, preset,
};

/// Why a command did not complete
#[derive(Debug, Error)]
pub enum CliError {
    /// The media root does not exist
    #[error("{} does not exist", .0.display())]
    MissingInput(PathBuf),
    /// Bad arguments or configuration
    #[error("{0}")]
    Usage(String),
    /// A report could not be written
    #[error("{0}")]
    Report(String),
}

/// Options of `yami-qa run`
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Media file or directory
    pub path: PathBuf,
    /// Preset name
    pub mode: String,
    /// Directory tools write into
    pub output: PathBuf,
    /// Keep artifacts
    pub save: bool,
    /// One reference hash file for every input
    pub md5: Option<PathBuf>,
    /// Harness configuration file
    pub config: Option<PathBuf>,
    /// Directory holding the codec tools
    pub tools_dir: Option<PathBuf>,
    /// Directory for the timestamped text log
    pub log_dir: PathBuf,
    /// Per-invocation deadline
    pub timeout_secs: Option<u64>,
    /// JUnit XML destination
    pub junit: Option<PathBuf>,
    /// JSON summary destination
    pub json: Option<PathBuf>,
}

impl RunOptions {
    /// Options with defaults for everything but the root and mode
    pub fn new(path: impl Into<PathBuf>, mode: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: mode.into(),
            output: PathBuf::from("output"),
            save: false,
            md5: None,
            config: None,
            tools_dir: None,
            log_dir: PathBuf::from("log"),
            timeout_secs: None,
            junit: None,
            json: None,
        }
    }
}

/// What a completed run produced
#[derive(Debug)]
pub struct RunReport {
    /// Counts and entries
    pub result: ExecutionResult,
    /// Text log written
    pub log_path: PathBuf,
}

/// Load the harness configuration and apply command-line overrides
pub fn load_config(options: &RunOptions) -> Result<HarnessConfig, CliError> {
    let mut config = match &options.config {
        Some(path) => HarnessConfig::from_file(path)
            .map_err(|e| CliError::Usage(format!("Error loading config {}: {e}", path.display())))?,
        None => HarnessConfig::default(),
    };
    if let Some(dir) = &options.tools_dir {
        config.tools_dir = Some(dir.clone());
    }
    if options.timeout_secs.is_some() {
        config.timeout_secs = options.timeout_secs;
    }
    config
        .validate()
        .map_err(|e| CliError::Usage(e.to_string()))?;
    Ok(config)
}

/// Build the executor configuration for a run
pub fn build_execution_config(options: &RunOptions, harness: HarnessConfig) -> ExecutionConfig {
    let mut config =
        ExecutionConfig::new(harness, &options.output).with_save_artifacts(options.save);
    if let Some(md5) = &options.md5 {
        config = config.with_reference(md5);
    }
    config
}

/// Tool runner honoring the configured deadline
pub fn build_runner(harness: &HarnessConfig) -> Arc<dyn ToolRunner> {
    match harness.timeout() {
        Some(timeout) => Arc::new(RealToolRunner::with_timeout(timeout)),
        None => Arc::new(RealToolRunner::new()),
    }
}

/// Title line of the text log
pub fn report_title(preset: &str) -> String {
    format!("libyami {preset}")
}

/// Run a preset and write every requested report
///
/// The input path is checked before anything else, so a missing root
/// fails without touching the output or log directories. Without a
/// `runner` the real tools are spawned.
pub fn execute_run(
    options: &RunOptions,
    runner: Option<Arc<dyn ToolRunner>>,
    interrupt: Arc<AtomicBool>,
) -> Result<RunReport, CliError> {
    if !options.path.exists() {
        return Err(CliError::MissingInput(options.path.clone()));
    }
    let preset = preset(&options.mode).map_err(|e| CliError::Usage(e.to_string()))?;
    let harness = load_config(options)?;
    let runner = runner.unwrap_or_else(|| build_runner(&harness));
    let config = build_execution_config(options, harness);

    let executor = Executor::new(runner, config).with_interrupt(interrupt);
    let result = executor
        .run_preset(&options.path, preset)
        .map_err(|e| match e {
            yami_qa_runner::Error::InputNotFound(path) => CliError::MissingInput(path),
            other => CliError::Usage(other.to_string()),
        })?;

    let log_path = write_log(
        &options.log_dir,
        &report_title(&result.preset),
        &result.aggregator,
    )
    .map_err(|e| CliError::Report(format!("Error writing run log: {e}")))?;

    if let Some(path) = &options.junit {
        write_junit(&result, path)?;
    }
    if let Some(path) = &options.json {
        RunSummary::from_result(&result)
            .write(path)
            .map_err(|e| CliError::Report(format!("Error writing JSON summary: {e}")))?;
    }

    Ok(RunReport { result, log_path })
}

fn write_junit(result: &ExecutionResult, path: &Path) -> Result<(), CliError> {
    let xml = JunitReport::new(report_title(&result.preset))
        .with_class_name(result.preset.clone())
        .generate(result)
        .map_err(|e| CliError::Report(format!("Error generating JUnit XML: {e}")))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| CliError::Report(format!("Error writing JUnit XML: {e}")))?;
    }
    std::fs::write(path, xml)
        .map_err(|e| CliError::Report(format!("Error writing JUnit XML: {e}")))
}

/// Human-readable run summary
pub fn summary_lines(report: &RunReport) -> String {
    let agg = &report.result.aggregator;
    let mut out = String::new();
    let _ = writeln!(out, "{} result:", report_title(&report.result.preset));
    let _ = writeln!(
        out,
        "  open: {}  pass: {}  fail: {}  inconclusive: {}",
        agg.open,
        agg.pass_count(),
        agg.fail_count(),
        agg.inconclusive_count()
    );
    let _ = writeln!(
        out,
        "  duration: {:.1}s",
        report.result.duration_ms as f64 / 1000.0
    );
    if agg.interrupted {
        let _ = writeln!(out, "  interrupted: partial results");
    }
    let _ = write!(out, "  log: {}", report.log_path.display());
    out
}

/// Table of presets for `yami-qa presets`
pub fn list_presets() -> String {
    let mut out = String::new();
    for preset in PRESETS {
        let _ = writeln!(out, "{:<12} {}", preset.name, preset.description);
        for pass in preset.passes {
            let submodes: Vec<String> = pass.submodes.iter().map(ToString::to_string).collect();
            let _ = writeln!(
                out,
                "    {:?} {:?} [{}] compare={:?}",
                pass.toolset,
                pass.direction,
                submodes.join(", "),
                pass.compare
            );
        }
    }
    out
}

/// `WxH` parsed from a file name
pub fn describe_geometry(file_name: &str) -> Result<String, CliError> {
    parse_geometry(file_name)
        .map(|g| format!("{}x{}", g.width, g.height))
        .map_err(|e| CliError::Usage(e.to_string()))
}
