//! Run executor
//!
//! Drives a preset over a media root: one traversal per pass, every
//! submode of the pass per qualifying item, strictly sequential. Each case
//! owns an [`ArtifactSet`], so its outputs are gone by the time the next
//! case starts unless the run saves artifacts.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::artifact::ArtifactSet;
use crate::command::ToolRunner;
use crate::config::HarnessConfig;
use crate::error::{Error, Result};
use crate::evidence::{Aggregator, Outcome, Verdict};
use crate::invocation::InvocationAdapter;
use crate::media::{TestItem, discover};
use crate::mode::{Direction, Preset, ReferenceSource, Submode, TestPlan};
use crate::oracle::{ReferenceCache, judge_digest, judge_quality};

/// Per-run options layered over the harness configuration
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Tool locations and oracle settings
    pub harness: HarnessConfig,
    /// Directory tools write their outputs into
    pub output_dir: PathBuf,
    /// Keep artifacts instead of deleting them
    pub save_artifacts: bool,
    /// One reference hash file for the whole run
    pub reference_override: Option<PathBuf>,
}

impl ExecutionConfig {
    /// Create a config writing into `output_dir`
    #[must_use]
    pub fn new(harness: HarnessConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            harness,
            output_dir: output_dir.into(),
            save_artifacts: false,
            reference_override: None,
        }
    }

    /// Keep artifacts
    #[must_use]
    pub fn with_save_artifacts(mut self, save: bool) -> Self {
        self.save_artifacts = save;
        self
    }

    /// Use one reference file for every input
    #[must_use]
    pub fn with_reference(mut self, path: impl Into<PathBuf>) -> Self {
        self.reference_override = Some(path.into());
        self
    }

    /// Where reference hashes come from
    #[must_use]
    pub fn reference_source(&self) -> ReferenceSource {
        match &self.reference_override {
            Some(path) => ReferenceSource::Explicit(path.clone()),
            None => ReferenceSource::Sibling(self.harness.reference_file_name.clone()),
        }
    }
}

/// Result of running one preset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Preset name
    pub preset: String,
    /// Media root
    pub root: PathBuf,
    /// Output directory
    pub output_dir: PathBuf,
    /// Counts and entries
    pub aggregator: Aggregator,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Whether the run stopped early
    #[must_use]
    pub fn interrupted(&self) -> bool {
        self.aggregator.interrupted
    }
}

/// Executor for running presets
pub struct Executor {
    runner: Arc<dyn ToolRunner>,
    config: ExecutionConfig,
    interrupt: Option<Arc<AtomicBool>>,
}

impl Executor {
    /// Create an executor
    #[must_use]
    pub fn new(runner: Arc<dyn ToolRunner>, config: ExecutionConfig) -> Self {
        Self {
            runner,
            config,
            interrupt: None,
        }
    }

    /// Stop before the next case once `flag` is set
    #[must_use]
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// Run configuration
    #[must_use]
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Run every pass of `preset` over `root`
    ///
    /// # Errors
    ///
    /// Returns [`Error::InputNotFound`] if `root` does not exist, checked
    /// before any tool runs, or an I/O error if the output directory cannot
    /// be created. Tool failures are verdicts, not errors.
    pub fn run_preset(&self, root: &Path, preset: &Preset) -> Result<ExecutionResult> {
        if !root.exists() {
            return Err(Error::InputNotFound(root.to_path_buf()));
        }
        std::fs::create_dir_all(&self.config.output_dir)?;
        let output_dir = std::path::absolute(&self.config.output_dir)?;

        let start = Instant::now();
        let mut aggregator = Aggregator::new();
        let mut references = ReferenceCache::new();
        let single_case = matches!(preset.passes, [pass] if pass.submodes.len() == 1);

        tracing::info!(
            preset = preset.name,
            root = %root.display(),
            output = %output_dir.display(),
            "starting run"
        );

        for pass in preset.passes {
            let plan = TestPlan::from_pass(
                pass,
                self.config.save_artifacts,
                self.config.reference_source(),
                self.config.harness.encode_quality_threshold,
            );
            let adapter = InvocationAdapter::new(
                self.runner.as_ref(),
                self.config.harness.tools(plan.toolset),
                self.config.harness.quality_tool(),
                &output_dir,
                self.config.harness.quality_report_name.clone(),
            );
            tracing::info!(
                toolset = ?plan.toolset,
                direction = ?plan.direction,
                compare = plan.compare,
                "starting pass"
            );
            let completed = self.run_plan(
                root,
                &plan,
                &adapter,
                single_case,
                &mut references,
                &mut aggregator,
            )?;
            if !completed {
                break;
            }
        }

        let interrupted = self.interrupted();
        aggregator.finish(interrupted);
        if interrupted {
            tracing::warn!("run interrupted, report is partial");
        }
        tracing::info!(
            open = aggregator.open,
            pass = aggregator.pass_count(),
            fail = aggregator.fail_count(),
            inconclusive = aggregator.inconclusive_count(),
            "run finished"
        );

        Ok(ExecutionResult {
            preset: preset.name.to_string(),
            root: root.to_path_buf(),
            output_dir,
            aggregator,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Run one plan over `root`; returns `false` if interrupted
    ///
    /// # Errors
    ///
    /// Returns an error if `root` vanished since the run started.
    pub fn run_plan(
        &self,
        root: &Path,
        plan: &TestPlan,
        adapter: &InvocationAdapter<'_>,
        single_case: bool,
        references: &mut ReferenceCache,
        aggregator: &mut Aggregator,
    ) -> Result<bool> {
        for item in discover(root)? {
            if !plan.accepts(item.role) {
                tracing::debug!(file = %item.base_name, role = ?item.role, "not a candidate");
                continue;
            }
            for &submode in &plan.submodes {
                if self.interrupted() {
                    return Ok(false);
                }
                aggregator.open_case();
                let case_start = Instant::now();
                let verdict = match plan.direction {
                    Direction::Decode => decode_case(adapter, plan, &item, submode, references),
                    Direction::Encode => encode_case(adapter, plan, &item),
                };
                if self.interrupted() {
                    tracing::warn!(file = %item.base_name, "interrupted, verdict discarded");
                    return Ok(false);
                }
                let descriptor = if single_case {
                    item.base_name.clone()
                } else {
                    describe(adapter, plan.direction, &item, submode)
                };
                match verdict.outcome {
                    Outcome::Pass => tracing::info!(case = %descriptor, "pass: {}", verdict.message),
                    Outcome::Fail => tracing::warn!(case = %descriptor, "fail: {}", verdict.message),
                    Outcome::Inconclusive => {
                        tracing::warn!(case = %descriptor, "inconclusive: {}", verdict.message);
                    }
                }
                aggregator.record(
                    descriptor,
                    verdict,
                    case_start.elapsed().as_millis() as u64,
                );
            }
        }
        Ok(true)
    }
}

/// `<tool> <input> <flag fragment>`
fn describe(
    adapter: &InvocationAdapter<'_>,
    direction: Direction,
    item: &TestItem,
    submode: Submode,
) -> String {
    let tool = match direction {
        Direction::Decode => adapter.decode_tool(),
        Direction::Encode => adapter.encode_tool(),
    };
    let tool = tool
        .file_name()
        .map_or_else(|| tool.display().to_string(), |n| n.to_string_lossy().to_string());
    format!("{tool} {} {submode}", item.base_name)
}

fn decode_case(
    adapter: &InvocationAdapter<'_>,
    plan: &TestPlan,
    item: &TestItem,
    submode: Submode,
    references: &mut ReferenceCache,
) -> Verdict {
    if adapter
        .decode_outputs(&item.base_name, submode)
        .contains(&item.path)
    {
        return Verdict::fail("output path is the input file itself");
    }
    let mut artifacts = ArtifactSet::new(plan.save_artifacts);
    let output = adapter.decode(item, submode, &mut artifacts);
    if !output.success {
        return Verdict::fail(output.failure_reason());
    }
    if !plan.compare || !submode.is_hashed() {
        return Verdict::pass("exit status 0");
    }
    let reference = plan.reference.resolve(item.dir());
    judge_digest(
        references.get(&reference),
        &reference,
        &item.base_name,
        &adapter.frame_dump_path(item),
    )
}

fn encode_case(adapter: &InvocationAdapter<'_>, plan: &TestPlan, item: &TestItem) -> Verdict {
    let geometry = match item.geometry() {
        Ok(g) => g,
        Err(e) => {
            tracing::warn!("{e}");
            return Verdict::fail(e.to_string());
        }
    };
    let bitstream = adapter.bitstream_path(item);
    let candidate = adapter.frame_dump_path(item);
    if bitstream == item.path || (plan.compare && candidate == item.path) {
        return Verdict::fail("output path is the input file itself");
    }

    let mut artifacts = ArtifactSet::new(plan.save_artifacts);
    let output = adapter.encode(item, geometry, plan.pixel_format, &mut artifacts);
    if !output.success {
        return Verdict::fail(output.failure_reason());
    }
    if !plan.compare {
        return Verdict::pass("exit status 0");
    }

    let output = adapter.redecode(&bitstream, &candidate, &mut artifacts);
    if !output.success {
        return Verdict::fail(format!("re-decode failed: {}", output.failure_reason()));
    }
    let quality = adapter.measure_quality(
        &item.path,
        &candidate,
        geometry,
        plan.quality_threshold,
        &mut artifacts,
    );
    if !quality.output.success {
        tracing::debug!(
            "quality tool exited {}; judging from its report",
            quality.output.exit_code
        );
    }
    judge_quality(
        &adapter.quality_report_path(),
        quality.report_offset,
        &item.base_name,
    )
}
