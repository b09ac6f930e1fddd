//! Invocation adapter
//!
//! Turns one (item, submode) pair into a tool command line, runs it through
//! the [`ToolRunner`] and registers every file the command will write with
//! the case's [`ArtifactSet`]. Only exit status is interpreted here.

use std::path::{Path, PathBuf};

use crate::artifact::ArtifactSet;
use crate::command::{CommandOutput, ToolCommand, ToolKind, ToolRunner};
use crate::config::ToolPair;
use crate::media::{Geometry, TestItem};
use crate::mode::{PixelFormat, Submode};

/// Pixel format the decoder dumps frames in
const DUMP_FORMAT: &str = "I420";

/// Result of one quality-tool call
#[derive(Debug, Clone)]
pub struct QualityRun {
    /// Exit status of the quality tool
    pub output: CommandOutput,
    /// Report length before the call; earlier lines belong to other runs
    pub report_offset: u64,
}

/// Builds and runs tool command lines for one toolset
pub struct InvocationAdapter<'a> {
    runner: &'a dyn ToolRunner,
    tools: ToolPair,
    quality_tool: PathBuf,
    output_dir: PathBuf,
    quality_report_name: String,
}

impl<'a> InvocationAdapter<'a> {
    /// Create an adapter writing into `output_dir`
    #[must_use]
    pub fn new(
        runner: &'a dyn ToolRunner,
        tools: ToolPair,
        quality_tool: PathBuf,
        output_dir: impl Into<PathBuf>,
        quality_report_name: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            tools,
            quality_tool,
            output_dir: output_dir.into(),
            quality_report_name: quality_report_name.into(),
        }
    }

    /// Decode tool in use
    #[must_use]
    pub fn decode_tool(&self) -> &Path {
        &self.tools.decode
    }

    /// Encode tool in use
    #[must_use]
    pub fn encode_tool(&self) -> &Path {
        &self.tools.encode
    }

    /// Where the frame dump of `item` lands
    #[must_use]
    pub fn frame_dump_path(&self, item: &TestItem) -> PathBuf {
        self.output_dir.join(&item.base_name)
    }

    /// Where the encoded bitstream of `item` lands
    #[must_use]
    pub fn bitstream_path(&self, item: &TestItem) -> PathBuf {
        self.output_dir.join(format!("{}.h264", item.base_name))
    }

    /// Report the quality tool appends to
    #[must_use]
    pub fn quality_report_path(&self) -> PathBuf {
        self.output_dir.join(&self.quality_report_name)
    }

    /// Files a decode submode writes for `input_name`
    #[must_use]
    pub fn decode_outputs(&self, input_name: &str, submode: Submode) -> Vec<PathBuf> {
        match submode {
            Submode::FrameDump => vec![self.output_dir.join(input_name)],
            Submode::StreamDigest => vec![self.output_dir.join(format!("{input_name}.md5"))],
            _ => Vec::new(),
        }
    }

    /// Decode `item` in `submode`
    pub fn decode(
        &self,
        item: &TestItem,
        submode: Submode,
        artifacts: &mut ArtifactSet,
    ) -> CommandOutput {
        let (flag, value) = submode.flag();
        let mut command = ToolCommand::new(ToolKind::Decode, &self.tools.decode)
            .flag("-i", item.path.display())
            .flag(flag, value);
        match submode {
            Submode::FrameDump => {
                command = command
                    .flag("-f", DUMP_FORMAT)
                    .flag("-o", self.frame_dump_path(item).display());
            }
            Submode::StreamDigest => {
                command = command.flag("-o", self.output_dir.display());
            }
            _ => {}
        }
        for path in self.decode_outputs(&item.base_name, submode) {
            artifacts.track_fresh(path);
        }
        self.execute(&command)
    }

    /// Decode an encoded bitstream back to raw frames at `candidate`
    pub fn redecode(
        &self,
        bitstream: &Path,
        candidate: &Path,
        artifacts: &mut ArtifactSet,
    ) -> CommandOutput {
        let (flag, value) = Submode::FrameDump.flag();
        let command = ToolCommand::new(ToolKind::Decode, &self.tools.decode)
            .flag("-i", bitstream.display())
            .flag(flag, value)
            .flag("-f", DUMP_FORMAT)
            .flag("-o", candidate.display());
        artifacts.track_fresh(candidate);
        self.execute(&command)
    }

    /// Encode raw frames of `item` to an AVC bitstream
    pub fn encode(
        &self,
        item: &TestItem,
        geometry: Geometry,
        pixel_format: PixelFormat,
        artifacts: &mut ArtifactSet,
    ) -> CommandOutput {
        let (flag, value) = Submode::EncodeAvc.flag();
        let output = self.bitstream_path(item);
        let command = ToolCommand::new(ToolKind::Encode, &self.tools.encode)
            .flag("-i", item.path.display())
            .flag("-s", pixel_format)
            .flag("-W", geometry.width)
            .flag("-H", geometry.height)
            .flag(flag, value)
            .flag("-o", output.display());
        artifacts.track_fresh(output);
        self.execute(&command)
    }

    /// Compare `candidate` frames with the `reference` input
    ///
    /// The tool appends its verdict to the quality report and writes a
    /// per-frame `<candidate>.txt`; both are tracked. Unless artifacts are
    /// kept, a report left by an earlier run is removed first. A kept report
    /// accumulates lines, so its length before the call is returned and
    /// only what the tool appends is judged.
    pub fn measure_quality(
        &self,
        reference: &Path,
        candidate: &Path,
        geometry: Geometry,
        threshold: f64,
        artifacts: &mut ArtifactSet,
    ) -> QualityRun {
        let command = ToolCommand::new(ToolKind::Quality, &self.quality_tool)
            .flag("-i", reference.display())
            .flag("-o", candidate.display())
            .flag("-W", geometry.width)
            .flag("-H", geometry.height)
            .flag("-s", threshold);
        artifacts.track_fresh(format!("{}.txt", candidate.display()));
        let report = self.quality_report_path();
        let report_offset = if artifacts.keeps() {
            let offset = std::fs::metadata(&report).map_or(0, |m| m.len());
            artifacts.track(report);
            offset
        } else {
            artifacts.track_fresh(report);
            0
        };
        QualityRun {
            output: self.execute(&command),
            report_offset,
        }
    }

    fn execute(&self, command: &ToolCommand) -> CommandOutput {
        tracing::debug!(command = %command, "invoking tool");
        let output = self.runner.run(command);
        if !output.success {
            tracing::warn!(
                program = %command.program.display(),
                "{}",
                output.failure_reason()
            );
        }
        output
    }
}
