//! Command execution abstraction for testability
//!
//! The harness talks to the codec tools only through [`ToolRunner`], so the
//! executor and oracles can be exercised with [`MockToolRunner`], which
//! simulates exit codes and the files each tool would write.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::time::Duration;

use crate::process::wait_with_timeout;

/// Which external collaborator a command targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// Decode tool (`yamidecode`, `decodecapi`, `v4l2decode`)
    Decode,
    /// Encode tool (`yamiencode`, `encodecapi`, `v4l2encode`)
    Encode,
    /// Quality-measurement tool (`psnr`)
    Quality,
}

/// A fully built external tool command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Collaborator this command targets
    pub kind: ToolKind,
    /// Executable path or bare name resolved through `PATH`
    pub program: PathBuf,
    /// Arguments, in order
    pub args: Vec<String>,
}

impl ToolCommand {
    /// Create a command with no arguments
    #[must_use]
    pub fn new(kind: ToolKind, program: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append a flag and its value
    #[must_use]
    pub fn flag(mut self, flag: &str, value: impl fmt::Display) -> Self {
        self.args.push(flag.to_string());
        self.args.push(value.to_string());
        self
    }

    /// Value following `flag`, if present
    #[must_use]
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Result of executing a command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Exit code (negative for signals or spawn failure)
    pub exit_code: i32,
    /// Whether the command succeeded
    pub success: bool,
    /// Whether the harness gave up waiting
    pub timed_out: bool,
}

impl CommandOutput {
    /// Create a successful command output
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
            success: true,
            timed_out: false,
        }
    }

    /// Create a failed command output
    #[must_use]
    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
            success: false,
            timed_out: false,
        }
    }

    /// Create output for a command killed at its deadline
    #[must_use]
    pub fn timeout(timeout: Duration) -> Self {
        Self {
            stdout: String::new(),
            stderr: format!("timed out after {}s", timeout.as_secs_f64()),
            exit_code: -1,
            success: false,
            timed_out: true,
        }
    }

    /// Short human-readable reason for a failed command
    #[must_use]
    pub fn failure_reason(&self) -> String {
        if self.timed_out {
            return self.stderr.clone();
        }
        let last_line = self.stderr.lines().rev().find(|l| !l.trim().is_empty());
        match last_line {
            Some(line) => format!("exit code {} ({})", self.exit_code, line.trim()),
            None => format!("exit code {}", self.exit_code),
        }
    }
}

/// Trait for executing codec tool commands
///
/// This abstraction allows for mocking subprocess execution in tests.
pub trait ToolRunner: Send + Sync {
    /// Execute the command and block until it exits
    fn run(&self, command: &ToolCommand) -> CommandOutput;
}

/// Real runner that spawns the codec tools as child processes
#[derive(Debug, Clone, Default)]
pub struct RealToolRunner {
    /// Per-invocation deadline; `None` blocks until the tool exits
    pub timeout: Option<Duration>,
}

impl RealToolRunner {
    /// Create a runner without a deadline
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runner that kills tools running longer than `timeout`
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

impl ToolRunner for RealToolRunner {
    fn run(&self, command: &ToolCommand) -> CommandOutput {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);

        let output = match self.timeout {
            None => cmd.output().map(Some),
            Some(timeout) => cmd
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .and_then(|child| wait_with_timeout(child, timeout)),
        };

        match output {
            Ok(Some(output)) => CommandOutput {
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                exit_code: output.status.code().unwrap_or(-1),
                success: output.status.success(),
                timed_out: false,
            },
            Ok(None) => CommandOutput::timeout(self.timeout.unwrap_or_default()),
            Err(e) => CommandOutput::failure(
                -1,
                format!("Failed to execute {}: {e}", command.program.display()),
            ),
        }
    }
}

/// Mock runner for testing
///
/// Behaves like well-mannered codec tools: a successful decode in frame-dump
/// mode writes `frame_bytes` to its `-o` path, digest mode writes a
/// `<name>.md5` side file into its `-o` directory, the encoder writes a
/// bitstream, and the quality tool appends a verdict line to its report.
#[derive(Debug)]
pub struct MockToolRunner {
    /// Bytes written as decoded frames
    pub frame_bytes: Vec<u8>,
    /// Input base names whose decode exits nonzero
    pub failing_decodes: Vec<String>,
    /// Whether the encoder exits nonzero
    pub encode_fails: bool,
    /// Quality verdict to report; `None` writes no report at all
    pub quality_pass: Option<bool>,
    /// Name of the report the quality tool appends to
    pub quality_report_name: String,
    calls: Mutex<Vec<ToolCommand>>,
}

impl Default for MockToolRunner {
    fn default() -> Self {
        Self {
            frame_bytes: b"decoded frames".to_vec(),
            failing_decodes: Vec::new(),
            encode_fails: false,
            quality_pass: Some(true),
            quality_report_name: "jpg_psnr.txt".to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockToolRunner {
    /// Create a new mock runner with default behavior
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the decoded frame content
    #[must_use]
    pub fn with_frame_bytes(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.frame_bytes = bytes.into();
        self
    }

    /// Make decoding of the named input fail
    #[must_use]
    pub fn with_decode_failure(mut self, base_name: impl Into<String>) -> Self {
        self.failing_decodes.push(base_name.into());
        self
    }

    /// Make every encode fail
    #[must_use]
    pub fn with_encode_failure(mut self) -> Self {
        self.encode_fails = true;
        self
    }

    /// Set the quality verdict, or `None` for a tool that writes no report
    #[must_use]
    pub fn with_quality(mut self, pass: Option<bool>) -> Self {
        self.quality_pass = pass;
        self
    }

    /// Commands received so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn decode(&self, command: &ToolCommand) -> std::io::Result<CommandOutput> {
        let input = command.value_of("-i").map(base_name).unwrap_or_default();
        if self.failing_decodes.iter().any(|f| *f == input) {
            return Ok(CommandOutput::failure(1, "decode failed"));
        }
        match (command.value_of("-m"), command.value_of("-o")) {
            (Some("0"), Some(out)) => fs::write(out, &self.frame_bytes)?,
            (Some("-2"), Some(dir)) => {
                fs::write(Path::new(dir).join(format!("{input}.md5")), "0123\n")?;
            }
            _ => {}
        }
        Ok(CommandOutput::success(""))
    }

    fn encode(&self, command: &ToolCommand) -> std::io::Result<CommandOutput> {
        if self.encode_fails {
            return Ok(CommandOutput::failure(1, "encode failed"));
        }
        if let Some(out) = command.value_of("-o") {
            fs::write(out, b"\x00\x00\x00\x01bitstream")?;
        }
        Ok(CommandOutput::success(""))
    }

    fn quality(&self, command: &ToolCommand) -> std::io::Result<CommandOutput> {
        let (Some(pass), Some(candidate)) = (self.quality_pass, command.value_of("-o")) else {
            return Ok(CommandOutput::success(""));
        };
        let candidate = Path::new(candidate);
        let dir = candidate.parent().unwrap_or_else(|| Path::new("."));
        fs::write(format!("{}.txt", candidate.display()), "frame 0, psnr\n")?;
        let mut report = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(&self.quality_report_name))?;
        writeln!(
            report,
            "{}: Y:41.2  U:43.0  V:44.1    {}",
            base_name(&candidate.display().to_string()),
            if pass { "pass" } else { "fail" }
        )?;
        Ok(CommandOutput::success(""))
    }
}

impl ToolRunner for MockToolRunner {
    fn run(&self, command: &ToolCommand) -> CommandOutput {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command.clone());
        }
        let result = match command.kind {
            ToolKind::Decode => self.decode(command),
            ToolKind::Encode => self.encode(command),
            ToolKind::Quality => self.quality(command),
        };
        result.unwrap_or_else(|e| CommandOutput::failure(-1, e.to_string()))
    }
}

fn base_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
