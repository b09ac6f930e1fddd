//! Harness configuration
//!
//! Tool locations, oracle thresholds and file-name conventions, loadable
//! from YAML. Every field has a default, so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::mode::Toolset;

/// Decode and encode executables of one toolset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPair {
    /// Decode tool
    pub decode: PathBuf,
    /// Encode tool
    pub encode: PathBuf,
}

impl ToolPair {
    fn named(decode: &str, encode: &str) -> Self {
        Self {
            decode: PathBuf::from(decode),
            encode: PathBuf::from(encode),
        }
    }
}

/// Executables for every toolset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Toolsets {
    /// C++ API tools
    pub yami: ToolPair,
    /// C API tools
    pub capi: ToolPair,
    /// V4L2 tools
    pub v4l2: ToolPair,
}

impl Default for Toolsets {
    fn default() -> Self {
        Self {
            yami: ToolPair::named("yamidecode", "yamiencode"),
            capi: ToolPair::named("decodecapi", "encodecapi"),
            v4l2: ToolPair::named("v4l2decode", "v4l2encode"),
        }
    }
}

/// Complete harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Directory prepended to relative tool paths
    pub tools_dir: Option<PathBuf>,
    /// Codec tool executables
    pub toolsets: Toolsets,
    /// Quality-measurement executable
    pub quality_tool: PathBuf,
    /// Threshold passed to the quality tool for encode verification
    pub encode_quality_threshold: f64,
    /// Reference hash file expected next to each decode input
    pub reference_file_name: String,
    /// Report the quality tool appends to, inside the output directory
    pub quality_report_name: String,
    /// Per-invocation deadline in seconds; unset waits forever
    pub timeout_secs: Option<u64>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            tools_dir: None,
            toolsets: Toolsets::default(),
            quality_tool: PathBuf::from("psnr"),
            encode_quality_threshold: 35.0,
            reference_file_name: "bits.md5".to_string(),
            quality_report_name: "jpg_psnr.txt".to_string(),
            timeout_secs: None,
        }
    }
}

impl HarnessConfig {
    /// Load a configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a configuration from a YAML string
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or a value is out of range.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Convert to YAML string
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(Error::from)
    }

    /// Check values that would otherwise fail deep inside a tool invocation
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        if !self.encode_quality_threshold.is_finite() || self.encode_quality_threshold <= 0.0 {
            return Err(Error::Validation(format!(
                "encode_quality_threshold must be a positive number, got {}",
                self.encode_quality_threshold
            )));
        }
        for (field, name) in [
            ("reference_file_name", &self.reference_file_name),
            ("quality_report_name", &self.quality_report_name),
        ] {
            if name.is_empty() || name.contains('/') {
                return Err(Error::Validation(format!(
                    "{field} must be a plain file name, got '{name}'"
                )));
            }
        }
        if self.timeout_secs == Some(0) {
            return Err(Error::Validation(
                "timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Per-invocation deadline
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Resolved decode and encode executables for a toolset
    #[must_use]
    pub fn tools(&self, toolset: Toolset) -> ToolPair {
        let pair = match toolset {
            Toolset::Yami => &self.toolsets.yami,
            Toolset::Capi => &self.toolsets.capi,
            Toolset::V4l2 => &self.toolsets.v4l2,
        };
        ToolPair {
            decode: self.resolve(&pair.decode),
            encode: self.resolve(&pair.encode),
        }
    }

    /// Resolved quality-measurement executable
    #[must_use]
    pub fn quality_tool(&self) -> PathBuf {
        self.resolve(&self.quality_tool)
    }

    fn resolve(&self, tool: &Path) -> PathBuf {
        match &self.tools_dir {
            Some(dir) if tool.is_relative() => dir.join(tool),
            _ => tool.to_path_buf(),
        }
    }
}
