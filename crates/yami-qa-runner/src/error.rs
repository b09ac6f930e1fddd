//! Error types for yami-qa-runner

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that stop a harness run
///
/// A failing codec tool is not an error: it is recorded as a fail verdict.
/// These variants cover preconditions, configuration and I/O the harness
/// itself depends on.
#[derive(Debug, Error)]
pub enum Error {
    /// Input file or directory does not exist
    #[error("Input path does not exist: {}", .0.display())]
    InputNotFound(PathBuf),

    /// File name does not carry a `_<width>x<height>` suffix
    #[error("Cannot infer frame geometry from '{file_name}': {reason}")]
    Geometry {
        /// Offending file name
        file_name: String,
        /// What was wrong with it
        reason: String,
    },

    /// No preset with this name
    #[error("Unknown test mode: {0}")]
    UnknownPreset(String),

    /// Harness configuration could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}
