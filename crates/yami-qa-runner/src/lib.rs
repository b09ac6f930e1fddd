//! Yami QA Runner
//!
//! Regression harness core for the libyami codec tools.
//! Walks a media tree, drives the decode/encode/quality tools one case at a
//! time and judges each case against reference hashes or a quality report.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
// Allow common patterns
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::module_name_repetitions)]
// Allow common patterns in test code
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::redundant_clone))]
#![cfg_attr(test, allow(clippy::uninlined_format_args))]

pub mod artifact;
pub mod command;
pub mod config;
pub mod error;
pub mod evidence;
pub mod executor;
pub mod invocation;
pub mod media;
pub mod mode;
pub mod oracle;
pub mod process;

pub use artifact::ArtifactSet;
pub use command::{
    CommandOutput, MockToolRunner, RealToolRunner, ToolCommand, ToolKind, ToolRunner,
};
pub use config::{HarnessConfig, ToolPair, Toolsets};
pub use error::{Error, Result};
pub use evidence::{Aggregator, Outcome, ResultEntry, Verdict};
pub use executor::{ExecutionConfig, ExecutionResult, Executor};
pub use invocation::{InvocationAdapter, QualityRun};
pub use media::{Geometry, MediaRole, MediaWalk, TestItem, discover, parse_geometry};
pub use mode::{
    ComparePolicy, Direction, PRESETS, PassSpec, PixelFormat, Preset, ReferenceSource, Submode,
    TestPlan, Toolset, preset,
};
pub use oracle::{
    QualityLine, QualityReport, ReferenceCache, ReferenceRecord, compute_md5, judge_digest,
    judge_quality,
};
pub use process::ProcessGuard;
