//! Yami QA Report Generator
//!
//! Renders a finished harness run as the legacy timestamped text log,
//! JUnit XML for CI and a JSON summary.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
// Allow common patterns
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::format_push_string)]
#![allow(clippy::needless_raw_string_hashes)]
#![allow(clippy::unused_self)]
// Allow common patterns in test code
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::redundant_clone))]

pub mod error;
pub mod junit;
pub mod summary;
pub mod text;

pub use error::{Error, Result};
pub use junit::JunitReport;
pub use summary::RunSummary;
pub use text::{log_file_name, render, write_log};
