//! Plain-text run log
//!
//! The log keeps the layout existing result scrapers expect: a title line,
//! one count line, then the fail and pass sections, each entry on its own
//! line in recording order. Inconclusive results only appear when there
//! are some.

use chrono::{DateTime, Local};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use yami_qa_runner::{Aggregator, ResultEntry};

use crate::error::Result;

/// Render the log body for a finished run
#[must_use]
pub fn render(title: &str, aggregator: &Aggregator) -> String {
    let mut out = String::new();
    out.push_str(&format!("{title} result:\n"));
    out.push_str(&format!(
        "open:{},    pass:{},    fail:{}\n",
        aggregator.open,
        aggregator.pass_count(),
        aggregator.fail_count()
    ));
    if aggregator.inconclusive_count() > 0 {
        out.push_str(&format!(
            "inconclusive:{}\n",
            aggregator.inconclusive_count()
        ));
    }
    if aggregator.interrupted {
        out.push_str("interrupted: partial results\n");
    }
    section(&mut out, "fail files", &aggregator.failed);
    section(&mut out, "pass files", &aggregator.passed);
    if !aggregator.inconclusive.is_empty() {
        section(&mut out, "inconclusive files", &aggregator.inconclusive);
    }
    out
}

fn section(out: &mut String, heading: &str, entries: &[ResultEntry]) {
    out.push_str(&format!("\n\n{heading}:\n"));
    for entry in entries {
        out.push_str(&entry.descriptor);
        out.push('\n');
    }
}

/// `test-result-<local time>.log`
#[must_use]
pub fn log_file_name(at: DateTime<Local>) -> String {
    at.format("test-result-%Y-%m-%d-%H-%M-%S.log").to_string()
}

/// Append the rendered log to a timestamped file under `log_dir`
///
/// Runs finishing within the same second share a file; each appends its
/// own block.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file written.
pub fn write_log(log_dir: &Path, title: &str, aggregator: &Aggregator) -> Result<PathBuf> {
    fs::create_dir_all(log_dir)?;
    let path = log_dir.join(log_file_name(Local::now()));
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    file.write_all(render(title, aggregator).as_bytes())?;
    tracing::debug!(path = %path.display(), "wrote run log");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;
    use yami_qa_runner::Verdict;

    fn sample() -> Aggregator {
        let mut agg = Aggregator::new();
        for _ in 0..3 {
            agg.open_case();
        }
        agg.record("a_352x288.h264", Verdict::pass("md5 ok"), 5);
        agg.record("b_176x144.h264", Verdict::fail("exit code 1"), 5);
        agg.record("c_176x144.h264", Verdict::pass("md5 ok"), 5);
        agg
    }

    #[test]
    fn test_render_legacy_layout() {
        let text = render("libyami decode", &sample());
        assert_eq!(
            text,
            "libyami decode result:\n\
             open:3,    pass:2,    fail:1\n\
             \n\nfail files:\n\
             b_176x144.h264\n\
             \n\npass files:\n\
             a_352x288.h264\n\
             c_176x144.h264\n"
        );
    }

    #[test]
    fn test_render_inconclusive_section() {
        let mut agg = sample();
        agg.open_case();
        agg.record("d_1x1.yuv", Verdict::inconclusive("no report"), 1);
        let text = render("libyami encode", &agg);
        assert!(text.contains("open:4,    pass:2,    fail:1\ninconclusive:1\n"));
        assert!(text.ends_with("\n\ninconclusive files:\nd_1x1.yuv\n"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let agg = sample();
        assert_eq!(render("x", &agg), render("x", &agg));
    }

    #[test]
    fn test_log_file_name() {
        let at = Local.with_ymd_and_hms(2016, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(log_file_name(at), "test-result-2016-03-07-09-05-01.log");
    }

    #[test]
    fn test_write_log_appends() {
        let dir = tempdir().unwrap();
        let log_dir = dir.path().join("log");
        let first = write_log(&log_dir, "libyami decode", &sample()).unwrap();
        assert!(first.starts_with(&log_dir));
        let content = fs::read_to_string(&first).unwrap();
        assert!(content.starts_with("libyami decode result:\n"));

        write_log(&log_dir, "libyami decode", &sample()).unwrap();
        let blocks: usize = fs::read_dir(&log_dir)
            .unwrap()
            .map(|e| fs::read_to_string(e.unwrap().path()).unwrap())
            .map(|c| c.matches("libyami decode result:").count())
            .sum();
        assert_eq!(blocks, 2);
    }
}
