//! JUnit XML Report Generator
//!
//! Renders a run as a JUnit test suite so CI servers can chart it.
//! Fail verdicts become `<failure>`, inconclusive ones `<skipped>`.

use std::io::Write;
use yami_qa_runner::{ExecutionResult, Outcome, ResultEntry};

use crate::error::Result;

/// JUnit XML report generator
#[derive(Debug)]
pub struct JunitReport {
    /// Test suite name
    suite_name: String,
    /// Test class name
    class_name: String,
}

impl JunitReport {
    /// Create a new JUnit report generator
    #[must_use]
    pub fn new(suite_name: impl Into<String>) -> Self {
        let name = suite_name.into();
        Self {
            class_name: name.clone(),
            suite_name: name,
        }
    }

    /// Set the class name for test cases
    #[must_use]
    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    /// Generate JUnit XML for a run
    ///
    /// # Errors
    ///
    /// Returns an error if XML generation fails.
    pub fn generate(&self, result: &ExecutionResult) -> Result<String> {
        let mut output = Vec::new();
        self.write_xml(&mut output, result)?;
        Ok(String::from_utf8_lossy(&output).to_string())
    }

    /// Write JUnit XML to a writer
    ///
    /// # Errors
    ///
    /// Returns an error if the writer fails.
    pub fn write_xml<W: Write>(&self, writer: &mut W, result: &ExecutionResult) -> Result<()> {
        let agg = &result.aggregator;
        let entries = agg
            .passed
            .iter()
            .map(|e| (e, Outcome::Pass))
            .chain(agg.failed.iter().map(|e| (e, Outcome::Fail)))
            .chain(agg.inconclusive.iter().map(|e| (e, Outcome::Inconclusive)));
        let time = result.duration_ms as f64 / 1000.0;

        writeln!(writer, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        writeln!(
            writer,
            r#"<testsuite name="{}" tests="{}" failures="{}" errors="0" skipped="{}" time="{:.3}" timestamp="{}">"#,
            Self::escape_xml(&self.suite_name),
            agg.judged(),
            agg.fail_count(),
            agg.inconclusive_count(),
            time,
            agg.started_at.format("%Y-%m-%dT%H:%M:%S")
        )?;

        writeln!(writer, "  <properties>")?;
        writeln!(
            writer,
            r#"    <property name="preset" value="{}"/>"#,
            Self::escape_xml(&result.preset)
        )?;
        writeln!(
            writer,
            r#"    <property name="root" value="{}"/>"#,
            Self::escape_xml(&result.root.display().to_string())
        )?;
        writeln!(
            writer,
            r#"    <property name="open" value="{}"/>"#,
            agg.open
        )?;
        writeln!(
            writer,
            r#"    <property name="interrupted" value="{}"/>"#,
            agg.interrupted
        )?;
        writeln!(writer, "  </properties>")?;

        for (entry, outcome) in entries {
            self.write_testcase(writer, entry, outcome)?;
        }

        writeln!(writer, "</testsuite>")?;
        Ok(())
    }

    fn write_testcase<W: Write>(
        &self,
        writer: &mut W,
        entry: &ResultEntry,
        outcome: Outcome,
    ) -> Result<()> {
        let time = entry.duration_ms as f64 / 1000.0;
        writeln!(
            writer,
            r#"  <testcase classname="{}" name="{}" time="{:.3}">"#,
            Self::escape_xml(&self.class_name),
            Self::escape_xml(&entry.descriptor),
            time
        )?;

        match outcome {
            Outcome::Pass => {}
            Outcome::Fail => {
                writeln!(
                    writer,
                    r#"    <failure message="{}" type="VerificationFailure"/>"#,
                    Self::escape_xml(&entry.message)
                )?;
            }
            Outcome::Inconclusive => {
                writeln!(
                    writer,
                    r#"    <skipped message="{}"/>"#,
                    Self::escape_xml(&entry.message)
                )?;
            }
        }

        writeln!(writer, "  </testcase>")?;
        Ok(())
    }

    /// Escape XML special characters
    fn escape_xml(s: &str) -> String {
        s.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&apos;")
    }
}

impl Default for JunitReport {
    fn default() -> Self {
        Self::new("yami-qa")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use yami_qa_runner::{Aggregator, Verdict};

    fn result() -> ExecutionResult {
        let mut aggregator = Aggregator::new();
        for _ in 0..4 {
            aggregator.open_case();
        }
        aggregator.record("clip_352x288.h264", Verdict::pass("md5 ok"), 1500);
        aggregator.record("bad<1>.h264", Verdict::fail("exit code 1 (\"oops\")"), 20);
        aggregator.record("clip_352x288.yuv", Verdict::inconclusive("no report"), 7);
        aggregator.finish(false);
        ExecutionResult {
            preset: "decode".to_string(),
            root: PathBuf::from("/media/conformance"),
            output_dir: PathBuf::from("/tmp/out"),
            aggregator,
            duration_ms: 2500,
        }
    }

    #[test]
    fn test_suite_header_counts() {
        let xml = JunitReport::new("libyami").generate(&result()).unwrap();
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"tests="3" failures="1" errors="0" skipped="1" time="2.500""#));
        assert!(xml.contains(r#"<property name="open" value="4"/>"#));
        assert!(xml.trim_end().ends_with("</testsuite>"));
    }

    #[test]
    fn test_testcases() {
        let xml = JunitReport::new("libyami")
            .with_class_name("yamidecode")
            .generate(&result())
            .unwrap();
        assert_eq!(xml.matches("<testcase ").count(), 3);
        assert!(xml.contains(
            r#"<testcase classname="yamidecode" name="clip_352x288.h264" time="1.500">"#
        ));
        assert!(xml.contains(r#"name="bad&lt;1&gt;.h264""#));
        assert!(xml.contains(r#"<failure message="exit code 1 (&quot;oops&quot;)""#));
        assert!(xml.contains(r#"<skipped message="no report"/>"#));
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(
            JunitReport::escape_xml("<a & 'b'>"),
            "&lt;a &amp; &apos;b&apos;&gt;"
        );
    }

    #[test]
    fn test_default_suite_name() {
        let xml = JunitReport::default().generate(&result()).unwrap();
        assert!(xml.contains(r#"<testsuite name="yami-qa""#));
    }
}
