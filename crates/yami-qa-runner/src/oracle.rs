//! Correctness oracles
//!
//! Decode results are judged against a reference hash file; encode results
//! against the report the quality tool leaves behind. Both oracles parse
//! their input into records and match on exact file names, never on
//! substrings of whole lines.

use md5::{Digest, Md5};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::evidence::Verdict;

/// Compute the lowercase hex MD5 of a file
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn compute_md5(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Md5::new();

    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    let result = hasher.finalize();
    Ok(format!("{result:x}"))
}

/// Expected digests keyed by file name
///
/// Each line is split on whitespace. The first token made only of hex
/// digits is the digest; every other token names a file that digest
/// belongs to, with a leading `*` (binary-mode marker) and any directory
/// prefix removed. Lines without a hex token are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceRecord {
    digests: HashMap<String, Vec<String>>,
}

impl ReferenceRecord {
    /// Parse reference text
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut digests: HashMap<String, Vec<String>> = HashMap::new();
        for line in text.lines() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let Some(hash_at) = tokens.iter().position(|t| is_hex(t)) else {
                continue;
            };
            let hash = tokens[hash_at].to_ascii_lowercase();
            for (i, token) in tokens.iter().enumerate() {
                if i == hash_at {
                    continue;
                }
                let name = token.trim_start_matches('*');
                let name = name.rsplit('/').next().unwrap_or(name);
                if name.is_empty() {
                    continue;
                }
                let entry = digests.entry(name.to_string()).or_default();
                if !entry.contains(&hash) {
                    entry.push(hash.clone());
                }
            }
        }
        Self { digests }
    }

    /// Read and parse a reference file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    /// Digests recorded for `file_name`
    #[must_use]
    pub fn expected(&self, file_name: &str) -> &[String] {
        self.digests.get(file_name).map_or(&[], Vec::as_slice)
    }

    /// Whether `digest` is recorded for `file_name` (hex case ignored)
    #[must_use]
    pub fn matches(&self, file_name: &str, digest: &str) -> bool {
        self.expected(file_name)
            .iter()
            .any(|h| h.eq_ignore_ascii_case(digest))
    }

    /// Number of distinct file names
    #[must_use]
    pub fn len(&self) -> usize {
        self.digests.len()
    }

    /// Whether no line carried a digest
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

fn is_hex(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Reference files parsed once per run
#[derive(Debug, Default)]
pub struct ReferenceCache {
    records: HashMap<PathBuf, Option<ReferenceRecord>>,
}

impl ReferenceCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parsed record at `path`, or `None` if it is missing or unreadable
    pub fn get(&mut self, path: &Path) -> Option<&ReferenceRecord> {
        self.records
            .entry(path.to_path_buf())
            .or_insert_with(|| match ReferenceRecord::load(path) {
                Ok(record) => {
                    tracing::debug!(path = %path.display(), files = record.len(), "loaded reference hashes");
                    Some(record)
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), "reference file unavailable: {e}");
                    None
                }
            })
            .as_ref()
    }

    /// Number of reference files seen so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been looked up yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Judge a frame dump against the reference record
#[must_use]
pub fn judge_digest(
    record: Option<&ReferenceRecord>,
    reference_path: &Path,
    base_name: &str,
    artifact: &Path,
) -> Verdict {
    let Some(record) = record else {
        return Verdict::inconclusive(format!(
            "reference file {} not found",
            reference_path.display()
        ));
    };
    let digest = match compute_md5(artifact) {
        Ok(d) => d,
        Err(e) => {
            return Verdict::fail(format!("no output to hash at {}: {e}", artifact.display()));
        }
    };
    if record.expected(base_name).is_empty() {
        return Verdict::fail(format!(
            "no reference digest for {base_name} (got {digest})"
        ));
    }
    Verdict::from_bool(
        record.matches(base_name, &digest),
        format!("md5 {digest}"),
    )
}

/// One line of a quality report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityLine {
    /// File the line is about, when it starts with `<name>:`
    pub subject: Option<String>,
    /// Whether the line reports a pass
    pub passed: bool,
    /// The line as written
    pub raw: String,
}

impl QualityLine {
    fn parse(line: &str) -> Self {
        let subject = line
            .split_once(':')
            .map(|(name, _)| name.trim().to_string())
            .filter(|name| !name.is_empty() && !name.contains(char::is_whitespace));
        Self {
            subject,
            passed: !line.contains("fail"),
            raw: line.to_string(),
        }
    }

    fn concerns(&self, candidate: &str) -> bool {
        match &self.subject {
            Some(subject) => subject == candidate,
            None => self
                .raw
                .split_whitespace()
                .any(|t| t.rsplit('/').next() == Some(candidate)),
        }
    }
}

/// Parsed quality report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QualityReport {
    lines: Vec<QualityLine>,
}

impl QualityReport {
    /// Parse report text, skipping blank lines
    #[must_use]
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(QualityLine::parse)
                .collect(),
        }
    }

    /// Read the part of a report written after byte `offset`
    ///
    /// `Ok(None)` if the file is missing or nothing was appended past
    /// `offset`. A file shorter than `offset` was rewritten and is read
    /// whole.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load(path: &Path, offset: u64) -> Result<Option<Self>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let fresh = usize::try_from(offset)
            .ok()
            .and_then(|start| bytes.get(start..))
            .unwrap_or(&bytes[..]);
        if fresh.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self::parse(&String::from_utf8_lossy(fresh))))
    }

    /// Latest line about `candidate`
    #[must_use]
    pub fn latest_for(&self, candidate: &str) -> Option<&QualityLine> {
        self.lines.iter().rev().find(|l| l.concerns(candidate))
    }

    /// Parsed lines in file order
    #[must_use]
    pub fn lines(&self) -> &[QualityLine] {
        &self.lines
    }
}

/// Judge an encode round trip from the quality report
///
/// Only lines written past `offset`, the report length before the quality
/// tool ran, are considered.
#[must_use]
pub fn judge_quality(report_path: &Path, offset: u64, candidate: &str) -> Verdict {
    let report = match QualityReport::load(report_path, offset) {
        Ok(Some(report)) => report,
        Ok(None) => {
            return Verdict::inconclusive(format!(
                "quality report {} not written",
                report_path.display()
            ));
        }
        Err(e) => return Verdict::inconclusive(format!("quality report unreadable: {e}")),
    };
    match report.latest_for(candidate) {
        Some(line) => Verdict::from_bool(line.passed, line.raw.trim().to_string()),
        None => Verdict::inconclusive(format!("no quality result for {candidate}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::Outcome;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::tempdir;

    const ABC_MD5: &str = "900150983cd24fb0d6963f7d28e17f72";

    #[test]
    fn test_compute_md5() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frames");
        fs::write(&path, b"abc").unwrap();
        assert_eq!(compute_md5(&path).unwrap(), ABC_MD5);
    }

    #[test]
    fn test_compute_md5_missing() {
        assert!(compute_md5(Path::new("/nonexistent/frames")).is_err());
    }

    #[test]
    fn test_reference_formats() {
        let text = "\
900150983CD24FB0D6963F7D28E17F72  clip_352x288.h264\n\
d41d8cd98f00b204e9800998ecf8427e *streams/empty.h264\n\
frame.h264 0123abcd whole\n\
no digest on this line\n\
\n";
        let record = ReferenceRecord::parse(text);
        assert!(record.matches("clip_352x288.h264", ABC_MD5));
        assert!(record.matches("empty.h264", "d41d8cd98f00b204e9800998ecf8427e"));
        assert!(record.matches("frame.h264", "0123ABCD"));
        assert!(!record.matches("clip_352x288.h264", "0123abcd"));
        assert!(record.expected("missing.h264").is_empty());
        assert_eq!(record.len(), 4);
    }

    #[test]
    fn test_reference_matches_exact_name_only() {
        let record = ReferenceRecord::parse(&format!("{ABC_MD5} clip.h264.bak\n"));
        assert!(!record.matches("clip.h264", ABC_MD5));
        assert!(record.matches("clip.h264.bak", ABC_MD5));
    }

    #[test]
    fn test_reference_several_digests_per_file() {
        let record = ReferenceRecord::parse("aa clip.h264\nbb clip.h264\naa clip.h264\n");
        assert_eq!(record.expected("clip.h264"), ["aa", "bb"]);
    }

    #[test]
    fn test_reference_cache_loads_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bits.md5");
        fs::write(&path, format!("{ABC_MD5} clip.h264\n")).unwrap();

        let mut cache = ReferenceCache::new();
        assert!(cache.get(&path).is_some());
        fs::remove_file(&path).unwrap();
        assert!(cache.get(&path).unwrap().matches("clip.h264", ABC_MD5));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&dir.path().join("other.md5")).is_none());
    }

    #[test]
    fn test_judge_digest_outcomes() {
        let dir = tempdir().unwrap();
        let artifact = dir.path().join("clip.h264");
        fs::write(&artifact, b"abc").unwrap();
        let reference = dir.path().join("bits.md5");
        let good = ReferenceRecord::parse(&format!("{ABC_MD5} clip.h264 whole\n"));
        let bad = ReferenceRecord::parse("0123 clip.h264\n");

        let v = judge_digest(Some(&good), &reference, "clip.h264", &artifact);
        assert_eq!(v.outcome, Outcome::Pass);
        let v = judge_digest(Some(&bad), &reference, "clip.h264", &artifact);
        assert_eq!(v.outcome, Outcome::Fail);
        let v = judge_digest(Some(&good), &reference, "other.h264", &artifact);
        assert_eq!(v.outcome, Outcome::Fail);
        let v = judge_digest(None, &reference, "clip.h264", &artifact);
        assert_eq!(v.outcome, Outcome::Inconclusive);
        let v = judge_digest(Some(&good), &reference, "clip.h264", &dir.path().join("gone"));
        assert_eq!(v.outcome, Outcome::Fail);
    }

    #[test]
    fn test_judge_digest_is_repeatable() {
        let dir = tempdir().unwrap();
        let artifact = dir.path().join("clip_352x288.h264");
        fs::write(&artifact, b"abc").unwrap();
        let reference = dir.path().join("bits.md5");
        let text = format!("{ABC_MD5} clip_352x288.h264 whole\n0123abcd other.h264\n");
        fs::write(&reference, &text).unwrap();

        let mut cache = ReferenceCache::new();
        for name in ["clip_352x288.h264", "other.h264"] {
            let first = judge_digest(cache.get(&reference), &reference, name, &artifact);
            let second = judge_digest(cache.get(&reference), &reference, name, &artifact);
            assert_eq!(first, second);
        }
        let verdict = judge_digest(cache.get(&reference), &reference, "clip_352x288.h264", &artifact);
        assert_eq!(verdict.outcome, Outcome::Pass);
        assert_eq!(fs::read_to_string(&reference).unwrap(), text);
        assert_eq!(fs::read(&artifact).unwrap(), b"abc");
    }

    #[test]
    fn test_quality_report_latest_line_wins() {
        let report = QualityReport::parse(
            "clip_352x288.yuv: Y:20.1  U:30.0  V:30.0    fail\n\
             other_176x144.yuv: Y:45.0  U:45.0  V:45.0    pass\n\
             clip_352x288.yuv: Y:41.2  U:43.0  V:44.1    pass\n",
        );
        assert_eq!(report.lines().len(), 3);
        assert!(report.latest_for("clip_352x288.yuv").unwrap().passed);
        assert!(report.latest_for("other_176x144.yuv").unwrap().passed);
        assert!(report.latest_for("third_1x1.yuv").is_none());
    }

    #[test]
    fn test_quality_report_unlabeled_failure_line() {
        let report = QualityReport::parse("open /out/clip_352x288.yuv fail\n");
        let line = report.latest_for("clip_352x288.yuv").unwrap();
        assert!(!line.passed);
        assert!(line.subject.is_none());
    }

    #[test]
    fn test_judge_quality_outcomes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jpg_psnr.txt");

        let v = judge_quality(&path, 0, "clip_352x288.yuv");
        assert_eq!(v.outcome, Outcome::Inconclusive);

        fs::write(&path, "clip_352x288.yuv: Y:41.2  U:43.0  V:44.1    pass\n").unwrap();
        assert_eq!(judge_quality(&path, 0, "clip_352x288.yuv").outcome, Outcome::Pass);
        assert_eq!(
            judge_quality(&path, 0, "other_1x1.yuv").outcome,
            Outcome::Inconclusive
        );

        fs::write(&path, "clip_352x288.yuv: Y:12.0  U:43.0  V:44.1    fail\n").unwrap();
        let v = judge_quality(&path, 0, "clip_352x288.yuv");
        assert_eq!(v.outcome, Outcome::Fail);
        assert!(v.message.contains("Y:12.0"));
    }

    #[test]
    fn test_judge_quality_ignores_lines_before_offset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jpg_psnr.txt");
        let earlier = "clip_352x288.yuv: Y:41.2  U:43.0  V:44.1    pass\n";
        fs::write(&path, earlier).unwrap();
        let offset = earlier.len() as u64;

        // nothing appended since the offset
        let v = judge_quality(&path, offset, "clip_352x288.yuv");
        assert_eq!(v.outcome, Outcome::Inconclusive);

        let mut text = earlier.to_string();
        text.push_str("other_176x144.yuv: Y:45.0  U:45.0  V:45.0    pass\n");
        fs::write(&path, &text).unwrap();
        let v = judge_quality(&path, offset, "clip_352x288.yuv");
        assert_eq!(v.outcome, Outcome::Inconclusive);

        text.push_str("clip_352x288.yuv: Y:20.0  U:43.0  V:44.1    fail\n");
        fs::write(&path, &text).unwrap();
        assert_eq!(judge_quality(&path, offset, "clip_352x288.yuv").outcome, Outcome::Fail);

        // a report rewritten shorter than the offset is read whole
        fs::write(&path, "clip_352x288.yuv: pass\n").unwrap();
        assert_eq!(judge_quality(&path, offset, "clip_352x288.yuv").outcome, Outcome::Pass);
    }

    proptest! {
        #[test]
        fn prop_reference_parse_is_idempotent(text in "[0-9a-fA-F* ./a-z\n]{0,200}") {
            prop_assert_eq!(ReferenceRecord::parse(&text), ReferenceRecord::parse(&text));
        }

        #[test]
        fn prop_md5sum_lines_always_match(
            name in "[a-z][a-z0-9_]{0,10}\\.h264",
            digest in "[0-9a-f]{32}",
        ) {
            let record = ReferenceRecord::parse(&format!("{digest}  {name}\n"));
            prop_assert!(record.matches(&name, &digest.to_ascii_uppercase()));
        }
    }
}
