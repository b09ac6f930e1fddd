//! End-to-end tests for the `yami-qa` binary
//!
//! The codec tools are replaced by small shell scripts that honor the same
//! flags: the decoder copies its input to `-o`, the encoder copies raw
//! frames to its bitstream, and the quality tool appends a report line.

#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::{TempDir, tempdir};
use yami_qa_runner::compute_md5;

const ARG_LOOP: &str = r#"
while [ $# -gt 0 ]; do
  case "$1" in
    -i) input="$2" ;;
    -o) output="$2" ;;
    -m) mode="$2" ;;
  esac
  shift 2
done
"#;

const DECODER: &str = r#"
case "$(basename "$input")" in broken*) echo "unsupported stream" >&2; exit 1 ;; esac
if [ "$mode" = "0" ] && [ -n "$output" ]; then cp "$input" "$output"; fi
if [ "$mode" = "-2" ] && [ -n "$output" ]; then echo "digest" > "$output/$(basename "$input").md5"; fi
exit 0
"#;

const ENCODER: &str = r#"
cp "$input" "$output"
"#;

const QUALITY: &str = r#"
name="$(basename "$output")"
verdict=pass
case "$name" in lossy*) verdict=fail ;; esac
echo "frame 0" > "$output.txt"
echo "$name: Y:41.2  U:43.0  V:44.1    $verdict" >> "$(dirname "$output")/jpg_psnr.txt"
"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let ws = Self { dir };
        fs::create_dir_all(ws.media()).unwrap();
        fs::create_dir_all(ws.bin()).unwrap();
        ws.tool("yamidecode", DECODER);
        ws.tool("yamiencode", ENCODER);
        ws.tool("psnr", QUALITY);
        ws
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    fn media(&self) -> PathBuf {
        self.path("media")
    }

    fn bin(&self) -> PathBuf {
        self.path("bin")
    }

    fn out(&self) -> PathBuf {
        self.path("out")
    }

    fn logs(&self) -> PathBuf {
        self.path("log")
    }

    fn tool(&self, name: &str, body: &str) {
        let path = self.bin().join(name);
        fs::write(&path, format!("#!/bin/sh\n{ARG_LOOP}{body}")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn file(&self, rel: &str, content: &[u8]) -> PathBuf {
        let path = self.media().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn run(&self, mode: &str, extra: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_yami-qa"))
            .current_dir(self.dir.path())
            .arg("run")
            .arg(self.media())
            .arg(mode)
            .arg(self.out())
            .arg("--tools-dir")
            .arg(self.bin())
            .arg("--log-dir")
            .arg(self.logs())
            .arg("--timeout-secs")
            .arg("30")
            .args(extra)
            .env("RUST_LOG", "warn")
            .output()
            .unwrap()
    }

    fn log(&self) -> String {
        let mut logs: Vec<_> = fs::read_dir(self.logs())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(logs.len(), 1, "expected a single run log");
        fs::read_to_string(logs.pop().unwrap()).unwrap()
    }

    fn out_files(&self) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(self.out())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}

fn md5_of(path: &Path) -> String {
    compute_md5(path).unwrap()
}

#[test]
fn test_missing_path_exits_nonzero_before_traversal() {
    let ws = Workspace::new();
    let output = Command::new(env!("CARGO_BIN_EXE_yami-qa"))
        .current_dir(ws.dir.path())
        .args(["run", "/no/such/media", "decode"])
        .arg(ws.out())
        .arg("--log-dir")
        .arg(ws.logs())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
    assert!(!ws.logs().exists());
    assert!(!ws.out().exists());
}

#[test]
fn test_decode_run_writes_legacy_log() {
    let ws = Workspace::new();
    let good = ws.file("avc/good_352x288.h264", b"good stream");
    ws.file("avc/broken_176x144.h264", b"broken stream");
    ws.file("avc/raw_176x144.yuv", b"raw frames");
    ws.file(
        "avc/bits.md5",
        format!(
            "{}  good_352x288.h264\n0000  broken_176x144.h264\n",
            md5_of(&good)
        )
        .as_bytes(),
    );

    let output = ws.run("decode", &[]);
    assert!(output.status.success(), "{output:?}");

    let log = ws.log();
    assert!(log.starts_with("libyami decode result:\nopen:2,    pass:1,    fail:1\n"));
    assert!(log.contains("\n\nfail files:\nbroken_176x144.h264\n"));
    assert!(log.contains("\n\npass files:\ngood_352x288.h264\n"));
    assert!(ws.out_files().is_empty());
}

#[test]
fn test_decode_with_explicit_reference_and_junit() {
    let ws = Workspace::new();
    let clip = ws.file("clip.h264", b"stream");
    let reference = ws.path("refs.md5");
    fs::write(&reference, format!("{} *clip.h264\n", md5_of(&clip))).unwrap();
    let junit = ws.path("reports/junit.xml");

    let output = ws.run(
        "decode",
        &[
            "--md5",
            reference.to_str().unwrap(),
            "--junit",
            junit.to_str().unwrap(),
        ],
    );
    assert!(output.status.success(), "{output:?}");

    let xml = fs::read_to_string(junit).unwrap();
    assert!(xml.contains(r#"tests="1" failures="0""#));
    assert!(xml.contains(r#"name="clip.h264""#));
}

#[test]
fn test_encode_round_trip_keeps_inputs() {
    let ws = Workspace::new();
    let raw = ws.file("clean_352x288.yuv", b"raw frames");
    ws.file("lossy_176x144.yuv", b"raw frames");
    ws.file("notes.h264", b"not raw");
    let json = ws.path("summary.json");

    let output = ws.run("encode", &["--json", json.to_str().unwrap()]);
    assert!(output.status.success(), "{output:?}");

    let log = ws.log();
    assert!(log.starts_with("libyami encode result:\nopen:2,    pass:1,    fail:1\n"));
    assert!(log.contains("fail files:\nlossy_176x144.yuv\n"));
    assert!(raw.exists());
    assert!(ws.out_files().is_empty());

    let summary = fs::read_to_string(json).unwrap();
    assert!(summary.contains(r#""preset": "encode""#));
}

#[test]
fn test_save_mode_keeps_artifacts() {
    let ws = Workspace::new();
    ws.file("clip.h264", b"stream");

    let output = ws.run("decode-full", &["--save"]);
    assert!(output.status.success(), "{output:?}");

    assert_eq!(ws.out_files(), ["clip.h264", "clip.h264.md5"]);
    let log = ws.log();
    assert!(log.contains("open:2,    pass:2,    fail:0"));
    assert!(log.contains("yamidecode clip.h264 -m -2"));
}

#[test]
fn test_unknown_mode_is_rejected() {
    let ws = Workspace::new();
    ws.file("clip.h264", b"stream");
    let output = ws.run("mpeg2", &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("mpeg2"));
}

#[test]
fn test_presets_and_geometry_commands() {
    let presets = Command::new(env!("CARGO_BIN_EXE_yami-qa"))
        .arg("presets")
        .output()
        .unwrap();
    assert!(presets.status.success());
    let text = String::from_utf8_lossy(&presets.stdout);
    assert!(text.contains("decode-full"));
    assert!(text.contains("v4l2"));
    assert!(text.contains("v4l2-render"));

    let geometry = Command::new(env!("CARGO_BIN_EXE_yami-qa"))
        .args(["geometry", "foreman_cif_176x144.I420"])
        .output()
        .unwrap();
    assert!(geometry.status.success());
    assert_eq!(String::from_utf8_lossy(&geometry.stdout).trim(), "176x144");

    let bad = Command::new(env!("CARGO_BIN_EXE_yami-qa"))
        .args(["geometry", "foreman.yuv"])
        .output()
        .unwrap();
    assert_eq!(bad.status.code(), Some(1));
}
