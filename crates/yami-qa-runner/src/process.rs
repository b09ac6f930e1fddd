//! Child process lifecycle for codec tool invocations
//!
//! A tool that hangs must not leave an orphan behind when the harness gives
//! up on it. [`ProcessGuard`] kills and reaps its child on drop unless the
//! child was waited to completion.

use std::io::Read;
use std::process::{Child, ExitStatus, Output};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Interval between `try_wait` polls while a timeout is armed
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// RAII guard that ensures child process cleanup on drop
pub struct ProcessGuard {
    child: Option<Child>,
    pid: u32,
}

impl ProcessGuard {
    /// Create a new process guard from a spawned child
    #[must_use]
    pub fn new(child: Child) -> Self {
        let pid = child.id();
        Self {
            child: Some(child),
            pid,
        }
    }

    /// Wait for the child at most `timeout`
    ///
    /// Returns `Ok(None)` when the deadline passed; the child is then killed
    /// and reaped before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the process has already been consumed or polling fails.
    pub fn wait_timeout(&mut self, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
        let deadline = Instant::now() + timeout;
        loop {
            let child = self
                .child
                .as_mut()
                .ok_or_else(|| std::io::Error::other("Process already consumed"))?;
            if let Some(status) = child.try_wait()? {
                self.child = None;
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                self.kill();
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn kill(&mut self) {
        if let Some(mut child) = self.child.take() {
            tracing::warn!(pid = self.pid, "killing unresponsive tool process");
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Wait for `child` to exit, collecting piped stdout/stderr
///
/// Pipes are drained on helper threads so a chatty tool cannot block on a
/// full pipe while the deadline is being polled. Returns `Ok(None)` on
/// timeout, after the child has been killed, without waiting for the
/// pipes to close.
///
/// # Errors
///
/// Returns an error if waiting on the child fails.
pub fn wait_with_timeout(mut child: Child, timeout: Duration) -> std::io::Result<Option<Output>> {
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let mut guard = ProcessGuard::new(child);
    let Some(status) = guard.wait_timeout(timeout)? else {
        // A grandchild may still hold the pipes open; the drain threads
        // are left to finish on their own.
        return Ok(None);
    };

    Ok(Some(Output {
        status,
        stdout: stdout.map(join_drain).unwrap_or_default(),
        stderr: stderr.map(join_drain).unwrap_or_default(),
    }))
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn join_drain(handle: JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.join().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};

    #[test]
    fn test_process_guard_wait_timeout_completes() {
        let child = Command::new("echo")
            .arg("test")
            .spawn()
            .expect("Failed to spawn");

        let mut guard = ProcessGuard::new(child);
        let status = guard
            .wait_timeout(Duration::from_secs(10))
            .expect("Wait failed");
        assert!(status.is_some_and(|s| s.success()));
        assert!(guard.wait_timeout(Duration::from_secs(1)).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_process_guard_drop_kills() {
        let child = Command::new("sleep")
            .arg("60")
            .spawn()
            .expect("Failed to spawn");

        let pid = child.id();
        drop(ProcessGuard::new(child));

        std::thread::sleep(Duration::from_millis(100));
        assert!(!std::path::Path::new(&format!("/proc/{pid}")).exists());
    }

    #[test]
    fn test_wait_with_timeout_collects_output() {
        let child = Command::new("echo")
            .arg("hello")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("Failed to spawn");

        let output = wait_with_timeout(child, Duration::from_secs(10))
            .expect("Wait failed")
            .expect("echo should not time out");
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("hello"));
    }

    #[cfg(unix)]
    #[test]
    fn test_wait_with_timeout_expires() {
        let child = Command::new("sleep")
            .arg("30")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("Failed to spawn");

        let start = Instant::now();
        let output = wait_with_timeout(child, Duration::from_millis(200)).expect("Wait failed");
        assert!(output.is_none());
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_wait_with_timeout_ignores_grandchild_holding_pipes() {
        // The shell forks `sleep`, which inherits stdout and outlives the kill
        let child = Command::new("sh")
            .args(["-c", "sleep 4; echo done"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("Failed to spawn");

        let start = Instant::now();
        let output = wait_with_timeout(child, Duration::from_millis(200)).expect("Wait failed");
        assert!(output.is_none());
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
