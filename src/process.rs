//! # Subprocess Execution
//!
//! Every interaction with git goes through the [`ProcessRunner`] trait. A
//! runner takes a working directory, an argument vector and a timeout, and
//! always hands back a [`CommandOutput`]: a non-zero exit code is an ordinary
//! result, not a Rust error.
//!
//! Two situations are encoded as distinguished negative exit codes:
//!
//! - [`EXIT_LAUNCH_FAILED`]: the executable could not be started at all.
//! - [`EXIT_TIMED_OUT`]: the process ran past its timeout and was killed,
//!   together with any children it spawned. Output read up to that point is
//!   kept.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, warn};
use wait_timeout::ChildExt;

use crate::defaults;

/// Exit code reported when the executable could not be launched.
pub const EXIT_LAUNCH_FAILED: i32 = -1;

/// Exit code reported when the process exceeded its timeout.
pub const EXIT_TIMED_OUT: i32 = -2;

/// Exit code reported when the process was ended by a signal.
pub const EXIT_TERMINATED: i32 = -3;

/// Environment applied to every subprocess so git never waits on a prompt.
pub const NON_INTERACTIVE_ENV: &[(&str, &str)] = &[
    ("GIT_TERMINAL_PROMPT", "0"),
    ("GIT_ASKPASS", "echo"),
    ("SSH_ASKPASS", "echo"),
    ("GCM_INTERACTIVE", "never"),
    ("LC_ALL", "C"),
];

/// Captured result of one subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self::new(0, stdout, "")
    }

    /// Failed output with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self::new(exit_code, "", stderr)
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn launch_failed(&self) -> bool {
        self.exit_code == EXIT_LAUNCH_FAILED
    }

    pub fn timed_out(&self) -> bool {
        self.exit_code == EXIT_TIMED_OUT
    }

    /// Trimmed stdout.
    pub fn text(&self) -> &str {
        self.stdout.trim()
    }

    /// The last `n` non-empty lines of stderr followed by stdout.
    ///
    /// Used for transcript lines, where the end of the output usually holds
    /// the actual complaint.
    pub fn tail(&self, n: usize) -> String {
        let lines: Vec<&str> = self
            .stderr
            .lines()
            .chain(self.stdout.lines())
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
            .collect();
        let start = lines.len().saturating_sub(n);
        lines[start..].join("\n")
    }
}

/// Runs an external executable and captures its output.
pub trait ProcessRunner: Send + Sync {
    /// Run the executable with `args` in `dir`, killing it after `timeout`.
    fn run(&self, dir: &Path, args: &[&str], timeout: Duration) -> CommandOutput;
}

/// The default runner, spawning a real process for every call.
#[derive(Debug, Clone)]
pub struct SystemProcessRunner {
    program: PathBuf,
}

impl SystemProcessRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, dir: &Path, args: &[&str]) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in NON_INTERACTIVE_ENV {
            command.env(key, value);
        }
        // Own process group, so a timeout can take down helpers git spawned
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        command
    }
}

impl Default for SystemProcessRunner {
    fn default() -> Self {
        Self::new(defaults::GIT_PROGRAM)
    }
}

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, dir: &Path, args: &[&str], timeout: Duration) -> CommandOutput {
        debug!(
            "running {} {} in {}",
            self.program.display(),
            args.join(" "),
            dir.display()
        );

        let mut child = match self.command(dir, args).spawn() {
            Ok(child) => child,
            Err(e) => {
                return CommandOutput::new(
                    EXIT_LAUNCH_FAILED,
                    "",
                    format!("failed to launch {}: {}", self.program.display(), e),
                );
            }
        };

        let stdout = LineCollector::spawn(child.stdout.take());
        let stderr = LineCollector::spawn(child.stderr.take());

        match child.wait_timeout(timeout) {
            Ok(Some(status)) => CommandOutput::new(
                status.code().unwrap_or(EXIT_TERMINATED),
                stdout.finish(),
                stderr.finish(),
            ),
            Ok(None) => {
                terminate(&mut child);
                warn!(
                    "{} {} timed out after {:?} in {}",
                    self.program.display(),
                    args.join(" "),
                    timeout,
                    dir.display()
                );
                let mut err = stderr.snapshot();
                if !err.is_empty() {
                    err.push('\n');
                }
                err.push_str(&format!("timed out after {}s", timeout.as_secs_f64()));
                CommandOutput::new(EXIT_TIMED_OUT, stdout.snapshot(), err)
            }
            Err(e) => {
                terminate(&mut child);
                CommandOutput::new(
                    EXIT_LAUNCH_FAILED,
                    stdout.snapshot(),
                    format!("failed to wait for {}: {}", self.program.display(), e),
                )
            }
        }
    }
}

/// Kill the child and everything in its process group, then reap it.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(pid) = i32::try_from(child.id()) {
            // SAFETY: signalling a process group we created; no memory is touched.
            unsafe {
                libc::kill(-pid, libc::SIGKILL);
            }
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Drains one output pipe on a background thread, line by line.
///
/// Lines are shared so a timed-out call can report whatever arrived before
/// the kill without waiting for the pipe to close.
struct LineCollector {
    lines: Arc<Mutex<Vec<String>>>,
    handle: Option<JoinHandle<()>>,
}

impl LineCollector {
    fn spawn<R: Read + Send + 'static>(pipe: Option<R>) -> Self {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let handle = pipe.map(|pipe| {
            let sink = Arc::clone(&lines);
            thread::spawn(move || {
                let mut reader = BufReader::new(pipe);
                let mut buf = Vec::new();
                loop {
                    buf.clear();
                    match reader.read_until(b'\n', &mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {
                            let line = String::from_utf8_lossy(&buf);
                            let line = line.trim_end_matches(['\n', '\r']).to_string();
                            if let Ok(mut lines) = sink.lock() {
                                lines.push(line);
                            }
                        }
                    }
                }
            })
        });
        Self { lines, handle }
    }

    /// Wait for the pipe to close and return everything read.
    fn finish(mut self) -> String {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.snapshot()
    }

    /// Whatever has been read so far.
    fn snapshot(&self) -> String {
        self.lines
            .lock()
            .map(|lines| lines.join("\n"))
            .unwrap_or_default()
    }
}
