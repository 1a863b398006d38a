//! Child process execution with timeout and cancellation.
//!
//! [`ProcessRunner`] is the production [`CommandRunner`]. It captures the
//! child's output on background threads so a chatty process never blocks on a
//! full pipe while the runner polls it.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::{ManagerError, ManagerResult};
use super::traits::CommandRunner;

/// Default timeout for a single install invocation (10 minutes).
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

/// How often the runner polls a running child.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Render a command line for logs and error messages.
pub fn render_command(program: &Path, args: &[String]) -> String {
    let mut rendered = program.display().to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(arg);
    }
    rendered
}

/// Runs commands as child processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
    poll_interval: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner {
    /// Create a runner with the default timeout.
    pub fn new() -> Self {
        Self {
            timeout: Some(DEFAULT_COMMAND_TIMEOUT),
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Set the per-command timeout. `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wait for the child, enforcing timeout and cancellation.
    fn wait(
        &self,
        child: &mut Child,
        command: &str,
        cancel: &CancellationToken,
    ) -> ManagerResult<ExitStatus> {
        let started = Instant::now();

        loop {
            let polled = child.try_wait().map_err(|e| ManagerError::SpawnFailed {
                program: command.to_string(),
                source: e,
            })?;
            if let Some(status) = polled {
                return Ok(status);
            }

            if cancel.is_cancelled() {
                terminate(child, command);
                return Err(ManagerError::Cancelled);
            }

            if let Some(timeout) = self.timeout {
                if started.elapsed() >= timeout {
                    terminate(child, command);
                    return Err(ManagerError::Timeout {
                        operation: format!("`{}`", command),
                        timeout_secs: timeout.as_secs(),
                    });
                }
            }

            thread::sleep(self.poll_interval);
        }
    }
}

impl CommandRunner for ProcessRunner {
    fn run(
        &self,
        program: &Path,
        args: &[String],
        cancel: &CancellationToken,
    ) -> ManagerResult<()> {
        let command = render_command(program, args);
        if cancel.is_cancelled() {
            return Err(ManagerError::Cancelled);
        }

        debug!(command = %command, "Running command");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ManagerError::SpawnFailed {
                program: program.display().to_string(),
                source: e,
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = self.wait(&mut child, &command, cancel)?;
        let stdout = collect(stdout);
        let stderr = collect(stderr);

        if !stdout.is_empty() {
            debug!(command = %command, output = %stdout, "Command output");
        }

        if status.success() {
            Ok(())
        } else {
            Err(ManagerError::CommandFailed {
                command,
                status: status.code(),
                stderr,
            })
        }
    }
}

/// Kill and reap a child that is being abandoned.
fn terminate(child: &mut Child, command: &str) {
    if let Err(e) = child.kill() {
        warn!(command = %command, error = %e, "Failed to kill child process");
    }
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = pipe.read_to_end(&mut buffer);
            String::from_utf8_lossy(&buffer).trim().to_string()
        })
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}
