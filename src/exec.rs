//! Run administrative tools as subprocesses
//!
//! Every child is held by a [`ChildGuard`] that kills and reaps it if it is dropped before
//! exiting, so no subprocess outlives an error or a timeout.

use std::{
    ffi::OsString,
    io::{self, Write},
    process::{Child, ChildStdin, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use log::{debug, warn};

use crate::{
    error::{Error, Result, find_error_message},
    pump::{Chunk, Pump},
};

/// Locale pinned for every subprocess so their messages can be matched reliably
pub(crate) const LOCALE_ENV: [(&str, &str); 2] = [("LANG", "C"), ("LC_ALL", "C")];

/// Default overall deadline for a subprocess
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const WAIT_INTERVAL: Duration = Duration::from_millis(10);

/// Captured result of a one-shot command
#[derive(Clone, Debug)]
pub(crate) struct Output {
    pub(crate) status: ExitStatus,
    pub(crate) stdout: String,
    pub(crate) stderr: String,
}

impl Output {
    pub(crate) fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, `None` when terminated by a signal
    pub(crate) fn code(&self) -> Option<i32> {
        self.status.code()
    }

    /// First non-warning diagnostic line written to standard error
    pub(crate) fn error_message(&self) -> Option<&str> {
        find_error_message(&self.stderr)
    }

    /// Build an [`Error::Admin`] for this output
    pub(crate) fn to_error(&self, tool: &str) -> Error {
        let message = self
            .error_message()
            .unwrap_or("no error message reported")
            .to_owned();
        Error::admin(tool, message, self.code())
    }
}

/// Builder for a one-shot command
#[derive(Clone, Debug)]
pub(crate) struct Cmd {
    tool: String,
    program: OsString,
    args: Vec<OsString>,
    input: Option<String>,
    timeout: Duration,
}

impl Cmd {
    /// `tool` names the command in errors, `program` is what gets executed
    pub(crate) fn new(tool: &str, program: impl Into<OsString>) -> Self {
        Self {
            tool: tool.to_owned(),
            program: program.into(),
            args: Vec::new(),
            input: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub(crate) fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub(crate) fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Data written to the child's standard input before it is closed
    pub(crate) fn input(mut self, input: Option<String>) -> Self {
        self.input = input;
        self
    }

    pub(crate) fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[cfg(test)]
    pub(crate) fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Run the command to completion and capture its output
    ///
    /// A non-zero exit status is not an error here, callers decide what it means.
    pub(crate) fn run(self) -> Result<Output> {
        let deadline = Instant::now() + self.timeout;
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(LOCALE_ENV)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("Executing {}: {:?} {:?}", self.tool, self.program, self.args);
        let mut child = ChildGuard::spawn(&self.tool, &mut command)?;

        let stdin = child.take_stdin();
        if let (Some(mut stdin), Some(input)) = (stdin, &self.input) {
            match stdin.write_all(input.as_bytes()) {
                Ok(()) => {}
                // The tool may exit before reading its input
                Err(error) if error.kind() == io::ErrorKind::BrokenPipe => {}
                Err(error) => {
                    return Err(Error::admin(
                        &self.tool,
                        format!("failed to write to standard input: {error}"),
                        None,
                    ));
                }
            }
        }

        let mut pump = child.pump()?;
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        loop {
            match pump.next(deadline) {
                Ok(Some(Chunk::Stdout(data))) => stdout.extend(data),
                Ok(Some(Chunk::Stderr(data))) => stderr.extend(data),
                Ok(None) => break,
                Err(error) => return Err(child.io_error(error, self.timeout)),
            }
        }
        let status = child.wait(deadline, self.timeout)?;

        Ok(Output {
            status,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

/// Owns a running child, killing it on drop unless it was reaped
#[derive(Debug)]
pub(crate) struct ChildGuard {
    tool: String,
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    pub(crate) fn spawn(tool: &str, command: &mut Command) -> Result<Self> {
        let child = command.spawn().map_err(|error| {
            Error::admin(
                tool,
                format!("failed to execute {:?}: {error}", command.get_program()),
                None,
            )
        })?;
        Ok(Self {
            tool: tool.to_owned(),
            child,
            reaped: false,
        })
    }

    pub(crate) fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    /// Take the output pipes. Can only be called once.
    pub(crate) fn pump(&mut self) -> Result<Pump> {
        match (self.child.stdout.take(), self.child.stderr.take()) {
            (Some(stdout), Some(stderr)) => Ok(Pump::new(stdout, stderr)),
            _ => Err(Error::admin(
                &self.tool,
                "output streams are not available",
                None,
            )),
        }
    }

    /// Wait for the child to exit, killing it if `deadline` passes first
    pub(crate) fn wait(&mut self, deadline: Instant, timeout: Duration) -> Result<ExitStatus> {
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    self.reaped = true;
                    return Ok(status);
                }
                Ok(None) => {}
                Err(error) => {
                    return Err(Error::admin(
                        &self.tool,
                        format!("failed to wait for process: {error}"),
                        None,
                    ));
                }
            }
            if Instant::now() >= deadline {
                return Err(self.timed_out(timeout));
            }
            thread::sleep(WAIT_INTERVAL);
        }
    }

    /// Translate an I/O failure while talking to the child
    pub(crate) fn io_error(&self, error: io::Error, timeout: Duration) -> Error {
        if error.kind() == io::ErrorKind::TimedOut {
            self.timed_out(timeout)
        } else {
            Error::admin(
                &self.tool,
                format!("failed to communicate with process: {error}"),
                None,
            )
        }
    }

    fn timed_out(&self, timeout: Duration) -> Error {
        Error::admin(
            &self.tool,
            format!("timed out after {} seconds", timeout.as_secs_f64()),
            None,
        )
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        warn!("Killing {} (pid {})", self.tool, self.child.id());
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn captures_output() -> Result<()> {
        let output = Cmd::new("sh", "sh")
            .arg("-c")
            .arg("echo \"$LC_ALL\"; echo 'kadmin: oops' >&2; exit 3")
            .run()?;
        assert_eq!(output.stdout, "C\n");
        assert_eq!(output.error_message(), Some("kadmin: oops"));
        assert_eq!(output.code(), Some(3));
        assert!(!output.success());
        Ok(())
    }

    #[test]
    fn feeds_input() -> Result<()> {
        let output = Cmd::new("sh", "sh")
            .args(["-c", "read line; echo \"got $line\""])
            .input(Some("secret\n".to_owned()))
            .run()?;
        assert!(output.success());
        assert_eq!(output.stdout, "got secret\n");
        Ok(())
    }

    #[test]
    fn missing_program() {
        let error = Cmd::new("kadmin", "/nonexistent/kadmin").run().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Admin);
    }

    #[test]
    fn deadline() {
        let error = Cmd::new("sh", "sh")
            .args(["-c", "exec sleep 5"])
            .timeout(Duration::from_millis(200))
            .run()
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Admin);
        assert!(error.to_string().contains("timed out"));
    }
}
