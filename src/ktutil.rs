//! Assemble keytabs with an interactive ktutil session
//!
//! ktutil has no machine-readable success signal: a command succeeded if the next prompt shows up
//! without anything written to standard error in between. [`Session`] encodes that protocol as a
//! state machine fed with raw output chunks, and [`Ktutil`] drives it against a live process.

use std::{
    collections::VecDeque,
    ffi::OsString,
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
    time::{Duration, Instant},
};

use log::debug;

use crate::{
    conv::quote_token,
    error::{Error, Result},
    exec::{ChildGuard, DEFAULT_TIMEOUT, LOCALE_ENV},
    pump::Chunk,
};

const TOOL: &str = "ktutil";

/// State of a [`Session`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, strum::Display)]
#[allow(clippy::exhaustive_enums)]
pub enum SessionState {
    /// Waiting for the tool to print its prompt
    AwaitingOutput,
    /// The prompt was printed and no error was seen, the next command can be sent
    PromptSeen,
    /// The tool wrote to standard error. No further command is sent
    ErrorSeen,
    /// Both output streams are closed
    Closed,
}

/// Protocol state of one ktutil session
///
/// Feed it every chunk read from the tool with [`on_stdout`][`Self::on_stdout`] and
/// [`on_stderr`][`Self::on_stderr`], and send whatever [`next_command`][`Self::next_command`]
/// returns. Once the scripted commands are exhausted, a final `quit` is produced.
#[derive(Clone, Debug)]
pub struct Session {
    state: SessionState,
    commands: VecDeque<String>,
    quit_sent: bool,
    stdout: String,
    stderr: String,
}

impl Session {
    /// Start a session that will send `commands` in order
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: SessionState::AwaitingOutput,
            commands: commands.into_iter().map(Into::into).collect(),
            quit_sent: false,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Record a chunk read from standard output
    pub fn on_stdout(&mut self, data: &[u8]) {
        self.stdout.push_str(&String::from_utf8_lossy(data));
        if self.state == SessionState::AwaitingOutput && ends_with_prompt(&self.stdout) {
            self.state = SessionState::PromptSeen;
        }
    }

    /// Record a chunk read from standard error
    ///
    /// Any error output, even one racing a prompt, stops the session.
    pub fn on_stderr(&mut self, data: &[u8]) {
        self.stderr.push_str(&String::from_utf8_lossy(data));
        if !data.is_empty() && self.state != SessionState::Closed {
            self.state = SessionState::ErrorSeen;
        }
    }

    /// Both streams reached end of file
    pub fn on_closed(&mut self) {
        self.state = SessionState::Closed;
    }

    /// Take the command to send now, if the tool is ready for one
    pub fn next_command(&mut self) -> Option<String> {
        if self.state != SessionState::PromptSeen || !self.stderr.is_empty() || self.quit_sent {
            return None;
        }
        let command = match self.commands.pop_front() {
            Some(command) => command,
            None => {
                self.quit_sent = true;
                "quit".to_owned()
            }
        };
        self.stdout.clear();
        self.state = SessionState::AwaitingOutput;
        Some(command)
    }

    /// Every scripted command and the final `quit` were sent
    pub fn is_complete(&self) -> bool {
        self.commands.is_empty() && self.quit_sent
    }

    /// Everything written to standard error so far
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// First line written to standard error
    pub fn error_message(&self) -> Option<&str> {
        self.stderr
            .lines()
            .map(str::trim_end)
            .find(|line| !line.is_empty())
    }
}

/// The prompt is a colon followed by trailing whitespace, e.g. `ktutil:  `
fn ends_with_prompt(output: &str) -> bool {
    let trimmed = output.trim_end();
    trimmed.len() < output.len() && trimmed.ends_with(':')
}

/// Combine keytab fragments into one keytab with ktutil
///
/// ```no_run
/// # use kadmin_keytab::Ktutil;
/// # fn example() -> kadmin_keytab::error::Result<()> {
/// let mut ktutil = Ktutil::new("/etc/krb5.keytab");
/// ktutil.add_fragment("/var/lib/keytabs/host.keytab")?;
/// ktutil.add_fragment("/var/lib/keytabs/http.keytab")?;
/// assert_eq!(ktutil.commit()?, 2);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Ktutil {
    program: OsString,
    destination: PathBuf,
    fragments: Vec<PathBuf>,
    timeout: Duration,
}

impl Ktutil {
    /// Write the combined keytab to `destination`, using `ktutil` from `PATH`
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self::with_bin("ktutil", destination)
    }

    /// Write the combined keytab to `destination`, using the given ktutil executable
    pub fn with_bin(bin: impl Into<OsString>, destination: impl Into<PathBuf>) -> Self {
        Self {
            program: bin.into(),
            destination: destination.into(),
            fragments: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Deadline for the whole session. Defaults to 60 seconds
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Queue a keytab to be read into the combined keytab
    ///
    /// Fails with [`Error::Io`] if `path` isn't a readable file.
    pub fn add_fragment(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|error| Error::io(path, error))?;
        let metadata = file.metadata().map_err(|error| Error::io(path, error))?;
        if !metadata.is_file() {
            return Err(Error::io(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }
        self.push_fragment(path);
        Ok(())
    }

    /// Queue a keytab the caller already checked
    pub(crate) fn push_fragment(&mut self, path: &Path) {
        self.fragments.push(path.to_path_buf());
    }

    /// Number of queued fragments
    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Run ktutil to read every fragment and write the combined keytab
    ///
    /// Returns the number of fragments written.
    pub fn commit(self) -> Result<usize> {
        if self.fragments.is_empty() {
            return Err(Error::Runtime("no keytab fragments were added"));
        }
        let mut commands = Vec::with_capacity(self.fragments.len() + 1);
        for fragment in &self.fragments {
            commands.push(format!("read_kt {}", path_token(fragment)?));
        }
        commands.push(format!("write_kt {}", path_token(&self.destination)?));

        let deadline = Instant::now() + self.timeout;
        let mut command = Command::new(&self.program);
        command
            .envs(LOCALE_ENV)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!("Executing {TOOL}: {:?}", self.program);
        let mut child = ChildGuard::spawn(TOOL, &mut command)?;
        let mut stdin = child.take_stdin();
        let mut pump = child.pump()?;

        let mut session = Session::new(commands);
        loop {
            let chunk = pump
                .next(deadline)
                .map_err(|error| child.io_error(error, self.timeout))?;
            match chunk {
                Some(Chunk::Stdout(data)) => session.on_stdout(&data),
                Some(Chunk::Stderr(data)) => session.on_stderr(&data),
                None => break,
            }

            if session.state() == SessionState::PromptSeen {
                // Error text written alongside the prompt wins over the prompt
                if let Some(data) = pump
                    .try_stderr()
                    .map_err(|error| child.io_error(error, self.timeout))?
                {
                    session.on_stderr(&data);
                }
            }

            if let Some(command) = session.next_command() {
                debug!("Sending to {TOOL}: {command}");
                if let Some(input) = stdin.as_mut() {
                    if let Err(error) = writeln!(input, "{command}").and_then(|()| input.flush())
                    {
                        if error.kind() != io::ErrorKind::BrokenPipe {
                            return Err(child.io_error(error, self.timeout));
                        }
                        // The tool went away, whatever it printed tells why
                        stdin = None;
                    }
                }
            }

            if session.state() == SessionState::ErrorSeen {
                // Closing its input makes ktutil exit
                stdin = None;
            }
        }
        session.on_closed();
        drop(stdin);

        let status = child.wait(deadline, self.timeout)?;
        if status.success() && session.stderr().is_empty() && session.is_complete() {
            Ok(self.fragments.len())
        } else {
            let message = session
                .error_message()
                .unwrap_or("session ended before all commands were processed");
            Err(Error::admin(TOOL, message, status.code()))
        }
    }
}

fn path_token(path: &Path) -> Result<String> {
    path.to_str()
        .filter(|path| !path.contains(['\n', '\r']))
        .map(quote_token)
        .ok_or_else(|| Error::invalid(format!("unusable keytab path {}", path.display())))
}
