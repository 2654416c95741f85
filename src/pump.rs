//! Multiplex the standard output and error streams of a child process
//!
//! Both pipes are watched with `poll(2)`, so a burst on one of them is never missed while the
//! other one is quiet. When both are ready, standard error is serviced first.

use std::{
    io::{self, Read},
    os::fd::{AsRawFd, RawFd},
    process::{ChildStderr, ChildStdout},
    time::{Duration, Instant},
};

/// A burst of bytes read from one of the streams
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Chunk {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

/// Readiness multiplexer over a child's output pipes
#[derive(Debug)]
pub(crate) struct Pump {
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}

const READ_SIZE: usize = 4096;

impl Pump {
    pub(crate) fn new(stdout: ChildStdout, stderr: ChildStderr) -> Self {
        Self {
            stdout: Some(stdout),
            stderr: Some(stderr),
        }
    }

    /// Both streams reached end of file
    pub(crate) fn is_closed(&self) -> bool {
        self.stdout.is_none() && self.stderr.is_none()
    }

    /// Wait for the next chunk of output
    ///
    /// Returns `Ok(None)` once both streams are closed, and an error of kind
    /// [`io::ErrorKind::TimedOut`] if `deadline` passes first.
    pub(crate) fn next(&mut self, deadline: Instant) -> io::Result<Option<Chunk>> {
        loop {
            if self.is_closed() {
                return Ok(None);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "deadline expired while waiting for output",
                ));
            }
            let (stdout_ready, stderr_ready) = self.ready(timeout_ms(remaining))?;
            if stderr_ready {
                if let Some(data) = read_chunk(&mut self.stderr)? {
                    return Ok(Some(Chunk::Stderr(data)));
                }
            }
            if stdout_ready {
                if let Some(data) = read_chunk(&mut self.stdout)? {
                    return Ok(Some(Chunk::Stdout(data)));
                }
            }
        }
    }

    /// Read whatever is pending on standard error without waiting
    pub(crate) fn try_stderr(&mut self) -> io::Result<Option<Vec<u8>>> {
        let (_, stderr_ready) = self.ready(0)?;
        if stderr_ready {
            read_chunk(&mut self.stderr)
        } else {
            Ok(None)
        }
    }

    fn ready(&self, timeout_ms: libc::c_int) -> io::Result<(bool, bool)> {
        let mut fds = [
            pollfd(self.stdout.as_ref().map(AsRawFd::as_raw_fd)),
            pollfd(self.stderr.as_ref().map(AsRawFd::as_raw_fd)),
        ];
        let code = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if code < 0 {
            let error = io::Error::last_os_error();
            if error.kind() == io::ErrorKind::Interrupted {
                return Ok((false, false));
            }
            return Err(error);
        }
        Ok((is_ready(&fds[0]), is_ready(&fds[1])))
    }
}

fn timeout_ms(remaining: Duration) -> libc::c_int {
    remaining
        .as_millis()
        .clamp(1, libc::c_int::MAX as u128) as libc::c_int
}

// Negative descriptors are ignored by poll(2)
fn pollfd(fd: Option<RawFd>) -> libc::pollfd {
    libc::pollfd {
        fd: fd.unwrap_or(-1),
        events: libc::POLLIN,
        revents: 0,
    }
}

fn is_ready(fd: &libc::pollfd) -> bool {
    fd.fd >= 0 && fd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0
}

/// Read one chunk from a ready stream. The stream is dropped, closing it, on end of file.
fn read_chunk<R: Read>(stream: &mut Option<R>) -> io::Result<Option<Vec<u8>>> {
    let Some(reader) = stream.as_mut() else {
        return Ok(None);
    };
    let mut buf = [0_u8; READ_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                *stream = None;
                return Ok(None);
            }
            Ok(n) => return Ok(Some(buf[..n].to_vec())),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }
}
