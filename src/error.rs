//! [`Error`] type for various errors this library can encounter

use std::path::{Path, PathBuf};

/// Errors this library can encounter
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Malformed caller input: empty names or patterns, malformed option values, invalid key
    /// version selectors, inconsistent configuration
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An administrative tool reported a failure, or its output could not be parsed
    #[error("{tool} failed (status {}): {message}", display_status(.status))]
    Admin {
        /// Name of the tool that failed, e.g. `kadmin` or `ktutil`
        tool: String,
        /// First meaningful line of the tool's error output, or a description of the failure
        message: String,
        /// Exit status of the tool, when it is known
        status: Option<i32>,
    },

    /// A filesystem precondition was not met
    #[error("{}: {source}", .path.display())]
    Io {
        /// Offending path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The interactive session API was misused
    #[error("{0}")]
    Runtime(&'static str),
}

/// Coarse classification of an [`Error`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, strum::Display)]
#[allow(clippy::exhaustive_enums)]
pub enum ErrorKind {
    /// See [`Error::InvalidArgument`]
    InvalidArgument,
    /// See [`Error::Admin`]
    Admin,
    /// See [`Error::Io`]
    Io,
    /// See [`Error::Runtime`]
    Runtime,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Admin { .. } => ErrorKind::Admin,
            Self::Io { .. } => ErrorKind::Io,
            Self::Runtime(_) => ErrorKind::Runtime,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn admin(tool: &str, message: impl Into<String>, status: Option<i32>) -> Self {
        Self::Admin {
            tool: tool.to_owned(),
            message: message.into(),
            status,
        }
    }

    /// Structured output from `tool` didn't have the expected shape
    pub(crate) fn parse(tool: &str, detail: impl std::fmt::Display) -> Self {
        Self::admin(
            tool,
            format!("failed to parse structured output: {detail}"),
            None,
        )
    }

    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

fn display_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "unknown".to_owned(),
    }
}

/// Helper type for errors sent from this library
pub type Result<T> = std::result::Result<T, Error>;

/// Find the first line of `stderr` that looks like an error
///
/// kadmin and ktutil prefix their diagnostics with `word:`. Lines prefixed with `warning:` are
/// skipped, as are lines without such a prefix, such as password prompts.
pub(crate) fn find_error_message(stderr: &str) -> Option<&str> {
    stderr.lines().find(|line| {
        let Some((prefix, _)) = line.split_once(':') else {
            return false;
        };
        !prefix.is_empty()
            && prefix.chars().all(|c| c.is_alphanumeric() || c == '_')
            && !prefix.eq_ignore_ascii_case("warning")
    })
}
