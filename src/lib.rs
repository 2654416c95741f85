//! Manage Kerberos principals and keytabs through the kadmin and ktutil shells
//!
//! This crate doesn't speak the kadmin protocol, it drives the administration tools shipped with
//! MIT Kerberos as subprocesses and parses what they print.
//!
//! ```no_run
//! use kadmin_keytab::{KAdmin, KAdminImpl, KeytabManager};
//!
//! # fn example() -> kadmin_keytab::error::Result<()> {
//! let kadmin = KAdmin::builder()
//!     .principal("puppet/admin@EXAMPLE.ORG")
//!     .keytab(Some("/etc/puppet/admin.keytab".as_ref()))
//!     .build()?;
//!
//! kadmin.ensure_principal("host/node1.example.org")?;
//! kadmin.ensure_principal("HTTP/node1.example.org")?;
//!
//! let manager = KeytabManager::builder(&kadmin, "/var/lib/keytabs", "node1.example.org").build()?;
//! let keytab = manager.generate_keytab(&[
//!     "host/node1.example.org@EXAMPLE.ORG",
//!     "HTTP/node1.example.org@EXAMPLE.ORG",
//! ])?;
//! # Ok(())
//! # }
//! ```
//!
//! # Subprocesses
//!
//! Every tool runs with `LANG=C` and `LC_ALL=C` so its messages can be matched, and under an
//! overall deadline, 60 seconds by default. A process still running when an operation fails or
//! its deadline passes is killed. Passwords are only ever written to the tools' standard input.
//!
//! # Logging
//!
//! Subprocess executions are logged at the `debug` level through the [`log`] crate, generated
//! and reused keytabs at the `info` level.

mod conv;
mod exec;
mod pump;

pub mod error;
pub use error::{Error, ErrorKind};

pub use exec::DEFAULT_TIMEOUT;

pub mod principal;
pub use principal::{OptionValue, Principal, PrincipalAttributes, PrincipalOptions};

pub mod kadmin;
pub use kadmin::{KAdmin, KAdminBuilder, KAdminImpl, KvnoSelector};

pub mod ktutil;
pub use ktutil::{Ktutil, Session, SessionState};

pub mod fs;
pub use fs::{Filesystem, LocalFilesystem};

pub mod keytab;
pub use keytab::{CacheKey, KeytabArtifact, KeytabManager, KeytabManagerBuilder, NodeIdentity};
