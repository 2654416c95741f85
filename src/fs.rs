//! Filesystem operations used to maintain keytab artifacts

use std::{
    fs::{self, DirBuilder, File, Permissions},
    io,
    os::unix::fs::{DirBuilderExt, PermissionsExt},
    path::Path,
};

use crate::error::{Error, Result};

/// Filesystem operations needed by [`KeytabManager`][`crate::KeytabManager`]
pub trait Filesystem {
    /// `path` exists and is a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// Something exists at `path`
    fn exists(&self, path: &Path) -> bool;

    /// `path` is a regular file that can be opened for reading
    fn is_readable_file(&self, path: &Path) -> bool;

    /// Create a directory with `mode` permissions. An existing directory is left as is
    fn create_dir(&self, path: &Path, mode: u32) -> Result<()>;

    /// Atomically replace `to` with `from`
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Set the permission bits of `path`
    fn set_permissions(&self, path: &Path, mode: u32) -> Result<()>;

    /// Read the whole file at `path`
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
}

/// The local filesystem
#[derive(Copy, Clone, Debug, Default)]
#[allow(clippy::exhaustive_structs)]
pub struct LocalFilesystem;

impl Filesystem for LocalFilesystem {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn is_readable_file(&self, path: &Path) -> bool {
        path.is_file() && File::open(path).is_ok()
    }

    fn create_dir(&self, path: &Path, mode: u32) -> Result<()> {
        if path.is_dir() {
            return Ok(());
        }
        match DirBuilder::new().mode(mode).create(path) {
            Ok(()) => Ok(()),
            // Lost a race with another writer
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
            Err(error) => Err(Error::io(path, error)),
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to).map_err(|error| Error::io(to, error))
    }

    fn set_permissions(&self, path: &Path, mode: u32) -> Result<()> {
        fs::set_permissions(path, Permissions::from_mode(mode))
            .map_err(|error| Error::io(path, error))
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|error| Error::io(path, error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn directories() -> Result<()> {
        let tmp = tempfile::tempdir().map_err(|error| Error::io("tempdir", error))?;
        let local = LocalFilesystem;
        let dir = tmp.path().join("principals");

        assert!(!local.exists(&dir));
        local.create_dir(&dir, 0o700)?;
        local.create_dir(&dir, 0o700)?;
        assert!(local.is_dir(&dir));
        assert!(!local.is_readable_file(&dir));
        let mode = fs::metadata(&dir).map_err(|e| Error::io(&dir, e))?.permissions().mode();
        assert_eq!(mode & 0o777, 0o700);

        let error = local.create_dir(&tmp.path().join("missing/nested"), 0o700).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Io);
        Ok(())
    }

    #[test]
    fn rename_and_permissions() -> Result<()> {
        let tmp = tempfile::tempdir().map_err(|error| Error::io("tempdir", error))?;
        let local = LocalFilesystem;
        let from = tmp.path().join("from");
        let to = tmp.path().join("to");
        fs::write(&from, b"keytab").map_err(|e| Error::io(&from, e))?;
        fs::write(&to, b"old").map_err(|e| Error::io(&to, e))?;

        local.rename(&from, &to)?;
        local.set_permissions(&to, 0o600)?;
        assert!(!local.exists(&from));
        assert!(local.is_readable_file(&to));
        assert_eq!(local.read(&to)?, b"keytab");
        let mode = fs::metadata(&to).map_err(|e| Error::io(&to, e))?.permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        let error = local.read(&from).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Io);
        Ok(())
    }
}
