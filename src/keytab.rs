//! Synthesize and cache combined keytabs
//!
//! Artifacts live under a keytab root provisioned by the caller:
//!
//! ```text
//! <root>/principals/<escaped principal name>/<mkvno>-<kvno>.keytab   one per key generation
//! <root>/<node identity>/<cache key>.keytab                         combined keytabs
//! ```
//!
//! The combined keytab is named after a digest of the key state it contains, so as long as no
//! key changes, asking again for the same principals returns the existing file without running
//! any tool.

use std::{
    collections::BTreeMap,
    ffi::OsString,
    fmt, io,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{DateTime, Utc};
use getset::{CopyGetters, Getters};
use log::{debug, info};
use sha2::{Digest, Sha256};

use crate::{
    error::{Error, Result},
    exec::DEFAULT_TIMEOUT,
    fs::{Filesystem, LocalFilesystem},
    kadmin::{KAdmin, KAdminImpl},
    ktutil::Ktutil,
    principal::Principal,
};

const PRINCIPALS_DIR: &str = "principals";
const DIR_MODE: u32 = 0o700;
const FILE_MODE: u32 = 0o600;

/// Digest identifying the key state of a set of principals
///
/// Computed over `(name, master key version, key version)` triples sorted by name, so the order
/// in which principals are given doesn't matter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Compute the key for a set of `(name, mkvno, kvno)` triples
    pub fn new<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, u32, u32)>,
    {
        let mut entries: Vec<_> = entries.into_iter().collect();
        entries.sort_unstable();
        let mut hasher = Sha256::new();
        for (name, mkvno, kvno) in entries {
            hasher.update(format!("{name}|{mkvno}|{kvno}\n").as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Compute the key for the current key state of `principals`
    pub fn from_principals<'a, I>(principals: I) -> Self
    where
        I: IntoIterator<Item = &'a Principal>,
    {
        Self::new(
            principals
                .into_iter()
                .map(|principal| (principal.name(), principal.mkvno(), principal.kvno())),
        )
    }

    /// Hexadecimal representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A keytab file produced by [`KeytabManager`]
#[derive(Clone, Debug, PartialEq, Eq, Getters, CopyGetters)]
pub struct KeytabArtifact {
    /// Where the keytab is stored
    #[getset(get = "pub")]
    path: PathBuf,
    /// Most recent modification time of the principals in the keytab
    #[getset(get_copy = "pub")]
    freshness: Option<DateTime<Utc>>,
    /// Raw keytab
    #[getset(get = "pub")]
    contents: Vec<u8>,
}

impl KeytabArtifact {
    /// Take the raw keytab
    pub fn into_contents(self) -> Vec<u8> {
        self.contents
    }
}

/// Stable identity of the node combined keytabs are generated for
///
/// Used as a directory name under the keytab root.
pub trait NodeIdentity {
    /// The identity, usually a host name
    fn node_identity(&self) -> String;
}

impl NodeIdentity for str {
    fn node_identity(&self) -> String {
        self.to_owned()
    }
}

impl NodeIdentity for String {
    fn node_identity(&self) -> String {
        self.clone()
    }
}

impl<T: NodeIdentity + ?Sized> NodeIdentity for &T {
    fn node_identity(&self) -> String {
        (**self).node_identity()
    }
}

/// Builds and caches combined keytabs for a node
///
/// Key state is looked up through `K`, usually [`KAdmin`], fragments are extracted with it and
/// combined with [`Ktutil`].
#[derive(Debug)]
pub struct KeytabManager<'a, K = KAdmin, F = LocalFilesystem>
where
    K: KAdminImpl,
    F: Filesystem,
{
    kadmin: &'a K,
    root: PathBuf,
    identity: String,
    ktutil_bin: OsString,
    timeout: Duration,
    norandkey: bool,
    filesystem: F,
}

/// Builder for [`KeytabManager`]
#[derive(Debug)]
pub struct KeytabManagerBuilder<'a, K, F = LocalFilesystem>
where
    K: KAdminImpl,
    F: Filesystem,
{
    kadmin: &'a K,
    root: PathBuf,
    identity: String,
    ktutil_bin: OsString,
    timeout: Duration,
    norandkey: bool,
    filesystem: F,
}

impl<'a, K: KAdminImpl> KeytabManager<'a, K, LocalFilesystem> {
    /// Construct a new [`KeytabManagerBuilder`]
    ///
    /// `root` must already exist. `identity` names the directory combined keytabs go to.
    pub fn builder(
        kadmin: &'a K,
        root: impl Into<PathBuf>,
        identity: impl NodeIdentity,
    ) -> KeytabManagerBuilder<'a, K, LocalFilesystem> {
        KeytabManagerBuilder {
            kadmin,
            root: root.into(),
            identity: identity.node_identity(),
            ktutil_bin: "ktutil".into(),
            timeout: DEFAULT_TIMEOUT,
            norandkey: false,
            filesystem: LocalFilesystem,
        }
    }
}

impl<'a, K: KAdminImpl, F: Filesystem> KeytabManagerBuilder<'a, K, F> {
    /// Path or name of the ktutil executable. Defaults to `ktutil`
    pub fn ktutil_bin(mut self, bin: impl Into<OsString>) -> Self {
        self.ktutil_bin = bin.into();
        self
    }

    /// Deadline for each ktutil session. Defaults to 60 seconds
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Extract existing keys instead of randomizing them first
    pub fn norandkey(mut self, norandkey: bool) -> Self {
        self.norandkey = norandkey;
        self
    }

    /// Use another [`Filesystem`] implementation
    ///
    /// kadmin and ktutil write their keytabs to real paths, so the scratch files they write to
    /// are always reserved on the local disk, next to where the result is renamed to.
    pub fn filesystem<G: Filesystem>(self, filesystem: G) -> KeytabManagerBuilder<'a, K, G> {
        KeytabManagerBuilder {
            kadmin: self.kadmin,
            root: self.root,
            identity: self.identity,
            ktutil_bin: self.ktutil_bin,
            timeout: self.timeout,
            norandkey: self.norandkey,
            filesystem,
        }
    }

    /// Validate the node identity and construct the [`KeytabManager`]
    pub fn build(self) -> Result<KeytabManager<'a, K, F>> {
        if self.identity.is_empty()
            || self.identity == "."
            || self.identity == ".."
            || self.identity == PRINCIPALS_DIR
            || self.identity.contains(['/', '\0'])
        {
            return Err(Error::invalid(format!(
                "invalid node identity {:?}",
                self.identity
            )));
        }
        Ok(KeytabManager {
            kadmin: self.kadmin,
            root: self.root,
            identity: self.identity,
            ktutil_bin: self.ktutil_bin,
            timeout: self.timeout,
            norandkey: self.norandkey,
            filesystem: self.filesystem,
        })
    }
}

impl<K: KAdminImpl, F: Filesystem> KeytabManager<'_, K, F> {
    /// Raw combined keytab for `principals`
    ///
    /// See [`synthesize`][`Self::synthesize`].
    pub fn generate_keytab(&self, principals: &[&str]) -> Result<Vec<u8>> {
        self.synthesize(principals).map(KeytabArtifact::into_contents)
    }

    /// Produce, or reuse, the combined keytab for `principals`
    ///
    /// Every principal must exist. On failure no combined keytab is written, but fragments
    /// already extracted are kept for the next attempt.
    pub fn synthesize(&self, principals: &[&str]) -> Result<KeytabArtifact> {
        if principals.is_empty() {
            return Err(Error::invalid("at least one principal is required"));
        }
        if principals.iter().any(|name| name.is_empty()) {
            return Err(Error::invalid("invalid principal name"));
        }
        if !self.filesystem.is_dir(&self.root) {
            return Err(Error::io(
                &self.root,
                io::Error::new(
                    io::ErrorKind::NotFound,
                    "keytab root is missing or not a directory",
                ),
            ));
        }

        let mut resolved = Vec::with_capacity(principals.len());
        for name in principals {
            let principal = self.kadmin.get_principal(name)?.ok_or_else(|| {
                Error::admin("kadmin", format!("principal {name} does not exist"), None)
            })?;
            resolved.push(principal);
        }
        resolved.sort_by(|a, b| a.name().cmp(b.name()));
        resolved.dedup_by(|a, b| a.name() == b.name());
        let freshness = resolved.iter().filter_map(Principal::modified_at).max();

        let node_dir = self.root.join(&self.identity);
        let key = CacheKey::from_principals(&resolved);
        if let Some(artifact) = self.cached(&node_dir, &key, freshness)? {
            return Ok(artifact);
        }

        let mut fragments = BTreeMap::new();
        for principal in &resolved {
            let (kvno, fragment) = self.fragment(principal)?;
            fragments.insert(principal.name(), (principal.mkvno(), kvno, fragment));
        }

        // Extraction may have bumped key versions, name the result after what it contains
        let key = CacheKey::new(
            fragments
                .iter()
                .map(|(name, (mkvno, kvno, _))| (*name, *mkvno, *kvno)),
        );
        if let Some(artifact) = self.cached(&node_dir, &key, freshness)? {
            return Ok(artifact);
        }

        self.filesystem.create_dir(&node_dir, DIR_MODE)?;
        let path = combined_path(&node_dir, &key);
        let tmp = scratch_path(&node_dir)?;
        let mut ktutil =
            Ktutil::with_bin(&self.ktutil_bin, tmp.to_path_buf()).timeout(self.timeout);
        for (_, _, fragment) in fragments.values() {
            if !self.filesystem.is_readable_file(fragment) {
                return Err(Error::io(
                    fragment,
                    io::Error::new(io::ErrorKind::InvalidInput, "not a readable regular file"),
                ));
            }
            ktutil.push_fragment(fragment);
        }
        let count = ktutil.commit()?;
        self.commit(&tmp, &path)?;
        info!("Generated keytab {} for {count} principal(s)", path.display());

        Ok(KeytabArtifact {
            contents: self.filesystem.read(&path)?,
            path,
            freshness,
        })
    }

    /// The combined keytab for `key`, if it was already generated
    fn cached(
        &self,
        node_dir: &Path,
        key: &CacheKey,
        freshness: Option<DateTime<Utc>>,
    ) -> Result<Option<KeytabArtifact>> {
        let path = combined_path(node_dir, key);
        if !self.existing_file(&path)? {
            return Ok(None);
        }
        info!("Reusing keytab {}", path.display());
        Ok(Some(KeytabArtifact {
            contents: self.filesystem.read(&path)?,
            path,
            freshness,
        }))
    }

    /// Path of the fragment holding the current keys of `principal`, extracting it if needed
    ///
    /// Returns the key version the fragment holds.
    fn fragment(&self, principal: &Principal) -> Result<(u32, PathBuf)> {
        let name = principal.name();
        let dir = self.root.join(PRINCIPALS_DIR);
        self.filesystem.create_dir(&dir, DIR_MODE)?;
        let dir = dir.join(escape_principal(name));
        self.filesystem.create_dir(&dir, DIR_MODE)?;

        let current = fragment_path(&dir, principal.mkvno(), principal.kvno());
        if self.existing_file(&current)? {
            debug!("Reusing keytab fragment {}", current.display());
            return Ok((principal.kvno(), current));
        }

        let tmp = scratch_path(&dir)?;
        let kvnos = self
            .kadmin
            .add_keytab_entries(name, false, Some(&*tmp), self.norandkey)?;
        // A single reported entry is the principal asked for, whatever its spelling
        let kvno = kvnos
            .get(name)
            .or_else(|| kvnos.values().next().filter(|_| kvnos.len() == 1))
            .copied()
            .ok_or_else(|| {
                Error::parse("kadmin", format!("no key version reported for {name}"))
            })?;
        let path = fragment_path(&dir, principal.mkvno(), kvno);
        self.commit(&tmp, &path)?;
        info!("Extracted keytab for {name} (kvno {kvno})");
        Ok((kvno, path))
    }

    /// Move a finished temporary file into place and restrict it to its owner
    fn commit(&self, tmp: &Path, path: &Path) -> Result<()> {
        self.filesystem.rename(tmp, path)?;
        self.filesystem.set_permissions(path, FILE_MODE)
    }

    /// Whether a readable file exists at `path`. Anything else there is an error
    fn existing_file(&self, path: &Path) -> Result<bool> {
        if !self.filesystem.exists(path) {
            return Ok(false);
        }
        if !self.filesystem.is_readable_file(path) {
            return Err(Error::io(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "not a readable regular file"),
            ));
        }
        Ok(true)
    }
}

/// Make a principal name usable as a single path component
pub(crate) fn escape_principal(name: &str) -> String {
    name.replace('/', "$")
}

fn fragment_path(dir: &Path, mkvno: u32, kvno: u32) -> PathBuf {
    dir.join(format!("{mkvno}-{kvno}.keytab"))
}

fn combined_path(dir: &Path, key: &CacheKey) -> PathBuf {
    dir.join(format!("{key}.keytab"))
}

/// Reserve a unique path in `dir` for a tool to write a keytab to
///
/// The placeholder file is removed since the tools refuse to write keytabs into empty files.
/// Whatever ends up at the path is removed when the returned value is dropped, unless it was
/// renamed away first.
fn scratch_path(dir: &Path) -> Result<tempfile::TempPath> {
    let tmp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".keytab.tmp")
        .tempfile_in(dir)
        .map_err(|error| Error::io(dir, error))?
        .into_temp_path();
    std::fs::remove_file(&tmp).map_err(|error| Error::io(&tmp, error))?;
    Ok(tmp)
}
