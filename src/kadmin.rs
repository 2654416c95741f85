//! [`KAdmin`] interface to the kadmin shell

use std::{
    collections::BTreeMap,
    ffi::OsString,
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use log::debug;

use crate::{
    conv::quote_token,
    error::{Error, Result},
    exec::{Cmd, DEFAULT_TIMEOUT, Output},
    principal::{Principal, PrincipalOptions},
};

const TOOL: &str = "kadmin";

/// Which keys [`KAdminImpl::remove_keytab_entries`] removes
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[allow(clippy::exhaustive_enums)]
pub enum KvnoSelector {
    /// Only keys with this version. Must be positive
    Version(u32),
    /// Every key of the principal
    All,
    /// Every key except the most recent one
    Old,
}

impl fmt::Display for KvnoSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version(kvno) => write!(f, "{kvno}"),
            Self::All => f.write_str("all"),
            Self::Old => f.write_str("old"),
        }
    }
}

impl FromStr for KvnoSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(Self::All),
            "old" => Ok(Self::Old),
            _ => s
                .parse::<u32>()
                .ok()
                .filter(|kvno| *kvno > 0)
                .map(Self::Version)
                .ok_or_else(|| Error::invalid(format!("invalid key version {s:?}"))),
        }
    }
}

impl KvnoSelector {
    fn validate(self) -> Result<Self> {
        if self == Self::Version(0) {
            return Err(Error::invalid("invalid numeric key version"));
        }
        Ok(self)
    }
}

/// How kadmin authenticates to the admin server
#[derive(Clone, PartialEq, Eq)]
enum Auth {
    Password(String),
    Keytab(Option<PathBuf>),
    Ccache(PathBuf),
    Local,
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(<redacted>)"),
            Self::Keytab(keytab) => f.debug_tuple("Keytab").field(keytab).finish(),
            Self::Ccache(ccache) => f.debug_tuple("Ccache").field(ccache).finish(),
            Self::Local => f.write_str("Local"),
        }
    }
}

/// Interface to the kadmin shell
///
/// Each operation runs kadmin once in query mode (`-q`). Construct one with
/// [`KAdmin::builder`] and pass it by reference wherever it is needed.
#[derive(Clone, Debug)]
pub struct KAdmin {
    program: OsString,
    realm: Option<String>,
    principal: Option<String>,
    server: Option<String>,
    extra_options: Vec<String>,
    auth: Auth,
    timeout: Duration,
}

/// Common methods for `KAdmin` implementations
pub trait KAdminImpl {
    /// Create a principal
    ///
    /// Without a password or an explicit key option in `options`, the server generates a random
    /// key. Returns the full name of the principal as reported by kadmin.
    ///
    /// ```no_run
    /// # use kadmin_keytab::{KAdmin, KAdminImpl, PrincipalOptions};
    /// # fn example() -> kadmin_keytab::error::Result<()> {
    /// let kadm = KAdmin::builder().keytab(None).build()?;
    /// let name = kadm.add_principal("HTTP/www.example.org", &PrincipalOptions::new())?;
    /// assert_eq!(name, "HTTP/www.example.org@EXAMPLE.ORG");
    /// # Ok(())
    /// # }
    /// ```
    #[doc(alias("ank", "addprinc"))]
    fn add_principal(&self, name: &str, options: &PrincipalOptions) -> Result<String>;

    /// Modify a principal
    #[doc(alias = "modprinc")]
    fn modify_principal(&self, name: &str, options: &PrincipalOptions) -> Result<String>;

    /// Retrieve a principal
    ///
    /// Returns `None` if the principal does not exist.
    #[doc(alias = "getprinc")]
    fn get_principal(&self, name: &str) -> Result<Option<Principal>>;

    /// Check if a principal exists
    fn principal_exists(&self, name: &str) -> Result<bool> {
        Ok(self.get_principal(name)?.is_some())
    }

    /// Create a principal with a random key, unless it already exists
    ///
    /// Returns the full name of the new or existing principal. An existing principal is left
    /// untouched.
    fn ensure_principal(&self, name: &str) -> Result<String> {
        match self.get_principal(name)? {
            Some(principal) => Ok(principal.name().to_owned()),
            None => self.add_principal(name, &PrincipalOptions::new().randkey()),
        }
    }

    /// List principals
    ///
    /// `query` is a shell-style glob expression that can contain the wild-card characters `?`, `*`,
    /// and `[]`. All principal names matching the expression are returned. If no query is
    /// provided, all principals are returned.
    #[doc(alias("listprincs", "get_principals", "getprincs"))]
    fn list_principals(&self, query: Option<&str>) -> Result<Vec<String>>;

    /// Extract keys of a principal, or of every principal matching a glob, into a keytab
    ///
    /// Unless `norandkey` is set, the keys are randomized first, which increments their key
    /// version. `keytab` defaults to kadmin's default keytab. Returns the key version written for
    /// each principal.
    #[doc(alias("ktadd", "xst"))]
    fn add_keytab_entries(
        &self,
        principal: &str,
        glob: bool,
        keytab: Option<&Path>,
        norandkey: bool,
    ) -> Result<BTreeMap<String, u32>>;

    /// Remove keys of a principal from a keytab
    ///
    /// Returns the number of entries removed.
    #[doc(alias("ktremove", "ktrem"))]
    fn remove_keytab_entries(
        &self,
        principal: &str,
        kvno: KvnoSelector,
        keytab: Option<&Path>,
    ) -> Result<usize>;
}

impl KAdmin {
    /// Construct a new [`KAdminBuilder`]
    pub fn builder() -> KAdminBuilder {
        KAdminBuilder::default()
    }

    /// Whether this instance uses `kadmin.local` instead of contacting a server
    pub fn is_local(&self) -> bool {
        self.auth == Auth::Local
    }

    /// Assemble the command running `query`
    fn command(&self, query: &[String], input: Option<String>) -> Cmd {
        let query = query
            .iter()
            .map(|token| quote_token(token))
            .collect::<Vec<_>>()
            .join(" ");

        let mut cmd = Cmd::new(TOOL, &self.program).timeout(self.timeout);
        if let Some(realm) = &self.realm {
            cmd = cmd.args(["-r", realm.as_str()]);
        }
        if let Some(principal) = &self.principal {
            cmd = cmd.args(["-p", principal.as_str()]);
        }
        cmd = cmd.arg("-q").arg(query);

        match &self.auth {
            Auth::Ccache(ccache) => cmd = cmd.arg("-c").arg(ccache),
            Auth::Keytab(keytab) => {
                cmd = cmd.arg("-k");
                if let Some(keytab) = keytab {
                    cmd = cmd.arg("-t").arg(keytab);
                }
            }
            Auth::Password(_) | Auth::Local => {}
        }
        if let Some(server) = &self.server {
            cmd = cmd.args(["-s", server.as_str()]);
        }
        cmd = cmd.args(&self.extra_options);

        // The password prompt comes before anything the query itself reads
        let input = match &self.auth {
            Auth::Password(password) => {
                Some(format!("{password}\n{}", input.unwrap_or_default()))
            }
            _ => input,
        };
        cmd.input(input)
    }

    /// Run `query`, whatever its exit status
    fn execute(&self, query: &[String], input: Option<String>) -> Result<Output> {
        debug!("kadmin query: {}", query.join(" "));
        self.command(query, input).run()
    }

    /// Run `query`, failing on a non-zero exit status
    fn execute_checked(&self, query: &[String], input: Option<String>) -> Result<Output> {
        let output = self.execute(query, input)?;
        if !output.success() {
            return Err(output.to_error(TOOL));
        }
        Ok(output)
    }

    fn principal_add_or_modify(
        &self,
        name: &str,
        options: &PrincipalOptions,
        modify: bool,
    ) -> Result<String> {
        check_name(name)?;

        let (verb, expected) = if modify {
            ("modprinc", "modified")
        } else {
            ("addprinc", "created")
        };
        let mut query = vec![verb.to_owned()];
        if !modify && !options.sets_key() {
            query.push("-randkey".to_owned());
        }
        query.extend(options.to_tokens()?);
        query.push(name.to_owned());

        // New password and its confirmation
        let input = options
            .get_password()
            .map(|password| format!("{password}\n{password}\n"));

        let output = self.execute_checked(&query, input)?;
        output
            .stdout
            .lines()
            .find_map(|line| parse_principal_done(line, expected))
            .ok_or_else(|| output.to_error(TOOL))
    }
}

impl KAdminImpl for KAdmin {
    fn add_principal(&self, name: &str, options: &PrincipalOptions) -> Result<String> {
        self.principal_add_or_modify(name, options, false)
    }

    fn modify_principal(&self, name: &str, options: &PrincipalOptions) -> Result<String> {
        self.principal_add_or_modify(name, options, true)
    }

    fn get_principal(&self, name: &str) -> Result<Option<Principal>> {
        check_name(name)?;
        let output = self.execute(
            &["getprinc".to_owned(), "-terse".to_owned(), name.to_owned()],
            None,
        )?;

        let record = if output.success() {
            output.stdout.lines().find(|line| line.contains('\t'))
        } else {
            None
        };
        match record {
            Some(record) => Principal::from_terse(record).map(Some),
            None if output
                .stderr
                .to_lowercase()
                .contains("principal does not exist") =>
            {
                Ok(None)
            }
            None => Err(output.to_error(TOOL)),
        }
    }

    fn list_principals(&self, query: Option<&str>) -> Result<Vec<String>> {
        let query = query.unwrap_or("*");
        check_pattern(query)?;
        let output = self.execute_checked(&["listprincs".to_owned(), query.to_owned()], None)?;

        let principals: Vec<String> = output
            .stdout
            .lines()
            .filter(|line| is_principal_name(line))
            .map(String::from)
            .collect();
        if principals.is_empty() && output.error_message().is_some() {
            return Err(output.to_error(TOOL));
        }
        Ok(principals)
    }

    fn add_keytab_entries(
        &self,
        principal: &str,
        glob: bool,
        keytab: Option<&Path>,
        norandkey: bool,
    ) -> Result<BTreeMap<String, u32>> {
        if glob {
            check_pattern(principal)?;
        } else {
            check_name(principal)?;
        }

        let mut query = vec!["ktadd".to_owned()];
        if let Some(keytab) = keytab {
            query.push("-k".to_owned());
            query.push(path_token(keytab)?);
        }
        if norandkey {
            query.push("-norandkey".to_owned());
        }
        if glob {
            query.push("-glob".to_owned());
        }
        query.push(principal.to_owned());

        let output = self.execute_checked(&query, None)?;
        let mut added = BTreeMap::new();
        for line in output.stdout.lines() {
            if !line.to_lowercase().contains("added to keytab") {
                continue;
            }
            let (name, kvno) = parse_keytab_added(line)?;
            added.insert(name, kvno);
        }
        if added.is_empty() {
            return Err(output.to_error(TOOL));
        }
        Ok(added)
    }

    fn remove_keytab_entries(
        &self,
        principal: &str,
        kvno: KvnoSelector,
        keytab: Option<&Path>,
    ) -> Result<usize> {
        check_name(principal)?;
        let kvno = kvno.validate()?;

        let mut query = vec!["ktremove".to_owned()];
        if let Some(keytab) = keytab {
            query.push("-k".to_owned());
            query.push(path_token(keytab)?);
        }
        query.push(principal.to_owned());
        query.push(kvno.to_string());

        let output = self.execute_checked(&query, None)?;
        let removed = output
            .stdout
            .lines()
            .filter(|line| line.to_lowercase().contains("removed from keytab"))
            .count();
        if removed == 0 {
            return Err(output.to_error(TOOL));
        }
        Ok(removed)
    }
}

/// Builder for [`KAdmin`]
///
/// Exactly one authentication method out of [`password`][`Self::password`],
/// [`keytab`][`Self::keytab`] and [`ccache`][`Self::ccache`] must be set, unless
/// [`local`][`Self::local`] is used, in which case none of them, nor a server, may be set.
#[derive(Clone, Default)]
pub struct KAdminBuilder {
    bin: Option<OsString>,
    local_bin: Option<OsString>,
    realm: Option<String>,
    principal: Option<String>,
    server: Option<String>,
    extra_options: Vec<String>,
    password: Option<String>,
    keytab: Option<Option<PathBuf>>,
    ccache: Option<PathBuf>,
    local: bool,
    timeout: Option<Duration>,
}

impl fmt::Debug for KAdminBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KAdminBuilder")
            .field("bin", &self.bin)
            .field("local_bin", &self.local_bin)
            .field("realm", &self.realm)
            .field("principal", &self.principal)
            .field("server", &self.server)
            .field("extra_options", &self.extra_options)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("keytab", &self.keytab)
            .field("ccache", &self.ccache)
            .field("local", &self.local)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl KAdminBuilder {
    /// Path or name of the kadmin executable. Defaults to `kadmin`, looked up in `PATH`
    pub fn bin(mut self, bin: impl Into<OsString>) -> Self {
        self.bin = Some(bin.into());
        self
    }

    /// Path or name of the kadmin.local executable. Defaults to `kadmin.local`
    pub fn local_bin(mut self, local_bin: impl Into<OsString>) -> Self {
        self.local_bin = Some(local_bin.into());
        self
    }

    /// Realm to use instead of the system default
    pub fn realm(mut self, realm: &str) -> Self {
        self.realm = Some(realm.to_owned());
        self
    }

    /// Principal to authenticate as
    pub fn principal(mut self, principal: &str) -> Self {
        self.principal = Some(principal.to_owned());
        self
    }

    /// Admin server to contact instead of the one from the configuration
    pub fn server(mut self, server: &str) -> Self {
        self.server = Some(server.to_owned());
        self
    }

    /// Extra command line options passed to kadmin as is
    pub fn extra_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Deadline for each kadmin invocation. Defaults to 60 seconds
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Authenticate with a password, fed to kadmin through its standard input
    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_owned());
        self
    }

    /// Authenticate with a keytab, or the default keytab if `None`
    pub fn keytab(mut self, keytab: Option<&Path>) -> Self {
        self.keytab = Some(keytab.map(Path::to_path_buf));
        self
    }

    /// Authenticate with a credentials cache
    pub fn ccache(mut self, ccache: &Path) -> Self {
        self.ccache = Some(ccache.to_path_buf());
        self
    }

    /// Use kadmin.local, working directly on the local database
    pub fn local(mut self) -> Self {
        self.local = true;
        self
    }

    /// Validate the configuration and construct a [`KAdmin`]
    pub fn build(self) -> Result<KAdmin> {
        let auth = match (self.local, self.password, self.keytab, self.ccache) {
            (true, None, None, None) if self.server.is_none() => Auth::Local,
            (true, ..) => {
                return Err(Error::invalid(
                    "server, password, keytab or ccache cannot be specified with local",
                ));
            }
            (false, Some(password), None, None) => Auth::Password(password),
            (false, None, Some(keytab), None) => Auth::Keytab(keytab),
            (false, None, None, Some(ccache)) => Auth::Ccache(ccache),
            (false, ..) => {
                return Err(Error::invalid(
                    "exactly one authentication method (password, keytab or ccache) must be used",
                ));
            }
        };

        let program = if self.local {
            self.local_bin.unwrap_or_else(|| "kadmin.local".into())
        } else {
            self.bin.unwrap_or_else(|| "kadmin".into())
        };

        Ok(KAdmin {
            program,
            realm: self.realm,
            principal: self.principal,
            server: self.server,
            extra_options: self.extra_options,
            auth,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
        })
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['\n', '\r']) {
        return Err(Error::invalid("invalid principal name"));
    }
    Ok(())
}

fn check_pattern(pattern: &str) -> Result<()> {
    if pattern.is_empty() || pattern.contains(['\n', '\r']) {
        return Err(Error::invalid("invalid principal pattern"));
    }
    Ok(())
}

fn path_token(path: &Path) -> Result<String> {
    path.to_str()
        .filter(|path| !path.contains(['\n', '\r']))
        .map(String::from)
        .ok_or_else(|| Error::invalid(format!("unusable keytab path {}", path.display())))
}

/// `listprincs` prints one `name@REALM` per line, possibly after some banner lines
fn is_principal_name(line: &str) -> bool {
    match line.split_once('@') {
        Some((name, realm)) => {
            !name.is_empty()
                && !realm.is_empty()
                && !realm.contains('@')
                && !line.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Match `Principal "name@REALM" created.` (or `modified.`), case-insensitively
fn parse_principal_done(line: &str, expected: &str) -> Option<String> {
    let lower = line.to_ascii_lowercase();
    let mut search = 0;
    while let Some(found) = lower[search..].find("principal \"") {
        let start = search + found + "principal \"".len();
        let end = start + lower[start..].find('"')?;
        let rest = lower[end + 1..].trim_start();
        if end > start && rest.starts_with(expected) {
            return Some(line[start..end].to_owned());
        }
        search = end + 1;
    }
    None
}

/// Parse `Entry for principal name@REALM with kvno 2, encryption type ... added to keytab ...`
fn parse_keytab_added(line: &str) -> Result<(String, u32)> {
    let invalid = || Error::parse(TOOL, format!("unexpected keytab entry line {line:?}"));

    let lower = line.to_ascii_lowercase();
    let start = lower.find("principal ").ok_or_else(invalid)? + "principal ".len();
    let with_kvno = lower[start..].find(" with kvno ").ok_or_else(invalid)? + start;
    let name = &line[start..with_kvno];
    if name.is_empty() {
        return Err(invalid());
    }

    let kvno = line[with_kvno + " with kvno ".len()..]
        .split(|c: char| c == ',' || c.is_whitespace())
        .next()
        .and_then(|kvno| kvno.parse::<i64>().ok())
        .ok_or_else(invalid)?;
    if kvno <= 0 {
        return Err(Error::parse(
            TOOL,
            format!("invalid key version {kvno} for {name}"),
        ));
    }
    let kvno = u32::try_from(kvno).map_err(|_| invalid())?;
    Ok((name.to_owned(), kvno))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn args(cmd: &Cmd) -> Vec<String> {
        cmd.get_args()
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn builder_requires_one_auth_method() {
        let error = KAdmin::builder().build().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidArgument);

        let error = KAdmin::builder()
            .password("secret")
            .keytab(None)
            .build()
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidArgument);

        let error = KAdmin::builder()
            .local()
            .ccache(Path::new("/tmp/krb5cc_0"))
            .build()
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidArgument);

        let error = KAdmin::builder()
            .local()
            .server("kdc.example.org")
            .build()
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidArgument);

        assert!(KAdmin::builder().local().build().unwrap().is_local());
        assert!(!KAdmin::builder().keytab(None).build().unwrap().is_local());
    }

    #[test]
    fn command_line() -> Result<()> {
        let kadmin = KAdmin::builder()
            .realm("EXAMPLE.ORG")
            .principal("puppet/admin@EXAMPLE.ORG")
            .keytab(Some(Path::new("/etc/puppet.keytab")))
            .server("kdc.example.org")
            .extra_options(["-x", "ipa-setup-override-restrictions"])
            .build()?;
        let cmd = kadmin.command(
            &["getprinc".to_owned(), "-terse".to_owned(), "two words".to_owned()],
            None,
        );
        assert_eq!(
            args(&cmd),
            vec![
                "-r",
                "EXAMPLE.ORG",
                "-p",
                "puppet/admin@EXAMPLE.ORG",
                "-q",
                "getprinc -terse \"two words\"",
                "-k",
                "-t",
                "/etc/puppet.keytab",
                "-s",
                "kdc.example.org",
                "-x",
                "ipa-setup-override-restrictions",
            ]
        );
        Ok(())
    }

    #[test]
    fn command_line_local_and_password() -> Result<()> {
        let kadmin = KAdmin::builder().local().build()?;
        let cmd = kadmin.command(&["listprincs".to_owned(), "*".to_owned()], None);
        assert_eq!(args(&cmd), vec!["-q", "listprincs *"]);

        let kadmin = KAdmin::builder().password("hunter2").build()?;
        let cmd = kadmin.command(&["listprincs".to_owned()], None);
        // Never on the command line
        assert!(!args(&cmd).iter().any(|arg| arg.contains("hunter2")));
        assert!(!format!("{kadmin:?}").contains("hunter2"));
        Ok(())
    }

    #[test]
    fn kvno_selector() {
        assert_eq!("all".parse::<KvnoSelector>().unwrap(), KvnoSelector::All);
        assert_eq!("old".parse::<KvnoSelector>().unwrap(), KvnoSelector::Old);
        assert_eq!(
            "3".parse::<KvnoSelector>().unwrap(),
            KvnoSelector::Version(3)
        );
        for bad in ["0", "-1", "newest", ""] {
            let error = bad.parse::<KvnoSelector>().unwrap_err();
            assert_eq!(error.kind(), ErrorKind::InvalidArgument);
        }
        assert!(KvnoSelector::Version(0).validate().is_err());
        assert_eq!(KvnoSelector::Old.to_string(), "old");
    }

    #[test]
    fn principal_done() {
        assert_eq!(
            parse_principal_done("Principal \"alice@EXAMPLE.COM\" created.", "created"),
            Some("alice@EXAMPLE.COM".to_owned())
        );
        assert_eq!(
            parse_principal_done("Principal \"alice@EXAMPLE.COM\" modified.", "created"),
            None
        );
        assert_eq!(
            parse_principal_done("WARNING: no policy specified for alice@EXAMPLE.COM", "created"),
            None
        );
    }

    #[test]
    fn principal_names() {
        assert!(is_principal_name("alice@EXAMPLE.COM"));
        assert!(is_principal_name("HTTP/www.example.org@EXAMPLE.ORG"));
        assert!(!is_principal_name("Authenticating as principal a@B with password."));
        assert!(!is_principal_name("a@b@c"));
        assert!(!is_principal_name("@EXAMPLE.COM"));
        assert!(!is_principal_name("nobody"));
    }

    #[test]
    fn keytab_added() -> Result<()> {
        let line = "Entry for principal HTTP/www.example.org@EXAMPLE.ORG with kvno 4, \
                    encryption type aes256-cts-hmac-sha1-96 added to keytab \
                    WRFILE:/tmp/http.keytab.";
        assert_eq!(
            parse_keytab_added(line)?,
            ("HTTP/www.example.org@EXAMPLE.ORG".to_owned(), 4)
        );

        let line = "Entry for principal a@EXAMPLE.ORG with kvno 0, encryption type \
                    aes256-cts-hmac-sha1-96 added to keytab WRFILE:/tmp/a.keytab.";
        assert_eq!(parse_keytab_added(line).unwrap_err().kind(), ErrorKind::Admin);

        assert!(parse_keytab_added("added to keytab, somehow").is_err());
        Ok(())
    }

    #[test]
    fn empty_names_rejected() -> Result<()> {
        let kadmin = KAdmin::builder().local().bin("/nonexistent").build()?;
        for error in [
            kadmin.get_principal("").unwrap_err(),
            kadmin.add_principal("", &PrincipalOptions::new()).unwrap_err(),
            kadmin.list_principals(Some("")).unwrap_err(),
            kadmin
                .remove_keytab_entries("a@EXAMPLE.ORG", KvnoSelector::Version(0), None)
                .unwrap_err(),
            kadmin
                .modify_principal("a@EXAMPLE.ORG", &PrincipalOptions::new().password("a\nb"))
                .unwrap_err(),
        ] {
            assert_eq!(error.kind(), ErrorKind::InvalidArgument);
        }
        Ok(())
    }
}
