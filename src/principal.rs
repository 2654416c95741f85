//! kadmin principal

use std::{str::FromStr, time::Duration};

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use getset::{CopyGetters, Getters};

use crate::{
    conv::{delta_to_dur, dt_to_string, ts_to_dt, unquote_field},
    error::{Error, Result},
};

/// Policy field value kadmin uses when a principal has no policy
const POLICY_NONE: &str = "[none]";

bitflags! {
    /// Attributes set on a principal
    ///
    /// See `man kadmin(1)`, under the `add_principal` section for an explanation
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    #[repr(transparent)]
    pub struct PrincipalAttributes: i32 {
        /// Prohibits the principal from obtaining postdated tickets
        const DisallowPostdated = 0x0000_0001;
        /// Prohibits the principal from obtaining forwardable tickets
        const DisallowForwardable = 0x0000_0002;
        /// Specifies that a Ticket-Granting Service (TGS) request for a service ticket for the principal is not permitted
        const DisallowTgtBased = 0x0000_0004;
        /// Prohibits the principal from obtaining renewable tickets
        const DisallowRenewable = 0x0000_0008;
        /// Prohibits the principal from obtaining proxiable tickets
        const DisallowProxiable = 0x0000_0010;
        /// Disables user-to-user authentication for the principal by prohibiting this principal from obtaining a session key for another user
        const DisallowDupSkey = 0x0000_0020;
        /// Forbids the issuance of any tickets for the principal
        const DisallowAllTix = 0x0000_0040;
        /// Requires the principal to preauthenticate before being allowed to kinit
        const RequiresPreAuth = 0x0000_0080;
        /// Requires the principal to preauthenticate using a hardware device before being allowed to kinit
        const RequiresHwAuth = 0x0000_0100;
        /// Force a password change
        const RequiresPwChange = 0x0000_0200;
        /// Prohibits the issuance of service tickets for the principal
        const DisallowSvr = 0x0000_1000;
        /// Marks the principal as a password change service principal
        const PwChangeService = 0x0000_2000;
        /// An AS_REQ for a principal with this bit set and an encrytion type of ENCTYPE_DES_CBC_CRC causes the encryption type ENCTYPE_DES_CBC_MD5 to be used instead
        const SupportDesMd5 = 0x0000_4000;
        /// Allow kadmin administrators with `add` acls to modify the principal until this bit is cleared
        const NewPrinc = 0x0000_8000;
        /// Sets the OK-AS-DELEGATE flag on tickets issued for use with the principal as the service, which clients may use as a hint that credentials can and should be delegated when authenticating to the service
        const OkAsDelegate = 0x0010_0000;
        /// Sets the service to allow the use of S4U2Self
        const OkToAuthAsDelegate = 0x0020_0000;
        /// Prevents PAC or AD-SIGNEDPATH data from being added to service tickets for the principal
        const NoAuthDataRequired = 0x0040_0000;
        /// Prevents keys for the principal from being extracted or set to a known value by the kadmin protocol
        const LockdownKeys = 0x0080_0000;

        const _ = !0;
    }
}

/// kadmin flags toggling a single attribute, and whether the flag is inverted (`+flag` clears
/// the attribute)
const ATTRIBUTE_FLAGS: [(PrincipalAttributes, &str, bool); 16] = [
    (PrincipalAttributes::DisallowPostdated, "allow_postdated", true),
    (PrincipalAttributes::DisallowForwardable, "allow_forwardable", true),
    (PrincipalAttributes::DisallowTgtBased, "allow_tgs_req", true),
    (PrincipalAttributes::DisallowRenewable, "allow_renewable", true),
    (PrincipalAttributes::DisallowProxiable, "allow_proxiable", true),
    (PrincipalAttributes::DisallowDupSkey, "allow_dup_skey", true),
    (PrincipalAttributes::DisallowAllTix, "allow_tix", true),
    (PrincipalAttributes::RequiresPreAuth, "requires_preauth", false),
    (PrincipalAttributes::RequiresHwAuth, "requires_hwauth", false),
    (PrincipalAttributes::RequiresPwChange, "needchange", false),
    (PrincipalAttributes::DisallowSvr, "allow_svr", true),
    (PrincipalAttributes::PwChangeService, "password_changing_service", false),
    (PrincipalAttributes::OkAsDelegate, "ok_as_delegate", false),
    (PrincipalAttributes::OkToAuthAsDelegate, "ok_to_auth_as_delegate", false),
    (PrincipalAttributes::NoAuthDataRequired, "no_auth_data_required", false),
    (PrincipalAttributes::LockdownKeys, "lockdown_keys", false),
];

impl PrincipalAttributes {
    fn kadmin_flag(self) -> Option<(&'static str, bool)> {
        ATTRIBUTE_FLAGS
            .iter()
            .find(|(attribute, _, _)| *attribute == self)
            .map(|(_, name, inverted)| (*name, *inverted))
    }
}

/// A kadmin principal, as returned by `getprinc -terse`
///
/// This is a snapshot taken when the principal was fetched. Key versions in particular can
/// change at any time afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Getters, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct Principal {
    /// The principal name
    #[getset(skip)]
    name: String,
    /// When the principal expires
    expire_time: Option<DateTime<Utc>>,
    /// When the password was last changed
    last_password_change: Option<DateTime<Utc>>,
    /// When the password expires
    password_expiration: Option<DateTime<Utc>>,
    /// Maximum ticket life, `None` for unlimited
    max_life: Option<Duration>,
    /// Last principal to modify this principal
    #[getset(skip)]
    modified_by: String,
    /// When the principal was last modified
    modified_at: Option<DateTime<Utc>>,
    /// See [`PrincipalAttributes`]
    attributes: PrincipalAttributes,
    /// Current key version number
    kvno: u32,
    /// Master key version number
    mkvno: u32,
    /// Associated policy
    #[getset(skip)]
    policy: Option<String>,
    /// Maximum renewable ticket life, `None` for unlimited
    max_renewable_life: Option<Duration>,
    /// When the last successful authentication occurred
    last_success: Option<DateTime<Utc>>,
    /// When the last failed authentication occurred
    last_failed: Option<DateTime<Utc>>,
    /// Number of failed authentication attempts
    fail_auth_count: u32,
}

impl Principal {
    /// Parse a record from `getprinc -terse`
    ///
    /// The record is tab-separated and its fields are positional. This order is the wire format
    /// of kadmin's terse output and must not change:
    ///
    /// | # | field                  | kind      |
    /// |---|------------------------|-----------|
    /// | 0 | name                   | string    |
    /// | 1 | expire time            | timestamp |
    /// | 2 | last password change   | timestamp |
    /// | 3 | password expiration    | timestamp |
    /// | 4 | max ticket life        | interval  |
    /// | 5 | modified by            | string    |
    /// | 6 | modified at            | timestamp |
    /// | 7 | attributes             | integer   |
    /// | 8 | key version            | integer   |
    /// | 9 | master key version     | integer   |
    /// | 10| policy                 | string    |
    /// | 11| max renewable life     | interval  |
    /// | 12| last success           | timestamp |
    /// | 13| last failed            | timestamp |
    /// | 14| failed auth count      | integer   |
    ///
    /// Timestamps and intervals of `0` mean "never" and "unlimited" respectively. String fields
    /// may be double-quoted, with embedded quotes doubled. Trailing fields (key data) are
    /// ignored.
    pub(crate) fn from_terse(line: &str) -> Result<Self> {
        let mut fields = TerseFields {
            fields: line.trim_end_matches(['\r', '\n']).split('\t'),
        };
        let principal = Self {
            name: fields.string("name")?,
            expire_time: fields.time("expire time")?,
            last_password_change: fields.time("last password change")?,
            password_expiration: fields.time("password expiration")?,
            max_life: fields.interval("max life")?,
            modified_by: fields.string("modified by")?,
            modified_at: fields.time("modified at")?,
            attributes: PrincipalAttributes::from_bits_retain(fields.int("attributes")?),
            kvno: fields.int("key version")?,
            mkvno: fields.int("master key version")?,
            policy: Some(fields.string("policy")?).filter(|policy| policy != POLICY_NONE),
            max_renewable_life: fields.interval("max renewable life")?,
            last_success: fields.time("last success")?,
            last_failed: fields.time("last failed")?,
            fail_auth_count: fields.int("failed auth count")?,
        };
        if principal.name.is_empty() {
            return Err(Error::parse("kadmin", "empty principal name"));
        }
        Ok(principal)
    }

    /// The principal name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last principal to modify this principal
    pub fn modified_by(&self) -> &str {
        &self.modified_by
    }

    /// Associated policy
    pub fn policy(&self) -> Option<&str> {
        self.policy.as_deref()
    }
}

struct TerseFields<'a> {
    fields: std::str::Split<'a, char>,
}

impl<'a> TerseFields<'a> {
    fn next(&mut self, what: &str) -> Result<&'a str> {
        self.fields
            .next()
            .ok_or_else(|| Error::parse("kadmin", format!("missing {what} field")))
    }

    fn string(&mut self, what: &str) -> Result<String> {
        let raw = self.next(what)?;
        unquote_field(raw)
            .ok_or_else(|| Error::parse("kadmin", format!("invalid {what} field {raw:?}")))
    }

    fn int<T: FromStr>(&mut self, what: &str) -> Result<T> {
        let raw = self.next(what)?;
        raw.parse()
            .map_err(|_| Error::parse("kadmin", format!("invalid {what} field {raw:?}")))
    }

    fn time(&mut self, what: &str) -> Result<Option<DateTime<Utc>>> {
        let ts = self.int::<i64>(what)?;
        ts_to_dt(ts).ok_or_else(|| Error::parse("kadmin", format!("invalid {what} field {ts}")))
    }

    fn interval(&mut self, what: &str) -> Result<Option<Duration>> {
        Ok(delta_to_dur(self.int(what)?))
    }
}

/// Value of an option passed to `addprinc` or `modprinc`
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::exhaustive_enums)]
pub enum OptionValue {
    /// Toggled flag, rendered as `+name` or `-name`
    Flag(bool),
    /// Text value, rendered as `-name value`
    Text(String),
    /// Non-negative number, rendered as `-name value`
    Number(i64),
    /// Point in time, rendered as `-name "YYYY-mm-dd HH:MM:SS +zzzz"`
    Timestamp(DateTime<Utc>),
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<u32> for OptionValue {
    fn from(value: u32) -> Self {
        Self::Number(value.into())
    }
}

impl From<DateTime<Utc>> for OptionValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum OptionEntry {
    /// Bare `-name`
    Switch(&'static str),
    Value(String, OptionValue),
}

/// Options for creating or modifying a principal
///
/// Options are rendered in the order they were set. They are only validated when the command is
/// assembled, see [`KAdminImpl::add_principal`][`crate::KAdminImpl::add_principal`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrincipalOptions {
    entries: Vec<OptionEntry>,
    password: Option<String>,
}

impl PrincipalOptions {
    /// Construct an empty set of options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an arbitrary option. See [`OptionValue`] for how values are rendered
    pub fn option(mut self, name: &str, value: impl Into<OptionValue>) -> Self {
        self.entries
            .push(OptionEntry::Value(name.to_owned(), value.into()));
        self
    }

    /// Toggle a flag such as `allow_tix` or `requires_preauth`
    pub fn flag(self, name: &str, enabled: bool) -> Self {
        self.option(name, OptionValue::Flag(enabled))
    }

    /// Set or clear a single [`PrincipalAttributes`] flag
    ///
    /// Attributes without a kadmin flag, or combinations of several attributes, are rejected
    /// when the command is assembled.
    pub fn attribute(self, attribute: PrincipalAttributes, set: bool) -> Self {
        match attribute.kadmin_flag() {
            Some((name, inverted)) => self.flag(name, set != inverted),
            None => self.option("", OptionValue::Flag(set)),
        }
    }

    /// Use this password for the principal
    ///
    /// It is written to kadmin's standard input and never appears on its command line.
    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_owned());
        self
    }

    /// Let the server generate a random key
    pub fn randkey(mut self) -> Self {
        self.entries.push(OptionEntry::Switch("randkey"));
        self
    }

    /// Create the principal without any key
    pub fn nokey(mut self) -> Self {
        self.entries.push(OptionEntry::Switch("nokey"));
        self
    }

    /// Set the policy, `None` clears it
    pub fn policy(mut self, policy: Option<&str>) -> Self {
        match policy {
            Some(policy) => self.option("policy", policy),
            None => {
                self.entries.push(OptionEntry::Switch("clearpolicy"));
                self
            }
        }
    }

    /// Set when the principal expires
    pub fn expire_time(self, expire_time: DateTime<Utc>) -> Self {
        self.option("expire", expire_time)
    }

    /// Set when the password expires
    pub fn password_expiration(self, password_expiration: DateTime<Utc>) -> Self {
        self.option("pwexpire", password_expiration)
    }

    /// Set the maximum ticket life
    pub fn max_life(self, max_life: Duration) -> Self {
        self.option("maxlife", duration_secs(max_life))
    }

    /// Set the maximum renewable ticket life
    pub fn max_renewable_life(self, max_renewable_life: Duration) -> Self {
        self.option("maxrenewlife", duration_secs(max_renewable_life))
    }

    /// Set the key version number
    pub fn kvno(self, kvno: u32) -> Self {
        self.option("kvno", kvno)
    }

    pub(crate) fn get_password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Whether the options already say how the key should be set
    pub(crate) fn sets_key(&self) -> bool {
        self.password.is_some()
            || self
                .entries
                .iter()
                .any(|entry| matches!(entry, OptionEntry::Switch("randkey" | "nokey")))
    }

    /// Validate the options and render them as query tokens
    pub(crate) fn to_tokens(&self) -> Result<Vec<String>> {
        if let Some(password) = &self.password {
            if password.is_empty() || password.contains(['\n', '\r']) {
                return Err(Error::invalid("invalid or empty password"));
            }
        }

        let mut tokens = Vec::with_capacity(self.entries.len() * 2);
        for entry in &self.entries {
            match entry {
                OptionEntry::Switch(name) => tokens.push(format!("-{name}")),
                OptionEntry::Value(name, value) => {
                    check_option_name(name)?;
                    match value {
                        OptionValue::Flag(enabled) => {
                            tokens.push(format!("{}{name}", if *enabled { '+' } else { '-' }));
                        }
                        OptionValue::Text(text) => {
                            if text.is_empty() || text.contains(['\n', '\r']) {
                                return Err(Error::invalid(format!(
                                    "invalid value for option {name}"
                                )));
                            }
                            tokens.push(format!("-{name}"));
                            tokens.push(text.clone());
                        }
                        OptionValue::Number(number) => {
                            if *number < 0 {
                                return Err(Error::invalid(format!(
                                    "negative value for option {name}"
                                )));
                            }
                            tokens.push(format!("-{name}"));
                            tokens.push(number.to_string());
                        }
                        OptionValue::Timestamp(dt) => {
                            tokens.push(format!("-{name}"));
                            tokens.push(dt_to_string(dt));
                        }
                    }
                }
            }
        }
        Ok(tokens)
    }
}

fn duration_secs(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

fn check_option_name(name: &str) -> Result<()> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(Error::invalid(format!("invalid option name {name:?}")))
    }
}
