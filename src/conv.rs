//! Conversion utilities

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Unquote a string field from kadmin's terse output
///
/// A field wrapped in double quotes has its doubled quotes (`""`) collapsed. A bare field is
/// returned as is. Empty fields and unterminated quotes are rejected, including a closing quote
/// that is itself the second half of an escape.
pub(crate) fn unquote_field(field: &str) -> Option<String> {
    if let Some(rest) = field.strip_prefix('"') {
        let inner = rest.strip_suffix('"')?;
        let mut unquoted = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '"' && chars.next() != Some('"') {
                return None;
            }
            unquoted.push(c);
        }
        return Some(unquoted);
    }
    if field.is_empty() {
        None
    } else {
        Some(field.to_owned())
    }
}

/// Quote a token for inclusion in a kadmin query
///
/// Tokens containing whitespace are wrapped in double quotes, doubling any embedded quote.
pub(crate) fn quote_token(token: &str) -> String {
    if !token.is_empty() && !token.chars().any(char::is_whitespace) {
        return token.to_owned();
    }
    format!("\"{}\"", token.replace('"', "\"\""))
}

/// Convert a krb5 timestamp to a [`DateTime<Utc>`]
///
/// `0` means "never". krb5 timestamps are unsigned 32-bit values printed as signed integers, so
/// negative values wrap past 2038. Values that fit in neither are rejected.
pub(crate) fn ts_to_dt(ts: i64) -> Option<Option<DateTime<Utc>>> {
    let ts = match ts {
        0 => return Some(None),
        ts if ts < 0 => i64::from(i32::try_from(ts).ok()? as u32),
        ts => i64::from(u32::try_from(ts).ok()?),
    };
    DateTime::from_timestamp(ts, 0).map(Some)
}

/// Convert a krb5 delta to a [`Duration`]
///
/// `0` means "unlimited"
pub(crate) fn delta_to_dur(delta: u64) -> Option<Duration> {
    if delta == 0 {
        None
    } else {
        Some(Duration::from_secs(delta))
    }
}

/// Format a [`DateTime<Utc>`] the way kadmin's date parser accepts it
pub(crate) fn dt_to_string(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S %z").to_string()
}
