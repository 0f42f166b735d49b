//! Server name resolution and hostname validation.

use std::fmt::{self, Display, Formatter};
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{ConfigError, ConfigResult};

/// Longest accepted hostname, in bytes.
pub const MAX_HOSTNAME_LEN: usize = 252;
/// Longest accepted label, in bytes.
pub const MAX_LABEL_LEN: usize = 63;

/// Validated, lower-cased hostname the site is served under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ServerName(String);

impl ServerName {
    /// Turn the command-line server argument into a validated hostname.
    ///
    /// A dotted IPv4 address becomes `a-b-c-d<ip_suffix>` before validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidHostname`] when the result breaks hostname rules.
    pub fn resolve(raw: &str, ip_suffix: &str) -> ConfigResult<Self> {
        let candidate = Ipv4Addr::from_str(raw)
            .map_or_else(|_| raw.to_string(), |ip| ipv4_to_hostname(ip, ip_suffix));
        Self::parse(&candidate)
    }

    /// Validate `raw` as a hostname.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidHostname`] when `raw` breaks hostname rules.
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        validate_hostname(raw)?;
        Ok(Self(raw.to_ascii_lowercase()))
    }

    /// Hostname text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ServerName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Dash-join the octets of `ip` and append `suffix`.
#[must_use]
pub fn ipv4_to_hostname(ip: Ipv4Addr, suffix: &str) -> String {
    let [a, b, c, d] = ip.octets();
    format!("{a}-{b}-{c}-{d}{suffix}")
}

/// Check hostname length, label length, label characters, and hyphen placement.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidHostname`] naming the first rule that fails.
pub fn validate_hostname(name: &str) -> ConfigResult<()> {
    if name.len() > MAX_HOSTNAME_LEN {
        return Err(ConfigError::hostname(name, None, "too_long"));
    }
    for label in name.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(ConfigError::hostname(name, Some(label), "label_length"));
        }
        if !label
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'-')
        {
            return Err(ConfigError::hostname(name, Some(label), "invalid_character"));
        }
        if label.starts_with('-') {
            return Err(ConfigError::hostname(name, Some(label), "leading_hyphen"));
        }
        if label.ends_with('-') {
            return Err(ConfigError::hostname(name, Some(label), "trailing_hyphen"));
        }
    }
    Ok(())
}
