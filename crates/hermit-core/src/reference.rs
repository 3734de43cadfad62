//! Package references: `name[-version][@channel]`.

use crate::version::Version;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A reference identifies a desired package, optionally pinned to a
/// version prefix and/or a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Package name.
    pub name: String,
    /// Version, possibly partial (`1`, `1.2`, `1.2.3`).
    pub version: Option<Version>,
    /// Channel (`stable`, `latest`, ...).
    pub channel: Option<String>,
}

impl Reference {
    /// Name-only reference.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            channel: None,
        }
    }

    /// Reference pinned to a version.
    #[must_use]
    pub fn with_version(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version: Some(version),
            channel: None,
        }
    }

    /// Reference pinned to a channel.
    #[must_use]
    pub fn with_channel(name: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            channel: Some(channel.into()),
        }
    }

    /// Parse `name[-version][@channel]`.
    ///
    /// The version boundary is the first `-` whose following character is
    /// an ASCII digit, so `graphql-java-11.0` splits into `graphql-java`
    /// and `11.0`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let (body, channel) = match s.split_once('@') {
            Some((body, channel)) if !channel.is_empty() => (body, Some(channel.to_string())),
            Some((body, _)) => (body, None),
            None => (s, None),
        };
        let (name, version) = split_name_version(body);
        Self {
            name: name.to_string(),
            version: version.map(Version::parse),
            channel,
        }
    }

    /// True when this reference pins a version or a channel.
    #[must_use]
    pub fn is_fully_qualified(&self) -> bool {
        self.version.is_some() || self.channel.is_some()
    }

    /// True when `other` satisfies this reference: equal name, version a
    /// prefix of `other`'s, and equal channel when one is pinned here.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        if self.name != other.name {
            return false;
        }
        if let Some(version) = &self.version {
            match &other.version {
                Some(ov) if version.is_prefix_of(ov) => {}
                _ => return false,
            }
        }
        if let Some(channel) = &self.channel {
            if other.channel.as_deref() != Some(channel.as_str()) {
                return false;
            }
        }
        true
    }

    /// Total order: name, then channel-less before channelled at equal
    /// version weight (so a plain version out-ranks a channel when picking
    /// the highest reference), then channel, then version.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        match self.name.cmp(&other.name) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match (&self.channel, &other.channel) {
            (None, Some(_)) => return Ordering::Greater,
            (Some(_), None) => return Ordering::Less,
            (Some(a), Some(b)) => match a.cmp(b) {
                Ordering::Equal => {}
                ord => return ord,
            },
            (None, None) => {}
        }
        match (&self.version, &other.version) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

/// Split a `name-version` body at the first `-` followed by a digit.
#[must_use]
pub fn split_name_version(body: &str) -> (&str, Option<&str>) {
    let bytes = body.as_bytes();
    for i in 0..bytes.len() {
        if bytes[i] == b'-' && i + 1 < bytes.len() && bytes[i + 1].is_ascii_digit() {
            return (&body[..i], Some(&body[i + 1..]));
        }
    }
    (body, None)
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(version) = &self.version {
            write!(f, "-{version}")?;
        }
        if let Some(channel) = &self.channel {
            write!(f, "@{channel}")?;
        }
        Ok(())
    }
}

impl FromStr for Reference {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}
