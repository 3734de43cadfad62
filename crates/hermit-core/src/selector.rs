//! Selectors: predicates over package references.

use crate::error::{Error, Result};
use crate::reference::{split_name_version, Reference};
use crate::version::Version;
use std::fmt;

/// A predicate over references: the resolver's input.
#[derive(Debug, Clone)]
pub enum Selector {
    /// Bare package name; matches every version and channel.
    Name(String),
    /// Exact reference match.
    Exact(Reference),
    /// Version-prefix match (`go-1.2` accepts `go-1.2.3`).
    Prefix(Reference),
    /// Shell-glob over the version string, with optional channel pin.
    Glob {
        /// Package name.
        name: String,
        /// Compiled version glob, when the selector constrains versions.
        pattern: Option<glob::Pattern>,
        /// Channel pin.
        channel: Option<String>,
    },
}

impl Selector {
    /// Parse a plain selector: a bare name or an exact reference.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let reference = Reference::parse(s);
        if reference.is_fully_qualified() {
            Self::Exact(reference)
        } else {
            Self::Name(reference.name)
        }
    }

    /// Parse a selector whose version part may be a shell glob.
    ///
    /// The name/version boundary follows reference splitting. A version
    /// part containing any of `*[]{}?` (or starting with a digit) compiles
    /// as a glob over the full version string; anything else is a literal
    /// version prefix.
    pub fn parse_glob(s: &str) -> Result<Self> {
        let (body, channel) = match s.split_once('@') {
            Some((body, channel)) if !channel.is_empty() => (body, Some(channel.to_string())),
            Some((body, _)) => (body, None),
            None => (s, None),
        };
        let (name, version) = match split_name_version(body) {
            (name, Some(version)) => (name, Some(version)),
            // A glob version part may not start with a digit, in which case
            // reference splitting finds no boundary: re-split on the last
            // hyphen when the tail holds glob metacharacters.
            (whole, None) => match whole.rsplit_once('-') {
                Some((name, tail)) if is_glob(tail) => (name, Some(tail)),
                _ => (whole, None),
            },
        };
        match version {
            None => match channel {
                Some(channel) => Ok(Self::Glob {
                    name: name.to_string(),
                    pattern: None,
                    channel: Some(channel),
                }),
                None => Ok(Self::Name(name.to_string())),
            },
            Some(version) if is_glob(version) || version.starts_with(|c: char| c.is_ascii_digit()) => {
                let pattern = glob::Pattern::new(version).map_err(|e| {
                    Error::other("selector", format!("invalid version glob {version:?}: {e}"))
                })?;
                Ok(Self::Glob {
                    name: name.to_string(),
                    pattern: Some(pattern),
                    channel,
                })
            }
            Some(version) => {
                let mut reference = Reference::with_version(name, Version::parse(version));
                reference.channel = channel;
                Ok(Self::Prefix(reference))
            }
        }
    }

    /// Prefix selector over an existing reference.
    #[must_use]
    pub fn prefix(reference: Reference) -> Self {
        Self::Prefix(reference)
    }

    /// Exact selector over an existing reference.
    #[must_use]
    pub fn exact(reference: Reference) -> Self {
        Self::Exact(reference)
    }

    /// Base package name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Glob { name, .. } => name,
            Self::Exact(reference) | Self::Prefix(reference) => &reference.name,
        }
    }

    /// Whether the selector constrains version or channel at all. A bare
    /// name is the only unqualified form, and the only one the manifest
    /// `default` substitutes for.
    #[must_use]
    pub fn is_fully_qualified(&self) -> bool {
        !matches!(self, Self::Name(_))
    }

    /// The predicate.
    #[must_use]
    pub fn matches(&self, reference: &Reference) -> bool {
        match self {
            Self::Name(name) => name == &reference.name,
            Self::Exact(want) => {
                want.name == reference.name
                    && want.version == reference.version
                    && want.channel == reference.channel
            }
            Self::Prefix(want) => want.matches(reference),
            Self::Glob {
                name,
                pattern,
                channel,
            } => {
                if name != &reference.name {
                    return false;
                }
                if let Some(pattern) = pattern {
                    match &reference.version {
                        Some(version) => {
                            if !pattern.matches(&version.to_string()) {
                                return false;
                            }
                        }
                        None => return false,
                    }
                }
                match channel {
                    Some(channel) => reference.channel.as_deref() == Some(channel.as_str()),
                    None => true,
                }
            }
        }
    }
}

fn is_glob(s: &str) -> bool {
    s.contains(['*', '[', ']', '{', '}', '?'])
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Exact(reference) | Self::Prefix(reference) => write!(f, "{reference}"),
            Self::Glob {
                name,
                pattern,
                channel,
            } => {
                f.write_str(name)?;
                if let Some(pattern) = pattern {
                    write!(f, "-{}", pattern.as_str())?;
                }
                if let Some(channel) = channel {
                    write!(f, "@{channel}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_selector_matches_longer_versions() {
        let selector = Selector::prefix(Reference::parse("foo-1.2"));
        assert!(selector.matches(&Reference::parse("foo-1.2.3")));
        assert!(!selector.matches(&Reference::parse("foo-1.3.3")));
    }

    #[test]
    fn glob_selector_on_channel() {
        let selector = Selector::parse_glob("foo@bar").unwrap();
        assert!(selector.matches(&Reference::parse("foo@bar")));
        assert!(!selector.matches(&Reference::parse("foo@baz")));
        assert!(selector.is_fully_qualified());
    }

    #[test]
    fn glob_selector_on_version() {
        let selector = Selector::parse_glob("foo-1.2.*").unwrap();
        assert!(selector.matches(&Reference::parse("foo-1.2.0")));
        assert!(selector.matches(&Reference::parse("foo-1.2.11")));
        assert!(!selector.matches(&Reference::parse("foo-1.3.0")));
        assert!(!selector.matches(&Reference::parse("foo")));
    }

    #[test]
    fn digit_leading_version_is_an_exact_glob() {
        let selector = Selector::parse_glob("foo-1.2").unwrap();
        assert!(selector.matches(&Reference::parse("foo-1.2")));
        // A glob without wildcards matches the literal string only.
        assert!(!selector.matches(&Reference::parse("foo-1.2.3")));
    }

    #[test]
    fn bare_name_is_unqualified() {
        let selector = Selector::parse("foo");
        assert!(!selector.is_fully_qualified());
        assert!(selector.matches(&Reference::parse("foo-9.9")));
        assert!(selector.matches(&Reference::parse("foo@stable")));
    }

    #[test]
    fn exact_selector_requires_equality() {
        let selector = Selector::parse("foo-1.2.3");
        assert!(selector.matches(&Reference::parse("foo-1.2.3")));
        assert!(!selector.matches(&Reference::parse("foo-1.2.3@stable")));
        assert!(!selector.matches(&Reference::parse("foo-1.2")));
    }
}
