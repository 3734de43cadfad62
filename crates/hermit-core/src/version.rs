//! Loosely-parsed version algebra.
//!
//! Hermit versions are not semver: anything a release page can emit must
//! parse. A version is an ordered list of dot/underscore-separated
//! components, an optional `-prerelease` tail, and optional `+metadata`.
//! Parsing never fails; inputs the primary pattern rejects collapse to a
//! single opaque component.

use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([0-9A-Za-z]+(?:[._][0-9A-Za-z]+)*)(?:-([0-9A-Za-z._-]+))?(?:\+([0-9A-Za-z._-]+))?$",
    )
    .expect("version pattern")
});

/// A loosely parsed version.
///
/// The original text is retained so formatting round-trips.
#[derive(Debug, Clone)]
pub struct Version {
    text: String,
    components: Vec<String>,
    prerelease: String,
    metadata: String,
}

impl Version {
    /// Parse a version. Never fails: input that does not match the primary
    /// pattern becomes a single opaque component.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if let Some(caps) = VERSION_RE.captures(s) {
            let head = caps.get(1).map_or("", |m| m.as_str());
            Self {
                text: s.to_string(),
                components: head.split(['.', '_']).map(str::to_string).collect(),
                prerelease: caps.get(2).map_or_else(String::new, |m| m.as_str().to_string()),
                metadata: caps.get(3).map_or_else(String::new, |m| m.as_str().to_string()),
            }
        } else {
            Self {
                text: s.to_string(),
                components: vec![s.to_string()],
                prerelease: String::new(),
                metadata: String::new(),
            }
        }
    }

    /// Dot/underscore-separated head components.
    #[must_use]
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// The `-`-delimited prerelease tail, empty when absent.
    #[must_use]
    pub fn prerelease(&self) -> &str {
        &self.prerelease
    }

    /// The `+`-delimited build metadata, empty when absent.
    #[must_use]
    pub fn metadata(&self) -> &str {
        &self.metadata
    }

    /// True when the version carries a prerelease tail.
    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }

    /// The version truncated to its first component, retaining
    /// prerelease and metadata.
    #[must_use]
    pub fn major(&self) -> Self {
        self.truncated(1)
    }

    /// The version truncated to its first two components, retaining
    /// prerelease and metadata.
    #[must_use]
    pub fn major_minor(&self) -> Self {
        self.truncated(2)
    }

    fn truncated(&self, n: usize) -> Self {
        let components: Vec<String> = self.components.iter().take(n).cloned().collect();
        let mut text = components.join(".");
        if !self.prerelease.is_empty() {
            text.push('-');
            text.push_str(&self.prerelease);
        }
        if !self.metadata.is_empty() {
            text.push('+');
            text.push_str(&self.metadata);
        }
        Self {
            text,
            components,
            prerelease: self.prerelease.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// True when `self`'s components (and prerelease, when present) are a
    /// prefix of `other`'s. This is the matching rule used by references
    /// and prefix selectors: `1.2` accepts `1.2.3` but not `1.20`.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        if self.components.len() > other.components.len() {
            return false;
        }
        for (a, b) in self.components.iter().zip(&other.components) {
            if compare_component(a, b) != Ordering::Equal {
                return false;
            }
        }
        if self.prerelease.is_empty() {
            // "1.2" intentionally accepts "1.2.3-rc1": the prefix is on the
            // release components only.
            return true;
        }
        other.prerelease.starts_with(&self.prerelease)
    }
}

fn compare_component(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

fn compare_parts(a: &[&str], b: &[&str]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match compare_component(x, y) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let a: Vec<&str> = self.components.iter().map(String::as_str).collect();
        let b: Vec<&str> = other.components.iter().map(String::as_str).collect();
        match compare_parts(&a, &b) {
            Ordering::Equal => {}
            other => return other,
        }
        // Equal components: a prerelease sorts before the release proper.
        match (self.prerelease.is_empty(), other.prerelease.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let a: Vec<&str> = self.prerelease.split('.').collect();
                let b: Vec<&str> = other.prerelease.split('.').collect();
                compare_parts(&a, &b)
            }
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Version {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// An ordered collection of versions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Versions(Vec<Version>);

impl Versions {
    /// Wrap an existing list.
    #[must_use]
    pub fn new(versions: Vec<Version>) -> Self {
        Self(versions)
    }

    /// Stable ascending sort.
    pub fn sort(&mut self) {
        self.0.sort_by(Version::cmp);
    }

    /// Highest version, after sorting.
    #[must_use]
    pub fn latest(&self) -> Option<&Version> {
        self.0.iter().max_by(|a, b| a.cmp(b))
    }

    /// All versions.
    #[must_use]
    pub fn as_slice(&self) -> &[Version] {
        &self.0
    }

    /// Whether any version is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a version.
    pub fn push(&mut self, version: Version) {
        self.0.push(version);
    }
}

impl FromIterator<Version> for Versions {
    fn from_iter<T: IntoIterator<Item = Version>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Versions {
    type Item = Version;
    type IntoIter = std::vec::IntoIter<Version>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Versions {
    type Item = &'a Version;
    type IntoIter = std::slice::Iter<'a, Version>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("1.2.3", &["1", "2", "3"], "", "" ; "plain triple")]
    #[test_case("1.21rc1", &["1", "21rc1"], "", "" ; "alphanumeric component")]
    #[test_case("1.2.3-rc1", &["1", "2", "3"], "rc1", "" ; "prerelease")]
    #[test_case("1.2.3+build.5", &["1", "2", "3"], "", "build.5" ; "metadata")]
    #[test_case("1.2.3-rc1+build.5", &["1", "2", "3"], "rc1", "build.5" ; "both tails")]
    #[test_case("11_0_2", &["11", "0", "2"], "", "" ; "underscore separators")]
    fn parse_components(s: &str, components: &[&str], prerelease: &str, metadata: &str) {
        let v = Version::parse(s);
        assert_eq!(v.components(), components);
        assert_eq!(v.prerelease(), prerelease);
        assert_eq!(v.metadata(), metadata);
        assert_eq!(v.to_string(), s);
    }

    #[test]
    fn unparseable_becomes_opaque() {
        let v = Version::parse("not a version!");
        assert_eq!(v.components(), ["not a version!"]);
        assert_eq!(v.to_string(), "not a version!");
    }

    #[test_case("1.2.3", "1.2.4", Ordering::Less ; "numeric patch")]
    #[test_case("1.2", "1.2.0", Ordering::Less ; "shorter is smaller")]
    #[test_case("1.10", "1.9", Ordering::Greater ; "numeric not lexicographic")]
    #[test_case("1.2.3-rc1", "1.2.3", Ordering::Less ; "prerelease first")]
    #[test_case("1.2.3-rc1", "1.2.3-rc2", Ordering::Less ; "prerelease ordering")]
    #[test_case("1.2.3-rc", "1.2.3-rc.1", Ordering::Less ; "shorter prerelease first")]
    #[test_case("1.2.3", "1.2.3", Ordering::Equal ; "equal")]
    #[test_case("1.2.3+a", "1.2.3+b", Ordering::Equal ; "metadata ignored")]
    #[test_case("1.2a", "1.2b", Ordering::Less ; "lexicographic fallback")]
    fn ordering(a: &str, b: &str, expected: Ordering) {
        assert_eq!(Version::parse(a).cmp(&Version::parse(b)), expected);
    }

    #[test]
    fn major_and_major_minor_retain_tails() {
        let v = Version::parse("1.2.3-rc1+meta");
        assert_eq!(v.major().to_string(), "1-rc1+meta");
        assert_eq!(v.major_minor().to_string(), "1.2-rc1+meta");
    }

    #[test_case("1.2", "1.2.3", true ; "component prefix")]
    #[test_case("1.2", "1.20", false ; "no digit-prefix confusion")]
    #[test_case("1.2.3", "1.2", false ; "longer does not prefix shorter")]
    #[test_case("1.2-rc", "1.2-rc1", true ; "prerelease string prefix")]
    #[test_case("1.2-rc2", "1.2-rc1", false ; "prerelease mismatch")]
    #[test_case("1.2", "1.2", true ; "exact")]
    fn prefix_matching(a: &str, b: &str, expected: bool) {
        assert_eq!(Version::parse(a).is_prefix_of(&Version::parse(b)), expected);
    }

    #[test]
    fn sort_is_stable_and_ordered() {
        let mut versions: Versions = ["1.0.1", "1.0.0", "2.0", "1.0.0-rc1", "1.0"]
            .iter()
            .map(|s| Version::parse(s))
            .collect();
        versions.sort();
        let sorted: Vec<String> = versions.as_slice().iter().map(ToString::to_string).collect();
        assert_eq!(sorted, ["1.0", "1.0.0-rc1", "1.0.0", "1.0.1", "2.0"]);
        assert_eq!(versions.latest().unwrap().to_string(), "2.0");
    }

    proptest! {
        /// Compare is antisymmetric.
        #[test]
        fn prop_antisymmetric(a in "[0-9]{1,3}(\\.[0-9]{1,3}){0,3}", b in "[0-9]{1,3}(\\.[0-9]{1,3}){0,3}") {
            let (va, vb) = (Version::parse(&a), Version::parse(&b));
            prop_assert_eq!(va.cmp(&vb), vb.cmp(&va).reverse());
        }

        /// Display round-trips for inputs matched by the primary pattern.
        #[test]
        fn prop_display_roundtrip(s in "[0-9]{1,3}(\\.[0-9]{1,3}){0,3}(-[a-z0-9.]{1,6})?") {
            prop_assert_eq!(Version::parse(&s).to_string(), s);
        }

        /// Parsing never panics.
        #[test]
        fn prop_parse_total(s in ".*") {
            let _ = Version::parse(&s);
        }
    }
}
