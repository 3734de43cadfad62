//! `${var}` interpolation.
//!
//! Expansion is a bounded fixed point: replacement values may themselves
//! reference other variables (`vars` entries referencing each other), and
//! some sites are late-bound (`env` values referencing envars, `rename`
//! referencing `${dest}`). Those sites expand leniently; everything else
//! is strict after the final pass.

use hermit_core::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static VAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([^${}]+)\}").expect("var pattern"));

/// Interpolation cycles are cut off after this many rounds.
const MAX_ROUNDS: usize = 10;

/// Interpolation context: builtin keys plus merged `vars`.
#[derive(Debug, Clone, Default)]
pub struct Context {
    values: HashMap<String, String>,
}

impl Context {
    /// Empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Add a binding.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Look up a binding.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Expand `${key}` references against `ctx`.
///
/// In lenient mode unknown references are left verbatim; in strict mode
/// they are an error naming the reference.
pub fn expand(s: &str, ctx: &Context, strict: bool) -> Result<String> {
    let mut current = s.to_string();
    for _ in 0..MAX_ROUNDS {
        let mut unknown: Option<String> = None;
        let next = VAR_RE
            .replace_all(&current, |caps: &regex::Captures<'_>| {
                let key = &caps[1];
                match ctx.get(key) {
                    Some(value) => value.to_string(),
                    None => {
                        if unknown.is_none() {
                            unknown = Some(key.to_string());
                        }
                        caps[0].to_string()
                    }
                }
            })
            .into_owned();
        if let (true, Some(key)) = (strict, &unknown) {
            return Err(Error::other(
                "interpolation",
                format!("unknown variable ${{{key}}} in {s:?}"),
            ));
        }
        if next == current {
            return Ok(next);
        }
        current = next;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        Context::new()
            .with("version", "1.14.4")
            .with("os", "darwin")
            .with("arch", "amd64")
            .with("dest", "/state/pkg/go-1.14.4")
    }

    #[test]
    fn simple_expansion() {
        let out = expand("go${version}.${os}-${arch}.tar.gz", &ctx(), true).unwrap();
        assert_eq!(out, "go1.14.4.darwin-amd64.tar.gz");
    }

    #[test]
    fn forward_references_reach_fixed_point() {
        let ctx = ctx().with("root", "${dest}/go");
        let out = expand("${root}/bin", &ctx, true).unwrap();
        assert_eq!(out, "/state/pkg/go-1.14.4/go/bin");
    }

    #[test]
    fn lenient_keeps_unknown_verbatim() {
        let out = expand("${PATH}:${dest}/bin", &ctx(), false).unwrap();
        assert_eq!(out, "${PATH}:/state/pkg/go-1.14.4/bin");
    }

    #[test]
    fn strict_rejects_unknown() {
        let err = expand("${nope}", &ctx(), true).unwrap_err();
        assert!(err.to_string().contains("${nope}"));
    }

    #[test]
    fn self_reference_terminates() {
        let ctx = Context::new().with("a", "${a}x");
        // Bounded: must terminate, content is whatever the cutoff left.
        let out = expand("${a}", &ctx, false).unwrap();
        assert!(out.contains('x'));
    }
}
