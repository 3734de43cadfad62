//! The resolver's output: a concrete, platform-specific package record.

use crate::actions::{Action, ActionContext, Event};
use hermit_core::{Error, Ops, Platform, Reference, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// A fully-resolved package: every field concrete for one platform, with
/// no un-substituted `${…}` references outside the late-bound rename map.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    /// The resolved reference (name, version, channel).
    pub reference: Reference,
    /// Manifest description.
    pub description: String,
    /// Architecture override, when the manifest pins one.
    pub arch: Option<String>,
    /// Binary globs relative to `root`.
    pub binaries: Vec<String>,
    /// macOS app bundles.
    pub apps: Vec<String>,
    /// Required packages.
    pub requires: Vec<String>,
    /// Provided virtual packages.
    pub provides: Vec<String>,
    /// Runtime dependencies.
    pub runtime_deps: Vec<String>,
    /// Rename map; values may be late-bound (`${dest}`, `${root}`).
    pub rename: BTreeMap<String, String>,
    /// Ordered environment operations.
    pub env: Ops,
    /// Download source URL.
    pub source: String,
    /// Fallback source URLs.
    pub mirrors: Vec<String>,
    /// Root of the unpacked tree.
    pub root: PathBuf,
    /// Install destination.
    pub dest: PathBuf,
    /// Pinned digest for `source`, if known.
    pub sha256: Option<String>,
    /// Checksum-file URL covering `source`.
    pub sha256_source: Option<String>,
    /// Smoke-test command.
    pub test: Option<String>,
    /// Leading path components stripped at extraction.
    pub strip: usize,
    /// Whether the installed tree stays writable.
    pub mutable: bool,
    /// Files copied into the environment.
    pub files: Vec<(String, String)>,
    /// Actions grouped by event, in declared order.
    pub triggers: BTreeMap<Event, Vec<Action>>,
    /// Channel update interval.
    pub update_interval: Option<Duration>,
    /// Non-fatal notes accumulated during resolution.
    pub warnings: Vec<String>,
    /// Core platforms this package has no source for.
    pub unsupported_platforms: Vec<Platform>,
}

impl Package {
    /// Actions attached to `event`.
    #[must_use]
    pub fn triggers_for(&self, event: Event) -> &[Action] {
        self.triggers.get(&event).map_or(&[], Vec::as_slice)
    }

    /// Apply every action attached to `event`, in order. Failures are
    /// wrapped as `{package}: on {event}: {error}`. Messages accumulate
    /// on the context.
    pub fn run_triggers(&self, event: Event, ctx: &mut ActionContext) -> Result<()> {
        for action in self.triggers_for(event) {
            action.apply(ctx).map_err(|e| Error::Trigger {
                package: self.reference.to_string(),
                event: event.to_string(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Expand each binary glob into concrete files under `root`.
    ///
    /// Fails if any glob matches nothing: a package without its declared
    /// binaries is broken.
    pub fn resolve_binaries(&self) -> Result<Vec<PathBuf>> {
        let root = glob::Pattern::escape(&self.root.to_string_lossy());
        let mut out = Vec::new();
        for binary in &self.binaries {
            let pattern = format!("{root}/{binary}");
            let matches: Vec<PathBuf> = glob::glob(&pattern)
                .map_err(|e| Error::other("binaries", format!("invalid glob {binary:?}: {e}")))?
                .filter_map(std::result::Result::ok)
                .collect();
            if matches.is_empty() {
                return Err(Error::other(
                    self.reference.to_string(),
                    format!("no files matching binary glob {binary:?} under {}", self.root.display()),
                ));
            }
            out.extend(matches);
        }
        out.sort();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermit_core::Reference;

    fn package(root: PathBuf) -> Package {
        Package {
            reference: Reference::parse("tool-1.0.0"),
            description: "test".to_string(),
            arch: None,
            binaries: vec!["bin/*".to_string()],
            apps: vec![],
            requires: vec![],
            provides: vec![],
            runtime_deps: vec![],
            rename: BTreeMap::new(),
            env: Ops::default(),
            source: "https://example.com/tool.tar.gz".to_string(),
            mirrors: vec![],
            dest: root.clone(),
            root,
            sha256: None,
            sha256_source: None,
            test: None,
            strip: 0,
            mutable: false,
            files: vec![],
            triggers: BTreeMap::new(),
            update_interval: None,
            warnings: vec![],
            unsupported_platforms: vec![],
        }
    }

    #[test]
    fn resolve_binaries_expands_globs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("bin")).unwrap();
        std::fs::write(dir.path().join("bin/tool"), "").unwrap();
        std::fs::write(dir.path().join("bin/toolctl"), "").unwrap();

        let pkg = package(dir.path().to_path_buf());
        let binaries = pkg.resolve_binaries().unwrap();
        assert_eq!(binaries.len(), 2);
    }

    #[test]
    fn resolve_binaries_fails_on_no_match() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = package(dir.path().to_path_buf());
        let err = pkg.resolve_binaries().unwrap_err();
        assert!(err.to_string().contains("bin/*"));
    }
}
