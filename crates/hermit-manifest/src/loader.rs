//! The manifest loader: ordered bundles, a process-wide cache, and
//! channel synthesis.

use crate::bundle::Bundle;
use crate::schema::{ChannelBlock, ChannelTarget, Layer, Manifest};
use crate::validate::validate;
use hermit_core::{Error, Result, Version};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Update interval applied to synthesised channels.
const SYNTHETIC_UPDATE: Duration = Duration::from_secs(24 * 3600);

/// A parsed manifest annotated with its origin and any non-fatal errors.
///
/// Immutable after construction; resolution never mutates it.
#[derive(Debug)]
pub struct AnnotatedManifest {
    /// Short package name (file stem).
    pub name: String,
    /// Fully-qualified path, for diagnostics.
    pub path: PathBuf,
    /// The manifest itself.
    pub manifest: Manifest,
    /// Validation errors. A manifest with errors is kept (and cached) but
    /// cannot be resolved.
    pub errors: Vec<Error>,
    /// Bundle the manifest was loaded from.
    pub bundle: Arc<dyn Bundle>,
}

type SyncHook = Box<dyn Fn() -> Result<()> + Send + Sync>;

/// Loads and caches manifests from an ordered list of bundles. The first
/// bundle containing `<name>.hcl` wins.
pub struct Loader {
    bundles: Vec<Arc<dyn Bundle>>,
    cache: Mutex<HashMap<String, Arc<AnnotatedManifest>>>,
    sync_hook: Option<SyncHook>,
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("bundles", &self.bundles)
            .field("cached", &self.cache.lock().len())
            .finish_non_exhaustive()
    }
}

impl Loader {
    /// Loader over an ordered list of bundles.
    #[must_use]
    pub fn new(bundles: Vec<Arc<dyn Bundle>>) -> Self {
        Self {
            bundles,
            cache: Mutex::new(HashMap::new()),
            sync_hook: None,
        }
    }

    /// Install a hook run (once per lookup) when a name is not found,
    /// typically a forced source sync. The lookup is retried after the
    /// hook succeeds.
    #[must_use]
    pub fn with_sync_hook(mut self, hook: SyncHook) -> Self {
        self.sync_hook = Some(hook);
        self
    }

    /// Look up a manifest by package name. Manifests are parsed at most
    /// once; validation failures are cached alongside the manifest.
    pub fn get(&self, name: &str) -> Result<Option<Arc<AnnotatedManifest>>> {
        let mut cache = self.cache.lock();
        if let Some(found) = cache.get(name) {
            return Ok(Some(Arc::clone(found)));
        }
        if let Some(found) = self.load(name)? {
            cache.insert(name.to_string(), Arc::clone(&found));
            return Ok(Some(found));
        }
        if let Some(hook) = &self.sync_hook {
            debug!(name, "manifest not found, forcing source sync");
            if let Err(e) = hook() {
                warn!(name, error = %e, "forced sync failed");
                return Ok(None);
            }
            if let Some(found) = self.load(name)? {
                cache.insert(name.to_string(), Arc::clone(&found));
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Every unique package name across all bundles, sorted.
    pub fn names(&self) -> Result<Vec<String>> {
        let mut names = BTreeSet::new();
        for bundle in &self.bundles {
            for file in bundle.list()? {
                if let Some(stem) = file.strip_suffix(".hcl") {
                    names.insert(stem.to_string());
                }
            }
        }
        Ok(names.into_iter().collect())
    }

    /// Load every manifest. Per-manifest parse failures are collected, not
    /// fatal.
    pub fn all(&self) -> Result<Vec<Arc<AnnotatedManifest>>> {
        let mut out = Vec::new();
        for name in self.names()? {
            match self.get(&name) {
                Ok(Some(manifest)) => out.push(manifest),
                Ok(None) => {}
                Err(e) => warn!(name, error = %e, "failed to load manifest"),
            }
        }
        Ok(out)
    }

    /// Validation errors accumulated so far, keyed by package name.
    #[must_use]
    pub fn errors(&self) -> Vec<(String, Vec<String>)> {
        let cache = self.cache.lock();
        let mut out: Vec<(String, Vec<String>)> = cache
            .values()
            .filter(|m| !m.errors.is_empty())
            .map(|m| {
                (
                    m.name.clone(),
                    m.errors.iter().map(ToString::to_string).collect(),
                )
            })
            .collect();
        out.sort();
        out
    }

    fn load(&self, name: &str) -> Result<Option<Arc<AnnotatedManifest>>> {
        let file = format!("{name}.hcl");
        for bundle in &self.bundles {
            if !bundle.list()?.contains(&file) {
                continue;
            }
            let path = PathBuf::from(format!("{}/{file}", bundle.uri()));
            let src = bundle.read_to_string(&file)?;
            let (mut manifest, mut errors) = Manifest::parse(&path, &src)?;
            errors.extend(validate(&path, &manifest));
            synthesize_channels(&mut manifest);
            debug!(name, path = %path.display(), errors = errors.len(), "loaded manifest");
            return Ok(Some(Arc::new(AnnotatedManifest {
                name: name.to_string(),
                path,
                manifest,
                errors,
                bundle: Arc::clone(bundle),
            })));
        }
        Ok(None)
    }
}

/// Add `latest`, `<major>` and `<major.minor>` channels for manifests
/// with at least one stable version. Synthesised channels match stable
/// versions only and are indistinguishable from declared ones afterwards.
pub(crate) fn synthesize_channels(manifest: &mut Manifest) {
    let stable: Vec<Version> = manifest
        .all_versions()
        .into_iter()
        .filter(|v| !v.is_prerelease())
        .cloned()
        .collect();
    if stable.is_empty() {
        return;
    }

    let taken: BTreeSet<String> = manifest.channels.iter().map(|c| c.name.clone()).collect();
    let mut add = |name: String, target: ChannelTarget, channels: &mut Vec<ChannelBlock>| {
        if taken.contains(&name) || channels.iter().any(|c| c.name == name) {
            return;
        }
        channels.push(ChannelBlock {
            name,
            update: Some(SYNTHETIC_UPDATE),
            target,
            stable_only: true,
            layer: Layer::default(),
            line: 0,
        });
    };

    let mut channels = std::mem::take(&mut manifest.channels);
    add(
        "latest".to_string(),
        ChannelTarget::Glob("*".to_string()),
        &mut channels,
    );
    for version in &stable {
        let major = version.major();
        add(
            major.to_string(),
            ChannelTarget::Prefix(major),
            &mut channels,
        );
        if version.components().len() >= 2 {
            let major_minor = version.major_minor();
            add(
                major_minor.to_string(),
                ChannelTarget::Prefix(major_minor),
                &mut channels,
            );
        }
    }
    manifest.channels = channels;
}
