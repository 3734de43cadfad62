//! The resolver: selector → manifest → layer stack → [`Package`].

use crate::interpolate::{expand, Context};
use crate::loader::{AnnotatedManifest, Loader};
use crate::merge::{flatten, Flattened};
use crate::package::Package;
use crate::schema::{ChannelBlock, ChannelTarget, Manifest};
use hermit_core::{
    core_platforms, xarch, Error, Op, Ops, Platform, Reference, Result, Selector, StateDirs,
    Version,
};
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolver configuration: where the active environment and the state
/// root live, and which platform to resolve for.
#[derive(Debug, Clone)]
pub struct Config {
    /// Active environment directory (`HERMIT_ENV`).
    pub env_dir: PathBuf,
    /// State directory layout.
    pub state: StateDirs,
    /// Target platform.
    pub platform: Platform,
}

/// Resolves selectors to concrete packages.
#[derive(Debug)]
pub struct Resolver {
    loader: Arc<Loader>,
    config: Config,
}

impl Resolver {
    /// New resolver over a loader.
    #[must_use]
    pub fn new(loader: Arc<Loader>, config: Config) -> Self {
        Self { loader, config }
    }

    /// The loader backing this resolver.
    #[must_use]
    pub fn loader(&self) -> &Arc<Loader> {
        &self.loader
    }

    /// Resolve a selector to a concrete package for the configured
    /// platform.
    pub fn resolve(&self, selector: &Selector) -> Result<Package> {
        let Some(annotated) = self.loader.get(selector.name())? else {
            return Err(Error::UnknownPackage {
                name: selector.to_string(),
                known: vec![],
            });
        };
        self.resolve_in(&annotated, selector)
    }

    /// Enumerate one package per version and per channel of every manifest
    /// whose name or description matches `pattern`. Per-entry failures are
    /// logged and skipped.
    pub fn search(&self, pattern: &Regex) -> Result<Vec<Package>> {
        let mut out = Vec::new();
        for annotated in self.loader.all()? {
            if !pattern.is_match(&annotated.name)
                && !pattern.is_match(&annotated.manifest.description)
            {
                continue;
            }
            for reference in candidate_references(&annotated.name, &annotated.manifest) {
                match self.resolve_in(&annotated, &Selector::exact(reference.clone())) {
                    Ok(package) => out.push(package),
                    Err(e) => warn!(reference = %reference, error = %e, "skipping search result"),
                }
            }
        }
        Ok(out)
    }

    /// One package for every manifest that `provides` the virtual name.
    pub fn resolve_virtual(&self, name: &str) -> Result<Vec<Package>> {
        let mut out = Vec::new();
        for annotated in self.loader.all()? {
            let manifest = &annotated.manifest;
            let provides = manifest
                .layer
                .provides
                .iter()
                .chain(manifest.versions.iter().flat_map(|vb| &vb.layer.provides));
            if provides.into_iter().any(|p| p == name) {
                match self.resolve_in(&annotated, &Selector::Name(annotated.name.clone())) {
                    Ok(package) => out.push(package),
                    Err(e) => warn!(name = %annotated.name, error = %e, "skipping provider"),
                }
            }
        }
        if out.is_empty() {
            return Err(Error::UnknownPackage {
                name: name.to_string(),
                known: vec![],
            });
        }
        Ok(out)
    }

    /// Bulk-load every manifest, accumulating per-manifest errors.
    pub fn load_all(&self) -> Result<()> {
        self.loader.all().map(|_| ())
    }

    /// Per-manifest validation errors accumulated by loading.
    #[must_use]
    pub fn errors(&self) -> Vec<(String, Vec<String>)> {
        self.loader.errors()
    }

    fn resolve_in(&self, annotated: &AnnotatedManifest, selector: &Selector) -> Result<Package> {
        if let Some(first) = annotated.errors.first() {
            return Err(Error::manifest(&annotated.path, first.to_string()));
        }
        let manifest = &annotated.manifest;
        let name = &annotated.name;

        // Substitute the manifest default for bare-name selectors.
        let selector = match (&selector, &manifest.default) {
            (sel, Some(default)) if !sel.is_fully_qualified() => {
                Selector::exact(default_reference(name, default))
            }
            _ => selector.clone(),
        };

        let references = candidate_references(name, manifest);
        let chosen = references
            .iter()
            .filter(|r| selector.matches(r))
            .max_by(|a, b| a.compare(b))
            .cloned();
        let Some(chosen) = chosen else {
            return Err(Error::UnknownPackage {
                name: selector.to_string(),
                known: references.iter().map(ToString::to_string).collect(),
            });
        };
        debug!(selector = %selector, chosen = %chosen, "selected reference");

        let (version, channel) = match &chosen.channel {
            Some(channel_name) => {
                let channel = manifest.channel(channel_name).ok_or_else(|| {
                    Error::UnknownPackage {
                        name: format!("{name}@{channel_name}"),
                        known: vec![],
                    }
                })?;
                (channel_version(manifest, channel), Some(channel))
            }
            None => (chosen.version.clone(), None),
        };

        let reference = Reference {
            name: name.clone(),
            version: version.clone(),
            channel: chosen.channel.clone(),
        };

        let flat = flatten(manifest, version.as_ref(), channel, &self.config.platform)?;
        let mut package = self.build_package(manifest, &reference, &flat)?;
        package.update_interval = channel.and_then(|c| c.update);

        // Probe the core platforms for missing sources; merge failures
        // count as unsupported.
        for platform in core_platforms() {
            let supported = flatten(manifest, version.as_ref(), channel, &platform)
                .map(|f| f.source.map_or(false, |s| !s.is_empty()))
                .unwrap_or(false);
            if !supported {
                package.unsupported_platforms.push(platform);
            }
        }

        Ok(package)
    }

    fn build_package(
        &self,
        manifest: &Manifest,
        reference: &Reference,
        flat: &Flattened,
    ) -> Result<Package> {
        let platform = &self.config.platform;
        let version_text = reference
            .version
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        let dest_name = match &reference.version {
            Some(version) => format!("{}-{version}", reference.name),
            None => reference.to_string(),
        };

        let mut ctx = Context::new()
            .with("version", version_text)
            .with("os", platform.os.clone())
            .with("arch", platform.arch.clone())
            .with("xarch", xarch(&platform.arch))
            .with("HOME", std::env::var("HOME").unwrap_or_default())
            .with("env", self.config.env_dir.display().to_string())
            .with("HERMIT_ENV", self.config.env_dir.display().to_string())
            .with(
                "HERMIT_BIN",
                self.config.env_dir.join("bin").display().to_string(),
            );
        let now = chrono::Utc::now();
        ctx.set("YYYY", now.format("%Y").to_string());
        ctx.set("MM", now.format("%m").to_string());
        ctx.set("DD", now.format("%d").to_string());
        for (key, value) in &flat.vars {
            ctx.set(key.clone(), value.clone());
        }

        let dest = match &flat.dest {
            Some(dest) => PathBuf::from(expand(dest, &ctx, true)?),
            None => self.config.state.pkg_dir(&dest_name),
        };
        ctx.set("dest", dest.display().to_string());
        let root = match &flat.root {
            Some(root) => PathBuf::from(expand(root, &ctx, true)?),
            None => dest.clone(),
        };
        ctx.set("root", root.display().to_string());

        let source = match &flat.source {
            Some(source) if !source.is_empty() => expand(source, &ctx, true)?,
            _ => {
                return Err(Error::UnsupportedPlatform {
                    reference: reference.to_string(),
                    platform: platform.to_string(),
                })
            }
        };

        if flat.binaries.is_empty() && flat.apps.is_empty() {
            return Err(Error::manifest(
                reference.to_string(),
                "manifest defines no binaries or apps",
            ));
        }

        let mut mirrors = Vec::new();
        for mirror in &flat.mirrors {
            mirrors.push(expand(mirror, &ctx, true)?);
        }
        let mut binaries = Vec::new();
        for binary in &flat.binaries {
            binaries.push(expand(binary, &ctx, true)?);
        }
        let mut apps = Vec::new();
        for app in &flat.apps {
            apps.push(expand(app, &ctx, true)?);
        }
        let test = match &flat.test {
            Some(test) => Some(expand(test, &ctx, true)?),
            None => None,
        };
        let mut files = Vec::new();
        for (from, to) in &flat.files {
            files.push((expand(from, &ctx, true)?, expand(to, &ctx, true)?));
        }

        // Envar operations are inferred from the raw entries (the `${K}`
        // self-reference encodes prepend/append), then the operands expand
        // leniently: they may reference other envars resolved at
        // activation time.
        let mut ops = Vec::new();
        for (key, value) in &flat.env {
            let mut op = Op::infer(key, value);
            let expanded = expand(op.value(), &ctx, false)?;
            op.set_value(expanded);
            ops.push(op);
        }

        // Trigger fields are late-bound: `run` env entries legitimately
        // reference envars that only exist when the trigger fires.
        let mut triggers = flat.triggers.clone();
        for actions in triggers.values_mut() {
            for action in actions.iter_mut() {
                for s in action.strings_mut() {
                    *s = expand(s, &ctx, false)?;
                }
            }
        }

        let sha256 = flat
            .sha256
            .clone()
            .or_else(|| manifest.sha256_sums.get(&source).cloned());
        let sha256_source = match &flat.sha256_source {
            Some(url) => Some(expand(url, &ctx, true)?),
            None => None,
        };

        Ok(Package {
            reference: reference.clone(),
            description: manifest.description.clone(),
            arch: flat.arch.clone(),
            binaries,
            apps,
            requires: flat.requires.clone(),
            provides: flat.provides.clone(),
            runtime_deps: flat.runtime_deps.clone(),
            rename: flat.rename.clone(),
            env: Ops(ops),
            source,
            mirrors,
            root,
            dest,
            sha256,
            sha256_source,
            test,
            strip: flat.strip,
            mutable: flat.mutable,
            files,
            triggers,
            update_interval: None,
            warnings: vec![],
            unsupported_platforms: vec![],
        })
    }
}

/// Every reference a manifest declares: one per version label, one per
/// channel.
fn candidate_references(name: &str, manifest: &Manifest) -> Vec<Reference> {
    let mut references = Vec::new();
    for version in manifest.all_versions() {
        references.push(Reference {
            name: name.to_string(),
            version: Some(version.clone()),
            channel: None,
        });
    }
    for channel in &manifest.channels {
        references.push(Reference::with_channel(name, channel.name.clone()));
    }
    references
}

/// Build the reference a manifest `default` stands for.
fn default_reference(name: &str, default: &str) -> Reference {
    match default.strip_prefix('@') {
        Some(channel) => Reference::with_channel(name, channel),
        None => Reference::with_version(name, Version::parse(default)),
    }
}

/// Resolve the version a channel currently points at, if it selects one.
fn channel_version(manifest: &Manifest, channel: &ChannelBlock) -> Option<Version> {
    match &channel.target {
        ChannelTarget::None => None,
        ChannelTarget::Glob(pattern) => {
            let compiled = glob::Pattern::new(pattern).ok()?;
            manifest
                .all_versions()
                .into_iter()
                .filter(|v| !channel.stable_only || !v.is_prerelease())
                .filter(|v| compiled.matches(&v.to_string()))
                .max_by(|a, b| a.cmp(b))
                .cloned()
        }
        ChannelTarget::Prefix(prefix) => manifest
            .all_versions()
            .into_iter()
            .filter(|v| !channel.stable_only || !v.is_prerelease())
            .filter(|v| prefix.is_prefix_of(v))
            .max_by(|a, b| a.cmp(b))
            .cloned(),
    }
}
