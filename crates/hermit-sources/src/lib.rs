//! Manifest sources: where bundles come from.
//!
//! A source produces a [`Bundle`] and knows how to bring it up to date.
//! Local directories and the builtin bundle never change out from under
//! us; git sources clone shallowly and pull on a 24-hour cadence.

mod git;

pub use git::GitSource;

use hermit_core::Result;
use hermit_manifest::{Bundle, DirBundle, MemBundle};
use std::path::PathBuf;
use std::sync::Arc;

/// The manifest Hermit ships for managing itself.
const BUILTIN_HERMIT: &str = include_str!("../hermit.hcl");

/// A syncable origin of manifest bundles.
pub trait Source: std::fmt::Debug + Send + Sync {
    /// Identifying URI.
    fn uri(&self) -> &str;

    /// Bring the local copy up to date. `force` bypasses staleness
    /// checks.
    fn sync(&self, force: bool) -> Result<()>;

    /// The bundle view of this source.
    fn bundle(&self) -> Result<Arc<dyn Bundle>>;
}

/// A local directory of manifests; sync is a no-op.
#[derive(Debug)]
pub struct LocalSource {
    uri: String,
    dir: PathBuf,
}

impl LocalSource {
    /// Source over a local directory.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            uri: dir.display().to_string(),
            dir,
        }
    }
}

impl Source for LocalSource {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn sync(&self, _force: bool) -> Result<()> {
        Ok(())
    }

    fn bundle(&self) -> Result<Arc<dyn Bundle>> {
        Ok(Arc::new(DirBundle::new(&self.dir)))
    }
}

/// The embedded builtin bundle (currently just Hermit itself).
#[derive(Debug, Default)]
pub struct BuiltinSource;

impl Source for BuiltinSource {
    fn uri(&self) -> &str {
        "builtin:///"
    }

    fn sync(&self, _force: bool) -> Result<()> {
        Ok(())
    }

    fn bundle(&self) -> Result<Arc<dyn Bundle>> {
        Ok(Arc::new(MemBundle::new().with("hermit.hcl", BUILTIN_HERMIT)))
    }
}

/// An ordered collection of sources, consulted first to last.
#[derive(Debug, Default)]
pub struct Sources {
    sources: Vec<Arc<dyn Source>>,
}

impl Sources {
    /// Empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source, builder style.
    #[must_use]
    pub fn with(mut self, source: Arc<dyn Source>) -> Self {
        self.sources.push(source);
        self
    }

    /// Sync every source; the first failure aborts.
    pub fn sync(&self, force: bool) -> Result<()> {
        for source in &self.sources {
            source.sync(force)?;
        }
        Ok(())
    }

    /// Bundles in source order, for the manifest loader.
    pub fn bundles(&self) -> Result<Vec<Arc<dyn Bundle>>> {
        self.sources.iter().map(|s| s.bundle()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_bundle_parses() {
        let bundle = BuiltinSource.bundle().unwrap();
        assert_eq!(bundle.list().unwrap(), vec!["hermit.hcl".to_string()]);
        let src = bundle.read_to_string("hermit.hcl").unwrap();
        let (manifest, errors) =
            hermit_manifest::Manifest::parse(std::path::Path::new("hermit.hcl"), &src).unwrap();
        assert!(errors.is_empty(), "{errors:?}");
        assert!(!manifest.layer.binaries.is_empty());
    }

    #[test]
    fn sources_aggregate_bundles_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("jq.hcl"), "description = \"jq\"").unwrap();
        let sources = Sources::new()
            .with(Arc::new(LocalSource::new(dir.path())))
            .with(Arc::new(BuiltinSource));
        let bundles = sources.bundles().unwrap();
        assert_eq!(bundles.len(), 2);
        assert_eq!(bundles[0].list().unwrap(), vec!["jq.hcl".to_string()]);
        sources.sync(true).unwrap();
    }
}
