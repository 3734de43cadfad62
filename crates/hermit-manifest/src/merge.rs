//! Layer flattening.
//!
//! The selected stack (root → os → platform → version → channel) collapses
//! into a single effective record. Scalars: last non-zero wins. Slices:
//! concatenated. Maps: last write wins per key. `env` keeps per-layer
//! contributions in order, each sorted by name. Triggers group by event
//! and order by declared source line.

use crate::actions::{Action, Event};
use crate::schema::{ChannelBlock, Layer, Manifest};
use hermit_core::{Error, Platform, Result, Version};
use std::collections::BTreeMap;

/// The flattened, pre-interpolation result of a layer merge.
#[derive(Debug, Clone, Default)]
pub struct Flattened {
    /// Architecture override.
    pub arch: Option<String>,
    /// Binary globs.
    pub binaries: Vec<String>,
    /// App bundles.
    pub apps: Vec<String>,
    /// Required packages.
    pub requires: Vec<String>,
    /// Provided virtual packages.
    pub provides: Vec<String>,
    /// Runtime dependencies.
    pub runtime_deps: Vec<String>,
    /// Mirror URLs.
    pub mirrors: Vec<String>,
    /// Rename map.
    pub rename: BTreeMap<String, String>,
    /// File copies.
    pub files: BTreeMap<String, String>,
    /// Interpolation variables.
    pub vars: BTreeMap<String, String>,
    /// Env entries in contribution order.
    pub env: Vec<(String, String)>,
    /// Destination override.
    pub dest: Option<String>,
    /// Root override.
    pub root: Option<String>,
    /// Smoke-test command.
    pub test: Option<String>,
    /// Source URL.
    pub source: Option<String>,
    /// Pinned digest.
    pub sha256: Option<String>,
    /// Checksum-file URL.
    pub sha256_source: Option<String>,
    /// Strip depth.
    pub strip: usize,
    /// Mutable install.
    pub mutable: bool,
    /// Actions grouped by event, ordered by declared line.
    pub triggers: BTreeMap<Event, Vec<Action>>,
}

/// Flatten the layer stack for a selection.
///
/// `version` selects a version block (the channel's glob-resolved version
/// when resolving a channel); `channel` layers apply last.
pub fn flatten(
    manifest: &Manifest,
    version: Option<&Version>,
    channel: Option<&ChannelBlock>,
    platform: &Platform,
) -> Result<Flattened> {
    let mut flat = Flattened::default();

    fold_with_overlays(&mut flat, &manifest.layer, platform)?;

    if let Some(version) = version {
        if let Some(vb) = manifest.version_block(version) {
            fold_with_overlays(&mut flat, &vb.layer, platform)?;
            if let Some(av) = &vb.auto_version {
                if let Some(vars) = av.vars.get(&version.to_string()) {
                    for (key, value) in vars {
                        flat.vars.insert(key.clone(), value.clone());
                    }
                }
            }
        }
    }

    if let Some(channel) = channel {
        fold_with_overlays(&mut flat, &channel.layer, platform)?;
    }

    for actions in flat.triggers.values_mut() {
        actions.sort_by_key(Action::line);
    }

    Ok(flat)
}

/// Fold one layer plus its matching os/platform overlays.
fn fold_with_overlays(flat: &mut Flattened, layer: &Layer, platform: &Platform) -> Result<()> {
    fold(flat, layer);

    let os_overlays = match platform.os.as_str() {
        "darwin" => &layer.darwin,
        "linux" => &layer.linux,
        _ => return overlay_platform_blocks(flat, layer, platform),
    };
    if let Some(overlay) = os_overlays
        .iter()
        .find(|l| l.arch.as_deref().map_or(true, |arch| arch == platform.arch))
    {
        fold(flat, overlay);
    }

    overlay_platform_blocks(flat, layer, platform)
}

fn overlay_platform_blocks(
    flat: &mut Flattened,
    layer: &Layer,
    platform: &Platform,
) -> Result<()> {
    for pb in &layer.platform {
        let mut all = true;
        for attr in &pb.attrs {
            let re = regex::Regex::new(&format!("^(?:{attr})$"))
                .map_err(|e| Error::other("platform", format!("invalid attribute regex {attr:?}: {e}")))?;
            if !re.is_match(&platform.os) && !re.is_match(&platform.arch) {
                all = false;
                break;
            }
        }
        if all {
            fold(flat, &pb.layer);
        }
    }
    Ok(())
}

/// Merge a single layer's fields into the accumulator.
fn fold(flat: &mut Flattened, layer: &Layer) {
    if layer.arch.is_some() {
        flat.arch.clone_from(&layer.arch);
    }
    flat.binaries.extend(layer.binaries.iter().cloned());
    flat.apps.extend(layer.apps.iter().cloned());
    flat.requires.extend(layer.requires.iter().cloned());
    flat.provides.extend(layer.provides.iter().cloned());
    flat.runtime_deps.extend(layer.runtime_deps.iter().cloned());
    flat.mirrors.extend(layer.mirrors.iter().cloned());

    for (key, value) in &layer.rename {
        flat.rename.insert(key.clone(), value.clone());
    }
    for (key, value) in &layer.files {
        flat.files.insert(key.clone(), value.clone());
    }
    for (key, value) in &layer.vars {
        flat.vars.insert(key.clone(), value.clone());
    }

    // Each layer's env contribution is sorted by name for deterministic
    // output, then appended in layer order.
    let mut env: Vec<(String, String)> = layer.env.clone();
    env.sort_by(|a, b| a.0.cmp(&b.0));
    flat.env.extend(env);

    if layer.dest.is_some() {
        flat.dest.clone_from(&layer.dest);
    }
    if layer.root.is_some() {
        flat.root.clone_from(&layer.root);
    }
    if layer.test.is_some() {
        flat.test.clone_from(&layer.test);
    }
    if layer.source.is_some() {
        flat.source.clone_from(&layer.source);
    }
    if layer.sha256.is_some() {
        flat.sha256.clone_from(&layer.sha256);
    }
    if layer.sha256_source.is_some() {
        flat.sha256_source.clone_from(&layer.sha256_source);
    }
    if let Some(strip) = layer.strip {
        flat.strip = strip;
    }
    if layer.mutable {
        flat.mutable = true;
    }

    for trigger in &layer.triggers {
        flat.triggers
            .entry(trigger.event)
            .or_default()
            .extend(trigger.actions.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Manifest;
    use std::path::Path;

    fn manifest(src: &str) -> Manifest {
        let (m, errors) = Manifest::parse(Path::new("test.hcl"), src).unwrap();
        assert!(errors.is_empty(), "{errors:?}");
        m
    }

    #[test]
    fn version_block_overrides_root() {
        let m = manifest(
            r#"
description = "x"
binaries = ["bin/x"]
source = "https://example.com/root.tar.gz"
version "1.0.0" {
  source = "https://example.com/v1.tar.gz"
}
"#,
        );
        let flat = flatten(
            &m,
            Some(&Version::parse("1.0.0")),
            None,
            &Platform::new("linux", "amd64"),
        )
        .unwrap();
        assert_eq!(flat.source.as_deref(), Some("https://example.com/v1.tar.gz"));
        assert_eq!(flat.binaries, ["bin/x"]);
    }

    #[test]
    fn platform_block_between_root_and_version() {
        let m = manifest(
            r#"
description = "x"
binaries = ["bin/x"]
test = "root"
platform "linux" "amd64" {
  test = "platform"
}
version "1.0.0" {
  test = "version"
}
"#,
        );
        let linux = Platform::new("linux", "amd64");
        let flat = flatten(&m, None, None, &linux).unwrap();
        assert_eq!(flat.test.as_deref(), Some("platform"));
        let flat = flatten(&m, Some(&Version::parse("1.0.0")), None, &linux).unwrap();
        assert_eq!(flat.test.as_deref(), Some("version"));
        let flat = flatten(&m, None, None, &Platform::new("darwin", "arm64")).unwrap();
        assert_eq!(flat.test.as_deref(), Some("root"));
    }

    #[test]
    fn os_overlay_respects_arch_filter() {
        let m = manifest(
            r#"
description = "x"
binaries = ["bin/x"]
source = "https://example.com/x"
darwin {
  arch = "arm64"
  test = "darwin-arm64"
}
darwin {
  test = "darwin-any"
}
"#,
        );
        let flat = flatten(&m, None, None, &Platform::new("darwin", "arm64")).unwrap();
        assert_eq!(flat.test.as_deref(), Some("darwin-arm64"));
        let flat = flatten(&m, None, None, &Platform::new("darwin", "amd64")).unwrap();
        assert_eq!(flat.test.as_deref(), Some("darwin-any"));
        let flat = flatten(&m, None, None, &Platform::new("linux", "amd64")).unwrap();
        assert_eq!(flat.test, None);
    }

    #[test]
    fn env_contributions_sorted_within_layer() {
        let m = manifest(
            r#"
description = "x"
binaries = ["bin/x"]
source = "https://example.com/x"
env = {
  "ZED": "1",
  "ALPHA": "2",
}
version "1.0.0" {
  env = {
    "MID": "3",
  }
}
"#,
        );
        let flat = flatten(
            &m,
            Some(&Version::parse("1.0.0")),
            None,
            &Platform::new("linux", "amd64"),
        )
        .unwrap();
        let keys: Vec<&str> = flat.env.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["ALPHA", "ZED", "MID"]);
    }

    #[test]
    fn triggers_ordered_by_line() {
        let m = manifest(
            r#"
description = "x"
binaries = ["bin/x"]
source = "https://example.com/x"
on unpack {
  message {
    text = "first"
  }
  mkdir {
    dir = "d"
  }
  message {
    text = "third"
  }
}
"#,
        );
        let flat = flatten(&m, None, None, &Platform::new("linux", "amd64")).unwrap();
        let actions = &flat.triggers[&Event::Unpack];
        assert_eq!(actions.len(), 3);
        assert!(matches!(actions[0], Action::Message { .. }));
        assert!(matches!(actions[1], Action::Mkdir { .. }));
        assert!(matches!(actions[2], Action::Message { .. }));
        assert!(actions.windows(2).all(|w| w[0].line() <= w[1].line()));
    }
}
