//! End-to-end auto-version and digest-update scenarios against in-memory
//! oracles.

use hermit_autoversion::{
    update_manifest, DigestUpdater, MemFetcher, MemOracle, MemTags, Options, Oracles,
};
use hermit_manifest::Manifest;
use std::path::{Path, PathBuf};

fn write_manifest(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("tool.hcl");
    std::fs::write(&path, content).unwrap();
    path
}

fn oracles<'a>(
    releases: &'a MemOracle,
    fetcher: &'a MemFetcher,
    tags: &'a MemTags,
) -> Oracles<'a> {
    Oracles {
        releases,
        fetcher,
        tags,
    }
}

#[test]
fn github_release_appends_latest() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(
        dir.path(),
        r#"description = "tool"
binaries = ["tool"]
source = "https://example.com/tool-${version}.tar.gz"

version "1.0.0" {
  auto-version {
    github-release = "example/tool"
  }
}
"#,
    );

    let releases = MemOracle {
        tags: vec!["v1.2.0".to_string()],
    };
    let fetcher = MemFetcher::new();
    let tags = MemTags::default();

    let outcome = update_manifest(&path, &oracles(&releases, &fetcher, &tags), Options::default())
        .unwrap();
    assert!(outcome.changed);
    assert_eq!(outcome.added, ["1.2.0"]);

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains(r#"version "1.0.0" "1.2.0" {"#), "{content}");

    // The rewritten document still decodes, with both labels.
    let (manifest, errors) = Manifest::parse(&path, &content).unwrap();
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(manifest.versions[0].versions.len(), 2);
}

#[test]
fn auto_version_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(
        dir.path(),
        r#"description = "tool"
binaries = ["tool"]
source = "https://example.com/tool-${version}.tar.gz"

version "1.0.0" {
  auto-version {
    git-tags = "https://example.com/tool.git"
  }
}
"#,
    );

    let releases = MemOracle::default();
    let fetcher = MemFetcher::new();
    let tags = MemTags(vec!["v0.9.0".to_string(), "v1.1.0".to_string()]);
    let oracles = oracles(&releases, &fetcher, &tags);

    let first = update_manifest(&path, &oracles, Options::default()).unwrap();
    assert!(first.changed);
    let after_first = std::fs::read_to_string(&path).unwrap();

    let second = update_manifest(&path, &oracles, Options::default()).unwrap();
    assert!(!second.changed);
    let after_second = std::fs::read_to_string(&path).unwrap();
    assert_eq!(after_first, after_second);
}

#[test]
fn json_oracle_extracts_sha_and_vars() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(
        dir.path(),
        r#"description = "tool"
binaries = ["tool"]
source = "https://example.com/tool-${version}-${build}.tar.gz"

version "1.0.0" {
  auto-version {
    json {
      url = "https://api.example.com/release.json"
      path = "tag_name"
      sha256-path = "assets.0.sha256"
      vars {
        build = "build.number"
      }
    }
  }
}
"#,
    );

    let releases = MemOracle::default();
    let fetcher = MemFetcher::new().with(
        "https://api.example.com/release.json",
        br#"{"tag_name":"v1.2.3","build":{"number":"20250117"},"assets":[{"sha256":"abc"}]}"#
            .to_vec(),
    );
    let tags = MemTags::default();

    let outcome = update_manifest(&path, &oracles(&releases, &fetcher, &tags), Options::default())
        .unwrap();
    assert_eq!(outcome.added, ["1.2.3"]);

    let content = std::fs::read_to_string(&path).unwrap();
    let (manifest, errors) = Manifest::parse(&path, &content).unwrap();
    assert!(errors.is_empty(), "{errors:?}");

    let vb = &manifest.versions[0];
    let labels: Vec<String> = vb.versions.iter().map(ToString::to_string).collect();
    assert_eq!(labels, ["1.0.0", "1.2.3"]);
    assert_eq!(vb.layer.sha256.as_deref(), Some("abc"));
    let av = vb.auto_version.as_ref().unwrap();
    assert_eq!(
        av.vars["1.2.3"],
        [("build".to_string(), "20250117".to_string())]
    );
}

#[test]
fn invalid_candidates_are_fatal_unless_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = |ignore: &str| {
        format!(
            r#"description = "tool"
binaries = ["tool"]
source = "https://example.com/tool-${{version}}.tar.gz"

version "1.0.0" {{
  auto-version {{
    git-tags = "https://example.com/tool.git"
    version-pattern = "v([0-9.]+)"{ignore}
  }}
}}
"#
        )
    };

    let releases = MemOracle::default();
    let fetcher = MemFetcher::new();
    let tags = MemTags(vec!["nightly".to_string(), "v2.0.0".to_string()]);
    let oracles = oracles(&releases, &fetcher, &tags);

    let path = write_manifest(dir.path(), &manifest(""));
    let err = update_manifest(&path, &oracles, Options::default()).unwrap_err();
    assert!(err.to_string().contains("nightly"), "{err}");

    let path = write_manifest(dir.path(), &manifest("\n    ignore-invalid-versions = true"));
    let outcome = update_manifest(&path, &oracles, Options::default()).unwrap();
    assert_eq!(outcome.added, ["2.0.0"]);
}

#[test]
fn digest_updater_fills_sha256sums() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(
        dir.path(),
        r#"description = "tool"
binaries = ["tool"]
source = "https://example.com/tool-${version}-${os}-${arch}.tar.gz"

version "1.0.0" {
}
"#,
    );

    // One platform has a published checksum file; the others fall back to
    // download-and-hash.
    let mut fetcher = MemFetcher::new().with(
        "https://example.com/tool-1.0.0-linux-amd64.tar.gz.sha256.txt",
        b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa  tool-1.0.0-linux-amd64.tar.gz\n".to_vec(),
    );
    for platform in ["darwin-amd64", "darwin-arm64"] {
        fetcher = fetcher.with(
            format!("https://example.com/tool-1.0.0-{platform}.tar.gz"),
            b"archive bytes".to_vec(),
        );
    }

    let updater = DigestUpdater::new(&fetcher);
    let report = updater.update_file(&path).unwrap();
    assert_eq!(report.added, 3);
    assert!(report.errors.is_empty());

    let content = std::fs::read_to_string(&path).unwrap();
    let (manifest, errors) = Manifest::parse(&path, &content).unwrap();
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(manifest.sha256_sums.len(), 3);
    assert_eq!(
        manifest.sha256_sums["https://example.com/tool-1.0.0-linux-amd64.tar.gz"],
        "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
    );
    // The two hashed-from-bytes digests are identical and real.
    let darwin = &manifest.sha256_sums["https://example.com/tool-1.0.0-darwin-amd64.tar.gz"];
    assert_eq!(darwin.len(), 64);
    assert_eq!(
        darwin,
        &manifest.sha256_sums["https://example.com/tool-1.0.0-darwin-arm64.tar.gz"]
    );

    // Second run: everything recorded, nothing to add, file unchanged.
    let report = updater.update_file(&path).unwrap();
    assert_eq!(report.added, 0);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), content);
}
