//! The digest updater.
//!
//! For every (version × core platform) source without a recorded digest,
//! find or compute the SHA-256 and upsert it into the manifest-level
//! `sha256sums` map, keyed by the fully-expanded source URL. The file is
//! snapshotted every ten new digests to bound work lost to a failure.

use crate::engine::atomic_write;
use crate::fetch::UrlFetcher;
use hcl_edit::expr::Expression;
use hcl_edit::structure::{Attribute, Body};
use hcl_edit::{Decorate, Decorated, Ident};
use hermit_core::{core_platforms, xarch, Error, Result};
use hermit_manifest::interpolate::{expand, Context};
use hermit_manifest::merge::flatten;
use hermit_manifest::Manifest;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

/// Snapshot the manifest after this many new digests.
const SNAPSHOT_EVERY: usize = 10;

static CHECKSUM_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9a-fA-F]{64})(?:[\s*]+(.+))?$").expect("checksum pattern"));

/// Outcome of a digest update over one manifest.
#[derive(Debug, Default)]
pub struct DigestReport {
    /// Digests added.
    pub added: usize,
    /// Per-source failures; the update continues past them.
    pub errors: Vec<(String, Error)>,
}

/// Computes and records source digests.
pub struct DigestUpdater<'a> {
    fetcher: &'a dyn UrlFetcher,
    /// Checksum files are shared across many sources; fetch each URL once.
    checksum_cache: Mutex<HashMap<String, Option<String>>>,
}

impl std::fmt::Debug for DigestUpdater<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestUpdater")
            .field("cached", &self.checksum_cache.lock().len())
            .finish_non_exhaustive()
    }
}

impl<'a> DigestUpdater<'a> {
    /// Updater over an HTTP fetcher.
    #[must_use]
    pub fn new(fetcher: &'a dyn UrlFetcher) -> Self {
        Self {
            fetcher,
            checksum_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Fill in missing digests for one manifest file.
    pub fn update_file(&self, path: &Path) -> Result<DigestReport> {
        let src = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let (manifest, errors) = Manifest::parse(path, &src)?;
        if let Some(first) = errors.first() {
            return Err(Error::manifest(path, first.to_string()));
        }
        let mut body = hermit_manifest::hcl::parse_body(path, &src)?;

        let mut sums: BTreeMap<String, String> = manifest.sha256_sums.clone();
        let mut report = DigestReport::default();
        let mut unsnapshotted = 0;

        for vb in &manifest.versions {
            for version in &vb.versions {
                for platform in core_platforms() {
                    let Ok(flat) = flatten(&manifest, Some(version), None, &platform) else {
                        continue;
                    };
                    if flat.sha256.is_some() {
                        continue;
                    }
                    let Some(source) = flat.source.as_deref().filter(|s| !s.is_empty()) else {
                        continue;
                    };
                    let mut ctx = Context::new()
                        .with("version", version.to_string())
                        .with("os", platform.os.clone())
                        .with("arch", platform.arch.clone())
                        .with("xarch", xarch(&platform.arch));
                    for (key, value) in &flat.vars {
                        ctx.set(key.clone(), value.clone());
                    }
                    let Ok(url) = expand(source, &ctx, true) else {
                        // Sources referencing late-bound values cannot be
                        // keyed; skip them.
                        continue;
                    };
                    if sums.contains_key(&url) {
                        continue;
                    }
                    let sha256_source = match &flat.sha256_source {
                        Some(s) => expand(s, &ctx, true).ok(),
                        None => None,
                    };
                    match self.digest_for(&url, sha256_source.as_deref()) {
                        Ok(digest) => {
                            debug!(url, digest, "recorded digest");
                            sums.insert(url, digest);
                            report.added += 1;
                            unsnapshotted += 1;
                            if unsnapshotted == SNAPSHOT_EVERY {
                                snapshot(path, &mut body, &sums)?;
                                unsnapshotted = 0;
                            }
                        }
                        Err(e) => {
                            warn!(url, error = %e, "digest update failed");
                            report.errors.push((url, e));
                        }
                    }
                }
            }
        }

        if unsnapshotted > 0 {
            snapshot(path, &mut body, &sums)?;
        }
        if report.added > 0 {
            info!(path = %path.display(), added = report.added, "updated digests");
        }
        Ok(report)
    }

    /// Find the digest of `url`: checksum sidecar files first, then
    /// download-and-hash.
    fn digest_for(&self, url: &str, sha256_source: Option<&str>) -> Result<String> {
        let basename = url.rsplit('/').next().unwrap_or(url);
        let mut candidates = Vec::new();
        if let Some(explicit) = sha256_source {
            candidates.push(explicit.to_string());
        }
        candidates.push(format!("{url}.sha256.txt"));
        candidates.push(format!("{url}.sha256"));
        if let Some((base, _)) = url.rsplit_once('/') {
            for name in ["checksums.txt", "sha256.txt", "SHA256SUMS"] {
                candidates.push(format!("{base}/{name}"));
            }
        }

        for candidate in candidates {
            let Some(content) = self.checksum_file(&candidate) else {
                continue;
            };
            if let Some(digest) = find_digest(&content, basename) {
                return Ok(digest);
            }
        }

        // No sidecar: download and hash the bytes themselves.
        let bytes = self.fetcher.fetch(url, &[])?;
        Ok(hex(&Sha256::digest(&bytes)))
    }

    fn checksum_file(&self, url: &str) -> Option<String> {
        if let Some(cached) = self.checksum_cache.lock().get(url) {
            return cached.clone();
        }
        let fetched = self
            .fetcher
            .fetch(url, &[])
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok());
        self.checksum_cache
            .lock()
            .insert(url.to_string(), fetched.clone());
        fetched
    }
}

/// Parse checksum-file content, matching `basename` when lines carry file
/// names. A single bare digest covers any file.
fn find_digest(content: &str, basename: &str) -> Option<String> {
    let mut bare = Vec::new();
    for line in content.lines() {
        let Some(caps) = CHECKSUM_LINE.captures(line.trim()) else {
            continue;
        };
        let digest = caps[1].to_ascii_lowercase();
        match caps.get(2) {
            Some(name) => {
                let name = name.as_str().trim();
                let name = name.rsplit('/').next().unwrap_or(name);
                if name == basename {
                    return Some(digest);
                }
            }
            None => bare.push(digest),
        }
    }
    if bare.len() == 1 {
        return bare.into_iter().next();
    }
    None
}

/// Rewrite the top-level `sha256sums` attribute and persist atomically.
fn snapshot(path: &Path, body: &mut Body, sums: &BTreeMap<String, String>) -> Result<()> {
    let mut rendered = String::from("{\n");
    for (url, digest) in sums {
        rendered.push_str(&format!("  {} = {},\n", quote(url), quote(digest)));
    }
    rendered.push('}');

    let mut expr: Expression = hcl_edit::parser::parse_expr(&rendered)
        .map_err(|e| Error::other("digests", format!("rendered invalid HCL: {e}")))?;
    expr.decor_mut().set_prefix(" ");

    let existing = body.get_attribute_mut("sha256sums");
    match existing {
        Some(mut attr) => *attr.value_mut() = expr,
        None => {
            let attr = Attribute::new(Decorated::new(Ident::new("sha256sums")), expr);
            body.push(attr);
        }
    }
    atomic_write(path, &body.to_string())
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_line_matching() {
        let content = "\
abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789  tool-1.0-linux-amd64.tar.gz
1111111123456789abcdef0123456789abcdef0123456789abcdef0123456789  tool-1.0-darwin-amd64.tar.gz
";
        assert_eq!(
            find_digest(content, "tool-1.0-darwin-amd64.tar.gz").unwrap(),
            "1111111123456789abcdef0123456789abcdef0123456789abcdef0123456789"
        );
        assert!(find_digest(content, "other.tar.gz").is_none());
    }

    #[test]
    fn bare_digest_matches_anything() {
        let content = "ABCDEF0123456789abcdef0123456789abcdef0123456789abcdef0123456789\n";
        assert_eq!(
            find_digest(content, "whatever.tar.gz").unwrap(),
            "abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789"
        );
    }

    #[test]
    fn hex_encoding() {
        assert_eq!(hex(&[0x12, 0xab]), "12ab");
    }
}
