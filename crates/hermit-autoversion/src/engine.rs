//! The auto-version engine.
//!
//! Visits every `auto-version` block in a manifest, queries its oracle,
//! and appends newly discovered version labels to the enclosing version
//! block, rewriting the document in place (temp file + rename). Running
//! twice against an unchanged upstream leaves the file byte-identical.

use crate::fetch::UrlFetcher;
use crate::github::ReleaseOracle;
use crate::gittags::TagLister;
use crate::{html, json};
use hcl_edit::expr::Expression;
use hcl_edit::structure::{Attribute, Block, BlockLabel, Body};
use hcl_edit::{Decorate, Decorated, Ident};
use hermit_core::{Error, Result, Version};
use hermit_manifest::schema::{AutoVersion, VersionBlock};
use hermit_manifest::Manifest;
use regex::Regex;
use std::path::Path;
use tracing::{debug, info, warn};

/// Page size used when release history is requested.
const RELEASE_HISTORY_LIMIT: usize = 20;

/// The external oracles the engine may consult.
pub struct Oracles<'a> {
    /// GitHub release API.
    pub releases: &'a dyn ReleaseOracle,
    /// Plain HTTP for html/json oracles.
    pub fetcher: &'a dyn UrlFetcher,
    /// Git remote tag listing.
    pub tags: &'a dyn TagLister,
}

impl std::fmt::Debug for Oracles<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Oracles").finish_non_exhaustive()
    }
}

/// Engine options.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Consult a bounded page of release history instead of only the
    /// latest release (github-release oracles only).
    pub history: bool,
}

/// Result of one manifest update.
#[derive(Debug, Default)]
pub struct Outcome {
    /// Version labels appended, in version-block order.
    pub added: Vec<String>,
    /// Whether the file was rewritten.
    pub changed: bool,
}

/// One computed block update.
struct BlockUpdate {
    latest: String,
    sha256: Option<String>,
    vars: Vec<(String, String)>,
}

/// Discover and apply auto-version updates for one manifest file.
pub fn update_manifest(path: &Path, oracles: &Oracles<'_>, options: Options) -> Result<Outcome> {
    let src = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let (manifest, errors) = Manifest::parse(path, &src)?;
    if let Some(first) = errors.first() {
        return Err(Error::manifest(path, first.to_string()));
    }

    let mut body = hermit_manifest::hcl::parse_body(path, &src)?;
    let mut outcome = Outcome::default();
    let mut index = 0;
    for block in body.get_blocks_mut("version") {
        let Some(typed) = manifest.versions.get(index) else {
            break;
        };
        index += 1;
        let Some(av) = &typed.auto_version else {
            continue;
        };
        let update = compute_update(typed, av, oracles, options)
            .map_err(|e| Error::manifest_at(path, av.line, e.to_string()))?;
        if let Some(update) = update {
            info!(path = %path.display(), version = %update.latest, "new version discovered");
            apply_update(block, av, &update)
                .map_err(|e| Error::manifest_at(path, av.line, e.to_string()))?;
            outcome.added.push(update.latest);
        }
    }

    if outcome.added.is_empty() {
        return Ok(outcome);
    }
    atomic_write(path, &body.to_string())?;
    outcome.changed = true;
    Ok(outcome)
}

fn compute_update(
    typed: &VersionBlock,
    av: &AutoVersion,
    oracles: &Oracles<'_>,
    options: Options,
) -> Result<Option<BlockUpdate>> {
    let mut json_doc: Option<serde_json::Value> = None;
    let candidates: Vec<String> = if let Some(repo) = &av.github_release {
        if options.history {
            oracles.releases.list(repo, RELEASE_HISTORY_LIMIT)?
        } else {
            oracles.releases.latest(repo)?.into_iter().collect()
        }
    } else if let Some(remote) = &av.git_tags {
        oracles.tags.tags(remote)?
    } else if let Some(oracle) = &av.html {
        let bytes = oracles.fetcher.fetch(&oracle.url, &[])?;
        let text = String::from_utf8_lossy(&bytes);
        match (&oracle.xpath, &oracle.css) {
            (Some(xpath), _) => html::xpath_versions(&text, xpath)?,
            (None, Some(css)) => html::css_versions(&text, css)?,
            (None, None) => vec![],
        }
    } else if let Some(oracle) = &av.json {
        let headers = if oracle.headers.is_empty() {
            vec![("Accept".to_string(), "application/json".to_string())]
        } else {
            oracle.headers.clone()
        };
        let bytes = oracles.fetcher.fetch(&oracle.url, &headers)?;
        let doc: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| Error::Download {
                url: oracle.url.clone(),
                message: format!("invalid JSON: {e}"),
            })?;
        let candidates = json::values_at(&doc, &oracle.path);
        json_doc = Some(doc);
        candidates
    } else {
        return Ok(None);
    };

    let pattern_src = av
        .version_pattern
        .as_deref()
        .unwrap_or(AutoVersion::DEFAULT_PATTERN);
    let pattern = Regex::new(pattern_src)
        .map_err(|e| Error::other("auto-version", format!("invalid version-pattern: {e}")))?;
    if pattern.captures_len() != 2 {
        return Err(Error::other(
            "auto-version",
            format!("version-pattern {pattern_src:?} must have exactly one capture group"),
        ));
    }

    let mut labels = Vec::new();
    for candidate in &candidates {
        let candidate = candidate.trim();
        match pattern.captures(candidate).and_then(|caps| caps.get(1)) {
            Some(label) => labels.push(label.as_str().to_string()),
            None if av.ignore_invalid_versions => {
                debug!(candidate, "ignoring invalid version");
            }
            None => {
                return Err(Error::other(
                    "auto-version",
                    format!("candidate {candidate:?} does not match {pattern_src:?}"),
                ));
            }
        }
    }
    let Some(latest) = labels
        .iter()
        .max_by(|a, b| Version::parse(a).cmp(&Version::parse(b)))
        .cloned()
    else {
        return Ok(None);
    };

    // Idempotent: nothing to do when the latest label is already declared.
    let latest_version = Version::parse(&latest);
    if typed.versions.iter().any(|v| *v == latest_version) {
        return Ok(None);
    }

    let mut sha256 = None;
    let mut vars = Vec::new();
    if let (Some(oracle), Some(doc)) = (&av.json, &json_doc) {
        if let Some(path) = &oracle.sha256_path {
            sha256 = json::values_at(doc, path).into_iter().next();
        }
        for (name, path) in &oracle.var_paths {
            match json::values_at(doc, path).into_iter().next() {
                Some(value) => vars.push((name.clone(), value)),
                None => warn!(name, path, "auto-version var path matched nothing"),
            }
        }
    }

    Ok(Some(BlockUpdate {
        latest,
        sha256,
        vars,
    }))
}

fn apply_update(block: &mut Block, av: &AutoVersion, update: &BlockUpdate) -> Result<()> {
    let mut label = Decorated::new(update.latest.clone());
    label.decor_mut().set_prefix(" ");
    block.labels.push(BlockLabel::String(label));

    if let Some(sha256) = &update.sha256 {
        upsert_attr(&mut block.body, "sha256", &quote(sha256), "  ")?;
    }

    if !update.vars.is_empty() {
        let mut all = av.vars.clone();
        let mut inner = all.remove(&update.latest).unwrap_or_default();
        for (key, value) in &update.vars {
            match inner.iter_mut().find(|(existing, _)| existing == key) {
                Some(slot) => slot.1 = value.clone(),
                None => inner.push((key.clone(), value.clone())),
            }
        }
        all.insert(update.latest.clone(), inner);

        let rendered = render_vars(&all);
        let av_body = block.body.get_blocks_mut("auto-version").next().map(|b| &mut b.body);
        match av_body {
            Some(body) => upsert_attr(body, "vars", &rendered, "    ")?,
            None => {
                return Err(Error::other(
                    "auto-version",
                    "auto-version block disappeared during rewrite",
                ))
            }
        }
    }
    Ok(())
}

/// Insert or replace an attribute, keeping the document parseable and the
/// rewrite deterministic. `value_src` is HCL expression source.
fn upsert_attr(body: &mut Body, key: &str, value_src: &str, indent: &str) -> Result<()> {
    let mut expr: Expression = hcl_edit::parser::parse_expr(value_src)
        .map_err(|e| Error::other("auto-version", format!("rendered invalid HCL: {e}")))?;
    expr.decor_mut().set_prefix(" ");

    let existing = body.get_attribute_mut(key);
    match existing {
        Some(mut attr) => {
            *attr.value_mut() = expr;
        }
        None => {
            let mut attr = Attribute::new(Decorated::new(Ident::new(key)), expr);
            attr.decor_mut().set_prefix(indent);
            body.push(attr);
        }
    }
    Ok(())
}

/// Deterministic rendering of the per-version extracted variables.
fn render_vars(vars: &std::collections::BTreeMap<String, Vec<(String, String)>>) -> String {
    let mut out = String::from("{ ");
    for (i, (version, entries)) in vars.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&quote(version));
        out.push_str(" = { ");
        for (j, (key, value)) in entries.iter().enumerate() {
            if j > 0 {
                out.push_str(", ");
            }
            out.push_str(&ident_or_quote(key));
            out.push_str(" = ");
            out.push_str(&quote(value));
        }
        out.push_str(" }");
    }
    out.push_str(" }");
    out
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn ident_or_quote(s: &str) -> String {
    let valid = !s.is_empty()
        && s.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        s.to_string()
    } else {
        quote(s)
    }
}

/// Write the document to a sibling temp file, then rename over the
/// original: concurrent readers never observe a torn manifest.
pub(crate) fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(|e| Error::io(parent, e))?;
    std::io::Write::write_all(&mut temp, content.as_bytes()).map_err(|e| Error::io(path, e))?;
    temp.persist(path)
        .map_err(|e| Error::io(path, e.error))?;
    Ok(())
}
