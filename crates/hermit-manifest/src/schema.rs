//! Typed manifest model and its decoder.
//!
//! A manifest is a root [`Layer`] plus version/channel blocks, each of
//! which is itself a layer. Decoding is strict: unknown attributes and
//! blocks are recorded as load errors with their source line.

use crate::actions::{Action, Event};
use crate::hcl as h;
use hcl_edit::expr::Expression;
use hcl_edit::structure::{Attribute, Block, Body, Structure};
use hermit_core::{Error, Result, Version};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One contribution to the merged package definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layer {
    /// Architecture filter for os overlay blocks.
    pub arch: Option<String>,
    /// Binary globs, relative to `root`.
    pub binaries: Vec<String>,
    /// macOS application bundles.
    pub apps: Vec<String>,
    /// Rename map applied at trigger time; values may be late-bound.
    pub rename: Vec<(String, String)>,
    /// Packages required in the environment.
    pub requires: Vec<String>,
    /// Virtual packages this manifest provides.
    pub provides: Vec<String>,
    /// Runtime dependencies installed alongside.
    pub runtime_deps: Vec<String>,
    /// Destination override.
    pub dest: Option<String>,
    /// Files copied out of the package into the environment.
    pub files: Vec<(String, String)>,
    /// Leading path components stripped during extraction.
    pub strip: Option<usize>,
    /// Root of the unpacked tree, when not `dest` itself.
    pub root: Option<String>,
    /// Shell command used to smoke-test the installation.
    pub test: Option<String>,
    /// Environment entries, in declaration order.
    pub env: Vec<(String, String)>,
    /// Interpolation variables.
    pub vars: Vec<(String, String)>,
    /// Download source URL.
    pub source: Option<String>,
    /// Fallback source URLs.
    pub mirrors: Vec<String>,
    /// Pinned SHA-256 for `source`.
    pub sha256: Option<String>,
    /// URL of a checksum file covering `source`.
    pub sha256_source: Option<String>,
    /// Leave the installed tree writable.
    pub mutable: bool,
    /// macOS overlays.
    pub darwin: Vec<Layer>,
    /// Linux overlays.
    pub linux: Vec<Layer>,
    /// Attribute-matched platform overlays.
    pub platform: Vec<PlatformBlock>,
    /// Lifecycle triggers.
    pub triggers: Vec<Trigger>,
}

/// A `platform <attr>... { }` overlay: included when every attribute
/// regex matches the os or the arch.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformBlock {
    /// Attribute regexes.
    pub attrs: Vec<String>,
    /// Overlay content.
    pub layer: Layer,
}

/// An `on <event> { }` block.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    /// Lifecycle event.
    pub event: Event,
    /// Actions in declared order.
    pub actions: Vec<Action>,
    /// Declared source line.
    pub line: usize,
}

/// A `version "..." ... { }` block.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionBlock {
    /// Version labels this block declares.
    pub versions: Vec<Version>,
    /// The block's layer.
    pub layer: Layer,
    /// Auto-version configuration, when present.
    pub auto_version: Option<AutoVersion>,
    /// Declared source line.
    pub line: usize,
}

/// What a channel resolves against.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelTarget {
    /// The channel's own layer carries the source; no version is chosen.
    None,
    /// Highest version matching a shell glob.
    Glob(String),
    /// Highest version with this prefix (synthesised channels).
    Prefix(Version),
}

/// A `channel "<name>" { }` block, declared or synthesised.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelBlock {
    /// Channel name.
    pub name: String,
    /// Update check interval.
    pub update: Option<Duration>,
    /// Version selection rule.
    pub target: ChannelTarget,
    /// Only stable (non-prerelease) versions are eligible. Set for
    /// synthesised channels.
    pub stable_only: bool,
    /// The channel's own layer.
    pub layer: Layer,
    /// Declared source line (0 for synthesised channels).
    pub line: usize,
}

/// An HTML version oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlOracle {
    /// Page to fetch.
    pub url: String,
    /// XPath expression (subset; see `hermit-autoversion`).
    pub xpath: Option<String>,
    /// CSS selector.
    pub css: Option<String>,
}

/// A JSON version oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonOracle {
    /// Document to fetch.
    pub url: String,
    /// Dot-path of the version value.
    pub path: String,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
    /// Dot-path of the artifact digest, upserted as the version block's
    /// `sha256`.
    pub sha256_path: Option<String>,
    /// Named dot-paths extracted per version into the auto-version `vars`.
    pub var_paths: Vec<(String, String)>,
}

/// An `auto-version { }` block inside a version block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutoVersion {
    /// `owner/repo` queried via the release API.
    pub github_release: Option<String>,
    /// Git remote listed for tags.
    pub git_tags: Option<String>,
    /// HTML oracle.
    pub html: Option<HtmlOracle>,
    /// JSON oracle.
    pub json: Option<JsonOracle>,
    /// Regex with exactly one capture group extracting the version label.
    pub version_pattern: Option<String>,
    /// Skip candidates the pattern rejects instead of failing.
    pub ignore_invalid_versions: bool,
    /// Values previously extracted by the JSON oracle, keyed by version.
    /// Entries for the selected version overlay the merged layer vars.
    pub vars: BTreeMap<String, Vec<(String, String)>>,
    /// Declared source line.
    pub line: usize,
}

impl AutoVersion {
    /// Default version pattern: an optional `v` prefix.
    pub const DEFAULT_PATTERN: &'static str = "v?(.*)";
}

/// A parsed manifest: description plus the root layer and its version and
/// channel blocks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    /// One-line description (required).
    pub description: String,
    /// Project homepage.
    pub homepage: Option<String>,
    /// Source repository.
    pub repository: Option<String>,
    /// Default version (`1.2`) or channel (`@stable`) applied to bare
    /// name selectors.
    pub default: Option<String>,
    /// Root layer.
    pub layer: Layer,
    /// Version blocks.
    pub versions: Vec<VersionBlock>,
    /// Channel blocks, including synthesised ones after loading.
    pub channels: Vec<ChannelBlock>,
    /// Digests keyed by fully-expanded source URL.
    pub sha256_sums: BTreeMap<String, String>,
}

impl Manifest {
    /// Parse and decode a manifest. HCL syntax errors are fatal;
    /// validation problems are returned alongside the (best-effort)
    /// manifest.
    pub fn parse(path: &Path, src: &str) -> Result<(Self, Vec<Error>)> {
        let body = h::parse_body(path, src)?;
        let mut decoder = Decoder {
            path: path.to_path_buf(),
            src,
            errors: Vec::new(),
        };
        let manifest = decoder.manifest(&body);
        Ok((manifest, decoder.errors))
    }

    /// Every version label declared across version blocks.
    #[must_use]
    pub fn all_versions(&self) -> Vec<&Version> {
        self.versions.iter().flat_map(|vb| &vb.versions).collect()
    }

    /// The version block declaring `version`, if any.
    #[must_use]
    pub fn version_block(&self, version: &Version) -> Option<&VersionBlock> {
        self.versions
            .iter()
            .find(|vb| vb.versions.iter().any(|v| v == version))
    }

    /// The channel named `name`, if any.
    #[must_use]
    pub fn channel(&self, name: &str) -> Option<&ChannelBlock> {
        self.channels.iter().find(|c| c.name == name)
    }
}

struct Decoder<'a> {
    path: PathBuf,
    src: &'a str,
    errors: Vec<Error>,
}

impl Decoder<'_> {
    fn error(&mut self, line: usize, message: impl Into<String>) {
        self.errors
            .push(Error::manifest_at(&self.path, line, message));
    }

    fn manifest(&mut self, body: &Body) -> Manifest {
        let mut manifest = Manifest::default();
        for structure in body.iter() {
            match structure {
                Structure::Attribute(attr) => {
                    let line = h::item_line(self.src, attr);
                    match attr.key.value().as_str() {
                        "description" => {
                            manifest.description = self.str_attr(attr).unwrap_or_default();
                        }
                        "homepage" => manifest.homepage = self.str_attr(attr),
                        "repository" => manifest.repository = self.str_attr(attr),
                        "default" => manifest.default = self.str_attr(attr),
                        "sha256sums" => {
                            if let Some(entries) = h::expr_str_map(&attr.value) {
                                manifest.sha256_sums = entries.into_iter().collect();
                            } else {
                                self.error(line, "sha256sums must be a map of strings");
                            }
                        }
                        _ => {
                            if !self.layer_attr(&mut manifest.layer, attr) {
                                self.error(
                                    line,
                                    format!("unknown attribute {:?}", attr.key.value().as_str()),
                                );
                            }
                        }
                    }
                }
                Structure::Block(block) => {
                    let line = h::item_line(self.src, block);
                    match block.ident.value().as_str() {
                        "version" => {
                            let vb = self.version_block(block, line);
                            manifest.versions.push(vb);
                        }
                        "channel" => {
                            if let Some(cb) = self.channel_block(block, line) {
                                manifest.channels.push(cb);
                            }
                        }
                        _ => {
                            if !self.layer_block(&mut manifest.layer, block) {
                                self.error(
                                    line,
                                    format!("unknown block {:?}", block.ident.value().as_str()),
                                );
                            }
                        }
                    }
                }
            }
        }
        if manifest.description.is_empty() {
            self.error(1, "missing description");
        }
        manifest
    }

    fn str_attr(&mut self, attr: &Attribute) -> Option<String> {
        match h::expr_str(&attr.value) {
            Some(s) => Some(s),
            None => {
                let line = h::item_line(self.src, attr);
                self.error(
                    line,
                    format!("attribute {:?} must be a string", attr.key.value().as_str()),
                );
                None
            }
        }
    }

    /// Decode a layer-level attribute into `layer`. Returns false when the
    /// key is not a layer field.
    fn layer_attr(&mut self, layer: &mut Layer, attr: &Attribute) -> bool {
        let line = h::item_line(self.src, attr);
        let key = attr.key.value().as_str().to_string();
        let expr = &attr.value;
        let mut bad = |d: &mut Self, what: &str| d.error(line, format!("{key} must be {what}"));
        match key.as_str() {
            "arch" => layer.arch = h::expr_str(expr),
            "binaries" => match h::expr_str_list(expr) {
                Some(v) => layer.binaries = v,
                None => bad(self, "a list of strings"),
            },
            "apps" => match h::expr_str_list(expr) {
                Some(v) => layer.apps = v,
                None => bad(self, "a list of strings"),
            },
            "rename" => match h::expr_str_map(expr) {
                Some(v) => layer.rename = v,
                None => bad(self, "a map of strings"),
            },
            "requires" => match h::expr_str_list(expr) {
                Some(v) => layer.requires = v,
                None => bad(self, "a list of strings"),
            },
            "provides" => match h::expr_str_list(expr) {
                Some(v) => layer.provides = v,
                None => bad(self, "a list of strings"),
            },
            "runtime-deps" => match h::expr_str_list(expr) {
                Some(v) => layer.runtime_deps = v,
                None => bad(self, "a list of strings"),
            },
            "dest" => layer.dest = h::expr_str(expr),
            "files" => match h::expr_str_map(expr) {
                Some(v) => layer.files = v,
                None => bad(self, "a map of strings"),
            },
            "strip" => match h::expr_usize(expr) {
                Some(v) => layer.strip = Some(v),
                None => bad(self, "a non-negative integer"),
            },
            "root" => layer.root = h::expr_str(expr),
            "test" => layer.test = h::expr_str(expr),
            "env" => match h::expr_str_map(expr) {
                Some(v) => layer.env = v,
                None => bad(self, "a map of strings"),
            },
            "vars" => match h::expr_str_map(expr) {
                Some(v) => layer.vars = v,
                None => bad(self, "a map of strings"),
            },
            "source" => layer.source = h::expr_str(expr),
            "mirrors" => match h::expr_str_list(expr) {
                Some(v) => layer.mirrors = v,
                None => bad(self, "a list of strings"),
            },
            "sha256" => layer.sha256 = h::expr_str(expr),
            "sha256-source" => layer.sha256_source = h::expr_str(expr),
            "mutable" => match h::expr_bool(expr) {
                Some(v) => layer.mutable = v,
                None => bad(self, "a boolean"),
            },
            _ => return false,
        }
        true
    }

    /// Decode a layer-level block into `layer`. Returns false when the
    /// identifier is not a layer block.
    fn layer_block(&mut self, layer: &mut Layer, block: &Block) -> bool {
        let line = h::item_line(self.src, block);
        match block.ident.value().as_str() {
            "darwin" => {
                let sub = self.layer(&block.body);
                layer.darwin.push(sub);
            }
            "linux" => {
                let sub = self.layer(&block.body);
                layer.linux.push(sub);
            }
            "platform" => {
                let attrs = h::labels(block);
                if attrs.is_empty() {
                    self.error(line, "platform block requires at least one attribute");
                }
                let sub = self.layer(&block.body);
                layer.platform.push(PlatformBlock { attrs, layer: sub });
            }
            "on" => {
                let labels = h::labels(block);
                let Some(event) = labels.first().and_then(|l| Event::parse(l)) else {
                    self.error(
                        line,
                        format!(
                            "invalid trigger event {:?}, expected one of unpack, install, uninstall, exec, activate",
                            labels.first().map(String::as_str).unwrap_or("")
                        ),
                    );
                    return true;
                };
                let actions = self.actions(&block.body);
                layer.triggers.push(Trigger {
                    event,
                    actions,
                    line,
                });
            }
            _ => return false,
        }
        true
    }

    /// Decode a plain (non-manifest) layer body.
    fn layer(&mut self, body: &Body) -> Layer {
        let mut layer = Layer::default();
        for structure in body.iter() {
            match structure {
                Structure::Attribute(attr) => {
                    if !self.layer_attr(&mut layer, attr) {
                        let line = h::item_line(self.src, attr);
                        self.error(
                            line,
                            format!("unknown attribute {:?}", attr.key.value().as_str()),
                        );
                    }
                }
                Structure::Block(block) => {
                    if !self.layer_block(&mut layer, block) {
                        let line = h::item_line(self.src, block);
                        self.error(
                            line,
                            format!("unknown block {:?}", block.ident.value().as_str()),
                        );
                    }
                }
            }
        }
        layer
    }

    fn version_block(&mut self, block: &Block, line: usize) -> VersionBlock {
        let labels = h::labels(block);
        if labels.is_empty() {
            self.error(line, "version block requires at least one label");
        }
        let versions = labels.iter().map(|l| Version::parse(l)).collect();

        let mut layer = Layer::default();
        let mut auto_version = None;
        for structure in block.body.iter() {
            match structure {
                Structure::Attribute(attr) => {
                    if !self.layer_attr(&mut layer, attr) {
                        let line = h::item_line(self.src, attr);
                        self.error(
                            line,
                            format!("unknown attribute {:?}", attr.key.value().as_str()),
                        );
                    }
                }
                Structure::Block(sub) if sub.ident.value().as_str() == "auto-version" => {
                    let line = h::item_line(self.src, sub);
                    auto_version = Some(self.auto_version(sub, line));
                }
                Structure::Block(sub) => {
                    if !self.layer_block(&mut layer, sub) {
                        let line = h::item_line(self.src, sub);
                        self.error(
                            line,
                            format!("unknown block {:?}", sub.ident.value().as_str()),
                        );
                    }
                }
            }
        }
        VersionBlock {
            versions,
            layer,
            auto_version,
            line,
        }
    }

    fn channel_block(&mut self, block: &Block, line: usize) -> Option<ChannelBlock> {
        let labels = h::labels(block);
        let Some(name) = labels.first() else {
            self.error(line, "channel block requires a name label");
            return None;
        };

        let mut update = None;
        let mut target = ChannelTarget::None;
        let mut layer = Layer::default();
        for structure in block.body.iter() {
            match structure {
                Structure::Attribute(attr) => {
                    let attr_line = h::item_line(self.src, attr);
                    match attr.key.value().as_str() {
                        "update" => {
                            let Some(text) = self.str_attr(attr) else {
                                continue;
                            };
                            match parse_duration(&text) {
                                Some(d) => update = Some(d),
                                None => {
                                    self.error(attr_line, format!("invalid duration {text:?}"));
                                }
                            }
                        }
                        "version" => {
                            if let Some(glob) = self.str_attr(attr) {
                                target = ChannelTarget::Glob(glob);
                            }
                        }
                        _ => {
                            if !self.layer_attr(&mut layer, attr) {
                                self.error(
                                    attr_line,
                                    format!("unknown attribute {:?}", attr.key.value().as_str()),
                                );
                            }
                        }
                    }
                }
                Structure::Block(sub) => {
                    if !self.layer_block(&mut layer, sub) {
                        let sub_line = h::item_line(self.src, sub);
                        self.error(
                            sub_line,
                            format!("unknown block {:?}", sub.ident.value().as_str()),
                        );
                    }
                }
            }
        }
        Some(ChannelBlock {
            name: name.clone(),
            update,
            target,
            stable_only: false,
            layer,
            line,
        })
    }

    fn auto_version(&mut self, block: &Block, line: usize) -> AutoVersion {
        let mut av = AutoVersion {
            line,
            ..AutoVersion::default()
        };
        for structure in block.body.iter() {
            match structure {
                Structure::Attribute(attr) => {
                    let attr_line = h::item_line(self.src, attr);
                    match attr.key.value().as_str() {
                        "github-release" => av.github_release = self.str_attr(attr),
                        "git-tags" => av.git_tags = self.str_attr(attr),
                        "version-pattern" => av.version_pattern = self.str_attr(attr),
                        "ignore-invalid-versions" => {
                            match h::expr_bool(&attr.value) {
                                Some(v) => av.ignore_invalid_versions = v,
                                None => self.error(
                                    attr_line,
                                    "ignore-invalid-versions must be a boolean",
                                ),
                            }
                        }
                        "vars" => match nested_str_maps(&attr.value) {
                            Some(vars) => av.vars = vars,
                            None => self.error(
                                attr_line,
                                "vars must be a map of version to map of strings",
                            ),
                        },
                        other => {
                            self.error(attr_line, format!("unknown attribute {other:?}"));
                        }
                    }
                }
                Structure::Block(sub) => {
                    let sub_line = h::item_line(self.src, sub);
                    match sub.ident.value().as_str() {
                        "html" => av.html = self.html_oracle(sub, sub_line),
                        "json" => av.json = self.json_oracle(sub, sub_line),
                        other => self.error(sub_line, format!("unknown block {other:?}")),
                    }
                }
            }
        }
        let strategies = usize::from(av.github_release.is_some())
            + usize::from(av.git_tags.is_some())
            + usize::from(av.html.is_some())
            + usize::from(av.json.is_some());
        if strategies != 1 {
            self.error(
                line,
                "auto-version requires exactly one of github-release, git-tags, html, json",
            );
        }
        av
    }

    fn html_oracle(&mut self, block: &Block, line: usize) -> Option<HtmlOracle> {
        let mut url = None;
        let mut xpath = None;
        let mut css = None;
        for structure in block.body.iter() {
            match structure {
                Structure::Attribute(attr) => match attr.key.value().as_str() {
                    "url" => url = self.str_attr(attr),
                    "xpath" => xpath = self.str_attr(attr),
                    "css" => css = self.str_attr(attr),
                    other => {
                        let attr_line = h::item_line(self.src, attr);
                        self.error(attr_line, format!("unknown attribute {other:?}"));
                    }
                },
                Structure::Block(sub) => {
                    let sub_line = h::item_line(self.src, sub);
                    self.error(
                        sub_line,
                        format!("unknown block {:?}", sub.ident.value().as_str()),
                    );
                }
            }
        }
        let Some(url) = url else {
            self.error(line, "html block requires a url");
            return None;
        };
        if xpath.is_some() == css.is_some() {
            self.error(line, "html block requires exactly one of xpath or css");
            return None;
        }
        Some(HtmlOracle { url, xpath, css })
    }

    fn json_oracle(&mut self, block: &Block, line: usize) -> Option<JsonOracle> {
        let mut url = None;
        let mut path = None;
        let mut headers = Vec::new();
        let mut sha256_path = None;
        let mut var_paths = Vec::new();
        for structure in block.body.iter() {
            match structure {
                Structure::Attribute(attr) => {
                    let attr_line = h::item_line(self.src, attr);
                    match attr.key.value().as_str() {
                        "url" => url = self.str_attr(attr),
                        "path" => path = self.str_attr(attr),
                        "sha256-path" => sha256_path = self.str_attr(attr),
                        "headers" => match h::expr_str_map(&attr.value) {
                            Some(v) => headers = v,
                            None => self.error(attr_line, "headers must be a map of strings"),
                        },
                        "vars" => match h::expr_str_map(&attr.value) {
                            Some(v) => var_paths = v,
                            None => self.error(attr_line, "vars must be a map of strings"),
                        },
                        other => self.error(attr_line, format!("unknown attribute {other:?}")),
                    }
                }
                Structure::Block(sub) if sub.ident.value().as_str() == "vars" => {
                    for structure in sub.body.iter() {
                        match structure {
                            Structure::Attribute(attr) => {
                                if let Some(value) = self.str_attr(attr) {
                                    var_paths.push((attr.key.value().as_str().to_string(), value));
                                }
                            }
                            Structure::Block(inner) => {
                                let inner_line = h::item_line(self.src, inner);
                                self.error(
                                    inner_line,
                                    format!("unknown block {:?}", inner.ident.value().as_str()),
                                );
                            }
                        }
                    }
                }
                Structure::Block(sub) => {
                    let sub_line = h::item_line(self.src, sub);
                    self.error(
                        sub_line,
                        format!("unknown block {:?}", sub.ident.value().as_str()),
                    );
                }
            }
        }
        let (Some(url), Some(path)) = (url, path) else {
            self.error(line, "json block requires url and path");
            return None;
        };
        Some(JsonOracle {
            url,
            path,
            headers,
            sha256_path,
            var_paths,
        })
    }

    fn actions(&mut self, body: &Body) -> Vec<Action> {
        let mut actions = Vec::new();
        for structure in body.iter() {
            let block = match structure {
                Structure::Block(block) => block,
                Structure::Attribute(attr) => {
                    let line = h::item_line(self.src, attr);
                    self.error(line, "trigger blocks may only contain action blocks");
                    continue;
                }
            };
            let line = h::item_line(self.src, block);
            let fields = self.action_fields(&block.body);
            let action = match block.ident.value().as_str() {
                "run" => fields.require(self, line, "cmd").map(|cmd| Action::Run {
                    cmd,
                    dir: fields.get("dir"),
                    env: fields.get_list("env"),
                    stdin: fields.get("stdin"),
                    line,
                }),
                "copy" => match (fields.require(self, line, "from"), fields.require(self, line, "to")) {
                    (Some(from), Some(to)) => Some(Action::Copy {
                        from,
                        to,
                        mode: fields.get_mode(self, line, "mode"),
                        line,
                    }),
                    _ => None,
                },
                "chmod" => match (
                    fields.require(self, line, "file"),
                    fields.get_mode(self, line, "mode"),
                ) {
                    (Some(file), Some(mode)) => Some(Action::Chmod { file, mode, line }),
                    _ => {
                        self.error(line, "chmod requires file and mode");
                        None
                    }
                },
                "rename" => match (fields.require(self, line, "from"), fields.require(self, line, "to")) {
                    (Some(from), Some(to)) => Some(Action::Rename { from, to, line }),
                    _ => None,
                },
                "delete" => Some(Action::Delete {
                    recursive: fields.get_bool("recursive"),
                    files: fields.get_list("files"),
                    line,
                }),
                "mkdir" => fields.require(self, line, "dir").map(|dir| Action::Mkdir {
                    dir,
                    mode: fields.get_mode(self, line, "mode"),
                    line,
                }),
                "symlink" => match (fields.require(self, line, "from"), fields.require(self, line, "to")) {
                    (Some(from), Some(to)) => Some(Action::Symlink { from, to, line }),
                    _ => None,
                },
                "message" => fields
                    .require(self, line, "text")
                    .map(|text| Action::Message { text, line }),
                other => {
                    self.error(line, format!("unknown action {other:?}"));
                    None
                }
            };
            actions.extend(action);
        }
        actions
    }

    fn action_fields(&mut self, body: &Body) -> ActionFields {
        let mut fields = ActionFields::default();
        for structure in body.iter() {
            match structure {
                Structure::Attribute(attr) => {
                    fields
                        .entries
                        .push((attr.key.value().as_str().to_string(), attr.value.clone()));
                }
                Structure::Block(block) => {
                    let line = h::item_line(self.src, block);
                    self.error(line, "action blocks may not contain nested blocks");
                }
            }
        }
        fields
    }
}

#[derive(Default)]
struct ActionFields {
    entries: Vec<(String, Expression)>,
}

impl ActionFields {
    fn expr(&self, key: &str) -> Option<&Expression> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn get(&self, key: &str) -> Option<String> {
        self.expr(key).and_then(h::expr_str)
    }

    fn get_list(&self, key: &str) -> Vec<String> {
        self.expr(key).and_then(h::expr_str_list).unwrap_or_default()
    }

    fn get_bool(&self, key: &str) -> bool {
        self.expr(key).and_then(h::expr_bool).unwrap_or(false)
    }

    fn require(&self, decoder: &mut Decoder<'_>, line: usize, key: &str) -> Option<String> {
        let value = self.get(key);
        if value.is_none() {
            decoder.error(line, format!("missing required attribute {key:?}"));
        }
        value
    }

    /// Modes are written with octal digits (`mode = 755`).
    fn get_mode(&self, decoder: &mut Decoder<'_>, line: usize, key: &str) -> Option<u32> {
        let n = self.expr(key).and_then(h::expr_usize)?;
        match u32::from_str_radix(&n.to_string(), 8) {
            Ok(mode) => Some(mode),
            Err(_) => {
                decoder.error(line, format!("invalid mode {n}, expected octal digits"));
                None
            }
        }
    }
}

/// Parse a duration like `24h`, `5h`, `1h30m`, `90s`, `7d`.
#[must_use]
pub fn parse_duration(s: &str) -> Option<Duration> {
    let mut total = 0u64;
    let mut chars = s.chars().peekable();
    let mut seen = false;
    while chars.peek().is_some() {
        let mut value = 0u64;
        let mut digits = false;
        while let Some(c) = chars.peek().copied() {
            if let Some(d) = c.to_digit(10) {
                value = value.checked_mul(10)?.checked_add(u64::from(d))?;
                digits = true;
                chars.next();
            } else {
                break;
            }
        }
        if !digits {
            return None;
        }
        let mut unit = String::new();
        while let Some(c) = chars.peek().copied() {
            if c.is_ascii_alphabetic() {
                unit.push(c);
                chars.next();
            } else {
                break;
            }
        }
        let scale = match unit.as_str() {
            "s" => 1,
            "m" => 60,
            "h" => 3600,
            "d" => 86_400,
            _ => return None,
        };
        total = total.checked_add(value.checked_mul(scale)?)?;
        seen = true;
    }
    seen.then(|| Duration::from_secs(total))
}

/// Decode `{ "1.2.3" = { build = "x" } }`-shaped nested maps.
fn nested_str_maps(expr: &Expression) -> Option<BTreeMap<String, Vec<(String, String)>>> {
    match expr {
        Expression::Object(object) => {
            let mut out = BTreeMap::new();
            for (key, value) in object.iter() {
                let key = h::object_key_str(key)?;
                let inner = h::expr_str_map(value.expr())?;
                out.insert(key, inner);
            }
            Some(out)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const GO: &str = r#"
description = "Go programming language"
binaries = ["bin/go", "bin/gofmt"]
source = "https://golang.org/dl/go${version}.${os}-${arch}.tar.gz"
env = {
  "GOROOT": "${root}",
}
strip = 1

darwin {
  arch = "arm64"
  vars = { "suffix": "arm" }
}

platform "linux" "amd64" {
  test = "go version"
}

version "1.13.5" "1.14.4" {
  auto-version {
    github-release = "golang/go"
    version-pattern = "go(.*)"
  }
}

channel "stable" {
  update = "24h"
  version = "1.14.*"
}

on unpack {
  chmod {
    file = "bin/go"
    mode = 755
  }
  message {
    text = "go installed"
  }
}

sha256sums = {
  "https://golang.org/dl/go1.14.4.linux-amd64.tar.gz": "aed845e4185a0b2a3c3d5e1d0a35491702c55889192bb9c30e67a3de6849c067",
}
"#;

    #[test]
    fn decode_full_manifest() {
        let (m, errors) = Manifest::parse(Path::new("go.hcl"), GO).unwrap();
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        assert_eq!(m.description, "Go programming language");
        assert_eq!(m.layer.binaries, ["bin/go", "bin/gofmt"]);
        assert_eq!(m.layer.strip, Some(1));
        assert_eq!(m.layer.darwin.len(), 1);
        assert_eq!(m.layer.darwin[0].arch.as_deref(), Some("arm64"));
        assert_eq!(m.layer.platform[0].attrs, ["linux", "amd64"]);
        assert_eq!(m.versions.len(), 1);
        assert_eq!(
            m.versions[0]
                .versions
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            ["1.13.5", "1.14.4"]
        );
        let av = m.versions[0].auto_version.as_ref().unwrap();
        assert_eq!(av.github_release.as_deref(), Some("golang/go"));
        assert_eq!(av.version_pattern.as_deref(), Some("go(.*)"));
        let channel = m.channel("stable").unwrap();
        assert_eq!(channel.update, Some(Duration::from_secs(24 * 3600)));
        assert_eq!(channel.target, ChannelTarget::Glob("1.14.*".to_string()));
        assert_eq!(m.layer.triggers.len(), 1);
        assert_eq!(m.layer.triggers[0].event, Event::Unpack);
        assert_eq!(m.layer.triggers[0].actions.len(), 2);
        assert_eq!(m.sha256_sums.len(), 1);
    }

    #[test]
    fn chmod_mode_is_octal() {
        let (m, errors) = Manifest::parse(Path::new("go.hcl"), GO).unwrap();
        assert!(errors.is_empty());
        match &m.layer.triggers[0].actions[0] {
            Action::Chmod { mode, .. } => assert_eq!(*mode, 0o755),
            other => panic!("expected chmod, got {other:?}"),
        }
    }

    #[test]
    fn unknown_attribute_is_an_error() {
        let src = "description = \"x\"\nsrc = \"nope\"\n";
        let (_, errors) = Manifest::parse(Path::new("x.hcl"), src).unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("unknown attribute"));
        assert!(errors[0].to_string().contains("x.hcl:2"));
    }

    #[test]
    fn invalid_event_is_an_error() {
        let src = "description = \"x\"\non postinstall {\n}\n";
        let (_, errors) = Manifest::parse(Path::new("x.hcl"), src).unwrap();
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("invalid trigger event")));
    }

    #[test]
    fn auto_version_requires_one_strategy() {
        let src = r#"
description = "x"
version "1.0" {
  auto-version {
    github-release = "a/b"
    git-tags = "https://example.com/c.git"
  }
}
"#;
        let (_, errors) = Manifest::parse(Path::new("x.hcl"), src).unwrap();
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("exactly one of")));
    }

    #[test]
    fn json_oracle_with_vars() {
        let src = r#"
description = "x"
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
    vars = {
      "1.0.0" = { build = "100" }
    }
  }
}
"#;
        let (m, errors) = Manifest::parse(Path::new("x.hcl"), src).unwrap();
        assert!(errors.is_empty(), "{errors:?}");
        let av = m.versions[0].auto_version.as_ref().unwrap();
        let json = av.json.as_ref().unwrap();
        assert_eq!(json.path, "tag_name");
        assert_eq!(json.sha256_path.as_deref(), Some("assets.0.sha256"));
        assert_eq!(json.var_paths, [("build".to_string(), "build.number".to_string())]);
        assert_eq!(
            av.vars["1.0.0"],
            [("build".to_string(), "100".to_string())]
        );
    }

    #[test_case("24h", Some(86_400) ; "hours")]
    #[test_case("5h", Some(18_000) ; "five hours")]
    #[test_case("1h30m", Some(5_400) ; "compound")]
    #[test_case("90s", Some(90) ; "seconds")]
    #[test_case("7d", Some(604_800) ; "days")]
    #[test_case("", None ; "empty")]
    #[test_case("h", None ; "missing digits")]
    #[test_case("5x", None ; "bad unit")]
    fn durations(s: &str, seconds: Option<u64>) {
        assert_eq!(parse_duration(s), seconds.map(Duration::from_secs));
    }
}
