//! Command definitions and dispatch.

pub mod auto_version;
pub mod resolve;
pub mod search;
pub mod update_digests;
pub mod validate;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Hermit manages hermetic, per-project toolchains.
#[derive(Debug, Parser)]
#[command(name = "hermit", version, about)]
pub struct Cli {
    /// Increase log verbosity (repeatable).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Environment directory.
    #[arg(long, global = true, env = "HERMIT_ENV")]
    pub env: Option<PathBuf>,

    /// State directory override.
    #[arg(long, global = true, env = "HERMIT_STATE_DIR")]
    pub state: Option<PathBuf>,

    /// Manifest source (directory or git URL); repeatable, first wins.
    #[arg(long, global = true)]
    pub source: Vec<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve a package selector and print the concrete package.
    Resolve(ResolveArgs),
    /// List packages matching a pattern, one entry per version/channel.
    Search(SearchArgs),
    /// Validate every manifest in a directory.
    Validate(ValidateArgs),
    /// Discover and append new upstream versions to manifests.
    AutoVersion(AutoVersionArgs),
    /// Fill in missing sha256 digests in manifests.
    UpdateDigests(UpdateDigestsArgs),
}

/// Arguments for `hermit resolve`.
#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// Package selector (`go`, `go-1.21`, `go@stable`, `go-1.*`).
    pub selector: String,
}

/// Arguments for `hermit search`.
#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Regex matched against package names and descriptions.
    pub pattern: Option<String>,
}

/// Arguments for `hermit validate`.
#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Directory of manifests.
    pub dir: PathBuf,
}

/// Arguments for `hermit auto-version`.
#[derive(Debug, Args)]
pub struct AutoVersionArgs {
    /// Manifest files to update.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Consult release history instead of only the latest release.
    #[arg(long)]
    pub history: bool,
}

/// Arguments for `hermit update-digests`.
#[derive(Debug, Args)]
pub struct UpdateDigestsArgs {
    /// Manifest files to update.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}
