//! Shared command context: sources, loader, resolver.

use crate::commands::Cli;
use hermit_core::{host_platform, Result, StateDirs};
use hermit_manifest::{Config, Loader, Resolver};
use hermit_sources::{BuiltinSource, GitSource, LocalSource, Source, Sources};
use std::path::PathBuf;
use std::sync::Arc;

/// Resolver wired from the command line.
pub fn resolver(cli: &Cli) -> Result<Resolver> {
    let state = match &cli.state {
        Some(dir) => StateDirs::at(dir),
        None => StateDirs::resolve()?,
    };

    let mut sources = Sources::new();
    for spec in &cli.source {
        sources = sources.with(source_for(spec, &state));
    }
    sources = sources.with(Arc::new(BuiltinSource));
    sources.sync(false)?;

    let bundles = sources.bundles()?;
    let sources = Arc::new(sources);
    let loader = Loader::new(bundles).with_sync_hook(Box::new({
        let sources = Arc::clone(&sources);
        move || sources.sync(true)
    }));

    let env_dir = match &cli.env {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().map_err(|e| hermit_core::Error::io(".", e))?,
    };
    Ok(Resolver::new(
        Arc::new(loader),
        Config {
            env_dir,
            state,
            platform: host_platform(),
        },
    ))
}

fn source_for(spec: &str, state: &StateDirs) -> Arc<dyn Source> {
    let looks_remote = spec.starts_with("http://")
        || spec.starts_with("https://")
        || spec.starts_with("git@")
        || spec.ends_with(".git");
    if looks_remote {
        Arc::new(GitSource::new(spec, state))
    } else {
        Arc::new(LocalSource::new(PathBuf::from(spec)))
    }
}
