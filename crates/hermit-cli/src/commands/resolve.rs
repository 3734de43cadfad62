//! `hermit resolve`.

use super::{Cli, ResolveArgs};
use crate::context;
use hermit_core::{Result, Selector};

pub fn run(cli: &Cli, args: &ResolveArgs) -> Result<()> {
    let resolver = context::resolver(cli)?;
    let selector = Selector::parse_glob(&args.selector)?;
    let package = resolver.resolve(&selector)?;

    println!("{}", package.reference);
    println!("  description: {}", package.description);
    println!("  source: {}", package.source);
    if let Some(sha256) = &package.sha256 {
        println!("  sha256: {sha256}");
    }
    println!("  dest: {}", package.dest.display());
    if package.root != package.dest {
        println!("  root: {}", package.root.display());
    }
    if !package.binaries.is_empty() {
        println!("  binaries: {}", package.binaries.join(" "));
    }
    if !package.apps.is_empty() {
        println!("  apps: {}", package.apps.join(" "));
    }
    if !package.requires.is_empty() {
        println!("  requires: {}", package.requires.join(" "));
    }
    for op in &package.env.0 {
        println!("  env: {op}");
    }
    if let Some(interval) = package.update_interval {
        println!("  update-interval: {}s", interval.as_secs());
    }
    for platform in &package.unsupported_platforms {
        println!("  unsupported: {platform}");
    }
    for warning in &package.warnings {
        println!("  warning: {warning}");
    }
    Ok(())
}
