//! `hermit search`.

use super::{Cli, SearchArgs};
use crate::context;
use hermit_core::{Error, Result};
use regex::Regex;

pub fn run(cli: &Cli, args: &SearchArgs) -> Result<()> {
    let resolver = context::resolver(cli)?;
    let pattern = args.pattern.as_deref().unwrap_or("");
    let pattern = Regex::new(pattern)
        .map_err(|e| Error::other("search", format!("invalid pattern {pattern:?}: {e}")))?;

    let mut packages = resolver.search(&pattern)?;
    packages.sort_by(|a, b| a.reference.compare(&b.reference));
    for package in &packages {
        println!("{:<30} {}", package.reference.to_string(), package.description);
    }
    Ok(())
}
