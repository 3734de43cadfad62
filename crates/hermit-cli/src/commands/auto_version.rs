//! `hermit auto-version`.

use super::AutoVersionArgs;
use hermit_autoversion::{update_manifest, GitCli, GitHubClient, HttpFetcher, Options, Oracles};
use hermit_core::Result;
use tracing::warn;

pub fn run(args: &AutoVersionArgs) -> Result<()> {
    let fetcher = HttpFetcher::new()?;
    let releases = GitHubClient::new(&fetcher);
    let tags = GitCli;
    let oracles = Oracles {
        releases: &releases,
        fetcher: &fetcher,
        tags: &tags,
    };
    let options = Options {
        history: args.history,
    };

    let mut failed = false;
    for file in &args.files {
        match update_manifest(file, &oracles, options) {
            Ok(outcome) if outcome.changed => {
                println!("{}: added {}", file.display(), outcome.added.join(", "));
            }
            Ok(_) => println!("{}: up to date", file.display()),
            Err(e) => {
                warn!(file = %file.display(), error = %e, "auto-version failed");
                eprintln!("{e}");
                failed = true;
            }
        }
    }
    if failed {
        return Err(hermit_core::Error::Exit { code: 1 });
    }
    Ok(())
}
