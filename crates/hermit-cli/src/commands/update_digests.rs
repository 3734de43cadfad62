//! `hermit update-digests`.

use super::UpdateDigestsArgs;
use hermit_autoversion::{DigestUpdater, HttpFetcher};
use hermit_core::Result;

pub fn run(args: &UpdateDigestsArgs) -> Result<()> {
    let fetcher = HttpFetcher::new()?;
    let updater = DigestUpdater::new(&fetcher);

    let mut failed = false;
    for file in &args.files {
        let report = updater.update_file(file)?;
        println!("{}: {} digests added", file.display(), report.added);
        for (url, error) in &report.errors {
            eprintln!("{url}: {error}");
            failed = true;
        }
    }
    if failed {
        return Err(hermit_core::Error::Exit { code: 1 });
    }
    Ok(())
}
