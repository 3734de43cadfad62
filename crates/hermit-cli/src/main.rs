//! Hermit CLI: thin dispatch over the resolver, auto-version engine and
//! digest updater. Exit code 0 on success, an embedded code for
//! `Error::Exit`, 1 otherwise.

mod commands;
mod context;

use clap::Parser;
use commands::{Cli, Commands};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let result = match &cli.command {
        Commands::Resolve(args) => commands::resolve::run(&cli, args),
        Commands::Search(args) => commands::search::run(&cli, args),
        Commands::Validate(args) => commands::validate::run(args),
        Commands::AutoVersion(args) => commands::auto_version::run(args),
        Commands::UpdateDigests(args) => commands::update_digests::run(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("hermit: {e}");
            if cli.verbose > 0 {
                let mut source = std::error::Error::source(&e);
                while let Some(cause) = source {
                    eprintln!("  caused by: {cause}");
                    source = cause.source();
                }
            }
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}
