//! `hermit validate`.

use super::ValidateArgs;
use hermit_core::{Error, Result};
use hermit_manifest::{DirBundle, Loader};
use std::sync::Arc;

pub fn run(args: &ValidateArgs) -> Result<()> {
    let loader = Loader::new(vec![Arc::new(DirBundle::new(&args.dir))]);
    let manifests = loader.all()?;
    println!("validated {} manifests", manifests.len());

    let errors = loader.errors();
    if errors.is_empty() {
        return Ok(());
    }
    for (name, messages) in &errors {
        for message in messages {
            eprintln!("{name}: {message}");
        }
    }
    Err(Error::Exit { code: 1 })
}
