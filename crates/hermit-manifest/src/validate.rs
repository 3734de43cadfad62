//! Manifest validation beyond what the decoder enforces structurally.

use crate::schema::{ChannelTarget, Manifest};
use hermit_core::Error;
use std::path::Path;

/// Validate cross-cutting manifest rules. The decoder already rejects
/// unknown attributes and invalid trigger events; this pass checks the
/// rules that need the whole document.
#[must_use]
pub fn validate(path: &Path, manifest: &Manifest) -> Vec<Error> {
    let mut errors = Vec::new();

    for channel in &manifest.channels {
        let ChannelTarget::Glob(pattern) = &channel.target else {
            continue;
        };
        let compiled = match glob::Pattern::new(pattern) {
            Ok(compiled) => compiled,
            Err(e) => {
                errors.push(Error::manifest_at(
                    path,
                    channel.line,
                    format!("channel {:?}: invalid version glob {pattern:?}: {e}", channel.name),
                ));
                continue;
            }
        };
        let matched = manifest
            .all_versions()
            .iter()
            .any(|v| compiled.matches(&v.to_string()));
        if !matched {
            errors.push(Error::manifest_at(
                path,
                channel.line,
                format!(
                    "channel {:?}: version glob {pattern:?} does not match any declared version",
                    channel.name
                ),
            ));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Manifest;

    fn parse(src: &str) -> (Manifest, Vec<Error>) {
        let (manifest, mut errors) = Manifest::parse(Path::new("test.hcl"), src).unwrap();
        errors.extend(validate(Path::new("test.hcl"), &manifest));
        (manifest, errors)
    }

    #[test]
    fn channel_glob_must_match_a_version() {
        let (_, errors) = parse(
            r#"
description = "x"
binaries = ["x"]
source = "https://example.com/x"
version "1.0.0" {
}
channel "stable" {
  update = "24h"
  version = "2.*"
}
"#,
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("does not match any"));
    }

    #[test]
    fn matching_glob_is_accepted() {
        let (_, errors) = parse(
            r#"
description = "x"
binaries = ["x"]
source = "https://example.com/x"
version "1.0.0" "1.0.1" {
}
channel "stable" {
  update = "24h"
  version = "1.0.*"
}
"#,
        );
        assert!(errors.is_empty(), "{errors:?}");
    }
}
