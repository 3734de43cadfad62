//! Platform model: `(os, arch)` pairs and the architecture aliases used
//! in source-URL interpolation.

use std::fmt;

/// An operating system / architecture pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    /// Operating system (`linux`, `darwin`).
    pub os: String,
    /// CPU architecture (`amd64`, `arm64`).
    pub arch: String,
}

impl Platform {
    /// Construct from os/arch strings.
    #[must_use]
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// The platform set probed for unsupported-platform reporting.
#[must_use]
pub fn core_platforms() -> Vec<Platform> {
    vec![
        Platform::new("linux", "amd64"),
        Platform::new("darwin", "amd64"),
        Platform::new("darwin", "arm64"),
    ]
}

/// The platform this process is running on.
#[must_use]
pub fn host_platform() -> Platform {
    let os = match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    };
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    };
    Platform::new(os, arch)
}

/// Alternate spelling of an architecture, as used by many release
/// artifacts (`${xarch}` interpolation).
#[must_use]
pub fn xarch(arch: &str) -> &str {
    match arch {
        "amd64" => "x86_64",
        "arm64" => "aarch64",
        "386" => "i386",
        other => other,
    }
}
