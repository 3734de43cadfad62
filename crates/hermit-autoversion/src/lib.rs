//! Manifest freshness for Hermit: the auto-version engine and the digest
//! updater.
//!
//! Both operate on manifest files on disk, rewriting the HCL document in
//! place (temp file + rename). External effects sit behind small traits
//! ([`UrlFetcher`], [`ReleaseOracle`], [`TagLister`]) so the algorithms
//! test offline.

pub mod digest;
pub mod engine;
pub mod fetch;
pub mod github;
pub mod gittags;
pub mod html;
pub mod json;

pub use digest::{DigestReport, DigestUpdater};
pub use engine::{update_manifest, Options, Oracles, Outcome};
pub use fetch::{HttpFetcher, MemFetcher, UrlFetcher};
pub use github::{GitHubClient, MemOracle, ReleaseOracle};
pub use gittags::{GitCli, MemTags, TagLister};
