//! Manifest model and package resolver for Hermit.
//!
//! A manifest is a layered HCL document describing every version and
//! channel of a package. This crate owns:
//! - the typed document model and its decoder ([`schema`])
//! - manifest validation ([`validate`])
//! - bundle abstraction and the caching loader ([`bundle`], [`loader`])
//! - layer flattening and `${var}` interpolation ([`merge`], [`interpolate`])
//! - lifecycle trigger actions ([`actions`])
//! - the resolver producing concrete [`Package`] records ([`resolver`])

pub mod actions;
pub mod bundle;
pub mod hcl;
pub mod interpolate;
pub mod loader;
pub mod merge;
pub mod package;
pub mod resolver;
pub mod schema;
pub mod validate;

pub use actions::{Action, ActionContext, Event};
pub use bundle::{Bundle, DirBundle, MemBundle};
pub use loader::{AnnotatedManifest, Loader};
pub use package::Package;
pub use resolver::{Config, Resolver};
pub use schema::{AutoVersion, ChannelBlock, ChannelTarget, Layer, Manifest, VersionBlock};
