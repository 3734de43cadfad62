//! Core types for the Hermit package pipeline:
//! - Loose version parsing and ordering
//! - Package references (`name-version@channel`) and selectors
//! - Platform (os, arch) model
//! - Environment variable operations
//! - Process lock and state directory layout
//! - Error types

pub mod envars;
pub mod error;
pub mod lock;
pub mod platform;
pub mod reference;
pub mod selector;
pub mod state;
pub mod version;

pub use envars::{Op, Ops};
pub use error::{Error, Result};
pub use lock::LockGuard;
pub use platform::{core_platforms, host_platform, xarch, Platform};
pub use reference::Reference;
pub use selector::Selector;
pub use state::StateDirs;
pub use version::{Version, Versions};
